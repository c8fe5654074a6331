pub mod bootstrap;
pub mod commands;
pub mod seed_planner;

pub mod config;
pub mod error;
pub mod schedule_repository;

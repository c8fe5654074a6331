pub mod application;
pub mod domain;
pub mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    adjust_block_duration_impl, create_plan_impl, create_template_impl, delete_block_impl,
    list_blocks_impl, list_gaps_impl, list_plans_impl, list_templates_impl, place_block_impl,
    seed_template_impl, set_day_start_impl,
};
use domain::models::{DayTemplate, Plan, TemplateBlock};
use serde::Serialize;
use std::path::PathBuf;

pub use application::commands::{GapResponse, PlannerState, SeedBlockInput, SeedTemplateResponse};
pub use application::seed_planner::{order_steps, SeedKind, SeedPlanner, SeedStep};
pub use domain::gaps::{find_gaps, free_minutes};
pub use domain::placement::{
    place, place_with_policy, Bias, PlacementPolicy, PlacementRequest, PlacementResult,
};
pub use domain::reflow::{reflow, reflow_time_of_day};
pub use domain::time_anchor::{anchor, anchor_time_of_day};
pub use domain::window::{clamp_duration, DayWindow, Interval};
pub use infrastructure::error::InfraError;

#[derive(Debug, Serialize)]
pub struct BootstrapResponse {
    pub workspace_root: String,
    pub config_dir: String,
    pub logs_dir: String,
}

pub fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        config_dir: result.config_dir.display().to_string(),
        logs_dir: result.logs_dir.display().to_string(),
    })
}

pub fn create_plan(
    state: &PlannerState,
    name: String,
    emoji: Option<String>,
    color: String,
    default_duration_minutes: Option<u32>,
) -> Result<Plan, String> {
    create_plan_impl(state, name, emoji, color, default_duration_minutes)
        .map_err(|error| state.command_error("create_plan", &error))
}

pub fn list_plans(state: &PlannerState) -> Result<Vec<Plan>, String> {
    list_plans_impl(state).map_err(|error| state.command_error("list_plans", &error))
}

pub fn create_template(
    state: &PlannerState,
    name: String,
    day_start: Option<String>,
) -> Result<DayTemplate, String> {
    create_template_impl(state, name, day_start)
        .map_err(|error| state.command_error("create_template", &error))
}

pub fn list_templates(state: &PlannerState) -> Result<Vec<DayTemplate>, String> {
    list_templates_impl(state).map_err(|error| state.command_error("list_templates", &error))
}

pub fn place_block(
    state: &PlannerState,
    template_id: String,
    plan_id: String,
    desired_time: String,
    duration_minutes: Option<u32>,
    bias: Option<String>,
) -> Result<Option<TemplateBlock>, String> {
    place_block_impl(state, template_id, plan_id, desired_time, duration_minutes, bias)
        .map_err(|error| state.command_error("place_block", &error))
}

pub fn adjust_block_duration(
    state: &PlannerState,
    block_id: String,
    minutes: i64,
) -> Result<TemplateBlock, String> {
    adjust_block_duration_impl(state, block_id, minutes)
        .map_err(|error| state.command_error("adjust_block_duration", &error))
}

pub fn set_day_start(
    state: &PlannerState,
    template_id: String,
    day_start: String,
) -> Result<Vec<TemplateBlock>, String> {
    set_day_start_impl(state, template_id, day_start)
        .map_err(|error| state.command_error("set_day_start", &error))
}

pub fn list_gaps(state: &PlannerState, template_id: String) -> Result<Vec<GapResponse>, String> {
    list_gaps_impl(state, template_id).map_err(|error| state.command_error("list_gaps", &error))
}

pub fn list_blocks(
    state: &PlannerState,
    template_id: String,
) -> Result<Vec<TemplateBlock>, String> {
    list_blocks_impl(state, template_id)
        .map_err(|error| state.command_error("list_blocks", &error))
}

pub fn delete_block(state: &PlannerState, block_id: String) -> Result<bool, String> {
    delete_block_impl(state, block_id).map_err(|error| state.command_error("delete_block", &error))
}

pub fn seed_template(
    state: &PlannerState,
    template_id: String,
    inputs: Vec<SeedBlockInput>,
) -> Result<SeedTemplateResponse, String> {
    seed_template_impl(state, template_id, inputs)
        .map_err(|error| state.command_error("seed_template", &error))
}

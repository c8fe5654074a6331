use crate::application::bootstrap::bootstrap_workspace;
use crate::application::seed_planner::{order_steps, SeedKind, SeedPlanner, SeedStep};
use crate::domain::models::{parse_hhmm, DayTemplate, Plan, TemplateBlock};
use crate::domain::placement::{Bias, PlacementRequest, PlacementResult};
use crate::domain::reflow::{dropped_count, reflow, reflow_time_of_day};
use crate::domain::window::{clamp_duration, DayWindow, Interval};
use crate::infrastructure::config::{
    read_default_day_start, read_placement_settings, read_timezone, PlacementSettings,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::schedule_repository::{InMemoryScheduleRepository, ScheduleRepository};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const DEFAULT_PLAN_DURATION_MINUTES: u32 = 30;
const DEFAULT_PLAN_EMOJI: &str = "📌";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct PlannerState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    timezone: Tz,
    default_day_start: NaiveTime,
    placement: PlacementSettings,
    anchor_date: NaiveDate,
    repository: Arc<dyn ScheduleRepository>,
    log_guard: Mutex<()>,
}

impl PlannerState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_parts(
            workspace_root,
            Arc::new(InMemoryScheduleRepository::default()),
            Arc::new(Utc::now),
        )
    }

    /// Templates are laid out on the local date reported by `now_provider` at
    /// construction time.
    pub fn with_parts(
        workspace_root: PathBuf,
        repository: Arc<dyn ScheduleRepository>,
        now_provider: NowProvider,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let timezone = read_timezone(&bootstrap.config_dir)?;
        let default_day_start = read_default_day_start(&bootstrap.config_dir)?;
        let placement = read_placement_settings(&bootstrap.config_dir)?;
        let anchor_date = now_provider().with_timezone(&timezone).date_naive();

        Ok(Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            timezone,
            default_day_start,
            placement,
            anchor_date,
            repository,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn template_window(&self, template: &DayTemplate) -> Result<DayWindow, InfraError> {
        let day_start = template.day_start_time().ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "template {} has invalid day_start '{}'",
                template.id, template.day_start
            ))
        })?;
        Ok(DayWindow::anchored(self.anchor_date, day_start, self.timezone))
    }

    /// Blocks stored against an earlier anchor date are moved onto `window` by
    /// their wall-clock start and packed before use.
    fn load_blocks(
        &self,
        command: &str,
        template: &DayTemplate,
        window: &DayWindow,
    ) -> Result<Vec<TemplateBlock>, InfraError> {
        let blocks = self.repository.list_blocks(&template.id)?;
        if blocks.iter().all(|block| window.contains(&block.interval())) {
            return Ok(blocks);
        }
        let items = wall_clock_items(&blocks, self.timezone);
        let reflowed = reflow_time_of_day(window, &items, self.timezone);
        self.log_info(
            command,
            &format!("re-anchored template_id={} onto {}", template.id, self.anchor_date),
        );
        apply_reflow(self, command, blocks, &reflowed)
    }

    fn planner_for(
        &self,
        command: &str,
        template: &DayTemplate,
    ) -> Result<SeedPlanner, InfraError> {
        let window = self.template_window(template)?;
        let occupied = self
            .load_blocks(command, template, &window)?
            .iter()
            .map(TemplateBlock::interval)
            .collect::<Vec<_>>();
        Ok(SeedPlanner::new(window, self.timezone)
            .with_policy(self.placement.policy.clone())
            .with_occupied(occupied))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GapResponse {
    pub start: String,
    pub end: String,
    pub minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedBlockInput {
    pub plan_id: String,
    pub desired_time: String,
    pub duration_minutes: Option<u32>,
    pub bias: Option<String>,
    #[serde(default)]
    pub anchor: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedTemplateResponse {
    pub placed: Vec<TemplateBlock>,
    pub skipped_plan_ids: Vec<String>,
}

pub fn create_plan_impl(
    state: &PlannerState,
    name: String,
    emoji: Option<String>,
    color: String,
    default_duration_minutes: Option<u32>,
) -> Result<Plan, InfraError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InfraError::InvalidConfig("name must not be empty".to_string()));
    }

    let plan = Plan {
        id: next_id("pln"),
        name: name.to_string(),
        emoji: emoji
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_PLAN_EMOJI)
            .to_string(),
        color: color.trim().to_ascii_uppercase(),
        default_duration_minutes: default_duration_minutes.unwrap_or(DEFAULT_PLAN_DURATION_MINUTES),
    };
    plan.validate().map_err(InfraError::InvalidConfig)?;
    state.repository.upsert_plan(&plan)?;

    state.log_info("create_plan", &format!("created plan_id={}", plan.id));
    Ok(plan)
}

pub fn list_plans_impl(state: &PlannerState) -> Result<Vec<Plan>, InfraError> {
    state.repository.list_plans()
}

pub fn create_template_impl(
    state: &PlannerState,
    name: String,
    day_start: Option<String>,
) -> Result<DayTemplate, InfraError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InfraError::InvalidConfig("name must not be empty".to_string()));
    }
    let day_start = match day_start {
        Some(raw) => parse_time_input(&raw, "day_start")?,
        None => state.default_day_start,
    };

    let template = DayTemplate {
        id: next_id("tpl"),
        name: name.to_string(),
        day_start: day_start.format("%H:%M").to_string(),
    };
    template.validate().map_err(InfraError::InvalidConfig)?;
    state.repository.upsert_template(&template)?;

    state.log_info("create_template", &format!("created template_id={}", template.id));
    Ok(template)
}

pub fn list_templates_impl(state: &PlannerState) -> Result<Vec<DayTemplate>, InfraError> {
    state.repository.list_templates()
}

pub fn place_block_impl(
    state: &PlannerState,
    template_id: String,
    plan_id: String,
    desired_time: String,
    duration_minutes: Option<u32>,
    bias: Option<String>,
) -> Result<Option<TemplateBlock>, InfraError> {
    let template = required_template(state, &template_id)?;
    let plan = required_plan(state, &plan_id)?;
    let request = build_request(
        state,
        &plan,
        &desired_time,
        duration_minutes,
        bias.as_deref(),
    )?;

    let mut planner = state.planner_for("place_block", &template)?;
    let result = planner.place(&request);
    let Some(interval) = result.interval().filter(|interval| !interval.is_empty()) else {
        state.log_info(
            "place_block",
            &format!(
                "no room in template_id={} for plan_id={} ({} minutes)",
                template.id, plan.id, request.duration_minutes
            ),
        );
        return Ok(None);
    };

    let block = new_block(&template, &plan, interval);
    block.validate().map_err(InfraError::InvalidConfig)?;
    state.repository.upsert_block(&block)?;

    let placed_minutes = block.duration_minutes();
    state.log_info(
        "place_block",
        &format!(
            "placed block_id={} start={} minutes={} requested={}",
            block.id,
            block.start_at.to_rfc3339(),
            placed_minutes,
            request.duration_minutes
        ),
    );
    Ok(Some(block))
}

pub fn adjust_block_duration_impl(
    state: &PlannerState,
    block_id: String,
    minutes: i64,
) -> Result<TemplateBlock, InfraError> {
    let block = required_block(state, &block_id)?;
    let template = required_template(state, &block.template_id)?;
    let window = state.template_window(&template)?;

    let mut blocks = state.load_blocks("adjust_block_duration", &template, &window)?;
    let Some(current) = blocks.iter_mut().find(|candidate| candidate.id == block.id) else {
        return Err(InfraError::InvalidConfig(format!(
            "block no longer fits in its day: {}",
            block.id
        )));
    };
    let floored = minutes.max(i64::from(state.placement.editing_floor_minutes));
    let clamped = clamp_duration(current.start_at, floored, &window);
    current.end_at = current.start_at + Duration::minutes(clamped);

    let items = blocks
        .iter()
        .map(TemplateBlock::interval)
        .collect::<Vec<_>>();
    let reflowed = reflow(&window, &items);
    let kept = apply_reflow(state, "adjust_block_duration", blocks, &reflowed)?;

    let Some(updated) = kept.into_iter().find(|candidate| candidate.id == block.id) else {
        return Err(InfraError::InvalidConfig(format!(
            "block no longer fits in its day: {}",
            block.id
        )));
    };
    state.log_info(
        "adjust_block_duration",
        &format!(
            "adjusted block_id={} requested={} minutes={}",
            updated.id,
            minutes,
            updated.duration_minutes()
        ),
    );
    Ok(updated)
}

pub fn set_day_start_impl(
    state: &PlannerState,
    template_id: String,
    day_start: String,
) -> Result<Vec<TemplateBlock>, InfraError> {
    let mut template = required_template(state, &template_id)?;
    let day_start = parse_time_input(&day_start, "day_start")?;
    template.day_start = day_start.format("%H:%M").to_string();
    let window = state.template_window(&template)?;

    let blocks = state.repository.list_blocks(&template.id)?;
    let items = wall_clock_items(&blocks, state.timezone);
    let reflowed = reflow_time_of_day(&window, &items, state.timezone);

    state.repository.upsert_template(&template)?;
    let kept = apply_reflow(state, "set_day_start", blocks, &reflowed)?;

    state.log_info(
        "set_day_start",
        &format!(
            "moved template_id={} day_start={} blocks={}",
            template.id,
            template.day_start,
            kept.len()
        ),
    );
    Ok(kept)
}

pub fn list_gaps_impl(
    state: &PlannerState,
    template_id: String,
) -> Result<Vec<GapResponse>, InfraError> {
    let template = required_template(state, &template_id)?;
    let planner = state.planner_for("list_gaps", &template)?;
    Ok(planner
        .gaps()
        .into_iter()
        .map(|gap| GapResponse {
            start: gap.start.to_rfc3339(),
            end: gap.end().to_rfc3339(),
            minutes: gap.duration.num_minutes(),
        })
        .collect())
}

pub fn list_blocks_impl(
    state: &PlannerState,
    template_id: String,
) -> Result<Vec<TemplateBlock>, InfraError> {
    let template = required_template(state, &template_id)?;
    let window = state.template_window(&template)?;
    state.load_blocks("list_blocks", &template, &window)
}

pub fn delete_block_impl(state: &PlannerState, block_id: String) -> Result<bool, InfraError> {
    let block_id = block_id.trim();
    if block_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "block_id must not be empty".to_string(),
        ));
    }
    let removed = state.repository.remove_block(block_id)?;
    if removed {
        state.log_info("delete_block", &format!("deleted block_id={block_id}"));
    }
    Ok(removed)
}

pub fn seed_template_impl(
    state: &PlannerState,
    template_id: String,
    inputs: Vec<SeedBlockInput>,
) -> Result<SeedTemplateResponse, InfraError> {
    let template = required_template(state, &template_id)?;

    let mut steps = Vec::with_capacity(inputs.len());
    let mut plans = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let plan = required_plan(state, &input.plan_id)?;
        let request = build_request(
            state,
            &plan,
            &input.desired_time,
            input.duration_minutes,
            input.bias.as_deref(),
        )?;
        steps.push(SeedStep {
            key: plan.id.clone(),
            request,
            kind: if input.anchor {
                SeedKind::Anchor
            } else {
                SeedKind::Rhythm
            },
        });
        plans.push(plan);
    }
    let steps = order_steps(steps);

    let mut planner = state.planner_for("seed_template", &template)?;
    let results = planner.seed_steps(&steps);

    let mut placed = Vec::new();
    let mut skipped_plan_ids = Vec::new();
    for (step, result) in steps.iter().zip(results) {
        let interval = match result {
            PlacementResult::Placed(interval) if !interval.is_empty() => interval,
            _ => {
                skipped_plan_ids.push(step.key.clone());
                continue;
            }
        };
        let Some(plan) = plans.iter().find(|plan| plan.id == step.key) else {
            skipped_plan_ids.push(step.key.clone());
            continue;
        };
        let block = new_block(&template, plan, interval);
        state.repository.upsert_block(&block)?;
        placed.push(block);
    }

    state.log_info(
        "seed_template",
        &format!(
            "seeded template_id={} placed={} skipped={}",
            template.id,
            placed.len(),
            skipped_plan_ids.len()
        ),
    );
    Ok(SeedTemplateResponse {
        placed,
        skipped_plan_ids,
    })
}

/// Persists reflowed positions; blocks squeezed to zero length are removed.
fn apply_reflow(
    state: &PlannerState,
    command: &str,
    blocks: Vec<TemplateBlock>,
    reflowed: &[Interval],
) -> Result<Vec<TemplateBlock>, InfraError> {
    let mut kept = Vec::with_capacity(blocks.len());
    let mut dropped = Vec::with_capacity(dropped_count(reflowed));
    for (mut block, interval) in blocks.into_iter().zip(reflowed.iter().copied()) {
        if interval.is_empty() {
            state.repository.remove_block(&block.id)?;
            dropped.push(block.id);
            continue;
        }
        block.start_at = interval.start;
        block.end_at = interval.end();
        state.repository.upsert_block(&block)?;
        kept.push(block);
    }
    if !dropped.is_empty() {
        state.log_error(
            command,
            &format!(
                "dropped {} blocks that no longer fit: {}",
                dropped.len(),
                dropped.join(",")
            ),
        );
    }
    kept.sort_by(|left, right| left.start_at.cmp(&right.start_at));
    Ok(kept)
}

fn wall_clock_items(blocks: &[TemplateBlock], timezone: Tz) -> Vec<(NaiveTime, Duration)> {
    blocks
        .iter()
        .map(|block| {
            (
                block.start_at.with_timezone(&timezone).time(),
                block.end_at - block.start_at,
            )
        })
        .collect()
}

fn build_request(
    state: &PlannerState,
    plan: &Plan,
    desired_time: &str,
    duration_minutes: Option<u32>,
    bias: Option<&str>,
) -> Result<PlacementRequest, InfraError> {
    let desired_time = parse_time_input(desired_time, "desired_time")?;
    let duration_minutes = duration_minutes.unwrap_or(plan.default_duration_minutes);
    if duration_minutes == 0 {
        return Err(InfraError::InvalidConfig(
            "duration_minutes must be > 0".to_string(),
        ));
    }
    let bias = match bias.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => parse_bias(raw)?,
        None => state.placement.default_bias,
    };
    Ok(PlacementRequest::new(desired_time, duration_minutes, bias))
}

fn new_block(template: &DayTemplate, plan: &Plan, interval: Interval) -> TemplateBlock {
    TemplateBlock {
        id: next_id("blk"),
        template_id: template.id.clone(),
        plan_id: plan.id.clone(),
        start_at: interval.start,
        end_at: interval.end(),
    }
}

fn required_template(state: &PlannerState, template_id: &str) -> Result<DayTemplate, InfraError> {
    let template_id = template_id.trim();
    if template_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "template_id must not be empty".to_string(),
        ));
    }
    state
        .repository
        .get_template(template_id)?
        .ok_or_else(|| InfraError::InvalidConfig(format!("template not found: {template_id}")))
}

fn required_plan(state: &PlannerState, plan_id: &str) -> Result<Plan, InfraError> {
    let plan_id = plan_id.trim();
    if plan_id.is_empty() {
        return Err(InfraError::InvalidConfig("plan_id must not be empty".to_string()));
    }
    state
        .repository
        .get_plan(plan_id)?
        .ok_or_else(|| InfraError::InvalidConfig(format!("plan not found: {plan_id}")))
}

fn required_block(state: &PlannerState, block_id: &str) -> Result<TemplateBlock, InfraError> {
    let block_id = block_id.trim();
    if block_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "block_id must not be empty".to_string(),
        ));
    }
    state
        .repository
        .get_block(block_id)?
        .ok_or_else(|| InfraError::InvalidConfig(format!("block not found: {block_id}")))
}

fn parse_time_input(value: &str, field_name: &str) -> Result<NaiveTime, InfraError> {
    parse_hhmm(value)
        .ok_or_else(|| InfraError::InvalidConfig(format!("{field_name} must be HH:MM")))
}

fn parse_bias(value: &str) -> Result<Bias, InfraError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "before" | "prefer_before" | "prefer-before" => Ok(Bias::PreferBefore),
        "after" | "prefer_after" | "prefer-after" => Ok(Bias::PreferAfter),
        other => Err(InfraError::InvalidConfig(format!(
            "unsupported bias: {}",
            other
        ))),
    }
}

use crate::domain::window::Interval;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub color: String,
    pub default_duration_minutes: u32,
}

impl Plan {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "plan.id")?;
        validate_non_empty(&self.name, "plan.name")?;
        validate_color(&self.color, "plan.color")?;
        if self.default_duration_minutes == 0 {
            return Err("plan.default_duration_minutes must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayTemplate {
    pub id: String,
    pub name: String,
    pub day_start: String,
}

impl DayTemplate {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "template.id")?;
        validate_non_empty(&self.name, "template.name")?;
        validate_hhmm(&self.day_start, "template.day_start")
    }

    pub fn day_start_time(&self) -> Option<NaiveTime> {
        parse_hhmm(&self.day_start)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateBlock {
    pub id: String,
    pub template_id: String,
    pub plan_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl TemplateBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.template_id, "block.template_id")?;
        validate_non_empty(&self.plan_id, "block.plan_id")?;
        if self.end_at < self.start_at {
            return Err("block.end_at must not be before block.start_at".to_string());
        }
        Ok(())
    }

    pub fn interval(&self) -> Interval {
        Interval::between(self.start_at, self.end_at)
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_at - self.start_at).num_minutes()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    parse_hhmm(value)
        .map(|_| ())
        .ok_or_else(|| format!("{field_name} must be HH:MM"))
}

fn validate_color(value: &str, field_name: &str) -> Result<(), String> {
    let Some(hex) = value.strip_prefix('#') else {
        return Err(format!("{field_name} must be #RRGGBB"));
    };
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("{field_name} must be #RRGGBB"));
    }
    Ok(())
}

pub(crate) fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

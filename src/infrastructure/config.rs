use crate::domain::models::parse_hhmm;
use crate::domain::placement::{Bias, PlacementPolicy};
use crate::infrastructure::error::InfraError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const PLACEMENT_JSON: &str = "placement.json";
const DEFAULT_EDITING_FLOOR_MINUTES: u32 = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub placement: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementSettings {
    pub policy: PlacementPolicy,
    pub editing_floor_minutes: u32,
    pub default_bias: Bias,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            policy: PlacementPolicy::default(),
            editing_floor_minutes: DEFAULT_EDITING_FLOOR_MINUTES,
            default_bias: Bias::default(),
        }
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "DayPlan",
                "timezone": "UTC",
                "defaultDayStart": "00:00"
            }),
        ),
        (
            PLACEMENT_JSON,
            serde_json::json!({
                "schema": 1,
                "allowShrink": true,
                "minimumShrunkMinutes": 0,
                "editingFloorMinutes": DEFAULT_EDITING_FLOOR_MINUTES,
                "defaultBias": "prefer_after"
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        placement: read_config(&config_dir.join(PLACEMENT_JSON))?,
    })
}

pub fn read_timezone(config_dir: &Path) -> Result<Tz, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let name = app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("UTC");
    name.parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{name}': {error}")))
}

pub fn read_default_day_start(config_dir: &Path) -> Result<NaiveTime, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let Some(raw) = app
        .get("defaultDayStart")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return Ok(NaiveTime::MIN);
    };
    parse_hhmm(raw).ok_or_else(|| {
        InfraError::InvalidConfig(format!("defaultDayStart must be HH:MM, got '{raw}'"))
    })
}

pub fn read_placement_settings(config_dir: &Path) -> Result<PlacementSettings, InfraError> {
    let placement = read_config(&config_dir.join(PLACEMENT_JSON))?;
    let mut settings = PlacementSettings::default();

    if let Some(value) = placement
        .get("allowShrink")
        .and_then(serde_json::Value::as_bool)
    {
        settings.policy.allow_shrink = value;
    }
    if let Some(value) = placement
        .get("minimumShrunkMinutes")
        .and_then(serde_json::Value::as_u64)
    {
        settings.policy.minimum_shrunk_minutes = u32::try_from(value).unwrap_or(u32::MAX);
    }
    if let Some(value) = placement
        .get("editingFloorMinutes")
        .and_then(serde_json::Value::as_u64)
    {
        settings.editing_floor_minutes = u32::try_from(value).unwrap_or(u32::MAX);
    }
    if let Some(value) = placement.get("defaultBias") {
        settings.default_bias = serde_json::from_value(value.clone()).map_err(|error| {
            InfraError::InvalidConfig(format!(
                "defaultBias must be prefer_before or prefer_after: {error}"
            ))
        })?;
    }

    Ok(settings)
}

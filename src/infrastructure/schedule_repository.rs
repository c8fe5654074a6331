use crate::domain::models::{DayTemplate, Plan, TemplateBlock};
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Boundary to the object store that owns plans, templates and their blocks.
pub trait ScheduleRepository: Send + Sync {
    fn upsert_plan(&self, plan: &Plan) -> Result<(), InfraError>;
    fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, InfraError>;
    fn list_plans(&self) -> Result<Vec<Plan>, InfraError>;

    fn upsert_template(&self, template: &DayTemplate) -> Result<(), InfraError>;
    fn get_template(&self, template_id: &str) -> Result<Option<DayTemplate>, InfraError>;
    fn list_templates(&self) -> Result<Vec<DayTemplate>, InfraError>;

    fn upsert_block(&self, block: &TemplateBlock) -> Result<(), InfraError>;
    fn get_block(&self, block_id: &str) -> Result<Option<TemplateBlock>, InfraError>;
    fn remove_block(&self, block_id: &str) -> Result<bool, InfraError>;
    fn list_blocks(&self, template_id: &str) -> Result<Vec<TemplateBlock>, InfraError>;
}

#[derive(Debug, Default)]
struct ScheduleTables {
    plans: HashMap<String, Plan>,
    plan_order: Vec<String>,
    templates: HashMap<String, DayTemplate>,
    template_order: Vec<String>,
    blocks: HashMap<String, TemplateBlock>,
}

#[derive(Debug, Default)]
pub struct InMemoryScheduleRepository {
    tables: Mutex<ScheduleTables>,
}

impl InMemoryScheduleRepository {
    fn normalized_id(id: &str) -> Option<String> {
        let normalized = id.trim();
        if normalized.is_empty() {
            return None;
        }
        Some(normalized.to_string())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ScheduleTables>, InfraError> {
        self.tables.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("schedule store lock poisoned: {error}"))
        })
    }
}

impl ScheduleRepository for InMemoryScheduleRepository {
    fn upsert_plan(&self, plan: &Plan) -> Result<(), InfraError> {
        let plan_id = Self::normalized_id(&plan.id).ok_or_else(|| {
            InfraError::InvalidConfig("plan id is required for upsert".to_string())
        })?;
        let mut tables = self.lock()?;
        if tables.plans.insert(plan_id.clone(), plan.clone()).is_none() {
            tables.plan_order.push(plan_id);
        }
        Ok(())
    }

    fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, InfraError> {
        let Some(plan_id) = Self::normalized_id(plan_id) else {
            return Ok(None);
        };
        Ok(self.lock()?.plans.get(&plan_id).cloned())
    }

    fn list_plans(&self) -> Result<Vec<Plan>, InfraError> {
        let tables = self.lock()?;
        Ok(tables
            .plan_order
            .iter()
            .filter_map(|plan_id| tables.plans.get(plan_id).cloned())
            .collect())
    }

    fn upsert_template(&self, template: &DayTemplate) -> Result<(), InfraError> {
        let template_id = Self::normalized_id(&template.id).ok_or_else(|| {
            InfraError::InvalidConfig("template id is required for upsert".to_string())
        })?;
        let mut tables = self.lock()?;
        if tables
            .templates
            .insert(template_id.clone(), template.clone())
            .is_none()
        {
            tables.template_order.push(template_id);
        }
        Ok(())
    }

    fn get_template(&self, template_id: &str) -> Result<Option<DayTemplate>, InfraError> {
        let Some(template_id) = Self::normalized_id(template_id) else {
            return Ok(None);
        };
        Ok(self.lock()?.templates.get(&template_id).cloned())
    }

    fn list_templates(&self) -> Result<Vec<DayTemplate>, InfraError> {
        let tables = self.lock()?;
        Ok(tables
            .template_order
            .iter()
            .filter_map(|template_id| tables.templates.get(template_id).cloned())
            .collect())
    }

    fn upsert_block(&self, block: &TemplateBlock) -> Result<(), InfraError> {
        let block_id = Self::normalized_id(&block.id).ok_or_else(|| {
            InfraError::InvalidConfig("block id is required for upsert".to_string())
        })?;
        self.lock()?.blocks.insert(block_id, block.clone());
        Ok(())
    }

    fn get_block(&self, block_id: &str) -> Result<Option<TemplateBlock>, InfraError> {
        let Some(block_id) = Self::normalized_id(block_id) else {
            return Ok(None);
        };
        Ok(self.lock()?.blocks.get(&block_id).cloned())
    }

    fn remove_block(&self, block_id: &str) -> Result<bool, InfraError> {
        let Some(block_id) = Self::normalized_id(block_id) else {
            return Ok(false);
        };
        Ok(self.lock()?.blocks.remove(&block_id).is_some())
    }

    fn list_blocks(&self, template_id: &str) -> Result<Vec<TemplateBlock>, InfraError> {
        let Some(template_id) = Self::normalized_id(template_id) else {
            return Ok(Vec::new());
        };
        let tables = self.lock()?;
        let mut blocks = tables
            .blocks
            .values()
            .filter(|block| block.template_id == template_id)
            .cloned()
            .collect::<Vec<_>>();
        blocks.sort_by(|left, right| {
            left.start_at
                .cmp(&right.start_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn block(id: &str, template_id: &str, start: &str, end: &str) -> TemplateBlock {
        TemplateBlock {
            id: id.to_string(),
            template_id: template_id.to_string(),
            plan_id: "pln-1".to_string(),
            start_at: fixed_time(start),
            end_at: fixed_time(end),
        }
    }

    #[test]
    fn plans_keep_insertion_order_across_updates() {
        let repository = InMemoryScheduleRepository::default();
        for (id, name) in [("pln-b", "Lunch"), ("pln-a", "Run")] {
            repository
                .upsert_plan(&Plan {
                    id: id.to_string(),
                    name: name.to_string(),
                    emoji: "🍱".to_string(),
                    color: "#00AA00".to_string(),
                    default_duration_minutes: 30,
                })
                .expect("upsert plan");
        }
        let mut renamed = repository
            .get_plan("pln-b")
            .expect("get plan")
            .expect("plan exists");
        renamed.name = "Long lunch".to_string();
        repository.upsert_plan(&renamed).expect("update plan");

        let plans = repository.list_plans().expect("list plans");
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].name, "Long lunch");
        assert_eq!(plans[1].id, "pln-a");
    }

    #[test]
    fn blocks_are_scoped_to_template_and_sorted() {
        let repository = InMemoryScheduleRepository::default();
        repository
            .upsert_block(&block("blk-2", "tpl-1", "2025-01-01T12:00:00Z", "2025-01-01T13:00:00Z"))
            .expect("upsert");
        repository
            .upsert_block(&block("blk-1", "tpl-1", "2025-01-01T08:00:00Z", "2025-01-01T09:00:00Z"))
            .expect("upsert");
        repository
            .upsert_block(&block("blk-3", "tpl-2", "2025-01-01T07:00:00Z", "2025-01-01T08:00:00Z"))
            .expect("upsert");

        let blocks = repository.list_blocks("tpl-1").expect("list blocks");
        assert_eq!(
            blocks.iter().map(|block| block.id.as_str()).collect::<Vec<_>>(),
            vec!["blk-1", "blk-2"]
        );
        assert!(repository.remove_block(" blk-1 ").expect("remove"));
        assert!(!repository.remove_block("blk-1").expect("remove again"));
        assert!(repository.get_block("").expect("get").is_none());
    }

    #[test]
    fn upsert_requires_id() {
        let repository = InMemoryScheduleRepository::default();
        let result = repository.upsert_block(&block(
            " ",
            "tpl-1",
            "2025-01-01T08:00:00Z",
            "2025-01-01T09:00:00Z",
        ));
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }
}

//! Records available to query commands

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entity::Entity;
use super::registry::CommandRegistry;
use super::schema::{CommandKind, SchemaError};
use crate::executor::expressions::constant_value;
use crate::executor::types::{Expr, Stmt, Value};
use crate::parser::parse_turn;

/// Entity name -> ordered records, owned by the domain layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppContext {
    records: BTreeMap<String, Vec<Entity>>,
}

impl AppContext {
    pub fn insert(&mut self, entity: Entity) {
        self.records
            .entry(entity.kind.clone())
            .or_default()
            .push(entity);
    }

    pub fn records(&self, entity: &str) -> &[Entity] {
        self.records
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Add a record written as a query call, e.g.
    /// `find_alarm(time="8:30", label="swim")`.
    ///
    /// Attributes follow the query's slot order; attributes not given stay
    /// unset. Only literal keyword arguments are allowed.
    pub fn add_record_from_call(
        &mut self,
        call: &str,
        registry: &CommandRegistry,
    ) -> Result<&Entity, SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidRecord {
            text: call.to_string(),
            reason,
        };

        let module = parse_turn(call).map_err(|e| invalid(e.to_string()))?;
        let Some(Stmt::Expr {
            value: Expr::Call {
                func,
                args,
                keywords,
                ..
            },
            ..
        }) = module.single()
        else {
            return Err(invalid("expected a single query call".to_string()));
        };
        if !args.is_empty() {
            return Err(invalid("records take keyword arguments only".to_string()));
        }

        let name = func
            .as_name()
            .ok_or_else(|| invalid("call must name a query".to_string()))?;
        let schema = registry
            .get(name)
            .ok_or_else(|| invalid(format!("{} is not registered", name)))?;
        let CommandKind::Query { entity } = &schema.kind else {
            return Err(invalid(format!("{} is not a query", name)));
        };

        let mut record = Entity {
            kind: entity.clone(),
            attributes: schema
                .slots
                .iter()
                .filter(|slot| slot.name != "select")
                .map(|slot| (slot.name.clone(), Value::None))
                .collect(),
        };
        for keyword in keywords {
            let value = constant_value(&keyword.value)
                .ok_or_else(|| invalid(format!("{} must be a literal", keyword.arg)))?;
            let slot = record
                .attributes
                .iter_mut()
                .find(|(attr, _)| *attr == keyword.arg)
                .ok_or_else(|| invalid(format!("{} has no attribute {}", entity, keyword.arg)))?;
            slot.1 = value;
        }

        let records = self.records.entry(entity.clone()).or_default();
        records.push(record);
        Ok(&records[records.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::schema::{CommandSchema, EntitySchema, SlotType};

    fn registry() -> CommandRegistry {
        let alarm = EntitySchema {
            name: "alarm".to_string(),
            attributes: vec![
                ("time".to_string(), SlotType::Str),
                ("label".to_string(), SlotType::Str),
            ],
        };
        CommandRegistry::new(vec![CommandSchema::query(&alarm)])
    }

    #[test]
    fn test_add_record_from_call() {
        let mut context = AppContext::default();
        let record = context
            .add_record_from_call("find_alarm(label=\"swim\", time=\"8:30\")", &registry())
            .unwrap();

        assert_eq!(record.attributes[0], ("time".to_string(), Value::from("8:30")));
        assert_eq!(record.attributes[1], ("label".to_string(), Value::from("swim")));
        assert_eq!(context.records("alarm").len(), 1);
        assert!(context.records("timer").is_empty());
    }

    #[test]
    fn test_add_record_rejects_bad_calls() {
        let mut context = AppContext::default();
        let registry = registry();

        for call in [
            "find_alarm(volume=3)",
            "find_alarm(time=x1)",
            "find_timer(time=\"8:30\")",
            "say(args=\"hi\")",
            "x1.time = \"8:30\"",
        ] {
            assert!(
                matches!(
                    context.add_record_from_call(call, &registry),
                    Err(SchemaError::InvalidRecord { .. })
                ),
                "{} should be rejected",
                call
            );
        }
        assert!(context.records("alarm").is_empty());
    }
}

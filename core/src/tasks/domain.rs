//! Domain schema files: intents, entities and query records

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use super::app_context::AppContext;
use super::registry::CommandRegistry;
use super::schema::{CommandKind, CommandSchema, EntitySchema, EntitySpec, IntentSpec, SchemaError};

/// Contents of a domain schema file
///
/// ```json
/// {
///   "intents": [{"command": "create_alarm", "entity_name": "alarm", "args": {...}}],
///   "entities": [{"entity": "contact", "attributes": {"name": {"type": "str"}}}],
///   "records": ["find_alarm(time=\"8:30\", label=\"swim\")"]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DomainSchema {
    #[serde(default)]
    pub intents: Vec<IntentSpec>,
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    /// Query calls describing the records the app context starts with
    #[serde(default)]
    pub records: Vec<String>,
}

/// Everything a conversation needs from the domain layer
#[derive(Debug, Clone)]
pub struct Domain {
    pub registry: CommandRegistry,
    pub app_context: AppContext,
    pub entities: Vec<EntitySchema>,
    pub version_hash: String,
}

impl DomainSchema {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    /// SHA256 of the schema's canonical JSON form
    pub fn version_hash(&self) -> Result<String, SchemaError> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Build the registry and app context.
    ///
    /// Each intent is registered once. An intent with an `entity_name`
    /// contributes the entity it stores; every entity gets a `find_<entity>`
    /// query. A `query_intent` is registered as the query over its entity.
    pub fn build(&self) -> Result<Domain, SchemaError> {
        let mut seen = HashSet::new();
        let mut commands = Vec::new();
        let mut entities: Vec<EntitySchema> = Vec::new();

        for spec in &self.entities {
            push_entity(&mut entities, spec.to_schema()?);
        }

        for intent in &self.intents {
            if !seen.insert(intent.command.clone()) {
                debug!(command = %intent.command, "Skipping duplicate intent definition");
                continue;
            }

            let mut schema = intent.to_schema()?;
            if intent.query_intent {
                let entity = intent
                    .entity_name
                    .clone()
                    .ok_or_else(|| SchemaError::MissingEntityName(intent.command.clone()))?;
                schema.kind = CommandKind::Query { entity };
            } else if intent.entity_name.is_some() {
                push_entity(&mut entities, EntitySchema::from_intent(intent)?);
            }
            commands.push(schema);
        }

        commands.extend(entities.iter().map(CommandSchema::query));
        let registry = CommandRegistry::new(commands);

        let mut app_context = AppContext::default();
        for record in &self.records {
            app_context.add_record_from_call(record, &registry)?;
        }

        let version_hash = self.version_hash()?;
        info!(
            commands = registry.len(),
            entities = entities.len(),
            records = self.records.len(),
            version = %version_hash,
            "Built domain registry"
        );

        Ok(Domain {
            registry,
            app_context,
            entities,
            version_hash,
        })
    }
}

fn push_entity(entities: &mut Vec<EntitySchema>, entity: EntitySchema) {
    if !entities.iter().any(|known| known.name == entity.name) {
        entities.push(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "intents": [
            {
                "command": "CreateAlarm",
                "entity_name": "alarm",
                "args": {
                    "time": {"type": "str", "optional": false},
                    "label": {"type": "Optional[str]", "optional": true}
                },
                "confirmation_required": true
            },
            {"command": "CreateAlarm", "args": {}},
            {
                "command": "find_contact",
                "query_intent": true,
                "entity_name": "contact",
                "args": {"name": {"type": "str", "optional": true}}
            }
        ],
        "entities": [
            {"entity": "contact", "attributes": {"name": {"type": "str"}, "phone": {"type": "str"}}}
        ],
        "records": ["find_alarm(time=\"7:00\")", "find_alarm(time=\"8:30\", label=\"swim\")"]
    }"#;

    #[test]
    fn test_build_domain() {
        let domain = DomainSchema::from_json(SCHEMA).unwrap().build().unwrap();
        let registry = &domain.registry;

        let alarm = registry.get("create_alarm").unwrap();
        assert_eq!(alarm.slots.len(), 2);
        assert!(alarm.confirmation_required);

        let find_alarm = registry.get("find_alarm").unwrap();
        assert!(find_alarm.find_slot("date_of_alarm").is_some());

        // The declared query intent takes precedence over the derived query
        let find_contact = registry.get("find_contact").unwrap();
        assert_eq!(find_contact.slots.len(), 1);
        assert_eq!(
            find_contact.kind,
            CommandKind::Query {
                entity: "contact".to_string()
            }
        );

        assert_eq!(domain.app_context.records("alarm").len(), 2);
        assert_eq!(domain.entities.len(), 2);
    }

    #[test]
    fn test_version_hash_is_stable() {
        let schema = DomainSchema::from_json(SCHEMA).unwrap();
        let hash = schema.version_hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, DomainSchema::from_json(SCHEMA).unwrap().version_hash().unwrap());
        assert_ne!(hash, DomainSchema::default().version_hash().unwrap());
    }

    #[test]
    fn test_query_intent_needs_entity() {
        let schema = DomainSchema::from_json(
            r#"{"intents": [{"command": "find_things", "query_intent": true}]}"#,
        )
        .unwrap();
        assert!(matches!(schema.build(), Err(SchemaError::MissingEntityName(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = DomainSchema::load("/nonexistent/domain.json").unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));
    }
}

//! Schema descriptors for commands and entities
//!
//! A domain layer describes its intents and entities as JSON. Each intent
//! becomes a [`CommandSchema`]; every [`crate::tasks::Command`] instance holds
//! one and validates its slot writes against it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use thiserror::Error;

use crate::executor::types::Value;

/* ===================== Errors ===================== */

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("argument '{arg}' of {owner} is invalid: {reason}")]
    InvalidArg {
        owner: String,
        arg: String,
        reason: String,
    },

    #[error("intent {0} needs an entity_name to derive its query")]
    MissingEntityName(String),

    #[error("invalid record '{text}': {reason}")]
    InvalidRecord { text: String, reason: String },
}

/* ===================== Slot Types ===================== */

/// Type tag of a slot or entity attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum SlotType {
    Str,
    Int,
    Float,
    Bool,
    List,
    /// A task or entity reference, named by its type
    Object(String),
    Any,
}

impl SlotType {
    /// Parse a type tag such as `str`, `Optional[int]` or `List[str]`
    pub fn parse(tag: &str) -> SlotType {
        let tag = tag.trim();
        if let Some(inner) = tag
            .strip_prefix("Optional[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return SlotType::parse(inner);
        }

        match tag {
            "str" | "string" => SlotType::Str,
            "int" | "integer" => SlotType::Int,
            "float" | "number" => SlotType::Float,
            "bool" | "boolean" => SlotType::Bool,
            "list" | "List" => SlotType::List,
            "any" | "Any" | "" => SlotType::Any,
            _ if tag.starts_with("List[") || tag.starts_with("list[") => SlotType::List,
            other => SlotType::Object(other.to_string()),
        }
    }

    /// Whether `value` can be stored in a slot of this type.
    ///
    /// `None` fits every slot (slots are optional until filled) and an `int`
    /// fits a `float` slot.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::None) | (SlotType::Any, _) => true,
            (SlotType::Str, Value::Str(_)) => true,
            (SlotType::Int, Value::Int(_)) => true,
            (SlotType::Float, Value::Float(_) | Value::Int(_)) => true,
            (SlotType::Bool, Value::Bool(_)) => true,
            (SlotType::List, Value::List(_)) => true,
            (SlotType::Object(_), Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Str => write!(f, "str"),
            SlotType::Int => write!(f, "int"),
            SlotType::Float => write!(f, "float"),
            SlotType::Bool => write!(f, "bool"),
            SlotType::List => write!(f, "list"),
            SlotType::Object(name) => write!(f, "{}", name),
            SlotType::Any => write!(f, "Any"),
        }
    }
}

/* ===================== Command Schema ===================== */

/// What a command does when performed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum CommandKind {
    /// A domain intent; performing it reports success
    Intent,
    /// `find_<entity>`: looks records up in the app context
    Query { entity: String },
    /// `say(...)`: hands variables to response generation
    Say,
    /// `hint(...)`: a recommendation surfaced by the app
    Hint,
    /// `perform(x)`: marker keeping variable numbering in sync
    Perform,
    /// `len(x)`: number of results of a query
    Len,
    /// `next(x)`: first result of a query
    Next,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSchema {
    pub name: String,
    pub ty: SlotType,
    pub required: bool,
    /// Example values declared by the domain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<JsonValue>,
    #[serde(default)]
    pub disambiguation: bool,
}

impl SlotSchema {
    pub fn optional(name: impl Into<String>, ty: SlotType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            values: Vec::new(),
            disambiguation: false,
        }
    }

    pub fn required(name: impl Into<String>, ty: SlotType) -> Self {
        Self {
            required: true,
            ..Self::optional(name, ty)
        }
    }
}

/// Descriptor a command is instantiated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSchema {
    /// snake_case command name, as called in turns
    pub name: String,
    pub kind: CommandKind,
    /// Slots in declaration order
    pub slots: Vec<SlotSchema>,
    /// Slot names that positional arguments map onto, in order
    #[serde(default)]
    pub positional: Vec<String>,
    #[serde(default)]
    pub confirmation_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommandSchema {
    pub fn new(name: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            name: name.into(),
            kind,
            slots: Vec::new(),
            positional: Vec::new(),
            confirmation_required: false,
            description: None,
        }
    }

    pub fn slot(mut self, slot: SlotSchema) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn positional(mut self, names: &[&str]) -> Self {
        self.positional = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_confirmation(mut self) -> Self {
        self.confirmation_required = true;
        self
    }

    pub fn find_slot(&self, name: &str) -> Option<&SlotSchema> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Names of slots that must be filled before the task may be performed
    pub fn required_slots(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|slot| slot.required)
            .map(|slot| slot.name.as_str())
    }

    /// `name(arg: type, ...)`
    pub fn signature(&self) -> String {
        let args: Vec<String> = self
            .slots
            .iter()
            .map(|slot| format!("{}: {}", slot.name, slot.ty))
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }

    /// The `find_<entity>` query over an entity
    pub fn query(entity: &EntitySchema) -> Self {
        let mut schema = CommandSchema::new(
            camel_to_snake_case(&format!("find_{}", entity.name)),
            CommandKind::Query {
                entity: entity.name.clone(),
            },
        )
        .slot(SlotSchema::optional("select", SlotType::Str));
        for (name, ty) in &entity.attributes {
            schema = schema.slot(SlotSchema::optional(name.clone(), ty.clone()));
        }
        schema.description = Some(format!(
            "Searches for existing {} in the database",
            entity.name
        ));
        schema
    }
}

/* ===================== Entity Schema ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    /// Attribute names and types in declaration order
    pub attributes: Vec<(String, SlotType)>,
}

impl EntitySchema {
    /// The entity stored by an intent: every argument of the intent plus a
    /// `date_of_<entity>` attribute
    pub fn from_intent(intent: &IntentSpec) -> Result<Self, SchemaError> {
        let name = intent
            .entity_name
            .clone()
            .ok_or_else(|| SchemaError::MissingEntityName(intent.command.clone()))?;

        let mut attributes = Vec::new();
        for (arg, spec) in intent.arg_specs()? {
            attributes.push((arg, SlotType::parse(&spec.ty)));
        }
        attributes.push((format!("date_of_{}", name), SlotType::Str));

        Ok(Self { name, attributes })
    }
}

/* ===================== JSON Descriptors ===================== */

/// One argument of an intent descriptor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArgSpec {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub values: Vec<JsonValue>,
    #[serde(default)]
    pub disambiguation: bool,
}

/// Intent descriptor as produced by the domain layer, e.g.
///
/// ```json
/// {
///   "command": "track_fitness_activity",
///   "args": {
///     "activity_type": {"type": "str", "optional": false, "disambiguation": true},
///     "duration": {"type": "int", "optional": false}
///   },
///   "confirmation_required": false,
///   "description": "track daily fitness activities"
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntentSpec {
    pub command: String,
    /// Argument descriptors keyed by name, in declaration order
    #[serde(default)]
    pub args: Map<String, JsonValue>,
    #[serde(default)]
    pub confirmation_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub query_intent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional: Vec<String>,
}

impl IntentSpec {
    /// Typed argument descriptors in declaration order
    pub fn arg_specs(&self) -> Result<Vec<(String, ArgSpec)>, SchemaError> {
        self.args
            .iter()
            .map(|(name, raw)| {
                let spec: ArgSpec =
                    serde_json::from_value(raw.clone()).map_err(|e| SchemaError::InvalidArg {
                        owner: self.command.clone(),
                        arg: name.clone(),
                        reason: e.to_string(),
                    })?;
                Ok((name.clone(), spec))
            })
            .collect()
    }

    pub fn to_schema(&self) -> Result<CommandSchema, SchemaError> {
        let mut schema = CommandSchema::new(camel_to_snake_case(&self.command), CommandKind::Intent);
        for (name, spec) in self.arg_specs()? {
            schema = schema.slot(SlotSchema {
                name,
                ty: SlotType::parse(&spec.ty),
                required: !spec.optional,
                values: spec.values,
                disambiguation: spec.disambiguation,
            });
        }

        for name in &self.positional {
            if schema.find_slot(name).is_none() {
                return Err(SchemaError::InvalidArg {
                    owner: self.command.clone(),
                    arg: name.clone(),
                    reason: "positional parameter is not a declared argument".to_string(),
                });
            }
        }
        schema.positional = self.positional.clone();
        schema.confirmation_required = self.confirmation_required;
        schema.description = self.description.clone();
        Ok(schema)
    }
}

/// Entity descriptor: `{"entity": "alarm", "attributes": {"time": {"type": "str"}}}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntitySpec {
    pub entity: String,
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

impl EntitySpec {
    pub fn to_schema(&self) -> Result<EntitySchema, SchemaError> {
        let attributes = self
            .attributes
            .iter()
            .map(|(name, raw)| {
                let ty = raw
                    .get("type")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| SchemaError::InvalidArg {
                        owner: self.entity.clone(),
                        arg: name.clone(),
                        reason: "missing \"type\"".to_string(),
                    })?;
                Ok((name.clone(), SlotType::parse(ty)))
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        Ok(EntitySchema {
            name: self.entity.clone(),
            attributes,
        })
    }
}

/// `SetTimer` -> `set_timer`, `HTTPServer` -> `http_server`
pub fn camel_to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary && prev != '_' {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_type_parse() {
        assert_eq!(SlotType::parse("str"), SlotType::Str);
        assert_eq!(SlotType::parse("Optional[int]"), SlotType::Int);
        assert_eq!(SlotType::parse("List[str]"), SlotType::List);
        assert_eq!(SlotType::parse("Contact"), SlotType::Object("Contact".to_string()));
    }

    #[test]
    fn test_slot_type_accepts() {
        assert!(SlotType::Float.accepts(&Value::Int(3)));
        assert!(SlotType::Str.accepts(&Value::None));
        assert!(!SlotType::Int.accepts(&Value::Str("3".into())));
        assert!(!SlotType::Bool.accepts(&Value::Int(1)));
    }

    #[test]
    fn test_camel_to_snake_case() {
        assert_eq!(camel_to_snake_case("SetTimer"), "set_timer");
        assert_eq!(camel_to_snake_case("set_timer"), "set_timer");
        assert_eq!(camel_to_snake_case("HTTPServer"), "http_server");
        assert_eq!(camel_to_snake_case("find_alarm"), "find_alarm");
    }

    #[test]
    fn test_intent_to_schema_keeps_argument_order() {
        let intent: IntentSpec = serde_json::from_value(json!({
            "command": "create_alarm",
            "args": {
                "time": {"type": "str", "optional": false},
                "label": {"type": "str", "optional": true},
                "repeat": {"type": "bool", "optional": false}
            },
            "confirmation_required": true
        }))
        .unwrap();

        let schema = intent.to_schema().unwrap();
        let names: Vec<_> = schema.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["time", "label", "repeat"]);
        assert_eq!(schema.required_slots().collect::<Vec<_>>(), vec!["time", "repeat"]);
        assert!(schema.confirmation_required);
        assert_eq!(schema.signature(), "create_alarm(time: str, label: str, repeat: bool)");
    }

    #[test]
    fn test_positional_must_name_an_argument() {
        let intent: IntentSpec = serde_json::from_value(json!({
            "command": "call_contact",
            "args": {"name": {"type": "str", "optional": false}},
            "positional": ["nickname"]
        }))
        .unwrap();

        assert!(matches!(
            intent.to_schema(),
            Err(SchemaError::InvalidArg { .. })
        ));
    }

    #[test]
    fn test_entity_from_intent_adds_date_attribute() {
        let intent: IntentSpec = serde_json::from_value(json!({
            "command": "create_alarm",
            "entity_name": "alarm",
            "args": {"time": {"type": "str"}, "label": {"type": "str"}}
        }))
        .unwrap();

        let entity = EntitySchema::from_intent(&intent).unwrap();
        assert_eq!(entity.name, "alarm");
        let names: Vec<_> = entity.attributes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["time", "label", "date_of_alarm"]);

        let query = CommandSchema::query(&entity);
        assert_eq!(query.name, "find_alarm");
        assert!(query.find_slot("select").is_some());
        assert_eq!(query.required_slots().count(), 0);
    }
}

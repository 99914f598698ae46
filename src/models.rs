use std::collections::HashMap;

use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};

// ---- Pack manifest schema ----

/// Semantic type a parameter or config attribute is declared with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// One declared parameter, either runner-level or action-level. The same
/// shape doubles as a config schema attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<ParamType>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    // Immutable params can only carry their declared default.
    #[serde(default)]
    pub immutable: bool,
    #[serde(default)]
    pub secret: bool,
}

/// An action manifest as it sits on disk under `<pack>/actions/<name>.json`.
/// The pack name is not part of the file; the loader fills it in from the
/// directory it found the manifest in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(default)]
    pub pack: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub runner_type: String,
    pub entry_point: String,
    #[serde(default)]
    pub parameters: HashMap<String, ParameterSpec>,
}

impl ActionDefinition {
    /// Dotted ref the action is registered under, e.g. `linux.wait`.
    pub fn action_ref(&self) -> String {
        format!("{}.{}", self.pack, self.name)
    }
}

/// A runner-type catalog entry. `driver` keys the factory table; `aliases`
/// resolve to the same definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerTypeDefinition {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub driver: String,
    #[serde(default)]
    pub runner_parameters: HashMap<String, ParameterSpec>,
}

/// Per-pack config schema: a closed set of attributes. At most one per pack,
/// and a pack may have none at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub pack: String,
    pub attributes: HashMap<String, ParameterSpec>,
}

/// Terminal state of one runner invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Timeout,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }
}

/// The three-part outcome of `Runner::run`: status, raw output, and an
/// opaque context blob that is passed through unexamined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: RunStatus,
    pub output: Value,
    pub context: Value,
}

/// What one invocation hands back to the caller. `output` is the raw runner
/// output; `result` is the output after the optional rendering pass (equal
/// to `output` when no template is configured).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub event: Value,
    pub live_params: Map<String, Value>,
    pub output: Value,
    pub result: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_type_serialization() {
        assert_eq!(serde_json::to_string(&ParamType::String).unwrap(), r#""string""#);
        assert_eq!(serde_json::to_string(&ParamType::Integer).unwrap(), r#""integer""#);

        let ty: ParamType = serde_json::from_str(r#""boolean""#).unwrap();
        assert_eq!(ty, ParamType::Boolean);
    }

    #[test]
    fn test_parameter_spec_defaults() {
        // A bare spec deserializes with every flag off and no type.
        let spec: ParameterSpec = serde_json::from_value(json!({})).unwrap();
        assert!(spec.ty.is_none());
        assert!(!spec.required);
        assert!(!spec.immutable);
        assert!(!spec.secret);
        assert!(spec.default.is_none());
    }

    #[test]
    fn test_parameter_spec_full() {
        let spec: ParameterSpec = serde_json::from_value(json!({
            "type": "integer",
            "description": "how many times to retry",
            "required": true,
            "default": 3,
            "immutable": true,
            "secret": false
        }))
        .unwrap();

        assert_eq!(spec.ty, Some(ParamType::Integer));
        assert!(spec.required);
        assert!(spec.immutable);
        assert_eq!(spec.default, Some(json!(3)));
    }

    #[test]
    fn test_action_definition_ref() {
        let action: ActionDefinition = serde_json::from_value(json!({
            "name": "wait",
            "runner_type": "local-shell",
            "entry_point": "wait.sh"
        }))
        .unwrap();

        let action = ActionDefinition { pack: "linux".to_string(), ..action };
        assert_eq!(action.action_ref(), "linux.wait");
        assert!(action.parameters.is_empty());
    }

    #[test]
    fn test_runner_type_round_trip() {
        let def = RunnerTypeDefinition {
            name: "local-shell".to_string(),
            aliases: vec!["shell".to_string()],
            description: String::new(),
            driver: "shell".to_string(),
            runner_parameters: HashMap::new(),
        };

        let json = serde_json::to_string(&def).unwrap();
        let deserialized: RunnerTypeDefinition = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.name, def.name);
        assert_eq!(deserialized.aliases, def.aliases);
        assert_eq!(deserialized.driver, def.driver);
    }

    #[test]
    fn test_run_status_serialization() {
        assert_eq!(serde_json::to_string(&RunStatus::Succeeded).unwrap(), r#""succeeded""#);
        assert_eq!(serde_json::to_string(&RunStatus::Failed).unwrap(), r#""failed""#);
        assert!(RunStatus::Succeeded.is_success());
        assert!(!RunStatus::Failed.is_success());
    }

    #[test]
    fn test_response_envelope_shape() {
        let envelope = ResponseEnvelope {
            event: json!({"body": {"name": "world"}}),
            live_params: Map::new(),
            output: json!({"stdout": "done"}),
            result: json!({"message": "done"}),
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("event").is_some());
        assert!(value.get("live_params").is_some());
        assert!(value.get("output").is_some());
        assert!(value.get("result").is_some());
    }
}

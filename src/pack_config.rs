use serde_json::{Map, Value};

use crate::errors::ConfigError;
use crate::models::{ConfigSchema, ParamType};

/// Validates a caller-supplied config object against a pack's config schema
/// and returns a copy with defaults applied for any unspecified-but-defaulted
/// attribute. The declared attribute set is closed: anything not in the
/// schema is rejected. Config values are checked strictly, never coerced.
pub fn validate_config_against_schema(
    schema: &ConfigSchema,
    config: &Map<String, Value>,
) -> Result<Map<String, Value>, ConfigError> {
    for name in config.keys() {
        if !schema.attributes.contains_key(name) {
            return Err(ConfigError::UndeclaredAttribute {
                pack: schema.pack.clone(),
                name: name.clone(),
            });
        }
    }

    let mut validated = config.clone();

    for (name, spec) in &schema.attributes {
        match validated.get(name) {
            Some(value) => {
                if let Some(ty) = spec.ty {
                    if !type_matches(value, ty) {
                        return Err(ConfigError::TypeMismatch {
                            pack: schema.pack.clone(),
                            name: name.clone(),
                            expected: ty.as_str(),
                        });
                    }
                }
            }
            None => {
                if let Some(default) = &spec.default {
                    validated.insert(name.clone(), default.clone());
                } else if spec.required {
                    return Err(ConfigError::MissingAttribute {
                        pack: schema.pack.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
    }

    Ok(validated)
}

fn type_matches(value: &Value, ty: ParamType) -> bool {
    match ty {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
    }
}

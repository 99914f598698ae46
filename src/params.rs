use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::context::ResolutionContext;
use crate::errors::ParamError;
use crate::models::{ParamType, ParameterSpec};

// Matches {{ input.body.name }} style references.
fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_\.\[\]-]*)\s*\}\}")
            .expect("template pattern compiles")
    })
}

/// Merges runner-level and action-level specs into one mapping. Action-level
/// entries win over runner-level entries of the same name unless the
/// runner-level spec is immutable.
pub fn merge_specs(
    runner_specs: &HashMap<String, ParameterSpec>,
    action_specs: &HashMap<String, ParameterSpec>,
) -> BTreeMap<String, ParameterSpec> {
    let mut merged: BTreeMap<String, ParameterSpec> = runner_specs
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for (name, spec) in action_specs {
        let locked = runner_specs.get(name).map(|s| s.immutable).unwrap_or(false);
        if !locked {
            merged.insert(name.clone(), spec.clone());
        }
    }

    merged
}

// Renders one declared value against the context. Err carries the first
// unresolved reference path; the caller decides whether that is fatal.
fn render_value(value: &Value, ctx: &ResolutionContext) -> Result<Value, String> {
    match value {
        Value::String(s) => render_string(s, ctx),
        Value::Object(obj) => {
            let mut rendered = Map::new();
            for (key, val) in obj {
                rendered.insert(key.clone(), render_value(val, ctx)?);
            }
            Ok(Value::Object(rendered))
        }
        Value::Array(arr) => {
            let mut rendered = Vec::new();
            for item in arr {
                rendered.push(render_value(item, ctx)?);
            }
            Ok(Value::Array(rendered))
        }
        other => Ok(other.clone()),
    }
}

fn render_string(s: &str, ctx: &ResolutionContext) -> Result<Value, String> {
    let re = template_re();

    // A string that is exactly one expression resolves to the referenced
    // value itself, preserving its type.
    if let Some(cap) = re.captures(s.trim()) {
        if let Some(m) = cap.get(0) {
            if m.as_str() == s.trim() {
                let path = &cap[1];
                return ctx.lookup(path).ok_or_else(|| path.to_string());
            }
        }
    }

    // Embedded expressions stringify their resolutions in place.
    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        let path = &cap[1];
        let resolved = ctx.lookup(path).ok_or_else(|| path.to_string())?;
        let replacement = match resolved {
            Value::String(v) => v,
            other => other.to_string(),
        };
        result = result.replace(&cap[0], &replacement);
    }

    Ok(Value::String(result))
}

/// Phase one: merge caller-supplied values with resolved defaults into one
/// flat mapping, prior to coercion and splitting by owner.
///
/// Caller values are template-rendered against the context (this is what
/// makes output-rendering templates work). Declared defaults fill the gaps.
/// An unresolved reference yields absence rather than failure unless the
/// spec is required. Immutable specs reject any caller value that differs
/// from their declared default.
pub fn render_live_params(
    runner_specs: &HashMap<String, ParameterSpec>,
    action_specs: &HashMap<String, ParameterSpec>,
    raw_params: &Map<String, Value>,
    ctx: &ResolutionContext,
) -> Result<Map<String, Value>, ParamError> {
    let merged = merge_specs(runner_specs, action_specs);
    let mut live = Map::new();

    for (name, value) in raw_params {
        match render_value(value, ctx) {
            Ok(v) => {
                live.insert(name.clone(), v);
            }
            Err(path) => {
                let required = merged.get(name).map(|s| s.required).unwrap_or(false);
                if required {
                    return Err(ParamError::UnresolvedReference { name: name.clone(), path });
                }
            }
        }
    }

    for (name, spec) in &merged {
        if !spec.immutable || !raw_params.contains_key(name) {
            continue;
        }
        let declared = match &spec.default {
            Some(d) => render_value(d, ctx).ok(),
            None => None,
        };
        if live.get(name) != declared.as_ref() {
            return Err(ParamError::ImmutableOverride(name.clone()));
        }
    }

    for (name, spec) in &merged {
        if live.contains_key(name) {
            continue;
        }
        let Some(default) = &spec.default else { continue };
        match render_value(default, ctx) {
            Ok(v) => {
                live.insert(name.clone(), v);
            }
            Err(path) => {
                if spec.required {
                    return Err(ParamError::UnresolvedReference { name: name.clone(), path });
                }
            }
        }
    }

    Ok(live)
}

/// Phase two: coerce live values to their declared types and split them into
/// the runner-level and action-level mappings. Names in the runner schema go
/// to the runner; everything else, declared or not, rides with the action.
pub fn render_final_params(
    runner_specs: &HashMap<String, ParameterSpec>,
    action_specs: &HashMap<String, ParameterSpec>,
    live_params: &Map<String, Value>,
) -> Result<(Map<String, Value>, Map<String, Value>), ParamError> {
    let merged = merge_specs(runner_specs, action_specs);

    let mut runner_params = Map::new();
    let mut action_params = Map::new();

    for (name, value) in live_params {
        let coerced = match merged.get(name).and_then(|s| s.ty) {
            Some(ty) => coerce(name, value, ty)?,
            None => value.clone(),
        };
        if runner_specs.contains_key(name) {
            runner_params.insert(name.clone(), coerced);
        } else {
            action_params.insert(name.clone(), coerced);
        }
    }

    for (name, spec) in &merged {
        if spec.required && !live_params.contains_key(name) {
            return Err(ParamError::MissingRequired(name.clone()));
        }
    }

    Ok((runner_params, action_params))
}

/// The output-rendering pass: renders a template mapping against an
/// input+output context with the same unresolved-means-absent semantics,
/// but with no parameter schemas in play, so no defaults leak into the
/// rendered result and nothing is coerced.
pub fn render_output_values(
    template: &Map<String, Value>,
    ctx: &ResolutionContext,
) -> Result<Map<String, Value>, ParamError> {
    render_live_params(&HashMap::new(), &HashMap::new(), template, ctx)
}

/// Coerces a live value to its declared semantic type. Strings are parsed
/// into the scalar types and JSON-decoded for array/object; anything else of
/// the wrong shape is a hard type mismatch.
pub fn coerce(name: &str, value: &Value, ty: ParamType) -> Result<Value, ParamError> {
    let mismatch = || ParamError::TypeMismatch {
        name: name.to_string(),
        value: value.to_string(),
        expected: ty.as_str(),
    };

    // Explicit null passes through; requiredness is about absence.
    if value.is_null() {
        return Ok(Value::Null);
    }

    match ty {
        ParamType::String => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        ParamType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(Value::from(f as i64)),
                _ => Err(mismatch()),
            },
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamType::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ParamType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamType::Array => match value {
            Value::Array(_) => Ok(value.clone()),
            Value::String(s) => serde_json::from_str::<Value>(s)
                .ok()
                .filter(|v| v.is_array())
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ParamType::Object => match value {
            Value::Object(_) => Ok(value.clone()),
            Value::String(s) => serde_json::from_str::<Value>(s)
                .ok()
                .filter(|v| v.is_object())
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
    }
}

/// Masks secret-flagged values before a parameter mapping hits the logs.
/// The original never redacted; nothing functional may depend on this.
pub fn redact_params(
    runner_specs: &HashMap<String, ParameterSpec>,
    action_specs: &HashMap<String, ParameterSpec>,
    params: &Map<String, Value>,
) -> Map<String, Value> {
    let merged = merge_specs(runner_specs, action_specs);

    params
        .iter()
        .map(|(name, value)| {
            if merged.get(name).map(|s| s.secret).unwrap_or(false) {
                (name.clone(), Value::String("********".to_string()))
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

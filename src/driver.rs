use std::path::Path;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::context::ResolutionContext;
use crate::errors::ActionRunnerError;
use crate::event::normalize_event;
use crate::models::{ExecutionResult, ResponseEnvelope};
use crate::pack_config::validate_config_against_schema;
use crate::params::{redact_params, render_final_params, render_live_params, render_output_values};
use crate::registry::SchemaRegistry;
use crate::runners::{build_instance, passthrough::PassthroughRunner, Runner, RunnerRegistry};

/// Caller-side selectors for one invocation: which action to run, optional
/// raw params/config/output-template objects, and the passthrough/debug
/// flags. The CLI fills this from flags and `PACKLIFT_*` env vars.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub action: String,
    pub params: Option<Value>,
    pub config: Option<Value>,
    pub output_template: Option<Value>,
    pub passthrough: bool,
    pub debug: bool,
}

/// Drives one event through the whole pipeline: normalize, look up the
/// action and its runner type, validate config, resolve parameters, run the
/// runner lifecycle, optionally re-render the output, and assemble the
/// response envelope.
///
/// Resolution and validation failures are collapsed into a single
/// `ActionRunnerError` here so the caller sees one error shape no matter
/// which phase broke. Runner `pre_run`/`run` failures propagate unchanged;
/// their semantics are runner-specific and not ours to mask.
pub async fn run_invocation(
    registry: &SchemaRegistry,
    drivers: &RunnerRegistry,
    content_root: &Path,
    event: Value,
    invocation: &Invocation,
) -> Result<ResponseEnvelope> {
    let event = normalize_event(event)?;
    info!("received event: {}", serde_json::to_string(&event)?);

    let action = registry.action(&invocation.action)?;
    let runner_type = registry.runner_type(&action.runner_type)?;

    let mut runner: Box<dyn Runner + Send> = if invocation.passthrough {
        Box::new(PassthroughRunner::new())
    } else {
        drivers.resolve(&runner_type.driver)?
    };

    // Pack config rides on the instance only after it validated.
    let config = match (registry.config_schema(&action.pack), &invocation.config) {
        (Some(schema), Some(raw)) => {
            let raw = raw
                .as_object()
                .ok_or_else(|| anyhow!("config must be a JSON object"))?;
            Some(validate_config_against_schema(schema, raw).map_err(ActionRunnerError::from)?)
        }
        _ => None,
    };

    let ctx = ResolutionContext::with_input(event.clone());

    let mut live_params = match &invocation.params {
        Some(raw) => {
            let raw = raw
                .as_object()
                .ok_or_else(|| anyhow!("params must be a JSON object"))?;
            render_live_params(&runner_type.runner_parameters, &action.parameters, raw, &ctx)
                .map_err(ActionRunnerError::from)?
        }
        // No caller params: the event itself is the live mapping.
        None => event.as_object().cloned().unwrap_or_default(),
    };

    if invocation.debug && !live_params.contains_key("log_level") {
        live_params.insert("log_level".to_string(), Value::String("DEBUG".to_string()));
    }

    let (runner_params, action_params) =
        render_final_params(&runner_type.runner_parameters, &action.parameters, &live_params)
            .map_err(ActionRunnerError::from)?;

    debug!(
        "resolved runner parameters: {}",
        serde_json::Value::Object(redact_params(
            &runner_type.runner_parameters,
            &action.parameters,
            &runner_params
        ))
    );
    debug!(
        "resolved action parameters: {}",
        serde_json::Value::Object(redact_params(
            &runner_type.runner_parameters,
            &action.parameters,
            &action_params
        ))
    );

    let instance = build_instance(content_root, action, runner_type, runner_params, config);

    debug!("performing pre-run for runner {}", instance.runner_id);
    runner.pre_run(&instance).await?;

    // The result context is opaque and handed through unexamined.
    let ExecutionResult { status, output, .. } = runner.run(&instance, action_params).await?;
    debug!("runner {} finished with status {:?}", instance.runner_id, status);

    let result = match &invocation.output_template {
        Some(template) => {
            let template = template
                .as_object()
                .ok_or_else(|| anyhow!("output template must be a JSON object"))?;
            let mut octx = ResolutionContext::with_input(event.clone());
            octx.push("output", output.clone());
            render_output_values(template, &octx)
                .map(Value::Object)
                .map_err(ActionRunnerError::from)?
        }
        None => output.clone(),
    };

    // The envelope always carries an object for output, and captured action
    // logs are surfaced through our own channel so they show up in the
    // surrounding infrastructure logs.
    let output = if output.is_null() { json!({}) } else { output };

    if let Some(stdout) = output.get("stdout").and_then(|v| v.as_str()) {
        if !stdout.is_empty() {
            info!("action stdout: {}", stdout);
        }
    }
    if let Some(stderr) = output.get("stderr").and_then(|v| v.as_str()) {
        if !stderr.is_empty() {
            info!("action stderr and logs: {}", stderr);
        }
    }

    Ok(ResponseEnvelope { event, live_params, output, result })
}

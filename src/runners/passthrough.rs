use anyhow::Result;
use serde_json::{Map, Value};

use super::{Runner, RunnerInstance};
use crate::models::{ExecutionResult, RunStatus};

/// Echoes its action parameters back as the output with a fixed success
/// status. Selected by a caller flag for bypass and testing flows, never by
/// runner-type name.
pub struct PassthroughRunner;

impl PassthroughRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PassthroughRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Runner for PassthroughRunner {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn run(
        &mut self,
        _instance: &RunnerInstance,
        action_params: Map<String, Value>,
    ) -> Result<ExecutionResult> {
        Ok(ExecutionResult {
            status: RunStatus::Succeeded,
            output: Value::Object(action_params),
            context: Value::Null,
        })
    }
}

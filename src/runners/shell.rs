use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;
use which::which;

use super::{Runner, RunnerInstance};
use crate::models::{ExecutionResult, RunStatus};

/// Runs the action's entry point as a local process: the interpreter from
/// the runner params gets the entry point as its argument, the action params
/// arrive as one JSON document on stdin, and stdout/stderr are captured into
/// the output. The last stdout line that parses as JSON becomes the
/// structured `result` field.
///
/// No timeout is enforced here; a hung entry point is the hosting
/// environment's problem.
pub struct ShellRunner {
    interpreter: Option<PathBuf>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self { interpreter: None }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Runner for ShellRunner {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn pre_run(&mut self, instance: &RunnerInstance) -> Result<()> {
        let interpreter = instance
            .runner_parameters
            .get("interpreter")
            .and_then(|v| v.as_str())
            .unwrap_or("sh");

        let resolved = which(interpreter)
            .map_err(|_| anyhow!("'{}' not found in PATH", interpreter))?;
        debug!("shell runner {} using interpreter {:?}", instance.runner_id, resolved);
        self.interpreter = Some(resolved);
        Ok(())
    }

    async fn run(
        &mut self,
        instance: &RunnerInstance,
        action_params: Map<String, Value>,
    ) -> Result<ExecutionResult> {
        let Some(interpreter) = self.interpreter.clone() else {
            bail!("shell runner was not prepared; pre_run must happen first");
        };

        let mut cmd = Command::new(interpreter);
        cmd.arg(&instance.entry_point);

        if let Some(cwd) = instance.runner_parameters.get("cwd").and_then(|v| v.as_str()) {
            cmd.current_dir(cwd);
        }
        if let Some(env) = instance.runner_parameters.get("env").and_then(|v| v.as_object()) {
            for (key, value) in env {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                cmd.env(key, value);
            }
        }
        cmd.env("PACKLIFT_LIBS_DIR", &instance.libs_dir);
        if let Some(config) = &instance.config {
            cmd.env("PACKLIFT_CONFIG", serde_json::to_string(config)?);
        }

        let input_json = serde_json::to_string(&Value::Object(action_params))?;

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                anyhow!("failed to spawn entry point {:?}: {}", instance.entry_point, e)
            })?;

        // Feed the params document and close stdin so the child sees EOF.
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(input_json.as_bytes()).await?;
        }
        drop(child.stdin.take());

        let stdout = child.stdout.take().ok_or_else(|| anyhow!("child stdout unavailable"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("child stderr unavailable"))?;

        let pump_out = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut collected = String::new();
            let mut structured = Value::Null;
            let mut line = String::new();
            while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                if let Ok(v) = serde_json::from_str::<Value>(line.trim()) {
                    structured = v;
                }
                collected.push_str(&line);
                line.clear();
            }
            (collected, structured)
        });

        let pump_err = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut collected = String::new();
            let mut line = String::new();
            while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                collected.push_str(&line);
                line.clear();
            }
            collected
        });

        let exit = child.wait().await?;
        let (stdout_text, structured) = pump_out.await.unwrap_or_default();
        let stderr_text = pump_err.await.unwrap_or_default();

        let status = if exit.success() { RunStatus::Succeeded } else { RunStatus::Failed };
        let output = json!({
            "stdout": stdout_text,
            "stderr": stderr_text,
            "exit_code": exit.code().unwrap_or(-1),
            "result": structured,
        });

        Ok(ExecutionResult { status, output, context: Value::Null })
    }
}

pub mod http;
pub mod passthrough;
pub mod shell;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::errors::DispatchError;
use crate::models::{ActionDefinition, ExecutionResult, RunnerTypeDefinition};

/// Per-invocation execution context a runner is handed. Created fresh by the
/// dispatcher, owned by the invocation, discarded after the call.
#[derive(Debug, Clone)]
pub struct RunnerInstance {
    pub runner_id: String,
    pub action: ActionDefinition,
    pub action_name: String,
    pub runner_type: RunnerTypeDefinition,
    /// content root + pack + actions/ + relative entry point. A pure path
    /// join; nothing here touches the filesystem.
    pub entry_point: PathBuf,
    pub libs_dir: PathBuf,
    pub runner_parameters: Map<String, Value>,
    pub config: Option<Map<String, Value>>,
    pub context: Value,
    /// Always false here; isolation belongs to the deployment environment.
    pub sandbox: bool,
}

/// The uniform contract every execution mechanism implements. `pre_run` may
/// refuse to start; `run` produces the three-part result. Errors out of
/// either are runner-specific and propagate unchanged.
#[async_trait::async_trait]
pub trait Runner: Send {
    fn name(&self) -> &'static str;

    async fn pre_run(&mut self, _instance: &RunnerInstance) -> Result<()> {
        Ok(())
    }

    async fn run(
        &mut self,
        instance: &RunnerInstance,
        action_params: Map<String, Value>,
    ) -> Result<ExecutionResult>;
}

pub type RunnerFactory = fn() -> Box<dyn Runner + Send>;

/// Static driver table populated at initialization. Unknown names fail fast;
/// there is no dynamic discovery.
pub struct RunnerRegistry {
    drivers: HashMap<&'static str, RunnerFactory>,
}

impl RunnerRegistry {
    pub fn builtin() -> Self {
        let mut drivers: HashMap<&'static str, RunnerFactory> = HashMap::new();
        drivers.insert("shell", || Box::new(shell::ShellRunner::new()));
        drivers.insert("http", || Box::new(http::HttpRunner::new()));
        Self { drivers }
    }

    pub fn resolve(&self, driver: &str) -> Result<Box<dyn Runner + Send>, DispatchError> {
        self.drivers
            .get(driver)
            .map(|factory| factory())
            .ok_or_else(|| DispatchError::RunnerNotFound(driver.to_string()))
    }

    pub fn driver_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.drivers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Builds the per-invocation instance the driver hands to the runner.
pub fn build_instance(
    content_root: &Path,
    action: &ActionDefinition,
    runner_type: &RunnerTypeDefinition,
    runner_parameters: Map<String, Value>,
    config: Option<Map<String, Value>>,
) -> RunnerInstance {
    let actions_dir = content_root.join(&action.pack).join("actions");

    RunnerInstance {
        runner_id: uuid::Uuid::new_v4().to_string(),
        action: action.clone(),
        action_name: action.name.clone(),
        runner_type: runner_type.clone(),
        entry_point: actions_dir.join(&action.entry_point),
        libs_dir: actions_dir.join("lib"),
        runner_parameters,
        config,
        context: json!({}),
        sandbox: false,
    }
}

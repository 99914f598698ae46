use std::collections::HashMap;

use crate::errors::DispatchError;
use crate::models::{ActionDefinition, ConfigSchema, RunnerTypeDefinition};

/// Everything the loader produced, held in memory for the life of the
/// process. Built once at cold start, read-only afterwards; invocations
/// borrow it and never mutate it, so a warm process can serve repeated
/// invocations without synchronization.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    actions: HashMap<String, ActionDefinition>,
    runner_types: HashMap<String, RunnerTypeDefinition>,
    // alias or canonical name -> canonical name
    runner_index: HashMap<String, String>,
    config_schemas: HashMap<String, ConfigSchema>,
}

impl SchemaRegistry {
    pub fn new(
        actions: HashMap<String, ActionDefinition>,
        runner_types: Vec<RunnerTypeDefinition>,
        config_schemas: HashMap<String, ConfigSchema>,
    ) -> Self {
        let mut index = HashMap::new();
        let mut by_name = HashMap::new();

        for def in runner_types {
            index.insert(def.name.clone(), def.name.clone());
            for alias in &def.aliases {
                index.insert(alias.clone(), def.name.clone());
            }
            by_name.insert(def.name.clone(), def);
        }

        Self { actions, runner_types: by_name, runner_index: index, config_schemas }
    }

    pub fn action(&self, action_ref: &str) -> Result<&ActionDefinition, DispatchError> {
        self.actions
            .get(action_ref)
            .ok_or_else(|| DispatchError::ActionNotFound(action_ref.to_string()))
    }

    /// Resolves a runner-type name or alias to its definition.
    pub fn runner_type(&self, name: &str) -> Result<&RunnerTypeDefinition, DispatchError> {
        self.runner_index
            .get(name)
            .and_then(|canonical| self.runner_types.get(canonical))
            .ok_or_else(|| DispatchError::RunnerNotFound(name.to_string()))
    }

    /// Config schemas are optional; a pack without one returns `None`.
    pub fn config_schema(&self, pack: &str) -> Option<&ConfigSchema> {
        self.config_schemas.get(pack)
    }

    pub fn action_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        refs.sort_unstable();
        refs
    }

    pub fn runner_type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.runner_types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DispatchError;

    fn sample_registry() -> SchemaRegistry {
        let action = ActionDefinition {
            pack: "linux".to_string(),
            name: "wait".to_string(),
            description: String::new(),
            runner_type: "local-shell".to_string(),
            entry_point: "wait.sh".to_string(),
            parameters: HashMap::new(),
        };
        let runner = RunnerTypeDefinition {
            name: "local-shell".to_string(),
            aliases: vec!["shell".to_string()],
            description: String::new(),
            driver: "shell".to_string(),
            runner_parameters: HashMap::new(),
        };

        let mut actions = HashMap::new();
        actions.insert(action.action_ref(), action);
        SchemaRegistry::new(actions, vec![runner], HashMap::new())
    }

    #[test]
    fn test_action_lookup() {
        let registry = sample_registry();
        assert_eq!(registry.action("linux.wait").unwrap().entry_point, "wait.sh");

        let err = registry.action("linux.nope").unwrap_err();
        assert_eq!(err, DispatchError::ActionNotFound("linux.nope".to_string()));
    }

    #[test]
    fn test_runner_type_lookup_by_name_and_alias() {
        let registry = sample_registry();
        assert_eq!(registry.runner_type("local-shell").unwrap().driver, "shell");
        assert_eq!(registry.runner_type("shell").unwrap().name, "local-shell");

        let err = registry.runner_type("doesnotexist").unwrap_err();
        assert_eq!(err, DispatchError::RunnerNotFound("doesnotexist".to_string()));
    }

    #[test]
    fn test_config_schema_is_optional() {
        let registry = sample_registry();
        assert!(registry.config_schema("linux").is_none());
    }

    #[test]
    fn test_listing_is_sorted() {
        let registry = sample_registry();
        assert_eq!(registry.action_refs(), vec!["linux.wait"]);
        assert_eq!(registry.runner_type_names(), vec!["local-shell"]);
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::json;

use crate::models::{
    ActionDefinition, ConfigSchema, ParamType, ParameterSpec, RunnerTypeDefinition,
};

const CONFIG_SCHEMA_FILE_NAME: &str = "config.schema.json";

/// Scans a content root where every subdirectory is a pack:
///
/// ```text
/// packs/
///   linux/
///     actions/wait.json
///     config.schema.json   (optional)
/// ```
///
/// Any malformed manifest is fatal; the registry is built once at cold start
/// and a half-loaded catalog is worse than no process at all.
pub struct ContentLoader {
    root: PathBuf,
}

impl ContentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `PACKLIFT_PACKS_DIR`, then `./packs`, then the per-user data dir.
    pub fn default_root() -> PathBuf {
        if let Ok(dir) = std::env::var("PACKLIFT_PACKS_DIR") {
            return PathBuf::from(dir);
        }
        let local = PathBuf::from("packs");
        if local.is_dir() {
            return local;
        }
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("packlift/packs")
    }

    pub fn load_actions(&self) -> Result<HashMap<String, ActionDefinition>> {
        let mut actions = HashMap::new();

        for pack_dir in self.pack_dirs()? {
            let pack_name = dir_name(&pack_dir);
            let actions_dir = pack_dir.join("actions");
            if !actions_dir.is_dir() {
                continue;
            }

            let entries = fs::read_dir(&actions_dir)
                .with_context(|| format!("reading actions dir '{}'", actions_dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                let txt = fs::read_to_string(&path)
                    .with_context(|| format!("reading action manifest '{}'", path.display()))?;
                let mut action: ActionDefinition = serde_json::from_str(&txt)
                    .with_context(|| format!("parsing action manifest '{}'", path.display()))?;
                action.pack = pack_name.clone();

                if action.entry_point.is_empty() {
                    bail!("action manifest '{}' has an empty entry_point", path.display());
                }
                if action.runner_type.is_empty() {
                    bail!("action manifest '{}' has an empty runner_type", path.display());
                }

                actions.insert(action.action_ref(), action);
            }
        }

        Ok(actions)
    }

    pub fn load_config_schemas(&self) -> Result<HashMap<String, ConfigSchema>> {
        let mut schemas = HashMap::new();

        for pack_dir in self.pack_dirs()? {
            let pack_name = dir_name(&pack_dir);
            let path = pack_dir.join(CONFIG_SCHEMA_FILE_NAME);
            // Config schema is optional.
            if !path.is_file() {
                continue;
            }

            let txt = fs::read_to_string(&path)
                .with_context(|| format!("reading config schema '{}'", path.display()))?;
            let attributes: HashMap<String, ParameterSpec> = serde_json::from_str(&txt)
                .with_context(|| format!("parsing config schema '{}'", path.display()))?;

            if attributes.is_empty() {
                bail!("config schema '{}' is empty and invalid", path.display());
            }

            schemas.insert(pack_name.clone(), ConfigSchema { pack: pack_name, attributes });
        }

        Ok(schemas)
    }

    /// Runner types come from the built-in catalog, not from disk: the set of
    /// registered drivers is closed at startup.
    pub fn load_runner_types(&self) -> Vec<RunnerTypeDefinition> {
        builtin_runner_types()
    }

    fn pack_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            bail!("packs directory '{}' does not exist", self.root.display());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("reading packs directory '{}'", self.root.display()))?
        {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string()
}

fn param(ty: ParamType, description: &str) -> ParameterSpec {
    ParameterSpec { ty: Some(ty), description: description.to_string(), ..Default::default() }
}

/// The closed catalog of runner types the process registers at startup.
pub fn builtin_runner_types() -> Vec<RunnerTypeDefinition> {
    let mut shell_params = HashMap::new();
    shell_params.insert(
        "interpreter".to_string(),
        ParameterSpec {
            default: Some(json!("sh")),
            ..param(ParamType::String, "interpreter the entry point is fed to")
        },
    );
    shell_params.insert("cwd".to_string(), param(ParamType::String, "working directory"));
    shell_params.insert(
        "env".to_string(),
        param(ParamType::Object, "extra environment variables for the process"),
    );
    shell_params.insert(
        "log_level".to_string(),
        ParameterSpec { default: Some(json!("INFO")), ..param(ParamType::String, "runner log level") },
    );

    let mut http_params = HashMap::new();
    http_params.insert(
        "url".to_string(),
        ParameterSpec { required: true, ..param(ParamType::String, "request URL") },
    );
    http_params.insert(
        "method".to_string(),
        ParameterSpec { default: Some(json!("GET")), ..param(ParamType::String, "HTTP method") },
    );
    http_params.insert("headers".to_string(), param(ParamType::Object, "request headers"));
    http_params.insert(
        "log_level".to_string(),
        ParameterSpec { default: Some(json!("INFO")), ..param(ParamType::String, "runner log level") },
    );

    vec![
        RunnerTypeDefinition {
            name: "local-shell".to_string(),
            aliases: vec!["shell".to_string(), "run-local".to_string()],
            description: "runs the entry point as a local process".to_string(),
            driver: "shell".to_string(),
            runner_parameters: shell_params,
        },
        RunnerTypeDefinition {
            name: "http-request".to_string(),
            aliases: vec!["http".to_string()],
            description: "drives an HTTP request from runner parameters".to_string(),
            driver: "http".to_string(),
            runner_parameters: http_params,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_actions_from_pack_tree() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("linux/actions/wait.json"),
            r#"{
                "name": "wait",
                "runner_type": "local-shell",
                "entry_point": "wait.sh",
                "parameters": {"seconds": {"type": "integer", "default": 1}}
            }"#,
        );
        write(&dir.path().join("linux/actions/notes.txt"), "not a manifest");

        let loader = ContentLoader::new(dir.path());
        let actions = loader.load_actions().unwrap();

        assert_eq!(actions.len(), 1);
        let action = &actions["linux.wait"];
        assert_eq!(action.pack, "linux");
        assert_eq!(action.entry_point, "wait.sh");
        assert!(action.parameters.contains_key("seconds"));
    }

    #[test]
    fn test_malformed_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("linux/actions/broken.json"), "{ not json");

        let loader = ContentLoader::new(dir.path());
        let err = loader.load_actions().unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_manifest_missing_entry_point_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("linux/actions/bad.json"),
            r#"{"name": "bad", "runner_type": "local-shell", "entry_point": ""}"#,
        );

        let loader = ContentLoader::new(dir.path());
        assert!(loader.load_actions().is_err());
    }

    #[test]
    fn test_config_schema_optional_but_never_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("mail/actions/send.json"),
            r#"{"name": "send", "runner_type": "local-shell", "entry_point": "send.sh"}"#,
        );
        write(
            &dir.path().join("mail/config.schema.json"),
            r#"{"host": {"type": "string", "default": "smtp.example.com"}}"#,
        );
        write(
            &dir.path().join("linux/actions/wait.json"),
            r#"{"name": "wait", "runner_type": "local-shell", "entry_point": "wait.sh"}"#,
        );

        let loader = ContentLoader::new(dir.path());
        let schemas = loader.load_config_schemas().unwrap();

        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas["mail"].pack, "mail");

        // An empty schema file is not "no schema", it is broken content.
        write(&dir.path().join("linux").join(CONFIG_SCHEMA_FILE_NAME), "{}");
        let err = loader.load_config_schemas().unwrap_err();
        assert!(err.to_string().contains("empty and invalid"));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let loader = ContentLoader::new("/definitely/not/a/real/packs/dir");
        assert!(loader.load_actions().is_err());
    }

    #[test]
    fn test_builtin_catalog() {
        let types = builtin_runner_types();
        assert_eq!(types.len(), 2);

        let shell = types.iter().find(|t| t.name == "local-shell").unwrap();
        assert_eq!(shell.driver, "shell");
        assert!(shell.aliases.contains(&"shell".to_string()));
        assert!(shell.runner_parameters.contains_key("cwd"));

        let http = types.iter().find(|t| t.name == "http-request").unwrap();
        assert_eq!(http.driver, "http");
        assert!(http.runner_parameters["url"].required);
    }
}

use thiserror::Error;

/// Everything that can go wrong while resolving parameters. Carries the spec
/// name so callers can report which parameter broke.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParamError {
    #[error("required parameter '{0}' has no value")]
    MissingRequired(String),

    #[error("parameter '{name}': cannot coerce {value} to {expected}")]
    TypeMismatch {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("parameter '{0}' is immutable and cannot be overridden")]
    ImmutableOverride(String),

    #[error("parameter '{name}': unresolved reference '{path}'")]
    UnresolvedReference { name: String, path: String },
}

/// Pack config object does not satisfy the pack's config schema.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("pack '{pack}': required config attribute '{name}' is missing")]
    MissingAttribute { pack: String, name: String },

    #[error("pack '{pack}': config attribute '{name}' is not a {expected}")]
    TypeMismatch {
        pack: String,
        name: String,
        expected: &'static str,
    },

    #[error("pack '{pack}': config attribute '{name}' is not declared in the schema")]
    UndeclaredAttribute { pack: String, name: String },
}

/// Static misconfiguration: the name the caller asked for is not registered.
/// Never retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("no action named '{0}' has been installed")]
    ActionNotFound(String),

    #[error("no runner registered for type '{0}'")]
    RunnerNotFound(String),
}

/// The single error shape resolution and validation failures are collapsed
/// into at the driver boundary, so callers see one kind of failure no matter
/// which phase broke. Runner execution errors are never wrapped in this.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("action runner failed: {message}")]
pub struct ActionRunnerError {
    pub message: String,
}

impl From<ParamError> for ActionRunnerError {
    fn from(e: ParamError) -> Self {
        ActionRunnerError { message: e.to_string() }
    }
}

impl From<ConfigError> for ActionRunnerError {
    fn from(e: ConfigError) -> Self {
        ActionRunnerError { message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_error_names_the_spec() {
        let err = ParamError::MissingRequired("name".to_string());
        assert!(err.to_string().contains("'name'"));

        let err = ParamError::TypeMismatch {
            name: "count".to_string(),
            value: "\"abc\"".to_string(),
            expected: "integer",
        };
        assert!(err.to_string().contains("'count'"));
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn test_action_runner_error_carries_cause() {
        let cause = ParamError::ImmutableOverride("sudo".to_string());
        let wrapped = ActionRunnerError::from(cause.clone());
        assert!(wrapped.to_string().contains(&cause.to_string()));
    }

    #[test]
    fn test_dispatch_error_messages() {
        let err = DispatchError::RunnerNotFound("doesnotexist".to_string());
        assert_eq!(err.to_string(), "no runner registered for type 'doesnotexist'");
    }
}

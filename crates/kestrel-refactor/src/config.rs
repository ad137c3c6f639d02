use kestrel_syntax::{validate_identifier, IdentifierError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::RenameOptions;

/// User-facing refactoring settings.
///
/// Deserialized from LSP `initializationOptions` (camelCase keys); missing
/// keys take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefactorConfig {
    /// Base name for "extract variable".
    pub extract_variable_name: String,
    /// Base name for "extract function".
    pub extract_function_name: String,
    /// Numbered suffixes tried before giving up on a fresh name.
    pub max_name_attempts: u32,
    pub rename_overwrite: bool,
    pub rename_ignore_if_exists: bool,
    /// Indentation of synthesized function bodies. `None` detects it from
    /// the file.
    pub indent_unit: Option<String>,
}

impl Default for RefactorConfig {
    fn default() -> Self {
        Self {
            extract_variable_name: "jls_extract_var".to_string(),
            extract_function_name: "jls_extract_def".to_string(),
            max_name_attempts: 100,
            rename_overwrite: true,
            rename_ignore_if_exists: true,
            indent_unit: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse refactor configuration: {0}")]
    Json(String),
    #[error("`{field}` is not a valid name: {reason}")]
    InvalidName {
        field: &'static str,
        reason: IdentifierError,
    },
    #[error("`maxNameAttempts` must be at least 1")]
    ZeroAttempts,
    #[error("`indentUnit` must be a non-empty run of spaces or tabs")]
    InvalidIndent,
}

impl RefactorConfig {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: RefactorConfig =
            serde_json::from_value(value).map_err(|err| ConfigError::Json(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier(&self.extract_variable_name).map_err(|reason| {
            ConfigError::InvalidName {
                field: "extractVariableName",
                reason,
            }
        })?;
        validate_identifier(&self.extract_function_name).map_err(|reason| {
            ConfigError::InvalidName {
                field: "extractFunctionName",
                reason,
            }
        })?;
        if self.max_name_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if let Some(unit) = &self.indent_unit {
            if unit.is_empty() || !unit.chars().all(|c| c == ' ' || c == '\t') {
                return Err(ConfigError::InvalidIndent);
            }
        }
        Ok(())
    }

    pub fn rename_options(&self) -> RenameOptions {
        RenameOptions {
            overwrite: self.rename_overwrite,
            ignore_if_exists: self.rename_ignore_if_exists,
        }
    }
}

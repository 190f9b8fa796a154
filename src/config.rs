use std::path::Path;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("{field} must be a Python identifier, got \"{value}\"")]
    NotAnIdentifier { field: &'static str, value: String },
    #[error("indent_width must be between 1 and 8, got {0}")]
    IndentWidth(usize),
}

/// Replacement template texts. Unset entries use the bundled templates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOverrides {
    pub model: Option<String>,
    pub training: Option<String>,
    pub inference: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Name of the generated `nn.Module` class.
    pub model_name: String,
    /// Argument name of `forward()`, read by every source node.
    pub input_symbol: String,
    pub indent_width: usize,
    /// Parameter count assumed for kinds without an estimate formula.
    pub nominal_parameter_estimate: u64,
    pub base_dependencies: Vec<String>,
    pub templates: TemplateOverrides,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            model_name: "AIModel".to_string(),
            input_symbol: "x".to_string(),
            indent_width: 4,
            nominal_parameter_estimate: 1000,
            base_dependencies: vec!["torch>=1.9.0".to_string()],
            templates: TemplateOverrides::default(),
        }
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

impl EmitterConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::debug!("Loading emitter config from {}", path.display());
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn with_model_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.model_name = name.to_string();
        self.check()?;
        Ok(self)
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        for (field, value) in [("model_name", &self.model_name), ("input_symbol", &self.input_symbol)] {
            if !is_identifier(value) {
                return Err(ConfigError::NotAnIdentifier { field, value: value.clone() });
            }
        }
        if !(1..=8).contains(&self.indent_width) {
            return Err(ConfigError::IndentWidth(self.indent_width));
        }
        Ok(())
    }

    pub(crate) fn indent(&self, levels: usize) -> String {
        " ".repeat(self.indent_width * levels)
    }
}

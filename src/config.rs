//! Engine configuration
//!
//! Read once at engine construction. Files may be YAML (`.yaml`/`.yml`) or JSON;
//! every field has a default so partial files are fine.

use crate::error::EvalError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable pointing at a config file
pub const CONFIG_ENV_VAR: &str = "FACET_EVAL_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model used when a request does not name one
    pub default_model: String,

    /// Facets sent to the model per judge call
    pub facet_batch_size: usize,

    /// Size of the blocking worker pool for judge calls
    pub max_workers: usize,

    /// Limit on model acquisition and on each judge call once a worker is held;
    /// `None` waits indefinitely
    pub evaluation_timeout_secs: Option<u64>,

    /// Category name -> facet names. Applied on top of the built-in table.
    pub facets: BTreeMap<String, Vec<String>>,

    /// Facet name -> weight. Exact key match only.
    pub facet_weights: BTreeMap<String, f64>,

    pub models: ModelsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_model: "mock".to_string(),
            facet_batch_size: 10,
            max_workers: 4,
            evaluation_timeout_secs: None,
            facets: BTreeMap::new(),
            facet_weights: BTreeMap::new(),
            models: ModelsConfig::default(),
        }
    }
}

/// Which concrete model implementation the registry hands out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    #[default]
    Mock,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub backend: ModelBackend,

    /// Models the registry may load; empty means any name is accepted
    pub supported_models: Vec<String>,

    /// Text-generation endpoint for the HTTP backend
    pub endpoint: String,

    /// Name of the environment variable holding the API token
    pub api_key_env: String,

    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,

    /// Varies the mock backend's deterministic scores
    pub mock_seed: Option<u64>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Mock,
            supported_models: Vec::new(),
            endpoint: "http://127.0.0.1:8080/generate".to_string(),
            api_key_env: "FACET_EVAL_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            request_timeout_secs: 60,
            mock_seed: None,
        }
    }
}

impl EngineConfig {
    /// Load from a YAML or JSON file, chosen by extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let config: EngineConfig = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config {:?}", path))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config {:?}", path))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from `FACET_EVAL_CONFIG` if set, otherwise defaults
    pub fn from_env_or_default() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.facet_batch_size == 0 {
            return Err(EvalError::Config("facet_batch_size must be at least 1".into()));
        }
        if self.max_workers == 0 {
            return Err(EvalError::Config("max_workers must be at least 1".into()));
        }
        if self.default_model.trim().is_empty() {
            return Err(EvalError::Config("default_model must not be empty".into()));
        }
        for (facet, weight) in &self.facet_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(EvalError::Config(format!(
                    "weight for facet '{}' must be a non-negative number, got {}",
                    facet, weight
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.facet_batch_size, 10);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.models.backend, ModelBackend::Mock);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "default_model: judge-small\nfacet_batch_size: 3\nfacets:\n  safety: [spam]\nfacet_weights:\n  grammar: 0.5\nmodels:\n  supported_models: [judge-small, judge-large]\n"
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.default_model, "judge-small");
        assert_eq!(config.facet_batch_size, 3);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.facets["safety"], vec!["spam".to_string()]);
        assert_eq!(config.facet_weights["grammar"], 0.5);
        assert_eq!(config.models.supported_models.len(), 2);
        assert_eq!(config.models.temperature, 0.7);
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"max_workers": 2, "models": {{"backend": "http"}}}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.models.backend, ModelBackend::Http);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = EngineConfig {
            facet_batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.facet_weights.insert("toxicity".into(), -1.0);
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(EngineConfig::load(Path::new("/nonexistent/facet-eval.yaml")).is_err());
    }
}

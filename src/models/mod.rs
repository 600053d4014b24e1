//! Model capability and the registry that owns loaded models
//!
//! The engine never builds models itself. It asks a [`ModelProvider`] for a
//! handle and treats the handle as shared, read-only state: many evaluations may
//! judge through the same `Arc<dyn JudgeModel>` at once. Only the registry
//! changes its cache, through `load`, `unload` and `shutdown`.

pub mod http;
pub mod mock;

use crate::config::{ModelBackend, ModelsConfig};
use crate::error::{EvalError, Result};
use crate::types::FacetJudgment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use http::HttpModel;
pub use mock::MockModel;

/// A loaded model that can judge a conversation on a set of facets.
///
/// `judge` is blocking (inference is CPU/GPU bound) and must not fail as a whole:
/// a facet that cannot be judged comes back as [`FacetJudgment::degraded`].
pub trait JudgeModel: Send + Sync {
    fn identifier(&self) -> &str;

    fn judge(&self, conversation: &str, facets: &[String]) -> Vec<FacetJudgment>;
}

/// Hands out model handles, loading them on first use.
///
/// Only `acquire` is required; providers without a cache keep the no-op
/// management defaults.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// `None` selects the provider's default model
    async fn acquire(&self, model_name: Option<&str>) -> Result<Arc<dyn JudgeModel>>;

    fn supported_models(&self) -> Vec<String> {
        Vec::new()
    }

    async fn model_info(&self, _model_name: &str) -> Option<ModelInfo> {
        None
    }

    /// Returns whether a cached model was released
    async fn unload(&self, _model_name: &str) -> bool {
        false
    }

    async fn shutdown(&self) {}
}

/// Status of one model as seen by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub loaded: bool,
    pub supported: bool,
    pub backend: ModelBackend,
}

/// Owned cache of loaded models keyed by name
pub struct ModelRegistry {
    config: ModelsConfig,
    default_model: String,
    models: Mutex<HashMap<String, Arc<dyn JudgeModel>>>,
}

impl ModelRegistry {
    pub fn new(config: ModelsConfig, default_model: impl Into<String>) -> Self {
        let default_model = default_model.into();
        tracing::info!(
            "Model registry created (backend: {:?}, default: {})",
            config.backend,
            default_model
        );
        Self {
            config,
            default_model,
            models: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn list_supported_models(&self) -> &[String] {
        &self.config.supported_models
    }

    pub fn is_supported(&self, model_name: &str) -> bool {
        self.config.supported_models.is_empty()
            || self.config.supported_models.iter().any(|m| m == model_name)
    }

    /// Return the cached handle or build one with the configured backend
    pub async fn load(&self, model_name: &str) -> Result<Arc<dyn JudgeModel>> {
        if model_name.trim().is_empty() {
            return Err(EvalError::model_acquisition(model_name, "empty model name"));
        }
        if !self.is_supported(model_name) {
            return Err(EvalError::model_acquisition(
                model_name,
                format!(
                    "not in supported models [{}]",
                    self.config.supported_models.join(", ")
                ),
            ));
        }

        // Held across the build so concurrent acquires of one model load it once
        let mut models = self.models.lock().await;
        if let Some(model) = models.get(model_name) {
            return Ok(Arc::clone(model));
        }

        tracing::info!("Loading model: {}", model_name);
        let model: Arc<dyn JudgeModel> = match self.config.backend {
            ModelBackend::Mock => Arc::new(MockModel::new(model_name, self.config.mock_seed)),
            ModelBackend::Http => Arc::new(
                HttpModel::new(model_name, &self.config)
                    .map_err(|e| EvalError::model_acquisition(model_name, format!("{:#}", e)))?,
            ),
        };

        models.insert(model_name.to_string(), Arc::clone(&model));
        tracing::info!("Model {} loaded successfully", model_name);
        Ok(model)
    }

    /// Drop a model from the cache. In-flight evaluations keep their handle.
    pub async fn unload(&self, model_name: &str) -> bool {
        let removed = self.models.lock().await.remove(model_name).is_some();
        if removed {
            tracing::info!("Unloaded model: {}", model_name);
        }
        removed
    }

    pub async fn loaded_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn model_info(&self, model_name: &str) -> ModelInfo {
        ModelInfo {
            name: model_name.to_string(),
            loaded: self.models.lock().await.contains_key(model_name),
            supported: self.is_supported(model_name),
            backend: self.config.backend,
        }
    }

    /// Unload everything
    pub async fn shutdown(&self) {
        let mut models = self.models.lock().await;
        let count = models.len();
        models.clear();
        tracing::info!("Model registry shut down ({} model(s) released)", count);
    }
}

#[async_trait]
impl ModelProvider for ModelRegistry {
    async fn acquire(&self, model_name: Option<&str>) -> Result<Arc<dyn JudgeModel>> {
        let name = model_name.unwrap_or(self.default_model.as_str());
        self.load(name).await
    }

    fn supported_models(&self) -> Vec<String> {
        self.list_supported_models().to_vec()
    }

    async fn model_info(&self, model_name: &str) -> Option<ModelInfo> {
        Some(ModelRegistry::model_info(self, model_name).await)
    }

    async fn unload(&self, model_name: &str) -> bool {
        ModelRegistry::unload(self, model_name).await
    }

    async fn shutdown(&self) {
        ModelRegistry::shutdown(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(supported: &[&str]) -> ModelRegistry {
        let config = ModelsConfig {
            supported_models: supported.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        ModelRegistry::new(config, "judge-a")
    }

    #[tokio::test]
    async fn test_acquire_default_and_cache() {
        let registry = registry(&[]);
        let first = registry.acquire(None).await.unwrap();
        assert_eq!(first.identifier(), "judge-a");

        let second = registry.acquire(Some("judge-a")).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.loaded_models().await, vec!["judge-a".to_string()]);
    }

    #[tokio::test]
    async fn test_unsupported_model_fails_acquisition() {
        let registry = registry(&["judge-a", "judge-b"]);
        let err = registry.acquire(Some("judge-z")).await.err().unwrap();
        assert!(err.is_model_acquisition());
        assert!(registry.acquire(Some("judge-b")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unload_and_shutdown() {
        let registry = registry(&[]);
        registry.load("judge-a").await.unwrap();
        registry.load("judge-b").await.unwrap();

        let info = registry.model_info("judge-a").await;
        assert!(info.loaded && info.supported);
        assert_eq!(info.backend, ModelBackend::Mock);

        assert!(registry.unload("judge-a").await);
        assert!(!registry.unload("judge-a").await);
        assert!(!registry.model_info("judge-a").await.loaded);

        registry.shutdown().await;
        assert!(registry.loaded_models().await.is_empty());
    }

    #[test]
    fn test_acquire_blocking_context() {
        let registry = registry(&[]);
        let model = tokio_test::block_on(registry.acquire(Some("judge-c"))).unwrap();
        let judgments = model.judge("Hello there.", &["grammar".to_string()]);
        assert_eq!(judgments.len(), 1);
    }
}

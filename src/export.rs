//! Serialized forms of evaluation records
//!
//! JSON is the interchange format; YAML is offered for reports people read.

use crate::error::{EvalError, Result};
use crate::types::{BatchEvaluationResult, ConversationEvaluation, ModelComparison};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Yaml => write!(f, "yaml"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            other => Err(EvalError::Export(format!(
                "unsupported export format '{}' (expected json or yaml)",
                other
            ))),
        }
    }
}

/// Records that can be exported and imported again
pub trait Exportable: Serialize + DeserializeOwned {}

impl Exportable for ConversationEvaluation {}
impl Exportable for BatchEvaluationResult {}
impl Exportable for ModelComparison {}

pub fn export<T: Exportable>(value: &T, format: ExportFormat) -> Result<String> {
    let text = match format {
        ExportFormat::Json => serde_json::to_string_pretty(value)?,
        ExportFormat::Yaml => serde_yaml::to_string(value)?,
    };
    Ok(text)
}

pub fn import<T: Exportable>(text: &str, format: ExportFormat) -> Result<T> {
    let value = match format {
        ExportFormat::Json => serde_json::from_str(text)?,
        ExportFormat::Yaml => serde_yaml::from_str(text)?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConfidenceMetrics, FacetJudgment};
    use chrono::Utc;

    fn evaluation() -> ConversationEvaluation {
        let judgment = FacetJudgment::new("grammar", 4, 0.75, "Clean sentences");
        ConversationEvaluation {
            conversation_id: "conv_1".to_string(),
            conversation_text: "Hello there.".to_string(),
            facet_scores: [("grammar".to_string(), judgment)].into_iter().collect(),
            weighted_score: Some(4.0),
            confidence_metrics: ConfidenceMetrics {
                overall_confidence: 0.75,
                model_confidence: 0.75,
                consistency_score: 1.0,
                uncertainty_estimate: 0.0,
            },
            processing_time: 0.5,
            model_used: "mock".to_string(),
            timestamp: Utc::now(),
            failure: None,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("yml".parse::<ExportFormat>().unwrap(), ExportFormat::Yaml);
        assert!("csv".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_json_and_yaml_import() {
        let original = evaluation();
        for format in [ExportFormat::Json, ExportFormat::Yaml] {
            let text = export(&original, format).unwrap();
            let restored: ConversationEvaluation = import(&text, format).unwrap();
            assert_eq!(restored, original, "format {}", format);
        }
    }

    #[test]
    fn test_json_shape() {
        let json = export(&evaluation(), ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["facet_scores"]["grammar"]["score"], 4);
        assert!(value.get("failure").is_none());
        assert!(value["facet_scores"]["grammar"].get("degraded").is_none());
    }

    #[test]
    fn test_import_rejects_garbage() {
        let err = import::<BatchEvaluationResult>("{not json", ExportFormat::Json).unwrap_err();
        assert!(matches!(err, EvalError::Export(_)));
    }
}

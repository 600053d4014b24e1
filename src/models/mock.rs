//! Deterministic stand-in model
//!
//! Scores come from a SHA-256 digest of (seed, model, facet, text), so the same
//! input always yields the same judgment while different models disagree the
//! way real ones would.

use super::JudgeModel;
use crate::types::{FacetJudgment, MAX_SCORE, MIN_SCORE};
use sha2::{Digest, Sha256};

const MIN_CONFIDENCE: f64 = 0.7;
const CONFIDENCE_SPAN: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct MockModel {
    name: String,
    seed: u64,
}

impl MockModel {
    pub fn new(name: impl Into<String>, seed: Option<u64>) -> Self {
        Self {
            name: name.into(),
            seed: seed.unwrap_or(0),
        }
    }

    fn judge_one(&self, conversation: &str, facet: &str) -> FacetJudgment {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(self.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(facet.as_bytes());
        hasher.update([0u8]);
        hasher.update(conversation.as_bytes());
        let digest = hasher.finalize();

        let span = MAX_SCORE - MIN_SCORE + 1;
        let score = MIN_SCORE + digest[0] % span;
        let confidence = MIN_CONFIDENCE + (digest[1] as f64 / 255.0) * CONFIDENCE_SPAN;
        // Two decimals, like a reported probability
        let confidence = (confidence * 100.0).round() / 100.0;

        FacetJudgment::new(
            facet,
            score as i64,
            confidence,
            format!("Mock evaluation for {}", facet.replace('_', " ")),
        )
    }
}

impl JudgeModel for MockModel {
    fn identifier(&self) -> &str {
        &self.name
    }

    fn judge(&self, conversation: &str, facets: &[String]) -> Vec<FacetJudgment> {
        facets
            .iter()
            .map(|facet| self.judge_one(conversation, facet))
            .collect()
    }
}

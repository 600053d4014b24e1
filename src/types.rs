//! Core types for facet-based conversation evaluation
//!
//! Raw per-facet judgments flow upward into confidence metrics, per-conversation
//! records, and batch / cross-model aggregates. Everything here is plain data:
//! the arithmetic lives in [`crate::eval`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Lowest score a facet can receive
pub const MIN_SCORE: u8 = 1;

/// Highest score a facet can receive
pub const MAX_SCORE: u8 = 5;

/// Score assigned to a facet that could not be judged
pub const NEUTRAL_SCORE: u8 = 3;

/// Closed set of facet categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FacetCategory {
    LinguisticQuality,
    Pragmatics,
    Safety,
    Emotion,
    Other,
}

impl FacetCategory {
    pub const ALL: [FacetCategory; 5] = [
        FacetCategory::LinguisticQuality,
        FacetCategory::Pragmatics,
        FacetCategory::Safety,
        FacetCategory::Emotion,
        FacetCategory::Other,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FacetCategory::LinguisticQuality => "linguistic_quality",
            FacetCategory::Pragmatics => "pragmatics",
            FacetCategory::Safety => "safety",
            FacetCategory::Emotion => "emotion",
            FacetCategory::Other => "other",
        }
    }

    /// Exact category lookup; `None` for names outside the fixed set
    pub fn from_known(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        FacetCategory::ALL.into_iter().find(|c| c.name() == normalized)
    }
}

impl fmt::Display for FacetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown names parse as `Other`
impl FromStr for FacetCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FacetCategory::from_known(s).unwrap_or(FacetCategory::Other))
    }
}

/// A facet known to the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetDefinition {
    pub name: String,
    pub category: FacetCategory,
    pub weight: f64,
}

/// Named points on the 1-5 scale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLevel {
    VeryPoor = 1,
    Poor = 2,
    Average = 3,
    Good = 4,
    Excellent = 5,
}

impl ScoreLevel {
    pub fn from_score(score: u8) -> Self {
        match score.clamp(MIN_SCORE, MAX_SCORE) {
            1 => ScoreLevel::VeryPoor,
            2 => ScoreLevel::Poor,
            3 => ScoreLevel::Average,
            4 => ScoreLevel::Good,
            _ => ScoreLevel::Excellent,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreLevel::VeryPoor => "Very Poor",
            ScoreLevel::Poor => "Poor",
            ScoreLevel::Average => "Average",
            ScoreLevel::Good => "Good",
            ScoreLevel::Excellent => "Excellent",
        }
    }
}

/// Raw model output for one facet of one conversation.
///
/// Fields are private so the 1-5 score and [0, 1] confidence bounds hold for
/// every instance, including deserialized ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFacetJudgment")]
pub struct FacetJudgment {
    facet: String,
    score: u8,
    confidence: f64,
    reasoning: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    degraded: bool,
}

#[derive(Deserialize)]
struct RawFacetJudgment {
    facet: String,
    score: i64,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    degraded: bool,
}

impl From<RawFacetJudgment> for FacetJudgment {
    fn from(raw: RawFacetJudgment) -> Self {
        let mut judgment = FacetJudgment::new(raw.facet, raw.score, raw.confidence, raw.reasoning);
        judgment.degraded = raw.degraded;
        judgment
    }
}

impl FacetJudgment {
    /// Build a judgment, clamping the score into 1..=5 and confidence into [0, 1]
    pub fn new(
        facet: impl Into<String>,
        score: i64,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            facet: facet.into(),
            score: score.clamp(MIN_SCORE as i64, MAX_SCORE as i64) as u8,
            confidence,
            reasoning: reasoning.into(),
            degraded: false,
        }
    }

    /// Placeholder for a facet that could not be judged: neutral score, zero confidence
    pub fn degraded(facet: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            facet: facet.into(),
            score: NEUTRAL_SCORE,
            confidence: 0.0,
            reasoning: format!("Error during evaluation: {}", reason),
            degraded: true,
        }
    }

    pub fn facet(&self) -> &str {
        &self.facet
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn level(&self) -> ScoreLevel {
        ScoreLevel::from_score(self.score)
    }
}

/// Confidence summary for one conversation's judgments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceMetrics {
    /// Mean of judgment confidences
    pub overall_confidence: f64,
    /// Facet-weight-adjusted mean confidence
    pub model_confidence: f64,
    /// Category-grouped agreement between facet scores
    pub consistency_score: f64,
    /// Normalized score variance (higher = more uncertain)
    pub uncertainty_estimate: f64,
}

impl ConfidenceMetrics {
    /// Zero confidence, maximal uncertainty
    pub const EMPTY: ConfidenceMetrics = ConfidenceMetrics {
        overall_confidence: 0.0,
        model_confidence: 0.0,
        consistency_score: 0.0,
        uncertainty_estimate: 1.0,
    };
}

/// A single conversation turn to evaluate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl ConversationTurn {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }
}

impl From<&str> for ConversationTurn {
    fn from(text: &str) -> Self {
        ConversationTurn::new(text)
    }
}

impl From<String> for ConversationTurn {
    fn from(text: String) -> Self {
        ConversationTurn::new(text)
    }
}

impl From<&ConversationTurn> for ConversationTurn {
    fn from(turn: &ConversationTurn) -> Self {
        turn.clone()
    }
}

/// Complete evaluation record for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvaluation {
    pub conversation_id: String,
    /// Text after normalization
    pub conversation_text: String,
    pub facet_scores: BTreeMap<String, FacetJudgment>,
    /// Confidence-weighted facet score; `None` when no judgment carried weight
    pub weighted_score: Option<f64>,
    pub confidence_metrics: ConfidenceMetrics,
    /// Wall-clock seconds spent on this evaluation
    pub processing_time: f64,
    pub model_used: String,
    pub timestamp: DateTime<Utc>,
    /// Set only on placeholders for conversations that could not be evaluated in a batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ConversationEvaluation {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Judgments in facet-name order
    pub fn judgments(&self) -> impl Iterator<Item = &FacetJudgment> {
        self.facet_scores.values()
    }
}

/// Cross-conversation statistics for one facet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacetStatistics {
    pub mean_score: f64,
    pub min_score: u8,
    pub max_score: u8,
    /// Population standard deviation
    pub score_std: f64,
    pub mean_confidence: f64,
    pub evaluation_count: usize,
}

/// Result of evaluating many conversations together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvaluationResult {
    /// Evaluations in input order
    pub evaluations: Vec<ConversationEvaluation>,
    /// Wall-clock seconds for the whole group
    pub total_processing_time: f64,
    pub average_confidence: f64,
    pub facet_statistics: BTreeMap<String, FacetStatistics>,
    /// Number of evaluations that are failure placeholders
    #[serde(default)]
    pub failed_count: usize,
}

/// Cross-model comparison of evaluations of the same conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    /// facet -> agreement in [0, 1]
    pub model_agreements: BTreeMap<String, f64>,
    /// facet -> model -> raw score
    pub score_differences: BTreeMap<String, BTreeMap<String, u8>>,
    /// facet -> model -> raw confidence
    pub confidence_comparison: BTreeMap<String, BTreeMap<String, f64>>,
    /// facet -> confidence-weighted consensus score
    pub consensus_scores: BTreeMap<String, f64>,
    /// Mean agreement over comparable facets
    pub mean_agreement: Option<f64>,
}

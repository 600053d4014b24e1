//! Weighted facet scoring and category consistency
//!
//! Facets in the same category (grammar and clarity, say) are expected to move
//! together. A wide spread inside a category marks the judgment set as
//! contradictory, which the confidence metrics pick up.

use crate::facets::FacetRegistry;
use crate::types::{FacetCategory, FacetJudgment};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Largest population variance of scores on the 1-5 scale: half at 1, half at 5
pub const MAX_SCORE_VARIANCE: f64 = 4.0;

/// Population variance, 0.0 for fewer than two values
pub fn population_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().population_variance()
}

/// Map a score variance to [0, 1], 1.0 = no disagreement
pub fn variance_to_consistency(variance: f64) -> f64 {
    (1.0 - variance / MAX_SCORE_VARIANCE).max(0.0)
}

#[derive(Debug, Clone)]
pub struct FacetEvaluator {
    registry: Arc<FacetRegistry>,
}

impl FacetEvaluator {
    pub fn new(registry: Arc<FacetRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FacetRegistry {
        &self.registry
    }

    /// `Σ(score·weight·confidence) / Σ(weight·confidence)`, or `None` when nothing carries weight
    pub fn try_weighted_score(&self, judgments: &[FacetJudgment]) -> Option<f64> {
        let (numerator, denominator) = judgments.iter().fold((0.0, 0.0), |(num, den), judgment| {
            let effective = self.registry.weight_of(judgment.facet()) * judgment.confidence();
            (num + judgment.score() as f64 * effective, den + effective)
        });

        if denominator > 0.0 {
            Some(numerator / denominator)
        } else {
            None
        }
    }

    /// Weighted score with 0.0 standing in for "no usable data"
    pub fn weighted_score(&self, judgments: &[FacetJudgment]) -> f64 {
        self.try_weighted_score(judgments).unwrap_or(0.0)
    }

    /// Mean per-category consistency over categories with at least two facets
    pub fn consistency_score(&self, judgments: &[FacetJudgment]) -> f64 {
        if judgments.len() < 2 {
            return 1.0;
        }

        let mut by_category: BTreeMap<FacetCategory, Vec<f64>> = BTreeMap::new();
        for judgment in judgments {
            by_category
                .entry(self.registry.category_of(judgment.facet()))
                .or_default()
                .push(judgment.score() as f64);
        }

        let per_category: Vec<f64> = by_category
            .values()
            .filter(|scores| scores.len() > 1)
            .map(|scores| variance_to_consistency(population_variance(scores)))
            .collect();

        if per_category.is_empty() {
            1.0
        } else {
            per_category.iter().sum::<f64>() / per_category.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn evaluator() -> FacetEvaluator {
        FacetEvaluator::new(Arc::new(FacetRegistry::default()))
    }

    fn judgment(facet: &str, score: i64, confidence: f64) -> FacetJudgment {
        FacetJudgment::new(facet, score, confidence, "")
    }

    #[test]
    fn test_weighted_score_scenario() {
        let mut config = EngineConfig::default();
        config.facet_weights.insert("grammar".into(), 1.0);
        config.facet_weights.insert("clarity".into(), 1.3);
        config.facet_weights.insert("toxicity".into(), 2.0);
        let evaluator = FacetEvaluator::new(Arc::new(FacetRegistry::from_config(&config)));

        let judgments = vec![
            judgment("grammar", 5, 0.9),
            judgment("clarity", 4, 0.8),
            judgment("toxicity", 1, 0.95),
        ];

        let expected = (5.0 * 0.9 + 4.0 * 1.3 * 0.8 + 1.0 * 2.0 * 0.95)
            / (0.9 + 1.3 * 0.8 + 2.0 * 0.95);
        let score = evaluator.weighted_score(&judgments);
        assert!((score - expected).abs() < 1e-9);
        // 10.56 / 3.84
        assert!((score - 2.75).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_score_is_convex() {
        let evaluator = evaluator();
        let judgments = vec![
            judgment("fluency", 2, 0.3),
            judgment("bias", 5, 0.6),
            judgment("humor", 3, 0.0),
            judgment("empathy", 4, 1.0),
        ];
        let score = evaluator.weighted_score(&judgments);
        assert!((2.0..=5.0).contains(&score));
    }

    #[test]
    fn test_weighted_score_degenerate() {
        let evaluator = evaluator();
        assert_eq!(evaluator.weighted_score(&[]), 0.0);
        assert_eq!(evaluator.try_weighted_score(&[]), None);

        let zero_confidence = vec![judgment("grammar", 5, 0.0), judgment("toxicity", 4, 0.0)];
        assert_eq!(evaluator.weighted_score(&zero_confidence), 0.0);
        assert_eq!(evaluator.try_weighted_score(&zero_confidence), None);
    }

    #[test]
    fn test_consistency_fewer_than_two() {
        let evaluator = evaluator();
        assert_eq!(evaluator.consistency_score(&[]), 1.0);
        assert_eq!(evaluator.consistency_score(&[judgment("grammar", 1, 0.5)]), 1.0);
    }

    #[test]
    fn test_consistency_identical_scores() {
        let evaluator = evaluator();
        let judgments = vec![
            judgment("grammar", 4, 0.9),
            judgment("clarity", 4, 0.2),
            judgment("toxicity", 2, 0.9),
            judgment("bias", 2, 0.9),
        ];
        assert_eq!(evaluator.consistency_score(&judgments), 1.0);
    }

    #[test]
    fn test_consistency_singleton_categories_ignored() {
        let evaluator = evaluator();
        // One facet per category: nothing to compare
        let judgments = vec![
            judgment("grammar", 1, 0.9),
            judgment("toxicity", 5, 0.9),
            judgment("empathy", 3, 0.9),
        ];
        assert_eq!(evaluator.consistency_score(&judgments), 1.0);
    }

    #[test]
    fn test_consistency_spread() {
        let evaluator = evaluator();
        // linguistic: {1, 5} -> variance 4 -> 0.0; safety: {3, 3} -> 1.0
        let judgments = vec![
            judgment("grammar", 1, 0.9),
            judgment("fluency", 5, 0.9),
            judgment("toxicity", 3, 0.9),
            judgment("bias", 3, 0.9),
        ];
        assert!((evaluator.consistency_score(&judgments) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_variance_helpers() {
        assert_eq!(MAX_SCORE_VARIANCE, 4.0);
        assert_eq!(population_variance(&[3.0]), 0.0);
        assert!((population_variance(&[1.0, 5.0]) - 4.0).abs() < 1e-9);
        assert_eq!(variance_to_consistency(6.0), 0.0);
    }
}

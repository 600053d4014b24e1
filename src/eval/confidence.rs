//! Confidence metrics for one conversation
//!
//! Uncertainty is driven by score spread alone, independent of the reported
//! confidences. A model can be confident and self-contradictory at once; that
//! case shows up as high confidence *and* high uncertainty.

use super::scoring::{population_variance, FacetEvaluator};
use crate::types::{ConfidenceMetrics, FacetJudgment};

/// Divisor mapping score variance onto the uncertainty range
const UNCERTAINTY_SCALE: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct ConfidenceCalculator {
    evaluator: FacetEvaluator,
}

impl ConfidenceCalculator {
    pub fn new(evaluator: FacetEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &FacetEvaluator {
        &self.evaluator
    }

    pub fn calculate(&self, judgments: &[FacetJudgment]) -> ConfidenceMetrics {
        if judgments.is_empty() {
            return ConfidenceMetrics::EMPTY;
        }

        let overall_confidence =
            judgments.iter().map(|j| j.confidence()).sum::<f64>() / judgments.len() as f64;

        // Safety facets carry higher weights and so pull this harder than overall_confidence
        let registry = self.evaluator.registry();
        let (weighted, total_weight) = judgments.iter().fold((0.0, 0.0), |(sum, total), j| {
            let weight = registry.weight_of(j.facet());
            (sum + j.confidence() * weight, total + weight)
        });
        let model_confidence = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            0.0
        };

        let scores: Vec<f64> = judgments.iter().map(|j| j.score() as f64).collect();
        let uncertainty_estimate =
            (population_variance(&scores) / UNCERTAINTY_SCALE).clamp(0.0, 1.0);

        ConfidenceMetrics {
            overall_confidence,
            model_confidence,
            consistency_score: self.evaluator.consistency_score(judgments),
            uncertainty_estimate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facets::FacetRegistry;
    use std::sync::Arc;

    fn calculator() -> ConfidenceCalculator {
        ConfidenceCalculator::new(FacetEvaluator::new(Arc::new(FacetRegistry::default())))
    }

    #[test]
    fn test_empty_sentinel() {
        let metrics = calculator().calculate(&[]);
        assert_eq!(metrics, ConfidenceMetrics::EMPTY);
        assert_eq!(metrics.overall_confidence, 0.0);
        assert_eq!(metrics.model_confidence, 0.0);
        assert_eq!(metrics.consistency_score, 0.0);
        assert_eq!(metrics.uncertainty_estimate, 1.0);
    }

    #[test]
    fn test_identical_scores_zero_uncertainty() {
        let judgments = vec![
            FacetJudgment::new("grammar", 4, 0.8, ""),
            FacetJudgment::new("toxicity", 4, 0.6, ""),
            FacetJudgment::new("empathy", 4, 1.0, ""),
        ];
        let metrics = calculator().calculate(&judgments);
        assert_eq!(metrics.uncertainty_estimate, 0.0);
        assert!((metrics.overall_confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_extreme_spread_saturates_uncertainty() {
        let judgments = vec![
            FacetJudgment::new("grammar", 1, 0.9, ""),
            FacetJudgment::new("toxicity", 5, 0.9, ""),
        ];
        let metrics = calculator().calculate(&judgments);
        assert_eq!(metrics.uncertainty_estimate, 1.0);
        // Confident but contradictory
        assert!(metrics.overall_confidence > 0.8);
    }

    #[test]
    fn test_model_confidence_favours_heavy_facets() {
        // toxicity weight 2.0, vocabulary_richness weight 0.8
        let judgments = vec![
            FacetJudgment::new("toxicity", 3, 1.0, ""),
            FacetJudgment::new("vocabulary_richness", 3, 0.0, ""),
        ];
        let metrics = calculator().calculate(&judgments);
        assert!((metrics.overall_confidence - 0.5).abs() < 1e-9);
        assert!((metrics.model_confidence - 2.0 / 2.8).abs() < 1e-9);
    }

    #[test]
    fn test_single_judgment() {
        let metrics = calculator().calculate(&[FacetJudgment::new("grammar", 2, 0.4, "")]);
        assert_eq!(metrics.consistency_score, 1.0);
        assert_eq!(metrics.uncertainty_estimate, 0.0);
        assert!((metrics.model_confidence - 0.4).abs() < 1e-9);
    }
}

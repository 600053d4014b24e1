//! Cross-conversation statistics for a batch

use crate::types::{
    BatchEvaluationResult, ConversationEvaluation, FacetStatistics, MAX_SCORE, MIN_SCORE,
};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, BTreeSet};

/// Per-facet statistics over the evaluations that contain the facet.
///
/// Facets absent from every evaluation are left out entirely rather than
/// reported with zeros.
pub fn facet_statistics<S: AsRef<str>>(
    evaluations: &[ConversationEvaluation],
    facets: &[S],
) -> BTreeMap<String, FacetStatistics> {
    let requested: BTreeSet<&str> = facets.iter().map(|f| f.as_ref()).collect();
    let mut stats = BTreeMap::new();

    for facet in requested {
        let judgments: Vec<_> = evaluations
            .iter()
            .filter_map(|e| e.facet_scores.get(facet))
            .collect();

        if judgments.is_empty() {
            continue;
        }

        let scores: Vec<f64> = judgments.iter().map(|j| j.score() as f64).collect();
        let confidences: Vec<f64> = judgments.iter().map(|j| j.confidence()).collect();

        let score_std = if scores.len() > 1 {
            scores.iter().population_std_dev()
        } else {
            0.0
        };

        stats.insert(
            facet.to_string(),
            FacetStatistics {
                mean_score: scores.iter().mean(),
                min_score: judgments.iter().fold(MAX_SCORE, |m, j| std::cmp::min(m, j.score())),
                max_score: judgments.iter().fold(MIN_SCORE, |m, j| std::cmp::max(m, j.score())),
                score_std,
                mean_confidence: confidences.iter().mean(),
                evaluation_count: judgments.len(),
            },
        );
    }

    stats
}

/// Mean overall confidence, 0.0 for an empty slice
pub fn average_confidence(evaluations: &[ConversationEvaluation]) -> f64 {
    if evaluations.is_empty() {
        return 0.0;
    }
    evaluations
        .iter()
        .map(|e| e.confidence_metrics.overall_confidence)
        .sum::<f64>()
        / evaluations.len() as f64
}

impl BatchEvaluationResult {
    /// Assemble a batch result from evaluations already in input order
    pub fn from_evaluations<S: AsRef<str>>(
        evaluations: Vec<ConversationEvaluation>,
        facets: &[S],
        total_processing_time: f64,
    ) -> Self {
        let facet_statistics = facet_statistics(&evaluations, facets);
        let average_confidence = average_confidence(&evaluations);
        let failed_count = evaluations.iter().filter(|e| e.is_failed()).count();

        Self {
            evaluations,
            total_processing_time,
            average_confidence,
            facet_statistics,
            failed_count,
        }
    }
}

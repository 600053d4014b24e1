//! Cross-model agreement and consensus
//!
//! Agreement normalizes the score range the same way consistency normalizes
//! variance: a spread of 4 (one model says 1, another 5) is total disagreement.

use crate::error::{EvalError, Result};
use crate::types::{ConversationEvaluation, ModelComparison, MAX_SCORE, MIN_SCORE};
use std::collections::{BTreeMap, BTreeSet};

const MAX_SCORE_RANGE: f64 = (MAX_SCORE - MIN_SCORE) as f64;

/// `max(0, 1 - range/4)`; 1.0 when every model gave the same score
pub fn agreement(scores: &[u8]) -> f64 {
    let (Some(max), Some(min)) = (scores.iter().max(), scores.iter().min()) else {
        return 1.0;
    };
    (1.0 - (max - min) as f64 / MAX_SCORE_RANGE).max(0.0)
}

/// Confidence-weighted mean score; unweighted mean when every confidence is zero
pub fn consensus(scored: &[(u8, f64)]) -> f64 {
    if scored.is_empty() {
        return 0.0;
    }
    let weight_sum: f64 = scored.iter().map(|(_, c)| c).sum();
    if weight_sum > 0.0 {
        scored.iter().map(|(s, c)| *s as f64 * c).sum::<f64>() / weight_sum
    } else {
        scored.iter().map(|(s, _)| *s as f64).sum::<f64>() / scored.len() as f64
    }
}

/// Compare evaluations of one conversation by different models.
///
/// Facets judged by fewer than two models are left out of every map.
pub fn compare_evaluations(
    evaluations: &BTreeMap<String, ConversationEvaluation>,
) -> Result<ModelComparison> {
    if evaluations.len() < 2 {
        return Err(EvalError::InsufficientModels {
            found: evaluations.len(),
        });
    }

    let all_facets: BTreeSet<&String> = evaluations
        .values()
        .flat_map(|e| e.facet_scores.keys())
        .collect();

    let mut comparison = ModelComparison::default();

    for facet in all_facets {
        let per_model: Vec<(&String, u8, f64)> = evaluations
            .iter()
            .filter_map(|(model, evaluation)| {
                evaluation
                    .facet_scores
                    .get(facet)
                    .map(|j| (model, j.score(), j.confidence()))
            })
            .collect();

        if per_model.len() < 2 {
            tracing::debug!("Facet {} judged by {} model(s), skipping", facet, per_model.len());
            continue;
        }

        let scores: Vec<u8> = per_model.iter().map(|(_, s, _)| *s).collect();
        let scored: Vec<(u8, f64)> = per_model.iter().map(|(_, s, c)| (*s, *c)).collect();

        comparison
            .model_agreements
            .insert(facet.clone(), agreement(&scores));
        comparison.score_differences.insert(
            facet.clone(),
            per_model.iter().map(|(m, s, _)| ((*m).clone(), *s)).collect(),
        );
        comparison.confidence_comparison.insert(
            facet.clone(),
            per_model.iter().map(|(m, _, c)| ((*m).clone(), *c)).collect(),
        );
        comparison
            .consensus_scores
            .insert(facet.clone(), consensus(&scored));
    }

    if !comparison.model_agreements.is_empty() {
        comparison.mean_agreement = Some(
            comparison.model_agreements.values().sum::<f64>()
                / comparison.model_agreements.len() as f64,
        );
    }

    Ok(comparison)
}

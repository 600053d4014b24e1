//! Evaluation aggregation
//!
//! - `scoring`: weighted score and category consistency
//! - `confidence`: per-conversation confidence metrics
//! - `engine`: single-conversation pipeline plus batch and multi-model fan-out
//! - `batch`: cross-conversation facet statistics
//! - `compare`: cross-model agreement and consensus

pub mod batch;
pub mod compare;
pub mod confidence;
pub mod engine;
pub mod scoring;

pub use compare::compare_evaluations;
pub use confidence::ConfidenceCalculator;
pub use engine::EvaluationEngine;
pub use scoring::FacetEvaluator;

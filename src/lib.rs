//! facet-eval - Conversation Facet Evaluation
//!
//! Scores conversation turns on quality facets (grammar, politeness, toxicity,
//! empathy, ...) with pluggable judge models, and turns the raw per-facet
//! judgments into weighted scores with explicit confidence semantics.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use facet_eval::{EngineConfig, EvaluationEngine};
//!
//! let engine = EvaluationEngine::new(EngineConfig::default())?;
//!
//! // One conversation
//! let evaluation = engine
//!     .evaluate_conversation("How can I help?", &["grammar", "politeness"], None, None)
//!     .await?;
//!
//! // Many conversations, output in input order
//! let batch = engine.batch_evaluate(texts, &["grammar"], None).await?;
//!
//! // Several models on one conversation
//! let by_model = engine
//!     .evaluate_with_multiple_models("Thanks!", &["empathy"], &["judge-a", "judge-b"])
//!     .await?;
//! let comparison = engine.compare_evaluations(&by_model)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  EvaluationEngine                    │
//! │  evaluate_conversation() → one ConversationEvaluation│
//! │  batch_evaluate()        → BatchEvaluationResult     │
//! │  evaluate_with_multiple_models() → per-model map     │
//! └──────────┬──────────────────────────────┬───────────┘
//!            │ acquire / judge              │ aggregate
//!            ▼                              ▼
//! ┌──────────────────────┐      ┌──────────────────────────┐
//! │ ModelProvider        │      │ FacetEvaluator           │
//! │  mock | http models  │      │ ConfidenceCalculator     │
//! └──────────────────────┘      │ FacetRegistry (weights)  │
//!                               └──────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod export;
pub mod facets;
pub mod models;
pub mod text;
pub mod types;

// Core types
pub use config::EngineConfig;
pub use error::{EvalError, Result};
pub use types::*;

// Aggregation and orchestration
pub use eval::{compare_evaluations, ConfidenceCalculator, EvaluationEngine, FacetEvaluator};
pub use facets::FacetRegistry;

// Collaborators
pub use export::ExportFormat;
pub use models::{JudgeModel, ModelProvider, ModelRegistry};
pub use text::{DefaultNormalizer, TextNormalizer};

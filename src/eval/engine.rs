//! Evaluation engine
//!
//! Turns conversations into [`ConversationEvaluation`]s:
//! 1. normalize the text
//! 2. acquire the model handle (failure is fatal for this conversation only)
//! 3. split the facets into sub-batches of `facet_batch_size`
//! 4. judge sub-batches concurrently on the blocking worker pool
//! 5. merge judgments back in request order, degrading anything missing
//! 6. aggregate weighted score and confidence metrics
//!
//! Batches and multi-model runs fan out one task per conversation (or model)
//! on a `JoinSet` and fan back in by index, so output order always matches
//! input order regardless of completion order.

use super::compare;
use super::confidence::ConfidenceCalculator;
use super::scoring::FacetEvaluator;
use crate::config::EngineConfig;
use crate::error::{EvalError, Result};
use crate::export::{self, ExportFormat, Exportable};
use crate::facets::FacetRegistry;
use crate::models::{JudgeModel, ModelInfo, ModelProvider, ModelRegistry};
use crate::text::{DefaultNormalizer, TextNormalizer};
use crate::types::{
    BatchEvaluationResult, ConversationEvaluation, ConversationTurn, FacetJudgment,
    ModelComparison,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

static CONVERSATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// `conv_<unix-seconds>_<sequence>`, unique within the process
fn generate_conversation_id() -> String {
    let seq = CONVERSATION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("conv_{}_{}", Utc::now().timestamp(), seq)
}

fn generate_batch_token() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("batch_{}", &uuid[..8])
}

/// Validate and dedupe requested facets, keeping first-occurrence order
fn requested_facets<S: AsRef<str>>(facets: &[S]) -> Result<Arc<[String]>> {
    if facets.is_empty() {
        return Err(EvalError::invalid_input("facet list is empty"));
    }

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(facets.len());
    for facet in facets {
        let facet = facet.as_ref().trim();
        if facet.is_empty() {
            return Err(EvalError::invalid_input("facet names must not be blank"));
        }
        if seen.insert(facet.to_string()) {
            unique.push(facet.to_string());
        }
    }

    if unique.len() < facets.len() {
        tracing::debug!("Dropped {} duplicate facet(s)", facets.len() - unique.len());
    }
    Ok(unique.into())
}

type SubBatchOutcome = std::result::Result<Vec<FacetJudgment>, String>;

#[derive(Clone)]
pub struct EvaluationEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    calculator: ConfidenceCalculator,
    models: Arc<dyn ModelProvider>,
    normalizer: Arc<dyn TextNormalizer>,
    /// Bounds concurrent judge calls across every evaluation on this engine
    workers: Arc<Semaphore>,
}

impl EvaluationEngine {
    /// Engine backed by a [`ModelRegistry`] built from `config.models`
    pub fn new(config: EngineConfig) -> Result<Self> {
        let models = Arc::new(ModelRegistry::new(
            config.models.clone(),
            config.default_model.clone(),
        ));
        Self::with_components(config, models, Arc::new(DefaultNormalizer))
    }

    pub fn with_components(
        config: EngineConfig,
        models: Arc<dyn ModelProvider>,
        normalizer: Arc<dyn TextNormalizer>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(FacetRegistry::from_config(&config));
        let calculator = ConfidenceCalculator::new(FacetEvaluator::new(registry));
        let workers = Arc::new(Semaphore::new(config.max_workers));

        tracing::info!(
            "Evaluation engine ready (default model: {}, facet batch size: {}, workers: {})",
            config.default_model,
            config.facet_batch_size,
            config.max_workers
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                calculator,
                models,
                normalizer,
                workers,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn evaluator(&self) -> &FacetEvaluator {
        self.inner.calculator.evaluator()
    }

    pub fn facet_registry(&self) -> &FacetRegistry {
        self.evaluator().registry()
    }

    /// Evaluate one conversation turn on `facets`.
    ///
    /// Fails with [`EvalError::InvalidInput`] before any work when `facets` is
    /// empty, and with [`EvalError::ModelAcquisition`] when no model handle can
    /// be obtained. Facets the model cannot judge come back degraded.
    pub async fn evaluate_conversation<S: AsRef<str>>(
        &self,
        conversation: impl Into<ConversationTurn>,
        facets: &[S],
        conversation_id: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<ConversationEvaluation> {
        let facets = requested_facets(facets)?;
        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(generate_conversation_id);

        self.evaluate_turn(
            conversation.into(),
            facets,
            conversation_id,
            model_name.map(str::to_string),
        )
        .await
    }

    /// Per-step limit: applies to model acquisition and to each judge call once
    /// its worker permit is held, never to time spent queueing for a worker.
    fn step_timeout(&self) -> Option<Duration> {
        self.inner.config.evaluation_timeout_secs.map(Duration::from_secs)
    }

    async fn evaluate_turn(
        &self,
        turn: ConversationTurn,
        facets: Arc<[String]>,
        conversation_id: String,
        model_name: Option<String>,
    ) -> Result<ConversationEvaluation> {
        let started = Instant::now();
        tracing::debug!("{}: evaluating {} facet(s)", conversation_id, facets.len());

        let text = self.inner.normalizer.clean(&turn.text);

        let acquiring = self.inner.models.acquire(model_name.as_deref());
        let model = match self.step_timeout() {
            Some(limit) => tokio::time::timeout(limit, acquiring)
                .await
                .map_err(|_| EvalError::Timeout {
                    conversation_id: conversation_id.clone(),
                    seconds: limit.as_secs(),
                })??,
            None => acquiring.await?,
        };
        tracing::debug!("{}: acquired model {}", conversation_id, model.identifier());

        let facet_scores = self
            .judge_facets(&model, &text, &facets, &conversation_id)
            .await;

        let judgments: Vec<FacetJudgment> = facet_scores.values().cloned().collect();
        let weighted_score = self.evaluator().try_weighted_score(&judgments);
        let confidence_metrics = self.inner.calculator.calculate(&judgments);

        let processing_time = started.elapsed().as_secs_f64();
        tracing::debug!(
            "{}: aggregated (weighted score: {:?}, confidence: {:.3}) in {:.3}s",
            conversation_id,
            weighted_score,
            confidence_metrics.overall_confidence,
            processing_time
        );

        Ok(ConversationEvaluation {
            conversation_id,
            conversation_text: text,
            facet_scores,
            weighted_score,
            confidence_metrics,
            processing_time,
            model_used: model.identifier().to_string(),
            timestamp: Utc::now(),
            failure: None,
        })
    }

    /// Judge facets in sub-batches on the worker pool and merge in request order.
    ///
    /// Every requested facet gets exactly one judgment: a sub-batch that panics,
    /// times out or omits a facet yields degraded judgments, and facets the model
    /// returns without being asked are dropped.
    ///
    /// A timed-out judge call gives its permit back immediately; the blocking
    /// thread finishes on its own and its result is discarded.
    async fn judge_facets(
        &self,
        model: &Arc<dyn JudgeModel>,
        text: &str,
        facets: &[String],
        conversation_id: &str,
    ) -> BTreeMap<String, FacetJudgment> {
        let chunks: Vec<Vec<String>> = facets
            .chunks(self.inner.config.facet_batch_size.max(1))
            .map(<[String]>::to_vec)
            .collect();
        let text: Arc<str> = Arc::from(text);
        let limit = self.step_timeout();

        let mut tasks = JoinSet::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let model = Arc::clone(model);
            let text = Arc::clone(&text);
            let chunk = chunk.clone();
            let workers = Arc::clone(&self.inner.workers);

            tasks.spawn(async move {
                let permit = match workers.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, Err(e.to_string())),
                };

                let judging = tokio::task::spawn_blocking(move || model.judge(&text, &chunk));
                let outcome: SubBatchOutcome = match limit {
                    Some(limit) => match tokio::time::timeout(limit, judging).await {
                        Ok(joined) => joined.map_err(|e| e.to_string()),
                        Err(_) => Err(format!("judge call timed out after {}s", limit.as_secs())),
                    },
                    None => judging.await.map_err(|e| e.to_string()),
                };
                drop(permit);
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<SubBatchOutcome>> = (0..chunks.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::warn!("{}: sub-batch task failed: {}", conversation_id, e),
            }
        }

        let mut merged = BTreeMap::new();
        for (chunk, outcome) in chunks.iter().zip(outcomes) {
            match outcome.unwrap_or_else(|| Err("sub-batch did not complete".to_string())) {
                Ok(judgments) => {
                    let mut returned: HashMap<String, FacetJudgment> = judgments
                        .into_iter()
                        .map(|j| (j.facet().to_string(), j))
                        .collect();

                    for facet in chunk {
                        let judgment = returned.remove(facet).unwrap_or_else(|| {
                            tracing::warn!(
                                "{}: model returned no judgment for {}",
                                conversation_id,
                                facet
                            );
                            FacetJudgment::degraded(facet, "no judgment returned by model")
                        });
                        merged.insert(facet.clone(), judgment);
                    }

                    if !returned.is_empty() {
                        tracing::debug!(
                            "{}: dropped {} unrequested judgment(s)",
                            conversation_id,
                            returned.len()
                        );
                    }
                }
                Err(reason) => {
                    tracing::warn!(
                        "{}: sub-batch [{}] failed: {}",
                        conversation_id,
                        chunk.join(", "),
                        reason
                    );
                    for facet in chunk {
                        merged.insert(facet.clone(), FacetJudgment::degraded(facet, &reason));
                    }
                }
            }
        }

        merged
    }

    /// Evaluate many conversations concurrently.
    ///
    /// Only an empty batch or an empty facet list fails the call. A conversation
    /// that cannot be evaluated is represented by a failure placeholder at its
    /// position, with every facet degraded.
    pub async fn batch_evaluate<C, S>(
        &self,
        conversations: impl IntoIterator<Item = C>,
        facets: &[S],
        model_name: Option<&str>,
    ) -> Result<BatchEvaluationResult>
    where
        C: Into<ConversationTurn>,
        S: AsRef<str>,
    {
        let turns: Vec<ConversationTurn> = conversations.into_iter().map(Into::into).collect();
        if turns.is_empty() {
            return Err(EvalError::invalid_input("conversation batch is empty"));
        }
        let facets = requested_facets(facets)?;

        let started = Instant::now();
        let batch_token = generate_batch_token();
        tracing::info!(
            "Batch {}: evaluating {} conversation(s) on {} facet(s)",
            batch_token,
            turns.len(),
            facets.len()
        );

        let ids: Vec<String> = (0..turns.len())
            .map(|index| format!("{}_conv_{}", batch_token, index))
            .collect();

        let mut tasks = JoinSet::new();
        for (index, turn) in turns.iter().enumerate() {
            let engine = self.clone();
            let turn = turn.clone();
            let facets = Arc::clone(&facets);
            let conversation_id = ids[index].clone();
            let model_name = model_name.map(str::to_string);

            tasks.spawn(async move {
                let result = engine
                    .evaluate_turn(turn, facets, conversation_id, model_name)
                    .await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<ConversationEvaluation>>> =
            (0..turns.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!("Batch {}: evaluation task failed: {}", batch_token, e),
            }
        }

        let evaluations: Vec<ConversationEvaluation> = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(EvalError::TaskFailed("evaluation task did not complete".to_string()))
                });
                match result {
                    Ok(evaluation) => evaluation,
                    Err(e) => {
                        tracing::warn!("Batch {}: {} failed: {}", batch_token, ids[index], e);
                        self.failed_evaluation(&ids[index], &turns[index], &facets, model_name, &e)
                    }
                }
            })
            .collect();

        let total_processing_time = started.elapsed().as_secs_f64();
        let result = BatchEvaluationResult::from_evaluations(
            evaluations,
            &facets[..],
            total_processing_time,
        );

        tracing::info!(
            "Batch {}: {} evaluated, {} failed in {:.2}s (average confidence {:.3})",
            batch_token,
            result.evaluations.len() - result.failed_count,
            result.failed_count,
            total_processing_time,
            result.average_confidence
        );
        Ok(result)
    }

    /// Placeholder for a conversation that produced no evaluation
    fn failed_evaluation(
        &self,
        conversation_id: &str,
        turn: &ConversationTurn,
        facets: &[String],
        model_name: Option<&str>,
        error: &EvalError,
    ) -> ConversationEvaluation {
        let reason = error.to_string();
        let facet_scores: BTreeMap<String, FacetJudgment> = facets
            .iter()
            .map(|facet| (facet.clone(), FacetJudgment::degraded(facet, &reason)))
            .collect();
        let judgments: Vec<FacetJudgment> = facet_scores.values().cloned().collect();

        ConversationEvaluation {
            conversation_id: conversation_id.to_string(),
            conversation_text: self.inner.normalizer.clean(&turn.text),
            confidence_metrics: self.inner.calculator.calculate(&judgments),
            weighted_score: self.evaluator().try_weighted_score(&judgments),
            facet_scores,
            processing_time: 0.0,
            model_used: model_name
                .unwrap_or(self.inner.config.default_model.as_str())
                .to_string(),
            timestamp: Utc::now(),
            failure: Some(reason),
        }
    }

    /// Evaluate one conversation with several models concurrently, keyed by model name.
    ///
    /// Duplicate names are evaluated once. Models that fail are left out with a
    /// warning; if every model fails, the first failure (in request order) is returned.
    pub async fn evaluate_with_multiple_models<S, M>(
        &self,
        conversation: impl Into<ConversationTurn>,
        facets: &[S],
        model_names: &[M],
    ) -> Result<BTreeMap<String, ConversationEvaluation>>
    where
        S: AsRef<str>,
        M: AsRef<str>,
    {
        let facets = requested_facets(facets)?;

        let mut seen = HashSet::new();
        let models: Vec<String> = model_names
            .iter()
            .map(|m| m.as_ref().to_string())
            .filter(|m| seen.insert(m.clone()))
            .collect();
        if models.is_empty() {
            return Err(EvalError::invalid_input("model list is empty"));
        }

        let turn: ConversationTurn = conversation.into();
        let conversation_id = generate_conversation_id();
        tracing::info!("{}: evaluating with {} model(s)", conversation_id, models.len());

        let mut tasks = JoinSet::new();
        for (index, model) in models.iter().enumerate() {
            let engine = self.clone();
            let turn = turn.clone();
            let facets = Arc::clone(&facets);
            let conversation_id = conversation_id.clone();
            let model = model.clone();

            tasks.spawn(async move {
                let result = engine
                    .evaluate_turn(turn, facets, conversation_id, Some(model))
                    .await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<ConversationEvaluation>>> =
            (0..models.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!("{}: model task failed: {}", conversation_id, e),
            }
        }

        let mut evaluations = BTreeMap::new();
        let mut first_error = None;
        for (model, result) in models.iter().zip(results) {
            match result.unwrap_or_else(|| {
                Err(EvalError::TaskFailed(format!("evaluation with {} did not complete", model)))
            }) {
                Ok(evaluation) => {
                    evaluations.insert(model.clone(), evaluation);
                }
                Err(e) => {
                    tracing::warn!("{}: model {} failed: {}", conversation_id, model, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if evaluations.is_empty() => Err(e),
            _ => Ok(evaluations),
        }
    }

    pub fn compare_evaluations(
        &self,
        evaluations: &BTreeMap<String, ConversationEvaluation>,
    ) -> Result<ModelComparison> {
        compare::compare_evaluations(evaluations)
    }

    pub fn export<T: Exportable>(&self, value: &T, format: ExportFormat) -> Result<String> {
        export::export(value, format)
    }

    pub fn list_supported_models(&self) -> Vec<String> {
        self.inner.models.supported_models()
    }

    pub async fn model_info(&self, model_name: &str) -> Option<ModelInfo> {
        self.inner.models.model_info(model_name).await
    }

    pub async fn unload_model(&self, model_name: &str) -> bool {
        self.inner.models.unload(model_name).await
    }

    /// Release every cached model. Evaluations already holding a handle finish normally.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down evaluation engine");
        self.inner.models.shutdown().await;
    }
}

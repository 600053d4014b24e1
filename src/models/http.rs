//! Text-generation model behind an HTTP endpoint
//!
//! One prompt per facet, answered in a `Score: / Reasoning:` format. The
//! endpoint may be any server that takes `{model, prompt, max_tokens,
//! temperature}` and returns generated text as `text`, `generated_text`,
//! `choices[0].text` or `[0].generated_text`.
//!
//! Requests go through the async client and are driven to completion on the
//! runtime handle captured at construction, so `judge` must run on a blocking
//! thread (the engine's worker pool), never on an async worker.

use super::JudgeModel;
use crate::config::ModelsConfig;
use crate::types::{FacetJudgment, NEUTRAL_SCORE};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

pub struct HttpModel {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
    runtime: tokio::runtime::Handle,
}

impl HttpModel {
    pub fn new(name: &str, config: &ModelsConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("HTTP models must be created inside a tokio runtime")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Self {
            name: name.to_string(),
            endpoint: config.endpoint.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
            runtime,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.name,
            "prompt": prompt,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("API error ({}): {}", status, error_text));
        }

        let json: serde_json::Value = response.json().await?;
        extract_generated_text(&json).ok_or_else(|| anyhow!("No generated text in response"))
    }

    fn judge_one(&self, conversation: &str, facet: &str) -> FacetJudgment {
        let prompt = build_evaluation_prompt(conversation, facet);
        match self.runtime.block_on(self.generate(&prompt)) {
            Ok(text) => {
                let confidence = heuristic_confidence(&prompt, &text);
                parse_evaluation_output(facet, &text, confidence)
            }
            Err(e) => {
                tracing::warn!("Error evaluating facet {} with {}: {}", facet, self.name, e);
                FacetJudgment::degraded(facet, e)
            }
        }
    }
}

impl JudgeModel for HttpModel {
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

fn extract_generated_text(json: &serde_json::Value) -> Option<String> {
    json.get("text")
        .or_else(|| json.get("generated_text"))
        .or_else(|| json.pointer("/choices/0/text"))
        .or_else(|| json.pointer("/0/generated_text"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn facet_description(facet: &str) -> String {
    let known = match facet {
        "grammar" => "grammatical correctness, including syntax, tense usage, and sentence structure",
        "coherence" => "logical flow and consistency of ideas throughout the conversation",
        "fluency" => "natural and smooth expression of language",
        "vocabulary_richness" => "diversity and sophistication of vocabulary used",
        "clarity" => "how clear and understandable the message is",
        "appropriateness" => "suitability of the response given the context",
        "politeness" => "level of courtesy and respectfulness in the conversation",
        "relevance" => "how relevant the response is to the conversation topic",
        "toxicity" => "presence of harmful, offensive, or toxic content",
        "empathy" => "demonstration of understanding and caring for others",
        "sentiment" => "overall emotional tone of the conversation",
        _ => return format!("quality of {}", facet.replace('_', " ")),
    };
    known.to_string()
}

/// Build the prompt for judging one facet
pub fn build_evaluation_prompt(conversation: &str, facet: &str) -> String {
    format!(
        r#"You are an expert conversation analyst. Evaluate the following conversation turn for {description}.

Conversation: "{conversation}"

Please evaluate this conversation on a scale of 1-5 where:
1 = Very Poor
2 = Poor
3 = Average
4 = Good
5 = Excellent

Provide your evaluation in the following format:
Score: [1-5]
Reasoning: [Brief explanation for your score]

Evaluation:"#,
        description = facet_description(facet),
        conversation = conversation,
    )
}

fn score_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Score:\s*(\d+)").expect("static regex"))
}

fn reasoning_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Reasoning:\s*([^\n]+)").expect("static regex"))
}

/// Parse the model's answer. Missing fields fall back to a neutral score.
pub fn parse_evaluation_output(facet: &str, text: &str, confidence: f64) -> FacetJudgment {
    let text = text.trim();

    let score = score_pattern()
        .captures(text)
        // The capture is all digits, so a failed parse can only be an overflow
        .map(|c| c[1].parse::<i64>().unwrap_or(i64::MAX))
        .unwrap_or(NEUTRAL_SCORE as i64);

    let reasoning = reasoning_pattern()
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| "Unable to parse evaluation".to_string());

    FacetJudgment::new(facet, score, confidence, reasoning)
}

/// Rough confidence from the shape of the answer: length, punctuation, overlap with the prompt
pub fn heuristic_confidence(prompt: &str, generated: &str) -> f64 {
    let mut confidence: f64 = 0.5;

    let word_count = generated.split_whitespace().count();
    if (10..=100).contains(&word_count) {
        confidence += 0.2;
    }

    if generated.contains(['.', '!', '?']) {
        confidence += 0.1;
    }

    let prompt_words: HashSet<String> =
        prompt.split_whitespace().map(|w| w.to_lowercase()).collect();
    if generated
        .split_whitespace()
        .any(|w| prompt_words.contains(&w.to_lowercase()))
    {
        confidence += 0.2;
    }

    confidence.min(1.0)
}

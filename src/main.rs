//! facet-eval CLI
//!
//! Scores conversations on quality facets with one or more judge models.
//!
//! Run with: cargo run -- evaluate "How can I help you today?" --facets=grammar,politeness
//! Logs go to stderr; set RUST_LOG=facet_eval=debug for per-conversation detail.

use anyhow::{bail, Context, Result};
use facet_eval::{
    config::{EngineConfig, CONFIG_ENV_VAR},
    export::ExportFormat,
    types::*,
    EvaluationEngine,
};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: facet-eval [--config=<path>] <command> [options]

Commands:
  evaluate <text>      Evaluate one conversation turn
  batch <file>         Evaluate every line (or JSON array entry) in a file
  compare <text>       Evaluate with several models and compare them (--models=a,b)
  facets               List known facets with category and weight
  models               List supported models

Options:
  --facets=a,b,c       Facets to evaluate (default: every known facet)
  --model=<name>       Judge model (default from config)
  --models=a,b         Judge models for compare
  --id=<id>            Conversation id for evaluate
  --json               Print JSON instead of a report
  --format=json|yaml   Export format for machine-readable output";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config = match option_value(&args, "--config=") {
        Some(path) => EngineConfig::load(Path::new(path))?,
        None => EngineConfig::from_env_or_default()
            .with_context(|| format!("Failed to load config from ${}", CONFIG_ENV_VAR))?,
    };

    let positional: Vec<&str> = args[1..]
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(|s| s.as_str())
        .collect();

    let Some(command) = positional.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let engine = EvaluationEngine::new(config)?;
    let output = OutputMode::from_args(&args)?;
    let facets = requested_facets(&args, &engine);
    let model = option_value(&args, "--model=");

    let result = match *command {
        "evaluate" => {
            let text = positional[1..].join(" ");
            let id = option_value(&args, "--id=");
            run_evaluate(&engine, &text, &facets, id, model, output).await
        }
        "batch" => {
            let path = positional.get(1).context("Usage: batch <file>")?;
            run_batch(&engine, Path::new(path), &facets, model, output).await
        }
        "compare" => {
            let text = positional[1..].join(" ");
            let models: Vec<String> = option_value(&args, "--models=")
                .map(split_list)
                .unwrap_or_default();
            run_compare(&engine, &text, &facets, &models, output).await
        }
        "facets" => {
            run_facets(&engine);
            Ok(())
        }
        "models" => {
            run_models(&engine).await;
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            Ok(())
        }
    };

    engine.shutdown().await;
    result
}

#[derive(Debug, Clone, Copy)]
enum OutputMode {
    Report,
    Export(ExportFormat),
}

impl OutputMode {
    fn from_args(args: &[String]) -> Result<Self> {
        if let Some(format) = option_value(args, "--format=") {
            return Ok(OutputMode::Export(format.parse()?));
        }
        if args.iter().any(|a| a == "--json") {
            return Ok(OutputMode::Export(ExportFormat::Json));
        }
        Ok(OutputMode::Report)
    }
}

fn option_value<'a>(args: &'a [String], prefix: &str) -> Option<&'a str> {
    args.iter().find_map(|a| a.strip_prefix(prefix))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn requested_facets(args: &[String], engine: &EvaluationEngine) -> Vec<String> {
    match option_value(args, "--facets=") {
        Some(list) => split_list(list),
        None => engine
            .facet_registry()
            .known_facets()
            .map(|f| f.name.clone())
            .collect(),
    }
}

async fn run_evaluate(
    engine: &EvaluationEngine,
    text: &str,
    facets: &[String],
    id: Option<&str>,
    model: Option<&str>,
    output: OutputMode,
) -> Result<()> {
    if text.trim().is_empty() {
        bail!("Usage: evaluate <text> [--facets=a,b] [--model=name]");
    }

    let evaluation = engine
        .evaluate_conversation(text, facets, id, model)
        .await?;

    match output {
        OutputMode::Export(format) => println!("{}", engine.export(&evaluation, format)?),
        OutputMode::Report => print_evaluation(engine, &evaluation),
    }
    Ok(())
}

/// `.json` files hold an array of turns (or strings); anything else is one turn per line
fn read_conversations(path: &Path) -> Result<Vec<ConversationTurn>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let values: Vec<serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("{} is not a JSON array", path.display()))?;
        return values
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(text) => Ok(ConversationTurn::new(text)),
                other => serde_json::from_value(other).context("Invalid conversation turn"),
            })
            .collect();
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ConversationTurn::new)
        .collect())
}

async fn run_batch(
    engine: &EvaluationEngine,
    path: &Path,
    facets: &[String],
    model: Option<&str>,
    output: OutputMode,
) -> Result<()> {
    let conversations = read_conversations(path)?;
    let result = engine.batch_evaluate(conversations, facets, model).await?;

    match output {
        OutputMode::Export(format) => println!("{}", engine.export(&result, format)?),
        OutputMode::Report => print_batch(&result),
    }
    Ok(())
}

async fn run_compare(
    engine: &EvaluationEngine,
    text: &str,
    facets: &[String],
    models: &[String],
    output: OutputMode,
) -> Result<()> {
    if models.len() < 2 {
        bail!("Usage: compare <text> --models=a,b [--facets=a,b]");
    }

    let start = Instant::now();
    let evaluations = engine
        .evaluate_with_multiple_models(text, facets, models)
        .await?;
    let comparison = engine.compare_evaluations(&evaluations)?;

    match output {
        OutputMode::Export(format) => println!("{}", engine.export(&comparison, format)?),
        OutputMode::Report => print_comparison(&comparison, start.elapsed()),
    }
    Ok(())
}

fn run_facets(engine: &EvaluationEngine) {
    let registry = engine.facet_registry();
    for category in FacetCategory::ALL {
        let names = registry.facets_in(category);
        if names.is_empty() {
            continue;
        }
        println!("\n{}:", category.name().to_uppercase());
        for name in names {
            println!("   {:<24} weight {:.1}", name, registry.weight_of(name));
        }
    }
    println!();
}

async fn run_models(engine: &EvaluationEngine) {
    let supported = engine.list_supported_models();
    if supported.is_empty() {
        println!("Any model name is accepted (default: {})", engine.config().default_model);
        return;
    }
    for name in supported {
        match engine.model_info(&name).await {
            Some(info) => println!(
                "   {:<24} {:?}{}",
                info.name,
                info.backend,
                if info.loaded { " (loaded)" } else { "" }
            ),
            None => println!("   {}", name),
        }
    }
}

fn print_evaluation(engine: &EvaluationEngine, evaluation: &ConversationEvaluation) {
    println!("\n┌────────────────────────────────────────────────────────────┐");
    println!("│ CONVERSATION EVALUATION                                    │");
    println!("└────────────────────────────────────────────────────────────┘");
    println!("Id:      {}", evaluation.conversation_id);
    println!("Model:   {}", evaluation.model_used);
    println!("Text:    {}", truncate(&evaluation.conversation_text, 60));
    println!();

    let registry = engine.facet_registry();
    for category in FacetCategory::ALL {
        let judgments: Vec<&FacetJudgment> = evaluation
            .judgments()
            .filter(|j| registry.category_of(j.facet()) == category)
            .collect();
        if judgments.is_empty() {
            continue;
        }
        println!("{}", category.name().to_uppercase());
        for judgment in judgments {
            let bar = "█".repeat(judgment.score() as usize);
            println!(
                "   {:<22} [{:<5}] {} ({}) {:.0}%{}",
                judgment.facet(),
                bar,
                judgment.score(),
                judgment.level().label(),
                judgment.confidence() * 100.0,
                if judgment.is_degraded() { " degraded" } else { "" }
            );
        }
    }

    let metrics = &evaluation.confidence_metrics;
    println!("────────────────────────────────────────────────────────────");
    match evaluation.weighted_score {
        Some(score) => println!("Weighted score:   {:.2}", score),
        None => println!("Weighted score:   n/a (no confident judgments)"),
    }
    println!(
        "Confidence:       {:.0}% (model-weighted {:.0}%)",
        metrics.overall_confidence * 100.0,
        metrics.model_confidence * 100.0
    );
    println!("Consistency:      {:.2}", metrics.consistency_score);
    println!("Uncertainty:      {:.2}", metrics.uncertainty_estimate);
    println!("Processing time:  {:.0}ms", evaluation.processing_time * 1000.0);
}

fn print_batch(result: &BatchEvaluationResult) {
    println!("\n┌────────────────────────────────────────────────────────────┐");
    println!("│ BATCH EVALUATION                                           │");
    println!("└────────────────────────────────────────────────────────────┘");
    println!(
        "{} conversation(s), {} failed, {:.2}s total, average confidence {:.0}%\n",
        result.evaluations.len(),
        result.failed_count,
        result.total_processing_time,
        result.average_confidence * 100.0
    );

    println!(
        "   {:<22} {:>6} {:>5} {:>5} {:>6} {:>6}",
        "facet", "mean", "min", "max", "std", "n"
    );
    for (facet, stats) in &result.facet_statistics {
        println!(
            "   {:<22} {:>6.2} {:>5} {:>5} {:>6.2} {:>6}",
            facet,
            stats.mean_score,
            stats.min_score,
            stats.max_score,
            stats.score_std,
            stats.evaluation_count
        );
    }

    let failed: Vec<_> = result.evaluations.iter().filter(|e| e.is_failed()).collect();
    if !failed.is_empty() {
        println!("\nFailed:");
        for evaluation in failed {
            println!(
                "   {} {}",
                evaluation.conversation_id,
                evaluation.failure.as_deref().unwrap_or_default()
            );
        }
    }
}

fn print_comparison(comparison: &ModelComparison, elapsed: std::time::Duration) {
    println!("\n┌────────────────────────────────────────────────────────────┐");
    println!("│ MODEL COMPARISON                                           │");
    println!("└────────────────────────────────────────────────────────────┘");

    for (facet, agreement) in &comparison.model_agreements {
        let scores = comparison
            .score_differences
            .get(facet)
            .map(|m| {
                m.iter()
                    .map(|(model, score)| format!("{}={}", model, score))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        println!(
            "   {:<22} agreement {:.2}  consensus {:.2}  {}",
            facet,
            agreement,
            comparison.consensus_scores.get(facet).copied().unwrap_or_default(),
            scores
        );
    }

    match comparison.mean_agreement {
        Some(mean) => println!("\nMean agreement: {:.2}", mean),
        None => println!("\nNo facet was judged by more than one model"),
    }
    println!("Completed in {:.0}ms", elapsed.as_millis());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max - 3).collect::<String>())
    }
}

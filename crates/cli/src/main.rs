use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lumen_core::{
    build_retrieval_terms, extract_model_tokens, looks_like_model_compare, Document, SlotValues,
};
use lumen_engine::GovernanceEngine;
use lumen_observability::{init_tracing, DecisionMetrics};
use lumen_rules::load_rules;

#[derive(Debug, Parser)]
#[command(name = "lumen")]
#[command(about = "Lumen governance CLI")]
struct Cli {
    #[arg(long, default_value = "rules/default.rules")]
    rules: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse the rule file and print a summary, exiting non-zero on errors.
    Validate,
    /// Show the extracted slots, FAQ routing, and domain tags for one query.
    Classify { query: String },
    /// Run the full decision pipeline for one query.
    Decide {
        query: String,
        /// JSON file with the retriever's candidate documents.
        #[arg(long)]
        candidates: Option<PathBuf>,
        #[arg(long)]
        object: Option<String>,
        #[arg(long)]
        metric: Option<String>,
        #[arg(long)]
        context: Option<String>,
    },
    /// Print the retrieval query terms derived from a query.
    Terms { query: String },
    /// Interactive loop: one decision per input line.
    Repl {
        #[arg(long)]
        candidates: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing("lumen_cli");
    let cli = Cli::parse();

    let rules = Arc::new(load_rules(&cli.rules)?);

    match cli.command {
        Command::Validate => {
            println!(
                "ok: {} tiers, {} documents, {} faq rules, {} high-risk domains",
                rules.table.tier_count(),
                rules.table.document_count(),
                rules.faq.rules().len(),
                rules.policy.high_risk.len()
            );
        }
        Command::Classify { query } => {
            let engine = build_engine(rules);
            let ctx = engine.classify(&query, SlotValues::default());
            println!("{}", serde_json::to_string_pretty(&ctx)?);
            if looks_like_model_compare(&query) {
                println!(
                    "note: spec comparison between {}",
                    extract_model_tokens(&query).join(" and ")
                );
            }
        }
        Command::Decide {
            query,
            candidates,
            object,
            metric,
            context,
        } => {
            let engine = build_engine(rules);
            let supplied = SlotValues {
                measurement_object: object,
                measurement_metric: metric,
                usage_context: context,
            };
            let candidates = load_candidates(candidates.as_deref())?;
            let ctx = engine.classify(&query, supplied);
            let decision = engine.decide(&ctx, &candidates);
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Terms { query } => {
            let engine = build_engine(rules);
            let ctx = engine.classify(&query, SlotValues::default());
            let terms = build_retrieval_terms(&ctx, &query);
            println!("{}", serde_json::to_string_pretty(&terms)?);
        }
        Command::Repl { candidates } => {
            let engine = build_engine(rules);
            let candidates = load_candidates(candidates.as_deref())?;
            run_repl(&engine, &candidates)?;
        }
    }

    Ok(())
}

fn build_engine(rules: Arc<lumen_rules::RuleSet>) -> GovernanceEngine {
    GovernanceEngine::new(rules, DecisionMetrics::shared())
}

fn load_candidates(path: Option<&Path>) -> Result<Vec<Document>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading candidates from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid candidate JSON in {}", path.display()))
}

fn run_repl(engine: &GovernanceEngine, candidates: &[Document]) -> Result<()> {
    println!("Lumen decision loop. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let ctx = engine.classify(query, SlotValues::default());
        let decision = engine.decide(&ctx, candidates);
        println!("{}\n", serde_json::to_string_pretty(&decision)?);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&engine.metrics().snapshot())?
    );

    Ok(())
}

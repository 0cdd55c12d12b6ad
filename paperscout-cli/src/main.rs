//! Paperscout CLI: run an academic literature research query end to end.

mod approval;

use clap::Parser;
use paperscout_core::error::{PaperscoutError, WorkflowError};
use paperscout_core::llm::LlmClient;
use paperscout_core::workflow::{ApprovalHandler, ResearchState, create_research_workflow};
use paperscout_tools::{ArxivClient, SemanticScholarClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Paperscout: an autonomous academic literature research agent
#[derive(Parser, Debug)]
#[command(name = "paperscout", version, about, long_about = None)]
struct Cli {
    /// Research question to investigate
    query: String,

    /// Run fully automated (skip the sub-query approval gate)
    #[arg(short, long)]
    automated: bool,

    /// Write the final report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the final research state as a JSON checkpoint
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Override the reflect -> search loop cap
    #[arg(long)]
    max_loops: Option<usize>,

    /// Workspace directory (for .paperscout/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "paperscout", "paperscout")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "paperscout.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace and load layered configuration
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let mut config = paperscout_core::config::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    if cli.automated {
        config.workflow.enable_approval = false;
    }
    if let Some(max_loops) = cli.max_loops {
        config.workflow.max_loop_iterations = max_loops;
    }

    // Wire the LLM client (primary + fallbacks behind a circuit breaker)
    let provider = paperscout_core::llm::providers::create_provider(&config.llm)
        .map_err(|e| anyhow::anyhow!("LLM provider error: {}", e))?;
    let llm = Arc::new(LlmClient::new(provider, config.llm.max_tokens));
    tracing::info!(model = llm.model_name(), "LLM client ready");

    // Paper sources
    let scholar = Arc::new(
        SemanticScholarClient::new(&config.search)
            .map_err(|e| anyhow::anyhow!("Semantic Scholar client error: {}", e))?,
    );
    let arxiv = Arc::new(
        ArxivClient::new(&config.search)
            .map_err(|e| anyhow::anyhow!("arXiv client error: {}", e))?,
    );

    let approval: Option<Arc<dyn ApprovalHandler>> = if config.workflow.enable_approval {
        Some(Arc::new(approval::TerminalApprovalHandler))
    } else {
        None
    };

    let executor = create_research_workflow(
        llm.clone(),
        scholar.clone(),
        arxiv,
        scholar,
        approval,
        &config,
    );

    println!("\nResearching: {}\n", cli.query);

    let state = match executor.run(ResearchState::new(cli.query.as_str())).await {
        Ok(state) => state,
        Err(WorkflowError::Aborted { reason }) => {
            eprintln!("\nResearch aborted: {}", reason);
            std::process::exit(1);
        }
        Err(e) => return Err(PaperscoutError::from(e).into()),
    };

    // Summary
    println!("\n{}", "=".repeat(60));
    println!("Research complete in {:.1}s", state.execution_time);
    println!(
        "Papers analyzed: {} | Key findings: {} | Errors: {}",
        state.analyzed_papers.len(),
        state.key_findings.len(),
        state.error_count,
    );
    let stats = llm.stats();
    println!(
        "LLM usage: {} calls, {} tokens",
        stats.calls,
        stats.total_tokens()
    );
    println!("{}\n", "=".repeat(60));

    // Report
    if let Some(path) = &cli.output {
        std::fs::write(path, &state.final_report)?;
        println!("Report written to {}", path.display());
    } else {
        println!("{}", state.final_report);
    }

    if let Some(path) = &cli.checkpoint {
        paperscout_core::checkpoint::save(&state, path)?;
        println!("Checkpoint saved to {}", path.display());
    }

    Ok(())
}

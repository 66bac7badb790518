//! # kyrodrift-replay
//!
//! Replays newline-delimited JSON batch requests against an in-memory ledger
//! and writes one JSON batch response per line to stdout. Logs go to stderr.
//!
//! ```text
//! kyrodrift-replay --input batches.ndjson --config drift.json --dump-ledger
//! ```

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use kyrodrift::{
    BatchRequest, BehaviorFilter, DriftRuntime, PageRequest, ResolutionConfig, ResolutionEngine,
    RuntimeConfig,
};

/// Replay candidate batches through the resolution engine
#[derive(Parser)]
#[command(name = "kyrodrift-replay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file (defaults plus env overrides otherwise)
    #[arg(short, long, env = "KYRODRIFT_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// NDJSON file of batch requests; reads stdin when omitted
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Number of user lanes
    #[arg(long, default_value_t = RuntimeConfig::default().lanes)]
    lanes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "KYRODRIFT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print every replayed user's final ledger after the responses
    #[arg(long)]
    dump_ledger: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let config = ResolutionConfig::load(cli.config.as_deref()).context("Invalid configuration")?;
    let (engine, _stores) = ResolutionEngine::in_memory(config).context("Failed to start engine")?;
    let runtime = DriftRuntime::new(
        engine,
        &RuntimeConfig {
            lanes: cli.lanes,
            ..RuntimeConfig::default()
        },
    )
    .context("Failed to start runtime")?;

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut users = BTreeSet::new();
    let mut batches = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let request: BatchRequest = serde_json::from_str(&line)
            .with_context(|| format!("Line {}: malformed batch request", idx + 1))?;
        users.insert(request.user_id.clone());

        let response = runtime
            .process(request)
            .with_context(|| format!("Line {}: batch failed", idx + 1))?;
        serde_json::to_writer(&mut out, &response)?;
        writeln!(out)?;
        batches += 1;
    }

    if cli.dump_ledger {
        for user_id in &users {
            dump_ledger(runtime.engine(), user_id, &mut out)?;
        }
    }

    out.flush()?;
    info!("Replayed {batches} batches for {} users", users.len());
    Ok(())
}

fn dump_ledger(engine: &ResolutionEngine, user_id: &str, out: &mut impl Write) -> Result<()> {
    let mut page = PageRequest::new(0, PageRequest::MAX_LIMIT)?;
    let mut behaviors = Vec::new();
    loop {
        let result = engine.list_behaviors(user_id, &BehaviorFilter::default(), page)?;
        let more = result.has_more();
        behaviors.extend(result.items);
        if !more {
            break;
        }
        page = page.next();
    }

    serde_json::to_writer(
        &mut *out,
        &serde_json::json!({ "user_id": user_id, "behaviors": behaviors }),
    )?;
    writeln!(out)?;
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

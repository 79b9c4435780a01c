use anyhow::Context;
use clap::Parser;
use ollama_agent::OllamaClient;
use restore_core::config::{self, OutputFormat, DEFAULT_MAX_LINES, DEFAULT_MODEL};
use restore_core::evidence::{run_evidence_gathering, EvidenceSearchTools};
use restore_core::io::atomic_write;
use restore_core::render;
use restore_core::transcript::{self, LogParser};
use restore_core::turn::TurnParser;
use restore_core::{process_turns_incrementally, SummaryBackend};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(
    name = "opencode-restore",
    about = "Summarize an OpenCode .raw.log transcript into a session rehydration document",
    version
)]
struct Cli {
    /// Path to the OpenCode .raw.log transcript file
    log_file: PathBuf,

    /// Logical session name (defaults to the filename stem)
    #[arg(long)]
    session_name: Option<String>,

    /// Ollama model to use
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Max number of transcript lines to keep from the tail
    #[arg(long, default_value_t = DEFAULT_MAX_LINES)]
    max_lines: usize,

    /// Output file path (default: SUMMARY_<session>.<ext>)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "md", value_parser = ["md", "json"])]
    format: String,

    /// Remove consecutive duplicate lines from the transcript
    #[arg(long)]
    dedupe: bool,

    /// Include script header info in the summary
    #[arg(long)]
    include_header: bool,

    /// Limit the number of turns to process
    #[arg(long)]
    max_turns: Option<usize>,

    /// Skip the agentic evidence gathering phase
    #[arg(long)]
    skip_evidence_search: bool,

    /// Max evidence search iterations
    #[arg(long)]
    max_searches: Option<usize>,

    /// Write turn-by-turn summaries to a TURNS_ file alongside the summary
    #[arg(long)]
    dump_turns: bool,

    /// Dry-run without a model: every turn summary parses empty and the
    /// session summary is synthesized directly from accumulated state
    #[arg(long)]
    no_llm: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::from_str(&cli.format)?;

    tracing::info!(path = %cli.log_file.display(), "parsing log file");
    let log_parser = LogParser::new();
    let parsed = log_parser
        .parse_file(&cli.log_file)
        .context("failed to parse log file")?;

    let header = parsed.header;
    let mut content = parsed.content;
    if cli.dedupe {
        content = transcript::deduplicate(&content);
    }
    let tail = transcript::tail(&content, cli.max_lines);

    let session_name = cli.session_name.unwrap_or(parsed.session_name);

    let turn_parser = TurnParser::new();
    let mut turns = turn_parser.parse_turns(tail);
    if let Some(max) = cli.max_turns {
        turns.truncate(max);
    }
    tracing::info!(turns = turns.len(), "found turns in transcript");

    let client = if cli.no_llm {
        None
    } else {
        tracing::info!(model = %cli.model, "running model");
        Some(OllamaClient::new(cli.model.as_str()).context("failed to locate the ollama binary")?)
    };
    let backend = client.as_ref().map(|c| c as &dyn SummaryBackend);

    let digest = process_turns_incrementally(&session_name, &turns, backend)
        .context("turn summarization failed")?;

    let out_path = cli
        .out
        .unwrap_or_else(|| config::default_output_path(&session_name, format));

    if cli.dump_turns {
        let file_name = out_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{session_name}.{}", format.extension()));
        let dump_path = out_path.with_file_name(format!("TURNS_{file_name}"));
        atomic_write(
            &dump_path,
            render::render_turns(&digest.turn_summaries).as_bytes(),
        )
        .context("failed to write turn summaries")?;
        tracing::info!(path = %dump_path.display(), "wrote turn summaries");
    }

    let body = match format {
        OutputFormat::Json => render::render_digest_json(&digest)?,
        OutputFormat::Md => {
            let summary = match (&client, cli.skip_evidence_search) {
                (Some(client), false) => {
                    tracing::info!("running agentic evidence gathering");
                    let mut tools = EvidenceSearchTools::new(
                        &cli.log_file,
                        None,
                        digest.accumulated_state.artifacts.clone(),
                    )
                    .context("failed to load log for evidence search")?;
                    if let Some(max) = cli.max_searches {
                        tools.max_searches = max;
                    }
                    run_evidence_gathering(
                        &digest.turn_summaries,
                        &digest.accumulated_state,
                        client,
                        &tools,
                        &session_name,
                    )
                    .context("evidence gathering failed")?
                }
                _ => render::synthesize_summary(&digest.accumulated_state, &session_name),
            };
            match (&header, cli.include_header) {
                (Some(h), true) => format!("{}{summary}", render::header_preamble(h)),
                _ => summary,
            }
        }
    };

    atomic_write(&out_path, format!("{body}\n").as_bytes()).context("failed to write summary")?;
    tracing::info!(path = %out_path.display(), "wrote session summary");

    Ok(())
}

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod chunk;
mod config;
mod data;
mod llm;
mod prompts;
mod render;
mod report;
mod segment;
mod summarize;
mod util;
use crate::render as render_mod;
use anyhow::Context as _;
use llm::ProviderRegistry;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser, Debug, Clone)]
#[command(name = "survey-digest", version, about = "Summarize survey posts per demographic segment into an HTML report", long_about = None)]
struct Cli {
    /// Active profile name
    #[arg(short = 'p', long = "profile", global = true)]
    profile: Option<String>,

    /// Default model override
    #[arg(short = 'm', long = "model", global = true)]
    model: Option<String>,

    /// Output JSON instead of human-readable text
    #[arg(long = "json", global = true)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Timeout (seconds) for network requests; none by default
    #[arg(long = "timeout", global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Write or update a configuration profile
    Init(InitArgs),

    /// Summarize every segment and write the styled HTML report
    Report(ReportArgs),

    /// Show segments and planned chunks without calling the model
    Segments(SegmentsArgs),
}

#[derive(Args, Debug, Clone)]
struct InitArgs {
    /// Provider name (openai, groq, lmstudio, mock)
    #[arg(long)]
    provider: Option<String>,
    /// Default model
    #[arg(long)]
    default_model: Option<String>,
    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,
    /// Model context window in tokens
    #[arg(long = "context-window")]
    context_window: Option<usize>,
    /// Profile name to create or update (default: "default")
    #[arg(long, default_value = "default")]
    profile: String,
    /// Validate credentials against the provider now
    #[arg(long)]
    validate: bool,
}

#[derive(Args, Debug, Clone)]
struct TableArgs {
    /// Path to the delimited input table
    #[arg(long)]
    input: PathBuf,
    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    /// Model context window in tokens
    #[arg(long = "context-window")]
    context_window: Option<usize>,
    /// Tokens held back for the prompt template and the answer
    #[arg(long)]
    reserve: Option<usize>,
}

#[derive(Args, Debug, Clone)]
struct ReportArgs {
    #[command(flatten)]
    table: TableArgs,
    /// Where to write the HTML report
    #[arg(long, default_value = report::DEFAULT_OUTPUT_FILE)]
    output: PathBuf,
    /// Provider to use (e.g., openai, mock)
    #[arg(long)]
    provider: Option<String>,
    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,
}

#[derive(Args, Debug, Clone)]
struct SegmentsArgs {
    #[command(flatten)]
    table: TableArgs,
}

#[derive(Debug, Clone)]
struct GlobalOpts {
    profile: Option<String>,
    model: Option<String>,
    json: bool,
    timeout_secs: Option<u64>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Cli {
        profile,
        model,
        json,
        verbose,
        timeout_secs,
        command,
    } = cli;

    init_tracing(verbose);

    let globals = GlobalOpts {
        profile,
        model,
        json,
        timeout_secs,
    };

    let result = match command {
        Commands::Init(args) => cmd_init(&globals, args).await,
        Commands::Report(args) => cmd_report(&globals, args).await,
        Commands::Segments(args) => cmd_segments(&globals, args).await,
    };

    if let Err(e) = result {
        let msg = format!("{:#}", e);
        if globals.json {
            let (code, hint) = classify_error(&msg);
            render_mod::print_json_error(code, &msg, hint);
        } else {
            eprintln!("{}", msg);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn classify_error(msg: &str) -> (&'static str, Option<&'static str>) {
    let msg = msg.to_lowercase();
    if msg.contains("file not found") {
        return ("file_not_found", Some("check the file path"));
    }
    if msg.contains("is missing from the table") {
        return ("missing_column", Some("the table needs sexo, age and st_text columns"));
    }
    if msg.contains("missing openai_api_key") {
        return ("missing_api_key", Some("set OPENAI_API_KEY in env or .env"));
    }
    if msg.contains("invalid budget") || msg.contains("invalid temperature") || msg.contains("invalid --delimiter") {
        return ("invalid_args", None);
    }
    if msg.contains("unsupported provider") {
        return ("provider_unsupported", None);
    }
    if msg.contains("timed out") || msg.contains("timeout") {
        return ("timeout", Some("try increasing --timeout or check network"));
    }
    if msg.contains("failed to parse") {
        return ("parse_error", None);
    }
    if msg.contains("network") || msg.contains("dns") || msg.contains("connection refused") {
        return ("network_error", None);
    }
    ("unknown", None)
}

fn delimiter_byte(c: char) -> anyhow::Result<u8> {
    if !c.is_ascii() {
        anyhow::bail!("invalid --delimiter '{}': must be a single ASCII character", c);
    }
    if matches!(c, '"' | '\r' | '\n') {
        anyhow::bail!("invalid --delimiter {:?}: quotes and line breaks are reserved", c);
    }
    Ok(c as u8)
}

async fn cmd_init(globals: &GlobalOpts, args: InitArgs) -> anyhow::Result<()> {
    use config::{default_config_path, load_config_if_exists, write_config, Profile};

    let path = default_config_path()?;
    let mut cfg = load_config_if_exists(&path)?.unwrap_or_default();

    let existing = cfg.profiles.get(&args.profile).cloned().unwrap_or_default();
    let profile = Profile {
        provider: args.provider.or(existing.provider).or_else(|| Some(config::DEFAULT_PROVIDER.to_string())),
        model: args.default_model.or(existing.model).or_else(|| Some(config::DEFAULT_MODEL.to_string())),
        temperature: args.temperature.or(existing.temperature),
        context_window: args.context_window.or(existing.context_window),
        reserve: existing.reserve,
    };
    // reject values the report command would refuse later
    config::merge_settings(
        None,
        None,
        config::CliOverrides { temperature: profile.temperature, context_window: profile.context_window, ..Default::default() },
    )?;

    if args.validate {
        dotenvy::dotenv().ok();
        let provider = profile.provider.clone().unwrap_or_default();
        llm::validate_provider_credentials(&provider, globals.timeout_secs).await?;
        info!("credentials for {} validated", provider);
    }

    cfg.profiles.insert(args.profile.clone(), profile);
    if cfg.default_profile.is_none() {
        cfg.default_profile = Some(args.profile.clone());
    }
    write_config(&path, &cfg)?;

    if globals.json {
        #[derive(serde::Serialize)]
        struct Out { config: String, profile: String }
        render_mod::print_json(&Out { config: path.display().to_string(), profile: args.profile });
    } else {
        println!("config written: {}", path.display());
    }
    Ok(())
}

async fn cmd_segments(globals: &GlobalOpts, args: SegmentsArgs) -> anyhow::Result<()> {
    let effective = config::resolve_effective_settings(
        globals.profile.as_deref(),
        config::CliOverrides {
            model: globals.model.as_deref(),
            context_window: args.table.context_window,
            reserve: args.table.reserve,
            ..Default::default()
        },
    )?;
    let rows = data::load_rows_async(&args.table.input, delimiter_byte(args.table.delimiter)?).await?;
    let segmentation = segment::Segmenter::new()?.segment(&rows);

    let mut plan = Vec::with_capacity(segmentation.segments.len());
    for s in &segmentation.segments {
        let chunks = chunk::pack_texts(&s.texts, &util::HeuristicCounter, effective.chunk_ceiling())?;
        plan.push(render_mod::SegmentPlan {
            label: s.label.clone(),
            rows: s.texts.len(),
            chunks: chunks.len(),
            tokens: chunks.iter().map(|c| c.tokens).sum(),
        });
    }

    if globals.json {
        #[derive(serde::Serialize)]
        struct Out { segments: Vec<render_mod::SegmentPlan>, dropped_rows: usize }
        render_mod::print_json(&Out { segments: plan, dropped_rows: segmentation.dropped_rows });
    } else {
        render_mod::render_segment_plan_text(&plan, segmentation.dropped_rows);
    }
    Ok(())
}

async fn cmd_report(globals: &GlobalOpts, args: ReportArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let effective = config::resolve_effective_settings(
        globals.profile.as_deref(),
        config::CliOverrides {
            provider: args.provider.as_deref(),
            model: globals.model.as_deref(),
            temperature: args.temperature,
            context_window: args.table.context_window,
            reserve: args.table.reserve,
        },
    )?;
    debug!("effective settings: {:?}", effective);

    let rows = data::load_rows_async(&args.table.input, delimiter_byte(args.table.delimiter)?).await?;
    let segmentation = segment::Segmenter::new()?.segment(&rows);

    let registry = ProviderRegistry::new(globals.timeout_secs.map(Duration::from_secs))?;
    let adapter = registry
        .get(&effective.provider)
        .with_context(|| format!("unsupported provider: {}", effective.provider))?;
    let api_base = llm::resolve_api_base_for_provider(&effective.provider);
    let mut summarizer = summarize::Summarizer::new(adapter, &effective.model, effective.temperature, api_base);

    let mut summaries = Vec::with_capacity(segmentation.segments.len());
    let mut total_chunks = 0usize;
    for s in &segmentation.segments {
        let chunks = chunk::pack_texts(&s.texts, &util::HeuristicCounter, effective.chunk_ceiling())?;
        if chunks.is_empty() {
            continue;
        }
        total_chunks += chunks.len();
        let summary = summarizer.summarize_segment(&s.label, &chunks).await?;
        debug!("segment {} merged from {} partial analyses", summary.label, summary.chunk_summaries.len());
        summaries.push(summary);
    }

    let basic = report::render_basic_markup(&summaries);
    let styled = report::style_report(&mut summarizer, &basic).await?;
    report::write_report_async(&args.output, &styled).await?;

    let ledger = summarizer.ledger();
    info!("total tokens used: {}", ledger.total_tokens);

    if globals.json {
        #[derive(serde::Serialize)]
        struct Out<'a> {
            model: &'a str,
            provider: &'a str,
            segments: usize,
            chunks: usize,
            api_calls: u64,
            total_tokens: u64,
            dropped_rows: usize,
            output: String,
            generated_at: String,
        }
        let out = Out {
            model: &effective.model,
            provider: &effective.provider,
            segments: summaries.len(),
            chunks: total_chunks,
            api_calls: ledger.api_calls,
            total_tokens: ledger.total_tokens,
            dropped_rows: segmentation.dropped_rows,
            output: args.output.display().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        };
        render_mod::print_json(&out);
    } else {
        println!("report written: {}", args.output.display());
        println!("total tokens used: {}", ledger.total_tokens);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert_eq!(classify_error("loading table: column 'sexo' is missing from the table").0, "missing_column");
        assert_eq!(classify_error("file not found: x.csv").0, "file_not_found");
        assert_eq!(classify_error("summarizing chunk 1: missing OPENAI_API_KEY: missing API key").0, "missing_api_key");
        assert_eq!(classify_error("unsupported provider: foo").0, "provider_unsupported");
        assert_eq!(classify_error("something odd").0, "unknown");
    }

    #[test]
    fn delimiter_must_be_ascii() {
        assert_eq!(delimiter_byte(';').unwrap(), b';');
        assert!(delimiter_byte('é').is_err());
        for c in ['"', '\r', '\n'] {
            assert!(delimiter_byte(c).is_err(), "{:?}", c);
        }
        assert_eq!(delimiter_byte('\t').unwrap(), b'\t');
    }
}

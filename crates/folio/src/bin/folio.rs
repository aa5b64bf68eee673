// ABOUTME: CLI binary for folio: runs a batch of (url, source tag) pairs through the pipeline.
// ABOUTME: Prints per-document text or JSON reports; logs go to stderr via tracing.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use folio::{
    DocumentReport, HttpOcrEngine, Pipeline, PolitenessDelay, Recognizer, RetryPolicy, SourceTag,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Extract article text and image OCR text from web pages")]
struct Args {
    /// Source tag applied to positional URLs (kriptoworld, default)
    #[arg(short = 's', long = "source", default_value = "default")]
    source: String,

    /// File with one "<url> [source]" pair per line; lines starting with '#' are skipped
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Base URL of the OCR service
    #[arg(long = "ocr-endpoint", env = "FOLIO_OCR_ENDPOINT")]
    ocr_endpoint: String,

    /// Recognition languages
    #[arg(
        short = 'l',
        long = "lang",
        env = "FOLIO_LANGS",
        value_delimiter = ',',
        default_value = "hu,en"
    )]
    languages: Vec<String>,

    /// Lower bound of the politeness delay, in seconds
    #[arg(long = "min-delay", env = "FOLIO_MIN_DELAY", default_value_t = 0.5)]
    min_delay: f64,

    /// Upper bound of the politeness delay, in seconds
    #[arg(long = "max-delay", env = "FOLIO_MAX_DELAY", default_value_t = 3.0)]
    max_delay: f64,

    /// Retries for transient fetch failures
    #[arg(long = "retries", env = "FOLIO_RETRIES", default_value_t = 2)]
    retries: u32,

    /// Images fetched and decoded at once per document
    #[arg(long = "concurrency", default_value_t = 1)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = 30)]
    timeout: u64,

    /// Output JSON reports instead of plain text
    #[arg(long = "json")]
    json_output: bool,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// URLs to process
    #[arg()]
    urls: Vec<String>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("folio={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Parses an input file of `<url> [source]` lines.
fn read_input_file(path: &Path, fallback: SourceTag) -> anyhow::Result<Vec<(String, SourceTag)>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let mut inputs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(url) = fields.next() else {
            continue;
        };
        let tag = fields.next().map(parse_tag).unwrap_or(fallback);
        inputs.push((url.to_string(), tag));
    }
    Ok(inputs)
}

fn parse_tag(s: &str) -> SourceTag {
    SourceTag::parse_strict(s).unwrap_or_else(|| {
        warn!(tag = s, "unknown source tag, using default profile");
        SourceTag::Default
    })
}

fn format_output(reports: &[DocumentReport], json_output: bool) -> anyhow::Result<String> {
    if json_output {
        Ok(serde_json::to_string_pretty(reports)?)
    } else {
        Ok(reports
            .iter()
            .map(DocumentReport::format_text)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let default_tag = parse_tag(&args.source);

    let mut inputs: Vec<(String, SourceTag)> = match &args.input {
        Some(path) => read_input_file(path, default_tag)?,
        None => Vec::new(),
    };
    inputs.extend(args.urls.iter().map(|u| (u.clone(), default_tag)));
    if inputs.is_empty() {
        anyhow::bail!("at least one URL is required, either positional or via --input");
    }

    let engine = HttpOcrEngine::new(&args.ocr_endpoint, args.languages.as_slice())?;
    let recognizer = Arc::new(Recognizer::new(engine)?);

    let retry = if args.retries == 0 {
        RetryPolicy::none()
    } else {
        RetryPolicy {
            max_retries: args.retries,
            ..RetryPolicy::default()
        }
    };

    let pipeline = Pipeline::builder()
        .delay(PolitenessDelay::from_secs_f64(args.min_delay, args.max_delay)?)
        .retry(retry)
        .image_concurrency(args.concurrency)
        .timeout(Duration::from_secs(args.timeout))
        .build(recognizer)?;

    let start = Instant::now();
    let results = pipeline.extract_batch(&inputs).await;
    let elapsed = start.elapsed();

    let reports: Vec<DocumentReport> = results.iter().map(DocumentReport::from).collect();
    let all_ok = reports.iter().all(|r| r.ok);
    let output = format_output(&reports, args.json_output)?;

    match &args.output {
        Some(path) => fs::write(path, &output)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", output),
    }

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", elapsed.as_millis());
    }

    Ok(all_ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

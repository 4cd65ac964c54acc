//! CLI binary for order2xlsx.
//!
//! A thin shim over the library crate: maps flags to `RecognitionConfig`,
//! applies command-line edits to the recognised table, prints it and writes
//! the workbook.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use order2xlsx::config::XLSX_MIME_TYPE;
use order2xlsx::pipeline::input::resolve_input;
use order2xlsx::{
    normalize_response, write_xlsx, Credential, ExtractionResult, Order2XlsxError, OrderSession,
    ProgressCallback, RecognitionConfig, RecognitionProgressCallback, DEFAULT_EXPORT_FILENAME,
    DEFAULT_SHEET_NAME,
};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal busy indicator: a spinner that runs for the duration of the
/// model call and is replaced by a one-line outcome.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading image…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }
}

impl RecognitionProgressCallback for CliProgressCallback {
    fn on_recognition_start(&self, image_bytes: usize) {
        self.bar.set_message(format!("{} KB image", image_bytes / 1024));
    }

    fn on_request_start(&self, model: &str) {
        self.bar.set_prefix("Recognising");
        self.bar.set_message(format!("asking {model}…"));
    }

    fn on_request_complete(&self, response_len: usize) {
        self.bar.set_prefix("Parsing");
        self.bar.set_message(format!("{response_len} chars"));
    }

    fn on_recognition_complete(&self, rows: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} rows recognised  {}",
            green("✔"),
            bold(&rows.to_string()),
            dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64())),
        );
    }

    fn on_recognition_error(&self, error: &str) {
        self.bar.finish_and_clear();

        // Truncate very long provider messages to keep output tidy.
        let msg = match error.char_indices().nth(120) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        eprintln!("{} {}", red("✘"), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise a photo and write factory_order_list.xlsx
  order2xlsx whiteboard.jpg

  # Custom output file and sheet name
  order2xlsx order.png -o monday.xlsx --sheet 周一报货

  # Try it without an API key
  order2xlsx --demo whiteboard.jpg

  # Fix a misread cell and drop a junk row before exporting
  order2xlsx order.jpg --set 2:数量=600 --set 3:单位=箱 --drop-row 5

  # Edit rows by hand in a text editor, then export
  order2xlsx order.jpg --save-json rows.json
  $EDITOR rows.json
  order2xlsx --from-json rows.json -o order.xlsx

  # Use a specific model
  order2xlsx --provider anthropic --model claude-sonnet-4-20250514 order.jpg

EDITING:
  --set ROW:COLUMN=VALUE   ROW is 1-indexed as printed. VALUE is read as JSON
                           when it parses (500, 1.5, true, null), otherwise
                           kept as text ("M12", "0500", "两箱").
  --drop-row ROW           Remove a row. Row numbers refer to the table as
                           recognised, before any row is dropped.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. order2xlsx=debug)
"#;

/// Recognise a photographed factory order list and export it to Excel.
#[derive(Parser, Debug)]
#[command(
    name = "order2xlsx",
    version,
    about = "Recognise a photographed factory order list and export it to Excel",
    long_about = "Send a photo of a handwritten, whiteboard or printed factory order list to a \
Vision Language Model, print the recognised rows as a table, optionally correct them, and write \
a one-sheet .xlsx workbook.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local JPEG/PNG file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "from_json")]
    input: Option<String>,

    /// Load rows from a JSON file instead of recognising an image.
    #[arg(long, conflicts_with_all = ["input", "demo"])]
    from_json: Option<PathBuf>,

    /// Workbook to write.
    #[arg(short, long, env = "ORDER2XLSX_OUTPUT", default_value = DEFAULT_EXPORT_FILENAME)]
    output: PathBuf,

    /// Sheet name inside the workbook.
    #[arg(long, env = "ORDER2XLSX_SHEET", default_value = DEFAULT_SHEET_NAME)]
    sheet: String,

    /// Use a built-in sample reply; no API key or network needed.
    #[arg(long, env = "ORDER2XLSX_DEMO")]
    demo: bool,

    /// Vision model ID (e.g. gpt-4o, gpt-4o-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ORDER2XLSX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "ORDER2XLSX_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "ORDER2XLSX_PROMPT")]
    prompt: Option<PathBuf>,

    /// Overwrite a cell: ROW:COLUMN=VALUE (ROW is 1-indexed). Repeatable.
    #[arg(long = "set", value_name = "ROW:COLUMN=VALUE")]
    set: Vec<String>,

    /// Remove a row (1-indexed). Repeatable.
    #[arg(long = "drop-row", value_name = "ROW")]
    drop_row: Vec<usize>,

    /// Also write the (edited) rows as JSON, for hand editing.
    #[arg(long)]
    save_json: Option<PathBuf>,

    /// Print rows as JSON instead of a text table.
    #[arg(long, env = "ORDER2XLSX_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "ORDER2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ORDER2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ORDER2XLSX_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ORDER2XLSX_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Model call timeout in seconds.
    #[arg(long, env = "ORDER2XLSX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

/// One `--set` edit, already converted to a 0-based row.
#[derive(Debug, PartialEq)]
struct CellEdit {
    row: usize,
    column: String,
    value: Value,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && cli.from_json.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // Parse edits up front so a typo fails before the (paid) model call.
    let edits = cli
        .set
        .iter()
        .map(|s| parse_set(s))
        .collect::<Result<Vec<_>>>()?;
    for &row in &cli.drop_row {
        if row < 1 {
            anyhow::bail!("Rows are 1-indexed, minimum is 1 (got {})", row);
        }
    }

    // ── Obtain rows ──────────────────────────────────────────────────────
    let mut session = if let Some(ref path) = cli.from_json {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read rows from {:?}", path))?;
        let rows = normalize_response(&raw)
            .with_context(|| format!("{:?} does not hold a list of rows", path))?;
        OrderSession::with_result(rows)
    } else {
        if !cli.demo && !cli.quiet {
            if let Some(warning) = credential_warning(cli.provider.as_deref()) {
                eprintln!("{} {}", yellow("⚠"), yellow(&warning));
            }
        }

        let progress_cb: Option<ProgressCallback> = if show_progress {
            Some(CliProgressCallback::new() as Arc<dyn RecognitionProgressCallback>)
        } else {
            None
        };
        let config = build_config(&cli, progress_cb).await?;

        let input = cli.input.as_deref().unwrap_or_default();
        let upload = resolve_input(input, config.download_timeout_secs)
            .await
            .with_context(|| format!("Failed to read {input}"))?;

        let mut session = OrderSession::new();
        if let Err(e) = session.recognize(&upload.bytes, &config).await {
            if e.is_retryable() && !cli.quiet {
                eprintln!("{}", dim("The model call can be retried; run the same command again."));
            }
            return Err(e).with_context(|| format!("Recognition of {} failed", upload.name));
        }
        session
    };

    let result = session
        .result_mut()
        .ok_or(Order2XlsxError::NothingToExport)?;

    // ── Apply edits ──────────────────────────────────────────────────────
    apply_edits(result, &edits, &cli.drop_row)?;

    if let Some(ref path) = cli.save_json {
        let json = serde_json::to_string_pretty(&*result).context("Failed to serialise rows")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
    }

    // ── Print ────────────────────────────────────────────────────────────
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        let summary = serde_json::json!({
            "rows": &*result,
            "columns": result.columns(),
            "sheet": cli.sheet,
            "output": cli.output.display().to_string(),
            "mime_type": XLSX_MIME_TYPE,
        });
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise output")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else if !cli.quiet {
        if result.is_empty() {
            eprintln!("{}", yellow("No rows were recognised."));
        } else {
            handle
                .write_all(result.to_text_table().as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    drop(handle);

    // ── Export ───────────────────────────────────────────────────────────
    write_xlsx(result, &cli.output, &cli.sheet)
        .await
        .context("Export failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} rows  →  {}",
            green("✔"),
            result.len(),
            bold(&cli.output.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `RecognitionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RecognitionConfig> {
    let mut builder = RecognitionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .sheet_name(cli.sheet.clone())
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if cli.demo {
        builder = builder.demo();
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Startup notice when no usable key is configured. Recognition will still
/// be attempted and fail with a credential error before any request.
fn credential_warning(provider: Option<&str>) -> Option<String> {
    let (provider, cred) = match provider {
        Some(p) => (p, Credential::for_provider(p)),
        None => Credential::detect(),
    };
    let hint = cred.hint()?;
    Some(format!("No usable API key for {provider}. {hint}"))
}

/// Parse `--set ROW:COLUMN=VALUE`.
fn parse_set(s: &str) -> Result<CellEdit> {
    let (row, rest) = s
        .split_once(':')
        .with_context(|| format!("Invalid --set '{}': expected ROW:COLUMN=VALUE", s))?;
    let (column, value) = rest
        .split_once('=')
        .with_context(|| format!("Invalid --set '{}': expected ROW:COLUMN=VALUE", s))?;

    let row: usize = row
        .trim()
        .parse()
        .with_context(|| format!("Invalid row number in --set '{}'", s))?;
    if row < 1 {
        anyhow::bail!("Rows are 1-indexed, minimum is 1 (got {})", row);
    }
    let column = column.trim();
    if column.is_empty() {
        anyhow::bail!("Empty column name in --set '{}'", s);
    }

    Ok(CellEdit {
        row: row - 1,
        column: column.to_string(),
        value: parse_cell_value(value),
    })
}

/// JSON scalars as typed, anything else as text.
fn parse_cell_value(s: &str) -> Value {
    match serde_json::from_str::<Value>(s) {
        Ok(v @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))) => v,
        _ => Value::String(s.to_string()),
    }
}

/// Apply cell edits, then drop rows. Both use the recognised numbering.
fn apply_edits(result: &mut ExtractionResult, edits: &[CellEdit], drops: &[usize]) -> Result<()> {
    for edit in edits {
        result
            .set_cell(edit.row, &edit.column, edit.value.clone())
            .with_context(|| format!("Cannot set row {} {}", edit.row + 1, edit.column))?;
    }

    let mut drops: Vec<usize> = drops.iter().map(|r| r - 1).collect();
    drops.sort_unstable();
    drops.dedup();
    for row in drops.into_iter().rev() {
        result
            .remove_row(row)
            .with_context(|| format!("Cannot drop row {}", row + 1))?;
    }
    Ok(())
}

//! CLI binary for slidescribe.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, wires Ctrl-C to cancellation and prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slidescribe::{
    process_document_with_cancel, CancellationToken, PipelineConfig, PipelineRun,
    ProgressCallback, SlideProgressCallback, Stage,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shorten `s` to at most `max` characters, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished slide. Slides finish out
/// of order when `--concurrency` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until the page count is known from `on_run_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Converting and rasterising…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Stop the spinner without a summary line; used when the run errors.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Processing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, slide: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&slide)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl SlideProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_slides: usize) {
        self.activate_bar(total_slides);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_slides} slides…"))
        ));
    }

    fn on_slide_start(&self, slide: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(slide, Instant::now());
        self.bar.set_message(format!("slide {slide}"));
    }

    fn on_slide_complete(&self, slide: usize, total: usize, title: &str) {
        let secs = self.elapsed_secs(slide);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            green("✓"),
            slide,
            total,
            truncate(title, 60),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide: usize, total: usize, stage: Stage, error: &str) {
        let secs = self.elapsed_secs(slide);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            slide,
            total,
            bold(stage.as_str()),
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_slides: usize, reordered: usize) {
        let failed = total_slides.saturating_sub(reordered);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} slides reordered",
                green("✔"),
                bold(&reordered.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slides reordered  ({} failed)",
                if failed == total_slides {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&reordered.to_string()),
                total_slides,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process a lecture deck into output/<yymmdd-HHMM>/
  slidescribe week3.pptx

  # Choose the working directory and run 8 slides at once
  slidescribe week3.pdf --work-dir out/week3 --concurrency 8

  # Strictly sequential, give up after 10 minutes
  slidescribe week3.pdf --concurrency 1 --document-timeout 600

  # Machine-readable result
  slidescribe --json week3.pdf > run.json

OUTPUT:
  One <deck>-NN_reorder.json per successfully processed slide:
    [{"slide_number": 3, "title": "...", "text": "..."}]
  Every intermediate file (page images, OCR JSON, cleaned text, converted
  PDF) is deleted when the run ends, including on failure or Ctrl-C.

ENVIRONMENT VARIABLES:
  GOOGLE_VISION_API_KEY   Cloud Vision API key (text recognition)
  GEMINI_API_KEY          Google Gemini API key (default reorder provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, e.g. slidescribe=debug

  A .env file in the current directory is loaded first.
"#;

/// Turn slide decks into titled per-slide records via OCR and an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "slidescribe",
    version,
    about = "Turn slide decks into titled per-slide records via OCR and an LLM",
    long_about = "Rasterises a PDF/PPT/PPTX deck, runs Cloud Vision text recognition on every \
slide, strips noise characters and asks an LLM to reorder each slide's text into one titled, \
readable passage. Slides are processed concurrently and fail independently.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF, PPT or PPTX file.
    input: PathBuf,

    /// Working directory for page files and records [default: output/<yymmdd-HHMM>].
    #[arg(short, long, env = "SLIDESCRIBE_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Cloud Vision API key.
    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    vision_key: Option<String>,

    /// Cloud Vision images:annotate endpoint.
    #[arg(long, env = "SLIDESCRIBE_VISION_ENDPOINT")]
    vision_endpoint: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "SLIDESCRIBE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Upscale factor applied before recognition (> 1.0).
    #[arg(long, env = "SLIDESCRIBE_SCALE", default_value_t = 1.5)]
    scale: f32,

    /// Confidence at or above which a block counts as printed text.
    #[arg(long, env = "SLIDESCRIBE_CONFIDENCE_THRESHOLD", default_value_t = 0.75)]
    confidence_threshold: f32,

    /// Confidence assumed for blocks the recognizer returns without one.
    #[arg(long, env = "SLIDESCRIBE_MISSING_CONFIDENCE", default_value_t = 0.0)]
    missing_confidence: f32,

    /// Number of slides processed at once (1 = sequential).
    #[arg(short, long, env = "SLIDESCRIBE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per remote call timeout in seconds.
    #[arg(long, env = "SLIDESCRIBE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Give up on the whole document after this many seconds.
    #[arg(long, env = "SLIDESCRIBE_DOCUMENT_TIMEOUT")]
    document_timeout: Option<u64>,

    /// Max LLM output tokens per slide.
    #[arg(long, env = "SLIDESCRIBE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SLIDESCRIBE_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// LibreOffice binary used for PPT/PPTX conversion.
    #[arg(long, env = "SLIDESCRIBE_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the full PipelineRun as JSON on stdout.
    #[arg(long, env = "SLIDESCRIBE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SLIDESCRIBE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDESCRIBE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLIDESCRIBE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; a missing file is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let clear_progress = || {
        if let Some(ref cb) = progress {
            cb.clear();
        }
    };
    let progress_cb: Option<ProgressCallback> =
        progress.clone().map(|cb| cb as Arc<dyn SlideProgressCallback>);
    let config = build_config(&cli, progress_cb).inspect_err(|_| clear_progress())?;

    let work_dir = cli.work_dir.clone().unwrap_or_else(session_dir);

    // ── Ctrl-C → cancel; cleanup still runs inside the pipeline ─────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} Interrupted, cleaning up…", cyan("◆"));
                cancel.cancel();
            }
        });
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let run = process_document_with_cancel(&cli.input, &work_dir, &config, cancel)
        .await
        .inspect_err(|_| clear_progress())
        .with_context(|| format!("Processing {} failed", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&run).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_summary(&run, &work_dir, cli.quiet, show_progress);
    }

    Ok(())
}

/// `output/<yymmdd-HHMM>` for runs without `--work-dir`.
fn session_dir() -> PathBuf {
    let stamp = chrono::Local::now().format("%y%m%d-%H%M").to_string();
    PathBuf::from("output").join(stamp)
}

fn print_summary(run: &PipelineRun, work_dir: &std::path::Path, quiet: bool, show_progress: bool) {
    for slide in &run.slides {
        match (&slide.title, slide.failed_stage) {
            (Some(title), None) => println!("{:>3}  {}", slide.slide_number, title),
            (_, Some(stage)) => {
                println!("{:>3}  {}", slide.slide_number, dim(&format!("[failed: {stage}]")))
            }
            (None, None) => println!("{:>3}", slide.slide_number),
        }
    }

    if quiet {
        return;
    }
    if !show_progress {
        eprintln!(
            "Reordered {}/{} slides in {}ms",
            run.stats.reordered_pages, run.stats.total_pages, run.stats.total_duration_ms
        );
        if run.stats.failed_pages > 0 {
            eprintln!("  {} slides failed", run.stats.failed_pages);
        }
    }
    let timing: Vec<String> = run
        .timing_summary
        .iter()
        .map(|(stage, secs)| format!("{stage} {secs:.2}s"))
        .collect();
    eprintln!("   {}", dim(&format!("avg per slide: {}", timing.join("  "))));
    eprintln!("   records in {}", bold(&work_dir.display().to_string()));
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .dpi(cli.dpi)
        .scale_factor(cli.scale)
        .confidence_threshold(cli.confidence_threshold)
        .missing_confidence(cli.missing_confidence)
        .concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .soffice_path(cli.soffice.clone());

    if let Some(secs) = cli.document_timeout {
        builder = builder.document_timeout_secs(secs);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref key) = cli.vision_key {
        builder = builder.vision_api_key(key.clone());
    }
    if let Some(ref endpoint) = cli.vision_endpoint {
        builder = builder.vision_endpoint(endpoint.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_stops_the_spinner() {
        let cb = CliProgressCallback::new_dynamic();
        cb.clear();
        assert!(cb.bar.is_finished());
        // A second clear after the run finished is a no-op.
        cb.clear();
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn clear_after_run_complete_is_harmless() {
        let cb = CliProgressCallback::new_dynamic();
        cb.on_run_start(2);
        cb.on_run_complete(2, 2);
        cb.clear();
        assert!(cb.bar.is_finished());
    }
}

//! CLI binary for edgequake-tableswap.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReplaceConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_tableswap::{
    inspect, replace_tables_to_file, InspectReport, ProgressCallback, RegionPolicy, ReplaceConfig,
    ReplaceProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Terminal colours ─────────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the PDF is read, then a bar
/// across pages while blocks are scored, with one log line per found title
/// and per edited region.
struct CliProgressCallback {
    bar: ProgressBar,
    titles: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF text…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            titles: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scanning");
        self.bar.set_message("");
    }
}

impl ReplaceProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_pages} pages for table titles…"))
        ));
    }

    fn on_page_scanned(&self, page_num: usize, total_pages: usize, titles_found: usize) {
        if titles_found > 0 {
            let so_far = self.titles.fetch_add(titles_found, Ordering::SeqCst) + titles_found;
            self.bar.println(format!(
                "  {} Page {:>3}/{:<3}  {}",
                cyan("•"),
                page_num,
                total_pages,
                dim(&format!("{titles_found} title(s), {so_far} so far")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_region_replaced(&self, page_num: usize, title: &str) {
        self.bar.println(format!("  {} Page {:>3}  {}", green("✓"), page_num, title));
    }

    fn on_region_covered(&self, page_num: usize, title: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            yellow("○"),
            page_num,
            title,
            dim("(covered, no replacement table left)")
        ));
    }

    fn on_run_complete(&self, regions: usize, replaced: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}/{} regions replaced",
            if replaced == regions { green("✔") } else { yellow("⚠") },
            bold(&replaced.to_string()),
            regions
        );
    }
}

/// `on_run_complete` never fires for a failed run; clear the bar so the
/// error is not drawn over.
fn clear_on_error<T, E>(cb: &Option<Arc<CliProgressCallback>>, result: &Result<T, E>) {
    if let (Err(_), Some(cb)) = (result, cb) {
        cb.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Replace tables, writing guide_tables_replaced.pdf
  tableswap guide.pdf "Quote Table - input.docx"

  # Explicit output and a different concept
  tableswap guide.pdf tables.md -o out.pdf --concept "dental plan comparison"

  # Only show which titles and regions would be used
  tableswap --inspect-only guide.pdf

  # Keep the rendered tables for review
  tableswap guide.pdf tables.json --artifacts ./rendered

TABLE SOURCES:
  .docx          every table in the document body, first row = header
  .md/.markdown  GFM pipe tables
  .json          [[["h1","h2"],["a","b"]], ...]  or  {"tables": [...]}

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          Embedding provider (OpenAI)
  OLLAMA_HOST             Embedding provider (local Ollama)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  TABLESWAP_*             Any flag, e.g. TABLESWAP_THRESHOLD=0.7
"#;

/// Find tables in a PDF by their titles and replace them.
#[derive(Parser, Debug)]
#[command(
    name = "tableswap",
    version,
    about = "Find tables in a PDF by their titles and replace them with rendered tables",
    long_about = "Detect table titles in a PDF by embedding similarity to a concept, \
cover the region beneath each title, and place a rendered replacement table there. \
Replacement tables are read from a .docx, Markdown or JSON file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file.
    input: PathBuf,

    /// Replacement table source (.docx, .md, .json).
    #[arg(required_unless_present = "inspect_only")]
    tables: Option<PathBuf>,

    /// Output PDF path. Default: <input stem>_tables_replaced.pdf beside the input.
    #[arg(short, long, env = "TABLESWAP_OUTPUT")]
    output: Option<PathBuf>,

    /// Concept that table titles are about.
    #[arg(long, env = "TABLESWAP_CONCEPT", default_value = "medical plan comparison")]
    concept: String,

    /// Minimum similarity (0–1) for a block to count as a title.
    #[arg(long, env = "TABLESWAP_THRESHOLD", default_value_t = 0.65)]
    threshold: f32,

    /// Height of the covered region below each title, in points.
    #[arg(long, env = "TABLESWAP_TABLE_MARGIN", default_value_t = 300.0)]
    table_margin: f32,

    /// Which title keeps a page when two land on it.
    #[arg(long, env = "TABLESWAP_REGION_POLICY", value_enum, default_value = "last-wins")]
    region_policy: RegionPolicyArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "TABLESWAP_PASSWORD")]
    password: Option<String>,

    /// Pixels per point for rendered tables (0.5–8).
    #[arg(long, env = "TABLESWAP_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// Font size of rendered table cells, in points.
    #[arg(long, env = "TABLESWAP_FONT_SIZE", default_value_t = 10.0)]
    font_size: f32,

    /// Also write every rendered table as PNG into this directory.
    #[arg(long, env = "TABLESWAP_ARTIFACTS")]
    artifacts: Option<PathBuf>,

    /// Detect and locate only; do not write a PDF.
    #[arg(long)]
    inspect_only: bool,

    /// Print the full report as JSON on stdout.
    #[arg(long, env = "TABLESWAP_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TABLESWAP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TABLESWAP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TABLESWAP_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum RegionPolicyArg {
    LastWins,
    FirstWins,
}

impl From<RegionPolicyArg> for RegionPolicy {
    fn from(v: RegionPolicyArg) -> Self {
        match v {
            RegionPolicyArg::LastWins => RegionPolicy::LastWins,
            RegionPolicyArg::FirstWins => RegionPolicy::FirstWins,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep library INFO logs out of the way while the progress bar is shown.
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

    let cli_cb = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = cli_cb
        .clone()
        .map(|cb| cb as Arc<dyn ReplaceProgressCallback>);

    let config = build_config(&cli, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let report = inspect(&cli.input, &config).await;
        if let Some(ref cb) = cli_cb {
            cb.bar.finish_and_clear();
        }
        let report = report.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            print_inspection(&cli, &report);
        }
        return Ok(());
    }

    // ── Run replacement ──────────────────────────────────────────────────
    let Some(tables) = cli.tables.as_ref() else {
        if let Some(ref cb) = cli_cb {
            cb.bar.finish_and_clear();
        }
        anyhow::bail!("A replacement table source is required");
    };
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| edgequake_tableswap::pipeline::input::default_output_path(&cli.input));

    let output = replace_tables_to_file(&cli.input, tables, &output_path, &config).await;
    clear_on_error(&cli_cb, &output);
    let output = output.context("Table replacement failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {} titles  {}/{} regions replaced  {}ms  →  {}",
            if output.has_soft_failures() { yellow("⚠") } else { green("✔") },
            s.titles,
            s.replaced,
            s.regions,
            s.total_duration_ms,
            bold(&output.output_path.display().to_string()),
        );
        if s.blank_regions > 0 {
            eprintln!("   {} regions left blank (not enough tables)", yellow(&s.blank_regions.to_string()));
        }
        if s.unused_tables > 0 {
            eprintln!("   {} tables unused (not enough regions)", dim(&s.unused_tables.to_string()));
        }
        let unmatched = output.inspection.unmatched_titles.len();
        if unmatched > 0 {
            eprintln!("   {} titles not found on any page", yellow(&unmatched.to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ReplaceConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReplaceConfig> {
    let mut builder = ReplaceConfig::builder()
        .concept(cli.concept.clone())
        .threshold(cli.threshold)
        .table_margin(cli.table_margin)
        .region_policy(cli.region_policy.clone().into())
        .render_scale(cli.render_scale)
        .font_size(cli.font_size);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref dir) = cli.artifacts {
        builder = builder.artifacts_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_inspection(cli: &Cli, report: &InspectReport) {
    println!("File:         {}", cli.input.display());
    println!("Pages:        {}", report.total_pages);
    println!("Blocks:       {} scored, {} skipped", report.scored_blocks, report.skipped_blocks.len());
    println!("Titles:       {}", report.titles.len());
    for t in &report.titles {
        println!("  p{:<4} {:.3}  {}", t.page + 1, t.score, t.text);
    }
    println!("Regions:      {}", report.regions.len());
    for r in &report.regions {
        println!("  p{:<4} {}  {}", r.page + 1, r.rect, r.title);
    }
    if !report.unmatched_titles.is_empty() {
        println!("Unmatched:    {}", report.unmatched_titles.join(" | "));
    }
    for d in &report.displaced_titles {
        println!(
            "Displaced:    p{} '{}' (kept '{}')",
            d.page + 1,
            d.title,
            d.kept
        );
    }
}

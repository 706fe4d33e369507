//! # edgequake-tableswap
//!
//! Find data tables in PDF documents by their titles and replace them with
//! freshly rendered tables from a `.docx`, Markdown or JSON source.
//!
//! ## How tables are found
//!
//! PDFs carry no table structure, only positioned glyphs. This crate looks
//! for the *title* instead: every text block is embedded and compared with a
//! concept such as "medical plan comparison". Blocks similar enough are
//! titles; each title is searched on the page, and the table is presumed to
//! occupy a fixed-height band directly beneath it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract  glyphs + bounds per page via pdfium (spawn_blocking)
//!  ├─ 2. Detect   embed blocks, keep those ≥ threshold vs. the concept
//!  ├─ 3. Locate   literal title search → region below each title
//!  ├─ 4. Render   replacement tables → images
//!  └─ 5. Mutate   cover regions white, place images, atomic save
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_tableswap::{replace_tables, ReplaceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Embedding provider auto-detected from OPENAI_API_KEY / OLLAMA_HOST / …
//!     let config = ReplaceConfig::default();
//!     let output = replace_tables("guide.pdf", "quote_tables.docx", &config).await?;
//!     eprintln!(
//!         "{}/{} regions replaced → {}",
//!         output.stats.replaced,
//!         output.stats.regions,
//!         output.output_path.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tableswap` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-tableswap = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod replace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RegionPolicy, ReplaceConfig, ReplaceConfigBuilder};
pub use error::{EmbeddingError, ReplaceError};
pub use geometry::Rect;
pub use output::{InspectReport, RegionOutcome, ReplaceOutput, ReplaceStats};
pub use pipeline::classify::{Embedder, EmbeddingClassifier, LlmEmbedder};
pub use pipeline::detect::{detect_titles, Detection, TitleCandidate};
pub use pipeline::layout::{DocumentLayout, PageLayout, TextBlock};
pub use pipeline::locate::{locate_tables, Location, TableRegion};
pub use pipeline::mutate::{apply_edits, cover_region, place_image, RegionEdit};
pub use pipeline::render::{PdfiumTableRenderer, TableRenderer};
pub use pipeline::tables::{load_tables, ReplacementTable};
pub use progress::{NoopProgressCallback, ProgressCallback, ReplaceProgressCallback};
pub use replace::{
    inspect, plan_edits, replace_tables, replace_tables_from_bytes, replace_tables_sync,
    replace_tables_to_file, EditPlan,
};

//! Configuration types for table replacement.
//!
//! All run behaviour is controlled through [`ReplaceConfig`], built via its
//! [`ReplaceConfigBuilder`]. `build()` validates the numeric knobs.

use crate::error::ReplaceError;
use crate::pipeline::classify::Embedder;
use crate::pipeline::render::TableRenderer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default semantic anchor for title detection.
pub const DEFAULT_CONCEPT: &str = "medical plan comparison";

/// Default minimum cosine similarity for a block to count as a title.
pub const DEFAULT_THRESHOLD: f32 = 0.65;

/// Default height, in layout units, of the region below a title.
pub const DEFAULT_TABLE_MARGIN: f32 = 300.0;

/// Configuration for one table-replacement run.
///
/// Built via [`ReplaceConfig::builder()`] or using
/// [`ReplaceConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_tableswap::{RegionPolicy, ReplaceConfig};
///
/// let config = ReplaceConfig::builder()
///     .concept("dental plan comparison")
///     .threshold(0.7)
///     .table_margin(250.0)
///     .region_policy(RegionPolicy::FirstWins)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReplaceConfig {
    /// Text describing what a table title is about. Default: "medical plan comparison".
    ///
    /// Embedded once per run; every text block is compared against it.
    pub concept: String,

    /// Minimum cosine similarity (inclusive) for a block to be a title. Range: 0–1. Default: 0.65.
    pub threshold: f32,

    /// Height of the table region below each title, in layout units (points). Default: 300.
    ///
    /// A heuristic: tables are not measured, so shorter tables get blank
    /// space covered and taller ones are only partly covered.
    pub table_margin: f32,

    /// What happens when two titles resolve to the same page. Default: [`RegionPolicy::LastWins`].
    pub region_policy: RegionPolicy,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pixels per point when rasterising replacement tables. Range: 0.5–8. Default: 2.0.
    ///
    /// 2.0 gives 144 DPI, sharp when printed at the region's size.
    pub render_scale: f32,

    /// Font size of replacement table cells, in points. Default: 10.
    pub font_size: f32,

    /// When set, each rendered replacement table is also written here as PNG.
    pub artifacts_dir: Option<PathBuf>,

    /// Pre-constructed embedder. If None, one is auto-detected from the environment.
    pub embedder: Option<Arc<dyn Embedder>>,

    /// Replacement table renderer. If None, a [`crate::PdfiumTableRenderer`]
    /// built from `font_size` and `render_scale` is used.
    pub renderer: Option<Arc<dyn TableRenderer>>,

    /// Optional progress callback for per-stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReplaceConfig {
    fn default() -> Self {
        Self {
            concept: DEFAULT_CONCEPT.to_string(),
            threshold: DEFAULT_THRESHOLD,
            table_margin: DEFAULT_TABLE_MARGIN,
            region_policy: RegionPolicy::default(),
            password: None,
            render_scale: 2.0,
            font_size: 10.0,
            artifacts_dir: None,
            embedder: None,
            renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReplaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplaceConfig")
            .field("concept", &self.concept)
            .field("threshold", &self.threshold)
            .field("table_margin", &self.table_margin)
            .field("region_policy", &self.region_policy)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("render_scale", &self.render_scale)
            .field("font_size", &self.font_size)
            .field("artifacts_dir", &self.artifacts_dir)
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn TableRenderer>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ReplaceProgressCallback>"),
            )
            .finish()
    }
}

impl ReplaceConfig {
    /// Create a new builder for `ReplaceConfig`.
    pub fn builder() -> ReplaceConfigBuilder {
        ReplaceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ReplaceConfig`].
#[derive(Debug)]
pub struct ReplaceConfigBuilder {
    config: ReplaceConfig,
}

impl ReplaceConfigBuilder {
    pub fn concept(mut self, concept: impl Into<String>) -> Self {
        self.config.concept = concept.into();
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn table_margin(mut self, margin: f32) -> Self {
        self.config.table_margin = margin;
        self
    }

    pub fn region_policy(mut self, policy: RegionPolicy) -> Self {
        self.config.region_policy = policy;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 8.0);
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.config.font_size = size.clamp(4.0, 48.0);
        self
    }

    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifacts_dir = Some(dir.into());
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.config.embedder = Some(embedder);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn TableRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReplaceConfig, ReplaceError> {
        let c = &self.config;
        if c.concept.trim().is_empty() {
            return Err(ReplaceError::InvalidConfig("Concept must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&c.threshold) {
            return Err(ReplaceError::InvalidConfig(format!(
                "Threshold must be 0–1, got {}",
                c.threshold
            )));
        }
        if !(c.table_margin.is_finite() && c.table_margin > 0.0) {
            return Err(ReplaceError::InvalidConfig(format!(
                "Table margin must be > 0, got {}",
                c.table_margin
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Conflict policy when two titles resolve to the same page.
///
/// Only one table region is kept per page. Whichever title loses is listed
/// in the run report as displaced, so no detected table disappears without
/// a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionPolicy {
    /// A later title replaces the page's earlier region. (default)
    #[default]
    LastWins,
    /// The page keeps the region of the first title that claimed it.
    FirstWins,
}

//! Result types returned by the replacement entry points.

use crate::geometry::Rect;
use crate::pipeline::detect::{SkippedBlock, TitleCandidate};
use crate::pipeline::locate::{DisplacedTitle, TableRegion};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What detection and location found, without touching the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectReport {
    pub total_pages: usize,
    /// Non-empty blocks that were scored against the concept.
    pub scored_blocks: usize,
    /// Titles in document order.
    pub titles: Vec<TitleCandidate>,
    /// Blocks whose embedding failed; detection went on without them.
    pub skipped_blocks: Vec<SkippedBlock>,
    /// Titles with no literal match on any page.
    pub unmatched_titles: Vec<String>,
    /// Titles that lost the one-region-per-page conflict.
    pub displaced_titles: Vec<DisplacedTitle>,
    /// Located regions in page order.
    pub regions: Vec<TableRegion>,
}

/// One edited region of the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionOutcome {
    /// 1-indexed page number.
    pub page_num: usize,
    pub title: String,
    /// Covered rectangle, in layout units.
    pub rect: Rect,
    /// 0-based index of the replacement table placed here, or `None` when
    /// the region was left covered but blank.
    pub table_index: Option<usize>,
    /// PNG written for this region when an artifacts directory is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaceStats {
    pub total_pages: usize,
    /// Non-empty blocks that were scored against the concept.
    pub scored_blocks: usize,
    pub titles: usize,
    /// Regions covered, with or without a replacement.
    pub regions: usize,
    /// Regions that received a replacement table.
    pub replaced: usize,
    /// Regions covered but left blank for lack of tables.
    pub blank_regions: usize,
    /// Replacement tables with no region left to receive them.
    pub unused_tables: usize,
    pub total_duration_ms: u64,
    pub detect_duration_ms: u64,
    pub mutate_duration_ms: u64,
}

/// Full record of one replacement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceOutput {
    /// Where the edited document was written.
    pub output_path: PathBuf,
    pub inspection: InspectReport,
    /// Edited regions in page order.
    pub regions: Vec<RegionOutcome>,
    pub stats: ReplaceStats,
}

impl ReplaceOutput {
    /// `true` when titles were found but some could not be turned into a
    /// replaced region. Useful for CLI exit codes.
    pub fn has_soft_failures(&self) -> bool {
        self.stats.blank_regions > 0
            || !self.inspection.unmatched_titles.is_empty()
            || !self.inspection.displaced_titles.is_empty()
            || !self.inspection.skipped_blocks.is_empty()
    }
}

//! Progress-callback trait for per-stage replacement events.
//!
//! Inject an [`Arc<dyn ReplaceProgressCallback>`] via
//! [`crate::config::ReplaceConfigBuilder::progress_callback`] to receive
//! events as the run scans pages and edits regions.
//!
//! Callers can forward events to a channel, a log, or a terminal progress
//! bar without the library knowing how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_tableswap::{ReplaceProgressCallback, ReplaceConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     scanned: Arc<AtomicUsize>,
//! }
//!
//! impl ReplaceProgressCallback for CountingCallback {
//!     fn on_page_scanned(&self, page_num: usize, total_pages: usize, titles_found: usize) {
//!         self.scanned.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} scanned ({} titles)", page_num, total_pages, titles_found);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     scanned: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ReplaceConfig::builder()
//!     .progress_callback(counter as Arc<dyn ReplaceProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the replacement pipeline as it moves through each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ReplaceProgressCallback: Send + Sync {
    /// Called once after text extraction, before any page is scanned.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages in the document
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after every block of a page has been scored.
    ///
    /// # Arguments
    /// * `page_num`     — 1-indexed page number
    /// * `total_pages`  — total pages in the document
    /// * `titles_found` — titles accepted on this page
    fn on_page_scanned(&self, page_num: usize, total_pages: usize, titles_found: usize) {
        let _ = (page_num, total_pages, titles_found);
    }

    /// Called when a region has been covered and a replacement table placed.
    ///
    /// # Arguments
    /// * `page_num` — 1-indexed page number
    /// * `title`    — title whose region was replaced
    fn on_region_replaced(&self, page_num: usize, title: &str) {
        let _ = (page_num, title);
    }

    /// Called when a region was covered but no replacement table was left.
    fn on_region_covered(&self, page_num: usize, title: &str) {
        let _ = (page_num, title);
    }

    /// Called once after the output document has been written.
    ///
    /// # Arguments
    /// * `regions`  — regions edited (replaced or blanked)
    /// * `replaced` — regions that received a replacement table
    fn on_run_complete(&self, regions: usize, replaced: usize) {
        let _ = (regions, replaced);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ReplaceProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReplaceConfig`].
pub type ProgressCallback = Arc<dyn ReplaceProgressCallback>;

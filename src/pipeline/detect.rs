//! Title detection: find the text blocks that read like a table title.
//!
//! Every block on every page is embedded and compared with the concept
//! anchor; blocks scoring at or above the threshold are kept, in page order
//! and then block extraction order. Scores never re-order the output: the
//! table locator pairs titles with replacement tables by position, so the
//! detector must preserve document order exactly.
//!
//! ## Degraded detection
//!
//! A block whose embedding fails (transient provider error, zero vector) is
//! logged and recorded in [`Detection::skipped`] instead of aborting the
//! pass. Only a failure to embed the *concept itself* is fatal.

use crate::error::{EmbeddingError, ReplaceError};
use crate::pipeline::classify::EmbeddingClassifier;
use crate::pipeline::layout::{normalize_text, DocumentLayout};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A block whose similarity to the concept passed the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleCandidate {
    /// 0-based page index.
    pub page: usize,
    /// Whitespace-normalised block text.
    pub text: String,
    /// Cosine similarity to the concept anchor.
    pub score: f32,
}

/// A block that could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedBlock {
    pub page: usize,
    pub text: String,
    pub reason: EmbeddingError,
}

/// Result of one detection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Accepted titles in document order.
    pub titles: Vec<TitleCandidate>,
    /// Blocks whose embedding failed.
    pub skipped: Vec<SkippedBlock>,
    /// Number of non-empty blocks that were scored.
    pub scored_blocks: usize,
}

impl Detection {
    /// Title strings in document order, the shape the locator consumes.
    pub fn title_texts(&self) -> Vec<String> {
        self.titles.iter().map(|t| t.text.clone()).collect()
    }
}

/// Scan every page and keep blocks whose similarity to `concept` is
/// `>= threshold`.
///
/// # Errors
/// [`ReplaceError::Embedding`] when the concept anchor cannot be embedded.
pub async fn detect_titles(
    layout: &DocumentLayout,
    classifier: &EmbeddingClassifier,
    concept: &str,
    threshold: f32,
    progress: Option<&ProgressCallback>,
) -> Result<Detection, ReplaceError> {
    let anchor = classifier.anchor(concept).await?;
    let total_pages = layout.page_count();
    info!(
        "Detecting titles like '{}' (threshold {:.2}) across {} pages with {}",
        anchor.concept(),
        threshold,
        total_pages,
        classifier.embedder_name()
    );

    let mut detection = Detection::default();

    for page in &layout.pages {
        let before = detection.titles.len();

        for block in page.blocks() {
            let text = normalize_text(&block.text);
            if text.is_empty() {
                continue;
            }

            match classifier.score(&anchor, &text).await {
                Ok(score) => {
                    detection.scored_blocks += 1;
                    debug!("Page {}: {:.3} '{}'", page.index + 1, score, text);
                    if score >= threshold {
                        detection.titles.push(TitleCandidate {
                            page: page.index,
                            text,
                            score,
                        });
                    }
                }
                Err(reason) => {
                    warn!(
                        "Page {}: skipping block '{}' — {}",
                        page.index + 1,
                        text,
                        reason
                    );
                    detection.skipped.push(SkippedBlock {
                        page: page.index,
                        text,
                        reason,
                    });
                }
            }
        }

        if let Some(cb) = progress {
            cb.on_page_scanned(page.index + 1, total_pages, detection.titles.len() - before);
        }
    }

    info!(
        "Detected {} titles ({} blocks scored, {} skipped)",
        detection.titles.len(),
        detection.scored_blocks,
        detection.skipped.len()
    );
    Ok(detection)
}

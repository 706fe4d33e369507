//! Table location: turn detected title strings back into page rectangles.
//!
//! Each title is searched literally, page by page in document order. The
//! first page with a hit wins and the first hit on that page is used. The
//! table is presumed to sit directly under its title, so the region is the
//! title's horizontal span from its lower edge down `margin` layout units.
//!
//! ## One region per page
//!
//! The mapping holds at most one rectangle per page. When two titles resolve
//! to the same page, [`RegionPolicy`] decides which survives; the loser is
//! logged and recorded in [`Location::displaced`].
//!
//! The fixed margin is a heuristic, not a measured table boundary: tables
//! shorter than the margin get extra blank space covered, taller ones are
//! only partly covered.

use crate::config::RegionPolicy;
use crate::geometry::Rect;
use crate::pipeline::layout::DocumentLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Page rectangle presumed to bound the table following a title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRegion {
    /// 0-based page index.
    pub page: usize,
    /// The title whose match produced this region.
    pub title: String,
    /// Bounding box of the title match itself.
    pub title_rect: Rect,
    /// Region below the title, in layout units.
    pub rect: Rect,
}

/// A title whose region lost the one-per-page conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplacedTitle {
    pub page: usize,
    /// Title that lost its region.
    pub title: String,
    /// Title whose region the page kept.
    pub kept: String,
}

/// Result of locating all titles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Page index → region, iterated in page order.
    pub regions: BTreeMap<usize, TableRegion>,
    /// Titles with no literal match anywhere in the document.
    pub unmatched: Vec<String>,
    /// Titles whose region was overwritten or rejected.
    pub displaced: Vec<DisplacedTitle>,
}

impl Location {
    /// Regions in page order.
    pub fn ordered(&self) -> Vec<&TableRegion> {
        self.regions.values().collect()
    }
}

/// Resolve each title to a region.
///
/// `titles` is consumed in order; with [`RegionPolicy::LastWins`] a later
/// title on an already-claimed page replaces the earlier region, with
/// [`RegionPolicy::FirstWins`] it is rejected.
pub fn locate_tables(
    layout: &DocumentLayout,
    titles: &[String],
    margin: f32,
    policy: RegionPolicy,
) -> Location {
    let mut location = Location::default();

    for title in titles {
        let hit = layout
            .pages
            .iter()
            .find_map(|page| page.search(title).first().map(|r| (page.index, *r)));

        let Some((page, title_rect)) = hit else {
            warn!("Title '{}' not found on any page", title);
            location.unmatched.push(title.clone());
            continue;
        };

        let region = TableRegion {
            page,
            title: title.clone(),
            title_rect,
            rect: title_rect.extend_below(margin),
        };
        debug!("Title '{}' → page {} {}", title, page + 1, region.rect);

        match location.regions.get(&page) {
            None => {
                location.regions.insert(page, region);
            }
            Some(existing) => match policy {
                RegionPolicy::LastWins => {
                    warn!(
                        "Page {}: region for '{}' replaced by '{}'",
                        page + 1,
                        existing.title,
                        title
                    );
                    location.displaced.push(DisplacedTitle {
                        page,
                        title: existing.title.clone(),
                        kept: title.clone(),
                    });
                    location.regions.insert(page, region);
                }
                RegionPolicy::FirstWins => {
                    warn!(
                        "Page {}: region for '{}' kept, '{}' ignored",
                        page + 1,
                        existing.title,
                        title
                    );
                    location.displaced.push(DisplacedTitle {
                        page,
                        title: title.clone(),
                        kept: existing.title.clone(),
                    });
                }
            },
        }
    }

    info!(
        "Located {} table regions ({} titles unmatched, {} displaced)",
        location.regions.len(),
        location.unmatched.len(),
        location.displaced.len()
    );
    location
}

//! Axis-aligned rectangles in page layout units.
//!
//! All geometry in this crate uses **top-left origin** page coordinates
//! measured in PDF points: `x` grows to the right, `y` grows *downward*.
//! "Extend a title downward by 300 units" therefore means adding to `y1`.
//!
//! PDFium reports bounds with a bottom-left origin; the conversion happens
//! once, at the extraction and mutation boundaries
//! ([`Rect::from_pdf_bounds`] / [`Rect::to_pdf_bounds`]), so every pipeline
//! stage in between reasons about a single coordinate system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned rectangle `(x0, y0) – (x1, y1)` with `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Build a rectangle from two corners, normalising their order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Rectangle covering a whole page of the given size.
    pub fn page(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Overlapping area of two rectangles, or `None` when they only touch or
    /// are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let r = Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }

    /// The band directly below this rectangle: same horizontal span, starting
    /// at the lower edge and reaching `extent` units further down.
    pub fn extend_below(&self, extent: f32) -> Rect {
        Rect::new(self.x0, self.y1, self.x1, self.y1 + extent)
    }

    /// Fraction of the shorter rectangle's height shared with `other`'s
    /// vertical span. `1.0` means one is vertically inside the other.
    pub fn vertical_overlap_ratio(&self, other: &Rect) -> f32 {
        let overlap = self.y1.min(other.y1) - self.y0.max(other.y0);
        let shortest = self.height().min(other.height());
        if shortest <= 0.0 {
            return 0.0;
        }
        (overlap / shortest).max(0.0)
    }

    /// `true` when the horizontal spans share at least one point.
    pub fn overlaps_horizontally(&self, other: &Rect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }

    /// Convert PDFium bounds (bottom-left origin) into layout coordinates.
    pub fn from_pdf_bounds(left: f32, bottom: f32, right: f32, top: f32, page_height: f32) -> Rect {
        Rect::new(left, page_height - top, right, page_height - bottom)
    }

    /// Convert back to PDFium bounds: `(left, bottom, right, top)`.
    pub fn to_pdf_bounds(&self, page_height: f32) -> (f32, f32, f32, f32) {
        (self.x0, page_height - self.y1, self.x1, page_height - self.y0)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect({:.1}, {:.1}, {:.1}, {:.1})",
            self.x0, self.y0, self.x1, self.y1
        )
    }
}

//! Page layout snapshot: glyphs → lines → text blocks, plus literal search.
//!
//! PDFium exposes text as a flat sequence of characters with bounding boxes
//! but has no notion of a "block". This module rebuilds just enough layout
//! to feed the title detector and the table locator:
//!
//! 1. **Lines** — consecutive glyphs (in extraction order) that share a
//!    vertical band. A line ends at an explicit line break or when the next
//!    glyph no longer overlaps the current band by half its height.
//! 2. **Blocks** — consecutive lines stacked closely under one another with
//!    similar heights and overlapping horizontal spans.
//! 3. **Search stream** — every line's normalised text joined by single
//!    spaces, with the bounds of each character kept alongside so a literal
//!    match can be turned back into a rectangle.
//!
//! The snapshot is plain owned data. It is produced once per document inside
//! `spawn_blocking` (see [`crate::pipeline::extract`]) and can then be shared
//! freely with async stages. Tests build snapshots by hand with
//! [`Glyph::run`].

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};

/// Minimum vertical overlap (fraction of the shorter height) for a glyph to
/// continue the current line.
const LINE_OVERLAP: f32 = 0.5;

/// Maximum gap between two lines, in multiples of the upper line's height,
/// for them to belong to the same block.
const BLOCK_GAP_RATIO: f32 = 0.6;

/// Maximum ratio between two line heights for them to share a block.
/// Headings set in a larger size than the following text start a new block.
const BLOCK_HEIGHT_RATIO: f32 = 1.3;

/// Horizontal gap (in multiples of the average glyph width) above which a
/// virtual space is inserted between two glyphs.
const SPACE_GAP_RATIO: f32 = 0.3;

/// A single character as reported by the PDF text layer.
///
/// `bounds` is `None` for characters PDFium generates itself (line breaks,
/// some spaces) which have no drawn shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub ch: char,
    pub bounds: Option<Rect>,
}

impl Glyph {
    pub fn new(ch: char, bounds: Option<Rect>) -> Self {
        Self { ch, bounds }
    }

    /// Lay out `text` as a single run of fixed-advance glyphs starting at
    /// `(x, top)`. Spaces get no bounds, mirroring PDFium's generated chars.
    pub fn run(text: &str, x: f32, top: f32, advance: f32, size: f32) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| {
                let left = x + i as f32 * advance;
                let bounds = if ch.is_whitespace() {
                    None
                } else {
                    Some(Rect::new(left, top, left + advance * 0.9, top + size))
                };
                Glyph { ch, bounds }
            })
            .collect()
    }
}

/// A maximal span of text on one page with its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Whitespace-normalised text (single spaces, trimmed).
    pub text: String,
    pub bounds: Rect,
}

/// One reconstructed line: normalised characters with optional bounds.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    chars: Vec<(char, Option<Rect>)>,
    bounds: Rect,
}

impl Line {
    fn text(&self) -> String {
        self.chars.iter().map(|(c, _)| *c).collect()
    }
}

/// Layout snapshot of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// 0-based page index.
    pub index: usize,
    pub width: f32,
    pub height: f32,
    blocks: Vec<TextBlock>,
    stream: Vec<(char, Option<Rect>)>,
}

impl PageLayout {
    /// Build the snapshot of a page from its glyphs in extraction order.
    pub fn from_glyphs(index: usize, width: f32, height: f32, glyphs: &[Glyph]) -> Self {
        let lines = build_lines(glyphs);
        let blocks = group_blocks(&lines);

        let mut stream = Vec::new();
        for line in &lines {
            if !stream.is_empty() {
                stream.push((' ', None));
            }
            stream.extend(line.chars.iter().copied());
        }

        Self {
            index,
            width,
            height,
            blocks,
            stream,
        }
    }

    /// An empty page (no text layer).
    pub fn blank(index: usize, width: f32, height: f32) -> Self {
        Self::from_glyphs(index, width, height, &[])
    }

    /// Text blocks in extraction order.
    pub fn blocks(&self) -> &[TextBlock] {
        &self.blocks
    }

    /// Page text as a single whitespace-normalised string.
    pub fn text(&self) -> String {
        self.stream.iter().map(|(c, _)| *c).collect()
    }

    /// Find every non-overlapping literal occurrence of `needle`, in reading
    /// order, and return the bounding box of each match.
    ///
    /// Both sides are whitespace-normalised first, so a title that wraps
    /// over two lines still matches its single-line block text. Matching is
    /// case-sensitive. Occurrences made only of bound-less characters are
    /// dropped because they cannot be placed on the page.
    pub fn search(&self, needle: &str) -> Vec<Rect> {
        let needle: Vec<char> = normalize_text(needle).chars().collect();
        if needle.is_empty() || needle.len() > self.stream.len() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        let mut i = 0;
        while i + needle.len() <= self.stream.len() {
            let window = &self.stream[i..i + needle.len()];
            let matched = window.iter().zip(&needle).all(|((c, _), n)| c == n);
            if matched {
                let rect = window
                    .iter()
                    .filter_map(|(_, b)| *b)
                    .reduce(|acc, b| acc.union(&b));
                if let Some(rect) = rect {
                    hits.push(rect);
                }
                i += needle.len();
            } else {
                i += 1;
            }
        }
        hits
    }
}

/// Layout snapshot of a whole document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentLayout {
    pub pages: Vec<PageLayout>,
}

impl DocumentLayout {
    pub fn new(pages: Vec<PageLayout>) -> Self {
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks().len()).sum()
    }
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Line reconstruction ──────────────────────────────────────────────────────

fn build_lines(glyphs: &[Glyph]) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current: Vec<&Glyph> = Vec::new();
    let mut band: Option<Rect> = None;

    for glyph in glyphs {
        if glyph.ch == '\n' || glyph.ch == '\r' {
            flush_line(&mut current, &mut band, &mut lines);
            continue;
        }

        if let (Some(b), Some(current_band)) = (glyph.bounds, band) {
            if !glyph.ch.is_whitespace() && b.vertical_overlap_ratio(&current_band) < LINE_OVERLAP {
                flush_line(&mut current, &mut band, &mut lines);
            }
        }

        if !glyph.ch.is_whitespace() {
            if let Some(b) = glyph.bounds {
                band = Some(band.map_or(b, |cur| cur.union(&b)));
            }
        }
        current.push(glyph);
    }
    flush_line(&mut current, &mut band, &mut lines);

    lines
}

fn flush_line(current: &mut Vec<&Glyph>, band: &mut Option<Rect>, lines: &mut Vec<Line>) {
    if let Some(line) = build_line(current) {
        lines.push(line);
    }
    current.clear();
    *band = None;
}

/// Normalise a line's glyphs: collapse whitespace, insert virtual spaces at
/// wide horizontal gaps, drop lines that carry no drawn character.
fn build_line(glyphs: &[&Glyph]) -> Option<Line> {
    let drawn: Vec<Rect> = glyphs
        .iter()
        .filter(|g| !g.ch.is_whitespace())
        .filter_map(|g| g.bounds)
        .collect();
    let bounds = drawn.iter().copied().reduce(|acc, b| acc.union(&b))?;
    let avg_width = drawn.iter().map(|b| b.width()).sum::<f32>() / drawn.len() as f32;
    let space_threshold = avg_width * SPACE_GAP_RATIO;

    let mut chars: Vec<(char, Option<Rect>)> = Vec::with_capacity(glyphs.len());
    let mut pending_space = false;
    let mut last_right: Option<f32> = None;

    for glyph in glyphs {
        if glyph.ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if let (Some(b), Some(right)) = (glyph.bounds, last_right) {
            if b.x0 - right > space_threshold {
                pending_space = true;
            }
        }
        if pending_space && !chars.is_empty() {
            chars.push((' ', None));
        }
        pending_space = false;
        chars.push((glyph.ch, glyph.bounds));
        if let Some(b) = glyph.bounds {
            last_right = Some(b.x1);
        }
    }

    if chars.is_empty() {
        None
    } else {
        Some(Line { chars, bounds })
    }
}

// ── Block grouping ───────────────────────────────────────────────────────────

fn group_blocks(lines: &[Line]) -> Vec<TextBlock> {
    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut previous: Option<&Line> = None;

    for line in lines {
        let joins = match (previous, blocks.last()) {
            (Some(prev), Some(_)) => continues_block(prev, line),
            _ => false,
        };

        match blocks.last_mut() {
            Some(block) if joins => {
                block.text.push(' ');
                block.text.push_str(&line.text());
                block.bounds = block.bounds.union(&line.bounds);
            }
            _ => blocks.push(TextBlock {
                text: line.text(),
                bounds: line.bounds,
            }),
        }
        previous = Some(line);
    }

    blocks
}

fn continues_block(prev: &Line, next: &Line) -> bool {
    let prev_h = prev.bounds.height().max(f32::EPSILON);
    let next_h = next.bounds.height().max(f32::EPSILON);
    let gap = next.bounds.y0 - prev.bounds.y1;
    let ratio = prev_h.max(next_h) / prev_h.min(next_h);

    gap >= -0.5 * prev_h
        && gap <= BLOCK_GAP_RATIO * prev_h
        && ratio <= BLOCK_HEIGHT_RATIO
        && prev.bounds.overlaps_horizontally(&next.bounds)
}

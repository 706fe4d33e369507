//! Document mutation: cover located regions and place replacement images.
//!
//! ## Copy, edit, publish
//!
//! The input PDF is never written. Edits are applied to an in-memory pdfium
//! document, saved into a [`NamedTempFile`] created *in the output
//! directory*, and only then persisted onto the output path with an atomic
//! rename. If any edit fails the temp file is dropped (and deleted), so a
//! failed run never leaves a half-edited output behind.
//!
//! Edits are applied strictly in order on one working document: covering a
//! region and then placing an image on it only works in that order.
//!
//! pdfium seeds generated trailer `/ID` strings from a heap address, so the
//! identifiers are overwritten with a digest of the saved document before it
//! is published. Same input and edits give the same bytes in every process.

use crate::error::ReplaceError;
use crate::geometry::Rect;
use crate::pipeline::extract::open_document;
use crate::pipeline::pdfium::bind_pdfium;
use image::DynamicImage;
use pdfium_render::prelude::*;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// One geometric edit on one page. `page` is 0-based; `rect` is in layout
/// units (top-left origin).
#[derive(Debug, Clone)]
pub enum RegionEdit {
    /// Paint an opaque white rectangle.
    Cover { page: usize, rect: Rect },
    /// Composite an image, scaled to fit inside the rectangle.
    Place {
        page: usize,
        rect: Rect,
        image: DynamicImage,
    },
}

impl RegionEdit {
    pub fn page(&self) -> usize {
        match self {
            RegionEdit::Cover { page, .. } | RegionEdit::Place { page, .. } => *page,
        }
    }

    pub fn rect(&self) -> Rect {
        match self {
            RegionEdit::Cover { rect, .. } | RegionEdit::Place { rect, .. } => *rect,
        }
    }
}

/// Largest rectangle with the image's aspect ratio that fits inside
/// `target`, anchored at its top-left corner.
pub fn fit_within(target: &Rect, img_width: u32, img_height: u32) -> Rect {
    if img_width == 0 || img_height == 0 {
        return *target;
    }
    let scale = (target.width() / img_width as f32).min(target.height() / img_height as f32);
    Rect::new(
        target.x0,
        target.y0,
        target.x0 + img_width as f32 * scale,
        target.y0 + img_height as f32 * scale,
    )
}

/// Paint an opaque white fill over `rect` on `page`, writing the result to
/// `output`.
pub async fn cover_region(
    input: &Path,
    output: &Path,
    password: Option<&str>,
    page: usize,
    rect: Rect,
) -> Result<(), ReplaceError> {
    apply_edits(input, output, password, vec![RegionEdit::Cover { page, rect }]).await
}

/// Composite `image` into `rect` on `page`, writing the result to `output`.
pub async fn place_image(
    input: &Path,
    output: &Path,
    password: Option<&str>,
    page: usize,
    rect: Rect,
    image: DynamicImage,
) -> Result<(), ReplaceError> {
    apply_edits(
        input,
        output,
        password,
        vec![RegionEdit::Place { page, rect, image }],
    )
    .await
}

/// Apply `edits` in order and publish the result at `output`.
///
/// Runs inside `spawn_blocking` since pdfium operations are blocking.
pub async fn apply_edits(
    input: &Path,
    output: &Path,
    password: Option<&str>,
    edits: Vec<RegionEdit>,
) -> Result<(), ReplaceError> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        apply_edits_blocking(&input, &output, password.as_deref(), &edits)
    })
    .await
    .map_err(|e| ReplaceError::Internal(format!("Mutation task panicked: {}", e)))?
}

/// Blocking implementation of [`apply_edits`].
pub fn apply_edits_blocking(
    input: &Path,
    output: &Path,
    password: Option<&str>,
    edits: &[RegionEdit],
) -> Result<(), ReplaceError> {
    if same_file(input, output) {
        return Err(ReplaceError::InvalidConfig(format!(
            "Output path '{}' must differ from the input",
            output.display()
        )));
    }

    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, input, password)?;
    let total = document.pages().len() as usize;

    for edit in edits {
        let index = edit.page();
        if index >= total {
            return Err(ReplaceError::PageOutOfRange {
                page: index + 1,
                total,
            });
        }

        let mut page = document
            .pages()
            .get(index as u16)
            .map_err(|e| ReplaceError::Internal(format!("Cannot load page {}: {:?}", index + 1, e)))?;
        let height = page.height().value;
        let bounds = Rect::page(page.width().value, height);
        let rect = edit
            .rect()
            .intersection(&bounds)
            .ok_or(ReplaceError::RegionOutOfBounds {
                page: index + 1,
                rect: edit.rect(),
            })?;

        let edit_failed = |e: PdfiumError| {
            ReplaceError::Internal(format!("Edit on page {} failed: {:?}", index + 1, e))
        };

        match edit {
            RegionEdit::Cover { .. } => {
                info!("Covering page {} region {}", index + 1, rect);
                let (left, bottom, right, top) = rect.to_pdf_bounds(height);
                page.objects_mut()
                    .create_path_object_rect(
                        PdfRect::new_from_values(bottom, left, top, right),
                        None,
                        None,
                        Some(PdfColor::new(255, 255, 255, 255)),
                    )
                    .map_err(edit_failed)?;
            }
            RegionEdit::Place { image, .. } => {
                let placed = fit_within(&rect, image.width(), image.height());
                info!("Placing {}x{} image on page {} at {}", image.width(), image.height(), index + 1, placed);
                let (left, bottom, _, _) = placed.to_pdf_bounds(height);
                page.objects_mut()
                    .create_image_object(
                        PdfPoints::new(left),
                        PdfPoints::new(bottom),
                        image,
                        Some(PdfPoints::new(placed.width())),
                        Some(PdfPoints::new(placed.height())),
                    )
                    .map_err(edit_failed)?;
            }
        }
    }

    let dir = output_dir(output);
    let write_failed = |source: std::io::Error| ReplaceError::OutputWriteFailed {
        path: output.to_path_buf(),
        source,
    };

    let mut bytes = document.save_to_bytes().map_err(|e| ReplaceError::OutputWriteFailed {
        path: output.to_path_buf(),
        source: std::io::Error::other(format!("{:?}", e)),
    })?;
    stamp_file_id(&mut bytes);

    let mut working = NamedTempFile::new_in(&dir).map_err(write_failed)?;
    working.write_all(&bytes).map_err(write_failed)?;
    working.persist(output).map_err(|e| write_failed(e.error))?;

    debug!("Applied {} edits → {}", edits.len(), output.display());
    Ok(())
}

/// Replace the hex digits of every string in the last `/ID [...]` array with
/// a SHA-256 digest of the document taken with those digits zeroed. Lengths
/// are kept, so xref offsets stay valid. Without an `/ID` array the bytes
/// are left alone.
fn stamp_file_id(bytes: &mut [u8]) {
    let ranges = file_id_ranges(bytes);
    if ranges.is_empty() {
        return;
    }

    for range in &ranges {
        for b in &mut bytes[range.clone()] {
            if b.is_ascii_hexdigit() {
                *b = b'0';
            }
        }
    }
    let digest: Vec<u8> = Sha256::digest(&*bytes)
        .iter()
        .flat_map(|b| format!("{:02X}", b).into_bytes())
        .collect();

    for range in ranges {
        let digits = bytes[range].iter_mut().filter(|b| b.is_ascii_hexdigit());
        for (b, d) in digits.zip(digest.iter().cycle()) {
            *b = *d;
        }
    }
}

/// Ranges of the hex strings' contents inside the last `/ID [<..> <..>]`.
fn file_id_ranges(bytes: &[u8]) -> Vec<Range<usize>> {
    let mut end = bytes.len();
    while let Some(key) = bytes[..end].windows(3).rposition(|w| w == b"/ID") {
        if let Some(ranges) = id_array_at(bytes, key + 3) {
            return ranges;
        }
        end = key;
    }
    Vec::new()
}

/// Hex string ranges of an array starting at `i`, or `None` when no array
/// follows.
fn id_array_at(bytes: &[u8], mut i: usize) -> Option<Vec<Range<usize>>> {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    if bytes.get(i) != Some(&b'[') {
        return None;
    }

    let mut ranges = Vec::new();
    i += 1;
    while let Some(&b) = bytes.get(i) {
        match b {
            b']' => return Some(ranges),
            b'<' => {
                let open = i + 1;
                let len = bytes[open..].iter().position(|&c| c == b'>')?;
                ranges.push(open..open + len);
                i = open + len + 1;
            }
            _ => i += 1,
        }
    }
    None
}

fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

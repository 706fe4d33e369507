//! Text extraction: read every page's glyphs via pdfium into a
//! [`DocumentLayout`] snapshot.
//!
//! ## Why snapshot first?
//!
//! `pdfium-render` documents borrow the `Pdfium` instance and are not `Send`,
//! while the title detector awaits an async embedding provider. Extracting
//! all glyphs up front inside `spawn_blocking` turns the document into plain
//! owned data, so the async stages never hold a pdfium handle across an
//! `.await`. Text layers are small (a few KB per page), so holding the whole
//! document in memory is not a concern.

use crate::error::ReplaceError;
use crate::geometry::Rect;
use crate::pipeline::layout::{DocumentLayout, Glyph, PageLayout};
use crate::pipeline::pdfium::bind_pdfium;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Extract the layout snapshot of every page of a PDF.
///
/// Runs inside `spawn_blocking` since pdfium operations are blocking.
pub async fn extract_layout(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentLayout, ReplaceError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_layout_blocking(&path, password.as_deref()))
        .await
        .map_err(|e| ReplaceError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of layout extraction.
pub fn extract_layout_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentLayout, ReplaceError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let mut pages = Vec::with_capacity(document.pages().len() as usize);
    for (index, page) in document.pages().iter().enumerate() {
        let layout = page_layout(index, &page)?;
        debug!(
            "Page {}: {} text blocks",
            index + 1,
            layout.blocks().len()
        );
        pages.push(layout);
    }

    let layout = DocumentLayout::new(pages);
    info!(
        "Extracted layout: {} pages, {} text blocks",
        layout.page_count(),
        layout.block_count()
    );
    Ok(layout)
}

/// Open a PDF with pdfium, mapping load failures onto the fatal error taxonomy.
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ReplaceError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ReplaceError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ReplaceError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ReplaceError::DocumentRead {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Convert one pdfium page into a layout snapshot.
#[allow(deprecated)] // PdfRect field access deprecated in 0.8.28, removed in 0.9.0
fn page_layout(index: usize, page: &PdfPage) -> Result<PageLayout, ReplaceError> {
    let width = page.width().value;
    let height = page.height().value;

    let text = match page.text() {
        Ok(text) => text,
        Err(e) => {
            warn!("Page {}: no readable text layer ({})", index + 1, e);
            return Ok(PageLayout::blank(index, width, height));
        }
    };

    let glyphs: Vec<Glyph> = text
        .chars()
        .iter()
        .filter_map(|ch| {
            let c = ch.unicode_char()?;
            let bounds = ch.tight_bounds().ok().map(|r| {
                Rect::from_pdf_bounds(
                    r.left.value,
                    r.bottom.value,
                    r.right.value,
                    r.top.value,
                    height,
                )
            });
            Some(Glyph::new(c, bounds.filter(|b| !b.is_empty())))
        })
        .collect();

    Ok(PageLayout::from_glyphs(index, width, height, &glyphs))
}

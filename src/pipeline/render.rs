//! Replacement content rendering: turn a [`ReplacementTable`] into an image.
//!
//! The [`TableRenderer`] trait is the seam: anything that can produce a
//! deterministic raster for a table can be plugged in. The default
//! [`PdfiumTableRenderer`] lays the table out on a scratch single-page PDF
//! (standard Helvetica, header row on a grey band, thin grid) and rasterises
//! that page with pdfium, so the result matches how pdfium itself draws text.
//!
//! ## Why rasterise instead of drawing into the target page?
//!
//! The target region has a fixed size the table knows nothing about. An
//! image scales into any rectangle, while native text objects would need a
//! second layout pass per region. Rendering at 2 px per point keeps the
//! scaled result legible.
//!
//! Layout is computed by [`TableLayout::measure`] from character counts
//! alone, so image dimensions depend only on the table's shape and content.

use crate::error::ReplaceError;
use crate::pipeline::pdfium::bind_pdfium;
use crate::pipeline::tables::ReplacementTable;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// Average Helvetica glyph advance as a fraction of the font size.
const AVG_ADVANCE: f32 = 0.55;

/// Something that can rasterise a replacement table.
pub trait TableRenderer: Send + Sync {
    /// Render `table` (the `index`-th replacement, 0-based, used in errors).
    fn render(&self, index: usize, table: &ReplacementTable) -> Result<DynamicImage, ReplaceError>;
}

/// Geometry of a laid-out table, in points with a top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub font_size: f32,
    pub padding: f32,
    pub row_height: f32,
    pub column_widths: Vec<f32>,
}

impl TableLayout {
    /// Size each column to its widest cell and every row to one text line.
    pub fn measure(table: &ReplacementTable, font_size: f32) -> Self {
        let padding = font_size * 0.6;
        let min_width = font_size * 3.0;

        let column_widths = (0..table.column_count())
            .map(|col| {
                let chars = table
                    .all_rows()
                    .map(|row| row[col].chars().count())
                    .max()
                    .unwrap_or(0);
                (text_width(chars, font_size) + 2.0 * padding).max(min_width)
            })
            .collect();

        Self {
            font_size,
            padding,
            row_height: font_size * 2.0,
            column_widths,
        }
    }

    pub fn width(&self) -> f32 {
        self.column_widths.iter().sum::<f32>() + 2.0 * self.padding
    }

    pub fn height(&self, rows: usize) -> f32 {
        self.row_height * rows as f32 + 2.0 * self.padding
    }

    /// Left edge of column `col`.
    pub fn column_x(&self, col: usize) -> f32 {
        self.padding + self.column_widths[..col].iter().sum::<f32>()
    }

    /// Left edge of `text` centred in column `col`.
    pub fn centred_x(&self, col: usize, text: &str) -> f32 {
        let free = self.column_widths[col] - text_width(text.chars().count(), self.font_size);
        self.column_x(col) + free.max(0.0) / 2.0
    }
}

fn text_width(chars: usize, font_size: f32) -> f32 {
    chars as f32 * font_size * AVG_ADVANCE
}

/// Default renderer: draws the table on a scratch pdfium page and
/// rasterises it.
#[derive(Debug, Clone)]
pub struct PdfiumTableRenderer {
    font_size: f32,
    scale: f32,
}

impl PdfiumTableRenderer {
    /// `scale` is pixels per point of the rendered image.
    pub fn new(font_size: f32, scale: f32) -> Self {
        Self { font_size, scale }
    }
}

impl Default for PdfiumTableRenderer {
    fn default() -> Self {
        Self::new(10.0, 2.0)
    }
}

impl TableRenderer for PdfiumTableRenderer {
    fn render(&self, index: usize, table: &ReplacementTable) -> Result<DynamicImage, ReplaceError> {
        let failed = |e: PdfiumError| ReplaceError::Render {
            index,
            detail: format!("{:?}", e),
        };

        let layout = TableLayout::measure(table, self.font_size);
        let (width, height) = (layout.width(), layout.height(table.row_count()));

        let pdfium = bind_pdfium()?;
        let mut document = pdfium.create_new_pdf().map_err(failed)?;
        let regular = document.fonts_mut().helvetica();
        let bold = document.fonts_mut().helvetica_bold();
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::new_custom(
                PdfPoints::new(width),
                PdfPoints::new(height),
            ))
            .map_err(failed)?;

        let black = PdfColor::new(0, 0, 0, 255);
        let band = PdfColor::new(230, 230, 230, 255);
        let objects = page.objects_mut();

        for (r, row) in table.all_rows().enumerate() {
            // pdfium's origin is bottom-left
            let top = height - layout.padding - r as f32 * layout.row_height;
            let bottom = top - layout.row_height;
            let baseline = bottom + (layout.row_height - layout.font_size * 0.7) / 2.0;

            for (c, text) in row.iter().enumerate() {
                let left = layout.column_x(c);
                let right = left + layout.column_widths[c];
                objects
                    .create_path_object_rect(
                        PdfRect::new_from_values(bottom, left, top, right),
                        Some(black),
                        Some(PdfPoints::new(0.5)),
                        (r == 0).then_some(band),
                    )
                    .map_err(failed)?;

                if text.is_empty() {
                    continue;
                }
                objects
                    .create_text_object(
                        PdfPoints::new(layout.centred_x(c, text)),
                        PdfPoints::new(baseline),
                        text,
                        if r == 0 { bold } else { regular },
                        PdfPoints::new(layout.font_size),
                    )
                    .map_err(failed)?;
            }
        }

        let target_width = (width * self.scale).round() as i32;
        let target_height = (height * self.scale).round() as i32;
        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(target_width)
                    .set_maximum_height(target_height),
            )
            .map_err(failed)?;

        let image = bitmap.as_image();
        debug!(
            "Rendered table {} ({}x{} cells) → {}x{} px",
            index + 1,
            table.row_count(),
            table.column_count(),
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

/// Render every table in order with `renderer`.
///
/// Runs inside `spawn_blocking` since pdfium rendering is CPU-bound.
pub async fn render_tables(
    renderer: std::sync::Arc<dyn TableRenderer>,
    tables: Vec<ReplacementTable>,
) -> Result<Vec<DynamicImage>, ReplaceError> {
    tokio::task::spawn_blocking(move || {
        tables
            .iter()
            .enumerate()
            .map(|(i, t)| renderer.render(i, t))
            .collect()
    })
    .await
    .map_err(|e| ReplaceError::Internal(format!("Render task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> ReplacementTable {
        ReplacementTable::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn columns_fit_their_widest_cell() {
        let t = table(&[&["Plan", "Deductible"], &["Bronze HSA Extended", "$1"]]);
        let l = TableLayout::measure(&t, 10.0);
        // 19 chars * 5.5 + 2 * 6 padding
        assert!((l.column_widths[0] - 116.5).abs() < 1e-3);
        assert!((l.column_widths[1] - 67.0).abs() < 1e-3);
    }

    #[test]
    fn short_columns_get_a_minimum_width() {
        let l = TableLayout::measure(&table(&[&["a", ""]]), 10.0);
        assert_eq!(l.column_widths, vec![30.0, 30.0]);
    }

    #[test]
    fn size_grows_with_rows_and_columns() {
        let small = table(&[&["a", "b"], &["1", "2"]]);
        let tall = table(&[&["a", "b"], &["1", "2"], &["3", "4"], &["5", "6"]]);
        let wide = table(&[&["a", "b", "c", "d"], &["1", "2", "3", "4"]]);

        let ls = TableLayout::measure(&small, 10.0);
        let lt = TableLayout::measure(&tall, 10.0);
        let lw = TableLayout::measure(&wide, 10.0);

        assert!(lt.height(tall.row_count()) > ls.height(small.row_count()));
        assert_eq!(lt.width(), ls.width());
        assert!(lw.width() > ls.width());
    }

    #[test]
    fn text_is_centred_in_its_column() {
        let t = table(&[&["Premium", "x"]]);
        let l = TableLayout::measure(&t, 10.0);
        let left = l.centred_x(1, "x");
        let right = l.column_x(1) + l.column_widths[1] - (left + 5.5);
        assert!((left - l.column_x(1) - right).abs() < 1e-3);
    }

    #[test]
    fn layout_is_deterministic() {
        let t = table(&[&["Plan", "Rate"], &["Gold", "$420"]]);
        assert_eq!(TableLayout::measure(&t, 10.0), TableLayout::measure(&t, 10.0));
    }
}

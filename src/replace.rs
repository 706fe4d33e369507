//! Table replacement entry points.
//!
//! A run goes through these stages, each in its own pipeline module:
//!
//! ```text
//!  input PDF ──► extract ──► detect ──► locate ──► plan ──► render ──► mutate ──► output PDF
//!                (pdfium)   (embedder)  (search)  (pair)   (pdfium)   (pdfium)
//! ```
//!
//! Regions are paired with replacement tables purely by position: the
//! `n`-th region in page order gets the `n`-th table in source order.
//! Surplus regions stay covered but blank; surplus tables are counted.

use crate::config::ReplaceConfig;
use crate::error::{EmbeddingError, ReplaceError};
use crate::output::{InspectReport, RegionOutcome, ReplaceOutput, ReplaceStats};
use crate::pipeline::classify::{Embedder, EmbeddingClassifier, LlmEmbedder};
use crate::pipeline::encode::ArtifactStage;
use crate::pipeline::layout::DocumentLayout;
use crate::pipeline::locate::TableRegion;
use crate::pipeline::mutate::RegionEdit;
use crate::pipeline::render::{PdfiumTableRenderer, TableRenderer};
use crate::pipeline::tables::ReplacementTable;
use crate::pipeline::{detect, extract, input, locate, mutate, render, tables};
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Pairing of located regions with replacement tables.
#[derive(Debug, Clone, PartialEq)]
pub struct EditPlan {
    /// Regions in page order with the index of the table they receive.
    pub assignments: Vec<(TableRegion, Option<usize>)>,
    /// Tables left over once every region has one.
    pub unused_tables: usize,
}

impl EditPlan {
    pub fn replaced(&self) -> usize {
        self.assignments.iter().filter(|(_, t)| t.is_some()).count()
    }

    pub fn blank_regions(&self) -> usize {
        self.assignments.len() - self.replaced()
    }
}

/// Pair `regions` (page order) with the first `table_count` tables.
pub fn plan_edits(regions: &[TableRegion], table_count: usize) -> EditPlan {
    let assignments = regions
        .iter()
        .enumerate()
        .map(|(i, r)| (r.clone(), (i < table_count).then_some(i)))
        .collect();
    EditPlan {
        assignments,
        unused_tables: table_count.saturating_sub(regions.len()),
    }
}

/// Detect and locate table titles without modifying anything.
///
/// Needs an embedding provider but no table source.
pub async fn inspect(
    input_pdf: impl AsRef<Path>,
    config: &ReplaceConfig,
) -> Result<InspectReport, ReplaceError> {
    let resolved = input::resolve_local(input_pdf.as_ref())?;
    let layout = extract::extract_layout(resolved.path(), config.password.as_deref()).await?;
    let classifier = EmbeddingClassifier::new(resolve_embedder(config)?);
    inspect_layout(&layout, &classifier, config).await
}

/// Replace the tables of `input_pdf` with those read from `table_source`,
/// writing `<stem>_tables_replaced.pdf` next to the input.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(ReplaceError)` only for fatal errors: unreadable input or
/// table source, no embedding provider, unwritable output. Titles that
/// match nowhere and regions left blank are reported in the output instead.
pub async fn replace_tables(
    input_pdf: impl AsRef<Path>,
    table_source: impl AsRef<Path>,
    config: &ReplaceConfig,
) -> Result<ReplaceOutput, ReplaceError> {
    let output = input::default_output_path(input_pdf.as_ref());
    replace_tables_to_file(input_pdf, table_source, output, config).await
}

/// Like [`replace_tables`], writing the edited document to `output_path`.
pub async fn replace_tables_to_file(
    input_pdf: impl AsRef<Path>,
    table_source: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ReplaceConfig,
) -> Result<ReplaceOutput, ReplaceError> {
    let resolved = input::resolve_local(input_pdf.as_ref())?;
    run(resolved.path(), table_source.as_ref(), output_path.as_ref(), config).await
}

/// Replace tables in PDF bytes held in memory.
///
/// The bytes are spilled to a managed temp file that is removed on return.
pub async fn replace_tables_from_bytes(
    bytes: &[u8],
    table_source: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ReplaceConfig,
) -> Result<ReplaceOutput, ReplaceError> {
    let resolved = input::resolve_bytes(bytes, "input.pdf")?;
    run(resolved.path(), table_source.as_ref(), output_path.as_ref(), config).await
}

/// Synchronous wrapper around [`replace_tables`].
///
/// Creates a temporary tokio runtime internally.
pub fn replace_tables_sync(
    input_pdf: impl AsRef<Path>,
    table_source: impl AsRef<Path>,
    config: &ReplaceConfig,
) -> Result<ReplaceOutput, ReplaceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReplaceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(replace_tables(input_pdf, table_source, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    pdf_path: &Path,
    table_source: &Path,
    output_path: &Path,
    config: &ReplaceConfig,
) -> Result<ReplaceOutput, ReplaceError> {
    let total_start = Instant::now();
    info!(
        "Replacing tables in {} using {}",
        pdf_path.display(),
        table_source.display()
    );

    // ── Step 1: Read the document (fail fast on an unreadable PDF) ───────
    let detect_start = Instant::now();
    let layout = extract::extract_layout(pdf_path, config.password.as_deref()).await?;

    // ── Step 2: Load replacement tables ──────────────────────────────────
    let tables = tables::load_tables(table_source)?;

    // ── Step 3: Detect and locate ────────────────────────────────────────
    let classifier = EmbeddingClassifier::new(resolve_embedder(config)?);
    let inspection = inspect_layout(&layout, &classifier, config).await?;
    let detect_duration_ms = detect_start.elapsed().as_millis() as u64;

    // ── Step 4: Pair regions with tables ─────────────────────────────────
    let plan = plan_edits(&inspection.regions, tables.len());
    if plan.blank_regions() > 0 {
        warn!(
            "{} regions have no replacement table and will be left blank",
            plan.blank_regions()
        );
    }
    if plan.unused_tables > 0 {
        warn!("{} replacement tables were not used", plan.unused_tables);
    }

    // ── Step 5: Render the tables that will be placed ────────────────────
    let needed: Vec<ReplacementTable> = tables.into_iter().take(plan.replaced()).collect();
    let renderer = resolve_renderer(config);
    let images = render::render_tables(renderer, needed).await?;

    // ── Step 6: Apply edits and publish ──────────────────────────────────
    let mutate_start = Instant::now();
    let regions = apply_plan(pdf_path, output_path, config, &plan, &images).await?;
    let mutate_duration_ms = mutate_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        for r in &regions {
            match r.table_index {
                Some(_) => cb.on_region_replaced(r.page_num, &r.title),
                None => cb.on_region_covered(r.page_num, &r.title),
            }
        }
        cb.on_run_complete(regions.len(), plan.replaced());
    }

    let stats = ReplaceStats {
        total_pages: inspection.total_pages,
        scored_blocks: inspection.scored_blocks,
        titles: inspection.titles.len(),
        regions: regions.len(),
        replaced: plan.replaced(),
        blank_regions: plan.blank_regions(),
        unused_tables: plan.unused_tables,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        detect_duration_ms,
        mutate_duration_ms,
    };

    info!(
        "Replacement complete: {}/{} regions replaced, {}ms total → {}",
        stats.replaced,
        stats.regions,
        stats.total_duration_ms,
        output_path.display()
    );

    Ok(ReplaceOutput {
        output_path: output_path.to_path_buf(),
        inspection,
        regions,
        stats,
    })
}

/// Cover every planned region, place its image, and publish the output.
///
/// Artifacts are written before the document is saved and removed again if
/// anything fails, so a failed run leaves neither the PDF nor PNGs behind.
async fn apply_plan(
    pdf_path: &Path,
    output_path: &Path,
    config: &ReplaceConfig,
    plan: &EditPlan,
    images: &[DynamicImage],
) -> Result<Vec<RegionOutcome>, ReplaceError> {
    let mut stage = config.artifacts_dir.as_deref().map(ArtifactStage::new);
    let mut edits = Vec::with_capacity(plan.assignments.len() * 2);
    let mut regions = Vec::with_capacity(plan.assignments.len());

    for (region, table_index) in &plan.assignments {
        edits.push(RegionEdit::Cover {
            page: region.page,
            rect: region.rect,
        });

        let mut artifact = None;
        if let Some(i) = *table_index {
            let image = images.get(i).cloned().ok_or_else(|| {
                ReplaceError::Internal(format!("No rendered image for table {}", i + 1))
            })?;
            if let Some(ref mut stage) = stage {
                artifact = Some(stage.write(i, region.page, &image)?);
            }
            edits.push(RegionEdit::Place {
                page: region.page,
                rect: region.rect,
                image,
            });
        }

        regions.push(RegionOutcome {
            page_num: region.page + 1,
            title: region.title.clone(),
            rect: region.rect,
            table_index: *table_index,
            artifact,
        });
    }

    mutate::apply_edits(pdf_path, output_path, config.password.as_deref(), edits).await?;
    if let Some(stage) = stage {
        stage.commit();
    }
    Ok(regions)
}

async fn inspect_layout(
    layout: &DocumentLayout,
    classifier: &EmbeddingClassifier,
    config: &ReplaceConfig,
) -> Result<InspectReport, ReplaceError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(layout.page_count());
    }

    let detection = detect::detect_titles(
        layout,
        classifier,
        &config.concept,
        config.threshold,
        config.progress_callback.as_ref(),
    )
    .await?;

    let location = locate::locate_tables(
        layout,
        &detection.title_texts(),
        config.table_margin,
        config.region_policy,
    );
    debug!("{} regions located", location.regions.len());

    Ok(InspectReport {
        total_pages: layout.page_count(),
        scored_blocks: detection.scored_blocks,
        regions: location.ordered().into_iter().cloned().collect(),
        titles: detection.titles,
        skipped_blocks: detection.skipped,
        unmatched_titles: location.unmatched,
        displaced_titles: location.displaced,
    })
}

/// Use the configured embedder, else auto-detect one from the environment.
fn resolve_embedder(config: &ReplaceConfig) -> Result<Arc<dyn Embedder>, ReplaceError> {
    if let Some(ref embedder) = config.embedder {
        return Ok(Arc::clone(embedder));
    }
    let embedder = LlmEmbedder::from_env().map_err(|e| match e {
        EmbeddingError::ModelUnavailable(_) => ReplaceError::Embedding(e),
        other => ReplaceError::Embedding(EmbeddingError::ModelUnavailable(other.to_string())),
    })?;
    Ok(Arc::new(embedder))
}

fn resolve_renderer(config: &ReplaceConfig) -> Arc<dyn TableRenderer> {
    match config.renderer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(PdfiumTableRenderer::new(config.font_size, config.render_scale)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn region(page: usize) -> TableRegion {
        let title_rect = Rect::new(72.0, 100.0, 300.0, 110.0);
        TableRegion {
            page,
            title: format!("Title {}", page),
            title_rect,
            rect: title_rect.extend_below(300.0),
        }
    }

    #[test]
    fn every_region_gets_a_table_when_counts_match() {
        let plan = plan_edits(&[region(0), region(2)], 2);
        let got: Vec<_> = plan.assignments.iter().map(|(r, t)| (r.page, *t)).collect();
        assert_eq!(got, vec![(0, Some(0)), (2, Some(1))]);
        assert_eq!(plan.blank_regions(), 0);
        assert_eq!(plan.unused_tables, 0);
    }

    #[test]
    fn fewer_tables_leave_trailing_regions_blank() {
        let plan = plan_edits(&[region(0), region(1), region(4)], 1);
        assert_eq!(plan.replaced(), 1);
        assert_eq!(plan.blank_regions(), 2);
        assert_eq!(plan.assignments[0].1, Some(0));
        assert!(plan.assignments[1..].iter().all(|(_, t)| t.is_none()));
    }

    #[test]
    fn surplus_tables_are_counted() {
        let plan = plan_edits(&[region(0)], 3);
        assert_eq!(plan.replaced(), 1);
        assert_eq!(plan.unused_tables, 2);
    }

    #[test]
    fn no_regions_means_no_edits() {
        let plan = plan_edits(&[], 2);
        assert!(plan.assignments.is_empty());
        assert_eq!(plan.unused_tables, 2);
    }

    #[test]
    fn configured_embedder_is_used_as_is() {
        struct Fixed;
        #[async_trait::async_trait]
        impl Embedder for Fixed {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
                Ok(vec![1.0])
            }
            fn name(&self) -> &str {
                "fixed"
            }
        }

        let config = ReplaceConfig::builder().embedder(Arc::new(Fixed)).build().unwrap();
        assert_eq!(resolve_embedder(&config).unwrap().name(), "fixed");
    }

    #[tokio::test]
    async fn failed_mutation_leaves_no_artifacts_behind() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("in.pdf");
        std::fs::write(&pdf, b"%PDF-1.7\n").unwrap();
        let artifacts = dir.path().join("png");
        let config = ReplaceConfig::builder()
            .artifacts_dir(&artifacts)
            .build()
            .unwrap();
        let plan = plan_edits(&[region(0), region(1)], 2);
        let swatch = image::RgbaImage::from_pixel(8, 4, image::Rgba([0, 0, 0, 255]));
        let images = vec![DynamicImage::ImageRgba8(swatch); 2];

        // Writing over the input is rejected after the artifacts were staged.
        let err = apply_plan(&pdf, &pdf, &config, &plan, &images)
            .await
            .unwrap_err();

        assert!(matches!(err, ReplaceError::InvalidConfig(_)), "{err:?}");
        assert!(!artifacts.exists());
    }

    #[tokio::test]
    async fn unreadable_pdf_fails_before_the_embedder_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"%PDF-1.7 not really a document").unwrap();

        // No embedder configured: reaching provider resolution would be an
        // Embedding error.
        let err = inspect(&pdf, &ReplaceConfig::default()).await.unwrap_err();
        assert!(
            matches!(
                err,
                ReplaceError::DocumentRead { .. } | ReplaceError::PdfiumBindingFailed(_)
            ),
            "{err:?}"
        );

        let err = replace_tables_to_file(
            &pdf,
            dir.path().join("missing.json"),
            dir.path().join("o.pdf"),
            &ReplaceConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(
                err,
                ReplaceError::DocumentRead { .. } | ReplaceError::PdfiumBindingFailed(_)
            ),
            "{err:?}"
        );
    }
}

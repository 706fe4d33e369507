//! End-to-end tests for edgequake-tableswap against a real pdfium library.
//!
//! Input PDFs are generated on the fly with pdfium, and a keyword embedder
//! stands in for the embedding provider, so no network access is needed.
//! They are gated behind the `E2E_ENABLED` environment variable because a
//! `libpdfium` must be loadable (see `PDFIUM_LIB_PATH`).
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use edgequake_tableswap::pipeline::extract::extract_layout;
use edgequake_tableswap::pipeline::mutate::fit_within;
use edgequake_tableswap::pipeline::pdfium::bind_pdfium;
use edgequake_tableswap::{
    apply_edits, cover_region, place_image, replace_tables_to_file, Embedder, EmbeddingError,
    PdfiumTableRenderer, Rect, RegionEdit, ReplaceConfig, ReplaceError, ReplacementTable,
    TableRenderer,
};
use image::{DynamicImage, Rgba, RgbaImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set and pdfium can be bound.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if let Err(e) = bind_pdfium() {
            println!("SKIP — pdfium not available: {e}");
            return;
        }
    }};
}

/// Titles mention "Plan Comparison"; everything else is orthogonal.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let lower = text.to_lowercase();
        if lower.contains("plan comparison") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Write a US-letter PDF with one Helvetica line per `(text, top)`, `top`
/// measured from the top of the page.
fn write_pdf(path: &Path, pages: &[&[(&str, f32)]]) {
    let pdfium = bind_pdfium().unwrap();
    let mut document = pdfium.create_new_pdf().unwrap();
    let font = document.fonts_mut().helvetica();

    for lines in pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::new_custom(
                PdfPoints::new(612.0),
                PdfPoints::new(792.0),
            ))
            .unwrap();
        for (text, top) in lines.iter() {
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(792.0 - top),
                    *text,
                    font,
                    PdfPoints::new(12.0),
                )
                .unwrap();
        }
    }
    document.save_to_file(path).unwrap();
}

/// `(object count, image object count, text)` of every page.
fn page_summary(path: &Path) -> Vec<(usize, usize, String)> {
    let pdfium = bind_pdfium().unwrap();
    let document = pdfium.load_pdf_from_file(path, None).unwrap();
    document
        .pages()
        .iter()
        .map(|page| {
            let objects = page.objects();
            let images = objects
                .iter()
                .filter(|o| o.object_type() == PdfPageObjectType::Image)
                .count();
            let text = page.text().map(|t| t.all()).unwrap_or_default();
            (objects.len() as usize, images, text)
        })
        .collect()
}

/// Type, fill colour (RGBA, when readable) and layout-unit bounds of every
/// object on every page.
type ObjectBox = (PdfPageObjectType, Option<(u8, u8, u8, u8)>, Rect);

fn page_objects(path: &Path) -> Vec<Vec<ObjectBox>> {
    let pdfium = bind_pdfium().unwrap();
    let document = pdfium.load_pdf_from_file(path, None).unwrap();
    document
        .pages()
        .iter()
        .map(|page| {
            let height = page.height().value;
            page.objects()
                .iter()
                .map(|o| {
                    let b = o.bounds().unwrap().to_rect();
                    let rect = Rect::from_pdf_bounds(
                        b.left.value,
                        b.bottom.value,
                        b.right.value,
                        b.top.value,
                        height,
                    );
                    let fill = o
                        .fill_color()
                        .ok()
                        .map(|c| (c.red(), c.green(), c.blue(), c.alpha()));
                    (o.object_type(), fill, rect)
                })
                .collect()
        })
        .collect()
}

fn assert_close(actual: Rect, expected: Rect) {
    let close = |a: f32, b: f32| (a - b).abs() < 0.5;
    assert!(
        close(actual.x0, expected.x0)
            && close(actual.y0, expected.y0)
            && close(actual.x1, expected.x1)
            && close(actual.y1, expected.y1),
        "{actual} != {expected}"
    );
}

fn json_tables(dir: &Path, tables: &str) -> PathBuf {
    let path = dir.join("tables.json");
    std::fs::write(&path, tables).unwrap();
    path
}

fn config() -> ReplaceConfig {
    ReplaceConfig::builder()
        .embedder(Arc::new(KeywordEmbedder))
        .build()
        .unwrap()
}

fn swatch() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 20, Rgba([200, 30, 30, 255])))
}

const THREE_BY_TWO: &str = r#"[[["Plan", "Premium"], ["Gold", "$420"], ["Silver", "$310"]]]"#;

// ── Mutator ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cover_adds_one_object_and_leaves_input_untouched() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    write_pdf(&input, &[&[("Hello", 100.0)]]);
    let before = std::fs::read(&input).unwrap();

    cover_region(&input, &output, None, 0, Rect::new(50.0, 80.0, 300.0, 200.0))
        .await
        .expect("cover should succeed");

    assert_eq!(std::fs::read(&input).unwrap(), before, "input must not change");
    let summary = page_summary(&output);
    assert_eq!(summary[0].0, page_summary(&input)[0].0 + 1);
    assert_eq!(summary[0].1, 0);

    let objects = page_objects(&output);
    let (kind, fill, rect) = objects[0].last().copied().unwrap();
    assert_eq!(kind, PdfPageObjectType::Path);
    assert_eq!(fill, Some((255, 255, 255, 255)), "cover must be opaque white");
    assert_close(rect, Rect::new(50.0, 80.0, 300.0, 200.0));
}

#[tokio::test]
async fn test_cover_overhanging_the_page_is_clipped() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    write_pdf(&input, &[&[("Hello", 100.0)]]);

    cover_region(&input, &output, None, 0, Rect::new(72.0, 700.0, 300.0, 1000.0))
        .await
        .unwrap();

    let (_, _, rect) = page_objects(&output)[0].last().copied().unwrap();
    assert_close(rect, Rect::new(72.0, 700.0, 300.0, 792.0));
}

#[tokio::test]
async fn test_place_image_adds_exactly_one_image() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    write_pdf(&input, &[&[("Hello", 100.0)]]);

    let target = Rect::new(72.0, 112.0, 372.0, 412.0);
    place_image(&input, &output, None, 0, target, swatch())
        .await
        .expect("place should succeed");

    assert_eq!(page_summary(&output)[0].1, 1);

    // 40x20 swatch: full width, half height, anchored top-left.
    let (kind, _, rect) = page_objects(&output)[0].last().copied().unwrap();
    assert_eq!(kind, PdfPageObjectType::Image);
    assert_close(rect, fit_within(&target, 40, 20));
    assert_close(rect, Rect::new(72.0, 112.0, 372.0, 262.0));
}

#[tokio::test]
async fn test_region_off_the_page_is_rejected_without_output() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    write_pdf(&input, &[&[("Hello", 100.0)]]);

    let err = cover_region(&input, &output, None, 0, Rect::new(700.0, 900.0, 800.0, 1000.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ReplaceError::RegionOutOfBounds { page: 1, .. }));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_bad_page_index_is_rejected() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    write_pdf(&input, &[&[("Hello", 100.0)]]);

    let edits = vec![RegionEdit::Cover {
        page: 3,
        rect: Rect::new(0.0, 0.0, 10.0, 10.0),
    }];
    let err = apply_edits(&input, &dir.path().join("out.pdf"), None, edits)
        .await
        .unwrap_err();
    assert!(matches!(err, ReplaceError::PageOutOfRange { page: 4, total: 1 }));
}

// ── Extraction & rendering ───────────────────────────────────────────────────

#[tokio::test]
async fn test_extracted_layout_places_titles_top_down() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    write_pdf(&input, &[&[("Medical Plan Comparison", 100.0), ("Footer", 700.0)]]);

    let layout = extract_layout(&input, None).await.unwrap();
    let page = &layout.pages[0];
    let title = page.search("Medical Plan Comparison");
    let footer = page.search("Footer");
    assert_eq!(title.len(), 1);
    assert!(title[0].y1 < footer[0].y0, "layout y must grow downward");
    assert!((title[0].y1 - 100.0).abs() < 5.0, "baseline near 100pt from top");
}

#[test]
fn test_renderer_output_grows_with_columns() {
    e2e_skip_unless_ready!();
    let renderer = PdfiumTableRenderer::default();
    let narrow = ReplacementTable::from_rows(vec![vec!["a".into()], vec!["1".into()]]).unwrap();
    let wide = ReplacementTable::from_rows(vec![
        vec!["a".into(), "b".into(), "c".into()],
        vec!["1".into(), "2".into(), "3".into()],
    ])
    .unwrap();

    let n = renderer.render(0, &narrow).unwrap();
    let w = renderer.render(1, &wide).unwrap();
    assert!(w.width() > n.width());
    assert_eq!(renderer.render(1, &wide).unwrap().as_bytes(), w.as_bytes());
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_two_page_document_replaces_only_the_first_page() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("guide.pdf");
    let output = dir.path().join("guide_out.pdf");
    write_pdf(
        &input,
        &[
            &[("Medical Plan Comparison", 100.0), ("Gold  $420", 500.0)],
            &[("Appendix", 100.0)],
        ],
    );
    let tables = json_tables(dir.path(), THREE_BY_TWO);

    let out = replace_tables_to_file(&input, &tables, &output, &config())
        .await
        .expect("replacement should succeed");

    assert_eq!(out.stats.titles, 1);
    assert_eq!(out.stats.replaced, 1);
    assert_eq!(out.regions[0].page_num, 1);

    let before = page_summary(&input);
    let after = page_summary(&output);
    assert_eq!(after[0].0, before[0].0 + 2, "one cover + one image on page 1");
    assert_eq!(after[0].1, 1);
    assert_eq!(after[1].2, before[1].2, "page 2 text must be unchanged");

    // Cover then image, both inside the region below the title.
    let region = out.regions[0].rect;
    let objects = page_objects(&output);
    let added = &objects[0][objects[0].len() - 2..];
    assert_eq!(added[0].0, PdfPageObjectType::Path);
    assert_close(added[0].2, region);
    assert_eq!(added[1].0, PdfPageObjectType::Image);
    assert!((added[1].2.x0 - region.x0).abs() < 0.5 && (added[1].2.y0 - region.y0).abs() < 0.5);
    assert!(added[1].2.x1 <= region.x1 + 0.5 && added[1].2.y1 <= region.y1 + 0.5);

    let untouched = page_objects(&input);
    assert_eq!(objects[1].len(), untouched[1].len());
    for (after, before) in objects[1].iter().zip(&untouched[1]) {
        assert_eq!(after.0, before.0);
        assert_eq!(after.1, before.1);
        assert_close(after.2, before.2);
    }
}

#[tokio::test]
async fn test_fewer_tables_leave_regions_blank() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("guide.pdf");
    let output = dir.path().join("out.pdf");
    write_pdf(
        &input,
        &[
            &[("Medical Plan Comparison", 100.0)],
            &[("Dental Plan Comparison", 100.0)],
        ],
    );
    let tables = json_tables(dir.path(), THREE_BY_TWO);

    let out = replace_tables_to_file(&input, &tables, &output, &config())
        .await
        .unwrap();

    assert_eq!(out.stats.regions, 2);
    assert_eq!(out.stats.replaced, 1);
    assert_eq!(out.stats.blank_regions, 1);
    assert_eq!(out.regions[1].table_index, None);

    let after = page_summary(&output);
    assert_eq!(after[0].1, 1);
    assert_eq!(after[1].1, 0, "second region is covered but gets no image");
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("guide.pdf");
    write_pdf(&input, &[&[("Medical Plan Comparison", 100.0)]]);
    let tables = json_tables(dir.path(), THREE_BY_TWO);

    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.pdf");
    replace_tables_to_file(&input, &tables, &a, &config()).await.unwrap();
    replace_tables_to_file(&input, &tables, &b, &config()).await.unwrap();

    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}

const RERUN_INPUT: &str = "TABLESWAP_E2E_RERUN_INPUT";
const RERUN_TABLES: &str = "TABLESWAP_E2E_RERUN_TABLES";
const RERUN_OUTPUT: &str = "TABLESWAP_E2E_RERUN_OUTPUT";

/// One replacement driven by the `TABLESWAP_E2E_RERUN_*` variables; does
/// nothing unless they are set. Spawned by the cross-process test below.
#[tokio::test]
async fn rerun_in_child_process() {
    let (Ok(input), Ok(tables), Ok(output)) = (
        std::env::var(RERUN_INPUT),
        std::env::var(RERUN_TABLES),
        std::env::var(RERUN_OUTPUT),
    ) else {
        return;
    };
    replace_tables_to_file(input, tables, output, &config())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rerun_in_another_process_is_byte_identical() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("guide.pdf");
    write_pdf(&input, &[&[("Medical Plan Comparison", 100.0)]]);
    let tables = json_tables(dir.path(), THREE_BY_TWO);

    let here = dir.path().join("here.pdf");
    replace_tables_to_file(&input, &tables, &here, &config()).await.unwrap();

    let there = dir.path().join("there.pdf");
    let status = std::process::Command::new(std::env::current_exe().unwrap())
        .args(["rerun_in_child_process", "--exact", "--test-threads=1"])
        .env(RERUN_INPUT, &input)
        .env(RERUN_TABLES, &tables)
        .env(RERUN_OUTPUT, &there)
        .status()
        .unwrap();
    assert!(status.success());

    assert_eq!(std::fs::read(&here).unwrap(), std::fs::read(&there).unwrap());
}

#[tokio::test]
async fn test_artifacts_are_written_per_placed_table() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("guide.pdf");
    write_pdf(&input, &[&[("x", 50.0)], &[("Medical Plan Comparison", 100.0)]]);
    let tables = json_tables(dir.path(), THREE_BY_TWO);
    let artifacts = dir.path().join("png");

    let config = ReplaceConfig::builder()
        .embedder(Arc::new(KeywordEmbedder))
        .artifacts_dir(&artifacts)
        .build()
        .unwrap();
    let out = replace_tables_to_file(&input, &tables, dir.path().join("o.pdf"), &config)
        .await
        .unwrap();

    let expected = artifacts.join("table_1_page_2.png");
    assert_eq!(out.regions[0].artifact.as_deref(), Some(expected.as_path()));
    assert!(expected.exists());
}

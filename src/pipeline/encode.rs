//! Image encoding: `DynamicImage` → PNG bytes, and artifact files on disk.
//!
//! PNG keeps rendered table text crisp; JPEG artefacts around thin glyph
//! strokes are very visible once the image is scaled into a page region.

use crate::error::ReplaceError;
use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// File name of the `index`-th (0-based) replacement placed on `page` (0-based).
pub fn artifact_name(index: usize, page: usize) -> String {
    format!("table_{}_page_{}.png", index + 1, page + 1)
}

/// Write a rendered replacement table into `dir`, creating it if needed.
pub fn write_artifact(
    dir: &Path,
    index: usize,
    page: usize,
    img: &DynamicImage,
) -> Result<PathBuf, ReplaceError> {
    let path = dir.join(artifact_name(index, page));
    let write_failed = |source: std::io::Error| ReplaceError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_failed)?;
    let bytes = encode_png(img)
        .map_err(|e| write_failed(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    std::fs::write(&path, bytes).map_err(write_failed)?;
    Ok(path)
}

/// Artifacts written during one run. Unless [`ArtifactStage::commit`] is
/// called, dropping the stage deletes every file it wrote, plus the
/// directory when the stage created it.
#[derive(Debug)]
pub struct ArtifactStage {
    dir: PathBuf,
    created_dir: bool,
    written: Vec<PathBuf>,
    committed: bool,
}

impl ArtifactStage {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            created_dir: !dir.exists(),
            written: Vec::new(),
            committed: false,
        }
    }

    /// Write one artifact via [`write_artifact`] and remember it.
    pub fn write(
        &mut self,
        index: usize,
        page: usize,
        img: &DynamicImage,
    ) -> Result<PathBuf, ReplaceError> {
        let path = write_artifact(&self.dir, index, page, img)?;
        self.written.push(path.clone());
        Ok(path)
    }

    /// Keep the written artifacts.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ArtifactStage {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in &self.written {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Could not remove artifact {}: {}", path.display(), e);
            }
        }
        if self.created_dir {
            // Only succeeds when empty.
            let _ = std::fs::remove_dir(&self.dir);
        }
    }
}

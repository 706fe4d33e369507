//! Input resolution: validate a local PDF path, or spill in-memory bytes to
//! a temp file.
//!
//! pdfium opens documents by path, so PDFs handed over as bytes are written
//! into a `TempDir` that lives as long as the [`ResolvedInput`]; dropping it
//! removes the file on every exit path. The PDF magic bytes (`%PDF`) are
//! checked up front so callers get a meaningful error rather than a pdfium
//! parse failure.

use crate::error::ReplaceError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// The resolved input: either a local path or a spilled temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input arrived as bytes; the `TempDir` keeps the file alive.
    Spilled { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Spilled { path, .. } => path,
        }
    }
}

/// Validate a local file: it must exist, be readable and start with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, ReplaceError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(ReplaceError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ReplaceError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ReplaceError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ReplaceError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Write `bytes` to a fresh temp directory as `name` and validate them.
pub fn resolve_bytes(bytes: &[u8], name: &str) -> Result<ResolvedInput, ReplaceError> {
    let temp_dir = TempDir::new().map_err(|e| ReplaceError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(name);

    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(ReplaceError::NotAPdf { path, magic });
    }

    std::fs::write(&path, bytes)
        .map_err(|e| ReplaceError::Internal(format!("Failed to write temp file: {}", e)))?;
    debug!("Spilled {} bytes to {}", bytes.len(), path.display());

    Ok(ResolvedInput::Spilled {
        path,
        _temp_dir: temp_dir,
    })
}

/// Default output path: `<stem>_tables_replaced.pdf` beside the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{}_tables_replaced.pdf", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_local(Path::new("/nonexistent/plan.pdf")).unwrap_err();
        assert!(matches!(err, ReplaceError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_is_rejected_by_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"PK\x03\x04rest").unwrap();
        match resolve_local(&path).unwrap_err() {
            ReplaceError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bytes_are_spilled_and_cleaned_up() {
        let resolved = resolve_bytes(b"%PDF-1.7\n", "upload.pdf").unwrap();
        let path = resolved.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "upload.pdf");
        drop(resolved);
        assert!(!path.exists());
    }

    #[test]
    fn spilled_bytes_must_be_a_pdf() {
        assert!(matches!(
            resolve_bytes(b"<html>", "x.pdf").unwrap_err(),
            ReplaceError::NotAPdf { .. }
        ));
    }

    #[test]
    fn default_output_sits_beside_the_input() {
        assert_eq!(
            default_output_path(Path::new("/docs/guide.pdf")),
            PathBuf::from("/docs/guide_tables_replaced.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("guide.pdf")),
            PathBuf::from("guide_tables_replaced.pdf")
        );
    }
}

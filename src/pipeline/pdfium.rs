//! Binding to the PDFium shared library.
//!
//! `pdfium-render` needs a `libpdfium` at runtime. Discovery order:
//!
//! 1. `PDFIUM_LIB_PATH` — explicit path to the library file (or to the
//!    directory holding it)
//! 2. next to the running executable
//! 3. the current working directory
//! 4. the system library search path
//!
//! Every pipeline stage that touches a document binds its own [`Pdfium`]
//! inside `spawn_blocking`; the OS caches `dlopen`, so repeat binds are cheap.

use crate::error::ReplaceError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bind to a PDFium library, trying each discovery location in turn.
pub fn bind_pdfium() -> Result<Pdfium, ReplaceError> {
    let mut attempts: Vec<String> = Vec::new();

    for candidate in candidate_paths() {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound PDFium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound PDFium from the system library path");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            attempts.push(format!("system library: {e}"));
            Err(ReplaceError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

/// Library paths to try before falling back to the system search path.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(explicit) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(explicit);
        if p.is_dir() {
            paths.push(platform_library_in(&p));
        } else {
            paths.push(p);
        }
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(platform_library_in(&exe_dir));
    }

    paths.push(platform_library_in(Path::new("./")));

    paths.into_iter().filter(|p| p.exists()).collect()
}

fn platform_library_in(dir: &Path) -> PathBuf {
    Pdfium::pdfium_platform_library_name_at_path(dir)
}

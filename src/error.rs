//! Error types for the edgequake-tableswap library.
//!
//! A run can fail in two ways:
//!
//! * [`ReplaceError`]: **Fatal**, the run cannot produce an output document
//!   (unreadable input PDF, unwritable output, region outside the page).
//!   Returned as `Err(ReplaceError)` from the top-level `replace*` functions,
//!   and no output file is left behind when it is.
//!
//! * [`EmbeddingError`]: **Recoverable**, a single text block could not be
//!   embedded (empty after normalisation, transient provider failure). The
//!   title detector logs it, records the block in
//!   [`crate::pipeline::detect::Detection::skipped`] and keeps scanning, so
//!   one bad block degrades detection instead of aborting it.
//!
//! Soft outcomes that are not errors at all (titles that match nowhere,
//! regions left blank) are counted in [`crate::output::ReplaceStats`].

use crate::geometry::Rect;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-tableswap library.
#[derive(Debug, Error)]
pub enum ReplaceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF could not be opened or parsed.
    #[error("Cannot read PDF '{path}': {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    DocumentRead { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// An edit targeted a page the document does not have.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// An edit rectangle does not intersect the page at all.
    #[error("Region {rect} does not intersect page {page}")]
    RegionOutOfBounds { page: usize, rect: Rect },

    // ── Table source errors ───────────────────────────────────────────────
    /// The replacement table source could not be read or parsed.
    #[error("Cannot read replacement tables from '{path}': {detail}")]
    TableSourceRead { path: PathBuf, detail: String },

    // ── Embedding errors ──────────────────────────────────────────────────
    /// No embedding model is available, or the concept anchor itself could
    /// not be embedded. Without an anchor no block can be classified.
    #[error("Embedding model unavailable: {0}")]
    Embedding(#[from] EmbeddingError),

    // ── Rendering errors ──────────────────────────────────────────────────
    /// A replacement table could not be rendered to an image.
    #[error("Failed to render replacement table {index}: {detail}")]
    Render { index: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, copy, or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Download a build for your platform from\n\
  https://github.com/bblanchon/pdfium-binaries/releases\n\
and either place the library next to the executable or set\n\
  PDFIUM_LIB_PATH=/path/to/libpdfium\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recoverable failure to embed one piece of text.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum EmbeddingError {
    /// The text was empty after whitespace normalisation.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// No embedding provider is configured or reachable.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// The provider returned an error for this input.
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// The provider returned a vector with no magnitude.
    #[error("embedding has zero magnitude")]
    ZeroVector,

    /// Two vectors of different lengths were compared.
    #[error("embedding dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

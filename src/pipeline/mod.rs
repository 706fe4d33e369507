//! Pipeline stages for PDF table replacement.
//!
//! Each submodule implements exactly one step. The detection core
//! ([`detect`], [`locate`]) works on owned [`layout::DocumentLayout`]
//! snapshots and never touches pdfium, so it is testable with hand-built
//! layouts and a mock [`classify::Embedder`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ detect ──▶ locate ──┐
//! (path)    (pdfium)   (embedder)  (search)  ├──▶ mutate
//! tables ──▶ render ──▶ encode ─────────────┘   (pdfium)
//! (docx/md/json) (pdfium)  (PNG artifacts)
//! ```
//!
//! 1. [`input`]    — validate the local path, or spill bytes to a temp file
//! 2. [`extract`]  — read every glyph with its bounds; runs in `spawn_blocking`
//! 3. [`detect`]   — score each text block against the concept anchor
//! 4. [`locate`]   — literal title search and the region below it
//! 5. [`tables`]   — load the replacement tables
//! 6. [`render`]   — rasterise each table
//! 7. [`mutate`]   — cover regions, place images, publish atomically

pub mod classify;
pub mod detect;
pub mod encode;
pub mod extract;
pub mod input;
pub mod layout;
pub mod locate;
pub mod mutate;
pub mod pdfium;
pub mod render;
pub mod tables;

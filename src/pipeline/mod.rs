//! Pipeline stages for photo-to-spreadsheet recognition.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ normalize ──▶ export
//! (path/URL) (base64)  (VLM)   (rows)        (xlsx)
//! ```
//!
//! 1. [`input`]     — read the photo from disk or URL and check it is JPEG/PNG
//! 2. [`encode`]    — base64-wrap the raw bytes for the multimodal request body
//! 3. [`llm`]       — one vision-model call; the only stage with network I/O
//! 4. [`normalize`] — classify the reply's shape and pull out the order rows
//! 5. [`export`]    — write the (possibly edited) rows to a one-sheet workbook

pub mod encode;
pub mod export;
pub mod input;
pub mod llm;
pub mod normalize;

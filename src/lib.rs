//! # order2xlsx
//!
//! Turn a photo of a factory order list into an editable table and an
//! Excel workbook, using a Vision Language Model (VLM).
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo (JPEG/PNG)
//!  │
//!  ├─ 1. Input      read local file or download from URL, check format
//!  ├─ 2. Encode     raw bytes → base64 ImageData
//!  ├─ 3. VLM        one call with the extraction prompt, JSON mode
//!  ├─ 4. Normalize  list | {"items"} | {"data"} | {first key} → rows
//!  ├─ 5. Edit       session owns the rows; cells can be changed by hand
//!  └─ 6. Export     one-sheet .xlsx, header row = union of field names
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use order2xlsx::{recognize, write_xlsx, RecognitionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = RecognitionConfig::default();
//!     let mut result = recognize("whiteboard.jpg", &config).await?;
//!     result.set_cell(0, "数量", 600)?;
//!     write_xlsx(&result, "factory_order_list.xlsx", &config.sheet_name).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Demo Mode
//!
//! [`RecognitionConfigBuilder::demo`] swaps the model for a fixed sample
//! reply, so the whole flow runs without an API key or network access.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `order2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! order2xlsx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod order;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod recognize;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    Credential, RecognitionConfig, RecognitionConfigBuilder, DEFAULT_EXPORT_FILENAME,
    DEFAULT_MODEL, DEFAULT_SHEET_NAME,
};
pub use error::Order2XlsxError;
pub use order::{ExtractionResult, OrderItem, EXPECTED_FIELDS};
pub use pipeline::encode::{encode_image, EncodedImage};
pub use pipeline::export::{export_xlsx, write_xlsx};
pub use pipeline::llm::OrderReader;
pub use pipeline::normalize::{classify, normalize_response, ResponseShape, RowKey};
pub use progress::{NoopProgressCallback, ProgressCallback, RecognitionProgressCallback};
pub use recognize::{recognize, recognize_bytes, recognize_sync, recognize_to_file};
pub use session::OrderSession;

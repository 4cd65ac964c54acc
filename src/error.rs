//! Error types for the order2xlsx library.
//!
//! One recognition action either yields a complete
//! [`crate::order::ExtractionResult`] or fails with an [`Order2XlsxError`].
//! There is no partial result: a single bad row aborts the whole action.
//!
//! The three kinds a user actually sees during recognition are
//! [`Order2XlsxError::CredentialMissing`], [`Order2XlsxError::ServiceError`]
//! and [`Order2XlsxError::MalformedResponse`]. The rest cover input
//! resolution, editing, and export.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the order2xlsx library.
#[derive(Debug, Error)]
pub enum Order2XlsxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The bytes are neither JPEG nor PNG.
    #[error("'{source_name}' is not a JPEG or PNG image (first bytes: {magic:02x?})")]
    UnsupportedImage { source_name: String, magic: Vec<u8> },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Recognition errors ────────────────────────────────────────────────
    /// No usable API key; recognition is blocked before any network call.
    #[error("No API key configured for provider '{provider}'.\n{hint}")]
    CredentialMissing { provider: String, hint: String },

    /// The provider could not be constructed from the given name / model.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call failed. `message` is the provider's own error text.
    #[error("Vision model call failed: {message}")]
    ServiceError { message: String },

    /// The model reply could not be turned into order rows.
    #[error("Recognition result could not be parsed: {reason}\nPlease try again.")]
    MalformedResponse { reason: String },

    // ── Editing errors ────────────────────────────────────────────────────
    /// A row index (0-based) past the end of the table.
    #[error("Row {row} is out of range (table has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },

    /// Export requested before any successful recognition.
    #[error("Nothing to export: no order has been recognised yet")]
    NothingToExport,

    // ── Output errors ─────────────────────────────────────────────────────
    /// rust_xlsxwriter refused the workbook.
    #[error("Failed to build spreadsheet: {0}")]
    ExportFailed(String),

    /// Could not create or write the output file.
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

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Order2XlsxError {
    /// Shorthand for a [`Order2XlsxError::MalformedResponse`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Order2XlsxError::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Whether the user should be invited to run the same action again.
    ///
    /// Service failures and unparseable replies are often one-offs; a
    /// missing key or a bad input file will fail identically every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Order2XlsxError::ServiceError { .. } | Order2XlsxError::MalformedResponse { .. }
        )
    }
}

impl From<rust_xlsxwriter::XlsxError> for Order2XlsxError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Order2XlsxError::ExportFailed(e.to_string())
    }
}

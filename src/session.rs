//! Per-session state: the one order table a user is currently working on.
//!
//! An [`OrderSession`] is created empty, filled by the first successful
//! recognition, edited in place, and replaced wholesale by the next
//! successful recognition. A failed recognition leaves whatever was there
//! untouched, so a bad photo never costs the user a table they already
//! corrected by hand.
//!
//! Every mutating method takes `&mut self`, so a second recognition cannot
//! start while one is in flight on the same session.

use crate::config::RecognitionConfig;
use crate::error::Order2XlsxError;
use crate::order::ExtractionResult;
use crate::pipeline::{export, normalize};
use crate::recognize::recognize_bytes;
use tracing::{debug, info, warn};

/// Owns at most one [`ExtractionResult`].
#[derive(Debug, Default)]
pub struct OrderSession {
    result: Option<ExtractionResult>,
    recognitions: u32,
}

impl OrderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session from rows loaded elsewhere (e.g. an edited JSON dump).
    pub fn with_result(result: ExtractionResult) -> Self {
        Self {
            result: Some(result),
            recognitions: 0,
        }
    }

    pub fn result(&self) -> Option<&ExtractionResult> {
        self.result.as_ref()
    }

    /// Mutable access for grid edits.
    pub fn result_mut(&mut self) -> Option<&mut ExtractionResult> {
        self.result.as_mut()
    }

    /// Number of successful recognitions in this session.
    pub fn recognitions(&self) -> u32 {
        self.recognitions
    }

    /// Recognise an image and, on success, make it the session's table.
    pub async fn recognize(
        &mut self,
        image: &[u8],
        config: &RecognitionConfig,
    ) -> Result<&ExtractionResult, Order2XlsxError> {
        let outcome = recognize_bytes(image, config).await;
        self.store(outcome)
    }

    /// Normalize a raw model reply and, on success, make it the session's table.
    pub fn apply_response(&mut self, raw: &str) -> Result<&ExtractionResult, Order2XlsxError> {
        let outcome = normalize::normalize_response(raw);
        self.store(outcome)
    }

    fn store(
        &mut self,
        outcome: Result<ExtractionResult, Order2XlsxError>,
    ) -> Result<&ExtractionResult, Order2XlsxError> {
        match outcome {
            Ok(result) => {
                if self.result.is_some() {
                    debug!("Replacing previous result");
                }
                self.recognitions += 1;
                info!("Session now holds {} rows", result.len());
                Ok(&*self.result.insert(result))
            }
            Err(e) => {
                if let Some(prev) = &self.result {
                    warn!("Recognition failed; keeping previous {} rows", prev.len());
                }
                Err(e)
            }
        }
    }

    /// Export the current table as `.xlsx` bytes.
    pub fn export(&self, sheet_name: &str) -> Result<Vec<u8>, Order2XlsxError> {
        let result = self.result.as_ref().ok_or(Order2XlsxError::NothingToExport)?;
        export::export_xlsx(result, sheet_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderItem;
    use serde_json::json;

    const GOOD: &str = r#"[{"产品名称":"螺栓","数量":500}]"#;
    const OTHER: &str = r#"{"items":[{"产品名称":"螺母"},{"产品名称":"垫片"}]}"#;

    #[test]
    fn new_session_is_empty() {
        let session = OrderSession::new();
        assert!(session.result().is_none());
        assert!(matches!(
            session.export("报货清单"),
            Err(Order2XlsxError::NothingToExport)
        ));
    }

    #[test]
    fn success_replaces_previous_result() {
        let mut session = OrderSession::new();
        session.apply_response(GOOD).unwrap();
        session.apply_response(OTHER).unwrap();
        assert_eq!(session.result().unwrap().len(), 2);
        assert_eq!(session.recognitions(), 2);
    }

    #[test]
    fn failure_preserves_previous_result() {
        let mut session = OrderSession::new();
        session.apply_response(GOOD).unwrap();
        let before = session.result().cloned();

        let err = session.apply_response("not json").unwrap_err();
        assert!(matches!(err, Order2XlsxError::MalformedResponse { .. }));
        assert_eq!(session.result().cloned(), before);
        assert_eq!(session.recognitions(), 1);
    }

    #[test]
    fn failure_preserves_user_edits() {
        let mut session = OrderSession::new();
        session.apply_response(GOOD).unwrap();
        session
            .result_mut()
            .unwrap()
            .set_cell(0, "数量", 600)
            .unwrap();

        assert!(session.apply_response(r#"{"a":1}"#).is_err());
        assert_eq!(
            session.result().unwrap().items()[0].quantity(),
            Some(&json!(600))
        );
    }

    #[test]
    fn failure_on_empty_session_stays_empty() {
        let mut session = OrderSession::new();
        assert!(session.apply_response("[1]").is_err());
        assert!(session.result().is_none());
    }

    #[test]
    fn recognize_with_canned_reply_fills_session() {
        let config = RecognitionConfig::builder()
            .canned_response(GOOD)
            .build()
            .unwrap();
        let mut session = OrderSession::new();
        let rows = tokio_test::block_on(session.recognize(b"\xff\xd8\xff\xe0", &config))
            .unwrap()
            .len();
        assert_eq!(rows, 1);
    }

    #[test]
    fn with_result_exports() {
        let session =
            OrderSession::with_result(ExtractionResult::new(vec![OrderItem::new().with("a", 1)]));
        let bytes = session.export("报货清单").unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}

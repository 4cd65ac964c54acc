//! Progress-callback trait for recognition events.
//!
//! The model call is the only slow step (several seconds for a dense
//! order sheet), so a front end needs to know when to show and hide its
//! busy indicator. Inject an [`Arc<dyn RecognitionProgressCallback>`] via
//! [`crate::config::RecognitionConfigBuilder::progress_callback`].
//!
//! # Example
//!
//! ```rust
//! use order2xlsx::{RecognitionConfig, RecognitionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Spinner;
//!
//! impl RecognitionProgressCallback for Spinner {
//!     fn on_request_start(&self, model: &str) {
//!         eprintln!("asking {model}…");
//!     }
//! }
//!
//! let config = RecognitionConfig::builder()
//!     .progress_callback(Arc::new(Spinner))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::recognize::recognize_bytes`] around each stage.
///
/// All methods default to no-ops. Exactly one of `on_recognition_complete`
/// or `on_recognition_error` ends every action that got past
/// `on_recognition_start`.
pub trait RecognitionProgressCallback: Send + Sync {
    /// The image has been read and is about to be encoded.
    fn on_recognition_start(&self, image_bytes: usize) {
        let _ = image_bytes;
    }

    /// The request is about to go out. `model` is `"demo"` for canned replies.
    fn on_request_start(&self, model: &str) {
        let _ = model;
    }

    /// The model replied with `response_len` bytes of text.
    fn on_request_complete(&self, response_len: usize) {
        let _ = response_len;
    }

    /// The reply was normalized into `rows` order items.
    fn on_recognition_complete(&self, rows: usize) {
        let _ = rows;
    }

    /// The action failed; `error` is the user-facing message.
    fn on_recognition_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RecognitionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RecognitionConfig`].
pub type ProgressCallback = Arc<dyn RecognitionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl RecognitionProgressCallback for Recorder {
        fn on_request_start(&self, model: &str) {
            self.events.lock().unwrap().push(format!("start:{model}"));
        }

        fn on_recognition_error(&self, error: &str) {
            self.events.lock().unwrap().push(format!("error:{error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_recognition_start(1024);
        cb.on_request_start("gpt-4o");
        cb.on_request_complete(80);
        cb.on_recognition_complete(3);
        cb.on_recognition_error("boom");
    }

    #[test]
    fn overridden_hooks_receive_events() {
        let rec = Recorder::default();
        rec.on_request_start("gpt-4o");
        rec.on_request_complete(10);
        rec.on_recognition_error("bad json");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start:gpt-4o".to_string(), "error:bad json".to_string()]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_recognition_start(1);
        cb.on_recognition_complete(0);
    }
}

//! Recognition entry points: image in, [`ExtractionResult`] out.
//!
//! One call, one image, one model request. Stages run strictly in order
//! (credential gate → encode → request → normalize) and the first failure
//! ends the action. For session semantics (keeping the last good table
//! across failures) wrap these in [`crate::session::OrderSession`].

use crate::config::{Credential, RecognitionConfig};
use crate::error::Order2XlsxError;
use crate::order::ExtractionResult;
use crate::pipeline::{encode, input, llm::OrderReader, llm, normalize};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Recognise an order photo given as a local path or HTTP/HTTPS URL.
///
/// # Errors
/// Input errors (missing file, not JPEG/PNG, download failure) plus
/// everything [`recognize_bytes`] returns.
pub async fn recognize(
    input_str: impl AsRef<str>,
    config: &RecognitionConfig,
) -> Result<ExtractionResult, Order2XlsxError> {
    let input_str = input_str.as_ref();
    info!("Starting recognition: {}", input_str);

    let upload = input::resolve_input(input_str, config.download_timeout_secs).await?;
    recognize_bytes(&upload.bytes, config).await
}

/// Recognise an order photo already in memory.
///
/// # Errors
/// - [`Order2XlsxError::UnsupportedImage`] — bytes are not JPEG/PNG
/// - [`Order2XlsxError::CredentialMissing`] — no usable API key; no request is sent
/// - [`Order2XlsxError::ServiceError`] — the model call failed
/// - [`Order2XlsxError::MalformedResponse`] — the reply is not a list of rows
pub async fn recognize_bytes(
    image: &[u8],
    config: &RecognitionConfig,
) -> Result<ExtractionResult, Order2XlsxError> {
    let start = Instant::now();
    let cb = config.progress_callback.as_ref();

    input::sniff_format("upload", image)?;
    if let Some(cb) = cb {
        cb.on_recognition_start(image.len());
    }

    let outcome = run_stages(image, config).await;

    match &outcome {
        Ok(result) => {
            info!(
                "Recognition complete: {} rows in {}ms",
                result.len(),
                start.elapsed().as_millis()
            );
            if let Some(cb) = cb {
                cb.on_recognition_complete(result.len());
            }
        }
        Err(e) => {
            if let Some(cb) = cb {
                cb.on_recognition_error(&e.to_string());
            }
        }
    }
    outcome
}

async fn run_stages(
    image: &[u8],
    config: &RecognitionConfig,
) -> Result<ExtractionResult, Order2XlsxError> {
    // ── Step 1: Resolve reader (credential gate) ─────────────────────────
    let reader = resolve_reader(config)?;
    debug!("Using reader {:?}", reader);

    // ── Step 2: Encode image ─────────────────────────────────────────────
    let encoded = encode::encode_image(image);

    // ── Step 3: Ask the model ────────────────────────────────────────────
    if let Some(cb) = config.progress_callback.as_ref() {
        let model = match &reader {
            OrderReader::Canned(_) => "demo",
            OrderReader::Vision(p) => p.model(),
        };
        cb.on_request_start(model);
    }
    let raw = llm::request_extraction(&reader, &encoded, config).await?;
    if let Some(cb) = config.progress_callback.as_ref() {
        cb.on_request_complete(raw.len());
    }

    // ── Step 4: Normalize ────────────────────────────────────────────────
    normalize::normalize_response(&raw)
}

/// Synchronous wrapper around [`recognize`].
///
/// Creates a temporary tokio runtime internally.
pub fn recognize_sync(
    input_str: impl AsRef<str>,
    config: &RecognitionConfig,
) -> Result<ExtractionResult, Order2XlsxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Order2XlsxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(recognize(input_str, config))
}

/// Recognise and write the workbook to `output_path` in one go.
pub async fn recognize_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &RecognitionConfig,
) -> Result<ExtractionResult, Order2XlsxError> {
    let result = recognize(input_str, config).await?;
    crate::pipeline::export::write_xlsx(&result, output_path, &config.sheet_name).await?;
    Ok(result)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Order2XlsxError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Order2XlsxError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Fail with `CredentialMissing` unless `provider` has a usable key.
fn require_credential(provider: &str, cred: &Credential) -> Result<(), Order2XlsxError> {
    if cred.is_usable() {
        return Ok(());
    }
    warn!("No usable API key for provider '{}': {:?}", provider, cred);
    Err(Order2XlsxError::CredentialMissing {
        provider: provider.to_string(),
        hint: cred.hint().unwrap_or_default(),
    })
}

/// Resolve where the reply comes from, most-specific first.
///
/// 1. **Canned reply** (`config.canned_response`) — demo mode; no key, no network.
/// 2. **Pre-built provider** (`config.provider`) — the caller owns its setup
///    and credentials.
/// 3. **Named provider** (`config.provider_name`) — key checked for that
///    provider, then built through [`ProviderFactory::create_llm_provider`].
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **Auto-detection** — the first of OpenAI, Anthropic, Gemini with a
///    usable key (see [`Credential::detect`]).
///
/// Steps 3–5 only ever build the provider whose key passed the check, so a
/// missing or placeholder key is reported as
/// [`Order2XlsxError::CredentialMissing`] before any request.
pub(crate) fn resolve_reader(config: &RecognitionConfig) -> Result<OrderReader, Order2XlsxError> {
    // 1) Demo / injected reply
    if let Some(ref reply) = config.canned_response {
        return Ok(OrderReader::Canned(reply.clone()));
    }

    // 2) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(OrderReader::Vision(Arc::clone(provider)));
    }

    // 3) Provider name + model
    if let Some(ref name) = config.provider_name {
        require_credential(name, &Credential::for_provider(name))?;
        return create_vision_provider(name, config.model_for(name)).map(OrderReader::Vision);
    }

    // 4) EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL when both set
    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            require_credential(&prov, &Credential::for_provider(&prov))?;
            return create_vision_provider(&prov, &env_model).map(OrderReader::Vision);
        }
    }

    // 5) Auto-detect
    let (provider, model) = auto_target(config, |var| std::env::var(var).ok())?;
    create_vision_provider(provider, &model).map(OrderReader::Vision)
}

/// Provider and model for auto-detection, read through `lookup`.
fn auto_target(
    config: &RecognitionConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(&'static str, String), Order2XlsxError> {
    let (provider, cred) = Credential::detect_with(lookup);
    require_credential(provider, &cred)?;
    debug!("Auto-detected provider '{}'", provider);
    Ok((provider, config.model_for(provider).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecognitionProgressCallback;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl RecognitionProgressCallback for Events {
        fn on_recognition_start(&self, image_bytes: usize) {
            self.0.lock().unwrap().push(format!("start:{image_bytes}"));
        }
        fn on_request_start(&self, model: &str) {
            self.0.lock().unwrap().push(format!("request:{model}"));
        }
        fn on_recognition_complete(&self, rows: usize) {
            self.0.lock().unwrap().push(format!("done:{rows}"));
        }
        fn on_recognition_error(&self, _error: &str) {
            self.0.lock().unwrap().push("error".into());
        }
    }

    const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF";

    #[tokio::test]
    async fn canned_reply_skips_credential_check() {
        let config = RecognitionConfig::builder()
            .canned_response(r#"{"data":[{"产品名称":"螺母"}]}"#)
            .build()
            .unwrap();
        let result = recognize_bytes(JPEG, &config).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn demo_mode_yields_sample_order() {
        let config = RecognitionConfig::builder().demo().build().unwrap();
        let result = recognize_bytes(JPEG, &config).await.unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result.columns(), crate::order::EXPECTED_FIELDS.to_vec());
    }

    #[tokio::test]
    async fn non_image_bytes_are_rejected_before_any_request() {
        let events = Arc::new(Events::default());
        let config = RecognitionConfig::builder()
            .demo()
            .progress_callback(events.clone())
            .build()
            .unwrap();
        let err = recognize_bytes(b"%PDF-1.4", &config).await.unwrap_err();
        assert!(matches!(err, Order2XlsxError::UnsupportedImage { .. }));
        assert!(events.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn callbacks_bracket_a_successful_action() {
        let events = Arc::new(Events::default());
        let config = RecognitionConfig::builder()
            .canned_response("[]")
            .progress_callback(events.clone())
            .build()
            .unwrap();
        recognize_bytes(JPEG, &config).await.unwrap();
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![format!("start:{}", JPEG.len()), "request:demo".into(), "done:0".into()]
        );
    }

    #[tokio::test]
    async fn malformed_reply_fires_error_callback() {
        let events = Arc::new(Events::default());
        let config = RecognitionConfig::builder()
            .canned_response("sorry, I can't read this")
            .progress_callback(events.clone())
            .build()
            .unwrap();
        let err = recognize_bytes(JPEG, &config).await.unwrap_err();
        assert!(matches!(err, Order2XlsxError::MalformedResponse { .. }));
        assert_eq!(events.0.lock().unwrap().last().map(String::as_str), Some("error"));
    }

    #[test]
    fn missing_credential_is_reported_for_named_provider() {
        let cred = Credential::Missing { var: "OPENAI_API_KEY" };
        let err = require_credential("openai", &cred).unwrap_err();
        match err {
            Order2XlsxError::CredentialMissing { provider, hint } => {
                assert_eq!(provider, "openai");
                assert!(hint.contains("OPENAI_API_KEY"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn usable_credential_passes() {
        assert!(require_credential("ollama", &Credential::NotRequired).is_ok());
        assert!(require_credential("openai", &Credential::Present { var: "OPENAI_API_KEY" }).is_ok());
    }

    fn fake_env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |var| {
            pairs
                .iter()
                .find(|(k, _)| *k == var)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn auto_target_skips_placeholder_key() {
        let env = fake_env(&[("ANTHROPIC_API_KEY", "changeme"), ("GEMINI_API_KEY", "g-real")]);
        let (provider, model) = auto_target(&RecognitionConfig::default(), env).unwrap();
        assert_eq!(provider, "gemini");
        assert_eq!(model, "gemini-2.0-flash");
    }

    #[test]
    fn auto_target_keeps_configured_model() {
        let config = RecognitionConfig::builder().model("gemini-2.5-pro").build().unwrap();
        let (provider, model) = auto_target(&config, fake_env(&[("GEMINI_API_KEY", "g-real")])).unwrap();
        assert_eq!(provider, "gemini");
        assert_eq!(model, "gemini-2.5-pro");
    }

    #[test]
    fn auto_target_with_only_placeholders_is_credential_missing() {
        let env = fake_env(&[
            ("OPENAI_API_KEY", "sk-xxxxxx"),
            ("ANTHROPIC_API_KEY", "changeme"),
        ]);
        let err = auto_target(&RecognitionConfig::default(), env).unwrap_err();
        assert!(matches!(err, Order2XlsxError::CredentialMissing { .. }));
    }

    #[tokio::test]
    async fn missing_key_blocks_before_request() {
        std::env::remove_var("MISTRAL_API_KEY");
        let events = Arc::new(Events::default());
        let config = RecognitionConfig::builder()
            .provider_name("mistral")
            .progress_callback(events.clone())
            .build()
            .unwrap();

        let err = recognize_bytes(JPEG, &config).await.unwrap_err();
        match err {
            Order2XlsxError::CredentialMissing { provider, hint } => {
                assert_eq!(provider, "mistral");
                assert!(hint.contains("MISTRAL_API_KEY"), "got: {hint}");
            }
            other => panic!("unexpected error: {other}"),
        }

        let events = events.0.lock().unwrap();
        assert!(!events.iter().any(|e| e.starts_with("request:")), "{events:?}");
        assert_eq!(events.last().map(String::as_str), Some("error"));
    }
}

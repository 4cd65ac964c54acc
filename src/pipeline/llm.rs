//! Vision-model call: one request, raw reply text out.
//!
//! No retry and no JSON checks here: a failed call surfaces immediately and
//! [`crate::pipeline::normalize`] owns everything about the reply's shape.

use crate::config::RecognitionConfig;
use crate::error::Order2XlsxError;
use crate::pipeline::encode::EncodedImage;
use crate::prompts::DEFAULT_EXTRACTION_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Where a recognition reply comes from.
#[derive(Clone)]
pub enum OrderReader {
    /// A real vision model.
    Vision(Arc<dyn LLMProvider>),
    /// A fixed reply (demo mode, tests). Never touches the network.
    Canned(String),
}

impl fmt::Debug for OrderReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderReader::Vision(p) => write!(f, "Vision({})", p.name()),
            OrderReader::Canned(s) => write!(f, "Canned({} bytes)", s.len()),
        }
    }
}

/// Send the image and extraction prompt; return the model's raw text.
///
/// ## Message Layout
///
/// A single user turn carrying the prompt text and the image, the shape
/// every OpenAI-compatible vision endpoint accepts. Options ask for JSON
/// mode, a low temperature and a 4 096-token ceiling (see [`build_options`]).
///
/// ## Errors
///
/// Any provider failure (network, 401, 429, 5xx) and a timeout become
/// [`Order2XlsxError::ServiceError`] with the provider's message unchanged.
pub async fn request_extraction(
    reader: &OrderReader,
    image: &EncodedImage,
    config: &RecognitionConfig,
) -> Result<String, Order2XlsxError> {
    let provider = match reader {
        OrderReader::Canned(reply) => {
            info!("Demo mode: using canned reply ({} bytes)", reply.len());
            return Ok(reply.clone());
        }
        OrderReader::Vision(provider) => provider,
    };

    let messages = build_messages(image, config);
    let options = build_options(config);
    let start = Instant::now();

    info!(
        "Requesting extraction from {} ({} bytes base64)",
        provider.model(),
        image.data.len()
    );

    let call = provider.chat(&messages, Some(&options));
    let response = match timeout(Duration::from_secs(config.api_timeout_secs), call).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            let message = e.to_string();
            warn!("Extraction request failed: {}", message);
            return Err(Order2XlsxError::ServiceError { message });
        }
        Err(_) => {
            warn!("Extraction request timed out after {}s", config.api_timeout_secs);
            return Err(Order2XlsxError::ServiceError {
                message: format!("request timed out after {}s", config.api_timeout_secs),
            });
        }
    };

    debug!(
        "{} input tokens, {} output tokens, {:?}",
        response.prompt_tokens,
        response.completion_tokens,
        start.elapsed()
    );

    Ok(response.content)
}

/// The chat turn sent to the model: prompt text plus inline image.
pub fn build_messages(image: &EncodedImage, config: &RecognitionConfig) -> Vec<ChatMessage> {
    let prompt = config
        .prompt
        .as_deref()
        .unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    vec![ChatMessage::user_with_images(prompt, vec![image.to_image_data()])]
}

/// Build `CompletionOptions` from the recognition config.
fn build_options(config: &RecognitionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        response_format: Some("json_object".to_string()),
        ..Default::default()
    }
}

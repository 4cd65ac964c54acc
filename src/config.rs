//! Configuration for order recognition and export.
//!
//! All behaviour is controlled through [`RecognitionConfig`], built via
//! [`RecognitionConfigBuilder`]. The API key is not stored here: it is looked
//! up from the environment by [`Credential::for_provider`] when a call is
//! about to be made, so a key exported after startup is still picked up.

use crate::error::Order2XlsxError;
use crate::progress::RecognitionProgressCallback;
use crate::prompts::DEMO_RESPONSE;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Name of the single sheet in the exported workbook.
pub const DEFAULT_SHEET_NAME: &str = "报货清单";
/// File name offered for the exported workbook.
pub const DEFAULT_EXPORT_FILENAME: &str = "factory_order_list.xlsx";
/// MIME type of the exported workbook.
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Values people paste into config templates instead of a real key.
const PLACEHOLDER_KEYS: &[&str] = &["在此处填入你的sk-xxxxxx", "sk-xxxxxx", "your-api-key", "changeme"];

/// Configuration for one recognition action.
///
/// # Example
/// ```rust
/// use order2xlsx::RecognitionConfig;
///
/// let config = RecognitionConfig::builder()
///     .model("gpt-4o-mini")
///     .temperature(0.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RecognitionConfig {
    /// Vision model identifier. Default: `gpt-4o`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Reply to use instead of calling any provider (demo mode).
    /// Takes precedence over every provider setting and needs no API key.
    pub canned_response: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Near zero keeps the model literal: it should copy "M12" off the page,
    /// not tidy it into "M12 bolt".
    pub temperature: f32,

    /// Generation ceiling. Default: 4096, enough for a few dozen rows of JSON.
    pub max_tokens: usize,

    /// Custom extraction prompt. If None, uses [`crate::prompts::DEFAULT_EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Name of the exported sheet. Default: `报货清单`.
    pub sheet_name: String,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Timeout for the model call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Busy-indication hooks fired around the model call.
    pub progress_callback: Option<Arc<dyn RecognitionProgressCallback>>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            canned_response: None,
            temperature: 0.1,
            max_tokens: 4096,
            prompt: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            download_timeout_secs: 60,
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RecognitionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("demo", &self.canned_response.is_some())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("custom_prompt", &self.prompt.is_some())
            .field("sheet_name", &self.sheet_name)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl RecognitionConfig {
    /// Create a new builder for `RecognitionConfig`.
    pub fn builder() -> RecognitionConfigBuilder {
        RecognitionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model that will be requested from `provider`.
    pub fn model_for(&self, provider: &str) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| default_model_for(provider))
    }

    /// True when no network call will be made.
    pub fn is_demo(&self) -> bool {
        self.canned_response.is_some()
    }
}

/// Builder for [`RecognitionConfig`].
pub struct RecognitionConfigBuilder {
    config: RecognitionConfig,
}

impl fmt::Debug for RecognitionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl RecognitionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Answer every recognition with the built-in sample order.
    pub fn demo(mut self) -> Self {
        self.config.canned_response = Some(DEMO_RESPONSE.to_string());
        self
    }

    /// Answer every recognition with `reply` instead of calling a model.
    pub fn canned_response(mut self, reply: impl Into<String>) -> Self {
        self.config.canned_response = Some(reply.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = name.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn RecognitionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RecognitionConfig, Order2XlsxError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Order2XlsxError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        validate_sheet_name(&c.sheet_name)?;
        Ok(self.config)
    }
}

/// Excel's own sheet-name rules: 1–31 chars, none of `[]:*?/\`,
/// no leading or trailing apostrophe.
pub fn validate_sheet_name(name: &str) -> Result<(), Order2XlsxError> {
    let len = name.chars().count();
    if len == 0 || len > 31 {
        return Err(Order2XlsxError::InvalidConfig(format!(
            "sheet name must be 1–31 characters, got {len}"
        )));
    }
    if let Some(bad) = name.chars().find(|c| "[]:*?/\\".contains(*c)) {
        return Err(Order2XlsxError::InvalidConfig(format!(
            "sheet name may not contain '{bad}'"
        )));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(Order2XlsxError::InvalidConfig(
            "sheet name may not start or end with an apostrophe".into(),
        ));
    }
    Ok(())
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Outcome of looking up a provider's API key. The key itself is never kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A plausible key was found in `var`.
    Present { var: &'static str },
    /// No key is checked: a local provider, or one not in [`api_key_var`].
    NotRequired,
    /// `var` is unset or empty.
    Missing { var: &'static str },
    /// `var` still holds a template placeholder.
    Placeholder { var: &'static str },
}

impl Credential {
    /// Look up the key for `provider` in the process environment.
    pub fn for_provider(provider: &str) -> Self {
        Self::for_provider_with(provider, |var| std::env::var(var).ok())
    }

    /// Look up the key for `provider` through `lookup` (env var name → value).
    pub fn for_provider_with(provider: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let Some(var) = api_key_var(provider) else {
            return Credential::NotRequired;
        };
        match lookup(var) {
            None => Credential::Missing { var },
            Some(v) if v.trim().is_empty() => Credential::Missing { var },
            Some(v) if is_placeholder(&v) => Credential::Placeholder { var },
            Some(_) => Credential::Present { var },
        }
    }

    /// Auto-detection: the first provider with a usable key, else the
    /// OpenAI status (the default provider) for the warning text.
    pub fn detect_with(lookup: impl Fn(&str) -> Option<String>) -> (&'static str, Self) {
        for provider in ["openai", "anthropic", "gemini"] {
            let cred = Self::for_provider_with(provider, &lookup);
            if cred.is_usable() {
                return (provider, cred);
            }
        }
        ("openai", Self::for_provider_with("openai", &lookup))
    }

    pub fn detect() -> (&'static str, Self) {
        Self::detect_with(|var| std::env::var(var).ok())
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Credential::Present { .. } | Credential::NotRequired)
    }

    /// User-facing fix-it text for an unusable credential.
    pub fn hint(&self) -> Option<String> {
        match self {
            Credential::Missing { var } => Some(format!("Set {var} in the environment, e.g. export {var}=sk-...")),
            Credential::Placeholder { var } => Some(format!(
                "{var} still holds a placeholder value; replace it with a real key."
            )),
            _ => None,
        }
    }
}

/// Environment variable holding the key for `provider`.
///
/// `None` for local providers and for names not listed here; those are
/// passed to the provider factory without a key check.
pub fn api_key_var(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" | "claude" => Some("ANTHROPIC_API_KEY"),
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "azure" => Some("AZURE_OPENAI_API_KEY"),
        "xai" | "grok" => Some("XAI_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        _ => None,
    }
}

/// Vision model used for `provider` when none is configured.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider.to_ascii_lowercase().as_str() {
        "anthropic" | "claude" => "claude-sonnet-4-20250514",
        "gemini" | "google" => "gemini-2.0-flash",
        "mistral" => "pixtral-large-latest",
        "ollama" => "llava",
        _ => DEFAULT_MODEL,
    }
}

fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    PLACEHOLDER_KEYS.iter().any(|p| v.eq_ignore_ascii_case(p)) || v.contains("xxxxxx")
}

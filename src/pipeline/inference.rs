//! HTTP client for the external vision/language inference service, plus a
//! scriptable mock for tests.
//!
//! The service speaks the Ollama generate API: text prompts, with images
//! carried as base64 in the request body. Failure classes are kept distinct
//! so callers can tell retryable outages from permanent rejections.

use std::collections::VecDeque;
use std::sync::Mutex;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::InferenceConfig;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Cannot reach inference service at {0}")]
    Connection(String),

    #[error("Inference request timed out after {0}s")]
    Timeout(u64),

    #[error("Inference service rejected credentials (HTTP {0})")]
    Auth(u16),

    #[error("Inference service quota exhausted (HTTP {0})")]
    Quota(u16),

    #[error("Inference service error (HTTP {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Failed to parse inference response: {0}")]
    ResponseParsing(String),
}

impl InferenceError {
    /// Retry-ability hint: transient outages and throttling may succeed on a
    /// later attempt; auth rejections and malformed responses will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::Quota(_) => true,
            Self::Service { status, .. } => *status >= 500,
            Self::Auth(_) | Self::ResponseParsing(_) => false,
        }
    }
}

/// Raw inference access: prompt in, text out.
pub trait InferenceClient: Send + Sync {
    fn generate(&self, prompt: &str, system: &str) -> Result<String, InferenceError>;

    fn generate_with_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, InferenceError>;
}

/// Blocking HTTP client against an Ollama-compatible endpoint.
pub struct HttpInferenceClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpInferenceClient {
    pub fn new(config: &InferenceConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
            timeout_secs: config.timeout_secs,
        }
    }

    fn post_generate(&self, body: &GenerateRequest<'_>) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self.client.post(&url).json(body).send().map_err(|e| {
            if e.is_connect() {
                InferenceError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                InferenceError::Timeout(self.timeout_secs)
            } else {
                InferenceError::Service {
                    status: 0,
                    body: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = response.text().unwrap_or_default();
            return Err(match code {
                401 | 403 => InferenceError::Auth(code),
                429 => InferenceError::Quota(code),
                _ => InferenceError::Service { status: code, body },
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;
        Ok(parsed.response)
    }
}

/// Request body for /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

/// Response body from /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl InferenceClient for HttpInferenceClient {
    fn generate(&self, prompt: &str, system: &str) -> Result<String, InferenceError> {
        let _span = tracing::info_span!("inference", model = %self.model).entered();
        self.post_generate(&GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            images: None,
        })
    }

    fn generate_with_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, InferenceError> {
        let _span = tracing::info_span!(
            "inference_vision",
            model = %self.model,
            mime = %mime_type,
            image_size = image.len(),
        )
        .entered();
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        self.post_generate(&GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            images: Some(vec![encoded]),
        })
    }
}

/// Mock inference client — replays a script of responses in order.
pub struct MockInferenceClient {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
}

impl MockInferenceClient {
    pub fn new(response: &str) -> Self {
        Self::with_responses(vec![response])
    }

    pub fn with_responses(responses: Vec<&str>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
        }
    }

    pub fn failing(error: InferenceError) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(error)])),
        }
    }

    /// Queue a failure after any already-queued responses (e.g. classify
    /// succeeds, analysis fails).
    pub fn then_failure(self, error: InferenceError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    fn next(&self) -> Result<String, InferenceError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(InferenceError::ResponseParsing("mock script exhausted".into())))
    }
}

impl InferenceClient for MockInferenceClient {
    fn generate(&self, _prompt: &str, _system: &str) -> Result<String, InferenceError> {
        self.next()
    }

    fn generate_with_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _prompt: &str,
        _system: &str,
    ) -> Result<String, InferenceError> {
        self.next()
    }
}

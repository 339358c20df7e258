//! Gemini `generateContent` transport.
//!
//! One call here is one HTTP round trip. The response is classified into a
//! [`ServiceOutcome`]; retrying is the caller's concern.

use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Default Gemini API endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

/// A single-prompt generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Natural-language prompt.
    pub prompt: String,
    /// Model override; the transport default is used when `None`.
    pub model: Option<String>,
}

impl GenerationRequest {
    /// Create a request for the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
        }
    }

    /// Set the model for this request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Classified result of one call to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// A well-formed candidate; the raw (untrimmed) text of its first part.
    Success(String),
    /// HTTP 429.
    RateLimited,
    /// Any other non-2xx status.
    HttpError { status: u16, body: String },
    /// 2xx without a usable candidate.
    EmptyResponse,
    /// The request never produced a response.
    NetworkError(String),
}

/// Boundary to the external text-generation service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Perform one generation call.
    async fn send(&self, request: &GenerationRequest) -> ServiceOutcome;
}

/// Gemini REST client.
pub struct GeminiTransport {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiTransport {
    /// Create a transport for the given API key and model.
    ///
    /// No client-level timeout is set; the retrying client bounds each
    /// attempt itself.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, GEMINI_BASE_URL, model)
    }

    /// Create a transport against a custom endpoint (proxies, tests).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Create a transport from environment variables.
    ///
    /// - `GEMINI_API_KEY`: API key (required)
    /// - `GEMINI_API_BASE`: endpoint (defaults to the public API)
    /// - `GEMINI_MODEL`: model (defaults to `gemini-flash-latest`)
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let base_url = env::var("GEMINI_API_BASE").unwrap_or_else(|_| GEMINI_BASE_URL.to_string());
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::with_base_url(api_key, base_url, model)
    }

    /// Get the default model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(model)
        )
    }
}

#[async_trait]
impl GenerationService for GeminiTransport {
    async fn send(&self, request: &GenerationRequest) -> ServiceOutcome {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = ApiRequest::single_prompt(&request.prompt);

        let response = match self
            .client
            .post(self.endpoint(model))
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ServiceOutcome::NetworkError(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ServiceOutcome::RateLimited;
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return ServiceOutcome::HttpError {
                status: status.as_u16(),
                body,
            };
        }

        match response.json::<ApiResponse>().await {
            Ok(parsed) => classify_body(parsed),
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable generateContent body");
                ServiceOutcome::EmptyResponse
            }
        }
    }
}

/// Map a successfully parsed 2xx body onto an outcome.
fn classify_body(response: ApiResponse) -> ServiceOutcome {
    response
        .candidates
        .into_iter()
        .flatten()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .map(ServiceOutcome::Success)
        .unwrap_or(ServiceOutcome::EmptyResponse)
}

/// Request body for `generateContent`.
#[derive(Debug, Serialize)]
struct ApiRequest {
    contents: Vec<ApiContent>,
}

impl ApiRequest {
    fn single_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![ApiContent {
                parts: vec![ApiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Response body of `generateContent`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    candidates: Option<Vec<ApiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
}

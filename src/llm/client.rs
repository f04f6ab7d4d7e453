//! Async client for the code generation service
//!
//! Model-agnostic HTTP client supporting Anthropic and OpenAI-compatible
//! APIs. The service is an untrusted collaborator: everything it returns
//! goes through payload extraction here and static validation downstream.
//! Credentials are construction parameters, never ambient process state,
//! so the pipeline runs against a fake generator in tests.

use crate::core::config::PipelineConfig;
use crate::core::error::{PilotError, Result};
use crate::llm::extract::extract_code;
use crate::llm::prompt::GenerationRequest;
use crate::script::CandidateScript;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error taxonomy for the generation boundary
///
/// Each kind maps to a distinct user-facing message and distinct retry
/// eligibility.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationError {
    #[error("the generation service timed out")]
    Timeout,

    #[error("the generation service rate limit was exceeded")]
    RateLimited,

    #[error("authentication with the generation service failed; check the API key")]
    AuthFailure,

    #[error("the generation service returned no usable code")]
    Malformed,

    #[error("generation service error: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Whether the orchestrator may retry the whole generation call
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Timeout | GenerationError::RateLimited)
    }
}

/// Anything that can turn a composed request into a candidate script
///
/// The pipeline depends on this seam, not on the HTTP client, so tests
/// substitute a scripted fake.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<CandidateScript, GenerationError>;
}

/// API wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

/// Connection settings for the generation service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub transport_retries: u32,
    pub retry_backoff_ms: u64,
}

impl ClientConfig {
    /// Build connection settings from environment variables
    ///
    /// Required: PILOT_API_KEY
    /// Optional: PILOT_API_URL (defaults to the Anthropic API)
    /// Optional: PILOT_MODEL (defaults to claude-3-haiku-20240307)
    pub fn from_env(pipeline: &PipelineConfig) -> Result<Self> {
        let api_key = std::env::var("PILOT_API_KEY")
            .map_err(|_| PilotError::Config("PILOT_API_KEY not set".into()))?;
        let api_url = std::env::var("PILOT_API_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".into());
        let model =
            std::env::var("PILOT_MODEL").unwrap_or_else(|_| "claude-3-haiku-20240307".into());
        Ok(Self {
            api_key,
            api_url,
            model,
            temperature: pipeline.temperature,
            max_tokens: pipeline.max_tokens,
            timeout_ms: pipeline.generation_timeout_ms,
            transport_retries: pipeline.transport_retries,
            retry_backoff_ms: pipeline.retry_backoff_ms,
        })
    }
}

/// HTTP generation client
pub struct GenerationClient {
    client: reqwest::Client,
    config: ClientConfig,
    api_format: ApiFormat,
}

impl GenerationClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PilotError::Config(format!("failed to build HTTP client: {}", e)))?;
        let api_format = Self::detect_api_format(&config.api_url);
        Ok(Self {
            client,
            config,
            api_format,
        })
    }

    /// Detect API format from URL
    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            // DeepSeek, OpenAI and other compatible APIs use OpenAI format
            ApiFormat::OpenAI
        }
    }

    /// Send a completion request, retrying transient transport failures
    ///
    /// At most `transport_retries` retries with exponential backoff from
    /// `retry_backoff_ms`. Timeout, rate-limit and auth errors are never
    /// retried here; the first two are orchestrator-level retries.
    async fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> std::result::Result<String, GenerationError> {
        let mut backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempt = 0;
        loop {
            match self.complete_once(system, user).await {
                Err(GenerationError::Unknown(reason))
                    if attempt < self.config.transport_retries =>
                {
                    attempt += 1;
                    tracing::debug!(%reason, attempt, "transient transport failure, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }

    async fn complete_once(
        &self,
        system: &str,
        user: &str,
    ) -> std::result::Result<String, GenerationError> {
        match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(system, user).await,
            ApiFormat::OpenAI => self.complete_openai(system, user).await,
        }
    }

    async fn complete_anthropic(
        &self,
        system: &str,
        user: &str,
    ) -> std::result::Result<String, GenerationError> {
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: system.into(),
            messages: vec![Message {
                role: "user".into(),
                content: user.into(),
            }],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        check_status(response.status())?;

        let completion: AnthropicResponse =
            response.json().await.map_err(|_| GenerationError::Malformed)?;

        completion
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or(GenerationError::Malformed)
    }

    async fn complete_openai(
        &self,
        system: &str,
        user: &str,
    ) -> std::result::Result<String, GenerationError> {
        let request = OpenAIRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: system.into(),
                },
                Message {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key),
            )
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        check_status(response.status())?;

        let completion: OpenAIResponse =
            response.json().await.map_err(|_| GenerationError::Malformed)?;

        completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or(GenerationError::Malformed)
    }
}

#[async_trait]
impl ScriptGenerator for GenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<CandidateScript, GenerationError> {
        let response = self.complete(&request.system, &request.user).await?;
        let code = extract_code(&response).ok_or(GenerationError::Malformed)?;
        Ok(CandidateScript::new(code))
    }
}

fn classify_transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Unknown(e.to_string())
    }
}

fn check_status(status: StatusCode) -> std::result::Result<(), GenerationError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GenerationError::AuthFailure),
        StatusCode::TOO_MANY_REQUESTS => Err(GenerationError::RateLimited),
        s if s.is_server_error() => {
            Err(GenerationError::Unknown(format!("server error: {}", s)))
        }
        s => Err(GenerationError::Unknown(format!("API error: {}", s))),
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

// OpenAI-compatible API format (DeepSeek, OpenAI, etc.)
#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

// Shared
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

//! Vision provider trait and the OpenAI chat-completions implementation.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::VisionError;

const PROVIDER_ID: &str = "vision-api";
const CHAT_COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Trait for vision-capable analysis providers.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Used for logging and as the circuit-breaker resource name.
    fn id(&self) -> &'static str;

    /// Analyze an image given a prompt.
    ///
    /// `image_base64` is the raw base64 payload (no data-URL prefix).
    /// Returns the model's analysis text.
    async fn analyze(&self, prompt: &str, image_base64: &str) -> Result<String, VisionError>;
}

// ============================================================================
// Request/response structures for the chat completions API
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// OpenAI vision provider using chat completions with image content.
pub struct OpenAiVisionProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiVisionProvider {
    /// Create a provider with the default model and token budget.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the response token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, prompt: &str, image_base64: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", image_base64),
                            detail: "high",
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAiVisionProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn analyze(&self, prompt: &str, image_base64: &str) -> Result<String, VisionError> {
        if self.api_key.is_empty() {
            return Err(VisionError::MissingApiKey(PROVIDER_ID.to_string()));
        }

        debug!("Vision: sending analysis request");
        let request = self.build_request(prompt, image_base64);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, CHAT_COMPLETIONS_ENDPOINT))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    VisionError::provider(format!("rate limited (HTTP {})", status))
                }
                _ => VisionError::provider(format!("analysis request returned HTTP {}", status)),
            });
        }

        let payload: ChatResponse = response.json().await?;

        let content = payload
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(VisionError::EmptyAnalysis);
        }

        info!(
            "Vision: analysis complete ({} tokens)",
            payload
                .usage
                .map(|u| u.total_tokens.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        );

        Ok(content.to_string())
    }
}

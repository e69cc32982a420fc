use async_trait::async_trait;
use gantry_core::{LlmSettings, MessageRole};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CompletionError, categorize_failure};
use crate::provider::{ChatCompletionRequest, ChatCompletionResponse, ChatProvider};

/// Client for any endpoint speaking the OpenAI chat-completions wire format.
/// The Azure and custom provider kinds reuse it with a different host.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: Client,
}

impl Default for OpenAiCompatibleClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiCompatibleClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleClient {
    async fn complete(
        &self,
        settings: &LlmSettings,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        if !settings.is_configured() {
            return Err(CompletionError::NotConfigured);
        }

        let endpoint = format!(
            "{}/chat/completions",
            settings.api_host.trim_end_matches('/')
        );

        let mut messages = Vec::new();

        if let Some(system_prompt) = request.system_prompt.as_deref()
            && !system_prompt.trim().is_empty()
        {
            messages.push(OpenAiMessage {
                role: "system".to_owned(),
                content: system_prompt.to_owned(),
            });
        }

        messages.extend(request.turns.iter().map(|turn| OpenAiMessage {
            role: match turn.role {
                MessageRole::System => "system".to_owned(),
                MessageRole::User => "user".to_owned(),
                MessageRole::Assistant => "assistant".to_owned(),
            },
            content: turn.content.clone(),
        }));

        let payload = OpenAiChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(
            host = %settings.api_host,
            model = %request.model,
            turns = payload.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(&settings.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "chat completion failed");
            return Err(categorize_failure(status.as_u16(), &body));
        }

        let output: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|_| CompletionError::InvalidResponse)?;

        let content = output
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::InvalidResponse)?;

        if content.is_empty() {
            warn!(model = %request.model, "provider returned empty completion content");
        }

        Ok(ChatCompletionResponse { content })
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiAssistantMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiAssistantMessage {
    content: Option<String>,
}

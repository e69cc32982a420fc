use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use gantry_core::{LlmProviderKind, LlmSettings, MessageRole};

use crate::error::CompletionError;

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub turns: Vec<ChatTurn>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionResponse {
    pub content: String,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        settings: &LlmSettings,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, CompletionError>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<LlmProviderKind, Arc<dyn ChatProvider>>,
}

impl ProviderRegistry {
    pub fn register(&mut self, kind: LlmProviderKind, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(kind, provider);
    }

    pub async fn complete(
        &self,
        settings: &LlmSettings,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, CompletionError> {
        let provider = self
            .providers
            .get(&settings.provider)
            .ok_or(CompletionError::UnsupportedProvider)?;

        provider.complete(settings, request).await
    }
}

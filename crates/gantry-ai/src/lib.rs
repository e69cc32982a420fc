mod error;
mod openai;
mod provider;

pub use error::{CompletionError, categorize_failure};
pub use openai::OpenAiCompatibleClient;
pub use provider::{
    ChatCompletionRequest, ChatCompletionResponse, ChatProvider, ChatTurn, ProviderRegistry,
};

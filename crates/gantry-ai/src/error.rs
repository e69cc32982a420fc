use thiserror::Error;

/// User-facing completion failures. Display strings are surfaced verbatim in
/// the front-end, so they speak to the operator, not to a log parser.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("The assistant is not configured. Add an API key in the LLM settings.")]
    NotConfigured,
    #[error("No client is registered for the configured provider.")]
    UnsupportedProvider,
    #[error("Authentication failed. Check your API key.")]
    Unauthorized,
    #[error("The provider refused the request. Your key may lack access to this model.")]
    Forbidden,
    #[error("Rate limit reached. Wait a moment before sending another message.")]
    RateLimited,
    #[error("Your provider quota is exhausted. Check your plan and billing details.")]
    QuotaExhausted,
    #[error("The provider returned an unexpected response format.")]
    InvalidResponse,
    #[error("The provider request failed with status {status}.")]
    Provider { status: u16 },
    #[error("Could not reach the provider: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Maps a non-2xx completion response to a user-facing category. A body
/// mentioning "quota" wins over the status code: providers report exhausted
/// quotas under several different statuses.
pub fn categorize_failure(status: u16, body: &str) -> CompletionError {
    if body.to_lowercase().contains("quota") {
        return CompletionError::QuotaExhausted;
    }

    match status {
        401 => CompletionError::Unauthorized,
        403 => CompletionError::Forbidden,
        429 => CompletionError::RateLimited,
        _ => CompletionError::Provider { status },
    }
}

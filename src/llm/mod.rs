use async_trait::async_trait;

pub mod gemini;

pub use gemini::GeminiClient;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM response contained no text")]
    EmptyResponse,
}

/// A text-generation backend: prompt in, completion text out.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

use async_trait::async_trait;
use log::trace;
use serde::{Deserialize, Serialize};

use super::{LLMProvider, LlmError};
use crate::core::config::GeminiConfig;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, with all of its parts joined.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &GeminiConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
        ))
    }

    fn build_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl LLMProvider for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(self.build_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: GenerateContentResponse = response.json().await?;
        let text = result.text().ok_or(LlmError::EmptyResponse)?;
        trace!("Gemini {} returned {} chars", self.model, text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    fn client_for(server: &mockito::Server) -> GeminiClient {
        GeminiClient::new(
            "test-key".to_string(),
            "gemini-1.5-flash".to_string(),
            server.url(),
        )
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{"parts": [{"text": "hello"}]}],
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
            )
            .create_async()
            .await;

        let text = client_for(&server).generate("hello").await.unwrap();
        assert_eq!(text, "{\"a\":1}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(403)
            .with_body("API key not valid")
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("API key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_candidates_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_non_json_body_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Http(_)));
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let mut config = GeminiConfig::default();
        assert!(GeminiClient::from_config(&config).is_none());

        config.api_key = Some("k".to_string());
        config.base_url = "http://localhost:9/".to_string();
        let client = GeminiClient::from_config(&config).unwrap();
        assert_eq!(
            client.build_url(),
            "http://localhost:9/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}

//! Ticket classification.
//!
//! [`LlmClassifier`] asks a language model for a category and priority;
//! [`KeywordClassifier`] applies fixed keyword rules. [`FallbackClassifier`]
//! composes the two: any failure of the model path is logged and answered by
//! the rules, so callers always get a [`Classification`].

use async_trait::async_trait;
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::enums::{choices, Category, Priority};
use crate::llm::{LLMProvider, LlmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub suggested_category: Category,
    pub suggested_priority: Priority,
}

impl Classification {
    pub fn new(category: Category, priority: Priority) -> Self {
        Self {
            suggested_category: category,
            suggested_priority: priority,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),
    #[error("Malformed classification response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, description: &str) -> Result<Classification, ClassifyError>;

    fn name(&self) -> &'static str;
}

/// Keyword rules, checked in order; the first hit wins.
pub fn fallback_classification(description: &str) -> Classification {
    let description = description.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| description.contains(w));

    if mentions(&["payment", "charged"]) {
        Classification::new(Category::Billing, Priority::High)
    } else if mentions(&["error", "bug"]) {
        Classification::new(Category::Technical, Priority::Medium)
    } else if mentions(&["account", "login"]) {
        Classification::new(Category::Account, Priority::High)
    } else {
        Classification::new(Category::General, Priority::Low)
    }
}

/// The keyword rules as a classifier. Infallible, so it is the last resort
/// behind any remote classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify(&self, description: &str) -> Classification {
        fallback_classification(description)
    }

    pub fn name(&self) -> &'static str {
        "keywords"
    }
}

pub fn build_prompt(description: &str) -> String {
    format!(
        "Classify this support ticket.\n\
         \n\
         Categories: {categories}\n\
         Priorities: {priorities}\n\
         \n\
         Description:\n\
         {description}\n\
         \n\
         Return ONLY valid JSON:\n\
         {{\"suggested_category\": \"\", \"suggested_priority\": \"\"}}\n",
        categories = choices(Category::ALL),
        priorities = choices(Priority::ALL),
    )
}

/// Removes a surrounding Markdown code fence (```` ```json ... ``` ````),
/// with or without a newline after the language tag.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parses model output. Values outside the enumerations are rejected.
pub fn parse_classification(text: &str) -> Result<Classification, ClassifyError> {
    Ok(serde_json::from_str(strip_code_fence(text))?)
}

pub struct LlmClassifier {
    provider: Arc<dyn LLMProvider>,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, description: &str) -> Result<Classification, ClassifyError> {
        let prompt = build_prompt(description);
        let text = self.provider.generate(&prompt).await?;
        trace!("{} classification output: {text}", self.provider.name());
        parse_classification(&text)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

pub struct FallbackClassifier {
    primary: Option<Arc<dyn Classifier>>,
    fallback: KeywordClassifier,
}

impl FallbackClassifier {
    pub fn new(primary: Arc<dyn Classifier>) -> Self {
        Self {
            primary: Some(primary),
            fallback: KeywordClassifier,
        }
    }

    /// No remote model configured; every request uses the keyword rules.
    pub fn rules_only() -> Self {
        Self {
            primary: None,
            fallback: KeywordClassifier,
        }
    }

    pub async fn classify(&self, description: &str) -> Classification {
        if let Some(primary) = &self.primary {
            match primary.classify(description).await {
                Ok(classification) => return classification,
                Err(e) => warn!(
                    "{} classifier failed, using {} fallback: {e}",
                    primary.name(),
                    self.fallback.name()
                ),
            }
        }
        self.fallback.classify(description)
    }
}

impl std::fmt::Debug for FallbackClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackClassifier")
            .field("primary", &self.primary.as_ref().map(|p| p.name()))
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

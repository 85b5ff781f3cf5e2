//! Text extraction collaborator.
//!
//! Turns a free-form message such as `"bread 5 euro grocery"` into a raw
//! [`Transaction`] through an OpenAI-compatible chat completion endpoint.
//! The raw result still has to go through
//! [`normalize_extracted`](crate::draft_editor::normalize_extracted) before it
//! becomes a draft.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::errors::ExtractionError;
use crate::transaction_model::{Category, Transaction, TransactionType, DEFAULT_CURRENCY};

#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Extract a transaction of `kind` from `text`. A zero amount in the
    /// result means nothing usable was found.
    async fn extract(&self, text: &str, kind: TransactionType)
        -> Result<Transaction, ExtractionError>;
}

/// The JSON object the model is asked to answer with
#[derive(Debug, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date: Option<String>,
}

/// Build the system prompt for `kind`, listing only that kind's categories
pub fn build_prompt(kind: TransactionType) -> String {
    let categories = Category::for_type(kind)
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let fallback = kind.fallback_category();

    format!(
        "You are a financial transaction parser. Extract the {kind} described by the user.\n\
         Answer with ONLY a JSON object, no markdown:\n\
         {{ \"category\": \"Category\", \"amount\": 12.34, \"description\": \"Description\", \"date\": \"YYYY-MM-DD\" }}\n\
         Available categories (use ONLY these): {categories}\n\
         Rules:\n\
         - Pick the category mentioned in the text, accounting for typos, else infer it from the description, else use \"{fallback}\".\n\
         - The description is the main item mentioned, first letter capitalized; if none, use the category name.\n\
         - The amount is a number with a period as decimal separator and at most 2 decimals; use 0 if no amount is mentioned.\n\
         - Include \"date\" only when the text mentions one."
    )
}

/// Strip a markdown code fence the model may wrap its answer in
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Convert the model's answer into a raw transaction of `kind`.
///
/// Unknown categories and unparsable dates are kept lenient here: the
/// category falls back to the kind's catch-all and the date to `today`.
pub fn parse_extraction(
    content: &str,
    kind: TransactionType,
    today: NaiveDate,
) -> Result<Transaction, ExtractionError> {
    let fields: ExtractedFields = serde_json::from_str(strip_code_fence(content))?;

    let amount = Decimal::try_from(fields.amount)
        .map_err(|e| ExtractionError::UnexpectedResponse(format!("amount: {e}")))?;

    let category = Category::parse_for(kind, fields.category.trim())
        .unwrap_or_else(|| kind.fallback_category());

    let date = fields
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .unwrap_or(today);

    Ok(Transaction {
        id: None,
        owner_id: 0,
        kind,
        category,
        amount,
        description: fields.description,
        date,
        currency: DEFAULT_CURRENCY,
    })
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

/// Extraction through an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct LlmExtractor {
    client: reqwest::Client,
    config: ExtractionConfig,
}

impl LlmExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, ExtractionError> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": &self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text}
            ],
            "temperature": 0.0,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Service { status, body });
        }

        let response: ChatResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExtractionError::UnexpectedResponse("no choices returned".to_string()))
    }
}

#[async_trait]
impl ExtractionService for LlmExtractor {
    async fn extract(
        &self,
        text: &str,
        kind: TransactionType,
    ) -> Result<Transaction, ExtractionError> {
        let content = self.complete(&build_prompt(kind), text).await?;
        debug!(kind = %kind, response = %content, "Extraction response received");

        parse_extraction(&content, kind, Local::now().date_naive())
    }
}

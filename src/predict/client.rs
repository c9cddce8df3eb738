//! OpenAI-compatible chat-completions client for answer prediction

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::PredictionService;
use crate::config::PredictionConfig;
use crate::types::{PredictRequest, Prediction, UNKNOWN_INTENT};

const SYSTEM_PROMPT: &str = r#"You are an autofill assistant. Given a form question and what is known about the user, produce the value the user would type or select.

Respond with a single JSON object and nothing else:
{"answer": "<the value to fill>", "confidence": <0.0-1.0>, "intent": "<taxonomy label like personal.firstName, eeo.gender, application.salaryExpectation>", "reasoning": "<one short sentence>"}

Rules:
- When options are provided, "answer" must be exactly one of them.
- When the profile does not contain the information, answer with your best generic value and a low confidence.
- Never leave "intent" empty; use "unknown" if no label fits."#;

/// Hosted model client (OpenRouter and other OpenAI-compatible APIs)
pub struct HostedModelClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl HostedModelClient {
    pub fn new(config: &PredictionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build prediction HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn user_prompt(request: &PredictRequest) -> String {
        let mut prompt = format!("Question: {}\n", request.question);
        if let Some(field_type) = &request.field_type {
            prompt.push_str(&format!("Field type: {}\n", field_type));
        }
        if !request.options.is_empty() {
            prompt.push_str(&format!("Options: {}\n", request.options.join(", ")));
        }
        match &request.user_profile {
            Some(profile) => prompt.push_str(&format!("User profile: {}\n", profile)),
            None => prompt.push_str("User profile: (none)\n"),
        }
        prompt
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPrediction {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse the model's reply into a [`Prediction`]. The reply should be
/// a bare JSON object, but models wrap it in prose or code fences
/// often enough that the object is cut out of the text first. A reply
/// with no JSON object at all becomes the answer verbatim, below the
/// learn threshold.
fn parse_prediction(content: &str) -> Prediction {
    let object = content
        .find('{')
        .and_then(|start| {
            content
                .rfind('}')
                .filter(|&end| end > start)
                .map(|end| &content[start..=end])
        })
        .and_then(|slice| serde_json::from_str::<RawPrediction>(slice).ok());

    match object {
        Some(raw) => Prediction {
            answer: raw.answer.trim().to_string(),
            confidence: raw.confidence.clamp(0.0, 1.0),
            intent: raw
                .intent
                .filter(|intent| !intent.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_INTENT.to_string()),
            reasoning: raw
                .reasoning
                .filter(|reasoning| !reasoning.trim().is_empty())
                .unwrap_or_else(|| "Model prediction".to_string()),
        },
        None => Prediction {
            answer: content.trim().to_string(),
            confidence: 0.5,
            intent: UNKNOWN_INTENT.to_string(),
            reasoning: "Unstructured model reply".to_string(),
        },
    }
}

#[async_trait]
impl PredictionService for HostedModelClient {
    async fn predict(&self, request: &PredictRequest) -> Result<Prediction> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context("No prediction API key configured (set PREDICTION_API_KEY)")?;

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": Self::user_prompt(request)},
            ],
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .context("Failed to send request to model provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Model API error ({}): {}", status, body);
        }

        let raw: Value = response
            .json()
            .await
            .context("Failed to parse model response body")?;

        let content = raw
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        debug!("model reply: {}", content);
        Ok(parse_prediction(content))
    }
}

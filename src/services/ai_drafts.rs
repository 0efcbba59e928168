// src/services/ai_drafts.rs

//! MCQ drafting through an OpenAI-compatible chat-completions endpoint.
//! Drafts are returned to the admin for review and never stored here.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{config::Config, error::DraftError, models::mcq::is_option_token};

const DRAFT_COUNT: usize = 5;
const TEMPERATURE: f64 = 0.5;
const MAX_TOKENS: u32 = 800;

/// One drafted question in the shape the course editor accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McqDraft {
    pub question: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
    pub correct_option: String,
}

#[derive(Debug, Clone)]
pub struct AiClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl AiClient {
    pub fn from_config(config: &Config) -> Result<Self, DraftError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DraftError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.ai_api_url.clone(),
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn draft_mcqs(&self, course_name: &str) -> Result<Vec<McqDraft>, DraftError> {
        let api_key = self.api_key.as_deref().ok_or(DraftError::NotConfigured)?;

        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": build_prompt(course_name)}],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        tracing::info!(course_name, model = %self.model, "Requesting AI MCQ drafts");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DraftError::Transport(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| DraftError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(DraftError::Transport(format!("provider returned {}: {}", status, body)));
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| DraftError::Transport("missing completion content".to_string()))?;

        parse_drafts(content)
    }
}

fn build_prompt(course_name: &str) -> String {
    format!(
        "Generate {count} MCQ questions about {course_name}.\n\
         Each MCQ should have 4 options and mention the correct option number (1 to 4).\n\
         Respond ONLY with valid JSON array. Do NOT include any explanation, only pure JSON.\n\
         \n\
         Format:\n\
         [\n  {{ \"question\": \"....\", \"option1\": \"....\", \"option2\": \"....\", \
         \"option3\": \"....\", \"option4\": \"....\", \"correct_option\": \"2\" }},\n  ...\n]\n",
        count = DRAFT_COUNT,
    )
}

/// Parses the model's reply. Tolerates a surrounding Markdown code fence and
/// numeric `correct_option` values; incomplete entries are dropped.
pub fn parse_drafts(content: &str) -> Result<Vec<McqDraft>, DraftError> {
    let trimmed = strip_code_fence(content.trim());
    let items: Vec<Value> =
        serde_json::from_str(trimmed).map_err(|e| DraftError::Parse(format!("{}: {}", e, trimmed)))?;

    Ok(items.iter().filter_map(draft_from_value).collect())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn draft_from_value(value: &Value) -> Option<McqDraft> {
    let text = |key: &str| -> Option<String> {
        let field = match value.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!field.is_empty()).then_some(field)
    };

    let draft = McqDraft {
        question: text("question")?,
        option1: text("option1")?,
        option2: text("option2")?,
        option3: text("option3")?,
        option4: text("option4")?,
        correct_option: text("correct_option")?,
    };

    is_option_token(&draft.correct_option).then_some(draft)
}

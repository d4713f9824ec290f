use anyhow::{anyhow, Context};
use axum::async_trait;
use indoc::formatdoc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::{
    email::metadata::EmailMetadata,
    error::{AppError, AppResult},
    model::analysis::{ActionItem, AnalysisSource, Confidence, EmailAnalysis, EmailSummary},
    rate_limiters::RateLimiters,
    server_config::AiConfig,
    HttpClient,
};

use super::EmailAnalyzer;

const DEFAULT_TONE: &str = "professional";

fn system_prompt(max_action_items: usize) -> String {
    formatdoc! {r#"
        You are a helpful assistant that triages emails.
        Analyze the email and respond only with a JSON object with the keys summary, key_points, tone and action_items.
        - summary: a brief 2-3 sentence summary of the main topic
        - key_points: an array of at most 5 short strings
        - tone: one of professional, urgent, casual or friendly
        - action_items: an array of at most {max_action_items} objects with the keys text, assignee, deadline and confidence
        Use "unspecified" when no assignee is mentioned and "none" when there is no deadline.
        confidence is one of high, medium or low. Use an empty array when there are no clear action items.
        Do not provide explanations."#}
}

pub fn analysis_user_prompt(subject: &str, body: &str) -> String {
    format!(
        r#"Analyze the following email based on the email subject between the <subject> tags and the email body between the <body> tags.
                <subject>{}</subject>
                <body>{}</body>"#,
        subject, body
    )
}

/// Chat-completions analyzer for the Mistral API
pub struct MistralAnalyzer {
    http_client: HttpClient,
    rate_limiters: RateLimiters,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f64,
    max_action_items: usize,
}

impl MistralAnalyzer {
    pub fn new(
        config: &AiConfig,
        api_key: &str,
        http_client: HttpClient,
        rate_limiters: RateLimiters,
        max_action_items: usize,
    ) -> Self {
        Self {
            http_client,
            rate_limiters,
            endpoint: config.endpoint.clone(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_action_items,
        }
    }

    async fn send_analysis_prompt(&self, subject: &str, body: &str) -> AppResult<ChatApiResponse> {
        if self.rate_limiters.in_backoff() {
            return Err(AppError::TooManyRequests);
        }
        self.rate_limiters.acquire_one().await;
        tracing::trace!("Prompt limiter after acquire: {}", self.rate_limiters.get_status());

        let resp = self
            .http_client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&json!(
              {
                "model": &self.model,
                "temperature": self.temperature,
                "messages": [
                  {
                    "role": "system",
                    "content": system_prompt(self.max_action_items)
                  },
                  {
                    "role": "user",
                    "content": analysis_user_prompt(subject, body)
                  }
                ],
                "response_format": { "type": "json_object" }
              }
            ))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
            .context(format!("Could not parse chat response: {}", resp))?;

        match parsed {
            ChatApiResponseOrError::Response(parsed) => Ok(parsed),
            ChatApiResponseOrError::Error(error) => {
                if error.message.to_lowercase().contains("rate limit") {
                    self.rate_limiters.trigger_backoff();
                    return Err(AppError::TooManyRequests);
                }
                Err(anyhow!("Chat API error: {:?}", error).into())
            }
        }
    }
}

#[async_trait]
impl EmailAnalyzer for MistralAnalyzer {
    fn name(&self) -> &'static str {
        "mistral"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn analyze(&self, body: &str, metadata: &EmailMetadata) -> AppResult<EmailAnalysis> {
        let subject = metadata.subject.as_deref().unwrap_or_default();
        let parsed = self.send_analysis_prompt(subject, body).await?;

        let choice = parsed.choices.first().context("No choices in response")?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!("Analysis prompt used {} tokens", usage.total_tokens);
        }

        let (summary, mut action_items) = parse_analysis_content(&choice.message.content)?;
        action_items.truncate(self.max_action_items);

        Ok(EmailAnalysis {
            summary,
            action_items,
            source: AnalysisSource::Remote,
        })
    }
}

/// Read the model's answer as JSON, or failing that as labelled lines
fn parse_analysis_content(content: &str) -> AppResult<(EmailSummary, Vec<ActionItem>)> {
    let (summary, action_items) = match serde_json::from_str::<AnalysisJson>(content) {
        Ok(answer) => answer.into_parts(),
        Err(e) => {
            tracing::warn!("Could not parse analysis JSON response, parsing manually: {:?}", e);
            parse_labelled_response(content)
        }
    };

    if summary.summary.trim().is_empty() {
        return Err(anyhow!("No summary in analysis response: {}", content).into());
    }

    Ok((summary, action_items))
}

/// `SUMMARY:` / `KEY_POINTS:` / `TONE:` followed by `ACTION:` blocks separated by `---`
fn parse_labelled_response(content: &str) -> (EmailSummary, Vec<ActionItem>) {
    let mut summary = String::new();
    let mut key_points = Vec::new();
    let mut tone = DEFAULT_TONE.to_string();
    let mut in_key_points = false;

    let mut action_items = Vec::new();
    let mut current: Option<RawActionItem> = None;
    let no_actions = content.contains("NO_ACTIONS");

    for line in content.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("SUMMARY:") {
            summary = value.trim().to_string();
            in_key_points = false;
        } else if line.starts_with("KEY_POINTS:") {
            in_key_points = true;
        } else if let Some(value) = line.strip_prefix("TONE:") {
            tone = value.trim().to_lowercase();
            in_key_points = false;
        } else if let Some(value) = line.strip_prefix("ACTION:") {
            in_key_points = false;
            action_items.extend(current.take());
            current = Some(RawActionItem {
                text: value.trim().to_string(),
                ..Default::default()
            });
        } else if let Some(value) = line.strip_prefix("ASSIGNEE:") {
            if let Some(item) = current.as_mut() {
                item.assignee = Some(value.trim().to_string());
            }
        } else if let Some(value) = line.strip_prefix("DEADLINE:") {
            if let Some(item) = current.as_mut() {
                item.deadline = Some(value.trim().to_string());
            }
        } else if let Some(value) = line.strip_prefix("CONFIDENCE:") {
            if let Some(item) = current.as_mut() {
                item.confidence = Some(value.trim().to_string());
            }
        } else if line == "---" {
            action_items.extend(current.take());
        } else if in_key_points {
            if let Some(point) = line.strip_prefix('-') {
                key_points.push(point.trim().to_string());
            }
        }
    }
    action_items.extend(current.take());

    let action_items = if no_actions {
        Vec::new()
    } else {
        action_items
            .into_iter()
            .filter(|item| !item.text.trim().is_empty())
            .map(RawActionItem::into_action_item)
            .collect()
    };

    (
        EmailSummary {
            summary,
            key_points,
            tone,
        },
        action_items,
    )
}

#[derive(Debug, Deserialize)]
struct AnalysisJson {
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    tone: Option<String>,
    #[serde(default)]
    action_items: Vec<RawActionItem>,
}

impl AnalysisJson {
    fn into_parts(self) -> (EmailSummary, Vec<ActionItem>) {
        let tone = self
            .tone
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TONE.to_string());
        let action_items = self
            .action_items
            .into_iter()
            .filter(|item| !item.text.trim().is_empty())
            .map(RawActionItem::into_action_item)
            .collect();

        (
            EmailSummary {
                summary: self.summary.trim().to_string(),
                key_points: self.key_points,
                tone,
            },
            action_items,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawActionItem {
    #[serde(alias = "task", alias = "title")]
    text: String,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

impl RawActionItem {
    fn into_action_item(self) -> ActionItem {
        let confidence = self
            .confidence
            .as_deref()
            .map(Confidence::parse_lenient)
            .unwrap_or_default();
        ActionItem::new(self.text, self.assignee, self.deadline, confidence)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ModelLength,
    Error,
    ToolCalls,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<PromptUsage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiError),
}

use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GROQ_BASE: &str = "https://api.groq.com/openai/v1";
pub const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";

const SYSTEM_PROMPT: &str = "Ты кинокритик телеграм-канала. Пиши по-русски, живо и без спойлеров.";

/// Источник короткой рецензии.
#[async_trait]
pub trait ReviewProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn review(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Клиент OpenAI-совместимого chat/completions (Groq, OpenRouter).
pub struct ChatProvider {
    name: &'static str,
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatProvider {
    pub fn new(
        name: &'static str,
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            name,
            http: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }
}

/// 429/402 или текст про квоту в ответе: дальше запросы не пройдут.
fn is_quota_exhausted(status: StatusCode, body: &str) -> bool {
    let body = body.to_lowercase();
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::PAYMENT_REQUIRED
        || body.contains("quota")
        || body.contains("insufficient credits")
}

#[async_trait]
impl ReviewProvider for ChatProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn review(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: 0.8,
            max_tokens: 400,
        };
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if is_quota_exhausted(status, &body) {
                return Err(LlmError::QuotaExhausted { provider: self.name });
            }
            return Err(LlmError::Http { provider: self.name, status, body });
        }

        let data: ChatResponse = resp.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::Empty { provider: self.name })
    }
}

/// Промпт рецензии для фильма.
pub fn review_prompt(title: &str, genres: &[String]) -> String {
    let genres = if genres.is_empty() { "не указан".to_string() } else { genres.join(", ") };
    format!(
        "Напиши короткую рецензию (3–4 законченных предложения) на фильм «{title}». Жанр: {genres}. \
         Только текст рецензии, без заголовков и оценок."
    )
}

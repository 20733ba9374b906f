use crate::error::ConfigError;
use std::{str::FromStr, time::Duration};
use teloxide::types::{ChatId, Recipient, UserId};

const DEFAULT_CHANNEL_LINK: &str = "https://t.me/kino_channel";
const DEFAULT_BOT_API_URL: &str = "https://api.telegram.org";

/// Как запускать периодические задачи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Независимые таймеры для автопостинга и обновления кэша.
    Interval,
    /// Последовательный цикл: пост, пауза, обновление кэша при устаревании.
    Loop,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub channel: Recipient,
    pub admin: UserId,
    pub tmdb_api_key: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub openrouter_api_key: String,
    pub openrouter_model: String,
    pub port: u16,
    pub post_interval: Duration,
    pub cache_max_age: Duration,
    pub scheduler: SchedulerMode,
    pub channel_link: String,
    pub excluded_language: String,
    pub excluded_country: String,
    pub http_timeout: Duration,
    /// Адрес Bot API: официальный или свой локальный сервер.
    pub bot_api_url: reqwest::Url,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Читает конфигурацию через произвольный источник (в тестах: HashMap).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &'static str, default: &str| -> String {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let channel = parse_channel(&required("CHANNEL_ID")?)?;
        let admin = UserId(parse("ADMIN_ID", &required("ADMIN_ID")?)?);

        let scheduler = match optional("SCHEDULER_MODE", "interval").to_lowercase().as_str() {
            "interval" => SchedulerMode::Interval,
            "loop" => SchedulerMode::Loop,
            other => {
                return Err(ConfigError::Invalid { name: "SCHEDULER_MODE", value: other.to_string() })
            }
        };

        let bot_api_url = optional("BOT_API_URL", DEFAULT_BOT_API_URL);
        let bot_api_url = reqwest::Url::parse(&bot_api_url)
            .map_err(|_| ConfigError::Invalid { name: "BOT_API_URL", value: bot_api_url.clone() })?;

        Ok(Self {
            bot_token: required("BOT_TOKEN")?,
            channel,
            admin,
            tmdb_api_key: required("TMDB_API_KEY")?,
            groq_api_key: required("GROQ_API_KEY")?,
            groq_model: optional("GROQ_MODEL", "llama-3.3-70b-versatile"),
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            openrouter_model: optional("OPENROUTER_MODEL", "meta-llama/llama-3.3-70b-instruct:free"),
            port: parse("PORT", &optional("PORT", "8080"))?,
            post_interval: Duration::from_secs(
                60 * parse::<u64>("POST_INTERVAL_MINUTES", &optional("POST_INTERVAL_MINUTES", "180"))?,
            ),
            cache_max_age: Duration::from_secs(
                3600 * parse::<u64>("CACHE_REFRESH_HOURS", &optional("CACHE_REFRESH_HOURS", "24"))?,
            ),
            scheduler,
            channel_link: optional("CHANNEL_LINK", DEFAULT_CHANNEL_LINK),
            excluded_language: optional("EXCLUDED_LANGUAGE", "hi"),
            excluded_country: optional("EXCLUDED_COUNTRY", "IN"),
            http_timeout: Duration::from_secs(parse("HTTP_TIMEOUT_SECS", &optional("HTTP_TIMEOUT_SECS", "15"))?),
            bot_api_url,
        })
    }

    pub fn admin_chat(&self) -> ChatId {
        ChatId::from(self.admin)
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value: value.to_string() })
}

/// Канал задаётся либо числовым id (-100…), либо публичным @username.
fn parse_channel(value: &str) -> Result<Recipient, ConfigError> {
    if let Ok(id) = value.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if value.starts_with('@') && value.len() > 1 {
        return Ok(Recipient::ChannelUsername(value.to_string()));
    }
    Err(ConfigError::Invalid { name: "CHANNEL_ID", value: value.to_string() })
}

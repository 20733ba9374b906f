use crate::post::{format_post, Post, CAPTION_LIMIT};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use teloxide::{
    prelude::*,
    types::{ChatId, InputFile, ParseMode, Recipient},
};
use tracing::{error, info, warn};

/// Куда уходят посты.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn publish(&self, post: &Post) -> anyhow::Result<()>;
}

/// Куда уходят служебные оповещения для администратора.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn alert(&self, text: &str);
}

/// Как отправить пост: фото с подписью или обычным сообщением.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<'a> {
    Photo { poster: &'a str },
    Text,
}

/// Фото только при наличии постера и если текст влезает в подпись.
pub fn delivery<'a>(post: &'a Post, text: &str) -> Delivery<'a> {
    match &post.info.poster {
        Some(poster) if text.chars().count() <= CAPTION_LIMIT => Delivery::Photo { poster },
        _ => Delivery::Text,
    }
}

/* ====== Telegram ====== */

#[derive(Clone)]
pub struct TelegramOutlet {
    bot: Bot,
    token: String,
    channel: Recipient,
    channel_link: String,
    admin: ChatId,
    api_base: String,
    http: Client,
}

impl TelegramOutlet {
    pub fn new(
        bot: Bot,
        token: String,
        channel: Recipient,
        channel_link: String,
        admin: ChatId,
        api_base: &reqwest::Url,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; tg-bot/1.0)")
            .build()?;
        let api_base = api_base.as_str().trim_end_matches('/').to_string();
        Ok(Self { bot, token, channel, channel_link, admin, api_base, http })
    }

    /* ====== Загрузка постера байтами (устойчиво к редиректам/CDN) ====== */
    async fn fetch_image(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let resp = self.http.get(url).header(reqwest::header::ACCEPT, "image/*").send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("status {}", resp.status());
        }
        if let Some(ct) = resp.headers().get(reqwest::header::CONTENT_TYPE) {
            let ct = ct.to_str().unwrap_or("");
            if !ct.starts_with("image/") {
                anyhow::bail!("unexpected content-type: {ct}");
            }
        }
        Ok(resp.bytes().await?.to_vec())
    }

    /// Запасной путь оповещения: прямой вызов Bot API без сессии teloxide.
    async fn alert_raw(&self, text: &str) -> anyhow::Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let resp = self
            .http
            .post(url)
            .json(&json!({ "chat_id": self.admin.0, "text": text }))
            .send()
            .await
            .context("raw sendMessage")?;
        if !resp.status().is_success() {
            anyhow::bail!("raw sendMessage status {}", resp.status());
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramOutlet {
    async fn publish(&self, post: &Post) -> anyhow::Result<()> {
        let text = format_post(post, &self.channel_link);

        if let Delivery::Photo { poster } = delivery(post, &text) {
            match self.fetch_image(poster).await {
                Ok(bytes) => {
                    let file = InputFile::memory(bytes).file_name(format!("poster_{}.jpg", post.info.id));
                    self.bot
                        .send_photo(self.channel.clone(), file)
                        .caption(text)
                        .parse_mode(ParseMode::Html)
                        .disable_notification(true)
                        .await?;
                    info!(id = post.info.id, title = %post.info.title, "published with poster");
                    return Ok(());
                }
                Err(e) => warn!(poster = %poster, error = %e, "poster download failed, sending text"),
            }
        }

        self.bot
            .send_message(self.channel.clone(), text)
            .parse_mode(ParseMode::Html)
            .disable_notification(true)
            .await?;
        info!(id = post.info.id, title = %post.info.title, "published as text");
        Ok(())
    }
}

#[async_trait]
impl AdminNotifier for TelegramOutlet {
    async fn alert(&self, text: &str) {
        let Err(e) = self.bot.send_message(self.admin, text).await else {
            return;
        };
        warn!(error = %e, "admin alert via bot failed, trying raw HTTP");
        if let Err(e) = self.alert_raw(text).await {
            error!(error = %e, alert = text, "admin alert lost");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Запоминает всё, что ушло в канал и администратору.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub posts: Mutex<Vec<Post>>,
        pub alerts: Mutex<Vec<String>>,
    }

    impl Recorder {
        pub(crate) fn posts(&self) -> Vec<Post> {
            self.posts.lock().unwrap().clone()
        }

        pub(crate) fn alerts(&self) -> Vec<String> {
            self.alerts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Channel for Recorder {
        async fn publish(&self, post: &Post) -> anyhow::Result<()> {
            self.posts.lock().unwrap().push(post.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl AdminNotifier for Recorder {
        async fn alert(&self, text: &str) {
            self.alerts.lock().unwrap().push(text.to_string());
        }
    }
}

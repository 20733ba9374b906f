use crate::error::LlmError;
use crate::fallback;
use crate::llm::{review_prompt, ReviewProvider};
use crate::outlet::AdminNotifier;
use crate::retry::{retry_with_cap, Step};
use crate::state::{SharedState, Slot};
use crate::text::{first_sentences, is_valid_comment};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PRIMARY_ATTEMPTS: u32 = 2;
pub const SECONDARY_ATTEMPTS: u32 = 1;
pub const COMMENT_SENTENCES: usize = 3;

/// Чем закончился проход по одному провайдеру.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Text(String),
    QuotaExhausted,
    NoValidText,
}

struct Strategy {
    slot: Slot,
    provider: Arc<dyn ReviewProvider>,
    attempts: u32,
}

/// Цепочка: основной провайдер → запасной → статическая таблица.
#[derive(Clone)]
pub struct CommentGenerator {
    chain: Arc<Vec<Strategy>>,
    notifier: Arc<dyn AdminNotifier>,
}

impl CommentGenerator {
    pub fn new(
        primary: Arc<dyn ReviewProvider>,
        secondary: Arc<dyn ReviewProvider>,
        notifier: Arc<dyn AdminNotifier>,
    ) -> Self {
        let chain = vec![
            Strategy { slot: Slot::Primary, provider: primary, attempts: PRIMARY_ATTEMPTS },
            Strategy { slot: Slot::Secondary, provider: secondary, attempts: SECONDARY_ATTEMPTS },
        ];
        Self { chain: Arc::new(chain), notifier }
    }

    /// Короткий комментарий к фильму. `None`: живой провайдер не дал годного текста
    /// или последний провайдер только что исчерпал квоту.
    pub async fn generate(&self, title: &str, genres: &[String], state: &SharedState) -> Option<String> {
        {
            let mut st = state.write().await;
            if st.providers.all_exhausted() {
                let text = fallback::pick(fallback::COMMENTS, genres, &st.recent_comments);
                st.recent_comments.push(text.clone());
                debug!(title, "all providers exhausted, static comment");
                return Some(text);
            }
        }

        let prompt = review_prompt(title, genres);
        for strategy in self.chain.iter() {
            if !state.read().await.providers.is_available(strategy.slot) {
                continue;
            }
            match self.run(strategy, &prompt, state).await {
                Outcome::Text(text) => return Some(text),
                Outcome::NoValidText => {
                    debug!(title, provider = strategy.provider.name(), "no valid comment");
                    return None;
                }
                Outcome::QuotaExhausted => {
                    state.write().await.providers.exhaust(strategy.slot);
                    let name = strategy.provider.name();
                    warn!(provider = name, "quota exhausted, provider disabled");
                    self.notifier
                        .alert(&format!("⚠️ {name}: квота исчерпана, провайдер отключён до перезапуска."))
                        .await;
                }
            }
        }
        None
    }

    async fn run(&self, strategy: &Strategy, prompt: &str, state: &SharedState) -> Outcome {
        retry_with_cap("comment", strategy.attempts, || Outcome::NoValidText, |attempt| async move {
            match strategy.provider.review(prompt).await {
                Ok(text) => {
                    let mut st = state.write().await;
                    if !is_valid_comment(&text, &st.recent_comments) {
                        debug!(provider = strategy.provider.name(), attempt, "comment failed validation");
                        return Ok(Step::Retry);
                    }
                    let short = first_sentences(&text, COMMENT_SENTENCES);
                    st.recent_comments.push(short.clone());
                    info!(provider = strategy.provider.name(), "comment generated");
                    Ok(Step::Done(Outcome::Text(short)))
                }
                Err(LlmError::QuotaExhausted { .. }) => Ok(Step::Done(Outcome::QuotaExhausted)),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

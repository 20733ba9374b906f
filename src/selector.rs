use crate::cache::{apply_refresh, fetch_candidates, Acceptance};
use crate::comment::CommentGenerator;
use crate::fallback;
use crate::metadata::fetch_movie_info;
use crate::post::Post;
use crate::retry::{retry_with_cap, Step};
use crate::state::{RecentWindow, SharedState};
use crate::tmdb::TmdbClient;
use chrono::Utc;
use rand::seq::SliceRandom;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SELECT_ATTEMPTS: u32 = 3;

/// Итог выбора фильма.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Ready(Post),
    /// Оба LLM-провайдера исчерпали квоту: публиковать без комментария нельзя.
    Outage,
}

/// Выбор фильма из кэша с повторами и запасными вариантами.
#[derive(Clone)]
pub struct Selector {
    pub state: SharedState,
    pub tmdb: TmdbClient,
    pub comments: CommentGenerator,
    pub filter: Acceptance,
    pub cache_max_age: Duration,
}

impl Selector {
    /// Никогда не паникует и не возвращает ошибку: либо пост, либо `Outage`.
    pub async fn select(&self) -> Selection {
        if self.state.read().await.providers.all_exhausted() {
            warn!("both comment providers exhausted, selection aborted");
            return Selection::Outage;
        }
        retry_with_cap("select", SELECT_ATTEMPTS, || Selection::Ready(example_post()), |attempt| {
            self.attempt(attempt)
        })
        .await
    }

    async fn attempt(&self, attempt: u32) -> anyhow::Result<Step<Selection>> {
        let stale = self.state.read().await.cache.is_stale(self.cache_max_age);
        if stale {
            self.refresh_cache().await;
        }

        let candidate = {
            let mut st = self.state.write().await;
            if st.cache.is_empty() {
                warn!("cache still empty, using example movie");
                return Ok(Step::Done(Selection::Ready(example_post())));
            }
            let pool = st.cache.unposted_or_recycle();
            pool.choose(&mut rand::thread_rng()).cloned()
        };
        let Some(candidate) = candidate else {
            return Ok(Step::Retry);
        };
        debug!(attempt, id = candidate.id, title = %candidate.title, "candidate chosen");

        let Some(info) = fetch_movie_info(&self.tmdb, &candidate.title, &self.state).await? else {
            debug!(id = candidate.id, "no metadata for candidate");
            return Ok(Step::Retry);
        };
        if info.score_label() == "0.0/10" {
            return Ok(Step::Retry);
        }

        self.state.write().await.cache.mark_posted(candidate.id);

        let comment = self.comments.generate(&info.title, &info.genres, &self.state).await;
        if comment.is_none() && self.state.read().await.providers.all_exhausted() {
            warn!(id = candidate.id, "providers went down during selection");
            return Ok(Step::Done(Selection::Outage));
        }

        info!(id = info.id, title = %info.title, vote = info.vote, with_comment = comment.is_some(), "movie selected");
        Ok(Step::Done(Selection::Ready(Post::new(info, comment))))
    }

    /// Обновляет кэш популярного. Сеть: без блокировки состояния.
    pub async fn refresh_cache(&self) -> bool {
        let fetched = fetch_candidates(&self.tmdb, &self.filter).await;
        let mut st = self.state.write().await;
        let ok = apply_refresh(&mut st.cache, fetched);
        st.stats.last_refresh_at = Some(Utc::now());
        if !ok {
            st.stats.refresh_failures += 1;
        }
        ok
    }
}

/// Пост-заглушка на случай, если все попытки провалились.
pub fn example_post() -> Post {
    let info = fallback::example_movie();
    let comment = fallback::pick(fallback::COMMENTS, &info.genres, &RecentWindow::default());
    Post::new(info, Some(comment))
}

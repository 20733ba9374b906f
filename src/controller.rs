use crate::cache::Candidate;
use crate::outlet::{AdminNotifier, Channel};
use crate::selector::{Selection, Selector};
use crate::state::{ProviderFlags, SharedState};
use chrono::{DateTime, Utc};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    Published { title: String },
    Disabled,
    Outage,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed { count: usize },
    /// TMDB недоступен или пуст: в кэше запасной список.
    Fallback,
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(Candidate),
    AlreadyPresent(Candidate),
    Rejected { title: String, reason: &'static str },
    NotFound,
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub enabled: bool,
    pub cache_size: usize,
    pub posted: usize,
    pub cache_age: Option<Duration>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub refresh_failures: u64,
    pub published: u64,
    pub last_title: Option<String>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub providers: ProviderFlags,
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Задержка пробного запроса к TMDB или текст ошибки.
    pub tmdb: Result<Duration, String>,
    pub providers: ProviderFlags,
    pub enabled: bool,
    pub cache_size: usize,
    pub cache_age: Option<Duration>,
    pub recent_plots: usize,
    pub recent_comments: usize,
}

/// Защищённые действия: публикация, обновление кэша, добавление фильма.
#[derive(Clone)]
pub struct Controller {
    selector: Selector,
    channel: Arc<dyn Channel>,
    notifier: Arc<dyn AdminNotifier>,
    op_lock: Arc<Mutex<()>>,
}

impl Controller {
    pub fn new(selector: Selector, channel: Arc<dyn Channel>, notifier: Arc<dyn AdminNotifier>) -> Self {
        Self { selector, channel, notifier, op_lock: Arc::new(Mutex::new(())) }
    }

    pub fn state(&self) -> &SharedState {
        &self.selector.state
    }

    pub fn cache_max_age(&self) -> Duration {
        self.selector.cache_max_age
    }

    /// Публикация по кнопке администратора.
    pub async fn manual_post(&self) -> PostOutcome {
        self.post().await
    }

    /// Публикация по таймеру. Отказ и сбой не проходят молча: администратор получает оповещение.
    pub async fn scheduled_post(&self) -> PostOutcome {
        let outcome = self.post().await;
        match &outcome {
            PostOutcome::Published { .. } => {}
            PostOutcome::Disabled => {
                self.notifier.alert("⏸ Автопостинг пропущен: бот выключен.").await;
            }
            PostOutcome::Outage => {
                self.notifier
                    .alert("🛑 Автопостинг отменён: оба LLM-провайдера исчерпали квоту.")
                    .await;
            }
            PostOutcome::Failed(e) => {
                self.notifier.alert(&format!("❌ Автопостинг не удался: {e}")).await;
            }
        }
        outcome
    }

    async fn post(&self) -> PostOutcome {
        let _op = self.op_lock.lock().await;
        {
            let st = self.state().read().await;
            if !st.enabled {
                debug!("posting refused: bot disabled");
                return PostOutcome::Disabled;
            }
            if st.providers.all_exhausted() {
                return PostOutcome::Outage;
            }
        }

        let post = match self.selector.select().await {
            Selection::Ready(post) => post,
            Selection::Outage => return PostOutcome::Outage,
        };

        if let Err(e) = self.channel.publish(&post).await {
            warn!(error = %e, id = post.info.id, "publish failed");
            return PostOutcome::Failed(e.to_string());
        }

        let title = post.info.title.clone();
        let mut st = self.state().write().await;
        st.stats.published += 1;
        st.stats.last_title = Some(title.clone());
        st.stats.last_published_at = Some(Utc::now());
        PostOutcome::Published { title }
    }

    /// Плановое обновление кэша: при выключенном боте пропускается, неудача оповещает администратора.
    pub async fn scheduled_refresh(&self) -> RefreshOutcome {
        if !self.state().read().await.enabled {
            debug!("scheduled refresh skipped: bot disabled");
            return RefreshOutcome::Disabled;
        }
        let outcome = self.refresh_now().await;
        if outcome == RefreshOutcome::Fallback {
            self.notifier
                .alert("⚠️ Не удалось обновить кэш популярных фильмов, используется запасной список.")
                .await;
        }
        outcome
    }

    pub async fn refresh_now(&self) -> RefreshOutcome {
        let _op = self.op_lock.lock().await;
        if self.selector.refresh_cache().await {
            RefreshOutcome::Refreshed { count: self.state().read().await.cache.len() }
        } else {
            RefreshOutcome::Fallback
        }
    }

    /// Переключает бота и возвращает новое значение флага.
    pub async fn toggle(&self) -> bool {
        let mut st = self.state().write().await;
        st.enabled = !st.enabled;
        info!(enabled = st.enabled, "bot toggled");
        st.enabled
    }

    pub async fn begin_add(&self) {
        self.state().write().await.awaiting_title = true;
    }

    pub async fn cancel_add(&self) {
        self.state().write().await.awaiting_title = false;
    }

    pub async fn is_awaiting_title(&self) -> bool {
        self.state().read().await.awaiting_title
    }

    /// Второй шаг диалога: название → проверка теми же фильтрами, что и кэш → добавление, если нового нет.
    pub async fn add_movie(&self, title: &str) -> anyhow::Result<AddOutcome> {
        let _op = self.op_lock.lock().await;
        self.state().write().await.awaiting_title = false;

        let tmdb = &self.selector.tmdb;
        let Some(mut found) = tmdb.search(title.trim(), "en-US").await?.into_iter().next() else {
            return Ok(AddOutcome::NotFound);
        };
        if self.state().read().await.cache.contains(found.id) {
            let title = found.title.unwrap_or_default();
            return Ok(AddOutcome::AlreadyPresent(Candidate { id: found.id, title }));
        }
        // в поиске нет страны производства: берём из деталей
        if found.origin_country.is_empty() {
            found.origin_country = tmdb.details(found.id, "en-US").await?.origin_country;
        }
        if let Some(reason) = self.selector.filter.rejection(&found) {
            return Ok(AddOutcome::Rejected { title: found.title.unwrap_or_default(), reason });
        }

        let candidate = Candidate { id: found.id, title: found.title.unwrap_or_default() };
        let mut st = self.state().write().await;
        if st.cache.push(candidate.clone()) {
            info!(id = candidate.id, title = %candidate.title, "movie added to cache");
            Ok(AddOutcome::Added(candidate))
        } else {
            Ok(AddOutcome::AlreadyPresent(candidate))
        }
    }

    pub async fn stats(&self) -> StatsSnapshot {
        let st = self.state().read().await;
        StatsSnapshot {
            enabled: st.enabled,
            cache_size: st.cache.len(),
            posted: st.cache.posted_count(),
            cache_age: st.cache.age(),
            last_refresh_at: st.stats.last_refresh_at,
            refresh_failures: st.stats.refresh_failures,
            published: st.stats.published,
            last_title: st.stats.last_title.clone(),
            last_published_at: st.stats.last_published_at,
            providers: st.providers,
        }
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let started = Instant::now();
        let tmdb = match self.selector.tmdb.popular(1).await {
            Ok(_) => Ok(started.elapsed()),
            Err(e) => Err(e.to_string()),
        };
        let st = self.state().read().await;
        Diagnostics {
            tmdb,
            providers: st.providers,
            enabled: st.enabled,
            cache_size: st.cache.len(),
            cache_age: st.cache.age(),
            recent_plots: st.recent_plots.len(),
            recent_comments: st.recent_comments.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::tests::Scripted;
    use crate::outlet::testing::Recorder;
    use crate::selector::tests::{mount_catalog, reviews, selector};
    use crate::state::{shared, BotState};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn controller(server_uri: &str, state: SharedState, rec: Arc<Recorder>) -> Controller {
        let sel = selector(server_uri, state, Scripted::new("p", reviews(5)), Scripted::new("s", reviews(1)));
        Controller::new(sel, rec.clone(), rec)
    }

    #[tokio::test]
    async fn disabled_bot_refuses_manual_and_scheduled_posts() {
        let rec = Arc::new(Recorder::default());
        let state = shared(BotState::default());
        let ctl = controller("http://127.0.0.1:9", state, rec.clone());

        assert!(!ctl.toggle().await);
        assert_eq!(ctl.manual_post().await, PostOutcome::Disabled);
        assert_eq!(ctl.scheduled_post().await, PostOutcome::Disabled);
        assert_eq!(ctl.scheduled_refresh().await, RefreshOutcome::Disabled);
        assert!(rec.posts().is_empty());
        assert_eq!(rec.alerts().len(), 1);
        assert!(rec.alerts()[0].contains("выключен"));
    }

    #[tokio::test]
    async fn outage_is_reported_not_posted() {
        let rec = Arc::new(Recorder::default());
        let mut st = BotState::default();
        st.providers = ProviderFlags { primary: false, secondary: false };
        let ctl = controller("http://127.0.0.1:9", shared(st), rec.clone());

        assert_eq!(ctl.manual_post().await, PostOutcome::Outage);
        assert_eq!(ctl.scheduled_post().await, PostOutcome::Outage);
        assert!(rec.posts().is_empty());
        assert_eq!(rec.alerts().len(), 1);
    }

    #[tokio::test]
    async fn publishes_and_counts() {
        let server = MockServer::start().await;
        let candidates = mount_catalog(&server, &[41]).await;
        let rec = Arc::new(Recorder::default());
        let state = shared(BotState::default());
        state.write().await.cache.replace(candidates);
        let ctl = controller(&server.uri(), state, rec.clone());

        let outcome = ctl.scheduled_post().await;
        assert!(matches!(outcome, PostOutcome::Published { .. }));
        assert_eq!(rec.posts().len(), 1);
        assert_eq!(rec.posts()[0].info.id, 41);
        assert!(rec.alerts().is_empty());

        let stats = ctl.stats().await;
        assert_eq!(stats.published, 1);
        assert_eq!(stats.posted, 1);
        assert!(stats.last_title.is_some());
    }

    async fn mount_search(server: &MockServer, query: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("query", query))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn add_movie_flow() {
        let server = MockServer::start().await;
        let good = json!({"results": [{
            "id": 603, "title": "The Matrix", "original_language": "en",
            "origin_country": ["US"], "vote_average": 8.2, "poster_path": "/m.jpg"
        }]});
        mount_search(&server, "The Matrix", good).await;
        mount_search(&server, "Bad Movie", json!({"results": [{
            "id": 700, "title": "Bad Movie", "original_language": "en",
            "origin_country": ["US"], "vote_average": 3.0, "poster_path": "/b.jpg"
        }]}))
        .await;
        mount_search(&server, "Nope", json!({"results": []})).await;

        let rec = Arc::new(Recorder::default());
        let state = shared(BotState::default());
        state.write().await.cache.replace(vec![Candidate { id: 1, title: "One".into() }]);
        let ctl = controller(&server.uri(), state.clone(), rec);

        ctl.begin_add().await;
        assert!(ctl.is_awaiting_title().await);
        let added = ctl.add_movie("The Matrix").await.unwrap();
        assert!(matches!(added, AddOutcome::Added(ref c) if c.id == 603));
        assert!(!ctl.is_awaiting_title().await);
        assert_eq!(state.read().await.cache.len(), 2);

        let again = ctl.add_movie("The Matrix").await.unwrap();
        assert!(matches!(again, AddOutcome::AlreadyPresent(ref c) if c.id == 603));
        assert_eq!(state.read().await.cache.len(), 2);

        let bad = ctl.add_movie("Bad Movie").await.unwrap();
        assert!(matches!(bad, AddOutcome::Rejected { .. }));
        assert_eq!(ctl.add_movie("Nope").await.unwrap(), AddOutcome::NotFound);
        assert_eq!(state.read().await.cache.len(), 2);
    }

    #[tokio::test]
    async fn cached_movie_is_reported_present_before_filtering() {
        let server = MockServer::start().await;
        mount_search(&server, "Old Hit", json!({"results": [{
            "id": 700, "title": "Old Hit", "original_language": "en", "vote_average": 3.0
        }]}))
        .await;
        Mock::given(method("GET"))
            .and(path("/movie/700"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let rec = Arc::new(Recorder::default());
        let state = shared(BotState::default());
        state.write().await.cache.replace(vec![Candidate { id: 700, title: "Old Hit".into() }]);
        let ctl = controller(&server.uri(), state.clone(), rec);

        let outcome = ctl.add_movie("Old Hit").await.unwrap();
        assert!(matches!(outcome, AddOutcome::AlreadyPresent(ref c) if c.id == 700));
        assert_eq!(state.read().await.cache.len(), 1);
    }

    #[tokio::test]
    async fn cancel_clears_pending_dialogue() {
        let rec = Arc::new(Recorder::default());
        let ctl = controller("http://127.0.0.1:9", shared(BotState::default()), rec);
        ctl.begin_add().await;
        ctl.cancel_add().await;
        assert!(!ctl.is_awaiting_title().await);
    }

    #[tokio::test]
    async fn failed_scheduled_refresh_alerts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/popular"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let rec = Arc::new(Recorder::default());
        let state = shared(BotState::default());
        let ctl = controller(&server.uri(), state.clone(), rec.clone());

        assert_eq!(ctl.scheduled_refresh().await, RefreshOutcome::Fallback);
        assert_eq!(rec.alerts().len(), 1);
        assert_eq!(state.read().await.cache.len(), 2);

        let diag = ctl.diagnostics().await;
        assert!(diag.tmdb.is_err());
        assert_eq!(diag.cache_size, 2);
    }
}

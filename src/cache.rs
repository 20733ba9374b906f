use crate::fallback;
use crate::tmdb::{MovieSummary, TmdbClient};
use std::{
    collections::HashSet,
    time::{Duration, Instant},
};
use tracing::{info, warn};

pub const MAX_CANDIDATES: usize = 100;
pub const MAX_PAGES: u32 = 5;
pub const MIN_VOTE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: u64,
    pub title: String,
}

/// Список кандидатов из популярного + множество уже опубликованных id.
#[derive(Debug, Default)]
pub struct PopularityCache {
    candidates: Vec<Candidate>,
    posted: HashSet<u64>,
    refreshed_at: Option<Instant>,
}

impl PopularityCache {
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn posted_count(&self) -> usize {
        self.posted.len()
    }

    pub fn is_posted(&self, id: u64) -> bool {
        self.posted.contains(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.candidates.iter().any(|c| c.id == id)
    }

    pub fn age(&self) -> Option<Duration> {
        self.refreshed_at.map(|t| t.elapsed())
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.is_empty() || self.age().map_or(true, |age| age > max_age)
    }

    /// Заменяет список и ставит отметку времени. Из posted остаются только id нового списка.
    pub fn replace(&mut self, candidates: Vec<Candidate>) {
        let ids: HashSet<u64> = candidates.iter().map(|c| c.id).collect();
        self.posted.retain(|id| ids.contains(id));
        self.candidates = candidates;
        self.refreshed_at = Some(Instant::now());
    }

    /// Добавляет кандидата, если его ещё нет. Возвращает `false` для дубликата.
    pub fn push(&mut self, candidate: Candidate) -> bool {
        if self.contains(candidate.id) {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    /// Неопубликованные кандидаты; если все уже были: posted очищается и возвращается весь список.
    pub fn unposted_or_recycle(&mut self) -> Vec<Candidate> {
        let fresh: Vec<Candidate> =
            self.candidates.iter().filter(|c| !self.posted.contains(&c.id)).cloned().collect();
        if !fresh.is_empty() {
            return fresh;
        }
        info!(total = self.candidates.len(), "all candidates posted, recycling");
        self.posted.clear();
        self.candidates.clone()
    }

    pub fn mark_posted(&mut self, id: u64) {
        if self.contains(id) {
            self.posted.insert(id);
        }
    }
}

/// Фильтр допустимости для кэша и для ручного добавления.
#[derive(Debug, Clone)]
pub struct Acceptance {
    pub excluded_language: String,
    pub excluded_country: String,
}

impl Acceptance {
    pub fn accepts(&self, m: &MovieSummary) -> bool {
        self.rejection(m).is_none()
    }

    /// Причина отказа, если фильм не проходит фильтр.
    pub fn rejection(&self, m: &MovieSummary) -> Option<&'static str> {
        if m.id == 0 || m.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Some("нет названия или id");
        }
        if m.original_language.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(&self.excluded_language)) {
            return Some("исключённый язык оригинала");
        }
        if m.origin_country.iter().any(|c| c.eq_ignore_ascii_case(&self.excluded_country)) {
            return Some("исключённая страна производства");
        }
        if m.vote_average < MIN_VOTE {
            return Some("рейтинг ниже 5.0");
        }
        if m.poster_path.as_deref().map_or(true, str::is_empty) {
            return Some("нет постера");
        }
        None
    }
}

/// Собирает до 100 подходящих фильмов с первых 5 страниц популярного.
pub async fn fetch_candidates(tmdb: &TmdbClient, filter: &Acceptance) -> anyhow::Result<Vec<Candidate>> {
    let mut out: Vec<Candidate> = Vec::new();
    for page in 1..=MAX_PAGES {
        let data = tmdb.popular(page).await?;
        for m in data.results.iter().filter(|m| filter.accepts(m)) {
            if out.len() >= MAX_CANDIDATES {
                break;
            }
            if out.iter().any(|c| c.id == m.id) {
                continue;
            }
            if let Some(title) = &m.title {
                out.push(Candidate { id: m.id, title: title.trim().to_string() });
            }
        }
        // total_pages может не прийти (0): тогда конец списка определяем по пустой странице
        let last_page = data.total_pages != 0 && page >= data.total_pages;
        if out.len() >= MAX_CANDIDATES || last_page || data.results.is_empty() {
            break;
        }
    }
    Ok(out)
}

/// Применяет результат загрузки к кэшу. При ошибке или пустом списке ставит
/// запасной список из двух фильмов и всё равно отмечает время обновления.
pub fn apply_refresh(cache: &mut PopularityCache, fetched: anyhow::Result<Vec<Candidate>>) -> bool {
    match fetched {
        Ok(list) if !list.is_empty() => {
            info!(count = list.len(), "popularity cache refreshed");
            cache.replace(list);
            true
        }
        Ok(_) => {
            warn!("no acceptable movies in popular listing, using hardcoded cache");
            cache.replace(fallback::hardcoded_candidates());
            false
        }
        Err(e) => {
            warn!(error = %e, "cache refresh failed, using hardcoded cache");
            cache.replace(fallback::hardcoded_candidates());
            false
        }
    }
}

use crate::cache::MIN_VOTE;
use crate::error::TmdbError;
use crate::fallback;
use crate::state::SharedState;
use crate::text::{has_cyrillic, is_valid_plot};
use crate::tmdb::{poster_url, TmdbClient};
use tracing::{debug, warn};

/// Язык описаний и жанров в посте.
pub const LOCALE: &str = "ru-RU";
pub const MAX_GENRES: usize = 3;

/// Всё, что нужно для одного поста.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieInfo {
    pub id: u64,
    pub title: String,
    pub year: Option<String>,
    pub plot: Option<String>,
    pub vote: f64,
    pub trailer: Option<String>,
    pub poster: Option<String>,
    pub genres: Vec<String>,
}

impl MovieInfo {
    pub fn score_label(&self) -> String {
        format!("{:.1}/10", self.vote)
    }
}

/// Собирает данные о фильме по названию. `Ok(None)`: фильм не найден или рейтинг ниже 5.0.
pub async fn fetch_movie_info(
    tmdb: &TmdbClient,
    title: &str,
    state: &SharedState,
) -> Result<Option<MovieInfo>, TmdbError> {
    let english = tmdb.search(title, "en-US").await?;
    let Some(found) = english.into_iter().next() else {
        debug!(title, "no search results");
        return Ok(None);
    };

    // чужой результат русского поиска не подходит: тогда название и описание берутся из деталей
    let localized = tmdb.search(title, LOCALE).await?.into_iter().find(|m| m.id == found.id);

    let details = tmdb.details(found.id, LOCALE).await?;
    if details.vote_average < MIN_VOTE {
        debug!(title, vote = details.vote_average, "vote below threshold");
        return Ok(None);
    }

    let trailer = tmdb.first_trailer(found.id).await.unwrap_or_else(|e| {
        warn!(id = found.id, error = %e, "trailer lookup failed");
        None
    });

    let genres: Vec<String> = details.genres.iter().take(MAX_GENRES).map(|g| g.name.clone()).collect();

    let localized_title = localized.as_ref().and_then(|m| m.title.clone()).or(details.title.clone());
    let display_title = localized_title.or(found.title.clone()).unwrap_or_else(|| title.to_string());

    let year = localized
        .as_ref()
        .and_then(|m| m.release_date.clone())
        .or(details.release_date.clone())
        .and_then(|d| d.get(..4).map(str::to_string));

    let candidate_plot = localized
        .as_ref()
        .and_then(|m| m.overview.clone())
        .filter(|p| !p.trim().is_empty())
        .or(details.overview.clone())
        .unwrap_or_default();

    let plot = {
        let mut st = state.write().await;
        let plot = if !candidate_plot.trim().is_empty()
            && has_cyrillic(&candidate_plot)
            && is_valid_plot(&candidate_plot, &st.recent_plots)
        {
            candidate_plot.trim().to_string()
        } else {
            debug!(title, "localized synopsis rejected, using fallback");
            fallback::pick(fallback::PLOTS, &genres, &st.recent_plots)
        };
        st.recent_plots.push(plot.clone());
        plot
    };

    let poster = details.poster_path.clone().or(found.poster_path.clone()).map(|p| poster_url(&p));

    Ok(Some(MovieInfo {
        id: found.id,
        title: display_title,
        year,
        plot: Some(plot),
        vote: details.vote_average,
        trailer,
        poster,
        genres,
    }))
}

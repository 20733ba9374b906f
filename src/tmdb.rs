use crate::error::TmdbError;
use moka::future::Cache;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

const API_BASE: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    http: Client,
    searches: Cache<(String, String), Vec<MovieSummary>>,
}

impl TmdbClient {
    pub fn new(api_key: String, timeout: Duration) -> reqwest::Result<Self> {
        Self::with_base_url(api_key, API_BASE, timeout)
    }

    /// Клиент с произвольным адресом API (в тестах: wiremock).
    pub fn with_base_url(api_key: String, base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let searches = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(3600))
            .build();
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            searches,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, TmdbError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self.http.get(url).bearer_auth(&self.api_key).send().await?;
        if !resp.status().is_success() {
            return Err(TmdbError::Http(resp.status()));
        }
        Ok(resp.json().await?)
    }

    /// Страница списка популярных фильмов (EN).
    pub async fn popular(&self, page: u32) -> Result<PopularPage, TmdbError> {
        self.get_json(&format!("/movie/popular?language=en-US&page={page}")).await
    }

    /// Поиск по названию; результаты кэшируются на час по паре (запрос, язык).
    pub async fn search(&self, query: &str, language: &str) -> Result<Vec<MovieSummary>, TmdbError> {
        let key = (query.to_lowercase(), language.to_string());
        if let Some(hit) = self.searches.get(&key).await {
            return Ok(hit);
        }
        let data: SearchResp = self
            .get_json(&format!(
                "/search/movie?query={}&language={}&include_adult=false&page=1",
                urlencoding::encode(query),
                language
            ))
            .await?;
        self.searches.insert(key, data.results.clone()).await;
        Ok(data.results)
    }

    pub async fn details(&self, id: u64, language: &str) -> Result<MovieDetails, TmdbError> {
        self.get_json(&format!("/movie/{id}?language={language}")).await
    }

    /// Видео фильма; `None`: язык по умолчанию.
    pub async fn videos(&self, id: u64, language: Option<&str>) -> Result<Vec<Video>, TmdbError> {
        let path = match language {
            Some(lang) => format!("/movie/{id}/videos?language={lang}"),
            None => format!("/movie/{id}/videos"),
        };
        let data: VideosResp = self.get_json(&path).await?;
        Ok(data.results)
    }

    /// Первый трейлер с YouTube: сначала язык по умолчанию, затем en-US.
    pub async fn first_trailer(&self, id: u64) -> Result<Option<String>, TmdbError> {
        for lang in [None, Some("en-US")] {
            let videos = self.videos(id, lang).await?;
            if let Some(v) = videos.iter().find(|v| v.r#type == "Trailer" && v.site == "YouTube") {
                return Ok(Some(format!("https://www.youtube.com/watch?v={}", v.key)));
            }
        }
        Ok(None)
    }
}

pub fn poster_url(path: &str) -> String {
    format!("{IMAGE_BASE}{path}")
}

/* ======= DTOs ======= */

#[derive(Deserialize, Debug)]
pub struct PopularPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub results: Vec<MovieSummary>,
}

#[derive(Deserialize, Debug)]
struct SearchResp {
    #[serde(default)]
    results: Vec<MovieSummary>,
}

/// Элемент списка популярных или результата поиска.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct MovieSummary {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub origin_country: Vec<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MovieDetails {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub origin_country: Vec<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Genre {
    pub name: String,
}

#[derive(Deserialize, Debug)]
struct VideosResp {
    #[serde(default)]
    results: Vec<Video>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Video {
    pub key: String,
    pub site: String,
    pub r#type: String,
}

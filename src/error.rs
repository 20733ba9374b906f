use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("переменная окружения {0} не задана")]
    Missing(&'static str),
    #[error("переменная окружения {name} имеет неверное значение: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("TMDB ответил статусом {0}")]
    Http(reqwest::StatusCode),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum LlmError {
    /// Квота провайдера исчерпана: до перезапуска процесса запросы бессмысленны.
    #[error("{provider}: квота исчерпана")]
    QuotaExhausted { provider: &'static str },
    #[error("{provider}: статус {status}: {body}")]
    Http {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{provider}: пустой ответ")]
    Empty { provider: &'static str },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

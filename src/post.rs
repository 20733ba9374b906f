use crate::metadata::MovieInfo;

pub const CAPTION_LIMIT: usize = 1024;
const DEFAULT_TAG: &str = "#кино";
const YOUTUBE_WATCH: &str = "https://www.youtube.com/watch?v=";

/// Готовый к публикации пост.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub info: MovieInfo,
    pub comment: Option<String>,
    pub stars: u8,
    pub special: bool,
}

impl Post {
    pub fn new(info: MovieInfo, comment: Option<String>) -> Self {
        let stars = star_rating(info.vote);
        let special = is_special(info.vote);
        Self { info, comment, stars, special }
    }
}

/// Звёзды по оценке TMDB: выше 9.0 → 5, 8.0+ → 4, 6.5+ → 3, 5.0+ → 2, иначе 1.
/// Ровно 9.0: ещё четыре звезды.
pub fn star_rating(vote: f64) -> u8 {
    match vote {
        v if v > 9.0 => 5,
        v if v >= 8.0 => 4,
        v if v >= 6.5 => 3,
        v if v >= 5.0 => 2,
        _ => 1,
    }
}

/// Корона для исключительно высоких оценок.
pub fn is_special(vote: f64) -> bool {
    vote >= 9.5
}

fn is_youtube_link(url: &str) -> bool {
    url.strip_prefix(YOUTUBE_WATCH)
        .is_some_and(|key| !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
}

fn hashtag(genre: &str) -> String {
    let tag: String = genre
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("#{tag}")
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Текст поста в HTML. Отсутствующие поля просто не выводятся.
pub fn format_post(post: &Post, channel_link: &str) -> String {
    let info = &post.info;
    let mut lines: Vec<String> = Vec::new();

    let badge = if post.special { "👑 " } else { "" };
    lines.push(format!("{badge}🎬 <b>{}</b>", html_escape(&info.title)));
    if let Some(year) = &info.year {
        lines.push(format!("📅 {}", html_escape(year)));
    }
    if let Some(plot) = info.plot.as_deref().filter(|p| !p.trim().is_empty()) {
        lines.push(String::new());
        lines.push(html_escape(plot.trim()));
    }
    lines.push(String::new());
    lines.push(format!("⭐ TMDB: {}", info.score_label()));
    if let Some(url) = info.trailer.as_deref().filter(|u| is_youtube_link(u)) {
        lines.push(format!("▶️ <a href=\"{url}\">Трейлер</a>"));
    }
    if let Some(comment) = post.comment.as_deref().filter(|c| !c.trim().is_empty()) {
        lines.push(String::new());
        lines.push(format!("💬 <i>{}</i>", html_escape(comment.trim())));
    }
    lines.push(String::new());
    let stars = usize::from(post.stars.min(5));
    lines.push(format!("Наша оценка: {}{}", "★".repeat(stars), "☆".repeat(5 - stars)));

    let tags: Vec<String> = info.genres.iter().filter(|g| !g.trim().is_empty()).map(|g| hashtag(g)).collect();
    lines.push(if tags.is_empty() { DEFAULT_TAG.to_string() } else { tags.join(" ") });

    lines.push(String::new());
    lines.push(format!("<a href=\"{}\">Подписаться на канал</a>", html_escape(channel_link)));
    lines.join("\n")
}

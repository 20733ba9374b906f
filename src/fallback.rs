//! Статические подстановки: описания и комментарии по жанрам, запасной кэш и фильм-пример.

use crate::cache::Candidate;
use crate::metadata::MovieInfo;
use crate::state::RecentWindow;
use rand::seq::SliceRandom;

type Table = &'static [(&'static str, &'static [&'static str])];

const DEFAULT_GENRE: &str = "*";

pub static PLOTS: Table = &[
    ("драма", &[
        "История о людях, которым приходится делать трудный выбор. Каждое решение меняет их жизнь навсегда.",
        "Герои сталкиваются с прошлым, от которого долго убегали. Им предстоит понять, что действительно важно.",
    ]),
    ("комедия", &[
        "Череда нелепых случайностей превращает обычный день в настоящее приключение. Смеяться придётся часто.",
        "Неудачливый герой ввязывается в авантюру, которая выходит из-под контроля. Всё идёт не по плану.",
    ]),
    ("боевик", &[
        "Опытный профессионал вынужден вернуться к прежнему ремеслу. На кону оказывается слишком многое.",
        "Погони, перестрелки и бескомпромиссный герой против целой преступной сети. Отступать некуда.",
    ]),
    ("ужасы", &[
        "В тихом месте начинают происходить необъяснимые события. Героям придётся узнать, что скрывает темнота.",
    ]),
    ("фантастика", &[
        "Будущее оказывается совсем не таким, каким его представляли. Горстка людей пытается изменить ход событий.",
    ]),
    ("триллер", &[
        "Случайная находка втягивает героя в опасную игру. Доверять нельзя никому, даже самым близким.",
    ]),
    ("мультфильм", &[
        "Яркое приключение о дружбе и смелости. Маленьким героям предстоит большое путешествие.",
    ]),
    (DEFAULT_GENRE, &[
        "Захватывающая история, которая не отпускает до финальных титров. Подробности лучше узнать самому.",
        "Фильм, о котором спорят зрители и критики. Самое время составить собственное мнение.",
    ]),
];

pub static COMMENTS: Table = &[
    ("драма", &[
        "Сильная драма, которая держится на актёрской игре. Эмоции здесь настоящие, без дешёвых приёмов. После просмотра хочется помолчать и подумать.",
    ]),
    ("комедия", &[
        "Лёгкая комедия с точным чувством ритма. Шутки работают, даже когда сюжет предсказуем. Отличный выбор для спокойного вечера.",
    ]),
    ("боевик", &[
        "Энергичный боевик с внятно поставленными сценами. Сюжет прост, зато динамика не проседает ни на минуту. Идеально, когда хочется адреналина.",
    ]),
    ("ужасы", &[
        "Атмосферный хоррор, который пугает не скримерами, а ожиданием. Звук и свет работают на напряжение. Смотреть лучше не в одиночку.",
    ]),
    ("фантастика", &[
        "Фантастика с интересной идеей и продуманным миром. Визуал впечатляет, но главное здесь вопросы, которые фильм задаёт. Стоит внимания любителей жанра.",
    ]),
    (DEFAULT_GENRE, &[
        "Фильм, который заслуживает своего зрителя. У него есть узнаваемая интонация и крепкая режиссура. Рекомендуем составить собственное мнение.",
        "Добротное кино без лишних претензий. Оно честно выполняет то, что обещает. Хороший вариант для вечернего просмотра.",
    ]),
];

/// Подбирает текст по первому подходящему жанру, стараясь не повторять недавние.
pub fn pick(table: Table, genres: &[String], recent: &RecentWindow) -> String {
    let pool = genres
        .iter()
        .find_map(|g| {
            let g = g.to_lowercase();
            table.iter().find(|(name, _)| *name == g)
        })
        .or_else(|| table.iter().find(|(name, _)| *name == DEFAULT_GENRE))
        .map(|(_, texts)| *texts)
        .unwrap_or(&[]);

    let fresh: Vec<&str> = pool.iter().copied().filter(|t| !recent.contains(t)).collect();
    let mut rng = rand::thread_rng();
    let chosen = if fresh.is_empty() { pool.choose(&mut rng).copied() } else { fresh.choose(&mut rng).copied() };
    chosen.unwrap_or_default().to_string()
}

/// Кэш на случай, когда TMDB недоступен.
pub fn hardcoded_candidates() -> Vec<Candidate> {
    vec![
        Candidate { id: 278, title: "The Shawshank Redemption".into() },
        Candidate { id: 238, title: "The Godfather".into() },
    ]
}

/// Фильм, который публикуется, если все попытки выбора провалились.
pub fn example_movie() -> MovieInfo {
    MovieInfo {
        id: 278,
        title: "Побег из Шоушенка".into(),
        year: Some("1994".into()),
        plot: Some(
            "Банкир Энди Дюфрейн осуждён за убийство жены и её любовника. В тюрьме Шоушенк он находит друга и не теряет надежды."
                .into(),
        ),
        vote: 8.7,
        trailer: None,
        poster: None,
        genres: vec!["Драма".into(), "Криминал".into()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_by_genre_and_avoids_recent() {
        let genres = vec!["Драма".to_string()];
        let drama = PLOTS.iter().find(|(g, _)| *g == "драма").unwrap().1;

        let mut recent = RecentWindow::default();
        recent.push(drama[0].to_string());
        for _ in 0..20 {
            assert_eq!(pick(PLOTS, &genres, &recent), drama[1]);
        }
    }

    #[test]
    fn unknown_genre_uses_default_pool() {
        let text = pick(COMMENTS, &["Вестерн".to_string()], &RecentWindow::default());
        let default = COMMENTS.iter().find(|(g, _)| *g == DEFAULT_GENRE).unwrap().1;
        assert!(default.contains(&text.as_str()));
    }

    #[test]
    fn exhausted_pool_still_returns_text() {
        let comedy = COMMENTS.iter().find(|(g, _)| *g == "комедия").unwrap().1;
        let mut recent = RecentWindow::default();
        recent.push(comedy[0].to_string());
        assert_eq!(pick(COMMENTS, &["Комедия".to_string()], &recent), comedy[0]);
    }

    #[test]
    fn hardcoded_cache_has_two_entries() {
        let list = hardcoded_candidates();
        assert_eq!(list.len(), 2);
        assert_ne!(list[0].id, list[1].id);
    }
}

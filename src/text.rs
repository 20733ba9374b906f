//! Эвристики проверки текста: алфавит, предложения, количество слов.

use crate::state::RecentWindow;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Предложение: непустой фрагмент, оканчивающийся на . ! ? или многоточие.
static SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?…]*[^\s.!?…][^.!?…]*[.!?…]+").expect("valid sentence regex"));

pub fn has_cyrillic(s: &str) -> bool {
    s.chars().any(|c| matches!(c, '\u{0400}'..='\u{04FF}'))
}

pub fn word_count(s: &str) -> usize {
    s.unicode_words().count()
}

/// Законченные предложения, в которых есть хотя бы одно слово.
pub fn sentences(s: &str) -> Vec<String> {
    SENTENCE
        .find_iter(s)
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| word_count(t) > 0)
        .collect()
}

/// Описание годится, если в нём ≥5 слов, есть законченное предложение и оно не повторяет недавнее.
pub fn is_valid_plot(plot: &str, recent: &RecentWindow) -> bool {
    let plot = plot.trim();
    word_count(plot) >= 5 && !sentences(plot).is_empty() && !recent.contains(plot)
}

/// Комментарий: ≥3 предложения, кириллица, >15 слов, не повтор (в том числе после обрезки до 3 предложений).
pub fn is_valid_comment(text: &str, recent: &RecentWindow) -> bool {
    let text = text.trim();
    sentences(text).len() >= 3
        && has_cyrillic(text)
        && word_count(text) > 15
        && !recent.contains(text)
        && !recent.contains(&first_sentences(text, 3))
}

/// Первые `n` предложений, склеенные через пробел.
pub fn first_sentences(text: &str, n: usize) -> String {
    sentences(text).into_iter().take(n).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEW: &str = "Фильм держит в напряжении до самого финала. Актёры играют честно и без фальши! \
        Режиссёр не боится долгих пауз? Музыка работает на атмосферу.";

    #[test]
    fn detects_cyrillic() {
        assert!(has_cyrillic("Кино"));
        assert!(!has_cyrillic("Movie night"));
    }

    #[test]
    fn splits_sentences_and_ignores_bare_punctuation() {
        let parts = sentences("Один. Два! ... Три? хвост без точки");
        assert_eq!(parts, vec!["Один.", "Два!", "Три?"]);
        assert!(sentences("без точки").is_empty());
    }

    #[test]
    fn plot_rules() {
        let recent = RecentWindow::default();
        assert!(is_valid_plot("Молодой детектив расследует странное убийство.", &recent));
        assert!(!is_valid_plot("Слишком коротко.", &recent));
        assert!(!is_valid_plot("Пять слов и нет точки вообще", &recent));

        let mut recent = RecentWindow::default();
        recent.push("Молодой детектив расследует странное убийство.".into());
        assert!(!is_valid_plot("Молодой детектив расследует странное убийство.", &recent));
    }

    #[test]
    fn comment_rules() {
        let recent = RecentWindow::default();
        assert!(is_valid_comment(REVIEW, &recent));
        assert!(!is_valid_comment("Хорошо. Отлично. Супер.", &recent));
        assert!(!is_valid_comment(
            "The film keeps you tense until the very end. The cast is honest. The director is patient with long pauses.",
            &recent
        ));
    }

    #[test]
    fn truncated_duplicate_is_rejected() {
        let mut recent = RecentWindow::default();
        recent.push(first_sentences(REVIEW, 3));
        assert!(!is_valid_comment(REVIEW, &recent));
    }

    #[test]
    fn truncates_to_first_three_sentences() {
        assert_eq!(
            first_sentences(REVIEW, 3),
            "Фильм держит в напряжении до самого финала. Актёры играют честно и без фальши! Режиссёр не боится долгих пауз?"
        );
    }
}

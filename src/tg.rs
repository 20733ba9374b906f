use crate::controller::{AddOutcome, Controller, Diagnostics, PostOutcome, RefreshOutcome, StatsSnapshot};
use crate::post::html_escape;
use crate::state::ProviderFlags;
use chrono::{DateTime, Utc};
use std::time::Duration;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    prelude::*,
    types::{CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, UserId},
    utils::command::BotCommands,
};
use tracing::{debug, warn};

/* ====== Команды ====== */
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды администратора:")]
enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "главное меню")]
    Menu,
    #[command(description = "отменить добавление фильма")]
    Cancel,
    #[command(description = "помощь")]
    Help,
}

pub async fn run(bot: Bot, controller: Controller, admin: UserId) {
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint({
                    let controller = controller.clone();
                    move |bot: Bot, msg: Message, cmd: Command| {
                        let controller = controller.clone();
                        async move { on_command(bot, msg, cmd, &controller, admin).await }
                    }
                }))
                .branch({
                    let controller = controller.clone();
                    dptree::endpoint(move |bot: Bot, msg: Message| {
                        let controller = controller.clone();
                        async move { on_text(bot, msg, &controller, admin).await }
                    })
                }),
        )
        .branch(Update::filter_callback_query().endpoint({
            let controller = controller.clone();
            move |bot: Bot, q: CallbackQuery| {
                let controller = controller.clone();
                async move { on_callback(bot, q, &controller, admin).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn is_admin(msg: &Message, admin: UserId) -> bool {
    msg.from.as_ref().is_some_and(|u| u.id == admin)
}

async fn on_command(bot: Bot, msg: Message, cmd: Command, controller: &Controller, admin: UserId) -> ResponseResult<()> {
    if !is_admin(&msg, admin) {
        bot.send_message(msg.chat.id, "Бот управляется только администратором канала.").await?;
        return Ok(());
    }
    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Cancel => {
            controller.cancel_add().await;
            send_menu(&bot, msg.chat.id, "Добавление отменено.", controller).await?;
        }
        Command::Start | Command::Menu => {
            // новое меню обрывает незаконченный диалог добавления
            controller.cancel_add().await;
            send_menu(&bot, msg.chat.id, "", controller).await?;
        }
    }
    Ok(())
}

/* ====== Свободный текст: второй шаг добавления фильма ====== */
async fn on_text(bot: Bot, msg: Message, controller: &Controller, admin: UserId) -> ResponseResult<()> {
    if !is_admin(&msg, admin) {
        return Ok(());
    }
    let Some(title) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else { return Ok(()) };
    if !controller.is_awaiting_title().await {
        bot.send_message(msg.chat.id, "Открой меню командой /menu.").await?;
        return Ok(());
    }

    let notice = match controller.add_movie(title).await {
        Ok(outcome) => render_add_outcome(&outcome),
        Err(e) => {
            warn!(error = %e, title, "add movie failed");
            format!("❌ Ошибка при добавлении: {}", html_escape(&e.to_string()))
        }
    };
    send_menu(&bot, msg.chat.id, &notice, controller).await
}

/* ====== Кнопки меню ======
   menu:post   : опубликовать сейчас
   menu:refresh: обновить кэш
   menu:diag   : диагностика
   menu:stats  : статистика
   menu:add    : добавить фильм (ждём название)
   menu:toggle : включить/выключить
   menu:cancel : отменить добавление
   menu:home   : вернуться в меню
*/
async fn on_callback(bot: Bot, q: CallbackQuery, controller: &Controller, admin: UserId) -> ResponseResult<()> {
    if q.from.id != admin {
        answer_cb(&bot, &q, "Нет доступа").await?;
        return Ok(());
    }
    let Some(data) = q.data.clone() else { return Ok(()) };
    let Some((chat_id, message_id)) = q.message.as_ref().map(|m| (m.chat().id, m.id())) else {
        return Ok(());
    };
    let action = data.strip_prefix("menu:").unwrap_or("");
    answer_cb(&bot, &q, "").await?;
    debug!(action, "menu action");

    let notice = match action {
        "post" => {
            edit_plain(&bot, chat_id, message_id, "⏳ Выбираю фильм и готовлю пост…").await;
            render_post_outcome(&controller.manual_post().await)
        }
        "refresh" => {
            edit_plain(&bot, chat_id, message_id, "⏳ Обновляю кэш популярных фильмов…").await;
            render_refresh_outcome(&controller.refresh_now().await)
        }
        "diag" => render_diagnostics(&controller.diagnostics().await),
        "stats" => render_stats(&controller.stats().await),
        "toggle" => {
            if controller.toggle().await {
                "▶️ Бот включён.".to_string()
            } else {
                "⏸ Бот выключен: публикации остановлены.".to_string()
            }
        }
        "add" => {
            controller.begin_add().await;
            let kb = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("✖️ Отмена", "menu:cancel")]]);
            if let Err(e) = bot
                .edit_message_text(chat_id, message_id, "Пришли название фильма на английском.")
                .reply_markup(kb)
                .await
            {
                warn!(error = %e, "failed to edit menu");
            }
            return Ok(());
        }
        "cancel" => {
            controller.cancel_add().await;
            "Добавление отменено.".to_string()
        }
        "home" => String::new(),
        _ => "Неизвестная команда.".to_string(),
    };

    let enabled = controller.state().read().await.enabled;
    if let Err(e) = bot
        .edit_message_text(chat_id, message_id, menu_text(&notice, enabled))
        .parse_mode(ParseMode::Html)
        .reply_markup(main_keyboard(enabled))
        .await
    {
        // «message is not modified» при повторном нажатии: не ошибка
        debug!(error = %e, "menu edit failed");
    }
    Ok(())
}

async fn send_menu(bot: &Bot, chat: ChatId, notice: &str, controller: &Controller) -> ResponseResult<()> {
    let enabled = controller.state().read().await.enabled;
    bot.send_message(chat, menu_text(notice, enabled))
        .parse_mode(ParseMode::Html)
        .reply_markup(main_keyboard(enabled))
        .await?;
    Ok(())
}

async fn edit_plain(bot: &Bot, chat: ChatId, message_id: MessageId, text: &str) {
    if let Err(e) = bot.edit_message_text(chat, message_id, text).await {
        debug!(error = %e, "progress edit failed");
    }
}

async fn answer_cb(bot: &Bot, q: &CallbackQuery, text: &str) -> ResponseResult<()> {
    let mut req = bot.answer_callback_query(q.id.clone()).show_alert(false);
    if !text.is_empty() {
        req = req.text(text);
    }
    req.await?;
    Ok(())
}

/* ====== Меню и тексты ====== */

fn main_keyboard(enabled: bool) -> InlineKeyboardMarkup {
    let toggle = if enabled { "⏸ Выключить" } else { "▶️ Включить" };
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🎬 Опубликовать сейчас", "menu:post")],
        vec![
            InlineKeyboardButton::callback("🔄 Обновить кэш", "menu:refresh"),
            InlineKeyboardButton::callback("➕ Добавить фильм", "menu:add"),
        ],
        vec![
            InlineKeyboardButton::callback("📊 Статистика", "menu:stats"),
            InlineKeyboardButton::callback("🩺 Диагностика", "menu:diag"),
        ],
        vec![InlineKeyboardButton::callback(toggle, "menu:toggle")],
    ])
}

fn menu_text(notice: &str, enabled: bool) -> String {
    let status = if enabled { "включён ✅" } else { "выключен ⏸" };
    let head = format!("<b>Меню администратора</b>\nБот {status}");
    if notice.is_empty() {
        head
    } else {
        format!("{notice}\n\n{head}")
    }
}

fn render_post_outcome(outcome: &PostOutcome) -> String {
    match outcome {
        PostOutcome::Published { title } => format!("✅ Опубликовано: <b>{}</b>", html_escape(title)),
        PostOutcome::Disabled => "⏸ Бот выключен — публикация не выполнена.".to_string(),
        PostOutcome::Outage => {
            "🛑 Публикация отменена: оба LLM-провайдера исчерпали квоту, пост без комментария не выходит.".to_string()
        }
        PostOutcome::Failed(e) => format!("❌ Не удалось опубликовать: {}", html_escape(e)),
    }
}

fn render_refresh_outcome(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Refreshed { count } => format!("✅ Кэш обновлён: {count} фильмов."),
        RefreshOutcome::Fallback => "⚠️ TMDB недоступен — в кэше запасной список.".to_string(),
        RefreshOutcome::Disabled => "⏸ Бот выключен.".to_string(),
    }
}

fn render_add_outcome(outcome: &AddOutcome) -> String {
    match outcome {
        AddOutcome::Added(c) => format!("✅ Добавлен в кэш: <b>{}</b>", html_escape(&c.title)),
        AddOutcome::AlreadyPresent(c) => format!("ℹ️ Уже есть в кэше: <b>{}</b>", html_escape(&c.title)),
        AddOutcome::Rejected { title, reason } => {
            format!("🚫 <b>{}</b> не подходит: {reason}", html_escape(title))
        }
        AddOutcome::NotFound => "😕 Ничего не нашёл.".to_string(),
    }
}

fn providers_line(p: &ProviderFlags) -> String {
    let mark = |ok: bool| if ok { "✅" } else { "❌ квота" };
    format!("Groq: {} · OpenRouter: {}", mark(p.primary), mark(p.secondary))
}

fn format_age(age: Option<Duration>) -> String {
    match age {
        None => "никогда".to_string(),
        Some(d) => {
            let mins = d.as_secs() / 60;
            format!("{} ч {} мин назад", mins / 60, mins % 60)
        }
    }
}

fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%d.%m.%Y %H:%M UTC").to_string()).unwrap_or_else(|| "—".to_string())
}

fn render_stats(s: &StatsSnapshot) -> String {
    format!(
        "📊 <b>Статистика</b>\n\
         Бот: {}\n\
         Кэш: {} фильмов, опубликовано из него {}\n\
         Кэш обновлён: {} ({})\n\
         Ошибок обновления: {}\n\
         Постов за сессию: {}\n\
         Последний: {} ({})\n\
         {}",
        if s.enabled { "включён" } else { "выключен" },
        s.cache_size,
        s.posted,
        format_age(s.cache_age),
        format_time(s.last_refresh_at),
        s.refresh_failures,
        s.published,
        s.last_title.as_deref().map(html_escape).unwrap_or_else(|| "—".to_string()),
        format_time(s.last_published_at),
        providers_line(&s.providers),
    )
}

fn render_diagnostics(d: &Diagnostics) -> String {
    let tmdb = match &d.tmdb {
        Ok(latency) => format!("✅ {} мс", latency.as_millis()),
        Err(e) => format!("❌ {}", html_escape(e)),
    };
    format!(
        "🩺 <b>Диагностика</b>\n\
         TMDB: {tmdb}\n\
         {}\n\
         Бот: {}\n\
         Кэш: {} фильмов, обновлён {}\n\
         Окна повторов: описания {}/10, комментарии {}/10",
        providers_line(&d.providers),
        if d.enabled { "включён" } else { "выключен" },
        d.cache_size,
        format_age(d.cache_age),
        d.recent_plots,
        d.recent_comments,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Candidate;
    use crate::comment::tests::Scripted;
    use crate::outlet::testing::Recorder;
    use crate::selector::tests::{reviews, selector};
    use crate::state::{shared, BotState};
    use serde_json::json;
    use std::sync::Arc;
    use teloxide::types::InlineKeyboardButtonKind;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn admin_message(text: &str) -> Message {
        serde_json::from_value(json!({
            "message_id": 1,
            "date": 1735992000,
            "from": {"id": 42, "is_bot": false, "first_name": "Admin"},
            "chat": {"id": 42, "type": "private", "first_name": "Admin"},
            "text": text
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn reopening_menu_drops_pending_title_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex("^/bot[^/]+/sendMessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {
                "message_id": 2,
                "from": {"id": 1, "is_bot": true, "first_name": "KinoBot"},
                "chat": {"id": 42, "type": "private", "first_name": "Admin"},
                "date": 1735992000,
                "text": "menu"
            }})))
            .expect(2)
            .mount(&server)
            .await;
        let bot = Bot::new("123:abc").set_api_url(server.uri().parse().unwrap());
        let rec = Arc::new(Recorder::default());
        let sel = selector("http://127.0.0.1:9", shared(BotState::default()), Scripted::new("p", reviews(1)), Scripted::new("s", reviews(1)));
        let ctl = Controller::new(sel, rec.clone(), rec);

        for cmd in [Command::Menu, Command::Start] {
            ctl.begin_add().await;
            on_command(bot.clone(), admin_message("/menu"), cmd, &ctl, UserId(42)).await.unwrap();
            assert!(!ctl.is_awaiting_title().await);
        }
    }

    fn callbacks(kb: &InlineKeyboardMarkup) -> Vec<String> {
        kb.inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn main_keyboard_covers_every_action() {
        let data = callbacks(&main_keyboard(true));
        for action in ["menu:post", "menu:refresh", "menu:add", "menu:stats", "menu:diag", "menu:toggle"] {
            assert!(data.iter().any(|d| d == action), "missing {action}");
        }
        let toggle_label = |enabled| {
            main_keyboard(enabled).inline_keyboard.last().unwrap()[0].text.clone()
        };
        assert_ne!(toggle_label(true), toggle_label(false));
    }

    #[test]
    fn errors_are_inlined_above_the_menu() {
        let text = menu_text(&render_post_outcome(&PostOutcome::Failed("<boom>".into())), true);
        assert!(text.starts_with("❌ Не удалось опубликовать: &lt;boom&gt;"));
        assert!(text.contains("Меню администратора"));
        assert_eq!(menu_text("", false), "<b>Меню администратора</b>\nБот выключен ⏸");
    }

    #[test]
    fn outcomes_render() {
        assert!(render_post_outcome(&PostOutcome::Outage).contains("квоту"));
        assert!(render_post_outcome(&PostOutcome::Disabled).contains("выключен"));
        let c = Candidate { id: 1, title: "Heat".into() };
        assert!(render_add_outcome(&AddOutcome::AlreadyPresent(c)).contains("Уже есть"));
        assert!(render_refresh_outcome(&RefreshOutcome::Refreshed { count: 42 }).contains("42"));
    }

    #[test]
    fn stats_show_provider_state() {
        let snapshot = StatsSnapshot {
            enabled: true,
            cache_size: 100,
            posted: 7,
            cache_age: Some(Duration::from_secs(3 * 3600 + 5 * 60)),
            last_refresh_at: None,
            refresh_failures: 0,
            published: 7,
            last_title: Some("Heat".into()),
            last_published_at: None,
            providers: ProviderFlags { primary: false, secondary: true },
        };
        let text = render_stats(&snapshot);
        assert!(text.contains("3 ч 5 мин назад"));
        assert!(text.contains("Groq: ❌ квота"));
        assert!(text.contains("OpenRouter: ✅"));
    }
}

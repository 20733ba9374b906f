mod cache;
mod comment;
mod config;
mod controller;
mod error;
mod fallback;
mod health;
mod llm;
mod metadata;
mod outlet;
mod post;
mod retry;
mod scheduler;
mod selector;
mod state;
mod text;
mod tg;
mod tmdb;

use crate::cache::Acceptance;
use crate::comment::CommentGenerator;
use crate::config::Config;
use crate::controller::Controller;
use crate::llm::{ChatProvider, GROQ_BASE, OPENROUTER_BASE};
use crate::outlet::TelegramOutlet;
use crate::selector::Selector;
use crate::state::{shared, BotState};
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::from_env()?;
    let bot = Bot::new(cfg.bot_token.clone()).set_api_url(cfg.bot_api_url.clone());

    let tmdb = tmdb::TmdbClient::new(cfg.tmdb_api_key.clone(), cfg.http_timeout)?;
    let outlet = Arc::new(TelegramOutlet::new(
        bot.clone(),
        cfg.bot_token.clone(),
        cfg.channel.clone(),
        cfg.channel_link.clone(),
        cfg.admin_chat(),
        &cfg.bot_api_url,
        cfg.http_timeout,
    )?);

    let groq = ChatProvider::new("Groq", GROQ_BASE, cfg.groq_api_key.clone(), cfg.groq_model.clone(), cfg.http_timeout)?;
    let openrouter = ChatProvider::new(
        "OpenRouter",
        OPENROUTER_BASE,
        cfg.openrouter_api_key.clone(),
        cfg.openrouter_model.clone(),
        cfg.http_timeout,
    )?;
    let comments = CommentGenerator::new(Arc::new(groq), Arc::new(openrouter), outlet.clone());

    let selector = Selector {
        state: shared(BotState::default()),
        tmdb,
        comments,
        filter: Acceptance {
            excluded_language: cfg.excluded_language.clone(),
            excluded_country: cfg.excluded_country.clone(),
        },
        cache_max_age: cfg.cache_max_age,
    };
    let controller = Controller::new(selector, outlet.clone(), outlet);

    // кэш заполняется до первого поста и до открытия меню
    let initial = controller.refresh_now().await;
    info!(?initial, "initial cache refresh");

    let shutdown = CancellationToken::new();
    let listener = health::bind(cfg.port).await?;
    let health = tokio::spawn(health::serve(listener, shutdown.clone()));
    let trigger = scheduler::trigger_for(cfg.scheduler, cfg.post_interval, cfg.cache_max_age);
    let jobs = trigger.start(controller.clone(), shutdown.clone());

    info!(scheduler = ?cfg.scheduler, port = cfg.port, "bot started");
    tg::run(bot, controller, cfg.admin).await;

    shutdown.cancel();
    if let Err(e) = jobs.await {
        warn!(error = %e, "scheduler task failed");
    }
    match health.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "health endpoint failed"),
        Err(e) => warn!(error = %e, "health task failed"),
    }
    info!("bot stopped");
    Ok(())
}

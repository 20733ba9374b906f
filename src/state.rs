use crate::cache::PopularityCache;
use chrono::{DateTime, Utc};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::RwLock;

pub const RECENT_CAPACITY: usize = 10;

/* ====== Окно недавних текстов ======
   не больше 10 строк, при переполнении вытесняется самая старая */
#[derive(Debug, Clone, Default)]
pub struct RecentWindow {
    items: VecDeque<String>,
}

impl RecentWindow {
    pub fn push(&mut self, text: String) {
        if self.items.len() >= RECENT_CAPACITY {
            self.items.pop_front();
        }
        self.items.push_back(text);
    }

    pub fn contains(&self, text: &str) -> bool {
        self.items.iter().any(|t| t == text)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.items.iter()
    }
}

/// Доступность LLM-провайдеров. Сбрасывается только перезапуском процесса.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderFlags {
    pub primary: bool,
    pub secondary: bool,
}

impl Default for ProviderFlags {
    fn default() -> Self {
        Self { primary: true, secondary: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Primary,
    Secondary,
}

impl ProviderFlags {
    pub fn all_exhausted(&self) -> bool {
        !self.primary && !self.secondary
    }

    pub fn is_available(&self, slot: Slot) -> bool {
        match slot {
            Slot::Primary => self.primary,
            Slot::Secondary => self.secondary,
        }
    }

    pub fn exhaust(&mut self, slot: Slot) {
        match slot {
            Slot::Primary => self.primary = false,
            Slot::Secondary => self.secondary = false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub published: u64,
    pub last_title: Option<String>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub refresh_failures: u64,
}

/// Всё изменяемое состояние процесса в одном месте.
#[derive(Debug)]
pub struct BotState {
    pub enabled: bool,
    pub cache: PopularityCache,
    pub recent_plots: RecentWindow,
    pub recent_comments: RecentWindow,
    pub providers: ProviderFlags,
    pub stats: Stats,
    /// Админ нажал «Добавить фильм» и мы ждём название.
    pub awaiting_title: bool,
}

impl Default for BotState {
    fn default() -> Self {
        Self {
            enabled: true,
            cache: PopularityCache::default(),
            recent_plots: RecentWindow::default(),
            recent_comments: RecentWindow::default(),
            providers: ProviderFlags::default(),
            stats: Stats::default(),
            awaiting_title: false,
        }
    }
}

pub type SharedState = Arc<RwLock<BotState>>;

pub fn shared(state: BotState) -> SharedState {
    Arc::new(RwLock::new(state))
}

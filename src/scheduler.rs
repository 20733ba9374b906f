use crate::config::SchedulerMode;
use crate::controller::Controller;
use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{interval_at, sleep, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Периодический запуск автопостинга и обновления кэша.
pub trait PeriodicTrigger: Send {
    fn start(self: Box<Self>, controller: Controller, shutdown: CancellationToken) -> JoinHandle<()>;
}

pub fn trigger_for(mode: SchedulerMode, post_every: Duration, refresh_every: Duration) -> Box<dyn PeriodicTrigger> {
    match mode {
        SchedulerMode::Interval => Box::new(IntervalTrigger { post_every, refresh_every }),
        SchedulerMode::Loop => Box::new(SequentialLoop { post_every }),
    }
}

/// Два независимых таймера; задания выполняются по очереди в одной задаче.
pub struct IntervalTrigger {
    pub post_every: Duration,
    pub refresh_every: Duration,
}

impl PeriodicTrigger for IntervalTrigger {
    fn start(self: Box<Self>, controller: Controller, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let now = Instant::now();
            let mut post_tick = interval_at(now + self.post_every, self.post_every);
            let mut refresh_tick = interval_at(now + self.refresh_every, self.refresh_every);
            post_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(post_every = ?self.post_every, refresh_every = ?self.refresh_every, "interval scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = post_tick.tick() => {
                        let outcome = controller.scheduled_post().await;
                        debug!(?outcome, "scheduled post");
                    }
                    _ = refresh_tick.tick() => {
                        let outcome = controller.scheduled_refresh().await;
                        debug!(?outcome, "scheduled refresh");
                    }
                }
            }
            info!("interval scheduler stopped");
        })
    }
}

/// Запасной вариант без таймеров: пост, пауза, обновление кэша при устаревании, и так по кругу.
pub struct SequentialLoop {
    pub post_every: Duration,
}

impl PeriodicTrigger for SequentialLoop {
    fn start(self: Box<Self>, controller: Controller, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(post_every = ?self.post_every, "sequential scheduler started");
            loop {
                let outcome = controller.scheduled_post().await;
                debug!(?outcome, "scheduled post");

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(self.post_every) => {}
                }

                let stale = controller.state().read().await.cache.is_stale(controller.cache_max_age());
                if stale {
                    let outcome = controller.scheduled_refresh().await;
                    debug!(?outcome, "scheduled refresh");
                }
            }
            info!("sequential scheduler stopped");
        })
    }
}

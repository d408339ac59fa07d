//! End-of-day trigger for moving unfinished visits forward.
//!
//! A tokio interval ticks every `interval`; the first tick on a weekday at
//! or after `at` runs `auto_reschedule_end_of_day` for today. It fires at
//! most once per calendar day.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::scheduler::ScheduleService;

#[derive(Debug, Clone)]
pub struct AutoRescheduleConfig {
    pub enabled: bool,
    /// Local time after which the trigger may fire
    pub at: NaiveTime,
    pub interval: Duration,
}

impl Default for AutoRescheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            at: crate::defaults::default_auto_reschedule_at(),
            interval: Duration::from_secs(30 * 60),
        }
    }
}

/// Whether a tick at `now` should run the end-of-day reschedule
pub fn should_fire(now: NaiveDateTime, last_fired: Option<NaiveDate>, at: NaiveTime) -> bool {
    let today = now.date();
    if matches!(today.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    if last_fired == Some(today) {
        return false;
    }
    now.time() >= at
}

/// Run the trigger until `cancel` fires
pub async fn run(service: Arc<ScheduleService>, config: AutoRescheduleConfig, cancel: CancellationToken) {
    if !config.enabled {
        info!("Auto-reschedule disabled");
        return;
    }

    info!(
        "Auto-reschedule armed for {} (checking every {:?})",
        config.at, config.interval
    );

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_fired: Option<NaiveDate> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Auto-reschedule stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let now = chrono::Local::now().naive_local();
        if !should_fire(now, last_fired, config.at) {
            debug!("Auto-reschedule tick at {}, nothing to do", now);
            continue;
        }

        let today = now.date();
        last_fired = Some(today);

        match service.auto_reschedule_end_of_day(today).await {
            Ok(result) => info!(
                "Auto-reschedule for {}: {} vendors, {} failed, {} visits moved",
                today, result.vendors_processed, result.vendors_failed, result.visits_moved
            ),
            Err(e) => error!("Auto-reschedule for {} failed: {}", today, e),
        }
    }
}

//! Daily broadcast scheduler.
//!
//! The scheduler polls an injected clock on a fixed interval:
//! 1. Convert "now" into the configured time zone
//! 2. If today's trigger time has passed and today has not been handled,
//!    mark today handled and run the broadcast
//! 3. An empty phrase store makes the run a silent no-op
//!
//! Missed days are not caught up. A scheduler started after today's trigger
//! time treats today as handled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::broadcast_service::{pick_random, BroadcastResult, Broadcaster};
use crate::domain::entities::ChatId;
use crate::domain::traits::{Clock, PhraseStore};

/// Prefix of every scheduled message
pub const SCHEDULED_PREFIX: &str = "🌅 Morning wisdom:";

/// Messages that can be sent to the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerMessage {
    /// Stop the scheduler.
    Shutdown,
}

/// Wall-clock trigger in a named time zone, every day of the week
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    pub time: NaiveTime,
    pub timezone: Tz,
}

impl DailyTrigger {
    pub fn new(time: NaiveTime, timezone: Tz) -> Self {
        Self { time, timezone }
    }

    /// First trigger instant on `date`, if the local time exists that day
    fn on(&self, date: NaiveDate) -> Option<DateTime<Tz>> {
        self.timezone
            .from_local_datetime(&date.and_time(self.time))
            .earliest()
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Trigger time not reached, or today already handled
    NotDue,
    /// Due, but there was nothing to send
    Empty,
    Broadcast(BroadcastResult),
}

/// Fires the broadcast pipeline once per calendar day
pub struct DailyScheduler {
    store: Arc<dyn PhraseStore>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
    trigger: DailyTrigger,
    destinations: Vec<ChatId>,
    check_interval: Duration,
    last_run: Option<NaiveDate>,
}

impl DailyScheduler {
    pub fn new(
        store: Arc<dyn PhraseStore>,
        broadcaster: Arc<Broadcaster>,
        clock: Arc<dyn Clock>,
        trigger: DailyTrigger,
        destinations: Vec<ChatId>,
    ) -> Self {
        let now = clock.now().with_timezone(&trigger.timezone);
        let last_run = (now.time() >= trigger.time).then(|| now.date_naive());

        Self {
            store,
            broadcaster,
            clock,
            trigger,
            destinations,
            check_interval: Duration::from_secs(20),
            last_run,
        }
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Next instant the broadcast will fire
    pub fn next_run(&self) -> Option<DateTime<Tz>> {
        let now = self.clock.now().with_timezone(&self.trigger.timezone);
        let today = now.date_naive();

        let date = if self.last_run == Some(today) || now.time() >= self.trigger.time {
            today.checked_add_days(Days::new(1))?
        } else {
            today
        };
        self.trigger.on(date)
    }

    /// Runs the scheduler loop until shut down.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SchedulerMessage>) {
        match self.next_run() {
            Some(next) => info!("Daily broadcast scheduled, next run at {}", next),
            None => info!("Daily broadcast scheduled at {} {}", self.trigger.time, self.trigger.timezone),
        }

        let mut timer = interval(self.check_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.tick().await;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(SchedulerMessage::Shutdown) | None => {
                            info!("Scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Single tick of the scheduler.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now().with_timezone(&self.trigger.timezone);
        let today = now.date_naive();

        if self.last_run == Some(today) || now.time() < self.trigger.time {
            return TickOutcome::NotDue;
        }

        // marked before sending: a failed run is not retried the same day
        self.last_run = Some(today);
        debug!("Daily trigger reached for {}", today);

        let phrases = self.store.list_all().await;
        let Some(phrase) = pick_random(&phrases) else {
            info!("No phrases stored, skipping scheduled broadcast");
            return TickOutcome::Empty;
        };

        let text = format!("{}\n\n{}", SCHEDULED_PREFIX, phrase);
        let result = self.broadcaster.broadcast(&text, &self.destinations).await;
        info!(
            "Scheduled broadcast for {} delivered {}/{}",
            today,
            result.success_count(),
            result.total()
        );
        TickOutcome::Broadcast(result)
    }
}

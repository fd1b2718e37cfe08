//! Daily Scheduler
//!
//! Fires `MarketOpen` and `AfterClose` at fixed local wall-clock times, every
//! day, until stopped.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use super::orchestrator::{Orchestrator, OrchestratorError};

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("Market open and after close must be different times")]
    SameTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduledEvent {
    MarketOpen,
    AfterClose,
}

/// Two fixed times of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    market_open: NaiveTime,
    after_close: NaiveTime,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            market_open: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            after_close: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
        }
    }
}

impl DailySchedule {
    pub fn new(market_open: NaiveTime, after_close: NaiveTime) -> Result<Self, ScheduleError> {
        if market_open == after_close {
            return Err(ScheduleError::SameTime);
        }
        Ok(Self {
            market_open,
            after_close,
        })
    }

    /// Parse two `HH:MM` strings
    pub fn parse(market_open: &str, after_close: &str) -> Result<Self, ScheduleError> {
        Self::new(parse_time(market_open)?, parse_time(after_close)?)
    }

    pub fn market_open(&self) -> NaiveTime {
        self.market_open
    }

    pub fn after_close(&self) -> NaiveTime {
        self.after_close
    }

    /// First event strictly after `now`
    pub fn next_event(&self, now: NaiveDateTime) -> (NaiveDateTime, ScheduledEvent) {
        let today = now.date();
        let mut candidates = [
            (today.and_time(self.market_open), ScheduledEvent::MarketOpen),
            (today.and_time(self.after_close), ScheduledEvent::AfterClose),
        ];
        for (at, _) in candidates.iter_mut() {
            if *at <= now {
                *at += ChronoDuration::days(1);
            }
        }
        candidates.sort_by_key(|(at, _)| *at);
        candidates[0]
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(value.to_string()))
}

/// Something that reacts to scheduled events
#[async_trait]
pub trait ScheduledTask: Send {
    async fn on_event(&mut self, event: ScheduledEvent) -> Result<(), OrchestratorError>;
}

#[async_trait]
impl ScheduledTask for Orchestrator {
    async fn on_event(&mut self, event: ScheduledEvent) -> Result<(), OrchestratorError> {
        match event {
            ScheduledEvent::MarketOpen => self.market_open().await.map(|_| ()),
            ScheduledEvent::AfterClose => self.after_close().await.map(|_| ()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    Stopped,
}

/// Drives a task from the wall clock. A stop is final: once stopped, `run`
/// returns immediately, including when the stop arrives before `run` starts.
pub struct Scheduler {
    schedule: DailySchedule,
    state: Arc<RwLock<RunState>>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(schedule: DailySchedule) -> Self {
        Self {
            schedule,
            state: Arc::new(RwLock::new(RunState::Idle)),
            poll_interval: Duration::from_secs(30),
        }
    }

    /// Longest sleep between checks of the stop flag
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn is_running(&self) -> bool {
        *self.state.read().await == RunState::Running
    }

    /// Run until `stop` is called. Event failures are logged and the loop
    /// continues with the next event.
    pub async fn run<T: ScheduledTask>(&self, task: &mut T) {
        {
            let mut state = self.state.write().await;
            if *state != RunState::Idle {
                tracing::warn!("Scheduler not started: state is {:?}", *state);
                return;
            }
            *state = RunState::Running;
        }

        let (mut next_at, mut next_event) = self.schedule.next_event(Local::now().naive_local());
        tracing::info!(
            "Scheduler started - market open {}, after close {}, next {:?} at {}",
            self.schedule.market_open,
            self.schedule.after_close,
            next_event,
            next_at
        );

        while self.is_running().await {
            let now = Local::now().naive_local();
            if now >= next_at {
                tracing::info!("Firing {:?}", next_event);
                if let Err(e) = task.on_event(next_event).await {
                    tracing::error!("{:?} failed: {}", next_event, e);
                }
                (next_at, next_event) = self.schedule.next_event(now);
                tracing::info!("Next {:?} at {}", next_event, next_at);
                continue;
            }

            let remaining = (next_at - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(remaining.min(self.poll_interval)).await;
        }

        tracing::info!("Scheduler stopped");
    }

    pub async fn stop(&self) {
        *self.state.write().await = RunState::Stopped;
        tracing::info!("Stop signal sent to scheduler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_default_times() {
        let schedule = DailySchedule::default();
        assert_eq!(schedule.market_open(), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(schedule.after_close(), NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }

    #[test]
    fn test_next_event_ordering() {
        let schedule = DailySchedule::default();

        assert_eq!(schedule.next_event(at(8, 0)), (at(10, 0), ScheduledEvent::MarketOpen));
        assert_eq!(schedule.next_event(at(10, 0)), (at(17, 0), ScheduledEvent::AfterClose));
        assert_eq!(schedule.next_event(at(12, 30)), (at(17, 0), ScheduledEvent::AfterClose));

        let (when, event) = schedule.next_event(at(18, 0));
        assert_eq!(event, ScheduledEvent::MarketOpen);
        assert_eq!(when, at(10, 0) + ChronoDuration::days(1));
    }

    #[test]
    fn test_parse() {
        let schedule = DailySchedule::parse("09:30", "16:15").unwrap();
        assert_eq!(schedule.market_open(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(
            DailySchedule::parse("9h", "16:00"),
            Err(ScheduleError::InvalidTime("9h".to_string()))
        );
        assert_eq!(DailySchedule::parse("10:00", "10:00"), Err(ScheduleError::SameTime));
    }

    struct Counter {
        events: Vec<ScheduledEvent>,
    }

    #[async_trait]
    impl ScheduledTask for Counter {
        async fn on_event(&mut self, event: ScheduledEvent) -> Result<(), OrchestratorError> {
            self.events.push(event);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stop_ends_run() {
        let scheduler = Arc::new(Scheduler::new(DailySchedule::default()).with_poll_interval(Duration::from_millis(10)));
        let runner = scheduler.clone();
        let task = tokio::spawn(async move {
            let mut counter = Counter { events: Vec::new() };
            runner.run(&mut counter).await;
            counter.events.len()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.is_running().await);
        scheduler.stop().await;

        let fired = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(fired <= 1);
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_before_run_is_kept() {
        let scheduler = Scheduler::new(DailySchedule::default()).with_poll_interval(Duration::from_millis(10));
        scheduler.stop().await;

        let mut counter = Counter { events: Vec::new() };
        tokio::time::timeout(Duration::from_secs(1), scheduler.run(&mut counter))
            .await
            .unwrap();
        assert!(counter.events.is_empty());
        assert!(!scheduler.is_running().await);
    }
}

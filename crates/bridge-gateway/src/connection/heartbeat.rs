//! Heartbeat scheduler
//!
//! Owns the single heartbeat timer of a connection. The timer is a deadline
//! that the connection loop sleeps on; re-arming replaces the deadline, so at
//! most one ping is ever pending.

use bridge_common::GatewayConfig;
use std::time::Duration;
use tokio::time::Instant;

/// What the connection loop must do when the heartbeat timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Send a ping carrying the last sequence number
    SendPing,
    /// Too many pings went unanswered; tear the connection down
    Reconnect,
}

/// Heartbeat cadence and liveness tracking for one connection
#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    interval: Duration,
    retry_delay: Duration,
    max_retries: u32,
    deadline: Option<Instant>,
    last_ping_sent_at: Option<Instant>,
    outstanding_retries: u32,
}

impl HeartbeatScheduler {
    /// Create an idle scheduler
    #[must_use]
    pub fn new(interval: Duration, retry_delay: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            retry_delay,
            max_retries,
            deadline: None,
            last_ping_sent_at: None,
            outstanding_retries: 0,
        }
    }

    /// Create an idle scheduler from gateway configuration
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.heartbeat_interval,
            config.heartbeat_retry_delay,
            config.heartbeat_max_retries,
        )
    }

    /// Begin heartbeating on a freshly opened transport
    pub fn start(&mut self) {
        self.outstanding_retries = 0;
        self.last_ping_sent_at = None;
        self.schedule_next(self.interval);
    }

    /// Arm the timer `delay` from now, replacing any armed timer
    pub fn schedule_next(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    /// Disarm the timer
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// When the armed timer fires, if any
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Pings sent since the last acknowledgment
    #[must_use]
    pub fn outstanding_retries(&self) -> u32 {
        self.outstanding_retries
    }

    #[must_use]
    pub fn last_ping_sent_at(&self) -> Option<Instant> {
        self.last_ping_sent_at
    }

    /// Handle the timer firing at `now`.
    ///
    /// Returns `Reconnect` once the retry ceiling is exceeded; the timer is left
    /// disarmed so that the decision is reported only once.
    pub fn on_timer(&mut self, now: Instant) -> HeartbeatAction {
        if self.outstanding_retries > self.max_retries {
            self.cancel();
            return HeartbeatAction::Reconnect;
        }

        self.outstanding_retries += 1;
        self.last_ping_sent_at = Some(now);
        self.deadline = Some(now + self.retry_delay);
        HeartbeatAction::SendPing
    }

    /// Handle a heartbeat acknowledgment received at `now`.
    ///
    /// The next ping is due one interval after the previous ping was sent,
    /// not one interval after the acknowledgment.
    pub fn on_ack(&mut self, now: Instant) {
        self.outstanding_retries = 0;

        let delay = match self.last_ping_sent_at {
            Some(sent) => self.interval.saturating_sub(now.saturating_duration_since(sent)),
            None => self.interval,
        };
        self.deadline = Some(now + delay);
    }
}

/// Sleep until `deadline`, or forever when no timer is armed
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

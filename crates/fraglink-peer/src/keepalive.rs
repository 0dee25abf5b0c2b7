//! Keep-alive supervision.
//!
//! The supervisor ticks on a fixed interval. On a tick it first judges the
//! previous probe: if no sufficiently fresh KEEPALIVE_REPLY exists the probe
//! counts as a failure, and enough consecutive failures condemn the
//! connection. It then decides whether the link has been idle long enough to
//! warrant another probe.

use std::time::{Duration, Instant};

use fraglink_core::config::Config;
use tracing::warn;

/// What one supervisor tick decided.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeartbeatTick {
    /// A probe went unanswered; the running failure count.
    pub missed: Option<u32>,
    /// A probe should be transmitted now.
    pub send_probe: bool,
    /// The failure threshold was reached; tear the connection down.
    pub terminate: bool,
}

/// Tracks link liveness and emits probe/terminate decisions.
#[derive(Debug)]
pub struct KeepAliveSupervisor {
    interval: Duration,
    timeout: Duration,
    max_failures: u32,
    last_outbound: Instant,
    last_reply: Instant,
    failures: u32,
    next_tick: Instant,
    probe_outstanding: bool,
}

impl KeepAliveSupervisor {
    /// Creates a supervisor from configuration defaults.
    pub fn new(config: &Config, now: Instant) -> Self {
        Self {
            interval: config.keep_alive_interval,
            timeout: config.keep_alive_timeout,
            max_failures: config.heartbeat_failure_threshold,
            last_outbound: now,
            last_reply: now,
            failures: 0,
            next_tick: now + config.keep_alive_interval,
            probe_outstanding: false,
        }
    }

    /// Records outbound activity of any kind.
    pub fn record_send(&mut self, now: Instant) {
        self.last_outbound = now;
    }

    /// Records a KEEPALIVE_REPLY from the peer.
    pub fn record_reply(&mut self, now: Instant) {
        self.last_reply = now;
        self.failures = 0;
        self.probe_outstanding = false;
    }

    /// Consecutive unanswered probes so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Advances the supervisor; returns `None` between ticks.
    pub fn poll(&mut self, now: Instant) -> Option<HeartbeatTick> {
        if now < self.next_tick {
            return None;
        }
        self.next_tick = now + self.interval;

        let mut tick = HeartbeatTick::default();

        if self.probe_outstanding {
            self.probe_outstanding = false;
            if now.duration_since(self.last_reply) > self.timeout {
                self.failures += 1;
                warn!(failures = self.failures, "heartbeat acknowledgment not received");
                tick.missed = Some(self.failures);
                if self.failures >= self.max_failures {
                    tick.terminate = true;
                    return Some(tick);
                }
            }
        }

        if now.duration_since(self.last_outbound) > self.interval {
            self.probe_outstanding = true;
            tick.send_probe = true;
        }

        Some(tick)
    }
}

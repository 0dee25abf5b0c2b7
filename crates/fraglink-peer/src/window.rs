//! RTT-adaptive sliding window.
//!
//! The window bounds how many data packets may be in flight at once. Every
//! confirmation contributes an RTT sample to an exponentially-weighted moving
//! average; while the smoothed RTT stays under the threshold the window grows
//! by one per confirmation, otherwise it shrinks by one, never dropping below
//! the configured minimum.

use std::time::Duration;

use fraglink_core::config::Config;
use tracing::debug;

/// Window state for pacing reliable data transmission.
#[derive(Debug, Clone)]
pub struct WindowController {
    window_size: u16,
    smoothed_rtt_ms: f64,
    initial_window_size: u16,
    min_window_size: u16,
    initial_rtt_ms: f64,
    smoothing_factor: f64,
    rtt_threshold_ms: f64,
}

impl WindowController {
    /// Creates a controller from configuration defaults.
    pub fn new(config: &Config) -> Self {
        let initial_window = config.initial_window_size.max(config.min_window_size);
        Self {
            window_size: initial_window,
            smoothed_rtt_ms: config.initial_rtt.as_secs_f64() * 1000.0,
            initial_window_size: initial_window,
            min_window_size: config.min_window_size.max(1),
            initial_rtt_ms: config.initial_rtt.as_secs_f64() * 1000.0,
            smoothing_factor: config.rtt_smoothing_factor,
            rtt_threshold_ms: config.rtt_threshold.as_secs_f64() * 1000.0,
        }
    }

    /// Returns the current window size in fragments.
    pub fn window_size(&self) -> u16 {
        self.window_size
    }

    /// The value carried in the 16-bit window field of outgoing packets.
    pub fn advertised(&self) -> u16 {
        self.window_size
    }

    /// Returns the current smoothed round-trip time.
    pub fn smoothed_rtt(&self) -> Duration {
        Duration::from_secs_f64(self.smoothed_rtt_ms / 1000.0)
    }

    /// Whether another packet may enter flight given `in_flight` outstanding.
    pub fn can_send_more(&self, in_flight: usize) -> bool {
        in_flight < self.window_size as usize
    }

    /// Feeds one confirmation RTT sample and adjusts the window.
    pub fn on_confirm(&mut self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;
        self.smoothed_rtt_ms =
            self.smoothing_factor * sample_ms + (1.0 - self.smoothing_factor) * self.smoothed_rtt_ms;

        if self.smoothed_rtt_ms < self.rtt_threshold_ms {
            self.window_size = self.window_size.saturating_add(1);
            debug!(window = self.window_size, srtt_ms = self.smoothed_rtt_ms, "window grown");
        } else if self.window_size > self.min_window_size {
            self.window_size -= 1;
            debug!(window = self.window_size, srtt_ms = self.smoothed_rtt_ms, "window shrunk");
        }
    }

    /// Restores the session-start window and smoothed RTT.
    pub fn reset(&mut self) {
        self.window_size = self.initial_window_size;
        self.smoothed_rtt_ms = self.initial_rtt_ms;
    }
}

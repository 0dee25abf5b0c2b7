use std::{path::PathBuf, time::Duration};

use crate::constants::{
    HEARTBEAT_FAILURE_THRESHOLD, INITIAL_RTT_MS, INITIAL_WINDOW_SIZE, KEEP_ALIVE_INTERVAL_MS,
    MAX_DATAGRAM_SIZE, MAX_FRAGMENT_SIZE, MESSAGE_SPILL_THRESHOLD, MIN_WINDOW_SIZE,
    RESEND_TIMEOUT_MS, RTT_SMOOTHING_FACTOR, RTT_THRESHOLD_MS, TIMEOUT_THRESHOLD_MS,
};

#[derive(Clone, Debug)]
/// Configuration options to tune transport and runtime behavior.
pub struct Config {
    /// Make the underlying UDP socket block when true, otherwise non-blocking.
    pub blocking_mode: bool,
    /// Default payload bytes per fragment; always capped at `MAX_FRAGMENT_SIZE`.
    pub fragment_size: u16,
    /// Size of the datagram receive buffer in bytes.
    pub receive_buffer_max_size: usize,
    /// How long a packet may stay in flight before it is retransmitted.
    pub resend_timeout: Duration,
    /// Interval between keep-alive probes while the link is idle.
    pub keep_alive_interval: Duration,
    /// Age of the newest keep-alive reply beyond which a probe counts as failed.
    pub keep_alive_timeout: Duration,
    /// Consecutive keep-alive failures tolerated before terminating.
    pub heartbeat_failure_threshold: u32,
    /// Smoothing factor (0..1) for RTT measurements.
    pub rtt_smoothing_factor: f64,
    /// Smoothed RTT below this grows the window, above shrinks it.
    pub rtt_threshold: Duration,
    /// Smoothed RTT starting value.
    pub initial_rtt: Duration,
    /// Window size at session start, in fragments.
    pub initial_window_size: u16,
    /// The window never shrinks below this many fragments.
    pub min_window_size: u16,
    /// Received-message bytes kept in memory before spilling to a temp file.
    pub message_spill_threshold: usize,
    /// Folder where received files are written.
    pub destination_folder: PathBuf,
    /// Socket receive buffer size in bytes (None = system default, SO_RCVBUF).
    pub socket_recv_buffer_size: Option<usize>,
    /// Socket send buffer size in bytes (None = system default, SO_SNDBUF).
    pub socket_send_buffer_size: Option<usize>,
    /// How long the polling driver sleeps between iterations.
    pub socket_polling_timeout: Option<Duration>,
}

/// Platform default for the received-files folder.
fn default_destination_folder() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\Download")
    } else {
        std::env::temp_dir().join("fraglink-received")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blocking_mode: false,
            fragment_size: MAX_FRAGMENT_SIZE,
            receive_buffer_max_size: MAX_DATAGRAM_SIZE,
            resend_timeout: Duration::from_millis(RESEND_TIMEOUT_MS),
            keep_alive_interval: Duration::from_millis(KEEP_ALIVE_INTERVAL_MS),
            keep_alive_timeout: Duration::from_millis(TIMEOUT_THRESHOLD_MS),
            heartbeat_failure_threshold: HEARTBEAT_FAILURE_THRESHOLD,
            rtt_smoothing_factor: RTT_SMOOTHING_FACTOR,
            rtt_threshold: Duration::from_millis(RTT_THRESHOLD_MS),
            initial_rtt: Duration::from_millis(INITIAL_RTT_MS),
            initial_window_size: INITIAL_WINDOW_SIZE,
            min_window_size: MIN_WINDOW_SIZE,
            message_spill_threshold: MESSAGE_SPILL_THRESHOLD,
            destination_folder: default_destination_folder(),
            socket_recv_buffer_size: None,
            socket_send_buffer_size: None,
            socket_polling_timeout: Some(Duration::from_millis(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.fragment_size, 1458);
        assert_eq!(config.initial_window_size, 4);
        assert_eq!(config.min_window_size, 1);
        assert_eq!(config.resend_timeout, Duration::from_secs(10));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(5));
        assert_eq!(config.keep_alive_timeout, Duration::from_secs(15));
        assert_eq!(config.heartbeat_failure_threshold, 3);
    }

    #[test]
    fn default_destination_is_absolute() {
        let config = Config::default();
        assert!(config.destination_folder.is_absolute());
    }
}

//! Per-pipeline diagnostic counters.
//!
//! Counters describe one playback session: the first packet received while
//! the `rx` counter is zero clears everything, and the playback task closes
//! the session when it mutes the amplifier.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Packets handed to the pipeline by the network.
    Rx,
    /// Packets dropped at ingress (decode queue or packet pool full).
    RxDropped,
    Decoded,
    DecodeErrors,
    /// Decoded frames accepted by the playback queue.
    PlaybackQueued,
    /// Decoded frames dropped after the playback push timed out.
    PlaybackDropped,
    Played,
    Encoded,
    EncodeErrors,
    /// Captured frames dropped because the encode queue was full.
    CaptureDropped,
}

const COUNTERS: usize = 10;

impl Counter {
    fn index(self) -> usize {
        self as usize
    }
}

/// Read-only copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub rx: u32,
    pub rx_dropped: u32,
    pub decoded: u32,
    pub decode_errors: u32,
    pub pb_queued: u32,
    pub pb_dropped: u32,
    pub played: u32,
    pub encoded: u32,
    pub encode_errors: u32,
    pub capture_dropped: u32,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rx={} rx_drop={} dec={} dec_err={} pb_q={} pb_drop={} played={} enc={} enc_err={} cap_drop={}",
            self.rx,
            self.rx_dropped,
            self.decoded,
            self.decode_errors,
            self.pb_queued,
            self.pb_dropped,
            self.played,
            self.encoded,
            self.encode_errors,
            self.capture_dropped,
        )
    }
}

#[derive(Default)]
pub struct PipelineStats {
    counters: [AtomicU32; COUNTERS],
    last_session: Mutex<Option<StatsSnapshot>>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.counters[counter.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u32 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Count one received packet, opening a new session first if the
    /// receive counter was at zero.
    pub fn record_rx(&self) {
        if self.get(Counter::Rx) == 0 {
            self.reset();
        }
        self.incr(Counter::Rx);
    }

    pub fn reset(&self) {
        for c in &self.counters {
            c.store(0, Ordering::Relaxed);
        }
    }

    /// Close the current session: keep its snapshot and clear the counters.
    pub fn finish_session(&self) -> StatsSnapshot {
        let snapshot = self.snapshot();
        *self.last_session.lock() = Some(snapshot);
        self.reset();
        snapshot
    }

    /// Counters of the most recently finished session.
    pub fn last_session(&self) -> Option<StatsSnapshot> {
        *self.last_session.lock()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx: self.get(Counter::Rx),
            rx_dropped: self.get(Counter::RxDropped),
            decoded: self.get(Counter::Decoded),
            decode_errors: self.get(Counter::DecodeErrors),
            pb_queued: self.get(Counter::PlaybackQueued),
            pb_dropped: self.get(Counter::PlaybackDropped),
            played: self.get(Counter::Played),
            encoded: self.get(Counter::Encoded),
            encode_errors: self.get(Counter::EncodeErrors),
            capture_dropped: self.get(Counter::CaptureDropped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_rx_opens_session() {
        let stats = PipelineStats::new();
        stats.incr(Counter::Played);
        stats.incr(Counter::DecodeErrors);
        stats.incr(Counter::CaptureDropped);

        stats.record_rx();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                rx: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_rx_within_session_accumulates() {
        let stats = PipelineStats::new();
        stats.record_rx();
        stats.incr(Counter::Decoded);
        stats.record_rx();
        let snap = stats.snapshot();
        assert_eq!(snap.rx, 2);
        assert_eq!(snap.decoded, 1);
    }

    #[test]
    fn test_finish_session_keeps_snapshot() {
        let stats = PipelineStats::new();
        assert!(stats.last_session().is_none());
        stats.record_rx();
        stats.incr(Counter::Played);

        let done = stats.finish_session();
        assert_eq!(done.played, 1);
        assert_eq!(stats.last_session(), Some(done));
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_display_line() {
        let snap = StatsSnapshot {
            rx: 3,
            played: 2,
            ..Default::default()
        };
        let line = snap.to_string();
        assert!(line.starts_with("rx=3 rx_drop=0"));
        assert!(line.contains("played=2"));
    }
}

//! Concurrency ceiling tracking.
//!
//! The gateway advertises `MAX_CONCURRENT_STREAMS` in its SETTINGS frame and
//! may send a new SETTINGS frame at any point, typically under load. The
//! dispatch loop refreshes the tracker once per iteration so it reacts to a
//! tightening or loosening ceiling without polling more than necessary.
//!
//! Advertised values are clamped into
//! `CONCURRENT_STREAMS_MINIMUM..=CONCURRENT_STREAMS_SAFETY_MAXIMUM`. An
//! unchanged advertisement is a no-op, so clamping and logging happen once
//! per change.

use crate::constants::{CONCURRENT_STREAMS_MINIMUM, CONCURRENT_STREAMS_SAFETY_MAXIMUM};
use crate::transport::Transport;

/// Tracks the admission limit derived from the peer's advertised ceiling.
#[derive(Debug, Default, Clone)]
pub struct WindowTracker {
    previous_advertised: Option<usize>,
    limit: Option<usize>,
    changes: u64,
}

impl WindowTracker {
    /// Tracker with no limit yet (nothing is admitted until the first refresh).
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read the advertised ceiling from `transport`.
    pub fn refresh<T: Transport + ?Sized>(&mut self, transport: &T) {
        self.observe(transport.remote_max_concurrent_streams());
    }

    /// Apply an advertised ceiling. Returns `true` if it differed from the
    /// previous advertisement.
    pub fn observe(&mut self, advertised: usize) -> bool {
        if self.previous_advertised == Some(advertised) {
            return false;
        }
        self.previous_advertised = Some(advertised);

        let limit = if advertised > CONCURRENT_STREAMS_SAFETY_MAXIMUM {
            log::warn!(
                "[Window] APNs max_concurrent_streams too high ({}), resorting to default maximum ({})",
                advertised,
                CONCURRENT_STREAMS_SAFETY_MAXIMUM
            );
            CONCURRENT_STREAMS_SAFETY_MAXIMUM
        } else if advertised < CONCURRENT_STREAMS_MINIMUM {
            log::warn!(
                "[Window] APNs reported max_concurrent_streams less than {} ({}), using value of {}",
                CONCURRENT_STREAMS_MINIMUM,
                advertised,
                CONCURRENT_STREAMS_MINIMUM
            );
            CONCURRENT_STREAMS_MINIMUM
        } else {
            log::info!("[Window] APNs set max_concurrent_streams to {}", advertised);
            advertised
        };

        self.limit = Some(limit);
        self.changes += 1;
        true
    }

    /// Current admission limit; `0` until the first refresh.
    pub fn current_limit(&self) -> usize {
        self.limit.unwrap_or(0)
    }

    /// Number of times the advertised ceiling changed.
    pub fn changes(&self) -> u64 {
        self.changes
    }
}

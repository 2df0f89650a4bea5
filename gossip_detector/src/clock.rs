//! Sources of [`Timestamp`]s for agents.
//!
//! Timestamps are compared across agents, so every agent in a cluster is assumed to read a clock
//! that is synchronized with the others up to a small delta (NTP in a real deployment). Nothing
//! here detects or compensates for skew.

use crate::membership::Timestamp;
use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Reads the current time as milliseconds since the UNIX epoch.
pub trait Clock: Debug + Send + Sync + 'static {
  /// The current time.
  fn now(&self) -> Timestamp;
}

/// The wall clock of the machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
  fn now(&self) -> Timestamp {
    Timestamp::from(SystemTime::now())
  }
}

/// A wall-clock reading taken once, advanced by the tokio timer.
///
/// When the tokio clock is paused (as in tests), this clock only advances when tokio time does,
/// which lets whole clusters run through simulated seconds deterministically. Copies share the
/// same base, so agents built from one `TokioClock` never disagree.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
  base: Timestamp,
  start: Instant,
}
impl TokioClock {
  /// Starts a clock at the current wall-clock time.
  pub fn new() -> Self {
    Self::starting_at(SystemClock.now())
  }

  /// Starts a clock that reads `base` right now.
  pub fn starting_at(base: Timestamp) -> Self {
    TokioClock {
      base: base,
      start: Instant::now(),
    }
  }
}
impl Default for TokioClock {
  fn default() -> Self {
    Self::new()
  }
}
impl Clock for TokioClock {
  fn now(&self) -> Timestamp {
    self.base.after(self.start.elapsed())
  }
}

impl From<SystemTime> for Timestamp {
  fn from(t: SystemTime) -> Self {
    // Clocks set before 1970 read as the epoch.
    let millis = t.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0);
    Timestamp(millis)
  }
}

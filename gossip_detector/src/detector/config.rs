use crate::error::{DetectorError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env::var;
use std::time::Duration;

static HEARTBEAT_MS: Lazy<Option<Duration>> = Lazy::new(|| env_millis("GOSSIP_DETECTOR_HEARTBEAT_MS"));

static FAILURE_TIMEOUT_MS: Lazy<Option<Duration>> =
  Lazy::new(|| env_millis("GOSSIP_DETECTOR_FAILURE_TIMEOUT_MS"));

static FANOUT: Lazy<Option<usize>> = Lazy::new(|| {
  var("GOSSIP_DETECTOR_FANOUT")
    .map(|x| x.parse().ok())
    .ok()
    .flatten()
});

fn env_millis(key: &str) -> Option<Duration> {
  var(key)
    .map(|x| x.parse().ok().map(Duration::from_millis))
    .ok()
    .flatten()
}

/// Configures a [`PeerAgent`](crate::detector::PeerAgent).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
  /// How often the agent increments its own heartbeat and sends its table to random peers.
  ///
  /// default: `1 second`
  pub heartbeat_interval: Duration,
  /// How long a peer may go without fresh evidence of liveness before it is suspected. Also the
  /// staleness threshold an agent applies before corroborating someone else's suspicion.
  ///
  /// default: `3 seconds`
  pub failure_timeout: Duration,
  /// The number of peers each heartbeat and suspicion is sent to. `None` picks half of the other
  /// known peers, at least one.
  ///
  /// default: `None`
  pub fanout: Option<usize>,
  /// Whether a suspicion that has not reached quorum is offered again to new random peers every
  /// [`heartbeat_interval`](#structfield.heartbeat_interval) until it does, or until fresh
  /// evidence clears it.
  ///
  /// default: `true`
  pub resuspect: bool,
}
impl Default for AgentConfig {
  #[inline]
  fn default() -> Self {
    AgentConfig {
      heartbeat_interval: Duration::from_millis(1000),
      failure_timeout: Duration::from_millis(3000),
      fanout: None,
      resuspect: true,
    }
  }
}
impl AgentConfig {
  /// The defaults, overridden by `GOSSIP_DETECTOR_HEARTBEAT_MS`,
  /// `GOSSIP_DETECTOR_FAILURE_TIMEOUT_MS` and `GOSSIP_DETECTOR_FANOUT` when they parse. The
  /// environment is read once per process.
  pub fn from_env() -> Self {
    let mut cfg = Self::default();
    if let Some(dur) = *HEARTBEAT_MS {
      cfg.heartbeat_interval = dur;
    }
    if let Some(dur) = *FAILURE_TIMEOUT_MS {
      cfg.failure_timeout = dur;
    }
    if let Some(n) = *FANOUT {
      cfg.fanout = Some(n);
    }
    cfg
  }

  /// Fails with [`DetectorError::InvalidConfig`] on a zero interval, timeout or fan-out.
  pub fn validate(&self) -> Result<()> {
    if self.heartbeat_interval == Duration::from_millis(0) {
      return Err(DetectorError::InvalidConfig(
        "heartbeat_interval must be positive".to_string(),
      ));
    }
    if self.failure_timeout == Duration::from_millis(0) {
      return Err(DetectorError::InvalidConfig(
        "failure_timeout must be positive".to_string(),
      ));
    }
    if self.fanout == Some(0) {
      return Err(DetectorError::InvalidConfig("fanout must be at least 1".to_string()));
    }
    Ok(())
  }

  /// How many of `candidates` other peers each dissemination round targets.
  pub fn fanout_for(&self, candidates: usize) -> usize {
    let n = self.fanout.unwrap_or_else(|| std::cmp::max(1, candidates / 2));
    std::cmp::min(n, candidates)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio_test::{assert_err, assert_ok};

  #[test]
  fn defaults_match_the_reference_cluster() {
    let cfg = AgentConfig::default();
    assert_eq!(cfg.heartbeat_interval, Duration::from_secs(1));
    assert_eq!(cfg.failure_timeout, Duration::from_secs(3));
    assert_ok!(cfg.validate());
  }

  #[test]
  fn zero_values_are_rejected() {
    let mut cfg = AgentConfig::default();
    cfg.failure_timeout = Duration::from_millis(0);
    assert_err!(cfg.validate());
    let mut cfg = AgentConfig::default();
    cfg.heartbeat_interval = Duration::from_millis(0);
    assert_err!(cfg.validate());
    let mut cfg = AgentConfig::default();
    cfg.fanout = Some(0);
    assert_err!(cfg.validate());
  }

  #[test]
  fn fanout_is_half_the_others_at_least_one() {
    let cfg = AgentConfig::default();
    assert_eq!(cfg.fanout_for(0), 0);
    assert_eq!(cfg.fanout_for(1), 1);
    assert_eq!(cfg.fanout_for(2), 1);
    assert_eq!(cfg.fanout_for(3), 1);
    assert_eq!(cfg.fanout_for(4), 2);
    assert_eq!(cfg.fanout_for(9), 4);
    let mut cfg = AgentConfig::default();
    cfg.fanout = Some(5);
    assert_eq!(cfg.fanout_for(3), 3);
    assert_eq!(cfg.fanout_for(8), 5);
  }
}

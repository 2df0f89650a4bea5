use crate::membership::PeerId;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env::var;
use std::time::Duration;

static PACKET_DROP: Lazy<f64> = Lazy::new(|| {
  var("GOSSIP_DETECTOR_PACKET_DROP")
    .map(|x| x.parse().ok())
    .ok()
    .flatten()
    .unwrap_or(0.0)
});

static DELAY: Lazy<Option<(Duration, Duration)>> = Lazy::new(|| {
  var("GOSSIP_DETECTOR_MIN_DELAY")
    .map(|x| x.parse().ok().map(Duration::from_millis))
    .ok()
    .flatten()
    .zip(
      var("GOSSIP_DETECTOR_MAX_DELAY")
        .map(|x| x.parse().ok().map(Duration::from_millis))
        .ok()
        .flatten(),
    )
    .filter(|(x, y)| x <= y)
});

/// How messages to one destination misbehave.
#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FailureConfig {
  /// The probability that a message is silently dropped.
  pub drop_prob: f64,
  /// If set, every delivered message is held back for a uniformly random time in this range.
  /// A range whose minimum exceeds its maximum holds nothing back.
  pub delay: Option<(Duration, Duration)>,
}
impl FailureConfig {
  /// The delay range to roll from, if it is set and not inverted.
  pub fn delay_range(&self) -> Option<(Duration, Duration)> {
    self.delay.filter(|(min, max)| min <= max)
  }

  /// Reads `GOSSIP_DETECTOR_PACKET_DROP`, `GOSSIP_DETECTOR_MIN_DELAY` and
  /// `GOSSIP_DETECTOR_MAX_DELAY` (milliseconds). Unset or unparsable values mean a perfect network.
  pub fn from_env() -> Self {
    FailureConfig {
      drop_prob: *PACKET_DROP,
      delay: *DELAY,
    }
  }
}

/// Failure injection for a whole [`LocalNetwork`](crate::testkit::LocalNetwork).
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
pub struct FailureConfigMap {
  /// Applies to every destination without a [`node_wide`](#structfield.node_wide) entry.
  pub cluster_wide: FailureConfig,
  /// Overrides [`cluster_wide`](#structfield.cluster_wide) for messages addressed to a peer.
  pub node_wide: im::HashMap<PeerId, FailureConfig>,
  /// Peers cut off from all traffic, in both directions.
  pub partitioned: im::HashSet<PeerId>,
}
impl FailureConfigMap {
  /// The failure injection for messages addressed to `dest`.
  pub fn get(&self, dest: PeerId) -> &FailureConfig {
    self.node_wide.get(&dest).unwrap_or(&self.cluster_wide)
  }

  /// Whether a message from `sender` to `dest` can never arrive.
  pub fn severed(&self, sender: PeerId, dest: PeerId) -> bool {
    self.partitioned.contains(&sender) || self.partitioned.contains(&dest)
  }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifies a member of the cluster.
#[derive(
  Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct PeerId(pub u64);
impl fmt::Display for PeerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
impl From<u64> for PeerId {
  fn from(id: u64) -> Self {
    PeerId(id)
  }
}

/// Milliseconds since the UNIX epoch.
#[derive(
  Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Timestamp(pub u64);
impl Timestamp {
  /// The timestamp `dur` after this one.
  pub fn after(self, dur: Duration) -> Timestamp {
    Timestamp(self.0.saturating_add(dur.as_millis() as u64))
  }

  /// How long ago `self` was, as seen at `now`. Zero if `self` is in the future.
  pub fn elapsed_at(self, now: Timestamp) -> Duration {
    Duration::from_millis(now.0.saturating_sub(self.0))
  }
}
impl fmt::Display for Timestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}ms", self.0)
  }
}

/// One agent's knowledge of the liveness of one peer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MembershipRecord {
  /// The peer this record describes.
  pub peer_id: PeerId,
  /// The number of heartbeats the peer has reported about itself.
  pub heartbeat_counter: u64,
  /// When the peer last ticked its own heartbeat, by the peer's clock.
  pub last_seen_at: Timestamp,
  /// Peers who have corroborated that this peer went quiet. Only ever grows.
  pub suspect_acks: im::OrdSet<PeerId>,
}
impl MembershipRecord {
  /// A record with no corroborators.
  pub fn new(peer_id: PeerId, heartbeat_counter: u64, last_seen_at: Timestamp) -> Self {
    MembershipRecord {
      peer_id: peer_id,
      heartbeat_counter: heartbeat_counter,
      last_seen_at: last_seen_at,
      suspect_acks: im::OrdSet::new(),
    }
  }
}

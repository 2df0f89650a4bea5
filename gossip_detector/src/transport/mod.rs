//! What agents say to each other, and the seam through which they say it.
//!
//! Agents never call each other directly. Every heartbeat and gossip goes through a [`Transport`],
//! which owes the sender nothing: messages may be dropped, duplicated, delayed or reordered.
//! Resilience comes from periodic re-transmission and multi-peer fan-out, not per-message retry.

mod messages;

#[rustfmt::skip]
pub use {
  messages::Envelope,
  messages::GossipMessage,
  messages::HeartbeatMessage,
};

use crate::membership::PeerId;
use std::fmt::Debug;

/// Best-effort, at-most-once, unordered delivery of agent messages.
///
/// Both methods are fire-and-forget and must not block the calling agent. A destination the
/// transport does not know about is logged and dropped; it is never reported back to the sender.
pub trait Transport: Debug + Send + Sync + 'static {
  /// Delivers a heartbeat to `dest`, if possible.
  fn send_heartbeat(&self, msg: HeartbeatMessage, dest: PeerId);

  /// Delivers a suspicion gossip or its reply to `dest`, if possible.
  fn send_gossip(&self, msg: GossipMessage, dest: PeerId);
}

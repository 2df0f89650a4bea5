use crate::membership::PeerId;
use crate::transport::{Envelope, GossipMessage, HeartbeatMessage, Transport};
use std::sync::{Mutex, PoisonError};

/// A [`Transport`] that delivers nothing and remembers everything it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingTransport {
  sent: Mutex<Vec<(PeerId, Envelope)>>,
}
impl RecordingTransport {
  /// A transport that has recorded nothing yet.
  pub fn new() -> Self {
    Self::default()
  }

  /// Takes every `(destination, message)` pair sent so far.
  pub fn drain(&self) -> Vec<(PeerId, Envelope)> {
    let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
    sent.drain(..).collect()
  }

  fn push(&self, dest: PeerId, env: Envelope) {
    self.sent.lock().unwrap_or_else(PoisonError::into_inner).push((dest, env));
  }
}
impl Transport for RecordingTransport {
  fn send_heartbeat(&self, msg: HeartbeatMessage, dest: PeerId) {
    self.push(dest, Envelope::Heartbeat(msg));
  }

  fn send_gossip(&self, msg: GossipMessage, dest: PeerId) {
    self.push(dest, Envelope::Gossip(msg));
  }
}

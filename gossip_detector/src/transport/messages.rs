use crate::error::Result;
use crate::membership::{MembershipRecord, PeerId};
use serde::{Deserialize, Serialize};

/// A periodic liveness report, carrying the sender's whole membership table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HeartbeatMessage {
  /// The agent that sent the message.
  pub sender_id: PeerId,
  /// A snapshot of the sender's membership table.
  pub records: Vec<MembershipRecord>,
}

/// Asks the receiver whether it also thinks `suspected_id` went quiet, or answers such a request.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GossipMessage {
  /// The agent that sent the message.
  pub sender_id: PeerId,
  /// The peer the sender suspects.
  pub suspected_id: PeerId,
  /// Replies are never answered, so each suspicion costs at most one round trip per target.
  pub is_reply: bool,
  /// A snapshot of the sender's membership table.
  pub records: Vec<MembershipRecord>,
}

/// Either message, as it travels over a wire.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Envelope {
  /// A periodic liveness report.
  Heartbeat(HeartbeatMessage),
  /// A suspicion gossip or its reply.
  Gossip(GossipMessage),
}
impl Envelope {
  /// The agent that sent the wrapped message.
  pub fn sender_id(&self) -> PeerId {
    match self {
      Envelope::Heartbeat(hb) => hb.sender_id,
      Envelope::Gossip(g) => g.sender_id,
    }
  }

  /// The CBOR bytes of this envelope.
  pub fn encode(&self) -> Result<Vec<u8>> {
    Ok(serde_cbor::to_vec(self)?)
  }

  /// Reads an envelope back from CBOR bytes, failing with
  /// [`DetectorError::Codec`](crate::error::DetectorError::Codec).
  pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    Ok(serde_cbor::from_slice(bytes)?)
  }
}

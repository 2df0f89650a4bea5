#![warn(missing_docs)]

//! Gossip-based, quorum-acknowledged failure detection. Every [`PeerAgent`] keeps its own view of
//! the liveness of every other member of the cluster, spreads that view to random peers with
//! periodic heartbeats, and decides on its own that a peer is down once enough other peers have
//! corroborated that the peer went quiet.
//!
//! There is no single source of truth: two agents may disagree about the same peer, and agreement
//! is only reached asymptotically as gossip rounds accumulate.
//!
//! [`PeerAgent`]: crate::detector::PeerAgent

pub mod clock;
pub mod detector;
pub mod error;
pub mod membership;
pub mod testkit;
pub mod transport;

#[rustfmt::skip]
pub use {
  detector::AgentConfig,
  detector::PeerAgent,
  detector::PeerAgentRef,
  detector::PeerDirectory,
  detector::PeerStatus,
  error::DetectorError,
  membership::MembershipRecord,
  membership::MembershipTable,
  membership::PeerId,
  membership::Timestamp,
  transport::Transport,
};

//! The per-member failure detector.
//!
//! ### Detecting Failures
//! Every [`PeerAgent`] increments its own heartbeat counter once per
//! [`heartbeat_interval`](AgentConfig::heartbeat_interval) and sends its whole membership table to
//! a random half of the other known peers (at least one). Receivers merge the table into theirs.
//! Whenever a peer's record moves forward, that peer's suspicion timer is pushed back by a full
//! [`failure_timeout`](AgentConfig::failure_timeout).
//!
//! If a timer runs out, the agent suspects the peer and sends a suspicion gossip to a random half
//! of the other peers. Each receiver merges the gossip's table, then checks its *own* record of
//! the suspected peer. If that record is also older than the failure timeout, the receiver counts
//! the sender as a corroborator. It then replies once, and the suspecting agent applies the same
//! check to the reply. A reply is never answered, so each suspicion costs one round trip per
//! target.
//!
//! A peer is down, in the eyes of one agent, once that agent has counted at least
//! `floor(cluster_size / 2)` distinct corroborators. `cluster_size` is read from the
//! [`PeerDirectory`] at query time.
//!
//! ### Known Limitations
//! Corroborators are never forgotten. A peer that recovers after some agents have gathered a quorum
//! stays down in their eyes, and partial corroboration leaves it suspected. This is a one-way
//! failure model.
//!
//! The quorum threshold follows the directory as it is now, not as it was when a suspicion
//! started. Adding peers mid-detection raises the bar for suspicions already in progress.
//!
//! Gaps in heartbeat coverage, not only silent peers, make timers fire. At the default fan-out a
//! four-member cluster sends each heartbeat to a single peer, so within seconds some agent goes a
//! whole failure timeout without fresh news of a live peer. Suspicions are then raised, and now
//! and then corroborated, in a perfectly healthy cluster. They stay short of quorum, so nothing is
//! reported down. Ruling out suspicions altogether, including across a short pause, takes a
//! fan-out that reaches every peer each interval (`fanout: Some(n - 1)`).

mod agent;
mod agent_ref;
mod config;
mod directory;
mod timers;

#[rustfmt::skip]
pub use {
  agent::AgentStats,
  agent::PeerAgent,
  agent::PeerStatus,
  agent_ref::PeerAgentRef,
  config::AgentConfig,
  directory::PeerDirectory,
  timers::SuspicionTimerSet,
  timers::TimerTicket,
};

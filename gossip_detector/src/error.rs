//! Errors surfaced by the failure detector.

use crate::membership::PeerId;
use thiserror::Error;

/// Result type for failure detector operations.
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Failure detector errors.
#[derive(Debug, Error)]
pub enum DetectorError {
  /// The peer id has never been observed by the local membership table.
  #[error("no peer with id {0} is found in the membership table")]
  NotFound(PeerId),

  /// The agent a query was addressed to is no longer running.
  #[error("agent {0} has stopped")]
  AgentStopped(PeerId),

  /// An [`AgentConfig`](crate::detector::AgentConfig) failed validation.
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  /// A message could not be encoded or decoded on its way through a transport.
  #[error("codec error: {0}")]
  Codec(#[from] serde_cbor::Error),
}

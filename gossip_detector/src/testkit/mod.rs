//! In-process collaborators for running and testing agents: a lossy in-memory network, a
//! transport that records instead of delivering, and a bootstrap that stands up a whole cluster.
//!
//! How messages are dropped, delayed or cut off is controlled with a [`FailureConfigMap`].
//!
//! ```ignore
//! let mut fail_map = FailureConfigMap::default();
//! fail_map.cluster_wide.drop_prob = 0.1;
//! fail_map.partitioned.insert(PeerId(3));
//! let cluster = LocalCluster::start(4, AgentConfig::default(), fail_map, 7)?;
//! ```

mod failure_config;
mod local_cluster;
mod local_network;
mod recording;

#[rustfmt::skip]
pub use {
  failure_config::FailureConfig,
  failure_config::FailureConfigMap,
  local_cluster::seed_snapshot,
  local_cluster::LocalCluster,
  local_network::LocalNetwork,
  recording::RecordingTransport,
};

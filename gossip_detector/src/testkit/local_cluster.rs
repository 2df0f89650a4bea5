use crate::clock::{Clock, TokioClock};
use crate::detector::{AgentConfig, PeerAgent, PeerAgentRef, PeerDirectory};
use crate::error::Result;
use crate::membership::{MembershipRecord, PeerId, Timestamp};
use crate::testkit::{FailureConfigMap, LocalNetwork};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// The snapshot every agent starts from: each id with counter 0, last seen at `at`.
pub fn seed_snapshot<I>(ids: I, at: Timestamp) -> Vec<MembershipRecord>
where
  I: IntoIterator<Item = PeerId>,
{
  ids.into_iter().map(|id| MembershipRecord::new(id, 0, at)).collect()
}

/// A cluster of agents on one [`LocalNetwork`], every one of them knowing every other from the
/// start.
///
/// Agents are given ids `0..n`, share one [`PeerDirectory`] and one [`TokioClock`], and each gets
/// its own random source derived from `seed`, so a run under paused tokio time is reproducible.
#[derive(Debug)]
pub struct LocalCluster {
  network: Arc<LocalNetwork>,
  directory: PeerDirectory,
  agents: BTreeMap<PeerId, PeerAgentRef>,
}
impl LocalCluster {
  /// Spawns `n` agents on the current tokio runtime, each registered on a fresh network.
  pub fn start(
    n: u64,
    config: AgentConfig,
    fail_map: FailureConfigMap,
    seed: u64,
  ) -> Result<LocalCluster> {
    let clock = TokioClock::new();
    let ids = (0..n).map(PeerId).collect::<Vec<_>>();
    let directory = PeerDirectory::new(ids.iter().copied());
    let network = LocalNetwork::new(fail_map, seed);
    let snapshot = seed_snapshot(ids.iter().copied(), clock.now());
    let mut agents = BTreeMap::new();
    for id in ids {
      let agent = PeerAgent::spawn(
        id,
        directory.clone(),
        snapshot.clone(),
        config.clone(),
        network.clone(),
        Arc::new(clock),
        SmallRng::seed_from_u64(seed.wrapping_mul(31).wrapping_add(id.0)),
      )?;
      network.register(agent.clone());
      agents.insert(id, agent);
    }
    info!(nodes = n, "local cluster started");
    Ok(LocalCluster {
      network: network,
      directory: directory,
      agents: agents,
    })
  }

  /// The agent with `id`, if the cluster has one.
  pub fn agent(&self, id: PeerId) -> Option<&PeerAgentRef> {
    self.agents.get(&id)
  }

  /// Every agent, in id order.
  pub fn agents(&self) -> impl Iterator<Item = &PeerAgentRef> {
    self.agents.values()
  }

  /// The network the agents talk over, for injecting failures mid-run.
  pub fn network(&self) -> &Arc<LocalNetwork> {
    &self.network
  }

  /// The directory every agent reads its peers from.
  pub fn directory(&self) -> &PeerDirectory {
    &self.directory
  }

  /// Every agent's answer to whether `peer` is down, `peer` itself excluded.
  pub async fn views_of(&self, peer: PeerId) -> Vec<(PeerId, Result<bool>)> {
    let mut views = Vec::new();
    for agent in self.agents.values().filter(|a| a.id() != peer) {
      views.push((agent.id(), agent.is_node_down(peer).await));
    }
    views
  }

  /// Shuts every agent down.
  pub fn shutdown(&self) {
    for agent in self.agents.values() {
      agent.shutdown();
    }
  }
}

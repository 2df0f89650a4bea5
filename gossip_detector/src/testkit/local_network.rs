use crate::detector::PeerAgentRef;
use crate::membership::PeerId;
use crate::testkit::FailureConfigMap;
use crate::transport::{Envelope, GossipMessage, HeartbeatMessage, Transport};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{trace, warn};

/// An in-process [`Transport`] connecting agents by id.
///
/// Messages are encoded to bytes on send and decoded on delivery, so agents never share memory,
/// and they are dropped, delayed or cut off according to a [`FailureConfigMap`]. Delayed messages
/// are delivered from a task on the current tokio runtime, which can reorder them.
#[derive(Debug)]
pub struct LocalNetwork {
  agents: RwLock<im::HashMap<PeerId, PeerAgentRef>>,
  fail_map: RwLock<FailureConfigMap>,
  rng: Mutex<SmallRng>,
}
impl LocalNetwork {
  /// An empty network. `seed` drives every drop and delay roll.
  pub fn new(fail_map: FailureConfigMap, seed: u64) -> Arc<LocalNetwork> {
    Arc::new(LocalNetwork {
      agents: RwLock::new(im::HashMap::new()),
      fail_map: RwLock::new(fail_map),
      rng: Mutex::new(SmallRng::seed_from_u64(seed)),
    })
  }

  /// Makes an agent reachable under its id, replacing any previous agent with that id.
  pub fn register(&self, agent: PeerAgentRef) {
    let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
    agents.insert(agent.id(), agent);
  }

  /// Makes `id` unreachable, returning the agent that was registered under it.
  pub fn deregister(&self, id: PeerId) -> Option<PeerAgentRef> {
    let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
    agents.remove(&id)
  }

  /// Replaces the failure injection for every message routed from now on.
  pub fn set_failures(&self, fail_map: FailureConfigMap) {
    *self.fail_map.write().unwrap_or_else(PoisonError::into_inner) = fail_map;
  }

  /// Cuts `peer` off from all traffic until [`heal`](Self::heal)ed.
  pub fn isolate(&self, peer: PeerId) {
    let mut fail_map = self.fail_map.write().unwrap_or_else(PoisonError::into_inner);
    fail_map.partitioned.insert(peer);
  }

  /// Reconnects a peer cut off by [`isolate`](Self::isolate).
  pub fn heal(&self, peer: PeerId) {
    let mut fail_map = self.fail_map.write().unwrap_or_else(PoisonError::into_inner);
    fail_map.partitioned.remove(&peer);
  }

  fn route(&self, env: Envelope, dest: PeerId) {
    let sender = env.sender_id();
    let agent = match self.agents.read().unwrap_or_else(PoisonError::into_inner).get(&dest) {
      Some(agent) => agent.clone(),
      None => {
        warn!(%sender, %dest, "peer is not found in network, message dropped");
        return;
      }
    };
    let (severed, fail_cfg) = {
      let fail_map = self.fail_map.read().unwrap_or_else(PoisonError::into_inner);
      (fail_map.severed(sender, dest), *fail_map.get(dest))
    };
    // The serialization work is done even if the message is lost afterwards.
    let bytes = match env.encode() {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(%sender, %dest, error = %e, "could not encode message");
        return;
      }
    };
    if severed {
      trace!(%sender, %dest, "partitioned, message dropped");
      return;
    }
    let (dropped, delay) = {
      let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
      let dropped = rng.gen::<f64>() < fail_cfg.drop_prob;
      let delay = fail_cfg.delay_range().map(|(min, max)| {
        let range = min.as_millis() as u64..=max.as_millis() as u64;
        Duration::from_millis(rng.gen_range(range))
      });
      (dropped, delay)
    };
    if dropped {
      trace!(%sender, %dest, "message dropped");
      return;
    }
    match delay {
      Some(dur) => {
        tokio::spawn(async move {
          sleep(dur).await;
          deliver(&agent, &bytes);
        });
      }
      None => deliver(&agent, &bytes),
    }
  }
}
impl Transport for LocalNetwork {
  fn send_heartbeat(&self, msg: HeartbeatMessage, dest: PeerId) {
    self.route(Envelope::Heartbeat(msg), dest);
  }

  fn send_gossip(&self, msg: GossipMessage, dest: PeerId) {
    self.route(Envelope::Gossip(msg), dest);
  }
}

fn deliver(agent: &PeerAgentRef, bytes: &[u8]) {
  match Envelope::decode(bytes) {
    Ok(env) => {
      if !agent.deliver(env) {
        trace!(dest = %agent.id(), "agent has stopped, message dropped");
      }
    }
    Err(e) => warn!(dest = %agent.id(), error = %e, "could not decode message"),
  }
}

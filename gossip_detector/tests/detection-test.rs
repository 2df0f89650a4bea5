use gossip_detector::testkit::{FailureConfig, FailureConfigMap, LocalCluster};
use gossip_detector::{AgentConfig, DetectorError, PeerId, PeerStatus};
use itertools::Itertools;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const NODES: u64 = 4;

fn init_logging() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

fn full_fanout() -> AgentConfig {
  let mut cfg = AgentConfig::default();
  cfg.fanout = Some(NODES as usize - 1);
  cfg
}

async fn down_anywhere(cluster: &LocalCluster) -> Vec<(PeerId, PeerId)> {
  let mut down = Vec::new();
  for peer in (0..NODES).map(PeerId) {
    for (observer, view) in cluster.views_of(peer).await {
      if view.unwrap() {
        down.push((observer, peer));
      }
    }
  }
  down
}

#[tokio::test(start_paused = true)]
async fn full_fanout_steady_state_raises_no_suspicion() {
  init_logging();
  let cluster = LocalCluster::start(NODES, full_fanout(), FailureConfigMap::default(), 1).unwrap();
  sleep(Duration::from_secs(10)).await;
  let down = down_anywhere(&cluster).await;
  assert!(down.is_empty(), "unexpected failures: {:?}", down);
  for agent in cluster.agents() {
    let stats = agent.stats().await.unwrap();
    assert_eq!(stats.suspicions_raised, 0);
    assert!(stats.heartbeats_sent >= 10 * (NODES - 1));
  }
  cluster.shutdown();
}

#[tokio::test(start_paused = true)]
async fn default_fanout_steady_state_reports_nothing_down() {
  init_logging();
  let cluster =
    LocalCluster::start(NODES, AgentConfig::default(), FailureConfigMap::default(), 11).unwrap();
  sleep(Duration::from_secs(10)).await;
  // One target per round leaves gaps longer than the failure timeout, so timers do fire, but a
  // live peer never gathers a quorum of corroborators.
  let down = down_anywhere(&cluster).await;
  assert!(down.is_empty(), "unexpected failures: {:?}", down);
  cluster.shutdown();
}

#[tokio::test(start_paused = true)]
async fn default_fanout_brief_pause_reports_nothing_down() {
  init_logging();
  let cluster =
    LocalCluster::start(NODES, AgentConfig::default(), FailureConfigMap::default(), 12).unwrap();
  sleep(Duration::from_secs(5)).await;
  cluster.agent(PeerId(1)).unwrap().pause_heartbeat(Duration::from_millis(1000));
  sleep(Duration::from_secs(5)).await;
  for (id, view) in cluster.views_of(PeerId(1)).await {
    assert!(!view.unwrap(), "node {} thinks node 1 is down", id);
  }
  let down = down_anywhere(&cluster).await;
  assert!(down.is_empty(), "unexpected failures: {:?}", down);
  cluster.shutdown();
}

#[tokio::test(start_paused = true)]
async fn silent_peer_is_detected_by_everyone_else() {
  init_logging();
  let cluster =
    LocalCluster::start(NODES, AgentConfig::default(), FailureConfigMap::default(), 2).unwrap();
  sleep(Duration::from_secs(10)).await;
  cluster.agent(PeerId(2)).unwrap().stop_heartbeat();
  sleep(Duration::from_secs(15)).await;

  let views = cluster.views_of(PeerId(2)).await;
  assert_eq!(views.iter().map(|(id, _)| *id).collect_vec(), vec![PeerId(0), PeerId(1), PeerId(3)]);
  for (observer, view) in views {
    assert!(view.unwrap(), "node {} still thinks node 2 is up", observer);
    let status = cluster.agent(observer).unwrap().status(PeerId(2)).await.unwrap();
    assert_eq!(status, PeerStatus::Down);
    let snapshot = cluster.agent(observer).unwrap().snapshot().await.unwrap();
    let record = snapshot.iter().find(|r| r.peer_id == PeerId(2)).unwrap();
    assert!(record.suspect_acks.len() >= 2);
    assert!(!record.suspect_acks.contains(&observer));
  }
  // A peer that stopped heartbeating still answers queries.
  let victim = cluster.agent(PeerId(2)).unwrap();
  assert!(victim.is_running());
  assert!(victim.is_node_down(PeerId(0)).await.is_ok());
  cluster.shutdown();
}

#[tokio::test(start_paused = true)]
async fn full_fanout_brief_pause_raises_no_suspicion() {
  init_logging();
  let cluster = LocalCluster::start(NODES, full_fanout(), FailureConfigMap::default(), 3).unwrap();
  sleep(Duration::from_secs(5)).await;
  cluster.agent(PeerId(1)).unwrap().pause_heartbeat(Duration::from_millis(1000));
  sleep(Duration::from_secs(5)).await;

  for agent in cluster.agents() {
    assert_eq!(agent.stats().await.unwrap().suspicions_raised, 0);
    assert_eq!(agent.stats().await.unwrap().acks_recorded, 0);
    for record in agent.snapshot().await.unwrap() {
      assert!(record.suspect_acks.is_empty());
    }
    if agent.id() != PeerId(1) {
      assert_eq!(agent.status(PeerId(1)).await.unwrap(), PeerStatus::Alive);
    }
  }
  cluster.shutdown();
}

#[tokio::test(start_paused = true)]
async fn isolated_observer_diverges_from_the_majority() {
  init_logging();
  let cluster =
    LocalCluster::start(NODES, AgentConfig::default(), FailureConfigMap::default(), 4).unwrap();
  let observer = PeerId(3);
  cluster.network().isolate(observer);
  sleep(Duration::from_secs(20)).await;

  // The observer suspects everyone but can never gather corroboration.
  let lonely = cluster.agent(observer).unwrap();
  for peer in (0..3).map(PeerId) {
    assert!(!lonely.is_node_down(peer).await.unwrap());
    assert_eq!(lonely.status(peer).await.unwrap(), PeerStatus::Suspected);
  }
  assert!(!lonely.is_node_down(observer).await.unwrap());

  // Everyone else agrees the observer is gone.
  for (id, view) in cluster.views_of(observer).await {
    assert!(view.unwrap(), "node {} still thinks node 3 is up", id);
  }
  cluster.shutdown();
}

#[tokio::test(start_paused = true)]
async fn detection_survives_packet_loss() {
  init_logging();
  let mut fail_map = FailureConfigMap::default();
  fail_map.cluster_wide = FailureConfig {
    drop_prob: 0.2,
    delay: Some((Duration::from_millis(5), Duration::from_millis(50))),
  };
  let cluster = LocalCluster::start(NODES, full_fanout(), fail_map, 5).unwrap();
  sleep(Duration::from_secs(10)).await;
  cluster.agent(PeerId(0)).unwrap().stop_heartbeat();
  sleep(Duration::from_secs(15)).await;
  for (id, view) in cluster.views_of(PeerId(0)).await {
    assert!(view.unwrap(), "node {} still thinks node 0 is up", id);
  }
  cluster.shutdown();
}

#[tokio::test(start_paused = true)]
async fn queries_about_strangers_fail() {
  let cluster =
    LocalCluster::start(NODES, AgentConfig::default(), FailureConfigMap::default(), 6).unwrap();
  let agent = cluster.agent(PeerId(0)).unwrap();
  match agent.is_node_down(PeerId(99)).await {
    Err(DetectorError::NotFound(PeerId(99))) => {}
    other => panic!("expected NotFound, got {:?}", other),
  }
  cluster.shutdown();
  sleep(Duration::from_millis(10)).await;
  assert!(!agent.is_running());
  assert!(agent.stats().await.is_err());
}

#[tokio::test]
async fn invalid_config_is_rejected_at_start() {
  let mut cfg = AgentConfig::default();
  cfg.failure_timeout = Duration::from_millis(0);
  match LocalCluster::start(NODES, cfg, FailureConfigMap::default(), 7) {
    Err(DetectorError::InvalidConfig(_)) => {}
    other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
  }
}

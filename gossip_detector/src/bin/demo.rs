//! Runs four agents on an in-memory network, silences one of them, and prints who noticed.
//!
//! Timing comes from `AgentConfig::from_env`, packet loss from `FailureConfig::from_env`. Log
//! verbosity follows `RUST_LOG`, `info` by default.

use gossip_detector::testkit::{FailureConfig, FailureConfigMap, LocalCluster};
use gossip_detector::{AgentConfig, PeerId};
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const NODES: u64 = 4;
const VICTIM: PeerId = PeerId(2);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

  let config = AgentConfig::from_env();
  let mut fail_map = FailureConfigMap::default();
  fail_map.cluster_wide = FailureConfig::from_env();
  let cluster = LocalCluster::start(NODES, config, fail_map, 0)?;

  println!("System warming up...");
  sleep(Duration::from_secs(10)).await;

  println!("\n>>> Simulating Node{} failure (stopping heartbeats) <<<", VICTIM);
  if let Some(victim) = cluster.agent(VICTIM) {
    victim.stop_heartbeat();
  }
  sleep(Duration::from_secs(15)).await;

  for (id, view) in cluster.views_of(VICTIM).await {
    let verdict = if view? { "DOWN" } else { "UP" };
    println!("Node{} view: Node{} is {}", id, VICTIM, verdict);
  }

  cluster.shutdown();
  println!("\nTest complete.");
  Ok(())
}

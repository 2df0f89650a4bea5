use crate::detector::agent::{AgentCmd, AgentMsg};
use crate::detector::{AgentStats, PeerStatus};
use crate::error::{DetectorError, Result};
use crate::membership::{MembershipRecord, PeerId};
use crate::transport::Envelope;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// A handle to a running [`PeerAgent`](crate::detector::PeerAgent). Cheap to clone.
///
/// Transports use [`deliver`](Self::deliver) to hand inbound messages to the agent; everything
/// else is the query and lifecycle surface offered to whoever bootstrapped the agent.
#[derive(Clone, Debug)]
pub struct PeerAgentRef {
  id: PeerId,
  tx: UnboundedSender<AgentMsg>,
}
impl PeerAgentRef {
  pub(crate) fn new(id: PeerId, tx: UnboundedSender<AgentMsg>) -> Self {
    PeerAgentRef { id: id, tx: tx }
  }

  /// The id of the agent behind this handle.
  pub fn id(&self) -> PeerId {
    self.id
  }

  /// Whether the agent is still accepting messages.
  pub fn is_running(&self) -> bool {
    !self.tx.is_closed()
  }

  /// Queues an inbound message. Returns `false` if the agent has stopped, in which case the
  /// message is dropped.
  pub fn deliver(&self, env: Envelope) -> bool {
    self.tx.send(AgentMsg::from(env)).is_ok()
  }

  /// Whether the agent has gathered enough corroboration to consider `peer` down.
  ///
  /// Fails with [`DetectorError::NotFound`] if the agent has never heard of `peer`.
  pub async fn is_node_down(&self, peer: PeerId) -> Result<bool> {
    self.ask(|tx| AgentCmd::IsNodeDown(peer, tx)).await?
  }

  /// Where `peer` stands in the agent's alive/suspected/down view.
  pub async fn status(&self, peer: PeerId) -> Result<PeerStatus> {
    self.ask(|tx| AgentCmd::Status(peer, tx)).await?
  }

  /// A copy of the agent's membership table.
  pub async fn snapshot(&self) -> Result<Vec<MembershipRecord>> {
    self.ask(AgentCmd::Snapshot).await
  }

  /// The agent's counters as of now.
  pub async fn stats(&self) -> Result<AgentStats> {
    self.ask(AgentCmd::Stats).await
  }

  /// Stops the agent's heartbeat for good. The agent keeps receiving, gossiping and answering
  /// queries, which is how a crashed peer looks to everyone else.
  pub fn stop_heartbeat(&self) {
    self.tell(AgentCmd::StopHeartbeat);
  }

  /// Skips the agent's heartbeat ticks for `dur`.
  pub fn pause_heartbeat(&self, dur: Duration) {
    self.tell(AgentCmd::PauseHeartbeat(dur));
  }

  /// Stops the agent: cancels its timers, stops its heartbeat and drops queued messages.
  pub fn shutdown(&self) {
    self.tell(AgentCmd::Shutdown);
  }

  fn tell(&self, cmd: AgentCmd) {
    let _ = self.tx.send(AgentMsg::Cmd(cmd));
  }

  async fn ask<T, F>(&self, cmd: F) -> Result<T>
  where
    F: FnOnce(oneshot::Sender<T>) -> AgentCmd,
  {
    let (tx, rx) = oneshot::channel();
    self
      .tx
      .send(AgentMsg::Cmd(cmd(tx)))
      .map_err(|_| DetectorError::AgentStopped(self.id))?;
    rx.await.map_err(|_| DetectorError::AgentStopped(self.id))
  }
}

use crate::clock::Clock;
use crate::detector::directory::sample_others;
use crate::detector::{AgentConfig, PeerAgentRef, PeerDirectory, SuspicionTimerSet, TimerTicket};
use crate::error::Result;
use crate::membership::{MembershipRecord, MembershipTable, PeerId};
use crate::transport::{Envelope, GossipMessage, HeartbeatMessage, Transport};
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use AgentMsg::*;

/// One agent's local belief about one peer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum PeerStatus {
  /// Fresh evidence of liveness keeps arriving, and nobody has corroborated a suspicion.
  Alive,
  /// The peer went quiet for a whole failure timeout, or some peers have corroborated that it
  /// did, but not enough of them yet.
  Suspected,
  /// Enough peers corroborated the suspicion. Never revoked.
  Down,
}

/// Counters of what an agent has done since it started.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AgentStats {
  /// Heartbeat messages handed to the transport.
  pub heartbeats_sent: u64,
  /// Suspicion timers that fired and were disseminated.
  pub suspicions_raised: u64,
  /// Suspicion gossips handed to the transport, replies excluded.
  pub gossips_sent: u64,
  /// Replies to suspicion gossips handed to the transport.
  pub replies_sent: u64,
  /// New corroborators recorded against any peer.
  pub acks_recorded: u64,
}

pub(crate) enum AgentMsg {
  Heartbeat(HeartbeatMessage),
  Gossip(GossipMessage),
  SuspicionTimeout(TimerTicket),
  Cmd(AgentCmd),
}
impl From<Envelope> for AgentMsg {
  fn from(env: Envelope) -> Self {
    match env {
      Envelope::Heartbeat(hb) => Heartbeat(hb),
      Envelope::Gossip(g) => Gossip(g),
    }
  }
}

pub(crate) enum AgentCmd {
  IsNodeDown(PeerId, oneshot::Sender<Result<bool>>),
  Status(PeerId, oneshot::Sender<Result<PeerStatus>>),
  Snapshot(oneshot::Sender<Vec<MembershipRecord>>),
  Stats(oneshot::Sender<AgentStats>),
  StopHeartbeat,
  PauseHeartbeat(Duration),
  Shutdown,
}

enum HeartbeatState {
  Running,
  PausedUntil(Instant),
  Stopped,
}

/// The failure detector running on one cluster member.
///
/// An agent owns its [`MembershipTable`] and [`SuspicionTimerSet`] outright; other agents only
/// ever learn about them through messages. Everything the agent does, from heartbeat ticks to
/// inbound messages, timer firings and queries, is handled one at a time by the agent's own task,
/// so no two of them ever interleave.
pub struct PeerAgent {
  id: PeerId,
  config: AgentConfig,
  directory: PeerDirectory,
  table: MembershipTable,
  timers: SuspicionTimerSet,
  suspected: HashSet<PeerId>,
  heartbeat: HeartbeatState,
  stats: AgentStats,
  transport: Arc<dyn Transport>,
  clock: Arc<dyn Clock>,
  rng: SmallRng,
  myself: UnboundedSender<AgentMsg>,
}
impl PeerAgent {
  /// Starts an agent on the current tokio runtime.
  ///
  /// `seed` is the bootstrap snapshot (usually every peer with counter 0 at bootstrap time) and
  /// is loaded before the first heartbeat tick. Every seeded peer other than `id` is watched from
  /// the start, so a peer that never heartbeats is eventually suspected too.
  pub fn spawn(
    id: PeerId,
    directory: PeerDirectory,
    seed: Vec<MembershipRecord>,
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    rng: SmallRng,
  ) -> Result<PeerAgentRef> {
    config.validate()?;
    let (tx, rx) = unbounded_channel();
    let agent = PeerAgent {
      id: id,
      config: config,
      directory: directory,
      table: MembershipTable::seeded(id, seed),
      timers: SuspicionTimerSet::new(),
      suspected: HashSet::new(),
      heartbeat: HeartbeatState::Running,
      stats: AgentStats::default(),
      transport: transport,
      clock: clock,
      rng: rng,
      myself: tx.clone(),
    };
    tokio::spawn(agent.run(rx));
    Ok(PeerAgentRef::new(id, tx))
  }

  async fn run(mut self, mut rx: UnboundedReceiver<AgentMsg>) {
    info!(agent = %self.id, cluster_size = self.directory.len(), "agent started");
    let watched = self.table.all().map(|r| r.peer_id).filter(|p| *p != self.id).collect::<Vec<_>>();
    for peer in watched {
      self.watch(peer, self.config.failure_timeout);
    }
    let mut ticker = interval(self.config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      tokio::select! {
        msg = rx.recv() => match msg {
          Some(msg) => {
            if let ControlFlow::Break(()) = self.recv(msg) {
              break;
            }
          }
          None => break,
        },
        _ = ticker.tick(), if !matches!(self.heartbeat, HeartbeatState::Stopped) => {
          self.heartbeat_tick();
        }
      }
    }
    // Whatever is still in the mailbox is dropped, not drained.
    self.timers.cancel_all();
    info!(agent = %self.id, "agent stopped");
  }

  fn recv(&mut self, msg: AgentMsg) -> ControlFlow<()> {
    match msg {
      Heartbeat(hb) => self.on_heartbeat(hb),
      Gossip(g) => self.on_gossip(g),
      SuspicionTimeout(ticket) => self.on_suspicion_timeout(ticket),
      Cmd(cmd) => return self.on_cmd(cmd),
    }
    ControlFlow::Continue(())
  }

  fn on_cmd(&mut self, cmd: AgentCmd) -> ControlFlow<()> {
    match cmd {
      AgentCmd::IsNodeDown(peer, reply) => {
        let _ = reply.send(self.is_node_down(peer));
      }
      AgentCmd::Status(peer, reply) => {
        let _ = reply.send(self.status(peer));
      }
      AgentCmd::Snapshot(reply) => {
        let _ = reply.send(self.table.snapshot());
      }
      AgentCmd::Stats(reply) => {
        let _ = reply.send(self.stats);
      }
      AgentCmd::StopHeartbeat => {
        info!(agent = %self.id, "heartbeat stopped");
        self.heartbeat = HeartbeatState::Stopped;
      }
      AgentCmd::PauseHeartbeat(dur) => {
        if !matches!(self.heartbeat, HeartbeatState::Stopped) {
          info!(agent = %self.id, pause_ms = dur.as_millis() as u64, "heartbeat paused");
          self.heartbeat = HeartbeatState::PausedUntil(Instant::now() + dur);
        }
      }
      AgentCmd::Shutdown => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
  }

  fn heartbeat_tick(&mut self) {
    if let HeartbeatState::PausedUntil(until) = self.heartbeat {
      if Instant::now() < until {
        trace!(agent = %self.id, "heartbeat tick skipped while paused");
        return;
      }
      self.heartbeat = HeartbeatState::Running;
    }
    let counter = self.table.self_tick(self.clock.now()).heartbeat_counter;
    let targets = self.pick_targets();
    debug!(agent = %self.id, counter, targets = ?targets, "heartbeat");
    let records = self.table.snapshot();
    for dest in targets {
      let msg = HeartbeatMessage {
        sender_id: self.id,
        records: records.clone(),
      };
      self.transport.send_heartbeat(msg, dest);
      self.stats.heartbeats_sent += 1;
    }
  }

  fn on_heartbeat(&mut self, hb: HeartbeatMessage) {
    trace!(agent = %self.id, sender = %hb.sender_id, "heartbeat received");
    self.merge_records(hb.records);
  }

  fn on_suspicion_timeout(&mut self, ticket: TimerTicket) {
    if !self.timers.claim(ticket) {
      trace!(agent = %self.id, peer = %ticket.peer, "superseded suspicion timer ignored");
      return;
    }
    let peer = ticket.peer;
    if self.is_node_down(peer).unwrap_or(false) {
      return;
    }
    if self.suspected.insert(peer) {
      info!(agent = %self.id, %peer, "no fresh evidence, suspecting peer");
    }
    self.stats.suspicions_raised += 1;
    let targets = self.pick_targets();
    debug!(agent = %self.id, %peer, targets = ?targets, "disseminating suspicion");
    let records = self.table.snapshot();
    for dest in targets {
      let msg = GossipMessage {
        sender_id: self.id,
        suspected_id: peer,
        is_reply: false,
        records: records.clone(),
      };
      self.transport.send_gossip(msg, dest);
      self.stats.gossips_sent += 1;
    }
    if self.config.resuspect {
      self.watch(peer, self.config.heartbeat_interval);
    }
  }

  fn on_gossip(&mut self, g: GossipMessage) {
    trace!(
      agent = %self.id,
      sender = %g.sender_id,
      suspected = %g.suspected_id,
      is_reply = g.is_reply,
      "gossip received"
    );
    self.merge_records(g.records);
    let suspected = g.suspected_id;
    let now = self.clock.now();
    match self.table.is_stale(suspected, now, self.config.failure_timeout) {
      Ok(true) => self.corroborate(suspected, g.sender_id),
      Ok(false) => {
        trace!(agent = %self.id, %suspected, "suspicion not corroborated, evidence is fresh");
      }
      Err(e) => warn!(agent = %self.id, %suspected, error = %e, "gossip about an unknown peer"),
    }
    if !g.is_reply {
      let reply = GossipMessage {
        sender_id: self.id,
        suspected_id: suspected,
        is_reply: true,
        records: self.table.snapshot(),
      };
      self.transport.send_gossip(reply, g.sender_id);
      self.stats.replies_sent += 1;
    }
  }

  fn corroborate(&mut self, suspected: PeerId, corroborator: PeerId) {
    let was_down = self.is_node_down(suspected).unwrap_or(false);
    match self.table.add_suspect_ack(suspected, corroborator) {
      Ok(true) => {
        self.stats.acks_recorded += 1;
        debug!(agent = %self.id, %suspected, %corroborator, "suspicion corroborated");
        if !was_down && self.is_node_down(suspected).unwrap_or(false) {
          info!(agent = %self.id, peer = %suspected, "quorum reached, peer is down");
          self.timers.cancel(suspected);
        }
      }
      Ok(false) => {}
      Err(e) => warn!(agent = %self.id, error = %e, "could not record corroboration"),
    }
  }

  /// Merges incoming records, pushing back the suspicion timer of every peer that moved forward.
  fn merge_records(&mut self, records: Vec<MembershipRecord>) {
    for record in records {
      let peer = record.peer_id;
      if self.table.merge(record) && peer != self.id {
        trace!(agent = %self.id, %peer, "fresh evidence");
        self.suspected.remove(&peer);
        self.watch(peer, self.config.failure_timeout);
      }
    }
  }

  fn watch(&mut self, peer: PeerId, delay: Duration) {
    let myself = self.myself.clone();
    self.timers.arm(peer, delay, move |ticket| {
      // The agent may be gone by now; its timers die with it.
      let _ = myself.send(SuspicionTimeout(ticket));
    });
  }

  fn pick_targets(&mut self) -> Vec<PeerId> {
    let peers = self.directory.snapshot();
    let candidates = peers.iter().filter(|p| **p != self.id).count();
    let count = self.config.fanout_for(candidates);
    sample_others(&peers, self.id, count, &mut self.rng)
  }

  fn is_node_down(&self, peer: PeerId) -> Result<bool> {
    let acks = self.table.get(peer)?.suspect_acks.len();
    Ok(acks >= self.directory.len() / 2)
  }

  fn status(&self, peer: PeerId) -> Result<PeerStatus> {
    let record = self.table.get(peer)?;
    Ok(if record.suspect_acks.len() >= self.directory.len() / 2 {
      PeerStatus::Down
    } else if self.suspected.contains(&peer) || !record.suspect_acks.is_empty() {
      PeerStatus::Suspected
    } else {
      PeerStatus::Alive
    })
  }
}
impl std::fmt::Debug for PeerAgent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PeerAgent")
      .field("id", &self.id)
      .field("table", &self.table)
      .field("timers", &self.timers)
      .field("suspected", &self.suspected)
      .finish()
  }
}

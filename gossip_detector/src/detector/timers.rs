use crate::membership::PeerId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Identifies one arming of one peer's timer. Handed to the fire callback so the owner can tell
/// a live firing from one that was superseded while it was on its way.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TimerTicket {
  /// The peer whose timer was armed.
  pub peer: PeerId,
  generation: u64,
}

struct PendingTimer {
  generation: u64,
  handle: JoinHandle<()>,
}

/// At most one outstanding deferred action per watched peer.
///
/// The set is owned by a single agent and only touched from that agent's loop, so arming is one
/// step: the previous timer for the peer is aborted and replaced before anything else can run.
/// A timer task that had already woken up before the abort may still deliver its callback;
/// [`claim`](Self::claim) refuses such tickets, which keeps the at-most-one-firing guarantee.
///
/// Must be used from within a tokio runtime.
#[derive(Default)]
pub struct SuspicionTimerSet {
  timers: HashMap<PeerId, PendingTimer>,
  next_generation: u64,
}
impl SuspicionTimerSet {
  /// An empty set. Nothing is armed.
  pub fn new() -> Self {
    Self::default()
  }

  /// Cancels any pending timer for `peer` and schedules `on_fire` to run once after `delay`.
  pub fn arm<F>(&mut self, peer: PeerId, delay: Duration, on_fire: F) -> TimerTicket
  where
    F: FnOnce(TimerTicket) + Send + 'static,
  {
    self.cancel(peer);
    self.next_generation += 1;
    let ticket = TimerTicket {
      peer: peer,
      generation: self.next_generation,
    };
    let deadline = Instant::now() + delay;
    let handle = tokio::spawn(async move {
      sleep_until(deadline).await;
      on_fire(ticket);
    });
    self.timers.insert(
      peer,
      PendingTimer {
        generation: ticket.generation,
        handle: handle,
      },
    );
    ticket
  }

  /// Accepts a fired ticket if it belongs to the current arming of its peer, disarming it.
  pub fn claim(&mut self, ticket: TimerTicket) -> bool {
    match self.timers.get(&ticket.peer) {
      Some(t) if t.generation == ticket.generation => {
        self.timers.remove(&ticket.peer);
        true
      }
      _ => false,
    }
  }

  /// Cancels the pending timer for `peer`, if any. Returns whether there was one.
  pub fn cancel(&mut self, peer: PeerId) -> bool {
    match self.timers.remove(&peer) {
      Some(t) => {
        t.handle.abort();
        true
      }
      None => false,
    }
  }

  /// Cancels every pending timer.
  pub fn cancel_all(&mut self) {
    for (_, t) in self.timers.drain() {
      t.handle.abort();
    }
  }

  /// Whether `peer` has a pending timer.
  pub fn is_armed(&self, peer: PeerId) -> bool {
    self.timers.contains_key(&peer)
  }

  /// The number of pending timers.
  pub fn len(&self) -> usize {
    self.timers.len()
  }

  /// Whether no timer is pending.
  pub fn is_empty(&self) -> bool {
    self.timers.is_empty()
  }
}
impl Drop for SuspicionTimerSet {
  fn drop(&mut self) {
    self.cancel_all();
  }
}
impl std::fmt::Debug for SuspicionTimerSet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut armed = self.timers.keys().collect::<Vec<_>>();
    armed.sort();
    f.debug_struct("SuspicionTimerSet").field("armed", &armed).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
  use tokio::time::advance;

  fn sink() -> (UnboundedSender<TimerTicket>, UnboundedReceiver<TimerTicket>) {
    unbounded_channel()
  }

  fn fire_into(tx: &UnboundedSender<TimerTicket>) -> impl FnOnce(TimerTicket) + Send + 'static {
    let tx = tx.clone();
    move |ticket| {
      let _ = tx.send(ticket);
    }
  }

  async fn settle() {
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn fires_once_after_delay() {
    let (tx, mut rx) = sink();
    let mut timers = SuspicionTimerSet::new();
    let ticket = timers.arm(PeerId(1), Duration::from_millis(3000), fire_into(&tx));
    advance(Duration::from_millis(2999)).await;
    settle().await;
    assert!(rx.try_recv().is_err());
    advance(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(rx.try_recv().unwrap(), ticket);
    assert!(timers.claim(ticket));
    assert!(!timers.is_armed(PeerId(1)));
    assert!(!timers.claim(ticket));
  }

  #[tokio::test(start_paused = true)]
  async fn rearming_supersedes_the_pending_timer() {
    let (tx, mut rx) = sink();
    let mut timers = SuspicionTimerSet::new();
    let first = timers.arm(PeerId(1), Duration::from_millis(1000), fire_into(&tx));
    advance(Duration::from_millis(800)).await;
    let second = timers.arm(PeerId(1), Duration::from_millis(1000), fire_into(&tx));
    assert_eq!(timers.len(), 1);
    advance(Duration::from_millis(5000)).await;
    settle().await;
    assert_eq!(rx.try_recv().unwrap(), second);
    assert!(rx.try_recv().is_err());
    assert!(!timers.claim(first));
    assert!(timers.claim(second));
  }

  #[tokio::test(start_paused = true)]
  async fn stale_ticket_is_refused() {
    let mut timers = SuspicionTimerSet::new();
    let first = timers.arm(PeerId(1), Duration::from_millis(10), |_| {});
    let second = timers.arm(PeerId(1), Duration::from_millis(10), |_| {});
    assert_ne!(first, second);
    assert!(!timers.claim(first));
    assert!(timers.is_armed(PeerId(1)));
    assert!(timers.claim(second));
  }

  #[tokio::test(start_paused = true)]
  async fn peers_are_independent_and_cancel_all_silences_everything() {
    let (tx, mut rx) = sink();
    let mut timers = SuspicionTimerSet::new();
    timers.arm(PeerId(1), Duration::from_millis(100), fire_into(&tx));
    timers.arm(PeerId(2), Duration::from_millis(100), fire_into(&tx));
    timers.arm(PeerId(3), Duration::from_millis(100), fire_into(&tx));
    assert_eq!(timers.len(), 3);
    assert!(timers.cancel(PeerId(2)));
    assert!(!timers.cancel(PeerId(2)));
    advance(Duration::from_millis(200)).await;
    settle().await;
    let mut fired = vec![rx.try_recv().unwrap().peer, rx.try_recv().unwrap().peer];
    fired.sort();
    assert_eq!(fired, vec![PeerId(1), PeerId(3)]);

    timers.arm(PeerId(4), Duration::from_millis(100), fire_into(&tx));
    timers.arm(PeerId(5), Duration::from_millis(100), fire_into(&tx));
    timers.cancel_all();
    assert!(timers.is_empty());
    advance(Duration::from_millis(200)).await;
    settle().await;
    assert!(rx.try_recv().is_err());
  }
}

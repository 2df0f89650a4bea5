use crate::membership::PeerId;
use rand::seq::IteratorRandom;
use rand::Rng;
use std::iter::FromIterator;
use std::sync::{Arc, PoisonError, RwLock};

/// The set of peer ids a cluster is known to contain, as handed out by whoever bootstraps it.
///
/// Agents only ever read the directory through [`PeerDirectory::snapshot`], an immutable copy that
/// stays fixed for the duration of one decision. The bootstrap side may [`add`](Self::add) peers
/// later; agents pick that up on their next read, which also moves the quorum threshold for
/// suspicions already in progress.
#[derive(Clone, Debug, Default)]
pub struct PeerDirectory {
  peers: Arc<RwLock<im::OrdSet<PeerId>>>,
}
impl PeerDirectory {
  /// A directory holding `peers`.
  pub fn new<I: IntoIterator<Item = PeerId>>(peers: I) -> Self {
    PeerDirectory {
      peers: Arc::new(RwLock::new(peers.into_iter().collect())),
    }
  }

  /// An immutable copy of the current peer set.
  pub fn snapshot(&self) -> im::OrdSet<PeerId> {
    self.peers.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Adds a peer, returning whether it was new.
  pub fn add(&self, peer: PeerId) -> bool {
    let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
    peers.insert(peer).is_none()
  }

  /// The cluster size used for quorum arithmetic, the local agent included.
  pub fn len(&self) -> usize {
    self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Whether the directory names no peer at all.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
impl FromIterator<PeerId> for PeerDirectory {
  fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
    PeerDirectory::new(iter)
  }
}

/// Picks `count` distinct peers uniformly at random from `peers`, never `me`.
pub(crate) fn sample_others<R: Rng + ?Sized>(
  peers: &im::OrdSet<PeerId>,
  me: PeerId,
  count: usize,
  rng: &mut R,
) -> Vec<PeerId> {
  peers
    .iter()
    .copied()
    .filter(|p| *p != me)
    .choose_multiple(rng, count)
}

use crate::error::{DetectorError, Result};
use crate::membership::{MembershipRecord, PeerId, Timestamp};
use std::collections::BTreeMap;
use std::time::Duration;

/// Maps every peer an agent has observed to what the agent knows about it.
#[derive(Clone, Debug)]
pub struct MembershipTable {
  owner: PeerId,
  records: BTreeMap<PeerId, MembershipRecord>,
}
impl MembershipTable {
  /// An empty table belonging to `owner`.
  pub fn new(owner: PeerId) -> Self {
    MembershipTable {
      owner: owner,
      records: BTreeMap::new(),
    }
  }

  /// A table preloaded with a bootstrap snapshot. Later duplicates of the same id are merged.
  pub fn seeded<I>(owner: PeerId, seed: I) -> Self
  where
    I: IntoIterator<Item = MembershipRecord>,
  {
    let mut table = Self::new(owner);
    for record in seed {
      table.merge(record);
    }
    table
  }

  /// The agent this table belongs to.
  pub fn owner(&self) -> PeerId {
    self.owner
  }

  /// Folds an incoming record into the table, returning whether anything moved forward.
  ///
  /// Unknown peers are inserted as they arrive. For known peers, the heartbeat counter and the
  /// last-seen timestamp each become the maximum of the local and incoming values; the incoming
  /// corroborators are ignored because they are the sender's belief, not ours.
  pub fn merge(&mut self, incoming: MembershipRecord) -> bool {
    match self.records.get_mut(&incoming.peer_id) {
      None => {
        self.records.insert(incoming.peer_id, incoming);
        true
      }
      Some(local) => {
        let mut changed = false;
        if incoming.heartbeat_counter > local.heartbeat_counter {
          local.heartbeat_counter = incoming.heartbeat_counter;
          changed = true;
        }
        if incoming.last_seen_at > local.last_seen_at {
          local.last_seen_at = incoming.last_seen_at;
          changed = true;
        }
        changed
      }
    }
  }

  /// Advances the owner's own record, creating it on the first tick.
  pub fn self_tick(&mut self, now: Timestamp) -> &MembershipRecord {
    let owner = self.owner;
    let record = self
      .records
      .entry(owner)
      .or_insert_with(|| MembershipRecord::new(owner, 0, now));
    record.heartbeat_counter += 1;
    record.last_seen_at = record.last_seen_at.max(now);
    record
  }

  /// The record for `peer`.
  pub fn get(&self, peer: PeerId) -> Result<&MembershipRecord> {
    self.records.get(&peer).ok_or(DetectorError::NotFound(peer))
  }

  /// Every record, ordered by peer id.
  pub fn all(&self) -> impl Iterator<Item = &MembershipRecord> {
    self.records.values()
  }

  /// Copies of every record, as carried by heartbeat and gossip messages.
  pub fn snapshot(&self) -> Vec<MembershipRecord> {
    self.records.values().cloned().collect()
  }

  /// Whether the table has a record for `peer`.
  pub fn contains(&self, peer: PeerId) -> bool {
    self.records.contains_key(&peer)
  }

  /// The number of peers in the table, the owner included once it has ticked.
  pub fn len(&self) -> usize {
    self.records.len()
  }

  /// Whether the table holds no records at all.
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Records `corroborator` as agreeing that `peer` went quiet. Returns whether it is new.
  pub fn add_suspect_ack(&mut self, peer: PeerId, corroborator: PeerId) -> Result<bool> {
    let record = self
      .records
      .get_mut(&peer)
      .ok_or(DetectorError::NotFound(peer))?;
    Ok(record.suspect_acks.insert(corroborator).is_none())
  }

  /// Whether more than `timeout` has passed at `now` since `peer` last ticked.
  pub fn is_stale(&self, peer: PeerId, now: Timestamp, timeout: Duration) -> Result<bool> {
    Ok(self.get(peer)?.last_seen_at.elapsed_at(now) > timeout)
  }
}

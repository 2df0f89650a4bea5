//! The per-agent membership table and the records it holds.
//!
//! A [`MembershipTable`] maps every peer an agent has ever heard of to a [`MembershipRecord`].
//! Records travel between agents inside heartbeat and gossip messages and are folded into the
//! receiver's table with [`MembershipTable::merge`], which takes the field-wise maximum of the
//! heartbeat counter and the last-seen timestamp. That merge is commutative and idempotent, so
//! tables converge no matter how messages are reordered, duplicated or lost.
//!
//! ### Trust
//! Records are not authenticated. A faulty or malicious peer can report any counter or timestamp
//! it likes, and the merge will accept any value higher than the local one.

mod record;
mod table;

#[rustfmt::skip]
pub use {
  record::MembershipRecord,
  record::PeerId,
  record::Timestamp,
  table::MembershipTable,
};

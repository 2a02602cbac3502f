// Copyright 2024. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! The speculative overlay that lets several transactions in one block reference each other's
//! not-yet-committed outputs. It composes over the committed store as a lookup layer: a hit in
//! the pool shadows the store, a miss falls through. Entries carry the sequence number of the
//! transaction that wrote them, so a failed or replaced speculation can be displaced by a
//! strictly later transaction and the whole batch can be swept on promotion or abandonment.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use origami_common_types::{FixedHash, TxId};

use super::{
    backend::{PeerBackend, StoredOutput, TxHeaderRecord},
    error::LedgerDbError,
};
use crate::transactions::activity::ActivityProof;

pub const LOG_TARGET: &str = "c::ldb::unconfirmed_pool";

/// A speculative output row, shadowing (or preceding) a committed one.
#[derive(Debug, Clone)]
pub struct TempOutput {
    pub output: StoredOutput,
    pub id: u64,
    pub used: u8,
    pub tx_num: TxId,
}

/// Counters the pool advances instead of the context while a batch is being speculated, so that
/// id assignment matches what the later serial commit will produce.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeculativeCounters {
    pub current_outputs: usize,
    pub current_users: usize,
    pub output_pointer: usize,
}

#[derive(Default)]
pub struct UnconfirmedPool {
    entries: HashMap<FixedHash, TempOutput>,
    activities: BTreeMap<u32, ActivityProof>,
    counters: Option<SpeculativeCounters>,
}

impl UnconfirmedPool {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.activities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, header: &FixedHash) -> Option<&TempOutput> {
        self.entries.get(header)
    }

    /// Pool-first lookup over the committed store.
    pub fn lookup(&self, header: &FixedHash, committed: &dyn PeerBackend) -> Option<(StoredOutput, u8, u64)> {
        if let Some(entry) = self.entries.get(header) {
            return Some((entry.output.clone(), entry.used, entry.id));
        }
        committed.fetch_output_by_header(header)
    }

    pub fn header_exists(&self, header: &FixedHash) -> bool {
        self.entries.contains_key(header)
    }

    pub fn public_key_exists(&self, pk: &[u8]) -> bool {
        self.entries.values().any(|e| e.output.public_key() == pk)
    }

    /// Insert a speculative output. A header already committed can never be speculated again; a
    /// pool entry written by the same or an earlier transaction holds its slot, while one written
    /// by a strictly later transaction is displaced.
    pub fn insert(&mut self, entry: TempOutput, committed: &dyn PeerBackend) -> Result<(), LedgerDbError> {
        let header = *entry.output.header();
        if committed.header_exists(&header) {
            return Err(LedgerDbError::DuplicateHeader);
        }
        if let Some(existing) = self.entries.get(&header) {
            if existing.tx_num <= entry.tx_num {
                return Err(LedgerDbError::DuplicateHeader);
            }
            debug!(
                target: LOG_TARGET,
                "Displacing speculative output {} written by tx {}", header, existing.tx_num
            );
        }
        self.entries.insert(header, entry);
        Ok(())
    }

    /// The account-refresh path: replace the entry keyed by `old_header` with one keyed by the
    /// refreshed row's header, preserving the row id. The old row may still live in the committed
    /// store, in which case its id is taken from there.
    pub fn refresh(
        &mut self,
        old_header: &FixedHash,
        output: StoredOutput,
        tx_num: TxId,
        committed: &dyn PeerBackend,
    ) -> Result<(), LedgerDbError> {
        let id = match self.entries.remove(old_header) {
            Some(entry) => entry.id,
            None => {
                let (_, _, id) = self
                    .lookup(old_header, committed)
                    .ok_or(LedgerDbError::OutputNotFound(0))?;
                id
            },
        };
        let header = *output.header();
        self.entries.insert(header, TempOutput {
            output,
            id,
            used: 0,
            tx_num,
        });
        Ok(())
    }

    /// Mark an input spent within the batch. A committed row is copied into the pool so that
    /// later transactions in the batch see the marker without the store being touched.
    pub fn mark_spent(&mut self, header: &FixedHash, tx_num: TxId, committed: &dyn PeerBackend) -> Result<(), LedgerDbError> {
        if let Some(entry) = self.entries.get_mut(header) {
            entry.used = entry.used.saturating_add(1);
            return Ok(());
        }
        let (output, used, id) = committed
            .fetch_output_by_header(header)
            .ok_or(LedgerDbError::OutputNotFound(0))?;
        self.entries.insert(*header, TempOutput {
            output,
            id,
            used: used.saturating_add(1),
            tx_num,
        });
        Ok(())
    }

    /// Record a speculated transaction's activity so accumulated histories can be rebuilt before
    /// the transaction header is committed.
    pub fn record_activity(&mut self, tx_num: TxId, activity: ActivityProof) {
        self.activities.insert(tx_num.as_u32(), activity);
    }

    pub fn activity(&self, tx_num: TxId) -> Option<&ActivityProof> {
        self.activities.get(&tx_num.as_u32())
    }

    /// Pool-first lookup that also reconstitutes the row's accumulated activity history from its
    /// transaction list: speculative activities first, committed transaction headers as the
    /// fallback.
    pub fn lookup_with_udelta(
        &self,
        header: &FixedHash,
        committed: &dyn PeerBackend,
    ) -> Option<(StoredOutput, u8, u64)> {
        let (row, used, id) = self.lookup(header, committed)?;
        let row = match row {
            StoredOutput::Accumulated {
                header,
                pk,
                n,
                payload,
                sig,
                txns,
                ..
            } => {
                let mut udelta = Vec::with_capacity(txns.len() * 33);
                for txn in &txns {
                    match self.activity(*txn) {
                        Some(activity) => udelta.extend_from_slice(activity.as_bytes()),
                        None => match committed.fetch_tx_header(*txn) {
                            Some(TxHeaderRecord::AccountAggregated { activity, .. }) => {
                                udelta.extend_from_slice(activity.as_bytes())
                            },
                            _ => return None,
                        },
                    }
                }
                StoredOutput::Accumulated {
                    header,
                    pk,
                    n,
                    payload,
                    sig,
                    txns,
                    udelta,
                }
            },
            plain => plain,
        };
        Some((row, used, id))
    }

    /// Sweep every entry and activity written by transactions up to and including `tx_num`. Used
    /// both when a batch is promoted into the committed store and when it is abandoned.
    pub fn delete_up_to(&mut self, tx_num: TxId) {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.tx_num > tx_num);
        self.activities.retain(|txn, _| TxId::from(*txn) > tx_num);
        if self.is_empty() {
            self.counters = None;
        }
        debug!(
            target: LOG_TARGET,
            "Swept {} speculative outputs up to tx {}",
            before - self.entries.len(),
            tx_num
        );
    }

    /// The speculative counter set, snapshotted from the committed counters on first use.
    pub fn counters(&mut self, snapshot: SpeculativeCounters) -> &mut SpeculativeCounters {
        self.counters.get_or_insert(snapshot)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::TxModel,
        ledger_db::{MemoryPeerDatabase, PeerDbFlavor},
    };

    fn plain(header: [u8; 32]) -> StoredOutput {
        StoredOutput::Plain {
            header: FixedHash::from(header),
            pk: header[..4].to_vec(),
            n: 1,
            payload: vec![0u8; 4],
        }
    }

    fn entry(header: [u8; 32], id: u64, tx_num: u32) -> TempOutput {
        TempOutput {
            output: plain(header),
            id,
            used: 0,
            tx_num: tx_num.into(),
        }
    }

    #[test]
    fn committed_headers_cannot_be_speculated() {
        let mut store = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoClassic), true);
        store.insert_output(0, plain([1u8; 32])).unwrap();
        let mut pool = UnconfirmedPool::new();
        let err = pool.insert(entry([1u8; 32], 1, 0), &store).unwrap_err();
        assert!(matches!(err, LedgerDbError::DuplicateHeader));
    }

    #[test]
    fn earlier_entries_hold_their_slot_and_later_ones_are_displaced() {
        let store = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoClassic), true);
        let mut pool = UnconfirmedPool::new();
        pool.insert(entry([1u8; 32], 0, 3), &store).unwrap();
        // same slot, later tx: rejected
        let err = pool.insert(entry([1u8; 32], 1, 5), &store).unwrap_err();
        assert!(matches!(err, LedgerDbError::DuplicateHeader));
        // same slot, earlier tx: displaces
        pool.insert(entry([1u8; 32], 2, 1), &store).unwrap();
        assert_eq!(pool.get(&FixedHash::from([1u8; 32])).unwrap().id, 2);
    }

    #[test]
    fn lookup_prefers_the_pool_and_falls_through() {
        let mut store = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoClassic), true);
        store.insert_output(9, plain([9u8; 32])).unwrap();
        let mut pool = UnconfirmedPool::new();
        pool.insert(entry([1u8; 32], 0, 0), &store).unwrap();

        let (_, _, id) = pool.lookup(&FixedHash::from([1u8; 32]), &store).unwrap();
        assert_eq!(id, 0);
        let (_, _, id) = pool.lookup(&FixedHash::from([9u8; 32]), &store).unwrap();
        assert_eq!(id, 9);
        assert!(pool.lookup(&FixedHash::from([7u8; 32]), &store).is_none());
    }

    #[test]
    fn mark_spent_copies_committed_rows_into_the_pool() {
        let mut store = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoClassic), true);
        store.insert_output(4, plain([4u8; 32])).unwrap();
        let mut pool = UnconfirmedPool::new();
        pool.mark_spent(&FixedHash::from([4u8; 32]), TxId::from(0u32), &store).unwrap();
        let (_, used, _) = pool.lookup(&FixedHash::from([4u8; 32]), &store).unwrap();
        assert_eq!(used, 1);
        // the committed store itself is untouched
        let (_, used, _) = store.fetch_output_by_header(&FixedHash::from([4u8; 32])).unwrap();
        assert_eq!(used, 0);
    }

    #[test]
    fn sweep_removes_entries_up_to_a_transaction() {
        let store = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoClassic), true);
        let mut pool = UnconfirmedPool::new();
        pool.insert(entry([1u8; 32], 0, 0), &store).unwrap();
        pool.insert(entry([2u8; 32], 1, 1), &store).unwrap();
        pool.insert(entry([3u8; 32], 2, 2), &store).unwrap();
        pool.delete_up_to(TxId::from(1u32));
        assert_eq!(pool.len(), 1);
        assert!(pool.get(&FixedHash::from([3u8; 32])).is_some());
        pool.delete_up_to(TxId::from(2u32));
        assert!(pool.is_empty());
    }
}

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

//! In-memory reference backends. They enforce the same unique constraints a durable engine would
//! declare on its schema, and honour the `indexing_enabled` switch by degrading header and
//! public-key lookups to scans when it is off.

use std::collections::{BTreeMap, HashMap};

use origami_common_types::{FixedHash, TxId};

use super::{
    backend::{AccountRefresh, ClientBackend, PeerBackend, StoredOutput, TxHeaderRecord, UserRecord},
    error::LedgerDbError,
};
use crate::config::TxModel;

/// The schema flavour a peer store runs under, derived from the transaction model.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerDbFlavor {
    /// Rows carry signature, transaction list and accumulated activity (model 6).
    pub provenance_rows: bool,
    /// The public-key index is unique (models 5 and 6).
    pub unique_public_keys: bool,
}

impl PeerDbFlavor {
    pub fn for_model(model: TxModel) -> Self {
        Self {
            provenance_rows: model.tracks_provenance(),
            unique_public_keys: model.unique_public_keys(),
        }
    }
}

#[derive(Default)]
pub struct MemoryPeerDatabase {
    flavor: PeerDbFlavor,
    indexing_enabled: bool,
    outputs: BTreeMap<u64, (StoredOutput, u8)>,
    header_index: HashMap<FixedHash, u64>,
    pk_index: HashMap<Vec<u8>, Vec<u64>>,
    tx_headers: BTreeMap<u32, TxHeaderRecord>,
}

impl MemoryPeerDatabase {
    pub fn new(flavor: PeerDbFlavor, indexing_enabled: bool) -> Self {
        Self {
            flavor,
            indexing_enabled,
            ..Default::default()
        }
    }

    fn find_by_header(&self, header: &FixedHash) -> Option<u64> {
        if self.indexing_enabled {
            self.header_index.get(header).copied()
        } else {
            self.outputs
                .iter()
                .find(|(_, (row, _))| row.header() == header)
                .map(|(id, _)| *id)
        }
    }

    fn find_by_public_key(&self, pk: &[u8]) -> Option<u64> {
        if self.indexing_enabled {
            self.pk_index.get(pk).and_then(|ids| ids.first().copied())
        } else {
            self.outputs
                .iter()
                .find(|(_, (row, _))| row.public_key() == pk)
                .map(|(id, _)| *id)
        }
    }

    fn index_row(&mut self, id: u64, row: &StoredOutput) {
        if !self.indexing_enabled {
            return;
        }
        self.header_index.insert(*row.header(), id);
        self.pk_index.entry(row.public_key().to_vec()).or_default().push(id);
    }

    fn deindex_row(&mut self, id: u64, row: &StoredOutput) {
        if !self.indexing_enabled {
            return;
        }
        self.header_index.remove(row.header());
        if let Some(ids) = self.pk_index.get_mut(row.public_key()) {
            ids.retain(|i| *i != id);
            if ids.is_empty() {
                self.pk_index.remove(row.public_key());
            }
        }
    }
}

impl PeerBackend for MemoryPeerDatabase {
    fn insert_output(&mut self, id: u64, output: StoredOutput) -> Result<(), LedgerDbError> {
        if self.outputs.contains_key(&id) {
            return Err(LedgerDbError::DuplicateId(id));
        }
        if self.find_by_header(output.header()).is_some() {
            return Err(LedgerDbError::DuplicateHeader);
        }
        if self.flavor.unique_public_keys && self.find_by_public_key(output.public_key()).is_some() {
            return Err(LedgerDbError::DuplicatePublicKey);
        }
        if self.flavor.provenance_rows != matches!(output, StoredOutput::Accumulated { .. }) {
            return Err(LedgerDbError::CorruptRow("row shape does not match the schema".into()));
        }
        self.index_row(id, &output);
        self.outputs.insert(id, (output, 0));
        Ok(())
    }

    fn delete_output(&mut self, id: u64) -> Result<(), LedgerDbError> {
        let (row, _) = self.outputs.remove(&id).ok_or(LedgerDbError::OutputNotFound(id))?;
        self.deindex_row(id, &row);
        Ok(())
    }

    fn mark_used(&mut self, id: u64) -> Result<(), LedgerDbError> {
        let (_, used) = self.outputs.get_mut(&id).ok_or(LedgerDbError::OutputNotFound(id))?;
        *used = used.saturating_add(1);
        Ok(())
    }

    fn update_output(&mut self, id: u64, refresh: AccountRefresh) -> Result<(), LedgerDbError> {
        let (row, _) = self.outputs.get(&id).ok_or(LedgerDbError::OutputNotFound(id))?;
        let pk = match row {
            StoredOutput::Accumulated { pk, .. } => pk.clone(),
            StoredOutput::Plain { .. } => {
                return Err(LedgerDbError::CorruptRow("refresh on a row without provenance".into()))
            },
        };
        let old = row.clone();
        let new_row = StoredOutput::Accumulated {
            header: refresh.header,
            pk,
            n: refresh.n,
            payload: refresh.payload,
            sig: refresh.sig,
            txns: refresh.txns,
            udelta: refresh.udelta,
        };
        self.deindex_row(id, &old);
        self.index_row(id, &new_row);
        self.outputs.insert(id, (new_row, 0));
        Ok(())
    }

    fn fetch_output_by_header(&self, header: &FixedHash) -> Option<(StoredOutput, u8, u64)> {
        let id = self.find_by_header(header)?;
        let (row, used) = self.outputs.get(&id)?;
        Some((row.clone(), *used, id))
    }

    fn fetch_output(&self, id: u64) -> Option<(StoredOutput, u8)> {
        self.outputs.get(&id).map(|(row, used)| (row.clone(), *used))
    }

    fn header_exists(&self, header: &FixedHash) -> bool {
        self.find_by_header(header).is_some()
    }

    fn public_key_exists(&self, pk: &[u8]) -> bool {
        self.find_by_public_key(pk).is_some()
    }

    fn insert_tx_header(&mut self, txn: TxId, record: TxHeaderRecord) -> Result<(), LedgerDbError> {
        if self.tx_headers.contains_key(&txn.as_u32()) {
            return Err(LedgerDbError::DuplicateId(u64::from(txn.as_u32())));
        }
        self.tx_headers.insert(txn.as_u32(), record);
        Ok(())
    }

    fn fetch_tx_header(&self, txn: TxId) -> Option<TxHeaderRecord> {
        self.tx_headers.get(&txn.as_u32()).cloned()
    }

    fn tx_header_count(&self) -> usize {
        self.tx_headers.len()
    }

    fn output_ids(&self) -> Vec<u64> {
        self.outputs.keys().copied().collect()
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }
}

#[derive(Default)]
pub struct MemoryClientDatabase {
    indexing_enabled: bool,
    users: BTreeMap<u64, UserRecord>,
    header_index: HashMap<FixedHash, u64>,
}

impl MemoryClientDatabase {
    pub fn new(indexing_enabled: bool) -> Self {
        Self {
            indexing_enabled,
            ..Default::default()
        }
    }

    fn find_by_header(&self, header: &FixedHash) -> Option<u64> {
        if self.indexing_enabled {
            self.header_index.get(header).copied()
        } else {
            self.users.iter().find(|(_, u)| u.header == *header).map(|(id, _)| *id)
        }
    }
}

impl ClientBackend for MemoryClientDatabase {
    fn insert_user(&mut self, id: u64, user: UserRecord) -> Result<(), LedgerDbError> {
        if self.users.contains_key(&id) {
            return Err(LedgerDbError::DuplicateUser(id));
        }
        if self.indexing_enabled {
            self.header_index.insert(user.header, id);
        }
        self.users.insert(id, user);
        Ok(())
    }

    fn fetch_user(&self, id: u64) -> Option<UserRecord> {
        self.users.get(&id).cloned()
    }

    fn update_user(&mut self, id: u64, user: UserRecord) -> Result<(), LedgerDbError> {
        let old = self.users.get(&id).ok_or(LedgerDbError::UserNotFound(id))?;
        if self.indexing_enabled {
            self.header_index.remove(&old.header);
            self.header_index.insert(user.header, id);
        }
        self.users.insert(id, user);
        Ok(())
    }

    fn fetch_user_by_header(&self, header: &FixedHash) -> Option<UserRecord> {
        let id = self.find_by_header(header)?;
        self.users.get(&id).cloned()
    }

    fn update_user_by_header(&mut self, header: &FixedHash, user: UserRecord) -> Result<(), LedgerDbError> {
        let id = self
            .find_by_header(header)
            .ok_or(LedgerDbError::UserNotFound(user.id))?;
        self.update_user(id, user)
    }

    fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn plain(header: [u8; 32], pk: &[u8]) -> StoredOutput {
        StoredOutput::Plain {
            header: FixedHash::from(header),
            pk: pk.to_vec(),
            n: 1,
            payload: vec![0u8; 8],
        }
    }

    #[test]
    fn enforces_unique_headers() {
        let mut db = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoClassic), true);
        db.insert_output(0, plain([1u8; 32], b"pk-a")).unwrap();
        let err = db.insert_output(1, plain([1u8; 32], b"pk-b")).unwrap_err();
        assert!(matches!(err, LedgerDbError::DuplicateHeader));
    }

    #[test]
    fn enforces_unique_public_keys_only_where_the_schema_says_so() {
        let mut db = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoOrigami), true);
        db.insert_output(0, plain([1u8; 32], b"pk-a")).unwrap();
        let err = db.insert_output(1, plain([2u8; 32], b"pk-a")).unwrap_err();
        assert!(matches!(err, LedgerDbError::DuplicatePublicKey));

        let mut db = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::AccClassic), true);
        db.insert_output(0, plain([1u8; 32], b"pk-a")).unwrap();
        db.insert_output(1, plain([2u8; 32], b"pk-a")).unwrap();
    }

    #[test]
    fn lookups_work_without_indices() {
        let mut db = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoClassic), false);
        db.insert_output(7, plain([3u8; 32], b"pk-c")).unwrap();
        let (row, used, id) = db.fetch_output_by_header(&FixedHash::from([3u8; 32])).unwrap();
        assert_eq!(row.public_key(), b"pk-c");
        assert_eq!(used, 0);
        assert_eq!(id, 7);
        assert!(db.public_key_exists(b"pk-c"));
        assert!(!db.public_key_exists(b"pk-d"));
    }

    #[test]
    fn mark_used_and_delete() {
        let mut db = MemoryPeerDatabase::new(PeerDbFlavor::for_model(TxModel::UtxoClassic), true);
        db.insert_output(0, plain([1u8; 32], b"pk-a")).unwrap();
        db.mark_used(0).unwrap();
        let (_, used) = db.fetch_output(0).unwrap();
        assert_eq!(used, 1);
        db.delete_output(0).unwrap();
        assert!(db.fetch_output(0).is_none());
        assert!(!db.header_exists(&FixedHash::from([1u8; 32])));
        assert!(matches!(db.mark_used(0), Err(LedgerDbError::OutputNotFound(0))));
    }

    #[test]
    fn client_reindexes_on_update() {
        let mut db = MemoryClientDatabase::new(true);
        let mut user = UserRecord {
            id: 0,
            header: FixedHash::from([1u8; 32]),
            ..Default::default()
        };
        db.insert_user(0, user.clone()).unwrap();
        user.header = FixedHash::from([2u8; 32]);
        db.update_user(0, user).unwrap();
        assert!(db.fetch_user_by_header(&FixedHash::from([1u8; 32])).is_none());
        assert!(db.fetch_user_by_header(&FixedHash::from([2u8; 32])).is_some());
    }
}

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

//! The repository contracts the core verifies against. Any engine that honours these traits can
//! stand in for the in-memory reference backend; the core never assumes more than what is here.

use origami_common_types::{FixedHash, TxId};

use super::error::LedgerDbError;
use crate::transactions::activity::ActivityProof;

/// A user's view of one of its outputs, as held by a client store (secret material included) or
/// assembled by a peer during verification (public material only). `keys` is the persisted
/// `pk ‖ sk` concatenation on the client and just `pk` on a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub id: u64,
    pub header: FixedHash,
    pub n: u8,
    pub keys: Vec<u8>,
    pub payload: Vec<u8>,
    pub udelta: Vec<u8>,
    pub txns: Vec<TxId>,
    pub sig: Vec<u8>,
}

/// A committed output row. Most models persist only the identifying fields; the aggregated
/// account model additionally carries the row's own provenance so the whole ledger can be
/// re-verified from user state alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredOutput {
    Plain {
        header: FixedHash,
        pk: Vec<u8>,
        n: u8,
        payload: Vec<u8>,
    },
    Accumulated {
        header: FixedHash,
        pk: Vec<u8>,
        n: u8,
        payload: Vec<u8>,
        sig: Vec<u8>,
        txns: Vec<TxId>,
        udelta: Vec<u8>,
    },
}

impl StoredOutput {
    pub fn header(&self) -> &FixedHash {
        match self {
            StoredOutput::Plain { header, .. } | StoredOutput::Accumulated { header, .. } => header,
        }
    }

    pub fn public_key(&self) -> &[u8] {
        match self {
            StoredOutput::Plain { pk, .. } | StoredOutput::Accumulated { pk, .. } => pk,
        }
    }

    pub fn counter(&self) -> u8 {
        match self {
            StoredOutput::Plain { n, .. } | StoredOutput::Accumulated { n, .. } => *n,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            StoredOutput::Plain { payload, .. } | StoredOutput::Accumulated { payload, .. } => payload,
        }
    }

    pub fn signature(&self) -> Option<&[u8]> {
        match self {
            StoredOutput::Plain { .. } => None,
            StoredOutput::Accumulated { sig, .. } => Some(sig),
        }
    }

    pub fn txns(&self) -> &[TxId] {
        match self {
            StoredOutput::Plain { .. } => &[],
            StoredOutput::Accumulated { txns, .. } => txns,
        }
    }

    pub fn udelta(&self) -> &[u8] {
        match self {
            StoredOutput::Plain { .. } => &[],
            StoredOutput::Accumulated { udelta, .. } => udelta,
        }
    }

    /// The peer-side user view of this row. `keys` holds the public key only.
    pub fn as_user(&self, id: u64) -> UserRecord {
        UserRecord {
            id,
            header: *self.header(),
            n: self.counter(),
            keys: self.public_key().to_vec(),
            payload: self.payload().to_vec(),
            udelta: self.udelta().to_vec(),
            txns: self.txns().to_vec(),
            sig: self.signature().map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }
}

/// The fields an aggregated-account refresh replaces on an existing row. The row id and public
/// key are stable across refreshes.
#[derive(Debug, Clone)]
pub struct AccountRefresh {
    pub header: FixedHash,
    pub n: u8,
    pub payload: Vec<u8>,
    pub sig: Vec<u8>,
    pub txns: Vec<TxId>,
    pub udelta: Vec<u8>,
}

/// A committed transaction header, in one of the three persisted flavours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxHeaderRecord {
    /// Models 1-4: the concatenated signatures plus the ids of the rows consumed and created.
    Classic {
        sig_all: Vec<u8>,
        input_ids: Vec<u8>,
        output_ids: Vec<u8>,
    },
    /// Model 5: the per-transaction aggregate proof.
    Aggregated {
        activity: ActivityProof,
        excess: Vec<u8>,
        sig: Vec<u8>,
    },
    /// Model 6: the activity and the ids of every affected account.
    AccountAggregated {
        activity: ActivityProof,
        output_ids: Vec<u8>,
    },
}

/// Pack output ids as little-endian 32-bit integers, the layout id lists are persisted in.
pub fn pack_ids(ids: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ids.len() * 4);
    for id in ids {
        buf.extend_from_slice(&(*id as u32).to_le_bytes());
    }
    buf
}

pub fn unpack_ids(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(4)
        .map(|c| u64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
        .collect()
}

/// The repository a client keeps its own outputs and secret material in.
pub trait ClientBackend {
    fn insert_user(&mut self, id: u64, user: UserRecord) -> Result<(), LedgerDbError>;
    fn fetch_user(&self, id: u64) -> Option<UserRecord>;
    fn update_user(&mut self, id: u64, user: UserRecord) -> Result<(), LedgerDbError>;
    fn fetch_user_by_header(&self, header: &FixedHash) -> Option<UserRecord>;
    fn update_user_by_header(&mut self, header: &FixedHash, user: UserRecord) -> Result<(), LedgerDbError>;
    fn user_count(&self) -> usize;
}

/// The repository a peer verifies transactions against.
pub trait PeerBackend {
    fn insert_output(&mut self, id: u64, output: StoredOutput) -> Result<(), LedgerDbError>;
    fn delete_output(&mut self, id: u64) -> Result<(), LedgerDbError>;
    /// Increment the row's used marker. A committed input is only spendable while the marker is
    /// zero.
    fn mark_used(&mut self, id: u64) -> Result<(), LedgerDbError>;
    fn update_output(&mut self, id: u64, refresh: AccountRefresh) -> Result<(), LedgerDbError>;
    fn fetch_output_by_header(&self, header: &FixedHash) -> Option<(StoredOutput, u8, u64)>;
    fn fetch_output(&self, id: u64) -> Option<(StoredOutput, u8)>;
    fn header_exists(&self, header: &FixedHash) -> bool;
    fn public_key_exists(&self, pk: &[u8]) -> bool;
    fn insert_tx_header(&mut self, txn: TxId, record: TxHeaderRecord) -> Result<(), LedgerDbError>;
    fn fetch_tx_header(&self, txn: TxId) -> Option<TxHeaderRecord>;
    fn tx_header_count(&self) -> usize;
    /// All committed output ids in ascending order.
    fn output_ids(&self) -> Vec<u64>;
    fn output_count(&self) -> usize;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_packing_round_trips() {
        let ids = [0u64, 1, 250, 70_000];
        let packed = pack_ids(&ids);
        assert_eq!(packed.len(), 16);
        assert_eq!(unpack_ids(&packed), ids);
    }
}

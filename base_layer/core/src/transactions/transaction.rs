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

//! The end-to-end transaction facade: creation, canonical bytes, incoming verification (serial
//! and speculative), header persistence, identifiers and whole-ledger re-verification.

use std::convert::TryFrom;

use log::debug;
use origami_common_types::{FixedHash, TxId};
use rand::{rngs::OsRng, Rng};
use sha3::{Digest, Sha3_256};

use crate::{
    config::{Role, TxModel},
    context::ExeContext,
    crypto::SignatureOps,
    ledger_db::{pack_ids, unpack_ids, TxHeaderRecord, UserRecord},
    transactions::{
        app_data::{AppData, InputData, OutputData},
        error::TransactionError,
        tx_header::{account_payload, TxHeader},
    },
};

pub const LOG_TARGET: &str = "c::tx::transaction";

fn take<'a>(bytes: &'a [u8], pointer: &mut usize, len: usize) -> Result<&'a [u8], TransactionError> {
    let end = pointer.checked_add(len).ok_or(TransactionError::Decode)?;
    if end > bytes.len() {
        return Err(TransactionError::Decode);
    }
    let slice = &bytes[*pointer..end];
    *pointer = end;
    Ok(slice)
}

/// A complete transaction: its sequence position, its cryptographic header and the application
/// change it authorises.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub n: TxId,
    pub header: TxHeader,
    pub data: AppData,
}

impl ExeContext {
    /// Arrange a random application change and produce its header. Client role only: signing
    /// needs the secret material.
    pub fn random_transaction(&mut self) -> Result<Transaction, TransactionError> {
        let in_size = OsRng.gen_range(0..=self.config.avg_input_max);
        let out_size = OsRng.gen_range(0..self.config.avg_output_max) + 1;
        self.fixed_transaction(in_size, out_size)
    }

    /// Arrange a change with the requested sizes (the arranger may shrink them when the ledger
    /// cannot satisfy the request) and produce its header.
    pub fn fixed_transaction(&mut self, in_size: u8, out_size: u8) -> Result<Transaction, TransactionError> {
        let mut data = self.random_app_data(in_size, out_size)?;
        let header = self.create_tx_header(&mut data)?;
        Ok(Transaction {
            n: TxId::from(0u32),
            header,
            data,
        })
    }

    /// The uniqueness pass: headers must be pairwise distinct within the transaction, unknown to
    /// the committed store and the overlay, and in account models the same holds for new public
    /// keys.
    pub fn check_uniqueness(&self, tx: &Transaction) -> Result<(), TransactionError> {
        let data = &tx.data;
        for j in 0..data.inputs.len() {
            for l in j + 1..data.inputs.len() {
                if data.inputs[j].header == data.inputs[l].header {
                    return Err(TransactionError::DuplicateOutputs);
                }
            }
            for out in &data.outputs {
                if out.header == data.inputs[j].header {
                    return Err(TransactionError::DuplicateOutputs);
                }
            }
        }

        if self.config.role == Role::Peer {
            let db = self.peer()?;
            for out in &data.outputs {
                if db.header_exists(&out.header) || self.pool.header_exists(&out.header) {
                    return Err(TransactionError::DuplicateOutputs);
                }
            }
            if self.config.tx_model.is_account_based() {
                for out in data.outputs.iter().skip(data.inputs.len()) {
                    if db.public_key_exists(&out.pk) || self.pool.public_key_exists(&out.pk) {
                        return Err(TransactionError::DuplicatePublicKey);
                    }
                }
            }
        }

        if self.config.tx_model.is_account_based() {
            for j in 0..data.outputs.len() {
                for l in j + 1..data.outputs.len() {
                    if data.outputs[j].pk == data.outputs[l].pk {
                        return Err(TransactionError::DuplicatePublicKey);
                    }
                }
            }
        }
        Ok(())
    }

    /// Verify a raw incoming transaction against this context. On failure the context is left
    /// unchanged; committing is a separate step.
    pub fn verify_incoming_transaction(&mut self, tx: &mut Transaction) -> Result<(), TransactionError> {
        match self.config.role {
            Role::Peer => self.prepare_app_data_peer(&mut tx.data)?,
            Role::Client => self.prepare_app_data_client(&mut tx.data)?,
        }
        self.check_uniqueness(tx)?;
        self.verify_tx_header_of(tx)
    }

    /// The speculative variant: inputs may resolve to outputs of earlier transactions in the
    /// current batch that only exist in the overlay.
    pub fn verify_incoming_transaction_with_temp(&mut self, tx: &mut Transaction) -> Result<(), TransactionError> {
        self.prepare_app_data_peer_with_temps(&mut tx.data)?;
        self.check_uniqueness(tx)?;
        self.verify_tx_header_of(tx)
    }

    fn verify_tx_header_of(&self, tx: &mut Transaction) -> Result<(), TransactionError> {
        let Transaction {
            ref mut header,
            ref mut data,
            ..
        } = *tx;
        self.verify_tx_header(header, data)
    }

    /// Persist the header of a transaction that has been verified and committed. Assigns the
    /// next sequence position.
    pub fn insert_tx_header(&mut self, txn: TxId, tx: &Transaction) -> Result<(), TransactionError> {
        if self.config.role != Role::Peer {
            return Err(TransactionError::RoleRequired(Role::Peer));
        }
        let record = match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::AccClassic | TxModel::UtxoAccountable | TxModel::AccAccountable => {
                let mut sig_all = Vec::with_capacity(tx.header.sigs.len() * self.suite.signature_size());
                for sig in &tx.header.sigs {
                    sig_all.extend_from_slice(sig);
                }
                let input_ids: Vec<u64> = tx.data.inputs.iter().map(|i| i.user.id).collect();
                let output_ids: Vec<u64> = tx.data.outputs.iter().map(|o| o.user.id).collect();
                TxHeaderRecord::Classic {
                    sig_all,
                    input_ids: pack_ids(&input_ids),
                    output_ids: pack_ids(&output_ids),
                }
            },
            TxModel::UtxoOrigami => TxHeaderRecord::Aggregated {
                activity: tx.header.activity.ok_or(TransactionError::InvalidActivity)?,
                excess: tx.header.excess.clone().ok_or(TransactionError::InvalidActivity)?,
                sig: tx
                    .header
                    .sigs
                    .first()
                    .ok_or(TransactionError::InvalidTxHeader)?
                    .clone(),
            },
            TxModel::AccOrigami => {
                let activity = tx.header.activity.ok_or(TransactionError::InvalidActivity)?;
                let in_size = tx.data.inputs.len();
                let mut ids: Vec<u64> = tx.data.inputs.iter().map(|i| i.user.id).collect();
                ids.extend(tx.data.outputs.iter().skip(in_size).map(|o| o.user.id));
                TxHeaderRecord::AccountAggregated {
                    activity,
                    output_ids: pack_ids(&ids),
                }
            },
        };
        self.peer_mut()?.insert_tx_header(txn, record)?;
        self.total_tx += 1;
        debug!(target: LOG_TARGET, "Committed transaction header {}", txn);
        Ok(())
    }

    /// The 32-byte digest the surrounding block layer folds into its root hash.
    pub fn tx_header_identifier(&self, tx: &Transaction) -> Result<FixedHash, TransactionError> {
        let digest: [u8; 32] = match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::AccClassic | TxModel::UtxoAccountable | TxModel::AccAccountable => {
                let mut hasher = Sha3_256::new();
                hasher.update(self.to_bytes(tx));
                hasher.finalize().into()
            },
            TxModel::UtxoOrigami => {
                let activity = tx.header.activity.ok_or(TransactionError::InvalidActivity)?;
                let excess = tx.header.excess.as_ref().ok_or(TransactionError::InvalidActivity)?;
                let sig = tx.header.sigs.first().ok_or(TransactionError::InvalidTxHeader)?;
                let mut hasher = Sha3_256::new();
                hasher.update(activity.as_bytes());
                hasher.update(excess);
                hasher.update(sig);
                hasher.finalize().into()
            },
            TxModel::AccOrigami => {
                let activity = tx.header.activity.ok_or(TransactionError::InvalidActivity)?;
                let mut hasher = Sha3_256::new();
                hasher.update(activity.as_bytes());
                for out in &tx.data.outputs {
                    hasher.update(&out.pk);
                }
                hasher.finalize().into()
            },
        };
        Ok(FixedHash::from(digest))
    }

    /// The canonical inter-node byte format. Big-endian, no padding; account models omit key and
    /// counter for refreshed rows (the verifier recovers them from the consumed input).
    pub fn to_bytes(&self, tx: &Transaction) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(tx.data.inputs.len() as u8);
        buf.push(tx.data.outputs.len() as u8);
        for input in &tx.data.inputs {
            buf.extend_from_slice(input.header.as_slice());
        }
        for (i, out) in tx.data.outputs.iter().enumerate() {
            if i >= tx.data.inputs.len() || self.config.tx_model.carries_output_keys() {
                buf.extend_from_slice(&out.pk);
                buf.push(out.n);
            }
            buf.extend_from_slice(&out.payload);
        }
        buf.push(tx.header.sigs.len() as u8);
        for sig in &tx.header.sigs {
            buf.extend_from_slice(sig);
        }
        buf
    }

    /// Decode a canonical transaction. Every length prefix is validated against the remaining
    /// buffer; a short or oversold buffer rejects the transaction.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Transaction, TransactionError> {
        if bytes.len() <= 2 {
            return Err(TransactionError::Decode);
        }
        let pk_size = self.suite.public_key_size();
        let sig_size = self.suite.signature_size();
        let payload_size = usize::from(self.config.payload_size);

        let mut pointer = 0usize;
        let in_size = usize::from(take(bytes, &mut pointer, 1)?[0]);
        let out_size = usize::from(take(bytes, &mut pointer, 1)?[0]);

        let mut inputs = Vec::with_capacity(in_size);
        for _ in 0..in_size {
            let header =
                FixedHash::try_from(take(bytes, &mut pointer, 32)?).map_err(|_| TransactionError::Decode)?;
            inputs.push(InputData {
                header,
                user: UserRecord::default(),
            });
        }

        let mut outputs = Vec::with_capacity(out_size);
        for i in 0..out_size {
            let (pk, n) = if i >= in_size || self.config.tx_model.carries_output_keys() {
                let pk = take(bytes, &mut pointer, pk_size)?.to_vec();
                let n = take(bytes, &mut pointer, 1)?[0];
                (pk, n)
            } else {
                (Vec::new(), 0)
            };
            let payload = take(bytes, &mut pointer, payload_size)?.to_vec();
            outputs.push(OutputData {
                pk,
                n,
                payload,
                header: FixedHash::zero(),
                user: UserRecord::default(),
            });
        }

        let sig_count = usize::from(take(bytes, &mut pointer, 1)?[0]);
        let mut sigs = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            sigs.push(take(bytes, &mut pointer, sig_size)?.to_vec());
        }

        Ok(Transaction {
            n: TxId::from(0u32),
            header: TxHeader {
                sigs,
                ..Default::default()
            },
            data: AppData { inputs, outputs },
        })
    }

    /// Rebuild a committed classic transaction from the store.
    fn stored_transaction(&self, txn: TxId) -> Result<Transaction, TransactionError> {
        let db = self.peer()?;
        let record = db.fetch_tx_header(txn).ok_or(TransactionError::InvalidTxHeader)?;
        let (sig_all, input_ids, output_ids) = match record {
            TxHeaderRecord::Classic {
                sig_all,
                input_ids,
                output_ids,
            } => (sig_all, input_ids, output_ids),
            _ => return Err(TransactionError::InvalidTxHeader),
        };

        let mut inputs = Vec::new();
        for id in unpack_ids(&input_ids) {
            let (row, _) = db.fetch_output(id).ok_or(TransactionError::InvalidTxHeader)?;
            inputs.push(InputData {
                header: *row.header(),
                user: row.as_user(id),
            });
        }
        let mut outputs = Vec::new();
        for id in unpack_ids(&output_ids) {
            let (row, _) = db.fetch_output(id).ok_or(TransactionError::InvalidTxHeader)?;
            outputs.push(OutputData {
                pk: row.public_key().to_vec(),
                n: row.counter(),
                payload: row.payload().to_vec(),
                header: *row.header(),
                user: row.as_user(id),
            });
        }

        let sig_size = self.suite.signature_size();
        if sig_all.len() % sig_size != 0 {
            return Err(TransactionError::InvalidTxHeader);
        }
        let sigs = sig_all.chunks_exact(sig_size).map(<[u8]>::to_vec).collect();

        Ok(Transaction {
            n: txn,
            header: TxHeader {
                sigs,
                ..Default::default()
            },
            data: AppData { inputs, outputs },
        })
    }

    /// Re-verify the whole stored ledger from transaction zero, in commitment order. Classic
    /// models replay each transaction; the aggregated models check their per-transaction or
    /// per-user proofs plus the telescoped product identity between committed activities and the
    /// surviving output headers.
    pub fn verify_stored_all_transactions(&self) -> Result<(), TransactionError> {
        match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::AccClassic | TxModel::UtxoAccountable | TxModel::AccAccountable => {
                self.verify_stored_classic()
            },
            TxModel::UtxoOrigami => self.verify_stored_aggregated_utxo(),
            TxModel::AccOrigami => self.verify_stored_aggregated_acc(),
        }
    }

    fn verify_stored_classic(&self) -> Result<(), TransactionError> {
        let mut used = vec![0u8; self.current_outputs];
        let mut used_header: Vec<Option<FixedHash>> = vec![None; self.current_outputs];

        for txn in 0..self.total_tx {
            let mut tx = self.stored_transaction(TxId::from(txn))?;
            for j in 0..tx.data.inputs.len() {
                let id = tx.data.inputs[j].user.id as usize;
                if id >= used.len() {
                    return Err(TransactionError::InvalidTxHeader);
                }
                if used[id] != 0 && used_header[id] == Some(tx.data.inputs[j].header) {
                    return Err(TransactionError::DoubleSpend);
                }
                used[id] = used[id].saturating_add(1);
                used_header[id] = Some(tx.data.inputs[j].header);

                for l in j + 1..tx.data.inputs.len() {
                    if tx.data.inputs[j].header == tx.data.inputs[l].header {
                        return Err(TransactionError::DuplicateOutputs);
                    }
                }
                for out in &tx.data.outputs {
                    if tx.data.inputs[j].header == out.header {
                        return Err(TransactionError::DuplicateOutputs);
                    }
                }
            }
            if self.config.tx_model.is_account_based() {
                for j in 0..tx.data.outputs.len() {
                    for l in j + 1..tx.data.outputs.len() {
                        if tx.data.outputs[j].pk == tx.data.outputs[l].pk {
                            return Err(TransactionError::DuplicatePublicKey);
                        }
                    }
                }
            }
            self.verify_tx_header_of(&mut tx)?;
        }
        Ok(())
    }

    fn verify_stored_aggregated_utxo(&self) -> Result<(), TransactionError> {
        let db = self.peer()?;
        let modulus = self.modulus();
        let mut activity_prod = modulus.one();
        for txn in 0..self.total_tx {
            let record = db
                .fetch_tx_header(TxId::from(txn))
                .ok_or(TransactionError::InvalidTxHeader)?;
            let (activity, excess, sig) = match record {
                TxHeaderRecord::Aggregated { activity, excess, sig } => (activity, excess, sig),
                _ => return Err(TransactionError::InvalidTxHeader),
            };
            let mut msg = activity.to_vec();
            msg.extend_from_slice(&excess);
            if !self.suite.verify(&excess, &msg, &sig) {
                return Err(TransactionError::InvalidSignature);
            }
            activity_prod = modulus.mul(&activity_prod, &modulus.element(activity.as_bytes()));
        }

        // consumed outputs are deleted, so the committed activities telescope down to the product
        // of the surviving headers
        let mut header_prod = modulus.one();
        for id in db.output_ids() {
            let (row, _) = db.fetch_output(id).ok_or(TransactionError::InvalidTxHeader)?;
            header_prod = modulus.mul(&header_prod, &modulus.element(row.header().as_slice()));
        }
        if activity_prod != header_prod {
            return Err(TransactionError::ActivityProductMismatch);
        }
        Ok(())
    }

    fn verify_stored_aggregated_acc(&self) -> Result<(), TransactionError> {
        let db = self.peer()?;
        let modulus = self.modulus();

        let mut expected: Vec<Vec<u8>> = vec![Vec::new(); self.current_users];
        let mut activity_prod = modulus.one();
        for txn in 0..self.total_tx {
            let record = db
                .fetch_tx_header(TxId::from(txn))
                .ok_or(TransactionError::InvalidTxHeader)?;
            let (activity, output_ids) = match record {
                TxHeaderRecord::AccountAggregated { activity, output_ids } => (activity, output_ids),
                _ => return Err(TransactionError::InvalidTxHeader),
            };
            activity_prod = modulus.mul(&activity_prod, &modulus.element(activity.as_bytes()));

            let ids = unpack_ids(&output_ids);
            for i in 0..ids.len() {
                for j in i + 1..ids.len() {
                    if ids[i] == ids[j] {
                        return Err(TransactionError::ReusedPublicKey);
                    }
                }
            }
            for id in ids {
                let idx = id as usize;
                if idx >= expected.len() {
                    return Err(TransactionError::InvalidTxHeader);
                }
                expected[idx].extend_from_slice(activity.as_bytes());
            }
        }

        let mut header_prod = modulus.one();
        for (id, expected_udelta) in expected.iter().enumerate() {
            let (row, _) = db
                .fetch_output(id as u64)
                .ok_or(TransactionError::UserNotFound(id as u64))?;
            if row.udelta() != expected_udelta.as_slice() {
                return Err(TransactionError::UserActivityMismatch);
            }
            if usize::from(row.counter()) != row.txns().len() {
                return Err(TransactionError::UserTransactionCountMismatch);
            }
            header_prod = modulus.mul(&header_prod, &modulus.element(row.header().as_slice()));

            let msg = account_payload(row.public_key(), row.counter(), row.payload(), row.udelta());
            let sig = row.signature().ok_or(TransactionError::InvalidTxHeader)?;
            if !self.suite.verify(row.public_key(), &msg, sig) {
                return Err(TransactionError::InvalidSignature);
            }
        }
        if header_prod != activity_prod {
            return Err(TransactionError::ActivityProductMismatch);
        }
        Ok(())
    }
}

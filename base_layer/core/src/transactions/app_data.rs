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

//! Application-data arrangement: selecting the users a change touches, filling in owner material
//! from the stores, assigning output ids and applying the committed state transitions.

use log::warn;
use origami_common_types::{FixedHash, TxId};
use rand::{rngs::OsRng, Rng, RngCore};
use sha3::{Digest, Sha3_256};

use crate::{
    config::{Role, TxModel},
    context::ExeContext,
    crypto::{KeyPair, SignatureOps},
    ledger_db::{AccountRefresh, SpeculativeCounters, StoredOutput, TempOutput, UserRecord},
    transactions::{error::TransactionError, transaction::Transaction},
};

pub const LOG_TARGET: &str = "c::tx::app_data";

/// The unique identifier of an output. Changing the field order here breaks the ledger: producer
/// and verifier must hash identically.
pub fn output_header(pk: &[u8], n: u8, payload: &[u8]) -> FixedHash {
    let mut hasher = Sha3_256::new();
    hasher.update(pk);
    hasher.update([n]);
    hasher.update(payload);
    let digest: [u8; 32] = hasher.finalize().into();
    FixedHash::from(digest)
}

/// An output being consumed, referenced by its header. The owner material is filled in during
/// preparation.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    pub header: FixedHash,
    pub user: UserRecord,
}

/// An output being created. In account models the first `inputs.len()` outputs refresh the
/// corresponding input's account and inherit its public key.
#[derive(Debug, Clone, Default)]
pub struct OutputData {
    pub pk: Vec<u8>,
    pub n: u8,
    pub payload: Vec<u8>,
    pub header: FixedHash,
    pub user: UserRecord,
}

/// An application-level change: the inputs it consumes and the outputs it creates.
#[derive(Debug, Clone, Default)]
pub struct AppData {
    pub inputs: Vec<InputData>,
    pub outputs: Vec<OutputData>,
}

impl ExeContext {
    fn payload_size(&self) -> usize {
        usize::from(self.config.payload_size)
    }

    fn random_payload(&self) -> Vec<u8> {
        let mut payload = vec![0u8; self.payload_size()];
        OsRng.fill_bytes(&mut payload);
        payload
    }

    fn public_prefix(&self, keys: &[u8]) -> Vec<u8> {
        KeyPair::public_slice(keys, self.suite.public_key_size()).to_vec()
    }

    /// Arrange a random application change for this context's model.
    pub(crate) fn random_app_data(&mut self, in_size: u8, out_size: u8) -> Result<AppData, TransactionError> {
        match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::UtxoAccountable | TxModel::UtxoOrigami => {
                self.utxo_app_data(in_size, out_size)
            },
            TxModel::AccClassic | TxModel::AccAccountable | TxModel::AccOrigami => {
                self.acc_app_data(in_size, out_size)
            },
        }
    }

    /// UTXO arrangement. Inputs walk previously created outputs round-robin; each output belongs
    /// to a fresh key pair, or reuses its input's key with probability `1 / public_key_reuse`
    /// (never in the aggregated model, whose key index is unique).
    fn utxo_app_data(&mut self, in_size: u8, out_size: u8) -> Result<AppData, TransactionError> {
        let mut inputs = Vec::with_capacity(usize::from(in_size));
        for _ in 0..in_size {
            if self.output_pointer <= self.input_pointer {
                break;
            }
            let id = self.input_pointer as u64;
            let user = self
                .client_db
                .as_deref()
                .ok_or(TransactionError::RoleRequired(Role::Client))?
                .fetch_user(id)
                .ok_or(TransactionError::UserNotFound(id))?;
            inputs.push(InputData {
                header: user.header,
                user,
            });
            self.input_pointer += 1;
        }
        let in_size = inputs.len();

        let mut outputs = Vec::with_capacity(usize::from(out_size));
        for i in 0..usize::from(out_size) {
            let reuse = OsRng.gen_range(0..self.config.public_key_reuse) == 0;
            let mut user = if (reuse || self.current_users >= self.config.total_users) &&
                i < in_size &&
                self.config.tx_model != TxModel::UtxoOrigami
            {
                inputs[i].user.clone()
            } else {
                let keys = self.suite.generate_keypair();
                self.current_users += 1;
                UserRecord {
                    keys: keys.to_bytes(),
                    payload: vec![0u8; self.payload_size()],
                    ..Default::default()
                }
            };
            user.id = self.output_pointer as u64;
            self.client_db
                .as_deref_mut()
                .ok_or(TransactionError::RoleRequired(Role::Client))?
                .insert_user(user.id, user.clone())?;

            let pk = self.public_prefix(&user.keys);
            user.n = user.n.wrapping_add(1);
            let payload = self.random_payload();
            user.payload = payload.clone();
            outputs.push(OutputData {
                pk,
                n: user.n,
                payload,
                header: FixedHash::zero(),
                user,
            });
            self.output_pointer += 1;
            self.current_outputs += 1;
        }
        Ok(AppData { inputs, outputs })
    }

    /// Account arrangement. Existing accounts are chosen pseudo-randomly and refreshed in place;
    /// any output slots beyond the inputs become brand-new accounts. Every input account must be
    /// refreshed, so `out_size` can never be below `in_size`.
    fn acc_app_data(&mut self, in_size: u8, out_size: u8) -> Result<AppData, TransactionError> {
        let mut in_size = usize::from(in_size);
        let mut out_size = usize::from(out_size).max(in_size);

        if self.current_users == 0 {
            // the first change can only create accounts; sizing it to the input ceiling keeps the
            // next arrangement from overlapping keys
            in_size = 0;
            out_size = usize::from(self.config.avg_input_max);
        } else if self.current_users >= self.config.total_users {
            out_size = in_size;
        }

        let mut inputs = Vec::with_capacity(in_size);
        let mut outputs = Vec::with_capacity(out_size);
        let mut id = OsRng.gen_range(0..0xffusize);
        for _ in 0..in_size {
            id += 1;
            let uid = (id % self.current_users) as u64;
            let mut user = self
                .client_db
                .as_deref()
                .ok_or(TransactionError::RoleRequired(Role::Client))?
                .fetch_user(uid)
                .ok_or(TransactionError::UserNotFound(uid))?;
            // an account that has never produced an output cannot be an input
            if user.n == 0 {
                break;
            }
            let pk = self.public_prefix(&user.keys);
            let n = user.n.wrapping_add(1);
            let payload = self.random_payload();
            user.payload = payload.clone();
            let header = user.header;
            inputs.push(InputData { header, user });
            outputs.push(OutputData {
                pk,
                n,
                payload,
                header: FixedHash::zero(),
                user: UserRecord::default(),
            });
        }

        while outputs.len() < out_size {
            let keys = self.suite.generate_keypair();
            let mut user = UserRecord {
                id: self.current_users as u64,
                keys: keys.to_bytes(),
                payload: vec![0u8; self.payload_size()],
                ..Default::default()
            };
            self.client_db
                .as_deref_mut()
                .ok_or(TransactionError::RoleRequired(Role::Client))?
                .insert_user(user.id, user.clone())?;
            self.current_users += 1;

            let pk = self.public_prefix(&user.keys);
            user.n = 1;
            let payload = self.random_payload();
            user.payload = payload.clone();
            outputs.push(OutputData {
                pk,
                n: 1,
                payload,
                header: FixedHash::zero(),
                user,
            });
        }
        self.output_pointer += out_size;
        self.output_pointer %= self.config.total_users;

        Ok(AppData { inputs, outputs })
    }

    /// Every input account must be refreshed by the output at the same position, so an account
    /// change can never consume more than it recreates.
    fn check_shape(&self, data: &AppData) -> Result<(), TransactionError> {
        if self.config.tx_model.is_account_based() && data.outputs.len() < data.inputs.len() {
            return Err(TransactionError::InputsExceedOutputs);
        }
        Ok(())
    }

    /// Fill in owner material for a change against the client store. An unknown input is logged
    /// and left unresolved; verification will reject it downstream.
    pub fn prepare_app_data_client(&mut self, data: &mut AppData) -> Result<(), TransactionError> {
        self.check_shape(data)?;
        let client = self
            .client_db
            .as_deref()
            .ok_or(TransactionError::RoleRequired(Role::Client))?;
        for i in 0..data.inputs.len() {
            match client.fetch_user_by_header(&data.inputs[i].header) {
                Some(user) => data.inputs[i].user = user,
                None => {
                    warn!(
                        target: LOG_TARGET,
                        "Input header {} not found in the client store", data.inputs[i].header
                    );
                },
            }
            if self.config.tx_model.is_account_based() {
                data.outputs[i].pk = self.public_prefix(&data.inputs[i].user.keys);
                data.outputs[i].n = data.inputs[i].user.n.wrapping_add(1);
            }
        }
        for out in &mut data.outputs {
            let header = output_header(&out.pk, out.n, &out.payload);
            out.header = header;
            out.user.header = header;
        }
        Ok(())
    }

    /// Fill in owner material for a change against the committed peer store, and assign output
    /// ids per the model's discipline. Nothing is mutated: a rejected transaction leaves the
    /// context exactly as it was.
    pub fn prepare_app_data_peer(&mut self, data: &mut AppData) -> Result<(), TransactionError> {
        self.check_shape(data)?;
        let peer = self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?;
        for i in 0..data.inputs.len() {
            let header = data.inputs[i].header;
            let (row, used, id) = peer
                .fetch_output_by_header(&header)
                .ok_or(TransactionError::InputNotFound(header))?;
            if used != 0 {
                return Err(TransactionError::InputAlreadySpent(header));
            }
            data.inputs[i].user = row.as_user(id);
            if self.config.tx_model.is_account_based() {
                data.outputs[i].pk = self.public_prefix(&data.inputs[i].user.keys);
                data.outputs[i].n = data.inputs[i].user.n.wrapping_add(1);
            }
        }
        self.finish_peer_preparation(data, SpeculativeCounters {
            current_outputs: self.current_outputs,
            current_users: self.current_users,
            output_pointer: self.output_pointer,
        })
    }

    /// The speculative variant: lookups go through the overlay first, and ids come from the
    /// overlay's counter snapshot so chained transactions in a batch line up with the ids the
    /// serial commit will later assign.
    pub fn prepare_app_data_peer_with_temps(&mut self, data: &mut AppData) -> Result<(), TransactionError> {
        self.check_shape(data)?;
        let peer = self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?;
        for i in 0..data.inputs.len() {
            let header = data.inputs[i].header;
            let found = if self.config.tx_model.tracks_provenance() {
                self.pool.lookup_with_udelta(&header, peer)
            } else {
                self.pool.lookup(&header, peer)
            };
            let (row, used, id) = found.ok_or(TransactionError::InputNotFound(header))?;
            if used != 0 {
                return Err(TransactionError::InputAlreadySpent(header));
            }
            data.inputs[i].user = row.as_user(id);
            if self.config.tx_model.is_account_based() {
                data.outputs[i].pk = self.public_prefix(&data.inputs[i].user.keys);
                data.outputs[i].n = data.inputs[i].user.n.wrapping_add(1);
            }
        }
        let snapshot = SpeculativeCounters {
            current_outputs: self.current_outputs,
            current_users: self.current_users,
            output_pointer: self.output_pointer,
        };
        let counters = *self.pool.counters(snapshot);
        self.finish_peer_preparation(data, counters)
    }

    fn finish_peer_preparation(
        &self,
        data: &mut AppData,
        counters: SpeculativeCounters,
    ) -> Result<(), TransactionError> {
        for out in &mut data.outputs {
            let header = output_header(&out.pk, out.n, &out.payload);
            out.header = header;
            out.user.header = header;
        }
        let in_size = data.inputs.len();
        match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::AccClassic | TxModel::UtxoAccountable | TxModel::AccAccountable => {
                for (i, out) in data.outputs.iter_mut().enumerate() {
                    out.user.id = (counters.current_outputs + i) as u64;
                }
            },
            TxModel::UtxoOrigami => {
                for (i, out) in data.outputs.iter_mut().enumerate() {
                    out.user.id = (counters.output_pointer + i) as u64;
                }
            },
            TxModel::AccOrigami => {
                for (j, out) in data.outputs.iter_mut().enumerate().skip(in_size) {
                    out.user.id = (counters.current_users + (j - in_size)) as u64;
                }
            },
        }
        Ok(())
    }

    /// Prepare a whole block of transactions, resolving inputs that are outputs of earlier
    /// transactions in the same block.
    pub fn prepare_block_app_data_peer(&mut self, txs: &mut [Transaction]) -> Result<(), TransactionError> {
        let mut extra_outputs = 0usize;
        let mut extra_users = 0usize;
        for t in 0..txs.len() {
            let (earlier, rest) = txs.split_at_mut(t);
            let tx = &mut rest[0];
            self.check_shape(&tx.data)?;
            for i in 0..tx.data.inputs.len() {
                let header = tx.data.inputs[i].header;
                let peer = self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?;
                match peer.fetch_output_by_header(&header) {
                    Some((_, used, _)) if used != 0 => return Err(TransactionError::InputAlreadySpent(header)),
                    Some((row, _, id)) => tx.data.inputs[i].user = row.as_user(id),
                    None => {
                        let mut found = false;
                        'scan: for prev in earlier.iter() {
                            for out in &prev.data.outputs {
                                if out.header == header {
                                    let mut user = out.user.clone();
                                    user.keys = out.pk.clone();
                                    user.n = out.n;
                                    user.payload = out.payload.clone();
                                    user.header = out.header;
                                    tx.data.inputs[i].user = user;
                                    found = true;
                                    break 'scan;
                                }
                            }
                        }
                        if !found {
                            return Err(TransactionError::InvalidInput(header));
                        }
                    },
                }
                if self.config.tx_model.is_account_based() {
                    tx.data.outputs[i].pk = self.public_prefix(&tx.data.inputs[i].user.keys);
                    tx.data.outputs[i].n = tx.data.inputs[i].user.n.wrapping_add(1);
                }
            }
            let counters = SpeculativeCounters {
                current_outputs: self.current_outputs + extra_outputs,
                current_users: self.current_users + extra_users,
                output_pointer: self.output_pointer + extra_outputs,
            };
            self.finish_peer_preparation(&mut tx.data, counters)?;
            match self.config.tx_model {
                TxModel::AccOrigami => {
                    extra_users += tx.data.outputs.len() - tx.data.inputs.len();
                    extra_outputs += tx.data.outputs.len() - tx.data.inputs.len();
                },
                _ => extra_outputs += tx.data.outputs.len(),
            }
        }
        Ok(())
    }

    /// Mirror a committed change into the client store.
    pub fn update_app_data_client(&mut self, data: &mut AppData) -> Result<(), TransactionError> {
        let client = self
            .client_db
            .as_deref_mut()
            .ok_or(TransactionError::RoleRequired(Role::Client))?;
        match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::UtxoAccountable | TxModel::UtxoOrigami => {
                for out in &data.outputs {
                    let mut user = out.user.clone();
                    user.header = output_header(&out.pk, out.n, &out.payload);
                    client.update_user(user.id, user)?;
                }
            },
            TxModel::AccClassic | TxModel::AccAccountable | TxModel::AccOrigami => {
                for i in 0..data.inputs.len() {
                    let out = &data.outputs[i];
                    let mut user = data.inputs[i].user.clone();
                    user.n = out.n;
                    user.header = output_header(&out.pk, out.n, &out.payload);
                    user.payload = out.payload.clone();
                    client.update_user(user.id, user)?;
                }
                for out in data.outputs.iter().skip(data.inputs.len()) {
                    let mut user = out.user.clone();
                    user.header = output_header(&out.pk, out.n, &out.payload);
                    client.update_user(user.id, user)?;
                }
            },
        }
        Ok(())
    }

    /// Commit a verified change to the peer store and advance the context counters. A storage
    /// failure here is fatal to the surrounding block: the caller must not keep committing.
    pub fn update_app_data_peer(&mut self, txn: TxId, tx: &mut Transaction) -> Result<(), TransactionError> {
        let in_size = tx.data.inputs.len();
        let out_size = tx.data.outputs.len();
        match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::UtxoAccountable => {
                for input in &tx.data.inputs {
                    self.peer_mut()?.mark_used(input.user.id)?;
                }
                for out in &tx.data.outputs {
                    let row = plain_row(out);
                    self.peer_mut()?.insert_output(out.user.id, row)?;
                }
                self.current_outputs += out_size;
            },
            TxModel::AccClassic | TxModel::AccAccountable => {
                for input in &tx.data.inputs {
                    self.peer_mut()?.mark_used(input.user.id)?;
                }
                for out in &tx.data.outputs {
                    let row = plain_row(out);
                    self.peer_mut()?.insert_output(out.user.id, row)?;
                }
                self.current_users += out_size - in_size;
                self.current_outputs += out_size;
            },
            TxModel::UtxoOrigami => {
                for input in &tx.data.inputs {
                    self.peer_mut()?.delete_output(input.user.id)?;
                }
                for out in &tx.data.outputs {
                    let row = plain_row(out);
                    self.peer_mut()?.insert_output(out.user.id, row)?;
                }
                // a pruning change may consume more than it creates
                self.current_outputs += out_size;
                self.current_outputs -= in_size;
                self.deleted_outputs += in_size;
                self.output_pointer += out_size;
            },
            TxModel::AccOrigami => {
                for i in 0..in_size {
                    let out = &tx.data.outputs[i];
                    let header = output_header(&out.pk, out.n, &out.payload);
                    // a speculative commit may already have recorded this transaction
                    if tx.data.inputs[i].user.txns.last() != Some(&txn) {
                        tx.data.inputs[i].user.txns.push(txn);
                    }
                    let sig = tx
                        .header
                        .sigs
                        .get(i)
                        .ok_or(TransactionError::InvalidTxHeader)?
                        .clone();
                    let refresh = AccountRefresh {
                        header,
                        n: out.n,
                        payload: out.payload.clone(),
                        sig,
                        txns: tx.data.inputs[i].user.txns.clone(),
                        udelta: tx.data.inputs[i].user.udelta.clone(),
                    };
                    let id = tx.data.inputs[i].user.id;
                    self.peer_mut()?.update_output(id, refresh)?;
                }
                for i in in_size..out_size {
                    let out = &mut tx.data.outputs[i];
                    out.user.txns = vec![txn];
                    let sig = tx
                        .header
                        .sigs
                        .get(i)
                        .ok_or(TransactionError::InvalidTxHeader)?
                        .clone();
                    let row = StoredOutput::Accumulated {
                        header: output_header(&out.pk, out.n, &out.payload),
                        pk: out.pk.clone(),
                        n: out.n,
                        payload: out.payload.clone(),
                        sig,
                        txns: out.user.txns.clone(),
                        udelta: out.user.udelta.clone(),
                    };
                    self.peer_mut()?.insert_output(out.user.id, row)?;
                }
                self.current_users += out_size - in_size;
                self.current_outputs += out_size - in_size;
                self.deleted_outputs += in_size;
                debug_assert_eq!(self.current_outputs, self.current_users);
            },
        }
        Ok(())
    }

    /// The speculative commit: apply the same mutations into the overlay only, leaving the
    /// committed store untouched until the batch is promoted.
    pub fn update_app_data_peer_to_temp(&mut self, txn: TxId, tx: &mut Transaction) -> Result<(), TransactionError> {
        let in_size = tx.data.inputs.len();
        let out_size = tx.data.outputs.len();
        let snapshot = SpeculativeCounters {
            current_outputs: self.current_outputs,
            current_users: self.current_users,
            output_pointer: self.output_pointer,
        };
        match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::AccClassic | TxModel::UtxoAccountable | TxModel::AccAccountable => {
                for i in 0..in_size {
                    let header = tx.data.inputs[i].header;
                    self.pool.mark_spent(
                        &header,
                        txn,
                        self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?,
                    )?;
                }
                for out in &tx.data.outputs {
                    let entry = TempOutput {
                        output: plain_row(out),
                        id: out.user.id,
                        used: 0,
                        tx_num: txn,
                    };
                    self.pool
                        .insert(entry, self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?)?;
                }
                let counters = self.pool.counters(snapshot);
                counters.current_outputs += out_size;
                if self.config.tx_model.is_account_based() {
                    counters.current_users += out_size - in_size;
                }
            },
            TxModel::UtxoOrigami => {
                for i in 0..in_size {
                    let header = tx.data.inputs[i].header;
                    self.pool.mark_spent(
                        &header,
                        txn,
                        self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?,
                    )?;
                }
                for out in &tx.data.outputs {
                    let entry = TempOutput {
                        output: plain_row(out),
                        id: out.user.id,
                        used: 0,
                        tx_num: txn,
                    };
                    self.pool
                        .insert(entry, self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?)?;
                }
                let counters = self.pool.counters(snapshot);
                counters.current_outputs += out_size;
                counters.current_outputs -= in_size;
                counters.output_pointer += out_size;
            },
            TxModel::AccOrigami => {
                let activity = tx.header.activity.ok_or(TransactionError::InvalidActivity)?;
                self.pool.record_activity(txn, activity);
                for i in 0..in_size {
                    let out = &tx.data.outputs[i];
                    if tx.data.inputs[i].user.txns.last() != Some(&txn) {
                        tx.data.inputs[i].user.txns.push(txn);
                    }
                    let sig = tx
                        .header
                        .sigs
                        .get(i)
                        .ok_or(TransactionError::InvalidTxHeader)?
                        .clone();
                    let row = StoredOutput::Accumulated {
                        header: output_header(&out.pk, out.n, &out.payload),
                        pk: out.pk.clone(),
                        n: out.n,
                        payload: out.payload.clone(),
                        sig,
                        txns: tx.data.inputs[i].user.txns.clone(),
                        udelta: tx.data.inputs[i].user.udelta.clone(),
                    };
                    let old_header = tx.data.inputs[i].header;
                    self.pool.refresh(
                        &old_header,
                        row,
                        txn,
                        self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?,
                    )?;
                }
                for i in in_size..out_size {
                    let out = &mut tx.data.outputs[i];
                    out.user.txns = vec![txn];
                    let sig = tx
                        .header
                        .sigs
                        .get(i)
                        .ok_or(TransactionError::InvalidTxHeader)?
                        .clone();
                    let entry = TempOutput {
                        output: StoredOutput::Accumulated {
                            header: output_header(&out.pk, out.n, &out.payload),
                            pk: out.pk.clone(),
                            n: out.n,
                            payload: out.payload.clone(),
                            sig,
                            txns: out.user.txns.clone(),
                            udelta: out.user.udelta.clone(),
                        },
                        id: out.user.id,
                        used: 0,
                        tx_num: txn,
                    };
                    self.pool
                        .insert(entry, self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))?)?;
                }
                let counters = self.pool.counters(snapshot);
                counters.current_users += out_size - in_size;
                counters.current_outputs += out_size - in_size;
            },
        }
        Ok(())
    }

    /// Drop every speculative entry written by transactions up to and including `txn`, either
    /// because the batch has been promoted into the committed store or because it is being
    /// abandoned.
    pub fn delete_temp_outputs(&mut self, txn: TxId) {
        self.pool.delete_up_to(txn);
    }

    pub(crate) fn peer_mut<'a>(&'a mut self) -> Result<&'a mut (dyn crate::ledger_db::PeerBackend + 'a), TransactionError> {
        self.peer_db
            .as_deref_mut()
            .map(|b| b as &'a mut (dyn crate::ledger_db::PeerBackend + 'a))
            .ok_or(TransactionError::RoleRequired(Role::Peer))
    }

    pub(crate) fn peer(&self) -> Result<&dyn crate::ledger_db::PeerBackend, TransactionError> {
        self.peer_db.as_deref().ok_or(TransactionError::RoleRequired(Role::Peer))
    }
}

fn plain_row(out: &OutputData) -> StoredOutput {
    StoredOutput::Plain {
        header: output_header(&out.pk, out.n, &out.payload),
        pk: out.pk.clone(),
        n: out.n,
        payload: out.payload.clone(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_is_sensitive_to_every_field() {
        let base = output_header(b"pk", 1, b"payload");
        assert_eq!(base, output_header(b"pk", 1, b"payload"));
        assert_ne!(base, output_header(b"pj", 1, b"payload"));
        assert_ne!(base, output_header(b"pk", 2, b"payload"));
        assert_ne!(base, output_header(b"pk", 1, b"payloae"));
    }

    #[test]
    fn header_field_order_is_not_commutative() {
        // pk ‖ [n] ‖ payload must not collide with a shifted split of the same bytes
        let a = output_header(b"ab", 99, b"cd");
        let b = output_header(b"ab\x63", 99, b"d");
        assert_ne!(a, b);
    }
}

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

//! The model-dispatched header engine: for each transaction-validity model, how the compact
//! cryptographic header over an application change is produced and checked.
//!
//! All classic signers sign the same payload: the input headers in order, then `pk ‖ n ‖ payload`
//! for every output. Under BLS those signatures collapse into a single aggregate checked with one
//! pairing per signer. The aggregated models replace the signer set entirely: one blinded-excess
//! signature per transaction, or one accumulated-history signature per affected account.

use origami_common_types::types::ACTIVITY_LENGTH;

use crate::{
    config::{SigScheme, TxModel},
    context::ExeContext,
    crypto::{KeyPair, SignatureBytes, SignatureOps},
    ledger_db::UserRecord,
    transactions::{
        activity::ActivityProof,
        app_data::{output_header, AppData},
        error::TransactionError,
    },
};

/// The cryptographic header proving an application change is authorised. `activity` and `excess`
/// are populated only by the aggregated models.
#[derive(Debug, Clone, Default)]
pub struct TxHeader {
    pub sigs: Vec<SignatureBytes>,
    pub activity: Option<ActivityProof>,
    pub excess: Option<Vec<u8>>,
}

/// The canonical signing payload: input headers in order, then each output's key, counter and
/// payload.
fn signing_payload(data: &AppData) -> Vec<u8> {
    let mut buf = Vec::new();
    for input in &data.inputs {
        buf.extend_from_slice(input.header.as_slice());
    }
    for out in &data.outputs {
        buf.extend_from_slice(&out.pk);
        buf.push(out.n);
        buf.extend_from_slice(&out.payload);
    }
    buf
}

/// Extend an account's accumulated history with this transaction's activity, or leave it alone
/// when the history already ends with it (repeated verification must be deterministic). Any other
/// length is a broken accumulator.
fn append_activity(user: &mut UserRecord, n: u8, activity: &ActivityProof) -> Result<(), TransactionError> {
    let expected = usize::from(n) * ACTIVITY_LENGTH;
    if user.udelta.len() + ACTIVITY_LENGTH == expected {
        user.udelta.extend_from_slice(activity.as_bytes());
        Ok(())
    } else if user.udelta.len() == expected && user.udelta.ends_with(activity.as_bytes()) {
        Ok(())
    } else {
        Err(TransactionError::InvalidActivity)
    }
}

pub(crate) fn account_payload(pk: &[u8], n: u8, payload: &[u8], udelta: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(pk.len() + 1 + payload.len() + udelta.len());
    buf.extend_from_slice(pk);
    buf.push(n);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(udelta);
    buf
}

impl ExeContext {
    fn keypair_from(&self, keys: &[u8]) -> Result<KeyPair, TransactionError> {
        KeyPair::from_bytes(self.suite.public_key_size(), self.suite.secret_key_size(), keys)
            .map_err(TransactionError::from)
    }

    fn input_public_key(&self, user: &UserRecord) -> Vec<u8> {
        KeyPair::public_slice(&user.keys, self.suite.public_key_size()).to_vec()
    }

    fn pk_among_inputs(&self, data: &AppData, pk: &[u8]) -> bool {
        let size = self.suite.public_key_size();
        data.inputs
            .iter()
            .any(|input| KeyPair::public_slice(&input.user.keys, size) == pk)
    }

    /// Produce the header for an arranged change. The signer set is the model's; under BLS the
    /// classic models carry a single aggregate signature.
    pub fn create_tx_header(&self, data: &mut AppData) -> Result<TxHeader, TransactionError> {
        match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::AccClassic => self.classic_header(data),
            TxModel::UtxoAccountable => self.accountable_utxo_header(data),
            TxModel::AccAccountable => self.accountable_acc_header(data),
            TxModel::UtxoOrigami => self.aggregated_utxo_header(data),
            TxModel::AccOrigami => self.aggregated_acc_header(data),
        }
    }

    /// Check a header against an arranged change. The signer set and, for BLS, the exact public
    /// key order are reconstructed by the same rules used at signing.
    pub fn verify_tx_header(&self, txh: &mut TxHeader, data: &mut AppData) -> Result<(), TransactionError> {
        match self.config.tx_model {
            TxModel::UtxoClassic | TxModel::AccClassic => self.classic_verify(txh, data),
            TxModel::UtxoAccountable => self.accountable_utxo_verify(txh, data),
            TxModel::AccAccountable => self.accountable_acc_verify(txh, data),
            TxModel::UtxoOrigami => self.aggregated_utxo_verify(txh, data),
            TxModel::AccOrigami => self.aggregated_acc_verify(txh, data),
        }
    }

    fn sign_all(&self, signers: &[&UserRecord], msg: &[u8]) -> Result<Vec<SignatureBytes>, TransactionError> {
        let mut sigs = Vec::with_capacity(signers.len());
        for user in signers {
            let kp = self.keypair_from(&user.keys)?;
            sigs.push(self.suite.sign(&kp, msg)?);
        }
        Ok(sigs)
    }

    fn collapse(&self, sigs: Vec<SignatureBytes>) -> Result<Vec<SignatureBytes>, TransactionError> {
        match self.suite.scheme() {
            SigScheme::Schnorr => Ok(sigs),
            SigScheme::Bls => {
                if sigs.is_empty() {
                    return Ok(sigs);
                }
                Ok(vec![self.suite.aggregate(&sigs)?])
            },
        }
    }

    fn verify_signer_set(
        &self,
        pks: &[Vec<u8>],
        msg: &[u8],
        sigs: &[SignatureBytes],
    ) -> Result<(), TransactionError> {
        if pks.is_empty() {
            return Ok(());
        }
        match self.suite.scheme() {
            SigScheme::Schnorr => {
                if sigs.len() < pks.len() {
                    return Err(TransactionError::InvalidSignature);
                }
                for (pk, sig) in pks.iter().zip(sigs) {
                    if !self.suite.verify(pk, msg, sig) {
                        return Err(TransactionError::InvalidSignature);
                    }
                }
                Ok(())
            },
            SigScheme::Bls => {
                let sig = sigs.first().ok_or(TransactionError::InvalidAggregateSignature)?;
                let refs: Vec<&[u8]> = pks.iter().map(|pk| pk.as_slice()).collect();
                if !self.suite.batch_verify(&refs, msg, sig) {
                    return Err(TransactionError::InvalidAggregateSignature);
                }
                Ok(())
            },
        }
    }

    // Models 1 and 2: input owners sign; a change with no inputs is signed by every output owner.
    fn classic_header(&self, data: &AppData) -> Result<TxHeader, TransactionError> {
        let msg = signing_payload(data);
        let signers: Vec<&UserRecord> = if data.inputs.is_empty() {
            data.outputs.iter().map(|o| &o.user).collect()
        } else {
            data.inputs.iter().map(|i| &i.user).collect()
        };
        let sigs = self.collapse(self.sign_all(&signers, &msg)?)?;
        Ok(TxHeader {
            sigs,
            ..Default::default()
        })
    }

    fn classic_verify(&self, txh: &TxHeader, data: &AppData) -> Result<(), TransactionError> {
        let msg = signing_payload(data);
        let pks: Vec<Vec<u8>> = if data.inputs.is_empty() {
            data.outputs.iter().map(|o| o.pk.clone()).collect()
        } else {
            data.inputs.iter().map(|i| self.input_public_key(&i.user)).collect()
        };
        self.verify_signer_set(&pks, &msg, &txh.sigs)
    }

    // Model 3: input owners sign, plus any output owner whose key is not already among the
    // inputs.
    fn accountable_utxo_header(&self, data: &AppData) -> Result<TxHeader, TransactionError> {
        let msg = signing_payload(data);
        let mut signers: Vec<&UserRecord> = data.inputs.iter().map(|i| &i.user).collect();
        for out in &data.outputs {
            if !self.pk_among_inputs(data, &out.pk) {
                signers.push(&out.user);
            }
        }
        let sigs = self.collapse(self.sign_all(&signers, &msg)?)?;
        Ok(TxHeader {
            sigs,
            ..Default::default()
        })
    }

    fn accountable_utxo_verify(&self, txh: &TxHeader, data: &AppData) -> Result<(), TransactionError> {
        let msg = signing_payload(data);
        let mut pks: Vec<Vec<u8>> = data.inputs.iter().map(|i| self.input_public_key(&i.user)).collect();
        for out in &data.outputs {
            if !self.pk_among_inputs(data, &out.pk) {
                pks.push(out.pk.clone());
            }
        }
        self.verify_signer_set(&pks, &msg, &txh.sigs)
    }

    // Model 4: input owners sign and so does every brand-new account owner.
    fn accountable_acc_header(&self, data: &AppData) -> Result<TxHeader, TransactionError> {
        let msg = signing_payload(data);
        let mut signers: Vec<&UserRecord> = data.inputs.iter().map(|i| &i.user).collect();
        for out in data.outputs.iter().skip(data.inputs.len()) {
            signers.push(&out.user);
        }
        let sigs = self.collapse(self.sign_all(&signers, &msg)?)?;
        Ok(TxHeader {
            sigs,
            ..Default::default()
        })
    }

    fn accountable_acc_verify(&self, txh: &TxHeader, data: &AppData) -> Result<(), TransactionError> {
        let msg = signing_payload(data);
        let mut pks: Vec<Vec<u8>> = data.inputs.iter().map(|i| self.input_public_key(&i.user)).collect();
        for out in data.outputs.iter().skip(data.inputs.len()) {
            pks.push(out.pk.clone());
        }
        self.verify_signer_set(&pks, &msg, &txh.sigs)
    }

    // Model 5: every key is blinded by its output's header; the header carries the activity, the
    // excess key and one signature demonstrating knowledge of the excess scalar.
    fn aggregated_utxo_header(&self, data: &mut AppData) -> Result<TxHeader, TransactionError> {
        for out in &mut data.outputs {
            let header = output_header(&out.pk, out.n, &out.payload);
            out.header = header;
            out.user.header = header;
        }
        let activity = self.compute_app_activity(data);
        if activity.is_zero() {
            return Err(TransactionError::InvalidActivity);
        }

        let mut plus = Vec::with_capacity(data.outputs.len());
        for out in &data.outputs {
            let kp = self.keypair_from(&out.user.keys)?;
            plus.push(self.suite.blind_keypair(&kp, &out.header)?);
        }
        let mut minus = Vec::with_capacity(data.inputs.len());
        for input in &data.inputs {
            let kp = self.keypair_from(&input.user.keys)?;
            minus.push(self.suite.blind_keypair(&kp, &input.header)?);
        }

        let plus_pks: Vec<&[u8]> = plus.iter().map(|k| k.pk.as_slice()).collect();
        let minus_pks: Vec<&[u8]> = minus.iter().map(|k| k.pk.as_slice()).collect();
        let excess = self.suite.diff_public_key(&plus_pks, &minus_pks)?;

        let mut msg = activity.to_vec();
        msg.extend_from_slice(&excess);
        let plus_sks: Vec<&[u8]> = plus.iter().map(|k| k.sk.as_slice()).collect();
        let minus_sks: Vec<&[u8]> = minus.iter().map(|k| k.sk.as_slice()).collect();
        let sig = self.suite.diff_sign(&plus_sks, &minus_sks, &excess, &msg)?;

        Ok(TxHeader {
            sigs: vec![sig],
            activity: Some(activity),
            excess: Some(excess),
        })
    }

    fn aggregated_utxo_verify(&self, txh: &mut TxHeader, data: &mut AppData) -> Result<(), TransactionError> {
        for out in &mut data.outputs {
            let header = output_header(&out.pk, out.n, &out.payload);
            out.header = header;
            out.user.header = header;
        }
        let activity = self.compute_app_activity(data);
        if activity.is_zero() {
            return Err(TransactionError::InvalidActivity);
        }

        let mut plus = Vec::with_capacity(data.outputs.len());
        for out in &data.outputs {
            plus.push(
                self.suite
                    .blind_public_key(&out.pk, &out.header)
                    .map_err(|_| TransactionError::InvalidSignature)?,
            );
        }
        let mut minus = Vec::with_capacity(data.inputs.len());
        for input in &data.inputs {
            let pk = self.input_public_key(&input.user);
            minus.push(
                self.suite
                    .blind_public_key(&pk, &input.header)
                    .map_err(|_| TransactionError::InvalidSignature)?,
            );
        }
        let plus_refs: Vec<&[u8]> = plus.iter().map(|pk| pk.as_slice()).collect();
        let minus_refs: Vec<&[u8]> = minus.iter().map(|pk| pk.as_slice()).collect();
        let excess = self
            .suite
            .diff_public_key(&plus_refs, &minus_refs)
            .map_err(|_| TransactionError::InvalidSignature)?;

        let mut msg = activity.to_vec();
        msg.extend_from_slice(&excess);
        let sig = txh.sigs.first().ok_or(TransactionError::InvalidSignature)?;
        if !self.suite.verify(&excess, &msg, sig) {
            return Err(TransactionError::InvalidSignature);
        }
        txh.activity = Some(activity);
        txh.excess = Some(excess);
        Ok(())
    }

    // Model 6: one signature per affected account over its key, counter, payload and accumulated
    // activity history (which already includes this transaction's activity).
    fn aggregated_acc_header(&self, data: &mut AppData) -> Result<TxHeader, TransactionError> {
        if data.outputs.len() < data.inputs.len() {
            return Err(TransactionError::InputsExceedOutputs);
        }
        for out in &mut data.outputs {
            let header = output_header(&out.pk, out.n, &out.payload);
            out.header = header;
            out.user.header = header;
        }
        let activity = self.compute_app_activity(data);
        if activity.is_zero() {
            return Err(TransactionError::InvalidActivity);
        }

        let in_size = data.inputs.len();
        let mut sigs = Vec::with_capacity(data.outputs.len());
        for i in 0..in_size {
            append_activity(&mut data.inputs[i].user, data.outputs[i].n, &activity)?;
            let out = &data.outputs[i];
            let msg = account_payload(&out.pk, out.n, &out.payload, &data.inputs[i].user.udelta);
            let kp = self.keypair_from(&data.inputs[i].user.keys)?;
            sigs.push(self.suite.sign(&kp, &msg)?);
        }
        for i in in_size..data.outputs.len() {
            data.outputs[i].user.udelta = activity.to_vec();
            let out = &data.outputs[i];
            let msg = account_payload(&out.pk, out.n, &out.payload, &out.user.udelta);
            let kp = self.keypair_from(&out.user.keys)?;
            sigs.push(self.suite.sign(&kp, &msg)?);
        }

        Ok(TxHeader {
            sigs,
            activity: Some(activity),
            excess: None,
        })
    }

    fn aggregated_acc_verify(&self, txh: &mut TxHeader, data: &mut AppData) -> Result<(), TransactionError> {
        if data.outputs.len() < data.inputs.len() {
            return Err(TransactionError::InputsExceedOutputs);
        }
        for out in &mut data.outputs {
            let header = output_header(&out.pk, out.n, &out.payload);
            out.header = header;
            out.user.header = header;
        }
        let activity = self.compute_app_activity(data);
        if activity.is_zero() {
            return Err(TransactionError::InvalidActivity);
        }

        let in_size = data.inputs.len();
        let out_size = data.outputs.len();
        if txh.sigs.len() < out_size {
            return Err(TransactionError::InvalidSignature);
        }

        let mut pks = Vec::with_capacity(out_size);
        let mut msgs = Vec::with_capacity(out_size);
        for i in 0..in_size {
            append_activity(&mut data.inputs[i].user, data.outputs[i].n, &activity)?;
            let out = &data.outputs[i];
            msgs.push(account_payload(&out.pk, out.n, &out.payload, &data.inputs[i].user.udelta));
            pks.push(self.input_public_key(&data.inputs[i].user));
        }
        for i in in_size..out_size {
            data.outputs[i].user.udelta = activity.to_vec();
            let out = &data.outputs[i];
            msgs.push(account_payload(&out.pk, out.n, &out.payload, &out.user.udelta));
            pks.push(out.pk.clone());
        }

        match self.suite.scheme() {
            SigScheme::Schnorr => {
                for i in 0..out_size {
                    if !self.suite.verify(&pks[i], &msgs[i], &txh.sigs[i]) {
                        return Err(TransactionError::InvalidSignature);
                    }
                }
            },
            SigScheme::Bls => {
                // each account's signature is carried (the store needs them row by row), but the
                // whole set is checked as one aggregate with a single pairing per signer
                let agg = self
                    .suite
                    .aggregate(&txh.sigs[..out_size])
                    .map_err(|_| TransactionError::InvalidAggregateSignature)?;
                let pk_refs: Vec<&[u8]> = pks.iter().map(|pk| pk.as_slice()).collect();
                let msg_refs: Vec<&[u8]> = msgs.iter().map(|m| m.as_slice()).collect();
                if !self.suite.batch_verify_multi(&pk_refs, &msg_refs, &agg) {
                    return Err(TransactionError::InvalidAggregateSignature);
                }
            },
        }
        txh.activity = Some(activity);
        Ok(())
    }
}

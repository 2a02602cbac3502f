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

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The transaction-validity model a context runs under. Every model shares the same pipeline
/// (arrange, header, verify, commit); the variant selects the signer set, the id discipline and
/// the shape of the persisted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxModel {
    /// Plain UTXO: outputs are created once and consumed at most once; input owners sign.
    UtxoClassic,
    /// Plain account: a user has one current output which is retired in place on update.
    AccClassic,
    /// UTXO where new output owners countersign alongside the input owners.
    UtxoAccountable,
    /// Account model where new account owners countersign alongside the input owners.
    AccAccountable,
    /// UTXO with per-transaction aggregation: one activity proof, one excess key, one signature.
    /// Consumed outputs are deleted from the store.
    UtxoOrigami,
    /// Account model with per-user aggregation: one signature per affected account over its
    /// accumulated activity history.
    AccOrigami,
}

impl TxModel {
    /// Account-style models retire each input row into the output at the same position, so an
    /// input's owner key and counter are copied onto the paired output during arrangement.
    pub fn is_account_based(self) -> bool {
        matches!(self, TxModel::AccClassic | TxModel::AccAccountable | TxModel::AccOrigami)
    }

    /// Models whose committed public keys must be unique across the store.
    pub fn unique_public_keys(self) -> bool {
        matches!(self, TxModel::UtxoOrigami | TxModel::AccOrigami)
    }

    /// The aggregated account model persists per-row provenance (signature, transaction list and
    /// accumulated activity) so the whole ledger can be re-verified from user state alone.
    pub fn tracks_provenance(self) -> bool {
        self == TxModel::AccOrigami
    }

    /// The wire format carries `pk` and `n` for every output in UTXO models, but only for
    /// new-account rows in account models (refreshed rows inherit them from their input).
    pub fn carries_output_keys(self) -> bool {
        matches!(self, TxModel::UtxoClassic | TxModel::UtxoAccountable | TxModel::UtxoOrigami)
    }
}

impl fmt::Display for TxModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The signature scheme a context runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigScheme {
    /// Schnorr over the Ristretto group.
    Schnorr,
    /// BLS over BN254 with aggregate and batch verification.
    Bls,
}

/// Whether a context holds secret key material (client) or only public state (peer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Client,
    Peer,
}

/// Construction parameters for an [ExeContext](crate::context::ExeContext).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Identifier of this execution context; a durable backend would use it to name its tables.
    pub exe_id: u32,
    pub role: Role,
    pub tx_model: TxModel,
    pub sig_scheme: SigScheme,
    /// Application payload size per output, in bytes.
    pub payload_size: u16,
    /// Ceiling on the number of distinct users in account models.
    pub total_users: usize,
    /// Random arrangement draws input counts from `[0, avg_input_max]`.
    pub avg_input_max: u8,
    /// Random arrangement draws output counts from `[1, avg_output_max]`.
    pub avg_output_max: u8,
    /// When false, store lookups by header or public key degrade to scans.
    pub indexing_enabled: bool,
    /// A UTXO output reuses its input's public key with probability `1 / public_key_reuse`.
    pub public_key_reuse: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("avg_input_max ({0}) may not exceed avg_output_max ({1})")]
    InputMaxExceedsOutputMax(u8, u8),
    #[error("avg_output_max must be at least 1")]
    OutputMaxZero,
    #[error("avg_input_max ({0}) must be less than total_users ({1})")]
    InputMaxExceedsUsers(u8, usize),
    #[error("public_key_reuse must be at least 1")]
    PublicKeyReuseZero,
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.avg_input_max > self.avg_output_max {
            return Err(ConfigError::InputMaxExceedsOutputMax(
                self.avg_input_max,
                self.avg_output_max,
            ));
        }
        if self.avg_output_max == 0 {
            return Err(ConfigError::OutputMaxZero);
        }
        if usize::from(self.avg_input_max) >= self.total_users {
            return Err(ConfigError::InputMaxExceedsUsers(self.avg_input_max, self.total_users));
        }
        if self.public_key_reuse == 0 {
            return Err(ConfigError::PublicKeyReuseZero);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> LedgerConfig {
        LedgerConfig {
            exe_id: 100,
            role: Role::Peer,
            tx_model: TxModel::UtxoClassic,
            sig_scheme: SigScheme::Schnorr,
            payload_size: 32,
            total_users: 3,
            avg_input_max: 2,
            avg_output_max: 3,
            indexing_enabled: true,
            public_key_reuse: 2,
        }
    }

    #[test]
    fn it_rejects_inconsistent_limits() {
        let mut c = config();
        c.avg_input_max = 4;
        assert!(matches!(c.validate(), Err(ConfigError::InputMaxExceedsOutputMax(4, 3))));

        let mut c = config();
        c.total_users = 2;
        assert!(matches!(c.validate(), Err(ConfigError::InputMaxExceedsUsers(2, 2))));

        let mut c = config();
        c.public_key_reuse = 0;
        assert!(matches!(c.validate(), Err(ConfigError::PublicKeyReuseZero)));

        assert!(config().validate().is_ok());
    }
}

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

use origami_common_types::FixedHash;
use thiserror::Error;

use crate::{config::Role, crypto::SignatureError, ledger_db::LedgerDbError};

/// Every failure a public transaction operation can surface. The facade never guesses intent:
/// lower layers' failures convert losslessly and a failing verification leaves the context
/// unchanged.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Input header {0} is unknown to this verifier")]
    InputNotFound(FixedHash),
    #[error("Input {0} has already been spent")]
    InputAlreadySpent(FixedHash),
    #[error("Input {0} was not found and is not created earlier in this block")]
    InvalidInput(FixedHash),
    #[error("Duplicate output header")]
    DuplicateOutputs,
    #[error("Duplicate public key")]
    DuplicatePublicKey,
    #[error("reused public keys")]
    ReusedPublicKey,
    #[error("Invalid activity proof")]
    InvalidActivity,
    #[error("invalid sig")]
    InvalidSignature,
    #[error("invalid aggregate sig")]
    InvalidAggregateSignature,
    #[error("The transaction header cannot be reconstituted from the store")]
    InvalidTxHeader,
    #[error("double spent inputs")]
    DoubleSpend,
    #[error("total user activities do not match")]
    UserActivityMismatch,
    #[error("total user transaction count does not match")]
    UserTransactionCountMismatch,
    #[error("products of activities do not match")]
    ActivityProductMismatch,
    #[error("User {0} does not exist")]
    UserNotFound(u64),
    #[error("An account change must refresh every input account in its outputs")]
    InputsExceedOutputs,
    #[error("The transaction bytes could not be decoded")]
    Decode,
    #[error("This operation requires the {0:?} role")]
    RoleRequired(Role),
    #[error("Storage error: {0}")]
    Storage(#[from] LedgerDbError),
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
}

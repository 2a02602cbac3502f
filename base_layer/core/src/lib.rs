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

//! # Origami core
//!
//! The transaction-header construction and verification engine for a permissioned ledger that can
//! be run under six transaction-validity models (two UTXO flavours, two account flavours and two
//! aggregated "Origami" flavours) and two signature schemes (Schnorr over Ristretto and BLS over
//! BN254).
//!
//! An [ExeContext](context::ExeContext) owns the persisted output set, the per-context counters
//! and the speculative in-block overlay, and exposes the end-to-end operations: arranging
//! application data, producing a compact cryptographic header over it, verifying incoming
//! transactions against the store, committing their state transitions and re-verifying the whole
//! stored ledger.
//!
//! Durable storage engines, block assembly and networking are external collaborators; the store
//! surface is the pair of repository traits in [ledger_db].

pub mod config;
pub mod context;
pub mod crypto;
pub mod ledger_db;
pub mod transactions;

pub use config::{LedgerConfig, Role, SigScheme, TxModel};
pub use context::ExeContext;

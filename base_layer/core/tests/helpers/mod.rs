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

#![allow(dead_code)]

use origami_common_types::TxId;
use origami_core::{transactions::Transaction, ExeContext, LedgerConfig, Role, SigScheme, TxModel};

pub const ALL_MODELS: [TxModel; 6] = [
    TxModel::UtxoClassic,
    TxModel::AccClassic,
    TxModel::UtxoAccountable,
    TxModel::AccAccountable,
    TxModel::UtxoOrigami,
    TxModel::AccOrigami,
];

pub const BOTH_SCHEMES: [SigScheme; 2] = [SigScheme::Schnorr, SigScheme::Bls];

pub fn config(
    exe_id: u32,
    role: Role,
    model: TxModel,
    scheme: SigScheme,
    total_users: usize,
    in_max: u8,
    out_max: u8,
) -> LedgerConfig {
    LedgerConfig {
        exe_id,
        role,
        tx_model: model,
        sig_scheme: scheme,
        payload_size: 32,
        total_users,
        avg_input_max: in_max,
        avg_output_max: out_max,
        indexing_enabled: true,
        public_key_reuse: 2,
    }
}

/// A matching client/peer pair, the way two nodes of the same ledger would be configured.
pub fn pair(
    model: TxModel,
    scheme: SigScheme,
    total_users: usize,
    in_max: u8,
    out_max: u8,
) -> (ExeContext, ExeContext) {
    let client = ExeContext::new(config(100, Role::Client, model, scheme, total_users, in_max, out_max)).unwrap();
    let peer = ExeContext::new(config(200, Role::Peer, model, scheme, total_users, in_max, out_max)).unwrap();
    (client, peer)
}

/// Produce a transaction on the client, mirror it into the client store and return the canonical
/// bytes a peer would receive.
pub fn client_transaction(client: &mut ExeContext, in_size: u8, out_size: u8) -> (Transaction, Vec<u8>) {
    let mut tx = client.fixed_transaction(in_size, out_size).expect("arrangement failed");
    let bytes = client.to_bytes(&tx);
    client.verify_incoming_transaction(&mut tx).expect("client-side verification failed");
    client.update_app_data_client(&mut tx.data).expect("client update failed");
    (tx, bytes)
}

/// Decode, verify and commit an incoming transaction on the peer.
pub fn commit(peer: &mut ExeContext, txn: u32, bytes: &[u8]) -> Transaction {
    let mut incoming = peer.from_bytes(bytes).expect("decode failed");
    peer.verify_incoming_transaction(&mut incoming).expect("peer-side verification failed");
    peer.update_app_data_peer(TxId::from(txn), &mut incoming).expect("peer update failed");
    peer.insert_tx_header(TxId::from(txn), &incoming).expect("header insert failed");
    incoming
}

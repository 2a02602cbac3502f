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

mod helpers;

use helpers::{client_transaction, commit, pair, ALL_MODELS, BOTH_SCHEMES};
use origami_common_types::TxId;
use origami_core::{SigScheme, TxModel};

#[test]
fn a_chained_batch_verifies_speculatively_and_promotes_cleanly() {
    let (mut client, mut peer_serial) = pair(TxModel::UtxoClassic, SigScheme::Schnorr, 3, 2, 3);
    let (_, mut peer_temp) = pair(TxModel::UtxoClassic, SigScheme::Schnorr, 3, 2, 3);

    // tx B consumes tx A's only output, so B can never verify before A without the overlay
    let (tx_a, bytes_a) = client_transaction(&mut client, 0, 1);
    let (tx_b, bytes_b) = client_transaction(&mut client, 1, 1);
    assert_eq!(tx_b.data.inputs[0].header, tx_a.data.outputs[0].header);

    // serial commit as the baseline
    commit(&mut peer_serial, 0, &bytes_a);
    commit(&mut peer_serial, 1, &bytes_b);
    peer_serial.verify_stored_all_transactions().unwrap();

    // the speculative path: both transactions verified before anything is committed
    let mut a = peer_temp.from_bytes(&bytes_a).unwrap();
    peer_temp.verify_incoming_transaction_with_temp(&mut a).unwrap();
    peer_temp.update_app_data_peer_to_temp(TxId::from(0u32), &mut a).unwrap();

    let mut b = peer_temp.from_bytes(&bytes_b).unwrap();
    peer_temp.verify_incoming_transaction_with_temp(&mut b).unwrap();
    peer_temp.update_app_data_peer_to_temp(TxId::from(1u32), &mut b).unwrap();

    // promote the batch
    peer_temp.update_app_data_peer(TxId::from(0u32), &mut a).unwrap();
    peer_temp.insert_tx_header(TxId::from(0u32), &a).unwrap();
    peer_temp.update_app_data_peer(TxId::from(1u32), &mut b).unwrap();
    peer_temp.insert_tx_header(TxId::from(1u32), &b).unwrap();
    peer_temp.delete_temp_outputs(TxId::from(1u32));
    peer_temp.verify_stored_all_transactions().unwrap();

    // both peers converged to the same state
    assert_eq!(peer_serial.current_outputs(), peer_temp.current_outputs());
    assert_eq!(peer_serial.total_tx(), peer_temp.total_tx());
    let spent = tx_a.data.outputs[0].header;
    let serial_db = peer_serial.peer_backend().unwrap();
    let temp_db = peer_temp.peer_backend().unwrap();
    let (_, used_serial, id_serial) = serial_db.fetch_output_by_header(&spent).unwrap();
    let (_, used_temp, id_temp) = temp_db.fetch_output_by_header(&spent).unwrap();
    assert_eq!(used_serial, used_temp);
    assert_eq!(id_serial, id_temp);
    let unspent = tx_b.data.outputs[0].header;
    assert_eq!(
        serial_db.fetch_output_by_header(&unspent).map(|(_, used, id)| (used, id)),
        temp_db.fetch_output_by_header(&unspent).map(|(_, used, id)| (used, id)),
    );
}

#[test]
fn speculative_batches_work_across_every_model_and_scheme() {
    let _ = env_logger::builder().is_test(true).try_init();
    for model in ALL_MODELS {
        for scheme in BOTH_SCHEMES {
            let (mut client, mut peer) = pair(model, scheme, 10, 4, 5);
            let batch_size = 3u32;
            for batch in 0..3u32 {
                let mut txs = Vec::new();
                for _ in 0..batch_size {
                    let mut tx = client.random_transaction().unwrap();
                    let bytes = client.to_bytes(&tx);
                    client.verify_incoming_transaction(&mut tx).unwrap();
                    client.update_app_data_client(&mut tx.data).unwrap();
                    txs.push(peer.from_bytes(&bytes).unwrap());
                }
                for (j, tx) in txs.iter_mut().enumerate() {
                    let txn = TxId::from(batch * batch_size + j as u32);
                    peer.verify_incoming_transaction_with_temp(tx)
                        .unwrap_or_else(|e| panic!("{} {:?} tx {}: {}", model, scheme, txn, e));
                    peer.update_app_data_peer_to_temp(txn, tx).unwrap();
                }
                for (j, tx) in txs.iter_mut().enumerate() {
                    let txn = TxId::from(batch * batch_size + j as u32);
                    peer.update_app_data_peer(txn, tx).unwrap();
                    peer.insert_tx_header(txn, tx).unwrap();
                }
                peer.delete_temp_outputs(TxId::from(batch * batch_size + batch_size - 1));
            }
            peer.verify_stored_all_transactions()
                .unwrap_or_else(|e| panic!("{} {:?}: stored ledger failed after batches: {}", model, scheme, e));
        }
    }
}

#[test]
fn a_block_of_chained_transactions_prepares_in_one_pass() {
    let (mut client, mut peer) = pair(TxModel::UtxoClassic, SigScheme::Schnorr, 3, 2, 3);
    let (_, bytes_a) = client_transaction(&mut client, 0, 1);
    let (_, bytes_b) = client_transaction(&mut client, 1, 1);

    let mut block = vec![peer.from_bytes(&bytes_a).unwrap(), peer.from_bytes(&bytes_b).unwrap()];
    peer.prepare_block_app_data_peer(&mut block).unwrap();
    for tx in block.iter_mut() {
        peer.check_uniqueness(tx).unwrap();
        peer.verify_tx_header(&mut tx.header, &mut tx.data).unwrap();
    }
    for (i, tx) in block.iter_mut().enumerate() {
        peer.update_app_data_peer(TxId::from(i), tx).unwrap();
        peer.insert_tx_header(TxId::from(i), tx).unwrap();
    }
    peer.verify_stored_all_transactions().unwrap();
}

#[test]
fn an_abandoned_batch_leaves_no_trace() {
    let (mut client, mut peer) = pair(TxModel::UtxoClassic, SigScheme::Schnorr, 3, 2, 3);
    let (_, bytes0) = client_transaction(&mut client, 0, 2);
    commit(&mut peer, 0, &bytes0);

    let (_, bytes1) = client_transaction(&mut client, 2, 2);
    let mut speculated = peer.from_bytes(&bytes1).unwrap();
    peer.verify_incoming_transaction_with_temp(&mut speculated).unwrap();
    peer.update_app_data_peer_to_temp(TxId::from(1u32), &mut speculated).unwrap();

    // abandon it; the committed store must be untouched and the spend still possible
    peer.delete_temp_outputs(TxId::from(1u32));
    let mut retry = peer.from_bytes(&bytes1).unwrap();
    peer.verify_incoming_transaction(&mut retry).unwrap();
    commit(&mut peer, 1, &bytes1);
    peer.verify_stored_all_transactions().unwrap();
}

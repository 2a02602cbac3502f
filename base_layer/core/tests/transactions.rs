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

use helpers::{client_transaction, commit, config, pair, ALL_MODELS, BOTH_SCHEMES};
use origami_core::{transactions::{Transaction, TransactionError}, ExeContext, Role};

fn assert_wire_round_trip(ctx: &ExeContext, tx: &Transaction) {
    let bytes = ctx.to_bytes(tx);
    let decoded = ctx.from_bytes(&bytes).expect("decode of freshly encoded bytes failed");
    assert_eq!(decoded.data.inputs.len(), tx.data.inputs.len());
    assert_eq!(decoded.data.outputs.len(), tx.data.outputs.len());
    for (a, b) in tx.data.inputs.iter().zip(&decoded.data.inputs) {
        assert_eq!(a.header, b.header);
    }
    for (i, (a, b)) in tx.data.outputs.iter().zip(&decoded.data.outputs).enumerate() {
        if i >= tx.data.inputs.len() || ctx.config().tx_model.carries_output_keys() {
            assert_eq!(a.pk, b.pk);
            assert_eq!(a.n, b.n);
        }
        assert_eq!(a.payload, b.payload);
    }
    assert_eq!(tx.header.sigs, decoded.header.sigs);
    // encoding the decoded transaction must reproduce the exact bytes
    assert_eq!(ctx.to_bytes(&decoded), bytes);
}

#[test]
fn clients_create_and_verify_their_own_transactions() {
    for model in ALL_MODELS {
        for scheme in BOTH_SCHEMES {
            let mut ctx = ExeContext::new(config(100, Role::Client, model, scheme, 3, 2, 3)).unwrap();
            for _ in 0..3 {
                let mut tx = ctx.random_transaction().unwrap();
                assert_wire_round_trip(&ctx, &tx);

                ctx.verify_incoming_transaction(&mut tx)
                    .unwrap_or_else(|e| panic!("{} {:?}: created transaction failed to verify: {}", model, scheme, e));

                let mut decoded = ctx.from_bytes(&ctx.to_bytes(&tx)).unwrap();
                ctx.verify_incoming_transaction(&mut decoded)
                    .unwrap_or_else(|e| panic!("{} {:?}: decoded transaction failed to verify: {}", model, scheme, e));

                ctx.update_app_data_client(&mut tx.data).unwrap();
            }
        }
    }
}

#[test]
fn peers_commit_chains_and_reverify_the_whole_ledger() {
    let _ = env_logger::builder().is_test(true).try_init();
    for model in ALL_MODELS {
        for scheme in BOTH_SCHEMES {
            let (mut client, mut peer) = pair(model, scheme, 3, 2, 3);
            for i in 0..4u32 {
                let mut tx = client.random_transaction().unwrap();
                let bytes = client.to_bytes(&tx);
                client.verify_incoming_transaction(&mut tx).unwrap();
                client.update_app_data_client(&mut tx.data).unwrap();

                let mut incoming = peer.from_bytes(&bytes).unwrap();
                peer.verify_incoming_transaction(&mut incoming)
                    .unwrap_or_else(|e| panic!("{} {:?} tx {}: {}", model, scheme, i, e));
                // repeated verification of the same transaction is deterministic
                peer.verify_incoming_transaction(&mut incoming)
                    .unwrap_or_else(|e| panic!("{} {:?} tx {}: second verification: {}", model, scheme, i, e));

                peer.update_app_data_peer(i.into(), &mut incoming).unwrap();
                peer.insert_tx_header(i.into(), &incoming).unwrap();

                let digest = peer.tx_header_identifier(&incoming).unwrap();
                assert_eq!(digest, peer.tx_header_identifier(&incoming).unwrap());
            }
            peer.verify_stored_all_transactions()
                .unwrap_or_else(|e| panic!("{} {:?}: stored ledger failed: {}", model, scheme, e));
        }
    }
}

#[test]
fn peers_handle_wider_ledgers() {
    for model in ALL_MODELS {
        for scheme in BOTH_SCHEMES {
            let (mut client, mut peer) = pair(model, scheme, 10, 4, 5);
            for i in 0..6u32 {
                let mut tx = client.random_transaction().unwrap();
                let bytes = client.to_bytes(&tx);
                client.verify_incoming_transaction(&mut tx).unwrap();
                client.update_app_data_client(&mut tx.data).unwrap();
                commit(&mut peer, i, &bytes);
            }
            peer.verify_stored_all_transactions()
                .unwrap_or_else(|e| panic!("{} {:?}: stored ledger failed: {}", model, scheme, e));
        }
    }
}

#[test]
fn every_flipped_byte_is_rejected() {
    // one UTXO flavour under Schnorr and one account flavour under BLS
    let cases = [
        (helpers::ALL_MODELS[0], BOTH_SCHEMES[0]),
        (helpers::ALL_MODELS[1], BOTH_SCHEMES[1]),
    ];
    for (model, scheme) in cases {
        let (mut client, mut peer) = pair(model, scheme, 10, 2, 3);
        let (_, bytes0) = client_transaction(&mut client, 0, 2);
        commit(&mut peer, 0, &bytes0);
        let (_, bytes) = client_transaction(&mut client, 1, 2);

        let mut clean = peer.from_bytes(&bytes).unwrap();
        peer.verify_incoming_transaction(&mut clean).unwrap();

        for i in 2..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 1;
            match peer.from_bytes(&tampered) {
                Ok(mut tx) => {
                    assert!(
                        peer.verify_incoming_transaction(&mut tx).is_err(),
                        "{} {:?}: flipping byte {} was not rejected",
                        model,
                        scheme,
                        i
                    );
                },
                Err(_) => {},
            }
        }
    }
}

#[test]
fn duplicate_inputs_in_one_transaction_are_rejected() {
    let (mut client, mut peer) = pair(helpers::ALL_MODELS[0], BOTH_SCHEMES[0], 3, 2, 3);
    let (_, bytes0) = client_transaction(&mut client, 0, 1);
    commit(&mut peer, 0, &bytes0);
    let (_, bytes) = client_transaction(&mut client, 1, 1);

    let mut incoming = peer.from_bytes(&bytes).unwrap();
    let dup = incoming.data.inputs[0].clone();
    incoming.data.inputs.push(dup);
    let err = peer.verify_incoming_transaction(&mut incoming).unwrap_err();
    assert!(matches!(err, TransactionError::DuplicateOutputs), "got {:?}", err);
}

#[test]
fn spending_the_same_output_twice_is_rejected() {
    let (mut client, mut peer) = pair(helpers::ALL_MODELS[0], BOTH_SCHEMES[0], 3, 2, 3);
    let (_, bytes0) = client_transaction(&mut client, 0, 1);
    commit(&mut peer, 0, &bytes0);
    let (_, bytes1) = client_transaction(&mut client, 1, 1);
    commit(&mut peer, 1, &bytes1);

    // replaying the same spend must trip on the used marker
    let mut replay = peer.from_bytes(&bytes1).unwrap();
    let err = peer.verify_incoming_transaction(&mut replay).unwrap_err();
    assert!(matches!(err, TransactionError::InputAlreadySpent(_)), "got {:?}", err);
}

#[test]
fn truncated_buffers_are_rejected() {
    let (mut client, _) = pair(helpers::ALL_MODELS[0], BOTH_SCHEMES[0], 3, 2, 3);
    let (_, bytes) = client_transaction(&mut client, 0, 2);
    let peer = ExeContext::new(config(201, Role::Peer, helpers::ALL_MODELS[0], BOTH_SCHEMES[0], 3, 2, 3)).unwrap();
    for len in 0..bytes.len() {
        assert!(
            peer.from_bytes(&bytes[..len]).is_err(),
            "decoding a {}-byte prefix should fail",
            len
        );
    }
    assert!(peer.from_bytes(&bytes).is_ok());
}

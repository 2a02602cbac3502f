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

use ark_bn254::{Bn254, Fq, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_ff::{Field, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use origami_common_types::FixedHash;
use rand::rngs::OsRng;
use sha3::{Digest, Sha3_256};

use super::{KeyPair, SignatureBytes, SignatureError, SignatureOps};

const PUBLIC_KEY_SIZE: usize = 128;
const SECRET_KEY_SIZE: usize = 32;
const SIGNATURE_SIZE: usize = 64;

/// BLS signatures over BN254: secret scalars in Fr, public keys in G2 (128 bytes uncompressed),
/// signatures in G1 (64 bytes uncompressed).
///
/// The hashed message is always `msg ‖ pk`, binding each signature to its signer's key. A set of
/// such signatures over a common message can therefore be summed and checked with one pairing per
/// signer, without a separate possession proof.
pub struct BlsSuite;

fn parse_secret(sk: &[u8]) -> Result<Fr, SignatureError> {
    if sk.len() != SECRET_KEY_SIZE {
        return Err(SignatureError::InvalidKeyLength {
            expected: SECRET_KEY_SIZE,
            actual: sk.len(),
        });
    }
    Fr::deserialize_uncompressed(sk).map_err(|_| SignatureError::DecodeScalar)
}

fn parse_public(pk: &[u8]) -> Result<G2Affine, SignatureError> {
    if pk.len() != PUBLIC_KEY_SIZE {
        return Err(SignatureError::InvalidKeyLength {
            expected: PUBLIC_KEY_SIZE,
            actual: pk.len(),
        });
    }
    G2Affine::deserialize_uncompressed(pk).map_err(|_| SignatureError::DecodePoint)
}

fn parse_signature(sig: &[u8]) -> Result<G1Affine, SignatureError> {
    if sig.len() != SIGNATURE_SIZE {
        return Err(SignatureError::InvalidKeyLength {
            expected: SIGNATURE_SIZE,
            actual: sig.len(),
        });
    }
    G1Affine::deserialize_uncompressed(sig).map_err(|_| SignatureError::DecodePoint)
}

fn scalar_bytes(sk: &Fr) -> Result<Vec<u8>, SignatureError> {
    let mut buf = Vec::with_capacity(SECRET_KEY_SIZE);
    sk.serialize_uncompressed(&mut buf)
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    Ok(buf)
}

fn g1_bytes(p: &G1Affine) -> Result<Vec<u8>, SignatureError> {
    let mut buf = Vec::with_capacity(SIGNATURE_SIZE);
    p.serialize_uncompressed(&mut buf)
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    Ok(buf)
}

fn g2_bytes(p: &G2Affine) -> Result<Vec<u8>, SignatureError> {
    let mut buf = Vec::with_capacity(PUBLIC_KEY_SIZE);
    p.serialize_uncompressed(&mut buf)
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    Ok(buf)
}

/// Deterministic try-and-increment onto G1. The counter lives outside the message so both sides
/// walk the same candidate sequence; BN254's G1 cofactor is one, so any curve point is already in
/// the prime-order group.
fn hash_to_g1(msg: &[u8], pk: &[u8]) -> G1Affine {
    let b = Fq::from(3u64);
    let mut counter = 0u16;
    loop {
        let mut hasher = Sha3_256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(msg);
        hasher.update(pk);
        let digest = hasher.finalize();
        let x = Fq::from_be_bytes_mod_order(digest.as_slice());
        let rhs = x.square() * x + b;
        if let Some(y) = rhs.sqrt() {
            let neg = -y;
            let y = if y.into_bigint() <= neg.into_bigint() { y } else { neg };
            let point = G1Affine::new_unchecked(x, y);
            if point.is_on_curve() {
                return point;
            }
        }
        counter = counter.wrapping_add(1);
    }
}

fn sum_secrets(plus: &[&[u8]], minus: &[&[u8]]) -> Result<Fr, SignatureError> {
    let first = plus.first().ok_or(SignatureError::EmptyKeySet)?;
    let mut agg = parse_secret(first)?;
    for sk in &plus[1..] {
        agg += parse_secret(sk)?;
    }
    for sk in minus {
        agg -= parse_secret(sk)?;
    }
    Ok(agg)
}

impl SignatureOps for BlsSuite {
    fn secret_key_size(&self) -> usize {
        SECRET_KEY_SIZE
    }

    fn public_key_size(&self) -> usize {
        PUBLIC_KEY_SIZE
    }

    fn signature_size(&self) -> usize {
        SIGNATURE_SIZE
    }

    fn generate_keypair(&self) -> KeyPair {
        let sk = Fr::rand(&mut OsRng);
        let pk = (G2Affine::generator() * sk).into_affine();
        // serialising freshly generated field elements cannot fail
        let sk_bytes = scalar_bytes(&sk).unwrap_or_default();
        let pk_bytes = g2_bytes(&pk).unwrap_or_default();
        KeyPair {
            pk: pk_bytes,
            sk: sk_bytes,
        }
    }

    fn sign(&self, keys: &KeyPair, msg: &[u8]) -> Result<SignatureBytes, SignatureError> {
        let sk = parse_secret(&keys.sk)?;
        let h = hash_to_g1(msg, &keys.pk);
        let sig = (h * sk).into_affine();
        g1_bytes(&sig)
    }

    fn verify(&self, pk: &[u8], msg: &[u8], sig: &[u8]) -> bool {
        let pk_point = match parse_public(pk) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let sig_point = match parse_signature(sig) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let h = hash_to_g1(msg, pk);
        Bn254::pairing(sig_point, G2Affine::generator()) == Bn254::pairing(h, pk_point)
    }

    fn aggregate(&self, sigs: &[SignatureBytes]) -> Result<SignatureBytes, SignatureError> {
        let first = sigs.first().ok_or(SignatureError::EmptyKeySet)?;
        let mut agg: G1Projective = parse_signature(first)?.into();
        for sig in &sigs[1..] {
            agg += parse_signature(sig)?;
        }
        g1_bytes(&agg.into_affine())
    }

    fn batch_verify(&self, pks: &[&[u8]], msg: &[u8], sig: &[u8]) -> bool {
        let msgs = vec![msg; pks.len()];
        self.batch_verify_multi(pks, &msgs, sig)
    }

    fn batch_verify_multi(&self, pks: &[&[u8]], msgs: &[&[u8]], sig: &[u8]) -> bool {
        if pks.is_empty() || pks.len() != msgs.len() {
            return false;
        }
        let sig_point = match parse_signature(sig) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let mut hashes = Vec::with_capacity(pks.len());
        let mut points = Vec::with_capacity(pks.len());
        for (pk, msg) in pks.iter().zip(msgs) {
            let pk_point = match parse_public(pk) {
                Ok(p) => p,
                Err(_) => return false,
            };
            hashes.push(hash_to_g1(msg, pk));
            points.push(pk_point);
        }
        Bn254::multi_pairing(hashes, points) == Bn254::pairing(sig_point, G2Affine::generator())
    }

    fn diff_public_key(&self, plus: &[&[u8]], minus: &[&[u8]]) -> Result<Vec<u8>, SignatureError> {
        let first = plus.first().ok_or(SignatureError::EmptyKeySet)?;
        let mut agg: G2Projective = parse_public(first)?.into();
        for pk in &plus[1..] {
            agg += parse_public(pk)?;
        }
        for pk in minus {
            agg -= parse_public(pk)?;
        }
        g2_bytes(&agg.into_affine())
    }

    fn diff_sign(
        &self,
        plus: &[&[u8]],
        minus: &[&[u8]],
        diff_pk: &[u8],
        msg: &[u8],
    ) -> Result<SignatureBytes, SignatureError> {
        let agg = sum_secrets(plus, minus)?;
        let h = hash_to_g1(msg, diff_pk);
        g1_bytes(&(h * agg).into_affine())
    }

    fn blind_keypair(&self, keys: &KeyPair, header: &FixedHash) -> Result<KeyPair, SignatureError> {
        let t = Fr::from_be_bytes_mod_order(header.as_slice());
        let sk = parse_secret(&keys.sk)?;
        let pk = parse_public(&keys.pk)?;
        let blinded_sk = sk * t;
        let blinded_pk = (pk * t).into_affine();
        Ok(KeyPair {
            pk: g2_bytes(&blinded_pk)?,
            sk: scalar_bytes(&blinded_sk)?,
        })
    }

    fn blind_public_key(&self, pk: &[u8], header: &FixedHash) -> Result<Vec<u8>, SignatureError> {
        let t = Fr::from_be_bytes_mod_order(header.as_slice());
        let pk = parse_public(pk)?;
        g2_bytes(&(pk * t).into_affine())
    }
}

#[cfg(test)]
mod test {
    use rand::RngCore;

    use super::*;

    fn random_msg() -> [u8; 32] {
        let mut msg = [0u8; 32];
        OsRng.fill_bytes(&mut msg);
        msg
    }

    #[test]
    fn sign_and_verify() {
        let suite = BlsSuite;
        for _ in 0..5 {
            let keys = suite.generate_keypair();
            assert_eq!(keys.pk.len(), suite.public_key_size());
            let msg = random_msg();
            let sig = suite.sign(&keys, &msg).unwrap();
            assert_eq!(sig.len(), suite.signature_size());
            assert!(suite.verify(&keys.pk, &msg, &sig));
            assert!(!suite.verify(&keys.pk, b"other message", &sig));
            let other = suite.generate_keypair();
            assert!(!suite.verify(&other.pk, &msg, &sig));
        }
    }

    #[test]
    fn rejects_malformed_input() {
        let suite = BlsSuite;
        let keys = suite.generate_keypair();
        let msg = random_msg();
        let sig = suite.sign(&keys, &msg).unwrap();
        assert!(!suite.verify(&keys.pk, &msg, &sig[..63]));
        assert!(!suite.verify(&keys.pk[..127], &msg, &sig));
        let mut tampered = sig.clone();
        tampered[10] ^= 1;
        assert!(!suite.verify(&keys.pk, &msg, &tampered));
    }

    #[test]
    fn aggregate_verifies_per_signer_messages_and_a_common_one() {
        let suite = BlsSuite;
        let msg = random_msg();
        let signers: Vec<KeyPair> = (0..5).map(|_| suite.generate_keypair()).collect();
        let sigs: Vec<SignatureBytes> = signers.iter().map(|k| suite.sign(k, &msg).unwrap()).collect();
        let agg = suite.aggregate(&sigs).unwrap();
        let pks: Vec<&[u8]> = signers.iter().map(|k| k.pk.as_slice()).collect();
        assert!(suite.batch_verify(&pks, &msg, &agg));
        assert!(!suite.batch_verify(&pks, b"other message", &agg));
        assert!(!suite.batch_verify(&pks[..4], &msg, &agg));

        let msgs: Vec<[u8; 32]> = (0..5).map(|_| random_msg()).collect();
        let sigs: Vec<SignatureBytes> = signers
            .iter()
            .zip(&msgs)
            .map(|(k, m)| suite.sign(k, m).unwrap())
            .collect();
        let agg = suite.aggregate(&sigs).unwrap();
        let msg_slices: Vec<&[u8]> = msgs.iter().map(|m| m.as_slice()).collect();
        assert!(suite.batch_verify_multi(&pks, &msg_slices, &agg));
        let mut reordered = msg_slices.clone();
        reordered.swap(0, 1);
        assert!(!suite.batch_verify_multi(&pks, &reordered, &agg));
    }

    #[test]
    fn diff_signature_verifies_under_diff_key() {
        let suite = BlsSuite;
        let msg = random_msg();
        let plus: Vec<KeyPair> = (0..3).map(|_| suite.generate_keypair()).collect();
        let minus: Vec<KeyPair> = (0..3).map(|_| suite.generate_keypair()).collect();
        let plus_pks: Vec<&[u8]> = plus.iter().map(|k| k.pk.as_slice()).collect();
        let minus_pks: Vec<&[u8]> = minus.iter().map(|k| k.pk.as_slice()).collect();
        let plus_sks: Vec<&[u8]> = plus.iter().map(|k| k.sk.as_slice()).collect();
        let minus_sks: Vec<&[u8]> = minus.iter().map(|k| k.sk.as_slice()).collect();

        let diff_pk = suite.diff_public_key(&plus_pks, &minus_pks).unwrap();
        let sig = suite.diff_sign(&plus_sks, &minus_sks, &diff_pk, &msg).unwrap();
        assert!(suite.verify(&diff_pk, &msg, &sig));
    }

    #[test]
    fn blinded_keys_stay_consistent() {
        let suite = BlsSuite;
        let keys = suite.generate_keypair();
        let header = FixedHash::from([9u8; 32]);
        let msg = random_msg();

        let blinded = suite.blind_keypair(&keys, &header).unwrap();
        let blinded_pk = suite.blind_public_key(&keys.pk, &header).unwrap();
        assert_eq!(blinded.pk, blinded_pk);

        let sig = suite.sign(&blinded, &msg).unwrap();
        assert!(suite.verify(&blinded_pk, &msg, &sig));
    }
}

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

use blake2::{Blake2b512, Digest};
use origami_common_types::FixedHash;
use rand::rngs::OsRng;
use tari_crypto::{
    keys::{PublicKey, SecretKey},
    ristretto::{RistrettoPublicKey, RistrettoSchnorr, RistrettoSecretKey},
};
use tari_utilities::ByteArray;

use super::{KeyPair, SignatureBytes, SignatureError, SignatureOps};

const PUBLIC_KEY_SIZE: usize = 32;
const SECRET_KEY_SIZE: usize = 32;
const SIGNATURE_SIZE: usize = 64;

/// Schnorr signatures over the Ristretto group. Signatures serialise as the public nonce followed
/// by the signature scalar.
pub struct SchnorrSuite;

fn parse_public(pk: &[u8]) -> Result<RistrettoPublicKey, SignatureError> {
    RistrettoPublicKey::from_canonical_bytes(pk).map_err(|_| SignatureError::DecodePoint)
}

fn parse_secret(sk: &[u8]) -> Result<RistrettoSecretKey, SignatureError> {
    RistrettoSecretKey::from_canonical_bytes(sk).map_err(|_| SignatureError::DecodeScalar)
}

fn parse_signature(sig: &[u8]) -> Result<RistrettoSchnorr, SignatureError> {
    if sig.len() != SIGNATURE_SIZE {
        return Err(SignatureError::InvalidKeyLength {
            expected: SIGNATURE_SIZE,
            actual: sig.len(),
        });
    }
    let nonce = parse_public(&sig[..PUBLIC_KEY_SIZE])?;
    let s = parse_secret(&sig[PUBLIC_KEY_SIZE..])?;
    Ok(RistrettoSchnorr::new(nonce, s))
}

fn signature_bytes(sig: &RistrettoSchnorr) -> SignatureBytes {
    let mut buf = Vec::with_capacity(SIGNATURE_SIZE);
    buf.extend_from_slice(sig.get_public_nonce().as_bytes());
    buf.extend_from_slice(sig.get_signature().as_bytes());
    buf
}

/// Derive the blinding scalar for an output header by wide reduction, so the producer and the
/// verifier arrive at the same scalar without either of them needing the header preimage.
fn header_scalar(header: &FixedHash) -> Result<RistrettoSecretKey, SignatureError> {
    let wide = Blake2b512::digest(header.as_slice());
    RistrettoSecretKey::from_uniform_bytes(wide.as_slice()).map_err(|_| SignatureError::DecodeScalar)
}

fn sum_secrets(plus: &[&[u8]], minus: &[&[u8]]) -> Result<RistrettoSecretKey, SignatureError> {
    let first = plus.first().ok_or(SignatureError::EmptyKeySet)?;
    let mut agg = parse_secret(first)?;
    for sk in &plus[1..] {
        agg = &agg + &parse_secret(sk)?;
    }
    for sk in minus {
        agg = &agg - &parse_secret(sk)?;
    }
    Ok(agg)
}

impl SignatureOps for SchnorrSuite {
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
        let (sk, pk) = RistrettoPublicKey::random_keypair(&mut OsRng);
        KeyPair {
            pk: pk.as_bytes().to_vec(),
            sk: sk.as_bytes().to_vec(),
        }
    }

    fn sign(&self, keys: &KeyPair, msg: &[u8]) -> Result<SignatureBytes, SignatureError> {
        let sk = parse_secret(&keys.sk)?;
        let sig = RistrettoSchnorr::sign(&sk, msg, &mut OsRng).map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
        Ok(signature_bytes(&sig))
    }

    fn verify(&self, pk: &[u8], msg: &[u8], sig: &[u8]) -> bool {
        let pk = match parse_public(pk) {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        let sig = match parse_signature(sig) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        sig.verify(&pk, msg)
    }

    fn aggregate(&self, _sigs: &[SignatureBytes]) -> Result<SignatureBytes, SignatureError> {
        Err(SignatureError::AggregationUnsupported)
    }

    fn batch_verify(&self, _pks: &[&[u8]], _msg: &[u8], _sig: &[u8]) -> bool {
        false
    }

    fn batch_verify_multi(&self, _pks: &[&[u8]], _msgs: &[&[u8]], _sig: &[u8]) -> bool {
        false
    }

    fn diff_public_key(&self, plus: &[&[u8]], minus: &[&[u8]]) -> Result<Vec<u8>, SignatureError> {
        let first = plus.first().ok_or(SignatureError::EmptyKeySet)?;
        let mut agg = parse_public(first)?;
        for pk in &plus[1..] {
            agg = &agg + &parse_public(pk)?;
        }
        for pk in minus {
            agg = &agg - &parse_public(pk)?;
        }
        Ok(agg.as_bytes().to_vec())
    }

    fn diff_sign(
        &self,
        plus: &[&[u8]],
        minus: &[&[u8]],
        _diff_pk: &[u8],
        msg: &[u8],
    ) -> Result<SignatureBytes, SignatureError> {
        let agg = sum_secrets(plus, minus)?;
        let sig = RistrettoSchnorr::sign(&agg, msg, &mut OsRng).map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
        Ok(signature_bytes(&sig))
    }

    fn blind_keypair(&self, keys: &KeyPair, header: &FixedHash) -> Result<KeyPair, SignatureError> {
        let t = header_scalar(header)?;
        let sk = parse_secret(&keys.sk)?;
        let pk = parse_public(&keys.pk)?;
        let blinded_sk = &sk * &t;
        let blinded_pk = &t * &pk;
        Ok(KeyPair {
            pk: blinded_pk.as_bytes().to_vec(),
            sk: blinded_sk.as_bytes().to_vec(),
        })
    }

    fn blind_public_key(&self, pk: &[u8], header: &FixedHash) -> Result<Vec<u8>, SignatureError> {
        let t = header_scalar(header)?;
        let pk = parse_public(pk)?;
        Ok((&t * &pk).as_bytes().to_vec())
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
        let suite = SchnorrSuite;
        for _ in 0..10 {
            let keys = suite.generate_keypair();
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
    fn rejects_malformed_signatures() {
        let suite = SchnorrSuite;
        let keys = suite.generate_keypair();
        let msg = random_msg();
        let sig = suite.sign(&keys, &msg).unwrap();
        assert!(!suite.verify(&keys.pk, &msg, &sig[..63]));
        let mut tampered = sig.clone();
        tampered[40] ^= 1;
        assert!(!suite.verify(&keys.pk, &msg, &tampered));
    }

    #[test]
    fn diff_signature_verifies_under_diff_key() {
        let suite = SchnorrSuite;
        let msg = random_msg();
        let plus: Vec<KeyPair> = (0..5).map(|_| suite.generate_keypair()).collect();
        let minus: Vec<KeyPair> = (0..5).map(|_| suite.generate_keypair()).collect();
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
        let suite = SchnorrSuite;
        let keys = suite.generate_keypair();
        let header = FixedHash::from([7u8; 32]);
        let msg = random_msg();

        let blinded = suite.blind_keypair(&keys, &header).unwrap();
        let blinded_pk = suite.blind_public_key(&keys.pk, &header).unwrap();
        assert_eq!(blinded.pk, blinded_pk);

        let sig = suite.sign(&blinded, &msg).unwrap();
        assert!(suite.verify(&blinded_pk, &msg, &sig));
        assert!(!suite.verify(&keys.pk, &msg, &sig));
    }
}

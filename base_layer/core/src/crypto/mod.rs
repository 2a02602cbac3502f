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

//! The signature suite behind the transaction-header engine.
//!
//! Two schemes are supported: Schnorr over Ristretto and BLS over BN254. Both expose the same
//! byte-oriented operations so that the engine, the stores and the wire format never handle
//! scheme-specific types. The BLS flavour binds the signer's public key into the hashed message
//! (`msg ‖ pk`), which is what makes naive one-signer-per-key aggregation safe without a
//! rogue-key check; substituting a scheme that hashes only `msg` would make aggregate
//! verification fail.

mod error;
pub use error::SignatureError;

pub mod bls;
pub mod schnorr;

use bls::BlsSuite;
use origami_common_types::FixedHash;
use schnorr::SchnorrSuite;

use crate::config::SigScheme;

/// A signature in its serialised form: 64 bytes under both schemes.
pub type SignatureBytes = Vec<u8>;

/// Key material as the stores persist it. `keys` concatenations are always `pk ‖ sk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub pk: Vec<u8>,
    pub sk: Vec<u8>,
}

impl KeyPair {
    /// The persisted `pk ‖ sk` concatenation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.pk.len() + self.sk.len());
        buf.extend_from_slice(&self.pk);
        buf.extend_from_slice(&self.sk);
        buf
    }

    pub fn from_bytes(public_key_size: usize, secret_key_size: usize, bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != public_key_size + secret_key_size {
            return Err(SignatureError::InvalidKeyLength {
                expected: public_key_size + secret_key_size,
                actual: bytes.len(),
            });
        }
        Ok(KeyPair {
            pk: bytes[..public_key_size].to_vec(),
            sk: bytes[public_key_size..].to_vec(),
        })
    }
}

/// The operation-level contract both schemes satisfy.
///
/// Verification never returns errors: any malformed input (wrong length, undecodable point) is a
/// plain rejection. Signing is infallible given well-formed keys; malformed keys surface as
/// [SignatureError].
pub trait SignatureOps {
    fn secret_key_size(&self) -> usize;
    fn public_key_size(&self) -> usize;
    fn signature_size(&self) -> usize;

    fn generate_keypair(&self) -> KeyPair;

    fn sign(&self, keys: &KeyPair, msg: &[u8]) -> Result<SignatureBytes, SignatureError>;
    fn verify(&self, pk: &[u8], msg: &[u8], sig: &[u8]) -> bool;

    /// Sum the signatures into a single one. Only defined for BLS.
    fn aggregate(&self, sigs: &[SignatureBytes]) -> Result<SignatureBytes, SignatureError>;
    /// Verify an aggregate signature by all signers over the same message.
    fn batch_verify(&self, pks: &[&[u8]], msg: &[u8], sig: &[u8]) -> bool;
    /// Verify an aggregate signature with one message per signer.
    fn batch_verify_multi(&self, pks: &[&[u8]], msgs: &[&[u8]], sig: &[u8]) -> bool;

    /// Serialise `Σ plus − Σ minus` over public keys.
    fn diff_public_key(&self, plus: &[&[u8]], minus: &[&[u8]]) -> Result<Vec<u8>, SignatureError>;
    /// Sign under the scalar `Σ plus − Σ minus`. `diff_pk` must be the matching aggregate public
    /// key: BLS binds it into the hashed message.
    fn diff_sign(
        &self,
        plus: &[&[u8]],
        minus: &[&[u8]],
        diff_pk: &[u8],
        msg: &[u8],
    ) -> Result<SignatureBytes, SignatureError>;

    /// Multiply the key pair by the scalar derived from an output header.
    fn blind_keypair(&self, keys: &KeyPair, header: &FixedHash) -> Result<KeyPair, SignatureError>;
    /// Multiply a public key by the scalar derived from an output header.
    fn blind_public_key(&self, pk: &[u8], header: &FixedHash) -> Result<Vec<u8>, SignatureError>;
}

/// Scheme dispatch for the engine.
pub enum SignatureSuite {
    Schnorr(SchnorrSuite),
    Bls(BlsSuite),
}

impl SignatureSuite {
    pub fn new(scheme: SigScheme) -> Self {
        match scheme {
            SigScheme::Schnorr => SignatureSuite::Schnorr(SchnorrSuite),
            SigScheme::Bls => SignatureSuite::Bls(BlsSuite),
        }
    }

    pub fn scheme(&self) -> SigScheme {
        match self {
            SignatureSuite::Schnorr(_) => SigScheme::Schnorr,
            SignatureSuite::Bls(_) => SigScheme::Bls,
        }
    }

    fn ops(&self) -> &dyn SignatureOps {
        match self {
            SignatureSuite::Schnorr(s) => s,
            SignatureSuite::Bls(s) => s,
        }
    }
}

impl SignatureOps for SignatureSuite {
    fn secret_key_size(&self) -> usize {
        self.ops().secret_key_size()
    }

    fn public_key_size(&self) -> usize {
        self.ops().public_key_size()
    }

    fn signature_size(&self) -> usize {
        self.ops().signature_size()
    }

    fn generate_keypair(&self) -> KeyPair {
        self.ops().generate_keypair()
    }

    fn sign(&self, keys: &KeyPair, msg: &[u8]) -> Result<SignatureBytes, SignatureError> {
        self.ops().sign(keys, msg)
    }

    fn verify(&self, pk: &[u8], msg: &[u8], sig: &[u8]) -> bool {
        self.ops().verify(pk, msg, sig)
    }

    fn aggregate(&self, sigs: &[SignatureBytes]) -> Result<SignatureBytes, SignatureError> {
        self.ops().aggregate(sigs)
    }

    fn batch_verify(&self, pks: &[&[u8]], msg: &[u8], sig: &[u8]) -> bool {
        self.ops().batch_verify(pks, msg, sig)
    }

    fn batch_verify_multi(&self, pks: &[&[u8]], msgs: &[&[u8]], sig: &[u8]) -> bool {
        self.ops().batch_verify_multi(pks, msgs, sig)
    }

    fn diff_public_key(&self, plus: &[&[u8]], minus: &[&[u8]]) -> Result<Vec<u8>, SignatureError> {
        self.ops().diff_public_key(plus, minus)
    }

    fn diff_sign(
        &self,
        plus: &[&[u8]],
        minus: &[&[u8]],
        diff_pk: &[u8],
        msg: &[u8],
    ) -> Result<SignatureBytes, SignatureError> {
        self.ops().diff_sign(plus, minus, diff_pk, msg)
    }

    fn blind_keypair(&self, keys: &KeyPair, header: &FixedHash) -> Result<KeyPair, SignatureError> {
        self.ops().blind_keypair(keys, header)
    }

    fn blind_public_key(&self, pk: &[u8], header: &FixedHash) -> Result<Vec<u8>, SignatureError> {
        self.ops().blind_public_key(pk, header)
    }
}

impl KeyPair {
    /// The public-key prefix of a persisted `pk ‖ sk` concatenation.
    pub fn public_slice(keys: &[u8], public_key_size: usize) -> &[u8] {
        &keys[..public_key_size.min(keys.len())]
    }
}

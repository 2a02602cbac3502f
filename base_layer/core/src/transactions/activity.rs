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

//! Activity proofs: the modular ratio `Π header(out) / Π header(in) mod q` that commits a
//! transaction to the exact set of outputs it created and inputs it consumed. Products of these
//! ratios telescope across the ledger, which is what the aggregated models verify against.

use std::{
    convert::TryFrom,
    fmt,
    fmt::{Display, Formatter},
};

use num_bigint::BigUint;
use num_traits::One;
use once_cell::sync::Lazy;
use origami_common_types::types::ACTIVITY_LENGTH;
use tari_utilities::hex::to_hex;
use thiserror::Error;

use crate::{context::ExeContext, transactions::app_data::AppData};

/// The order of the ~256-bit prime group the activity arithmetic runs in. The byte literal is
/// part of the ledger's configuration; all participants must share it.
const GROUP_ORDER_BYTES: [u8; ACTIVITY_LENGTH] = [
    13, 4, 90, 151, 95, 128, 247, 206, 252, 192, 83, 31, 233, 88, 11, 186, 251, 63, 158, 54, 191, 232, 0, 72, 241,
    158, 134, 107, 133, 75, 78, 157, 223,
];

static GROUP_ORDER: Lazy<BigUint> = Lazy::new(|| BigUint::from_bytes_be(&GROUP_ORDER_BYTES));

/// A scalar below the group order, encoded as a fixed 33-byte big-endian buffer with one leading
/// byte reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityProof([u8; ACTIVITY_LENGTH]);

#[derive(Debug, Error)]
#[error("An activity proof must be exactly {ACTIVITY_LENGTH} bytes")]
pub struct ActivityProofSizeError;

impl ActivityProof {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl From<[u8; ACTIVITY_LENGTH]> for ActivityProof {
    fn from(bytes: [u8; ACTIVITY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for ActivityProof {
    type Error = ActivityProofSizeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != ACTIVITY_LENGTH {
            return Err(ActivityProofSizeError);
        }
        let mut buf = [0u8; ACTIVITY_LENGTH];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }
}

impl Display for ActivityProof {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_hex(&self.0))
    }
}

/// Arithmetic over the fixed group order. One instance lives in each execution context and is
/// reused across calls; intermediate values are dropped on every exit path by ownership.
#[derive(Debug, Clone, Default)]
pub struct GroupModulus;

impl GroupModulus {
    pub fn order(&self) -> &BigUint {
        &GROUP_ORDER
    }

    /// Interpret big-endian bytes as a group element.
    pub fn element(&self, bytes: &[u8]) -> BigUint {
        BigUint::from_bytes_be(bytes) % &*GROUP_ORDER
    }

    pub fn one(&self) -> BigUint {
        BigUint::one()
    }

    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &*GROUP_ORDER
    }

    /// Modular inverse by Fermat exponentiation; the order is prime.
    pub fn inv(&self, a: &BigUint) -> BigUint {
        let exponent = &*GROUP_ORDER - 2u8;
        a.modpow(&exponent, &GROUP_ORDER)
    }

    /// Left-pad to the canonical 33-byte big-endian encoding.
    pub fn encode(&self, a: &BigUint) -> ActivityProof {
        let bytes = a.to_bytes_be();
        let mut buf = [0u8; ACTIVITY_LENGTH];
        buf[ACTIVITY_LENGTH - bytes.len()..].copy_from_slice(&bytes);
        ActivityProof(buf)
    }

    /// `(a · b) mod q` over canonical byte encodings.
    pub fn mul_bytes(&self, a: &[u8], b: &[u8]) -> ActivityProof {
        let r = self.mul(&self.element(a), &self.element(b));
        self.encode(&r)
    }

    /// `(a · b⁻¹) mod q` over canonical byte encodings.
    pub fn div_bytes(&self, a: &[u8], b: &[u8]) -> ActivityProof {
        let b = self.inv(&self.element(b));
        let r = self.mul(&self.element(a), &b);
        self.encode(&r)
    }
}

impl ExeContext {
    /// The activity proof of an application change:
    /// `Π header(out) · (Π header(in))⁻¹ mod q`. Output headers must have been computed before
    /// this is called.
    pub(crate) fn compute_app_activity(&self, data: &AppData) -> ActivityProof {
        let modulus = self.modulus();
        let mut d = modulus.one();
        for input in &data.inputs {
            d = modulus.mul(&d, &modulus.element(input.header.as_slice()));
        }
        d = modulus.inv(&d);
        for output in &data.outputs {
            d = modulus.mul(&d, &modulus.element(output.header.as_slice()));
        }
        modulus.encode(&d)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn buf(low: u8, next: u8) -> [u8; ACTIVITY_LENGTH] {
        let mut b = [0u8; ACTIVITY_LENGTH];
        b[ACTIVITY_LENGTH - 1] = low;
        b[ACTIVITY_LENGTH - 2] = next;
        b
    }

    #[test]
    fn small_value_vectors() {
        let modulus = GroupModulus;

        let c = modulus.div_bytes(&buf(8, 0), &buf(2, 0));
        assert_eq!(c, ActivityProof::from(buf(4, 0)));

        // 0x104 / 4 = 65
        let c = modulus.div_bytes(&buf(4, 1), &buf(4, 0));
        assert_eq!(c, ActivityProof::from(buf(65, 0)));

        let c = modulus.mul_bytes(&buf(4, 0), &buf(4, 0));
        assert_eq!(c, ActivityProof::from(buf(16, 0)));

        // 16 * 16 = 256
        let c = modulus.mul_bytes(&buf(16, 0), &buf(16, 0));
        assert_eq!(c, ActivityProof::from(buf(0, 1)));
    }

    #[test]
    fn inverse_round_trips() {
        let modulus = GroupModulus;
        let a = modulus.element(&[7u8; 32]);
        let inv = modulus.inv(&a);
        assert_eq!(modulus.mul(&a, &inv), modulus.one());
    }

    #[test]
    fn encode_is_fixed_width() {
        let modulus = GroupModulus;
        let one = modulus.encode(&modulus.one());
        assert_eq!(one.as_bytes().len(), ACTIVITY_LENGTH);
        assert_eq!(one.as_bytes()[ACTIVITY_LENGTH - 1], 1);
        assert!(!one.is_zero());
        assert!(ActivityProof::try_from([0u8; 5].as_slice()).is_err());
    }
}

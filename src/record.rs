// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The at-rest, per-user server record (spec §3 `Opaque_UserRecord`, §6).
//!
//! `k_s || p_s || P_u || P_s || extra_len || Opaque_Blob`. `P_u` is
//! duplicated here in plaintext (outside the envelope) so the server can run
//! 3-DH without ever decrypting the envelope it stores.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;

use crate::config::{POINT_LEN, SCALAR_LEN};
use crate::envelope::Envelope;
use crate::errors::utils::check_slice_size_atleast;
use crate::errors::{InternalError, ProtocolError};
use crate::group::{decode_point, decode_scalar, point_to_bytes, scalar_to_bytes};

/// A fully-populated server-stored user record.
#[derive(Clone)]
pub struct UserRecord {
    pub(crate) k_s: Scalar,
    pub(crate) p_s: Scalar,
    pub(crate) big_p_u: RistrettoPoint,
    pub(crate) big_p_s: RistrettoPoint,
    pub(crate) extra_len: u64,
    pub(crate) envelope: Envelope,
}

impl UserRecord {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * SCALAR_LEN + 2 * POINT_LEN + 8 + self.envelope.serialize().len());
        out.extend_from_slice(&scalar_to_bytes(&self.k_s));
        out.extend_from_slice(&scalar_to_bytes(&self.p_s));
        out.extend_from_slice(&point_to_bytes(&self.big_p_u));
        out.extend_from_slice(&point_to_bytes(&self.big_p_s));
        out.extend_from_slice(&self.extra_len.to_le_bytes());
        out.extend_from_slice(self.envelope.serialize());
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let head_len = 2 * SCALAR_LEN + 2 * POINT_LEN + 8;
        let checked = check_slice_size_atleast(bytes, head_len, "user_record")?;

        let k_s = decode_scalar(&checked[..SCALAR_LEN])?;
        let p_s = decode_scalar(&checked[SCALAR_LEN..2 * SCALAR_LEN])?;
        let big_p_u = decode_point(&checked[2 * SCALAR_LEN..2 * SCALAR_LEN + POINT_LEN])?;
        let big_p_s = decode_point(&checked[2 * SCALAR_LEN + POINT_LEN..2 * SCALAR_LEN + 2 * POINT_LEN])?;

        let mut extra_len_bytes = [0u8; 8];
        extra_len_bytes.copy_from_slice(&checked[2 * SCALAR_LEN + 2 * POINT_LEN..head_len]);
        let extra_len = u64::from_le_bytes(extra_len_bytes);
        if extra_len > crate::config::OPAQUE_MAX_EXTRA_BYTES {
            return Err(InternalError::Overflow.into());
        }

        let sec_len = SCALAR_LEN + 2 * POINT_LEN + extra_len as usize;
        let envelope = Envelope::deserialize(&checked[head_len..], sec_len, 0)?;

        Ok(UserRecord {
            k_s,
            p_s,
            big_p_u,
            big_p_s,
            extra_len,
            envelope,
        })
    }
}

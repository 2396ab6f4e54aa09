// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Registration (spec §4.3, §4.4): trusted-server registration, where the
//! server generates everything and the user gets only an export key back,
//! and private registration, a three-message protocol in which the user's
//! long-term secret `p_u` never leaves the client unencrypted.
//!
//! Grounded on `haochenuw-opaque-ke::opaque`'s `ClientRegistration::start` /
//! `finish` and `ServerRegistration::start` / `finish` two/three-message
//! split, generalized to this protocol's explicit `k_s`/`p_s`/`p_u` naming
//! and the `rwd` side-export spec §4.4 adds on top of `export_key`.

use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};

use crate::config::{STR_RWD, SCALAR_LEN, POINT_LEN};
use crate::envelope::Envelope;
use crate::errors::ProtocolError;
use crate::group::{self, point_to_bytes, scalar_to_bytes};
use crate::messages::{BlindedPassword, RegisterPub, RegisterSec};
use crate::oprf;
use crate::record::UserRecord;

/// `init_srv(pw, extra, key, clr_env) -> (record, export_key)` — the
/// trusted-server registration flow (spec §4.3). All keys are generated
/// server-side; the caller is trusted to have received `pw` directly (e.g.
/// over a channel already authenticated some other way), which is why this
/// flow exists alongside the private one in §4.4.
pub fn init_srv<R: RngCore + CryptoRng>(
    pw: &[u8],
    extra: &[u8],
    key: Option<&[u8]>,
    clr_env: &[u8],
    rng: &mut R,
) -> Result<(UserRecord, [u8; 32]), ProtocolError> {
    let k_s = group::random_scalar(rng);
    let rw = oprf::rw_direct(pw, &k_s, key)?;

    let p_s = group::random_scalar(rng);
    let p_u = group::random_scalar(rng);
    let big_p_s = group::public_key(&p_s);
    let big_p_u = group::public_key(&p_u);

    let sec_env = build_sec_env(&p_u, &big_p_u, &big_p_s, extra);
    let (envelope, export_key) = Envelope::seal(&rw, &sec_env, clr_env, rng)?;

    let record = UserRecord {
        k_s,
        p_s,
        big_p_u,
        big_p_s,
        extra_len: extra.len() as u64,
        envelope,
    };

    Ok((record, export_key))
}

/// Step 1 of private registration (spec §4.4): `usr_start(pw) -> (r,
/// alpha)`, identical to [`crate::oprf::blind`].
pub fn private_init_usr_start<R: RngCore + CryptoRng>(
    pw: &[u8],
    rng: &mut R,
) -> (Scalar, BlindedPassword) {
    let blinded = oprf::blind(pw, rng);
    (blinded.r, BlindedPassword { alpha: blinded.alpha })
}

/// Step 2 (server): `srv_respond(alpha) -> (RegSec, RegPub)`.
pub fn private_init_srv_respond<R: RngCore + CryptoRng>(
    alpha_bytes: &[u8],
    rng: &mut R,
) -> Result<(RegisterSec, RegisterPub), ProtocolError> {
    let alpha = group::decode_point(alpha_bytes)?;
    let k_s = group::random_scalar(rng);
    let beta = oprf::evaluate_point(&k_s, &alpha);
    let p_s = group::random_scalar(rng);
    let big_p_s = group::public_key(&p_s);

    Ok((
        RegisterSec { p_s, k_s },
        RegisterPub { beta, big_p_s },
    ))
}

/// Result of [`private_init_usr_respond`]: the plaintext `P_u` and envelope
/// bytes to send to the server, plus the client's local `rwd` and
/// `export_key`.
pub struct PrivateRegistrationUpload {
    pub big_p_u: [u8; POINT_LEN],
    pub envelope: Vec<u8>,
    pub rwd: [u8; 32],
    pub export_key: [u8; 32],
}

/// Step 3 (client): `usr_respond(pw, r, RegPub, extra, key, clr_env) ->
/// (upload, rwd, export_key)`.
pub fn private_init_usr_respond<R: RngCore + CryptoRng>(
    pw: &[u8],
    r: &Scalar,
    reg_pub: &RegisterPub,
    extra: &[u8],
    key: Option<&[u8]>,
    clr_env: &[u8],
    rng: &mut R,
) -> Result<PrivateRegistrationUpload, ProtocolError> {
    let beta_bytes = point_to_bytes(&reg_pub.beta);
    let rw = oprf::unblind(pw, r, &beta_bytes, key)?;

    let p_u = group::random_scalar(rng);
    let big_p_u = group::public_key(&p_u);

    let sec_env = build_sec_env(&p_u, &big_p_u, &reg_pub.big_p_s, extra);
    let (envelope, export_key) = Envelope::seal(&rw, &sec_env, clr_env, rng)?;

    let rwd = derive_rwd(&rw);

    Ok(PrivateRegistrationUpload {
        big_p_u: point_to_bytes(&big_p_u),
        envelope: envelope.serialize().to_vec(),
        rwd,
        export_key,
    })
}

/// Step 4 (server): `srv_finish(RegSec, RegPub, upload) -> record`. Writes
/// `k_s`, `p_s`, `P_s` into the plaintext header and persists the client's
/// sealed envelope and public key unchanged.
pub fn private_init_srv_finish(
    reg_sec: &RegisterSec,
    reg_pub: &RegisterPub,
    upload: &PrivateRegistrationUpload,
    extra_len: u64,
) -> Result<UserRecord, ProtocolError> {
    let big_p_u = group::decode_point(&upload.big_p_u)?;
    let sec_len = SCALAR_LEN + 2 * POINT_LEN + extra_len as usize;
    let envelope = Envelope::deserialize(&upload.envelope, sec_len, 0)?;

    Ok(UserRecord {
        k_s: reg_sec.k_s,
        p_s: reg_sec.p_s,
        big_p_u,
        big_p_s: reg_pub.big_p_s,
        extra_len,
        envelope,
    })
}

/// Builds the fixed-schema secret payload sealed inside the envelope:
/// `p_u || P_u || P_s || extra` (spec §4.3, §4.4 — `extra` lives inside
/// `SecEnv`, not a separate `ClrEnv`; see spec §9-i for the historical
/// duplicated-copy bug this crate avoids by only ever writing `extra` here,
/// once, guarded by its own length).
fn build_sec_env(
    p_u: &Scalar,
    big_p_u: &curve25519_dalek::ristretto::RistrettoPoint,
    big_p_s: &curve25519_dalek::ristretto::RistrettoPoint,
    extra: &[u8],
) -> Vec<u8> {
    let mut sec_env = Vec::with_capacity(SCALAR_LEN + 2 * POINT_LEN + extra.len());
    sec_env.extend_from_slice(&scalar_to_bytes(p_u));
    sec_env.extend_from_slice(&point_to_bytes(big_p_u));
    sec_env.extend_from_slice(&point_to_bytes(big_p_s));
    sec_env.extend_from_slice(extra);
    sec_env
}

/// `rwd = BLAKE2b(rw, "rwd", 32)` — the client's application-side
/// derivative of `rw` (spec §4.4).
pub(crate) fn derive_rwd(rw: &[u8; 32]) -> [u8; 32] {
    use blake2::digest::{KeyInit, Mac, Update};
    use blake2::Blake2bMac;
    use digest::consts::U32;

    let mut mac = Blake2bMac::<U32>::new_from_slice(rw).expect("32-byte key is within BLAKE2b's key range");
    Mac::update(&mut mac, STR_RWD);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&tag);
    out
}

/// Recovers the three fields sealed in `SecEnv` by [`build_sec_env`]:
/// `(p_u, P_u, P_s, extra)`.
pub(crate) fn parse_sec_env(sec_env: &[u8]) -> Result<(Scalar, [u8; POINT_LEN], [u8; POINT_LEN], Vec<u8>), ProtocolError> {
    if sec_env.len() < SCALAR_LEN + 2 * POINT_LEN {
        return Err(crate::errors::InternalError::SizeMismatch.into());
    }
    let p_u = group::decode_scalar(&sec_env[..SCALAR_LEN])?;
    let mut big_p_u = [0u8; POINT_LEN];
    big_p_u.copy_from_slice(&sec_env[SCALAR_LEN..SCALAR_LEN + POINT_LEN]);
    let mut big_p_s = [0u8; POINT_LEN];
    big_p_s.copy_from_slice(&sec_env[SCALAR_LEN + POINT_LEN..SCALAR_LEN + 2 * POINT_LEN]);
    let extra = sec_env[SCALAR_LEN + 2 * POINT_LEN..].to_vec();
    Ok((p_u, big_p_u, big_p_s, extra))
}

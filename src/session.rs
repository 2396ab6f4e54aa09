// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Login / AKE (spec §4.5): the three-flight handshake that composes the
//! OPRF, the sealed envelope, triple-DH and HMAC confirmation into mutual
//! authentication with an agreed session key.
//!
//! Per-side state transitions are expressed the Rust way — as ownership:
//! `session_usr_start` returns a [`UserSessionSecret`] that only
//! `session_usr_finish` can consume, and `session_srv` returns a
//! [`TranscriptState`] that only `session_server_auth` can consume. There is
//! no separate enum tracking `Idle -> AwaitServer -> ...`; the type system
//! already refuses to let a caller skip a step or run one twice.
//!
//! ```text
//! user:   Idle -> AwaitServer (session_usr_start)
//!              -> AwaitServerAuth/Accept (session_usr_finish)
//!              -> Done (authU emitted, if requested)
//! server: Idle -> AwaitUserAuth (session_srv)
//!              -> Done | Abort (session_server_auth)
//! ```

use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::ake::{self, OpaqueKeys};
use crate::config::NONCE_LEN;
use crate::errors::{InternalError, ProtocolError};
use crate::group;
use crate::messages::{AppInfos, Ids, ServerSession, UserAuth, UserSession, UserSessionSecret};
use crate::record::UserRecord;
use crate::registration::{derive_rwd, parse_sec_env};
use crate::secret::Secret32;
use crate::transcript::TranscriptState;
use crate::oprf;

/// `usr_start(pw) -> (UserSessionSecret, UserSession)` (spec §4.5).
pub(crate) fn session_usr_start<R: RngCore + CryptoRng>(
    pw: &[u8],
    rng: &mut R,
) -> (UserSessionSecret, UserSession) {
    let blinded = oprf::blind(pw, rng);
    let x_u = group::random_scalar(rng);
    let big_x_u = group::public_key(&x_u);
    let mut nonce_u = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_u);

    let secret = UserSessionSecret {
        r: blinded.r,
        x_u,
        nonce_u,
        alpha: blinded.alpha,
    };
    let public = UserSession {
        alpha: blinded.alpha,
        big_x_u,
        nonce_u,
    };
    (secret, public)
}

/// Result of [`session_srv`]: the message to send back plus the keys and
/// transcript state the caller needs to finish the handshake.
pub(crate) struct ServerSessionResult {
    pub(crate) message: ServerSession,
    pub(crate) sk: Secret32,
    pub(crate) km3: Secret32,
    pub(crate) saved_transcript: TranscriptState,
}

/// `srv(UserSession, UserRecord, Ids, App_Infos) -> (ServerSession, sk, km3,
/// xcript_state)` (spec §4.5).
pub(crate) fn session_srv<R: RngCore + CryptoRng>(
    user_session: &UserSession,
    record: &UserRecord,
    ids: &Ids,
    app_infos: &AppInfos,
    rng: &mut R,
) -> Result<ServerSessionResult, ProtocolError> {
    let x_s = group::random_scalar(rng);
    let big_x_s = group::public_key(&x_s);
    let mut nonce_s = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_s);

    let beta = oprf::evaluate_point(&record.k_s, &user_session.alpha);

    let info = ake::transcript_info(&user_session.nonce_u, &nonce_s, ids.id_u, ids.id_s);
    let ikm = ake::server_ikm(&record.p_s, &x_s, &user_session.big_x_u, &record.big_p_u);
    let keys = ake::derive_session_keys(&ikm, &info)?;

    let envelope_bytes = record.envelope.serialize().to_vec();
    let (auth, saved_transcript) = compute_auth_and_saved_state(
        &keys.km2,
        &user_session.alpha,
        &user_session.nonce_u,
        app_infos.info1,
        &user_session.big_x_u,
        &beta,
        &envelope_bytes,
        &nonce_s,
        app_infos.info2,
        &big_x_s,
        app_infos.einfo2,
    );

    let message = ServerSession {
        beta,
        big_x_s,
        nonce_s,
        auth,
        extra_len: record.extra_len,
        envelope: record.envelope.clone(),
    };

    Ok(ServerSessionResult {
        message,
        sk: keys.sk,
        km3: keys.km3,
        saved_transcript,
    })
}

/// Builds the fixed field-order transcript through `einfo2`, cloning the
/// state right before the point where `info3`/`einfo3` would be absorbed
/// (spec §9's cloneable-hash-state design note): one copy is finalized
/// immediately for the short (`auth`) transcript, the other is returned
/// un-finalized so [`session_server_auth`] can later extend it with
/// `info3 || einfo3` for the long (`authU`) transcript.
#[allow(clippy::too_many_arguments)]
fn compute_auth_and_saved_state(
    km2: &Secret32,
    alpha: &curve25519_dalek::ristretto::RistrettoPoint,
    nonce_u: &[u8],
    info1: &[u8],
    big_x_u: &curve25519_dalek::ristretto::RistrettoPoint,
    beta: &curve25519_dalek::ristretto::RistrettoPoint,
    envelope_bytes: &[u8],
    nonce_s: &[u8],
    info2: &[u8],
    big_x_s: &curve25519_dalek::ristretto::RistrettoPoint,
    einfo2: &[u8],
) -> ([u8; 32], TranscriptState) {
    let mut state = TranscriptState::new();
    state
        .absorb(&group::point_to_bytes(alpha))
        .absorb(nonce_u)
        .absorb(info1)
        .absorb(&group::point_to_bytes(big_x_u))
        .absorb(&group::point_to_bytes(beta))
        .absorb(envelope_bytes)
        .absorb(nonce_s)
        .absorb(info2)
        .absorb(&group::point_to_bytes(big_x_s))
        .absorb(einfo2);

    let saved = state.clone_before_final();
    let digest = state.finalize();
    let auth = hmac_tag(km2, &digest);
    (auth, saved)
}

/// Result of [`session_usr_finish`].
pub(crate) struct UserFinishResult {
    pub(crate) sk: Secret32,
    pub(crate) rwd: [u8; 32],
    pub(crate) export_key: [u8; 32],
    pub(crate) auth_u: Option<UserAuth>,
}

/// `usr_finish(pw, ServerSession, UserSessionSecret, Ids, App_Infos) -> (sk,
/// rwd, export_key, authU)` (spec §4.5).
pub(crate) fn session_usr_finish(
    pw: &[u8],
    server_session: &ServerSession,
    secret: UserSessionSecret,
    ids: &Ids,
    app_infos: &AppInfos,
    want_auth_u: bool,
) -> Result<UserFinishResult, ProtocolError> {
    let rw = oprf::unblind_point(pw, &secret.r, &server_session.beta, None)?;
    let (sec_env, _clr_env, export_key) = server_session.envelope.open(&rw)?;
    let (p_u, big_p_u_bytes, big_p_s_bytes, _extra) = parse_sec_env(&sec_env)?;
    let big_p_s = group::decode_point(&big_p_s_bytes)?;
    let _big_p_u = group::decode_point(&big_p_u_bytes)?;

    let info = ake::transcript_info(&secret.nonce_u, &server_session.nonce_s, ids.id_u, ids.id_s);
    let ikm = ake::client_ikm(&secret.x_u, &p_u, &big_p_s, &server_session.big_x_s);
    let keys = ake::derive_session_keys(&ikm, &info)?;

    let envelope_bytes = server_session.envelope.serialize().to_vec();
    let mut short_transcript = TranscriptState::new();
    short_transcript
        .absorb(&group::point_to_bytes(&secret.alpha))
        .absorb(&secret.nonce_u)
        .absorb(app_infos.info1)
        .absorb(&group::point_to_bytes(&group::public_key(&secret.x_u)))
        .absorb(&group::point_to_bytes(&server_session.beta))
        .absorb(&envelope_bytes)
        .absorb(&server_session.nonce_s)
        .absorb(app_infos.info2)
        .absorb(&group::point_to_bytes(&server_session.big_x_s))
        .absorb(app_infos.einfo2);
    let long_transcript_base = short_transcript.clone_before_final();
    let short_digest = short_transcript.finalize();

    let expected_auth = hmac_tag(&keys.km2, &short_digest);
    if expected_auth.ct_eq(&server_session.auth).unwrap_u8() == 0 {
        return Err(InternalError::ServerAuth.into());
    }

    let rwd = derive_rwd(&rw);

    let auth_u = if want_auth_u {
        let mut long_transcript = long_transcript_base;
        long_transcript.absorb(app_infos.info3).absorb(app_infos.einfo3);
        let long_digest = long_transcript.finalize();
        Some(UserAuth {
            auth_u: hmac_tag(&keys.km3, &long_digest),
        })
    } else {
        None
    };

    Ok(UserFinishResult {
        sk: keys.sk,
        rwd,
        export_key,
        auth_u,
    })
}

/// `server_auth(km3, saved xcript_state, authU, App_Infos)` (spec §4.5):
/// finishes the saved transcript by absorbing `info3 || einfo3`, then
/// verifies `HMAC(km3, digest)` against `authU` in constant time.
pub(crate) fn session_server_auth(
    km3: &Secret32,
    saved_transcript: TranscriptState,
    user_auth: &UserAuth,
    app_infos: &AppInfos,
) -> Result<(), ProtocolError> {
    let mut state = saved_transcript;
    state.absorb(app_infos.info3).absorb(app_infos.einfo3);
    let digest = state.finalize();
    let expected = hmac_tag(km3, &digest);

    if expected.ct_eq(&user_auth.auth_u).unwrap_u8() == 0 {
        return Err(InternalError::UserAuth.into());
    }
    Ok(())
}

fn hmac_tag(key: &[u8], message: &[u8]) -> [u8; 32] {
    // HMAC-SHA256 accepts arbitrary-length keys; these are always 32-byte
    // HKDF outputs, so `new_from_slice` never fails in practice.
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("32-byte HKDF output is a valid HMAC key");
    mac.update(message);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&tag);
    out
}

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! An OPAQUE-style asymmetric password-authenticated key exchange (aPAKE)
//! engine over Ristretto255.
//!
//! Three things compose into the protocol this crate implements:
//!
//! - an **OPRF** ([`oprf`], internal) that lets a server evaluate a
//!   password-derived PRF without ever seeing the password;
//! - an **envelope** ([`Envelope`]) that seals a user's long-term key
//!   material under a key derived from that PRF output, so the server never
//!   stores anything password-equivalent;
//! - a **triple-DH AKE** that combines both peers' long-term and ephemeral
//!   keys into a session key, confirmed in both directions by HMAC tags over
//!   a canonical transcript.
//!
//! Registration has two flows: [`init_srv`] is the trusted-server variant,
//! where the caller is assumed to have delivered the password to the server
//! over some already-authenticated channel; [`private_init_usr_start`] and
//! its three counterparts run the same envelope construction without ever
//! exposing the password (or anything equivalent to it) off the client.
//!
//! Login is [`session_usr_start`] / [`session_srv`] / [`session_usr_finish`]
//! / [`session_server_auth`], a three-flight exchange that ends with both
//! sides holding an identical [`SessionKey`] and mutually authenticated.
//!
//! This crate deliberately fixes its cipher suite (Ristretto255, SHA-256,
//! HKDF-SHA256, HMAC-SHA256, BLAKE2b, Argon2id) rather than exposing a
//! generic trait over interchangeable primitives: there is no wire
//! negotiation of a protocol version, so there is nothing for a generic
//! cipher-suite parameter to select between.

mod ake;
mod config;
mod envelope;
mod errors;
mod group;
mod messages;
mod oprf;
mod record;
mod registration;
mod secret;
mod session;
mod transcript;

#[cfg(feature = "capi")]
pub mod ffi;

use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

pub use crate::envelope::Envelope;
pub use crate::errors::ProtocolError;
pub use crate::messages::{AppInfos, BlindedPassword, Ids, RegisterPub, RegisterSec, ServerSession, UserAuth, UserSession, UserSessionSecret};
pub use crate::record::UserRecord;
pub use crate::registration::{
    init_srv, private_init_srv_finish, private_init_srv_respond, private_init_usr_respond,
    private_init_usr_start, PrivateRegistrationUpload,
};

/// A derived session key, zeroized on drop. Identical on both peers once
/// [`session_usr_finish`] and [`session_server_auth`] both succeed.
pub struct SessionKey(Zeroizing<[u8; 32]>);

impl SessionKey {
    /// Borrows the raw 32 bytes of the session key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl core::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// `usr_start(pw) -> (state, UserSession)` (spec §4.5): the client's first
/// login message, plus the local state `session_usr_finish` needs once the
/// server responds.
pub fn session_usr_start<R: RngCore + CryptoRng>(
    pw: &[u8],
    rng: &mut R,
) -> (UserSessionSecret, UserSession) {
    session::session_usr_start(pw, rng)
}

/// Everything [`session_srv`] produces: the message to send back to the
/// client, the agreed session key, and the opaque state needed to verify
/// the client's reply once it arrives.
pub struct ServerLoginFinish {
    /// Flight 2, to be sent to the client.
    pub message: ServerSession,
    /// The session key this server now shares with whichever client holds
    /// the matching password.
    pub session_key: SessionKey,
    /// Held until the client's flight-3 message arrives, then consumed by
    /// [`session_server_auth`].
    pub state: ServerLoginState,
}

/// Opaque server-side state carried between [`session_srv`] and
/// [`session_server_auth`]. Holds the key and partial transcript hash
/// needed to verify the client's authentication tag; neither is exposed.
pub struct ServerLoginState {
    km3: crate::secret::Secret32,
    saved_transcript: transcript::TranscriptState,
}

impl ServerLoginState {
    /// `server_auth(km3, xcript_state, authU, App_Infos)` (spec §4.5).
    pub fn finish(self, user_auth: &UserAuth, app_infos: &AppInfos) -> Result<(), ProtocolError> {
        session::session_server_auth(&self.km3, self.saved_transcript, user_auth, app_infos)
    }
}

/// `srv(UserSession, UserRecord, Ids, App_Infos) -> (ServerSession, sk, km3,
/// xcript_state)` (spec §4.5).
pub fn session_srv<R: RngCore + CryptoRng>(
    user_session: &UserSession,
    record: &UserRecord,
    ids: &Ids,
    app_infos: &AppInfos,
    rng: &mut R,
) -> Result<ServerLoginFinish, ProtocolError> {
    let result = session::session_srv(user_session, record, ids, app_infos, rng)?;
    Ok(ServerLoginFinish {
        message: result.message,
        session_key: SessionKey(result.sk),
        state: ServerLoginState {
            km3: result.km3,
            saved_transcript: result.saved_transcript,
        },
    })
}

/// Everything [`session_usr_finish`] produces.
pub struct ClientLoginFinish {
    /// The session key this client now shares with the server, assuming
    /// the password matched.
    pub session_key: SessionKey,
    /// The client's local derivative of the password, independent of any
    /// particular login session (spec §4.4's `rwd`).
    pub rwd: [u8; 32],
    /// The per-registration secret recovered from the envelope, usable by
    /// the application for anything it sealed alongside the password at
    /// registration time.
    pub export_key: [u8; 32],
    /// Flight 3, to be sent to the server, if the caller asked for it.
    pub auth_u: Option<UserAuth>,
}

/// `usr_finish(pw, ServerSession, state, Ids, App_Infos) -> (sk, rwd,
/// export_key, authU)` (spec §4.5). Fails with
/// [`ProtocolError::ServerAuth`] if the server's tag doesn't verify, in
/// which case no session key or `rwd` is produced.
pub fn session_usr_finish(
    pw: &[u8],
    server_session: &ServerSession,
    state: UserSessionSecret,
    ids: &Ids,
    app_infos: &AppInfos,
    want_auth_u: bool,
) -> Result<ClientLoginFinish, ProtocolError> {
    let result = session::session_usr_finish(pw, server_session, state, ids, app_infos, want_auth_u)?;
    Ok(ClientLoginFinish {
        session_key: SessionKey(result.sk),
        rwd: result.rwd,
        export_key: result.export_key,
        auth_u: result.auth_u,
    })
}

/// `server_auth(km3, xcript_state, authU, App_Infos)` (spec §4.5):
/// equivalent to [`ServerLoginState::finish`], provided as a free function
/// so callers that destructure [`ServerLoginFinish`] immediately can call
/// either form.
pub fn session_server_auth(
    state: ServerLoginState,
    user_auth: &UserAuth,
    app_infos: &AppInfos,
) -> Result<(), ProtocolError> {
    state.finish(user_auth, app_infos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn end_to_end_trusted_registration_and_login() {
        let mut rng = OsRng;
        let pw = b"correct horse battery staple";
        let ids = Ids {
            id_u: b"alice",
            id_s: b"example.com",
        };
        let app_infos = AppInfos::default();

        let (record, export_key_at_registration) =
            init_srv(pw, b"profile-blob", None, b"", &mut rng).unwrap();

        let (usr_state, usr_msg) = session_usr_start(pw, &mut rng);
        let srv_finish = session_srv(&usr_msg, &record, &ids, &app_infos, &mut rng).unwrap();
        let usr_finish =
            session_usr_finish(pw, &srv_finish.message, usr_state, &ids, &app_infos, true).unwrap();

        assert_eq!(
            srv_finish.session_key.as_bytes(),
            usr_finish.session_key.as_bytes()
        );
        assert_eq!(export_key_at_registration, usr_finish.export_key);

        let auth_u = usr_finish.auth_u.unwrap();
        srv_finish.state.finish(&auth_u, &app_infos).unwrap();
    }

    #[test]
    fn end_to_end_private_registration_and_login() {
        let mut rng = OsRng;
        let pw = b"hunter2";
        let ids = Ids {
            id_u: b"bob",
            id_s: b"example.com",
        };
        let app_infos = AppInfos::default();

        let (r, reg_start) = private_init_usr_start(pw, &mut rng);
        let alpha_bytes = reg_start.serialize();
        let (reg_sec, reg_pub) = private_init_srv_respond(&alpha_bytes, &mut rng).unwrap();
        let upload =
            private_init_usr_respond(pw, &r, &reg_pub, b"", None, b"", &mut rng).unwrap();
        let record = private_init_srv_finish(&reg_sec, &reg_pub, &upload, 0).unwrap();

        let (usr_state, usr_msg) = session_usr_start(pw, &mut rng);
        let srv_finish = session_srv(&usr_msg, &record, &ids, &app_infos, &mut rng).unwrap();
        let usr_finish =
            session_usr_finish(pw, &srv_finish.message, usr_state, &ids, &app_infos, true).unwrap();

        assert_eq!(
            srv_finish.session_key.as_bytes(),
            usr_finish.session_key.as_bytes()
        );
        assert_eq!(upload.rwd, usr_finish.rwd);

        let auth_u = usr_finish.auth_u.unwrap();
        srv_finish.state.finish(&auth_u, &app_infos).unwrap();
    }
}

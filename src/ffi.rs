// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! C-callable boundary (spec §6): the same eight entry points as the Rust
//! API, adapted to `extern "C" fn(..) -> i32` returning `0` on success and
//! `-1` on any failure — the protocol never tells a remote peer which
//! internal check fired, and this boundary makes that true for C callers
//! too by discarding the `ProtocolError` variant entirely.
//!
//! Byte buffers cross as `(*const u8, usize)` pairs; the caller owns every
//! buffer's memory. Variable-length outputs (anything carrying an
//! envelope) use a query-then-fill convention: call once with a buffer
//! sized from [`FFI_MAX_RECORD_LEN`]-style upper bounds (or `0` to query),
//! and the required length is always written to `*out_len` regardless of
//! whether the call succeeded — a `cap` too small is reported as `BadArg`,
//! not a partial write.
//!
//! Per-session state that must outlive one call (the client's blinding
//! secret between `session_usr_start`/`session_usr_finish`, the server's
//! `km3`/transcript between `session_srv`/`session_server_auth`) is handed
//! back as an opaque pointer; the matching `_free` function must be called
//! exactly once, whether or not the handshake completed.
#![allow(unsafe_code)]

use std::os::raw::c_int;
use std::slice;

use rand::rngs::OsRng;

use crate::{
    private_init_srv_finish, private_init_srv_respond, private_init_usr_respond,
    private_init_usr_start, session_server_auth, session_srv, session_usr_finish,
    session_usr_start, AppInfos, BlindedPassword, Ids, RegisterPub, RegisterSec, ServerLoginState,
    ServerSession, UserAuth, UserRecord, UserSession, UserSessionSecret,
};

const OK: c_int = 0;
const FAIL: c_int = -1;

unsafe fn slice_or_empty<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        slice::from_raw_parts(ptr, len)
    }
}

unsafe fn key_or_none<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if ptr.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(ptr, len))
    }
}

/// Writes `data` into `(out_ptr, out_cap)`, always setting `*out_len` to
/// `data.len()`. Returns `false` (and writes nothing) if `out_cap` is too
/// small, so the caller can retry with a bigger buffer.
unsafe fn write_out(data: &[u8], out_ptr: *mut u8, out_cap: usize, out_len: *mut usize) -> bool {
    if !out_len.is_null() {
        *out_len = data.len();
    }
    if data.len() > out_cap || out_ptr.is_null() {
        return false;
    }
    std::ptr::copy_nonoverlapping(data.as_ptr(), out_ptr, data.len());
    true
}

fn app_infos_from_raw<'a>(
    info1: *const u8,
    info1_len: usize,
    info2: *const u8,
    info2_len: usize,
    einfo2: *const u8,
    einfo2_len: usize,
    info3: *const u8,
    info3_len: usize,
    einfo3: *const u8,
    einfo3_len: usize,
) -> AppInfos<'a> {
    unsafe {
        AppInfos {
            info1: slice_or_empty(info1, info1_len),
            info2: slice_or_empty(info2, info2_len),
            einfo2: slice_or_empty(einfo2, einfo2_len),
            info3: slice_or_empty(info3, info3_len),
            einfo3: slice_or_empty(einfo3, einfo3_len),
        }
    }
}

/// `init_srv(pw, extra, key, clr_env) -> (record, export_key)` (spec §4.3).
///
/// `key_ptr == null` means "no key" (spec's optional MAC key); a non-null
/// pointer with `key_len == 0` means an explicit empty key, distinct from
/// absent.
///
/// # Safety
/// Every `(ptr, len)` pair must describe a valid, readable byte range (or
/// be `null` with `len == 0`). `out_record_ptr`/`out_export_key_ptr` must
/// be writable for `out_record_cap`/32 bytes respectively, or null.
#[no_mangle]
pub unsafe extern "C" fn opaque_init_srv(
    pw_ptr: *const u8,
    pw_len: usize,
    extra_ptr: *const u8,
    extra_len: usize,
    key_ptr: *const u8,
    key_len: usize,
    clr_env_ptr: *const u8,
    clr_env_len: usize,
    out_record_ptr: *mut u8,
    out_record_cap: usize,
    out_record_len: *mut usize,
    out_export_key_ptr: *mut u8,
) -> c_int {
    let pw = slice_or_empty(pw_ptr, pw_len);
    let extra = slice_or_empty(extra_ptr, extra_len);
    let key = key_or_none(key_ptr, key_len);
    let clr_env = slice_or_empty(clr_env_ptr, clr_env_len);

    let mut rng = OsRng;
    let (record, export_key) = match crate::init_srv(pw, extra, key, clr_env, &mut rng) {
        Ok(ok) => ok,
        Err(_) => return FAIL,
    };

    let bytes = record.serialize();
    if !write_out(&bytes, out_record_ptr, out_record_cap, out_record_len) {
        return FAIL;
    }
    if !write_out(&export_key, out_export_key_ptr, 32, std::ptr::null_mut()) {
        return FAIL;
    }
    OK
}

/// Opaque handle wrapping the client's login secret between
/// `opaque_session_usr_start` and `opaque_session_usr_finish`.
pub struct OpaqueClientLoginState(UserSessionSecret);

/// `session_usr_start(pw) -> (state, UserSession)` (spec §4.5).
///
/// # Safety
/// `pw_ptr`/`pw_len` must describe a valid byte range. `out_session_ptr`
/// must be writable for 96 bytes or null. `out_state` must be a valid,
/// writable `*mut *mut OpaqueClientLoginState`.
#[no_mangle]
pub unsafe extern "C" fn opaque_session_usr_start(
    pw_ptr: *const u8,
    pw_len: usize,
    out_session_ptr: *mut u8,
    out_session_cap: usize,
    out_session_len: *mut usize,
    out_state: *mut *mut OpaqueClientLoginState,
) -> c_int {
    if out_state.is_null() {
        return FAIL;
    }
    let pw = slice_or_empty(pw_ptr, pw_len);
    let mut rng = OsRng;
    let (state, message) = session_usr_start(pw, &mut rng);

    if !write_out(
        &message.serialize(),
        out_session_ptr,
        out_session_cap,
        out_session_len,
    ) {
        return FAIL;
    }

    *out_state = Box::into_raw(Box::new(OpaqueClientLoginState(state)));
    OK
}

/// Releases a client login handle without finishing the handshake
/// (cancellation, per spec §5: "callers discard the in-progress secret
/// state, which must zeroise all locked pages on drop").
///
/// # Safety
/// `state` must either be null or a pointer previously returned by
/// `opaque_session_usr_start` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn opaque_client_login_free(state: *mut OpaqueClientLoginState) {
    if !state.is_null() {
        drop(Box::from_raw(state));
    }
}

/// Opaque handle wrapping the server's `km3` and partial transcript between
/// `opaque_session_srv` and `opaque_session_server_auth`.
pub struct OpaqueServerLoginState(ServerLoginState);

/// `srv(UserSession, UserRecord, Ids, App_Infos) -> (ServerSession, sk, km3,
/// xcript_state)` (spec §4.5).
///
/// # Safety
/// All `(ptr, len)` pairs must describe valid byte ranges or be null with
/// `len == 0`. `out_message_ptr` must be writable for `out_message_cap`
/// bytes or null; `out_session_key` must be writable for 32 bytes or null;
/// `out_state` must be a valid, writable `*mut *mut OpaqueServerLoginState`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn opaque_session_srv(
    user_session_ptr: *const u8,
    user_session_len: usize,
    record_ptr: *const u8,
    record_len: usize,
    id_u_ptr: *const u8,
    id_u_len: usize,
    id_s_ptr: *const u8,
    id_s_len: usize,
    info1_ptr: *const u8,
    info1_len: usize,
    info2_ptr: *const u8,
    info2_len: usize,
    einfo2_ptr: *const u8,
    einfo2_len: usize,
    info3_ptr: *const u8,
    info3_len: usize,
    einfo3_ptr: *const u8,
    einfo3_len: usize,
    out_message_ptr: *mut u8,
    out_message_cap: usize,
    out_message_len: *mut usize,
    out_session_key: *mut u8,
    out_state: *mut *mut OpaqueServerLoginState,
) -> c_int {
    if out_state.is_null() {
        return FAIL;
    }
    let user_session = match UserSession::deserialize(slice_or_empty(user_session_ptr, user_session_len)) {
        Ok(u) => u,
        Err(_) => return FAIL,
    };
    let record = match UserRecord::deserialize(slice_or_empty(record_ptr, record_len)) {
        Ok(r) => r,
        Err(_) => return FAIL,
    };
    let ids = Ids {
        id_u: slice_or_empty(id_u_ptr, id_u_len),
        id_s: slice_or_empty(id_s_ptr, id_s_len),
    };
    let app_infos = app_infos_from_raw(
        info1_ptr, info1_len, info2_ptr, info2_len, einfo2_ptr, einfo2_len, info3_ptr, info3_len,
        einfo3_ptr, einfo3_len,
    );

    let mut rng = OsRng;
    let finish = match session_srv(&user_session, &record, &ids, &app_infos, &mut rng) {
        Ok(f) => f,
        Err(_) => return FAIL,
    };

    if !write_out(
        &finish.message.serialize(),
        out_message_ptr,
        out_message_cap,
        out_message_len,
    ) {
        return FAIL;
    }
    if !write_out(finish.session_key.as_bytes(), out_session_key, 32, std::ptr::null_mut()) {
        return FAIL;
    }

    *out_state = Box::into_raw(Box::new(OpaqueServerLoginState(finish.state)));
    OK
}

/// Releases a server login handle without verifying the client's reply
/// (abort path of the server's `AwaitUserAuth -> Abort` transition, spec
/// §4.5's state machine).
///
/// # Safety
/// `state` must either be null or a pointer previously returned by
/// `opaque_session_srv` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn opaque_server_login_free(state: *mut OpaqueServerLoginState) {
    if !state.is_null() {
        drop(Box::from_raw(state));
    }
}

/// `usr_finish(pw, ServerSession, state, Ids, App_Infos) -> (sk, rwd,
/// export_key, authU)` (spec §4.5). Consumes and frees `state` regardless
/// of outcome.
///
/// # Safety
/// All `(ptr, len)` pairs must describe valid byte ranges or be null with
/// `len == 0`. `state` must be a pointer previously returned by
/// `opaque_session_usr_start`, not yet freed. Output buffers must be
/// writable for their documented sizes (32 bytes each) or null;
/// `out_auth_u` follows the same convention only if `want_auth_u != 0`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn opaque_session_usr_finish(
    pw_ptr: *const u8,
    pw_len: usize,
    server_session_ptr: *const u8,
    server_session_len: usize,
    state: *mut OpaqueClientLoginState,
    id_u_ptr: *const u8,
    id_u_len: usize,
    id_s_ptr: *const u8,
    id_s_len: usize,
    info1_ptr: *const u8,
    info1_len: usize,
    info2_ptr: *const u8,
    info2_len: usize,
    einfo2_ptr: *const u8,
    einfo2_len: usize,
    info3_ptr: *const u8,
    info3_len: usize,
    einfo3_ptr: *const u8,
    einfo3_len: usize,
    want_auth_u: c_int,
    out_session_key: *mut u8,
    out_rwd: *mut u8,
    out_export_key: *mut u8,
    out_auth_u: *mut u8,
) -> c_int {
    if state.is_null() {
        return FAIL;
    }
    let boxed_state = Box::from_raw(state);

    let pw = slice_or_empty(pw_ptr, pw_len);
    let server_session = match ServerSession::deserialize(slice_or_empty(
        server_session_ptr,
        server_session_len,
    )) {
        Ok(s) => s,
        Err(_) => return FAIL,
    };
    let ids = Ids {
        id_u: slice_or_empty(id_u_ptr, id_u_len),
        id_s: slice_or_empty(id_s_ptr, id_s_len),
    };
    let app_infos = app_infos_from_raw(
        info1_ptr, info1_len, info2_ptr, info2_len, einfo2_ptr, einfo2_len, info3_ptr, info3_len,
        einfo3_ptr, einfo3_len,
    );

    let finish = match session_usr_finish(
        pw,
        &server_session,
        boxed_state.0,
        &ids,
        &app_infos,
        want_auth_u != 0,
    ) {
        Ok(f) => f,
        Err(_) => return FAIL,
    };

    if !write_out(finish.session_key.as_bytes(), out_session_key, 32, std::ptr::null_mut()) {
        return FAIL;
    }
    if !write_out(&finish.rwd, out_rwd, 32, std::ptr::null_mut()) {
        return FAIL;
    }
    if !write_out(&finish.export_key, out_export_key, 32, std::ptr::null_mut()) {
        return FAIL;
    }
    if let Some(auth_u) = finish.auth_u {
        if !write_out(&auth_u.serialize(), out_auth_u, 32, std::ptr::null_mut()) {
            return FAIL;
        }
    }
    OK
}

/// `server_auth(km3, xcript_state, authU, App_Infos)` (spec §4.5). Consumes
/// and frees `state` regardless of outcome.
///
/// # Safety
/// `state` must be a pointer previously returned by `opaque_session_srv`,
/// not yet freed. `(ptr, len)` pairs must describe valid byte ranges or be
/// null with `len == 0`.
#[no_mangle]
pub unsafe extern "C" fn opaque_session_server_auth(
    state: *mut OpaqueServerLoginState,
    auth_u_ptr: *const u8,
    auth_u_len: usize,
    info1_ptr: *const u8,
    info1_len: usize,
    info2_ptr: *const u8,
    info2_len: usize,
    einfo2_ptr: *const u8,
    einfo2_len: usize,
    info3_ptr: *const u8,
    info3_len: usize,
    einfo3_ptr: *const u8,
    einfo3_len: usize,
) -> c_int {
    if state.is_null() {
        return FAIL;
    }
    let boxed_state = Box::from_raw(state);

    let user_auth = match UserAuth::deserialize(slice_or_empty(auth_u_ptr, auth_u_len)) {
        Ok(a) => a,
        Err(_) => return FAIL,
    };
    let app_infos = app_infos_from_raw(
        info1_ptr, info1_len, info2_ptr, info2_len, einfo2_ptr, einfo2_len, info3_ptr, info3_len,
        einfo3_ptr, einfo3_len,
    );

    match session_server_auth(boxed_state.0, &user_auth, &app_infos) {
        Ok(()) => OK,
        Err(_) => FAIL,
    }
}

/// `private_init_usr_start(pw) -> (r, alpha)` (spec §4.4). The blinding
/// scalar `r` is returned boxed (opaque, zeroizing on free) since it has no
/// fixed-width C representation callers should rely on directly.
#[no_mangle]
pub unsafe extern "C" fn opaque_private_init_usr_start(
    pw_ptr: *const u8,
    pw_len: usize,
    out_alpha: *mut u8,
    out_r: *mut *mut BlindingFactor,
) -> c_int {
    if out_r.is_null() {
        return FAIL;
    }
    let pw = slice_or_empty(pw_ptr, pw_len);
    let mut rng = OsRng;
    let (r, blinded) = private_init_usr_start(pw, &mut rng);

    if !write_out(&blinded.serialize(), out_alpha, 32, std::ptr::null_mut()) {
        return FAIL;
    }
    *out_r = Box::into_raw(Box::new(BlindingFactor(r)));
    OK
}

/// Opaque handle for the blinding scalar `r` between
/// `opaque_private_init_usr_start` and `opaque_private_init_usr_respond`.
/// Zeroized on drop.
#[derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct BlindingFactor(curve25519_dalek::scalar::Scalar);

/// # Safety
/// `state` must either be null or a pointer previously returned by
/// `opaque_private_init_usr_start` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn opaque_blinding_factor_free(state: *mut BlindingFactor) {
    if !state.is_null() {
        drop(Box::from_raw(state));
    }
}

/// `private_init_srv_respond(alpha) -> (RegSec, RegPub)` (spec §4.4).
///
/// # Safety
/// `alpha_ptr` must describe a valid 32-byte range. Output buffers must be
/// writable for 64 bytes (`RegisterSec`) and 64 bytes (`RegisterPub`)
/// respectively, or null.
#[no_mangle]
pub unsafe extern "C" fn opaque_private_init_srv_respond(
    alpha_ptr: *const u8,
    alpha_len: usize,
    out_reg_sec: *mut u8,
    out_reg_pub: *mut u8,
) -> c_int {
    let alpha = slice_or_empty(alpha_ptr, alpha_len);
    let mut rng = OsRng;
    let (reg_sec, reg_pub) = match private_init_srv_respond(alpha, &mut rng) {
        Ok(ok) => ok,
        Err(_) => return FAIL,
    };

    if !write_out(&reg_sec.serialize(), out_reg_sec, 64, std::ptr::null_mut()) {
        return FAIL;
    }
    if !write_out(&reg_pub.serialize(), out_reg_pub, 64, std::ptr::null_mut()) {
        return FAIL;
    }
    OK
}

/// `private_init_usr_respond(pw, r, RegPub, extra, key, clr_env) -> (upload,
/// rwd, export_key)` (spec §4.4). Consumes and frees `r` regardless of
/// outcome.
///
/// # Safety
/// `r` must be a pointer previously returned by
/// `opaque_private_init_usr_start`, not yet freed. All `(ptr, len)` pairs
/// must describe valid byte ranges or be null with `len == 0`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn opaque_private_init_usr_respond(
    pw_ptr: *const u8,
    pw_len: usize,
    r: *mut BlindingFactor,
    reg_pub_ptr: *const u8,
    reg_pub_len: usize,
    extra_ptr: *const u8,
    extra_len: usize,
    key_ptr: *const u8,
    key_len: usize,
    clr_env_ptr: *const u8,
    clr_env_len: usize,
    out_big_p_u: *mut u8,
    out_envelope_ptr: *mut u8,
    out_envelope_cap: usize,
    out_envelope_len: *mut usize,
    out_rwd: *mut u8,
    out_export_key: *mut u8,
) -> c_int {
    if r.is_null() {
        return FAIL;
    }
    let boxed_r = Box::from_raw(r);

    let pw = slice_or_empty(pw_ptr, pw_len);
    let reg_pub = match RegisterPub::deserialize(slice_or_empty(reg_pub_ptr, reg_pub_len)) {
        Ok(p) => p,
        Err(_) => return FAIL,
    };
    let extra = slice_or_empty(extra_ptr, extra_len);
    let key = key_or_none(key_ptr, key_len);
    let clr_env = slice_or_empty(clr_env_ptr, clr_env_len);

    let mut rng = OsRng;
    let upload = match private_init_usr_respond(pw, &boxed_r.0, &reg_pub, extra, key, clr_env, &mut rng) {
        Ok(u) => u,
        Err(_) => return FAIL,
    };

    if !write_out(&upload.big_p_u, out_big_p_u, 32, std::ptr::null_mut()) {
        return FAIL;
    }
    if !write_out(&upload.envelope, out_envelope_ptr, out_envelope_cap, out_envelope_len) {
        return FAIL;
    }
    if !write_out(&upload.rwd, out_rwd, 32, std::ptr::null_mut()) {
        return FAIL;
    }
    if !write_out(&upload.export_key, out_export_key, 32, std::ptr::null_mut()) {
        return FAIL;
    }
    OK
}

/// `private_init_srv_finish(RegSec, RegPub, upload, extra_len) -> record`
/// (spec §4.4).
///
/// # Safety
/// All `(ptr, len)` pairs must describe valid byte ranges or be null with
/// `len == 0`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn opaque_private_init_srv_finish(
    reg_sec_ptr: *const u8,
    reg_sec_len: usize,
    reg_pub_ptr: *const u8,
    reg_pub_len: usize,
    big_p_u_ptr: *const u8,
    envelope_ptr: *const u8,
    envelope_len: usize,
    rwd_ptr: *const u8,
    export_key_ptr: *const u8,
    extra_len: u64,
    out_record_ptr: *mut u8,
    out_record_cap: usize,
    out_record_len: *mut usize,
) -> c_int {
    let reg_sec = match RegisterSec::deserialize(slice_or_empty(reg_sec_ptr, reg_sec_len)) {
        Ok(s) => s,
        Err(_) => return FAIL,
    };
    let reg_pub = match RegisterPub::deserialize(slice_or_empty(reg_pub_ptr, reg_pub_len)) {
        Ok(p) => p,
        Err(_) => return FAIL,
    };
    let mut big_p_u = [0u8; 32];
    if big_p_u_ptr.is_null() {
        return FAIL;
    }
    std::ptr::copy_nonoverlapping(big_p_u_ptr, big_p_u.as_mut_ptr(), 32);

    let mut rwd = [0u8; 32];
    if rwd_ptr.is_null() {
        return FAIL;
    }
    std::ptr::copy_nonoverlapping(rwd_ptr, rwd.as_mut_ptr(), 32);

    let mut export_key = [0u8; 32];
    if export_key_ptr.is_null() {
        return FAIL;
    }
    std::ptr::copy_nonoverlapping(export_key_ptr, export_key.as_mut_ptr(), 32);

    let upload = crate::PrivateRegistrationUpload {
        big_p_u,
        envelope: slice_or_empty(envelope_ptr, envelope_len).to_vec(),
        rwd,
        export_key,
    };

    let record = match private_init_srv_finish(&reg_sec, &reg_pub, &upload, extra_len) {
        Ok(r) => r,
        Err(_) => return FAIL,
    };

    if !write_out(&record.serialize(), out_record_ptr, out_record_cap, out_record_len) {
        return FAIL;
    }
    OK
}

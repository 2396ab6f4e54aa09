// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Error types returned by this crate.
//!
//! Following the taxonomy fixed by the protocol: every failure collapses to
//! one of a small number of public [`ProtocolError`] variants. No variant
//! reveals *which* internal check failed beyond what the protocol itself
//! already tells the peer (nothing) — the distinction between, say,
//! `InvalidPoint` and `EnvelopeAuth` is for the local caller's own
//! diagnostics, never serialized onto the wire.

use displaydoc::Display;

/// Internal error kinds, matched one-to-one against spec §7's taxonomy.
/// Not exposed outside the crate; [`ProtocolError`] is the public type.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub(crate) enum InternalError {
    /// a group element was not a valid point in the prime-order subgroup
    InvalidPoint,
    /// a secret-holding allocation could not be obtained
    MemoryLock,
    /// the password hash exceeded its memory budget
    PwHashOom,
    /// the envelope authentication tag did not verify
    EnvelopeAuth,
    /// the server authentication tag (km2) did not verify
    ServerAuth,
    /// the user authentication tag (km3) did not verify
    UserAuth,
    /// a length field overflowed its bound
    Overflow,
    /// a caller-supplied argument was malformed
    BadArg,
    /// an HKDF expansion exceeded the digest's output limit
    HkdfError,
    /// an HMAC key was of unsupported length
    HmacError,
    /// a byte slice had the wrong size for deserialization
    SizeMismatch,
}

#[cfg(feature = "std")]
impl std::error::Error for InternalError {}

/// Errors returned across this crate's public API.
///
/// Every public entry point returns `Result<_, ProtocolError>`. Per spec §7,
/// the protocol itself never tells the remote peer which of these fired; the
/// variant exists purely for the local caller (and, in turn, collapses to a
/// single `-1` at the C-callable boundary in [`crate::ffi`]).
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// a group element (blinded password, OPRF evaluation, or ephemeral key)
    /// was not a valid point in the prime-order subgroup
    InvalidPoint,
    /// the envelope failed to authenticate under the recovered key
    EnvelopeAuth,
    /// the server's authentication tag did not verify
    ServerAuth,
    /// the user's authentication tag did not verify
    UserAuth,
    /// `extra_len` or a derived length exceeded its bound, or overflowed
    Overflow,
    /// a caller-supplied buffer or identifier was malformed
    BadArg,
    /// a secret-holding allocation could not be obtained
    MemoryLock,
    /// the memory-hard password hash could not complete within its budget
    PwHashOom,
}

impl From<InternalError> for ProtocolError {
    fn from(e: InternalError) -> Self {
        match e {
            InternalError::InvalidPoint => ProtocolError::InvalidPoint,
            InternalError::MemoryLock => ProtocolError::MemoryLock,
            InternalError::PwHashOom => ProtocolError::PwHashOom,
            InternalError::EnvelopeAuth => ProtocolError::EnvelopeAuth,
            InternalError::ServerAuth => ProtocolError::ServerAuth,
            InternalError::UserAuth => ProtocolError::UserAuth,
            InternalError::Overflow => ProtocolError::Overflow,
            InternalError::BadArg
            | InternalError::HkdfError
            | InternalError::HmacError
            | InternalError::SizeMismatch => ProtocolError::BadArg,
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {}

pub(crate) mod utils {
    use super::InternalError;

    /// Checks that `bytes` is exactly `expected` long, returning the slice
    /// unchanged. Mirrors `check_slice_size` in the example pack's
    /// `opaque-ke` forks.
    pub(crate) fn check_slice_size<'a>(
        bytes: &'a [u8],
        expected: usize,
        _name: &'static str,
    ) -> Result<&'a [u8], InternalError> {
        if bytes.len() != expected {
            return Err(InternalError::SizeMismatch);
        }
        Ok(bytes)
    }

    /// Like [`check_slice_size`] but only enforces a lower bound, for
    /// variable-length trailing regions (`extra`, envelopes).
    pub(crate) fn check_slice_size_atleast<'a>(
        bytes: &'a [u8],
        minimum: usize,
        _name: &'static str,
    ) -> Result<&'a [u8], InternalError> {
        if bytes.len() < minimum {
            return Err(InternalError::SizeMismatch);
        }
        Ok(bytes)
    }
}

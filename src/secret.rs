// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Secret-lifetime discipline (spec §5, §9): every intermediate key,
//! blinding scalar, shared secret and randomized password is wrapped in a
//! type whose `Drop` zeroizes its contents, so that ordinary early returns
//! (including error paths) can't leave key material sitting in memory.
//!
//! True OS-level page locking (`mlock`/`VirtualLock`) is outside what a
//! portable crate can promise across every target this library builds for;
//! the teacher crate doesn't attempt it either. What this module gives
//! instead — and what the teacher's `derive_where(Zeroize(drop))` pattern
//! gives — is the part that's actually enforceable in portable Rust:
//! guaranteed zeroization on every exit path. A caller with an OS-level
//! page-locking requirement should wrap the allocator at a layer above this
//! crate.

use zeroize::Zeroizing;

/// A fixed-size byte buffer that is zeroized on drop.
pub(crate) type Secret32 = Zeroizing<[u8; 32]>;

/// A variable-length byte buffer that is zeroized on drop. Used for the
/// envelope's `SecEnv` plaintext, which carries a caller-controlled `extra`
/// tail and so cannot be fixed-size.
pub(crate) type SecretBytes = Zeroizing<Vec<u8>>;

pub(crate) fn secret32(bytes: [u8; 32]) -> Secret32 {
    Zeroizing::new(bytes)
}

pub(crate) fn secret_bytes(bytes: Vec<u8>) -> SecretBytes {
    Zeroizing::new(bytes)
}

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Fixed cipher-suite parameters.
//!
//! The protocol assumes a single, wire-unnegotiated cipher suite (Ristretto255
//! / SHA-256 / HKDF-SHA256 / HMAC-SHA256 / BLAKE2b / Argon2id-interactive).
//! There is deliberately no runtime configuration object for these: changing
//! any one of them is a protocol break, not a config change.

/// Byte length of a serialized group element (compressed Ristretto255 point).
pub const POINT_LEN: usize = 32;
/// Byte length of a serialized scalar.
pub const SCALAR_LEN: usize = 32;
/// Byte length of a SHA-256 digest.
pub const HASH_LEN: usize = 32;
/// Byte length of an HMAC-SHA256 tag.
pub const TAG_LEN: usize = 32;
/// Byte length of a handshake nonce.
pub const NONCE_LEN: usize = 32;

/// Upper bound on `extra_len`, chosen to keep envelope length computations
/// (`SCALAR_LEN + 2 * POINT_LEN + extra_len`) far from `usize`/`u64`
/// overflow on any supported target. 1 MiB is more than any reasonable
/// per-user extra payload (an export-key-wrapped blob of client secrets).
pub const OPAQUE_MAX_EXTRA_BYTES: u64 = 1 << 20;

/// Argon2id memory cost, in KiB. Matches libsodium's
/// `crypto_pwhash_argon2id_MEMLIMIT_INTERACTIVE` (64 MiB).
pub const ARGON2ID_M_COST_KIB: u32 = 65536;
/// Argon2id time cost (iterations). Matches libsodium's
/// `crypto_pwhash_argon2id_OPSLIMIT_INTERACTIVE`.
pub const ARGON2ID_T_COST: u32 = 2;
/// Argon2id parallelism. Matches libsodium's single-lane interactive profile.
pub const ARGON2ID_P_COST: u32 = 1;
/// Output length of the randomized password, in bytes.
pub const ARGON2ID_OUTPUT_LEN: usize = 32;

/// The all-zero Argon2id salt mandated by the protocol (spec §4.1, §9-ii):
/// per-user randomness already lives in `rw0` via the server's OPRF key
/// `k_s`, so a per-user salt here would be redundant, not protective. This
/// is a deliberate deviation from generic Argon2id best practice and must
/// not be "fixed" independently of the protocol itself.
pub const ARGON2ID_SALT: [u8; 32] = [0u8; 32];

/// HKDF / transcript domain-separation strings.
pub const STR_ENVU: &[u8] = b"EnvU";
pub const STR_RWD: &[u8] = b"rwd";
pub const STR_HASH_TO_GROUP: &[u8] = b"OPAQUE-HashToGroup";

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Canonical transcript bookkeeping (spec §4.5, §9): the running SHA-256
//! state that both the server's and the user's authentication tags are
//! computed over.
//!
//! The server must absorb most of the transcript, clone the running hash
//! state, finish the short transcript for its own `auth` tag, and keep the
//! clone to later finish the *long* transcript when it verifies `authU`.
//! This module makes that clone point an explicit, named operation instead
//! of inlining it into the session code (spec §9's "a re-implementer must
//! use a primitives library whose hash state is explicitly cloneable").

use digest::Digest;
use sha2::Sha256;

/// A running SHA-256 transcript. Absorbs handshake fields in the exact
/// order the protocol fixes; any reordering changes every tag downstream.
#[derive(Clone)]
pub(crate) struct TranscriptState {
    hasher: Sha256,
}

impl TranscriptState {
    pub(crate) fn new() -> Self {
        TranscriptState {
            hasher: Sha256::new(),
        }
    }

    pub(crate) fn absorb(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update(bytes);
        self
    }

    /// Snapshots the current state so the caller can both finish it now
    /// (over the transcript so far) and keep absorbing into the clone
    /// later for a longer transcript.
    pub(crate) fn clone_before_final(&self) -> Self {
        self.clone()
    }

    pub(crate) fn finalize(self) -> [u8; 32] {
        let digest = self.hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }
}

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Triple Diffie-Hellman key agreement and the HKDF key schedule it feeds
//! (spec §4.5). The two sides build their IKM from different
//! scalar/point pairings — that's the protocol's contract, not a bug: the
//! DH relation guarantees both orderings land on the same three shared
//! secrets.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use hkdf::Hkdf;
use sha2::Sha256;

use crate::config::POINT_LEN;
use crate::errors::{InternalError, ProtocolError};
use crate::group::point_to_bytes;
use crate::secret::{secret32, Secret32};

/// The five session-local keys derived from 3-DH (spec §3 `Opaque_Keys`):
/// `sk || km2 || km3 || ke2 || ke3`.
pub(crate) struct OpaqueKeys {
    pub(crate) sk: Secret32,
    pub(crate) km2: Secret32,
    pub(crate) km3: Secret32,
    #[allow(dead_code)] // carried per the wire-format data model; not consumed by this protocol's message flow
    pub(crate) ke2: Secret32,
    #[allow(dead_code)]
    pub(crate) ke3: Secret32,
}

/// Computes the server's triple-DH input key material:
/// `IKM = (p_s . X_u) || (x_s . P_u) || (x_s . X_u)`.
pub(crate) fn server_ikm(
    p_s: &Scalar,
    x_s: &Scalar,
    big_x_u: &RistrettoPoint,
    big_p_u: &RistrettoPoint,
) -> [u8; 3 * POINT_LEN] {
    combine(&(big_x_u * p_s), &(big_p_u * x_s), &(big_x_u * x_s))
}

/// Computes the client's triple-DH input key material, with the dual
/// ordering to [`server_ikm`]: `IKM = (x_u . P_s) || (p_u . X_s) || (x_u .
/// X_s)`.
pub(crate) fn client_ikm(
    x_u: &Scalar,
    p_u: &Scalar,
    big_p_s: &RistrettoPoint,
    big_x_s: &RistrettoPoint,
) -> [u8; 3 * POINT_LEN] {
    combine(&(big_p_s * x_u), &(big_x_s * p_u), &(big_x_s * x_u))
}

fn combine(a: &RistrettoPoint, b: &RistrettoPoint, c: &RistrettoPoint) -> [u8; 3 * POINT_LEN] {
    let mut out = [0u8; 3 * POINT_LEN];
    out[..POINT_LEN].copy_from_slice(&point_to_bytes(a));
    out[POINT_LEN..2 * POINT_LEN].copy_from_slice(&point_to_bytes(b));
    out[2 * POINT_LEN..].copy_from_slice(&point_to_bytes(c));
    out
}

/// `info = SHA-256(nonceU || nonceS || idU || idS)`.
pub(crate) fn transcript_info(nonce_u: &[u8], nonce_s: &[u8], id_u: &[u8], id_s: &[u8]) -> [u8; 32] {
    use digest::Digest;
    let mut hasher = Sha256::new();
    hasher.update(nonce_u);
    hasher.update(nonce_s);
    hasher.update(id_u);
    hasher.update(id_s);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// `HKDF-Extract(salt=empty, IKM) / Expand(info, 5*32)` producing `(sk, km2,
/// km3, ke2, ke3)`.
pub(crate) fn derive_session_keys(ikm: &[u8], info: &[u8; 32]) -> Result<OpaqueKeys, ProtocolError> {
    let (prk, _) = Hkdf::<Sha256>::extract(None, ikm);
    let hk = Hkdf::<Sha256>::from_prk(&prk).map_err(|_| ProtocolError::from(InternalError::HkdfError))?;

    let mut okm = [0u8; 5 * 32];
    hk.expand(info, &mut okm)
        .map_err(|_| ProtocolError::from(InternalError::HkdfError))?;

    let mut take = |i: usize| {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(&okm[i * 32..(i + 1) * 32]);
        secret32(buf)
    };

    Ok(OpaqueKeys {
        sk: take(0),
        km2: take(1),
        km3: take(2),
        ke2: take(3),
        ke3: take(4),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{public_key, random_scalar};
    use rand::rngs::OsRng;

    #[test]
    fn three_dh_symmetry() {
        let mut rng = OsRng;
        let p_s = random_scalar(&mut rng);
        let p_u = random_scalar(&mut rng);
        let x_s = random_scalar(&mut rng);
        let x_u = random_scalar(&mut rng);

        let big_p_s = public_key(&p_s);
        let big_p_u = public_key(&p_u);
        let big_x_s = public_key(&x_s);
        let big_x_u = public_key(&x_u);

        let ikm_server = server_ikm(&p_s, &x_s, &big_x_u, &big_p_u);
        let ikm_client = client_ikm(&x_u, &p_u, &big_p_s, &big_x_s);
        assert_eq!(ikm_server, ikm_client);

        let info = transcript_info(b"nU", b"nS", b"alice", b"server");
        let keys_server = derive_session_keys(&ikm_server, &info).unwrap();
        let keys_client = derive_session_keys(&ikm_client, &info).unwrap();
        assert_eq!(&*keys_server.sk, &*keys_client.sk);
        assert_eq!(&*keys_server.km2, &*keys_client.km2);
        assert_eq!(&*keys_server.km3, &*keys_client.km3);
    }

    proptest::proptest! {
        /// The server's and client's dual 3-DH orderings land on the same
        /// IKM — and therefore the same derived keys — for any four
        /// long-term/ephemeral scalars and any nonce/id transcript input
        /// (spec §8, "3-DH symmetry"). This is a crate-private primitive
        /// (`server_ikm`/`client_ikm` are never exposed across the public
        /// API), so it's quantified here rather than in the public-API
        /// `tests/properties.rs` suite.
        #[test]
        fn three_dh_symmetry_holds_for_arbitrary_scalars(
            p_s_bytes in proptest::prelude::any::<[u8; 32]>(),
            p_u_bytes in proptest::prelude::any::<[u8; 32]>(),
            x_s_bytes in proptest::prelude::any::<[u8; 32]>(),
            x_u_bytes in proptest::prelude::any::<[u8; 32]>(),
            nonce_u in proptest::prelude::any::<[u8; 8]>(),
            nonce_s in proptest::prelude::any::<[u8; 8]>(),
        ) {
            let p_s = Scalar::from_bytes_mod_order(p_s_bytes);
            let p_u = Scalar::from_bytes_mod_order(p_u_bytes);
            let x_s = Scalar::from_bytes_mod_order(x_s_bytes);
            let x_u = Scalar::from_bytes_mod_order(x_u_bytes);

            let big_p_s = public_key(&p_s);
            let big_p_u = public_key(&p_u);
            let big_x_s = public_key(&x_s);
            let big_x_u = public_key(&x_u);

            let ikm_server = server_ikm(&p_s, &x_s, &big_x_u, &big_p_u);
            let ikm_client = client_ikm(&x_u, &p_u, &big_p_s, &big_x_s);
            proptest::prop_assert_eq!(ikm_server, ikm_client);

            let info = transcript_info(&nonce_u, &nonce_s, b"alice", b"server");
            let keys_server = derive_session_keys(&ikm_server, &info).unwrap();
            let keys_client = derive_session_keys(&ikm_client, &info).unwrap();
            proptest::prop_assert_eq!(&*keys_server.sk, &*keys_client.sk);
            proptest::prop_assert_eq!(&*keys_server.km2, &*keys_client.km2);
            proptest::prop_assert_eq!(&*keys_server.km3, &*keys_client.km3);
        }
    }
}

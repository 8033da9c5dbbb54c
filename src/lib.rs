//! Threshold [secret sharing](https://en.wikipedia.org/wiki/Shamir%27s_Secret_Sharing) for clusters of nodes
//!
//! A secret is split into one share per cluster node. Any `threshold` shares
//! reconstruct it; fewer reveal nothing about it.
//!
//! # Usage
//! ## (std)
//!
//! ```
//! use blindshare::{decrypt, encrypt, ClusterKey, KeyOptions};
//!
//! # #[cfg(feature = "std")]
//! # {
//! // A fresh key for a cluster of 5 nodes, any 3 of which can reconstruct
//! let key = ClusterKey::generate(5, 3, &KeyOptions::default()).unwrap();
//! // One share per node
//! let shares = encrypt(&key, b"hello").unwrap();
//! assert_eq!(shares.len(), 5);
//! // Recover the original secret from nodes 1, 3 and 5
//! let picked = [shares[0].clone(), shares[2].clone(), shares[4].clone()];
//! let secret = decrypt(&key, &picked).unwrap();
//! assert_eq!(secret, b"hello");
//! // Two shares are not enough
//! assert!(decrypt(&key, &shares[..2]).is_err());
//! # }
//! ```
//!
//! ## (no std)
//!
//! ```
//! use blindshare::{decrypt, encrypt, ClusterKey, KeyOptions};
//! use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
//!
//! let mut rng = ChaCha20Rng::from_seed([0x90; 32]);
//! let key = ClusterKey::generate_rng(5, 3, &KeyOptions::default(), &mut rng).unwrap();
//! let shares = encrypt(&key, b"hello").unwrap();
//! let secret = decrypt(&key, &shares[2..]).unwrap();
//! assert_eq!(secret, b"hello");
//! ```
//!
//! # Field and encoding
//!
//! Arithmetic happens in GF(2^61 - 1). The secret is framed as
//! `length || secret || tag`, where `tag` is a truncated SHA-256 over the key id
//! and the secret, then cut into 7-byte chunks. Each chunk is the constant term
//! of its own polynomial of degree `threshold - 1`; a share holds one evaluation
//! per chunk. Reconstruction verifies the tag, so shares that are corrupted or
//! mixed from different splits fail with [`Error::IntegrityCheckFailed`] instead
//! of producing a wrong secret.
//!
//! # Keys
//!
//! A [`ClusterKey`] carries the threshold, the cluster size and the random
//! coefficients of one split, and must split a single secret (see [`encrypt`]). Shares
//! carry the key id of their split; [`decrypt`] only takes the threshold and
//! cluster size from the key it is given, so a freshly generated key with the
//! same parameters can reconstruct.
//!
//! # Feature flags
//!
//! - `std`: enables `generate` shortcuts (using `rand::thread_rng`) and
//!   [`MemoryKeyStore`]. Without `std`, use the `generate_rng` variants.
//! - `zeroize_memory`: wipes shares, keys and intermediate buffers on drop.
//! - `fuzzing`: derives `arbitrary::Arbitrary` for [`Share`].
#![cfg_attr(not(feature = "std"), no_std)]

mod audit;
mod codec;
mod error;
mod field;
mod key;
mod math;
mod share;
mod validate;

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use tracing::{debug, warn};

pub use audit::{
    audit, audit_str, AuditReport, CombinationOutcome, Tally, DEFAULT_MAX_COMBINATIONS,
};
pub use codec::TAG_LEN;
pub use error::{Error, ErrorKind};
pub use field::{Fp, CHUNK_BYTES, MODULUS};
#[cfg(feature = "std")]
pub use key::MemoryKeyStore;
pub use key::{
    ClusterKey, KeyGenerator, KeyId, KeyMetadata, KeyOptions, KeyStore, NoStore,
    DEFAULT_MAX_SECRET_LEN, KEY_ID_LEN,
};
pub use share::{Share, SHARE_VERSION};
pub use validate::MAX_CLUSTER_SIZE;

// Overwrites sensitive intermediates with zeros. Without `zeroize_memory` this does nothing.
#[cfg(feature = "zeroize_memory")]
pub(crate) fn wipe<Z: zeroize::Zeroize + ?Sized>(value: &mut Z) {
    value.zeroize();
}

#[cfg(not(feature = "zeroize_memory"))]
pub(crate) fn wipe<Z: ?Sized>(_value: &mut Z) {}

/// Splits `secret` into one share per node of the key's cluster.
///
/// Fails with [`Error::Encoding`] when the secret is empty or longer than
/// `key.max_secret_len()`.
///
/// # Key reuse
///
/// The split is a pure function of key and secret: every polynomial comes from
/// the key. Splitting two secrets with the same key reuses those polynomials, and
/// the difference between one node's shares of the two splits is the difference
/// of the encoded secrets. Generate a fresh [`ClusterKey`] for every secret.
///
/// Example:
/// ```
/// # use blindshare::{encrypt, ClusterKey, KeyOptions};
/// # use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
/// let mut rng = ChaCha20Rng::from_seed([0x90; 32]);
/// let key = ClusterKey::generate_rng(4, 2, &KeyOptions::default(), &mut rng).unwrap();
/// let shares = encrypt(&key, &[1, 2, 3, 4]).unwrap();
/// assert_eq!(shares.len(), 4);
/// assert_eq!(shares[3].index(), 4);
/// ```
pub fn encrypt(key: &ClusterKey, secret: &[u8]) -> Result<Vec<Share>, Error> {
    validate::secret(secret, key.max_secret_len())?;

    let key_id = key.key_id();
    let mut elements = codec::encode(&key_id, secret);
    let mut coefficients = key.chunk_coefficients(elements.len());

    let mut polys: Vec<Vec<Fp>> = elements
        .iter()
        .zip(&coefficients)
        .map(|(s, c)| math::polynomial(*s, c))
        .collect();

    let shares: Vec<Share> = math::get_evaluator(&polys, key.cluster_size())
        .map(|(x, y)| Share::new(key_id, x, key.threshold(), y))
        .collect();

    wipe(&mut elements);
    wipe(&mut coefficients);
    wipe(&mut polys);

    debug!(
        key_id = %key_id,
        secret_len = secret.len(),
        chunks = shares.first().map_or(0, Share::len),
        shares = shares.len(),
        "split secret"
    );

    Ok(shares)
}

/// Given a set of at least `key.threshold()` shares from one split, recovers the original secret.
///
/// All supplied shares take part in the interpolation. Shares that were altered,
/// or that come from different splits, make the integrity check fail.
///
/// Example:
/// ```
/// # use blindshare::{decrypt, encrypt, ClusterKey, Error, KeyOptions};
/// # use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
/// # let mut rng = ChaCha20Rng::from_seed([0x90; 32]);
/// # let key = ClusterKey::generate_rng(3, 3, &KeyOptions::default(), &mut rng).unwrap();
/// let mut shares = encrypt(&key, b"secret").unwrap();
/// // Secret correctly recovered
/// assert_eq!(decrypt(&key, &shares).unwrap(), b"secret");
/// // Remove a share for demonstration purposes
/// shares.pop();
/// assert_eq!(
///     decrypt(&key, &shares),
///     Err(Error::InsufficientShares { required: 3, provided: 2 })
/// );
/// ```
pub fn decrypt(key: &ClusterKey, shares: &[Share]) -> Result<Vec<u8>, Error> {
    validate::share_set(key, shares)?;

    let key_id = shares[0].key_id();
    let mut elements = math::interpolate(shares, Fp::ZERO)?;
    let secret = codec::decode(&key_id, &elements);
    wipe(&mut elements);

    match &secret {
        Ok(s) => debug!(key_id = %key_id, shares = shares.len(), secret_len = s.len(), "recovered secret"),
        Err(e) => warn!(key_id = %key_id, shares = shares.len(), error = %e, "reconstruction failed"),
    }

    secret
}

/// [`encrypt`] for text secrets, returning each share in its base64 form.
pub fn encrypt_str(key: &ClusterKey, secret: &str) -> Result<Vec<String>, Error> {
    Ok(encrypt(key, secret.as_bytes())?
        .iter()
        .map(Share::to_base64)
        .collect())
}

/// [`decrypt`] for shares in their base64 form. The recovered secret must be UTF-8.
pub fn decrypt_str<S: AsRef<str>>(key: &ClusterKey, shares: &[S]) -> Result<String, Error> {
    let shares = shares
        .iter()
        .map(|s| s.as_ref().parse::<Share>())
        .collect::<Result<Vec<Share>, Error>>()?;

    String::from_utf8(decrypt(key, &shares)?).map_err(|e| {
        wipe(&mut e.into_bytes());
        Error::Encoding("secret is not valid UTF-8")
    })
}

/// Rebuilds the share of node `index` from at least `key.threshold()` shares of the same split.
///
/// The supplied shares are reconstructed first, so a corrupted set fails with
/// [`Error::IntegrityCheckFailed`] instead of yielding a corrupted share.
///
/// Example:
/// ```
/// # use blindshare::{encrypt, recover_share, ClusterKey, KeyOptions};
/// # use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
/// # let mut rng = ChaCha20Rng::from_seed([0x90; 32]);
/// let key = ClusterKey::generate_rng(4, 2, &KeyOptions::default(), &mut rng).unwrap();
/// let shares = encrypt(&key, b"secret").unwrap();
/// // Node 2 lost its share; nodes 3 and 4 rebuild it
/// let rebuilt = recover_share(&key, &shares[2..], 2).unwrap();
/// assert_eq!(rebuilt, shares[1]);
/// ```
pub fn recover_share(key: &ClusterKey, shares: &[Share], index: u16) -> Result<Share, Error> {
    validate::index(index, key.cluster_size())?;

    wipe(&mut decrypt(key, shares)?);

    if let Some(existing) = shares.iter().find(|s| s.index() == index) {
        return Ok(existing.clone());
    }

    let values = math::interpolate(shares, Fp::from(index))?;
    debug!(key_id = %shares[0].key_id(), index, "rebuilt share");
    Ok(Share::new(shares[0].key_id(), index, key.threshold(), values))
}

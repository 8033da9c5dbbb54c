// Cluster keys and their generation.

use alloc::vec::Vec;
use core::fmt;

use rand::{CryptoRng, Rng};
use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

#[cfg(feature = "fuzzing")]
use arbitrary::Arbitrary;

#[cfg(feature = "zeroize_memory")]
use zeroize::Zeroize;

use crate::error::Error;
use crate::field::{Fp, MODULUS};
use crate::validate;

/// Length in bytes of a [`KeyId`].
pub const KEY_ID_LEN: usize = 16;

/// Largest secret accepted by keys built with default options (64 KiB).
pub const DEFAULT_MAX_SECRET_LEN: usize = 64 * 1024;

const CHUNK_SEED_DOMAIN: &[u8] = b"blindshare/chunk/v1";

/// Random identifier tying shares to the split that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fuzzing", derive(Arbitrary))]
#[cfg_attr(feature = "zeroize_memory", derive(Zeroize))]
pub struct KeyId(pub(crate) [u8; KEY_ID_LEN]);

impl KeyId {
    pub fn as_bytes(&self) -> &[u8; KEY_ID_LEN] {
        &self.0
    }
}

impl From<[u8; KEY_ID_LEN]> for KeyId {
    fn from(bytes: [u8; KEY_ID_LEN]) -> KeyId {
        KeyId(bytes)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Options recognised by [`KeyGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyOptions {
    /// Hand the key metadata to the generator's [`KeyStore`].
    pub store: bool,
    /// Secrets longer than this are rejected by `encrypt`.
    pub max_secret_len: usize,
}

impl Default for KeyOptions {
    fn default() -> Self {
        KeyOptions {
            store: false,
            max_secret_len: DEFAULT_MAX_SECRET_LEN,
        }
    }
}

impl KeyOptions {
    pub fn stored() -> Self {
        KeyOptions {
            store: true,
            ..Default::default()
        }
    }

    pub fn with_max_secret_len(mut self, max_secret_len: usize) -> Self {
        self.max_secret_len = max_secret_len;
        self
    }
}

/// The public part of a [`ClusterKey`]. This is all a [`KeyStore`] ever sees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyMetadata {
    pub key_id: KeyId,
    pub threshold: u16,
    pub cluster_size: u16,
}

/// Retains key metadata on behalf of the generator when `store` is requested.
///
/// Implementations own their persistence and concurrency. The generator calls
/// `retain` once per stored key and does not look at the outcome.
pub trait KeyStore {
    fn retain(&self, metadata: &KeyMetadata);
}

impl<S: KeyStore + ?Sized> KeyStore for &S {
    fn retain(&self, metadata: &KeyMetadata) {
        (**self).retain(metadata)
    }
}

impl<S: KeyStore + ?Sized> KeyStore for alloc::sync::Arc<S> {
    fn retain(&self, metadata: &KeyMetadata) {
        (**self).retain(metadata)
    }
}

/// A store that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStore;

impl KeyStore for NoStore {
    fn retain(&self, metadata: &KeyMetadata) {
        trace!(key_id = %metadata.key_id, "no key store attached, metadata dropped");
    }
}

/// In-process [`KeyStore`] keyed by [`KeyId`].
#[cfg(feature = "std")]
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: std::sync::Mutex<hashbrown::HashMap<KeyId, KeyMetadata>>,
}

#[cfg(feature = "std")]
impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key_id: &KeyId) -> Option<KeyMetadata> {
        self.lock().get(key_id).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, hashbrown::HashMap<KeyId, KeyMetadata>> {
        // a panic elsewhere cannot leave the map half-written
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(feature = "std")]
impl KeyStore for MemoryKeyStore {
    fn retain(&self, metadata: &KeyMetadata) {
        self.lock().insert(metadata.key_id, *metadata);
    }
}

/// Parameters of one sharing instance: threshold, cluster size and the random
/// polynomial coefficients.
///
/// A key must split a single secret. Its coefficients fix every polynomial of the
/// split, so a second secret split under the same key leaks the difference of the
/// two secrets through any single share.
///
/// The coefficients never leave the key: `Debug` omits them and they are wiped
/// on drop when `zeroize_memory` is enabled.
#[derive(Clone)]
#[cfg_attr(feature = "zeroize_memory", derive(Zeroize))]
#[cfg_attr(feature = "zeroize_memory", zeroize(drop))]
pub struct ClusterKey {
    key_id: KeyId,
    threshold: u16,
    cluster_size: u16,
    // coefficients[k] multiplies x^(k + 1)
    coefficients: Vec<Fp>,
    max_secret_len: usize,
}

impl fmt::Debug for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterKey")
            .field("key_id", &self.key_id)
            .field("threshold", &self.threshold)
            .field("cluster_size", &self.cluster_size)
            .field("max_secret_len", &self.max_secret_len)
            .finish_non_exhaustive()
    }
}

impl ClusterKey {
    /// Generates a key without a key store. `options.store` is accepted but has
    /// nothing to forward to; use a [`KeyGenerator`] with a store for that.
    ///
    /// Example:
    /// ```
    /// # use blindshare::{ClusterKey, KeyOptions};
    /// # use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
    /// let mut rng = ChaCha20Rng::from_seed([0x90; 32]);
    /// let key = ClusterKey::generate_rng(5, 3, &KeyOptions::default(), &mut rng).unwrap();
    /// assert_eq!(key.threshold(), 3);
    /// assert_eq!(key.cluster_size(), 5);
    /// ```
    pub fn generate_rng<R: Rng + CryptoRng>(
        cluster_size: usize,
        threshold: usize,
        options: &KeyOptions,
        rng: &mut R,
    ) -> Result<ClusterKey, Error> {
        KeyGenerator::new().generate_rng(cluster_size, threshold, options, rng)
    }

    /// Same as [`ClusterKey::generate_rng`] with the thread-local CSPRNG.
    #[cfg(feature = "std")]
    pub fn generate(
        cluster_size: usize,
        threshold: usize,
        options: &KeyOptions,
    ) -> Result<ClusterKey, Error> {
        KeyGenerator::new().generate(cluster_size, threshold, options)
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn cluster_size(&self) -> u16 {
        self.cluster_size
    }

    pub fn modulus(&self) -> u64 {
        MODULUS
    }

    pub fn max_secret_len(&self) -> usize {
        self.max_secret_len
    }

    pub fn metadata(&self) -> KeyMetadata {
        KeyMetadata {
            key_id: self.key_id,
            threshold: self.threshold,
            cluster_size: self.cluster_size,
        }
    }

    /// Higher-degree coefficients for each of `chunks` polynomials.
    ///
    /// Chunk 0 uses the key's own coefficients. Later chunks draw theirs from a
    /// ChaCha20 stream seeded by hashing the key, so that no two chunks share
    /// coefficients and the split stays a pure function of key and secret.
    pub(crate) fn chunk_coefficients(&self, chunks: usize) -> Vec<Vec<Fp>> {
        let mut all = Vec::with_capacity(chunks);
        if chunks == 0 {
            return all;
        }
        all.push(self.coefficients.clone());

        let mut stream = ChaCha20Rng::from_seed(self.chunk_seed());
        for _ in 1..chunks {
            let mut coefficients = Vec::with_capacity(self.coefficients.len());
            for _ in 0..self.coefficients.len() {
                coefficients.push(Fp::random(&mut stream));
            }
            all.push(coefficients);
        }
        all
    }

    fn chunk_seed(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(CHUNK_SEED_DOMAIN);
        hasher.update(self.key_id.0);
        for c in &self.coefficients {
            hasher.update(c.value().to_be_bytes());
        }
        hasher.finalize().into()
    }
}

/// Produces fresh [`ClusterKey`]s and forwards the `store` option to a [`KeyStore`].
///
/// Usage example:
/// ```
/// # use blindshare::{KeyGenerator, KeyOptions};
/// # use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
/// # #[cfg(feature = "std")]
/// # {
/// # use blindshare::MemoryKeyStore;
/// let store = MemoryKeyStore::new();
/// let generator = KeyGenerator::with_store(&store);
/// let mut rng = ChaCha20Rng::from_seed([0x90; 32]);
/// let key = generator
///     .generate_rng(4, 3, &KeyOptions::stored(), &mut rng)
///     .unwrap();
/// assert_eq!(store.get(&key.key_id()), Some(key.metadata()));
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct KeyGenerator<S = NoStore> {
    store: S,
}

impl KeyGenerator<NoStore> {
    pub fn new() -> Self {
        KeyGenerator { store: NoStore }
    }
}

impl<S: KeyStore> KeyGenerator<S> {
    pub fn with_store(store: S) -> Self {
        KeyGenerator { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Samples `threshold - 1` coefficients and a key id from `rng`.
    ///
    /// Fails with [`Error::InvalidClusterSize`] or [`Error::InvalidThreshold`] when
    /// `1 <= threshold <= cluster_size <= 65535` does not hold.
    pub fn generate_rng<R: Rng + CryptoRng>(
        &self,
        cluster_size: usize,
        threshold: usize,
        options: &KeyOptions,
        rng: &mut R,
    ) -> Result<ClusterKey, Error> {
        let (cluster_size, threshold) = validate::cluster_params(cluster_size, threshold)?;

        let mut key_id = [0u8; KEY_ID_LEN];
        rng.fill_bytes(&mut key_id);

        let mut coefficients = Vec::with_capacity(threshold as usize - 1);
        for _ in 1..threshold {
            coefficients.push(Fp::random(rng));
        }

        let key = ClusterKey {
            key_id: KeyId(key_id),
            threshold,
            cluster_size,
            coefficients,
            max_secret_len: options.max_secret_len,
        };
        debug!(
            key_id = %key.key_id,
            cluster_size,
            threshold,
            store = options.store,
            "generated cluster key"
        );

        if options.store {
            self.store.retain(&key.metadata());
        }

        Ok(key)
    }

    /// Same as [`KeyGenerator::generate_rng`] with the thread-local CSPRNG.
    #[cfg(feature = "std")]
    pub fn generate(
        &self,
        cluster_size: usize,
        threshold: usize,
        options: &KeyOptions,
    ) -> Result<ClusterKey, Error> {
        let mut rng = rand::thread_rng();
        self.generate_rng(cluster_size, threshold, options, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClusterKey, KeyOptions};
    use crate::error::Error;
    use alloc::format;
    use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
    use rstest::rstest;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::from_seed([10; 32])
    }

    #[rstest]
    #[case(1, 1)]
    #[case(5, 1)]
    #[case(5, 3)]
    #[case(5, 5)]
    fn generate_samples_threshold_minus_one_coefficients(
        #[case] cluster_size: usize,
        #[case] threshold: usize,
    ) {
        let key =
            ClusterKey::generate_rng(cluster_size, threshold, &KeyOptions::default(), &mut rng())
                .unwrap();
        assert_eq!(key.coefficients.len(), threshold - 1);
        assert_eq!(key.threshold() as usize, threshold);
        assert_eq!(key.cluster_size() as usize, cluster_size);
    }

    #[test]
    fn generate_rejects_bad_parameters() {
        let options = KeyOptions::default();
        assert_eq!(
            ClusterKey::generate_rng(0, 0, &options, &mut rng()).unwrap_err(),
            Error::InvalidClusterSize { size: 0, max: 65535 }
        );
        assert_eq!(
            ClusterKey::generate_rng(3, 4, &options, &mut rng()).unwrap_err(),
            Error::InvalidThreshold {
                threshold: 4,
                cluster_size: 3
            }
        );
        assert_eq!(
            ClusterKey::generate_rng(3, 0, &options, &mut rng()).unwrap_err(),
            Error::InvalidThreshold {
                threshold: 0,
                cluster_size: 3
            }
        );
    }

    #[test]
    fn keys_are_fresh() {
        let mut rng = rng();
        let a = ClusterKey::generate_rng(5, 3, &KeyOptions::default(), &mut rng).unwrap();
        let b = ClusterKey::generate_rng(5, 3, &KeyOptions::default(), &mut rng).unwrap();
        assert_ne!(a.key_id(), b.key_id());
        assert_ne!(a.coefficients, b.coefficients);
    }

    #[cfg(feature = "std")]
    #[test]
    fn store_only_receives_requested_keys() {
        use super::{KeyGenerator, MemoryKeyStore};

        let store = MemoryKeyStore::new();
        let generator = KeyGenerator::with_store(&store);
        let mut rng = rng();

        let unstored = generator
            .generate_rng(3, 2, &KeyOptions::default(), &mut rng)
            .unwrap();
        assert!(store.is_empty());

        let stored = generator
            .generate_rng(3, 2, &KeyOptions::stored(), &mut rng)
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&stored.key_id()), Some(stored.metadata()));
        assert_eq!(store.get(&unstored.key_id()), None);
    }

    #[test]
    fn debug_hides_coefficients() {
        let key = ClusterKey::generate_rng(3, 3, &KeyOptions::default(), &mut rng()).unwrap();
        let printed = format!("{:?}", key);
        assert!(printed.contains("threshold: 3"));
        assert!(!printed.contains("coefficients"));
    }

    #[test]
    fn key_id_displays_as_hex() {
        let key = ClusterKey::generate_rng(3, 3, &KeyOptions::default(), &mut rng()).unwrap();
        let printed = format!("{}", key.key_id());
        assert_eq!(printed.len(), 32);
        assert!(printed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn chunk_coefficients_are_deterministic_and_distinct() {
        let key = ClusterKey::generate_rng(5, 3, &KeyOptions::default(), &mut rng()).unwrap();
        let first = key.chunk_coefficients(4);
        let second = key.chunk_coefficients(4);
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(first[0], key.coefficients);
        for i in 0..4 {
            assert_eq!(first[i].len(), 2);
            for j in (i + 1)..4 {
                assert_ne!(first[i], first[j]);
            }
        }
    }

    #[test]
    fn threshold_one_has_no_coefficients_per_chunk() {
        let key = ClusterKey::generate_rng(2, 1, &KeyOptions::default(), &mut rng()).unwrap();
        assert!(key.chunk_coefficients(3).iter().all(|c| c.is_empty()));
        assert!(key.chunk_coefficients(0).is_empty());
    }

    #[cfg(feature = "std")]
    #[tracing_test::traced_test]
    #[test]
    fn generation_is_logged() {
        let key = ClusterKey::generate_rng(4, 2, &KeyOptions::default(), &mut rng()).unwrap();
        assert!(logs_contain("generated cluster key"));
        assert!(logs_contain(&format!("{}", key.key_id())));
    }
}

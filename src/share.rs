use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};

#[cfg(feature = "fuzzing")]
use arbitrary::Arbitrary;

#[cfg(feature = "zeroize_memory")]
use zeroize::Zeroize;

use crate::error::Error;
use crate::field::Fp;
use crate::key::{KeyId, KEY_ID_LEN};
use crate::wipe;

/// Version byte leading every serialized share.
pub const SHARE_VERSION: u8 = 1;

// version, key id, index, threshold, value count
const HEADER_LEN: usize = 1 + KEY_ID_LEN + 2 + 2 + 4;
const VALUE_LEN: usize = 8;

/// The share of one cluster node, used to reconstruct the secret.
/// Can be serialized to and from a byte array or a base64 string.
///
/// Usage example:
/// ```
/// use blindshare::{encrypt, ClusterKey, KeyOptions, Share};
/// use core::convert::TryFrom;
/// # use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
/// # fn send_to_node(_: String) {}
///
/// let mut rng = ChaCha20Rng::from_seed([0x90; 32]);
/// let key = ClusterKey::generate_rng(3, 2, &KeyOptions::default(), &mut rng).unwrap();
/// let shares = encrypt(&key, b"hello").unwrap();
///
/// // Ship each share to its node as text
/// for share in &shares {
///     send_to_node(share.to_base64());
/// }
///
/// // Bytes work the same way
/// let bytes = Vec::from(&shares[0]);
/// let share = Share::try_from(bytes.as_slice()).unwrap();
/// assert_eq!(share, shares[0]);
/// ```
///
/// # Serialization format
/// `[version, key_id (16), index (u16 BE), threshold (u16 BE), count (u32 BE), values (u64 BE)...]`
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "fuzzing", derive(Arbitrary))]
#[cfg_attr(feature = "zeroize_memory", derive(Zeroize))]
#[cfg_attr(feature = "zeroize_memory", zeroize(drop))]
pub struct Share {
    key_id: KeyId,
    /// The x coordinate of the share, `1..=cluster_size`.
    index: u16,
    threshold: u16,
    /// The y coordinates of the share, one per secret chunk.
    values: Vec<Fp>,
}

impl Share {
    pub(crate) fn new(key_id: KeyId, index: u16, threshold: u16, values: Vec<Fp>) -> Share {
        Share {
            key_id,
            index,
            threshold,
            values,
        }
    }

    /// Identifier of the key whose split produced this share.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn x(&self) -> Fp {
        Fp::from(self.index)
    }

    pub fn values(&self) -> &[Fp] {
        &self.values
    }

    /// Number of chunks the share carries a value for.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_base64(&self) -> String {
        let mut bytes = Vec::from(self);
        let encoded = STANDARD.encode(&bytes);
        wipe(&mut bytes);
        encoded
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("key_id", &self.key_id)
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("chunks", &self.values.len())
            .finish_non_exhaustive()
    }
}

impl From<&Share> for Vec<u8> {
    fn from(s: &Share) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + s.values.len() * VALUE_LEN);
        bytes.push(SHARE_VERSION);
        bytes.extend_from_slice(s.key_id.as_bytes());
        bytes.extend_from_slice(&s.index.to_be_bytes());
        bytes.extend_from_slice(&s.threshold.to_be_bytes());
        bytes.extend_from_slice(&(s.values.len() as u32).to_be_bytes());
        for v in &s.values {
            bytes.extend_from_slice(&v.value().to_be_bytes());
        }
        bytes
    }
}

fn be_bytes<const N: usize>(s: &[u8]) -> Result<[u8; N], Error> {
    s.try_into()
        .map_err(|_| Error::InvalidShareFormat("truncated share"))
}

impl core::convert::TryFrom<&[u8]> for Share {
    type Error = Error;

    fn try_from(s: &[u8]) -> Result<Share, Self::Error> {
        if s.len() < HEADER_LEN {
            return Err(Error::InvalidShareFormat("share is shorter than its header"));
        }
        let (head, body) = s.split_at(HEADER_LEN);
        if head[0] != SHARE_VERSION {
            return Err(Error::InvalidShareFormat("unknown share version"));
        }

        let key_id = KeyId::from(be_bytes::<KEY_ID_LEN>(&head[1..17])?);
        let index = u16::from_be_bytes(be_bytes(&head[17..19])?);
        let threshold = u16::from_be_bytes(be_bytes(&head[19..21])?);
        let count = u32::from_be_bytes(be_bytes(&head[21..25])?) as usize;

        if index == 0 {
            return Err(Error::InvalidShareFormat("share index must be non-zero"));
        }
        if threshold == 0 {
            return Err(Error::InvalidShareFormat("share threshold must be non-zero"));
        }
        if count == 0 {
            return Err(Error::InvalidShareFormat("share holds no values"));
        }
        if count.checked_mul(VALUE_LEN) != Some(body.len()) {
            return Err(Error::InvalidShareFormat(
                "share length does not match its value count",
            ));
        }

        let values = body
            .chunks_exact(VALUE_LEN)
            .map(|c| Fp::try_from(u64::from_be_bytes(be_bytes(c)?)))
            .collect::<Result<Vec<Fp>, Error>>()?;

        Ok(Share {
            key_id,
            index,
            threshold,
            values,
        })
    }
}

impl FromStr for Share {
    type Err = Error;

    fn from_str(s: &str) -> Result<Share, Error> {
        let mut bytes = STANDARD
            .decode(s.trim())
            .map_err(|_| Error::InvalidShareFormat("share is not valid base64"))?;
        let share = Share::try_from(bytes.as_slice());
        wipe(&mut bytes);
        share
    }
}

// Framing of a secret into field elements and back.
//
// payload = len (u32 BE) || secret || tag (TAG_LEN bytes)
// The payload is cut into CHUNK_BYTES-sized big-endian integers, the last one zero padded.

use alloc::vec::Vec;

use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::field::{Fp, CHUNK_BYTES};
use crate::key::KeyId;
use crate::wipe;

/// Length of the integrity tag appended to every secret.
pub const TAG_LEN: usize = 16;

const LEN_PREFIX: usize = 4;
const TAG_DOMAIN: &[u8] = b"blindshare/tag/v1";

/// Upper bound (exclusive) of an element produced by [`encode`].
const CHUNK_LIMIT: u64 = 1 << (8 * CHUNK_BYTES);

fn tag(key_id: &KeyId, secret: &[u8]) -> [u8; TAG_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(TAG_DOMAIN);
    hasher.update(key_id.as_bytes());
    hasher.update((secret.len() as u32).to_be_bytes());
    hasher.update(secret);
    let digest = hasher.finalize();

    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(&digest[..TAG_LEN]);
    out
}

// Constant time in the length of the inputs.
fn tags_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Number of field elements a secret of `len` bytes encodes to.
pub fn chunk_count(len: usize) -> usize {
    (LEN_PREFIX + len + TAG_LEN).div_ceil(CHUNK_BYTES)
}

/// Frames `secret` and packs it into field elements. The caller has validated the length.
pub fn encode(key_id: &KeyId, secret: &[u8]) -> Vec<Fp> {
    let mut payload = Vec::with_capacity(chunk_count(secret.len()) * CHUNK_BYTES);
    payload.extend_from_slice(&(secret.len() as u32).to_be_bytes());
    payload.extend_from_slice(secret);
    payload.extend_from_slice(&tag(key_id, secret));
    payload.resize(chunk_count(secret.len()) * CHUNK_BYTES, 0);

    let elements = payload
        .chunks_exact(CHUNK_BYTES)
        .map(|chunk| {
            Fp(chunk
                .iter()
                .fold(0u64, |acc, byte| (acc << 8) | *byte as u64))
        })
        .collect();

    wipe(&mut payload);

    elements
}

/// Unpacks recovered elements, checking framing, padding and the integrity tag.
///
/// Any inconsistency is reported as [`Error::IntegrityCheckFailed`]: once the
/// shares have passed validation, a bad payload can only mean bad share data.
pub fn decode(key_id: &KeyId, elements: &[Fp]) -> Result<Vec<u8>, Error> {
    let mut payload = Vec::with_capacity(elements.len() * CHUNK_BYTES);
    for element in elements {
        if element.value() >= CHUNK_LIMIT {
            return Err(Error::IntegrityCheckFailed);
        }
        payload.extend_from_slice(&element.value().to_be_bytes()[8 - CHUNK_BYTES..]);
    }

    let result = unframe(key_id, &payload);

    wipe(&mut payload);

    result
}

fn unframe(key_id: &KeyId, payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() < LEN_PREFIX + TAG_LEN {
        return Err(Error::IntegrityCheckFailed);
    }
    let (prefix, rest) = payload.split_at(LEN_PREFIX);
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;

    // exactly as many chunks as the declared length needs
    if len > rest.len() || chunk_count(len) * CHUNK_BYTES != payload.len() {
        return Err(Error::IntegrityCheckFailed);
    }
    let (secret, rest) = rest.split_at(len);
    if rest.len() < TAG_LEN {
        return Err(Error::IntegrityCheckFailed);
    }
    let (expected, padding) = rest.split_at(TAG_LEN);
    if padding.iter().any(|b| *b != 0) {
        return Err(Error::IntegrityCheckFailed);
    }
    if !tags_match(&tag(key_id, secret), expected) {
        return Err(Error::IntegrityCheckFailed);
    }

    Ok(secret.to_vec())
}

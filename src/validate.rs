// Stateless checks run before any field arithmetic.

use hashbrown::HashSet;

use crate::error::Error;
use crate::key::ClusterKey;
use crate::share::Share;

/// Largest supported cluster. Share indices are carried as `u16`.
pub const MAX_CLUSTER_SIZE: usize = u16::MAX as usize;

/// Checks `1 <= threshold <= cluster_size <= MAX_CLUSTER_SIZE` and narrows both.
pub fn cluster_params(cluster_size: usize, threshold: usize) -> Result<(u16, u16), Error> {
    if cluster_size < 1 || cluster_size > MAX_CLUSTER_SIZE {
        return Err(Error::InvalidClusterSize {
            size: cluster_size,
            max: MAX_CLUSTER_SIZE,
        });
    }
    if threshold < 1 || threshold > cluster_size {
        return Err(Error::InvalidThreshold {
            threshold,
            cluster_size,
        });
    }
    Ok((cluster_size as u16, threshold as u16))
}

pub fn secret(secret: &[u8], max_len: usize) -> Result<(), Error> {
    if secret.is_empty() {
        return Err(Error::Encoding("secret is empty"));
    }
    if secret.len() > max_len || secret.len() > u32::MAX as usize {
        return Err(Error::Encoding("secret exceeds the maximum length"));
    }
    Ok(())
}

/// Checks a share set against `key` before reconstruction.
///
/// In order: enough shares for the threshold, one key id across the set, the
/// key's threshold, indices inside the cluster, no repeated index, and one
/// chunk count across the set.
pub fn share_set(key: &ClusterKey, shares: &[Share]) -> Result<(), Error> {
    let required = key.threshold() as usize;
    if shares.len() < required {
        return Err(Error::InsufficientShares {
            required,
            provided: shares.len(),
        });
    }

    let first = &shares[0];
    let mut indices = HashSet::with_capacity(shares.len());

    for share in shares {
        if share.key_id() != first.key_id() {
            return Err(Error::MismatchedKey {
                expected: first.key_id(),
                found: share.key_id(),
            });
        }
        if share.threshold() != key.threshold() {
            return Err(Error::ParameterMismatch {
                index: share.index(),
                expected: key.threshold(),
                found: share.threshold(),
            });
        }
        index(share.index(), key.cluster_size())?;
        if !indices.insert(share.index()) {
            return Err(Error::DuplicateIndex(share.index()));
        }
        if share.len() != first.len() {
            return Err(Error::InvalidShareFormat("shares hold different chunk counts"));
        }
    }

    Ok(())
}

pub fn index(index: u16, cluster_size: u16) -> Result<(), Error> {
    if index < 1 || index > cluster_size {
        return Err(Error::IndexOutOfRange {
            index,
            cluster_size,
        });
    }
    Ok(())
}

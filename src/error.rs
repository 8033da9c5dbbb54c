use crate::key::KeyId;

/// Coarse classification of an [`Error`], useful when mapping failures onto
/// transport status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller supplied bad parameters or malformed shares.
    Validation,
    /// A field operation had no result. Points at a logic defect or adversarial input.
    Arithmetic,
    /// The shares were well formed but did not reconstruct a consistent secret.
    Integrity,
}

/// Every failure this crate reports.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("cluster size must be between 1 and {max}, got {size}")]
    InvalidClusterSize { size: usize, max: usize },

    #[error("threshold must be between 1 and the cluster size {cluster_size}, got {threshold}")]
    InvalidThreshold { threshold: usize, cluster_size: usize },

    #[error("division by zero in the prime field")]
    Arithmetic,

    #[error("secret cannot be encoded: {0}")]
    Encoding(&'static str),

    #[error("not enough shares to recover the secret: need {required}, got {provided} ({} missing)", .required - .provided)]
    InsufficientShares { required: usize, provided: usize },

    #[error("shares were produced by different keys ({expected} and {found})")]
    MismatchedKey { expected: KeyId, found: KeyId },

    #[error("share of node {index} was split with threshold {found}, key expects {expected}")]
    ParameterMismatch {
        index: u16,
        expected: u16,
        found: u16,
    },

    #[error("more than one share for node {0}")]
    DuplicateIndex(u16),

    #[error("share index {index} is outside the cluster of {cluster_size} nodes")]
    IndexOutOfRange { index: u16, cluster_size: u16 },

    #[error("malformed share: {0}")]
    InvalidShareFormat(&'static str),

    #[error("recovered secret failed its integrity check")]
    IntegrityCheckFailed,

    #[error("share combinations exceed the audit limit of {limit}")]
    TooManyCombinations { limit: usize },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Arithmetic => ErrorKind::Arithmetic,
            Error::IntegrityCheckFailed => ErrorKind::Integrity,
            _ => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};
    use alloc::string::ToString;

    #[test]
    fn insufficient_shares_names_deficit() {
        let err = Error::InsufficientShares {
            required: 3,
            provided: 2,
        };
        assert_eq!(
            err.to_string(),
            "not enough shares to recover the secret: need 3, got 2 (1 missing)"
        );
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::Arithmetic.kind(), ErrorKind::Arithmetic);
        assert_eq!(Error::IntegrityCheckFailed.kind(), ErrorKind::Integrity);
        assert_eq!(Error::DuplicateIndex(2).kind(), ErrorKind::Validation);
        assert_eq!(
            Error::InsufficientShares {
                required: 2,
                provided: 1
            }
            .kind(),
            ErrorKind::Validation
        );
    }
}

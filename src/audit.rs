//! Locating corrupted shares.
//!
//! A reconstruction either succeeds (the integrity tag verifies) or fails, but a
//! single failure does not say which share was bad. The audit reconstructs from
//! every `t`-subset of a share set and counts, for each share, how often it took
//! part in a success or a failure. Shares that only ever appear in failures are
//! suspects.

use alloc::vec::Vec;
use core::fmt;

use tracing::{debug, warn};

use crate::error::Error;
use crate::key::ClusterKey;
use crate::share::Share;

/// Default cap on the number of subsets [`audit`] will try.
pub const DEFAULT_MAX_COMBINATIONS: usize = 10_000;

/// Outcome of reconstructing from one subset of shares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombinationOutcome {
    /// Positions of the subset's shares in the audited input.
    pub positions: Vec<usize>,
    /// `None` when the subset reconstructed a secret.
    pub error: Option<Error>,
}

impl CombinationOutcome {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub successes: usize,
    pub failures: usize,
}

/// Result of [`audit`].
#[derive(Clone, Default)]
pub struct AuditReport {
    pub combinations: Vec<CombinationOutcome>,
    /// One entry per audited input position.
    pub tallies: Vec<Tally>,
    /// Positions that never took part in a successful reconstruction.
    pub suspects: Vec<usize>,
    /// Positions whose share could not be parsed (only set by [`audit_str`]).
    pub unreadable: Vec<usize>,
    /// Secret recovered by the first successful subset.
    pub recovered: Option<Vec<u8>>,
    pub recovered_from: Option<Vec<usize>>,
    /// False when two successful subsets recovered different secrets, which
    /// means the input mixes shares of several splits.
    pub consistent: bool,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.suspects.is_empty() && self.combinations.iter().all(CombinationOutcome::is_valid)
    }
}

impl fmt::Debug for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditReport")
            .field("combinations", &self.combinations.len())
            .field("tallies", &self.tallies)
            .field("suspects", &self.suspects)
            .field("unreadable", &self.unreadable)
            .field("recovered", &self.recovered.is_some())
            .field("recovered_from", &self.recovered_from)
            .field("consistent", &self.consistent)
            .finish()
    }
}

/// Lexicographic `k`-subsets of `0..n`.
pub(crate) struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
}

impl Combinations {
    pub(crate) fn new(n: usize, k: usize) -> Combinations {
        Combinations {
            n,
            indices: (0..k).collect(),
            started: false,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let k = self.indices.len();
        if k > self.n {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.indices.clone());
        }

        // rightmost index that can still move
        let i = (0..k).rev().find(|&i| self.indices[i] < self.n - k + i)?;
        self.indices[i] += 1;
        for j in (i + 1)..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

/// `C(n, k)`, or `None` once it exceeds `limit`.
fn binomial_within(n: usize, k: usize, limit: usize) -> Option<usize> {
    let k = k.min(n - k);
    let mut c: u128 = 1;
    for i in 1..=k {
        c = c * (n - k + i) as u128 / i as u128;
        if c > limit as u128 {
            return None;
        }
    }
    Some(c as usize)
}

/// Reconstructs from every `key.threshold()`-subset of `shares` and reports
/// which shares look corrupted.
///
/// Fails with [`Error::InsufficientShares`] when there are fewer shares than the
/// threshold and with [`Error::TooManyCombinations`] when the number of subsets
/// exceeds `max_combinations`. Per-subset failures are part of the report.
///
/// Example:
/// ```
/// # use blindshare::{audit, encrypt, ClusterKey, KeyOptions, DEFAULT_MAX_COMBINATIONS};
/// # use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
/// let mut rng = ChaCha20Rng::from_seed([0x90; 32]);
/// let key = ClusterKey::generate_rng(4, 2, &KeyOptions::default(), &mut rng).unwrap();
/// let shares = encrypt(&key, b"hello").unwrap();
/// let report = audit(&key, &shares, DEFAULT_MAX_COMBINATIONS).unwrap();
/// assert!(report.is_clean());
/// assert_eq!(report.recovered.as_deref(), Some(&b"hello"[..]));
/// ```
pub fn audit(
    key: &ClusterKey,
    shares: &[Share],
    max_combinations: usize,
) -> Result<AuditReport, Error> {
    let positions: Vec<usize> = (0..shares.len()).collect();
    audit_positions(key, shares, &positions, shares.len(), max_combinations)
}

/// Like [`audit`], for shares in their base64 form. Strings that do not parse
/// are listed in `unreadable`, count as suspects, and are left out of the subsets.
///
/// The threshold applies to the strings supplied. When too few of them parse to
/// form a single subset, the report lists the unreadable positions and holds no
/// combinations.
pub fn audit_str<S: AsRef<str>>(
    key: &ClusterKey,
    shares: &[S],
    max_combinations: usize,
) -> Result<AuditReport, Error> {
    let threshold = key.threshold() as usize;
    if shares.len() < threshold {
        return Err(Error::InsufficientShares {
            required: threshold,
            provided: shares.len(),
        });
    }

    let mut parsed = Vec::with_capacity(shares.len());
    let mut positions = Vec::with_capacity(shares.len());
    let mut unreadable = Vec::new();

    for (position, s) in shares.iter().enumerate() {
        match s.as_ref().parse::<Share>() {
            Ok(share) => {
                parsed.push(share);
                positions.push(position);
            }
            Err(_) => unreadable.push(position),
        }
    }

    if parsed.len() < threshold {
        warn!(
            key_id = %key.key_id(),
            unreadable = ?unreadable,
            readable = parsed.len(),
            threshold,
            "too few readable shares to audit"
        );
        return Ok(AuditReport {
            tallies: alloc::vec![Tally::default(); shares.len()],
            suspects: unreadable.clone(),
            unreadable,
            consistent: true,
            ..Default::default()
        });
    }

    let mut report = audit_positions(key, &parsed, &positions, shares.len(), max_combinations)?;
    report.suspects.extend_from_slice(&unreadable);
    report.suspects.sort_unstable();
    report.unreadable = unreadable;
    Ok(report)
}

fn audit_positions(
    key: &ClusterKey,
    shares: &[Share],
    positions: &[usize],
    total: usize,
    max_combinations: usize,
) -> Result<AuditReport, Error> {
    let threshold = key.threshold() as usize;
    if shares.len() < threshold {
        return Err(Error::InsufficientShares {
            required: threshold,
            provided: shares.len(),
        });
    }
    let count = binomial_within(shares.len(), threshold, max_combinations).ok_or(
        Error::TooManyCombinations {
            limit: max_combinations,
        },
    )?;
    debug!(
        key_id = %key.key_id(),
        shares = shares.len(),
        threshold,
        combinations = count,
        "auditing share set"
    );

    let mut report = AuditReport {
        combinations: Vec::with_capacity(count),
        tallies: alloc::vec![Tally::default(); total],
        consistent: true,
        ..Default::default()
    };

    let mut subset = Vec::with_capacity(threshold);
    for combination in Combinations::new(shares.len(), threshold) {
        subset.clear();
        subset.extend(combination.iter().map(|&i| shares[i].clone()));
        let picked: Vec<usize> = combination.iter().map(|&i| positions[i]).collect();
        let (secret, error) = match crate::decrypt(key, &subset) {
            Ok(secret) => (Some(secret), None),
            Err(e) => (None, Some(e)),
        };

        for &p in &picked {
            if error.is_none() {
                report.tallies[p].successes += 1;
            } else {
                report.tallies[p].failures += 1;
            }
        }

        match (secret, &error) {
            (Some(secret), _) => match &report.recovered {
                None => {
                    report.recovered = Some(secret);
                    report.recovered_from = Some(picked.clone());
                }
                Some(first) if *first != secret => report.consistent = false,
                Some(_) => {}
            },
            (None, Some(e)) => {
                debug!(positions = ?picked, error = %e, "subset failed to reconstruct")
            }
            (None, None) => {}
        }

        report.combinations.push(CombinationOutcome {
            positions: picked,
            error,
        });
    }

    report.suspects = positions
        .iter()
        .copied()
        .filter(|&p| report.tallies[p].successes == 0 && report.tallies[p].failures > 0)
        .collect();

    if !report.suspects.is_empty() {
        warn!(
            key_id = %key.key_id(),
            suspects = ?report.suspects,
            "audit found shares that never reconstruct"
        );
    }
    if !report.consistent {
        warn!(key_id = %key.key_id(), "audit recovered more than one distinct secret");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{audit, audit_str, binomial_within, Combinations, DEFAULT_MAX_COMBINATIONS};
    use crate::error::Error;
    use crate::key::{ClusterKey, KeyOptions};
    use crate::share::Share;
    use crate::{encrypt, encrypt_str};
    use alloc::{string::String, vec, vec::Vec};
    use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};

    fn key(cluster_size: usize, threshold: usize) -> ClusterKey {
        let mut rng = ChaCha20Rng::from_seed([21; 32]);
        ClusterKey::generate_rng(cluster_size, threshold, &KeyOptions::default(), &mut rng)
            .unwrap()
    }

    // Flips one bit of the first value while keeping the share well formed.
    fn corrupt(share: &Share) -> Share {
        let mut bytes = Vec::from(share);
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        Share::try_from(bytes.as_slice()).unwrap()
    }

    #[test]
    fn combinations_are_lexicographic() {
        let all: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Combinations::new(3, 3).count(), 1);
        assert_eq!(Combinations::new(2, 3).count(), 0);
        assert_eq!(Combinations::new(5, 1).count(), 5);
    }

    #[test]
    fn binomial_respects_limit() {
        assert_eq!(binomial_within(5, 3, 100), Some(10));
        assert_eq!(binomial_within(5, 5, 100), Some(1));
        assert_eq!(binomial_within(60, 30, 1_000), None);
    }

    #[test]
    fn clean_set_has_no_suspects() {
        let key = key(5, 3);
        let shares = encrypt(&key, b"hello").unwrap();
        let report = audit(&key, &shares, DEFAULT_MAX_COMBINATIONS).unwrap();
        assert!(report.is_clean());
        assert!(report.consistent);
        assert_eq!(report.combinations.len(), 10);
        assert_eq!(report.recovered.as_deref(), Some(&b"hello"[..]));
        assert_eq!(report.recovered_from, Some(vec![0, 1, 2]));
        assert!(report.tallies.iter().all(|t| t.successes == 6 && t.failures == 0));
    }

    #[test]
    fn corrupted_share_is_named() {
        let key = key(5, 3);
        let mut shares = encrypt(&key, b"hello").unwrap();
        shares[1] = corrupt(&shares[1]);

        let report = audit(&key, &shares, DEFAULT_MAX_COMBINATIONS).unwrap();
        assert_eq!(report.suspects, vec![1]);
        assert_eq!(report.tallies[1].successes, 0);
        assert_eq!(report.tallies[1].failures, 6);
        assert_eq!(report.recovered.as_deref(), Some(&b"hello"[..]));
        assert_eq!(report.recovered_from, Some(vec![0, 2, 3]));
        for outcome in &report.combinations {
            assert_eq!(outcome.is_valid(), !outcome.positions.contains(&1));
            if !outcome.is_valid() {
                assert_eq!(outcome.error, Some(Error::IntegrityCheckFailed));
            }
        }
    }

    #[test]
    fn unreadable_strings_are_suspects() {
        let key = key(4, 2);
        let mut shares = encrypt_str(&key, "hello").unwrap();
        shares[2] = String::from("definitely not base64 ***");

        let report = audit_str(&key, &shares[..], DEFAULT_MAX_COMBINATIONS).unwrap();
        assert_eq!(report.unreadable, vec![2]);
        assert_eq!(report.suspects, vec![2]);
        assert_eq!(report.combinations.len(), 3);
        assert!(report.combinations.iter().all(|c| c.is_valid()));
        assert_eq!(report.tallies[2], super::Tally::default());
    }

    #[test]
    fn mostly_unreadable_strings_still_report() {
        let key = key(4, 2);
        let shares = encrypt_str(&key, "hello").unwrap();
        let supplied = [shares[0].as_str(), "garbage", "%%%"];

        let report = audit_str(&key, &supplied, DEFAULT_MAX_COMBINATIONS).unwrap();
        assert_eq!(report.unreadable, vec![1, 2]);
        assert_eq!(report.suspects, vec![1, 2]);
        assert!(report.combinations.is_empty());
        assert_eq!(report.tallies.len(), 3);
        assert_eq!(report.recovered, None);
        assert!(!report.is_clean());

        let report = audit_str(&key, &["x", "y", "z"], DEFAULT_MAX_COMBINATIONS).unwrap();
        assert_eq!(report.unreadable, vec![0, 1, 2]);
        assert_eq!(report.suspects, vec![0, 1, 2]);
        assert_eq!(report.tallies.len(), 3);
    }

    #[test]
    fn audit_str_needs_threshold_strings() {
        let key = key(4, 3);
        assert_eq!(
            audit_str(&key, &["x", "y"], DEFAULT_MAX_COMBINATIONS).unwrap_err(),
            Error::InsufficientShares {
                required: 3,
                provided: 2
            }
        );
    }

    #[test]
    fn audit_refuses_large_searches() {
        let key = key(20, 10);
        let shares = encrypt(&key, b"hello").unwrap();
        assert!(matches!(
            audit(&key, &shares, 100),
            Err(Error::TooManyCombinations { limit: 100 })
        ));
    }

    #[test]
    fn audit_needs_threshold_shares() {
        let key = key(5, 3);
        let shares = encrypt(&key, b"hello").unwrap();
        assert_eq!(
            audit(&key, &shares[..2], DEFAULT_MAX_COMBINATIONS).unwrap_err(),
            Error::InsufficientShares {
                required: 3,
                provided: 2
            }
        );
    }

    #[test]
    fn mixed_splits_are_reported_inconsistent() {
        let mut rng = ChaCha20Rng::from_seed([5; 32]);
        let a = ClusterKey::generate_rng(2, 1, &KeyOptions::default(), &mut rng).unwrap();
        let b = ClusterKey::generate_rng(2, 1, &KeyOptions::default(), &mut rng).unwrap();
        let mut shares = encrypt(&a, b"first").unwrap();
        shares.truncate(1);
        shares.extend(encrypt(&b, b"second").unwrap().into_iter().skip(1));

        let report = audit(&a, &shares, DEFAULT_MAX_COMBINATIONS).unwrap();
        assert!(!report.consistent);
        assert!(report.suspects.is_empty());
    }
}

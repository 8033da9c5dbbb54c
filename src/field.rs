// Arithmetic over the prime field GF(p) with p = 2^61 - 1.
//
// p is a Mersenne prime, so reducing a 122-bit product only needs two shift-and-add folds.

use core::fmt;
use core::iter::{Product, Sum};
use core::ops::{Add, Mul, Neg, Sub};

#[cfg(feature = "zeroize_memory")]
use zeroize::Zeroize;

use crate::error::Error;

/// The field modulus, `2^61 - 1`.
pub const MODULUS: u64 = (1 << 61) - 1;

/// Number of secret bytes packed into one field element. `2^56 < MODULUS`, so any
/// chunk fits without wraparound.
pub const CHUNK_BYTES: usize = 7;

/// An element of GF(2^61 - 1). The inner value is always reduced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "zeroize_memory", derive(Zeroize))]
pub struct Fp(pub(crate) u64);

#[inline]
fn reduce(x: u128) -> u64 {
    let p = MODULUS as u128;
    let folded = (x & p) + (x >> 61);
    let folded = (folded & p) + (folded >> 61);
    let r = folded as u64;
    if r >= MODULUS {
        r - MODULUS
    } else {
        r
    }
}

impl Fp {
    pub const ZERO: Fp = Fp(0);
    pub const ONE: Fp = Fp(1);

    /// Returns `None` when `value` is not a member of the field.
    pub const fn new(value: u64) -> Option<Fp> {
        if value < MODULUS {
            Some(Fp(value))
        } else {
            None
        }
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Samples an element uniformly at random from `[0, p)`.
    pub fn random<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Fp {
        Fp(rng.gen_range(0..MODULUS))
    }

    pub fn pow(self, mut exp: u64) -> Fp {
        let mut base = self;
        let mut acc = Fp::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc * base;
            }
            base = base * base;
            exp >>= 1;
        }
        acc
    }

    /// Multiplicative inverse by Fermat's little theorem.
    pub fn inv(self) -> Result<Fp, Error> {
        if self.is_zero() {
            return Err(Error::Arithmetic);
        }
        Ok(self.pow(MODULUS - 2))
    }

    pub fn checked_div(self, rhs: Fp) -> Result<Fp, Error> {
        Ok(self * rhs.inv()?)
    }
}

impl From<u16> for Fp {
    fn from(value: u16) -> Fp {
        Fp(value as u64)
    }
}

impl TryFrom<u64> for Fp {
    type Error = Error;

    fn try_from(value: u64) -> Result<Fp, Error> {
        Fp::new(value).ok_or(Error::InvalidShareFormat("value is outside the field"))
    }
}

impl fmt::Display for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Fp {
    type Output = Fp;

    fn add(self, rhs: Fp) -> Fp {
        let sum = self.0 + rhs.0;
        if sum >= MODULUS {
            Fp(sum - MODULUS)
        } else {
            Fp(sum)
        }
    }
}

impl Sub for Fp {
    type Output = Fp;

    fn sub(self, rhs: Fp) -> Fp {
        if self.0 >= rhs.0 {
            Fp(self.0 - rhs.0)
        } else {
            Fp(self.0 + MODULUS - rhs.0)
        }
    }
}

impl Neg for Fp {
    type Output = Fp;

    fn neg(self) -> Fp {
        Fp::ZERO - self
    }
}

impl Mul for Fp {
    type Output = Fp;

    fn mul(self, rhs: Fp) -> Fp {
        Fp(reduce(self.0 as u128 * rhs.0 as u128))
    }
}

impl Sum for Fp {
    fn sum<I: Iterator<Item = Fp>>(iter: I) -> Fp {
        iter.fold(Fp::ZERO, |acc, x| acc + x)
    }
}

impl Product for Fp {
    fn product<I: Iterator<Item = Fp>>(iter: I) -> Fp {
        iter.fold(Fp::ONE, |acc, x| acc * x)
    }
}

#[cfg(feature = "fuzzing")]
impl<'a> arbitrary::Arbitrary<'a> for Fp {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Fp> {
        Ok(Fp(u64::arbitrary(u)? % MODULUS))
    }
}

// A module which contains necessary algorithms to compute shares and recover secrets

use alloc::vec::Vec;

use crate::error::Error;
use crate::field::Fp;
use crate::share::Share;

// Builds the polynomial `c_{t-1} x^{t-1} + ... + c_1 x + s` for one chunk.
// Coefficient degrees go from higher to lower in the returned vector order, `s` is last.
pub fn polynomial(s: Fp, coefficients: &[Fp]) -> Vec<Fp> {
    let mut poly = Vec::with_capacity(coefficients.len() + 1);
    poly.extend(coefficients.iter().rev().copied());
    poly.push(s);
    poly
}

// Horner evaluation of a polynomial laid out as returned by `polynomial`.
pub fn evaluate(poly: &[Fp], x: Fp) -> Fp {
    poly.iter().fold(Fp::ZERO, |acc, c| acc * x + *c)
}

// Returns an iterator over the points of the `polys` polynomials passed as argument.
// Each item of the iterator is a tuple `(x, [f_1(x), f_2(x)..])` where each `f_i` is the result for the ith polynomial.
// Each polynomial corresponds to one chunk of the encoded secret.
// The iterator starts at `x = 1` and ends at `x = n`.
pub fn get_evaluator(polys: &[Vec<Fp>], n: u16) -> impl Iterator<Item = (u16, Vec<Fp>)> + '_ {
    (1..=n).map(move |x| {
        let point = Fp::from(x);
        (x, polys.iter().map(|p| evaluate(p, point)).collect())
    })
}

// Lagrange basis weights at `x` for the sample points `xs`:
// `w_i = prod_{j != i} (x - x_j) / (x_i - x_j)`.
// Repeated sample points have no inverse and fail with `Error::Arithmetic`.
pub fn lagrange_weights(xs: &[Fp], x: Fp) -> Result<Vec<Fp>, Error> {
    xs.iter()
        .enumerate()
        .map(|(i, x_i)| {
            let (num, denom) = xs
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .fold((Fp::ONE, Fp::ONE), |(num, denom), (_, x_j)| {
                    (num * (x - *x_j), denom * (*x_i - *x_j))
                });
            num.checked_div(denom)
        })
        .collect()
}

// Finds the value at `x` of the polynomials sampled by `shares`, one per chunk.
// With `x = 0` this is the [root of the Lagrange polynomial](https://en.wikipedia.org/wiki/Shamir%27s_Secret_Sharing#Computationally_efficient_approach),
// i.e. the encoded secret. The weights only depend on the x coordinates, so they are computed once.
pub fn interpolate(shares: &[Share], x: Fp) -> Result<Vec<Fp>, Error> {
    let xs: Vec<Fp> = shares.iter().map(Share::x).collect();
    let weights = lagrange_weights(&xs, x)?;

    Ok((0..shares[0].len())
        .map(|chunk| {
            shares
                .iter()
                .zip(&weights)
                .map(|(share, w)| *w * share.values()[chunk])
                .sum::<Fp>()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{evaluate, get_evaluator, interpolate, lagrange_weights, polynomial};
    use crate::error::Error;
    use crate::field::Fp;
    use crate::key::KeyId;
    use crate::share::Share;
    use alloc::{vec, vec::Vec};
    use rand_chacha::rand_core::SeedableRng;

    fn shares_of(polys: Vec<Vec<Fp>>, n: u16, threshold: u16) -> Vec<Share> {
        get_evaluator(&polys, n)
            .map(|(x, y)| Share::new(KeyId([0; 16]), x, threshold, y))
            .collect()
    }

    #[test]
    fn polynomial_puts_secret_last() {
        let poly = polynomial(Fp(9), &[Fp(1), Fp(2)]);
        assert_eq!(poly, vec![Fp(2), Fp(1), Fp(9)]);
    }

    #[test]
    fn evaluator_works() {
        // 3x^2 + 2x + 5
        let polys = vec![vec![Fp(3), Fp(2), Fp(5)]];
        let iter = get_evaluator(&polys, 2);
        let values: Vec<_> = iter.collect();
        assert_eq!(values, vec![(1, vec![Fp(10)]), (2, vec![Fp(21)])]);
        assert_eq!(evaluate(&[Fp(3), Fp(2), Fp(5)], Fp::ZERO), Fp(5));
    }

    #[test]
    fn interpolate_works() {
        let mut rng = rand_chacha::ChaCha8Rng::from_seed([0x90; 32]);
        let coefficients: Vec<Fp> = (0..9).map(|_| Fp::random(&mut rng)).collect();
        let poly = polynomial(Fp(185), &coefficients);
        let shares = shares_of(vec![poly], 10, 10);
        let root = interpolate(&shares, Fp::ZERO).unwrap();
        assert_eq!(root, vec![Fp(185)]);
    }

    #[test]
    fn interpolate_at_other_points() {
        let poly = polynomial(Fp(42), &[Fp(7), Fp(11)]);
        let shares = shares_of(vec![poly.clone()], 5, 3);
        let picked = vec![shares[0].clone(), shares[2].clone(), shares[4].clone()];
        let at_two = interpolate(&picked, Fp(2)).unwrap();
        assert_eq!(at_two, vec![evaluate(&poly, Fp(2))]);
    }

    #[test]
    fn repeated_points_fail() {
        assert_eq!(
            lagrange_weights(&[Fp(1), Fp(1)], Fp::ZERO),
            Err(Error::Arithmetic)
        );
    }

    #[test]
    fn weights_of_single_point_are_one() {
        assert_eq!(lagrange_weights(&[Fp(4)], Fp::ZERO).unwrap(), vec![Fp::ONE]);
    }
}

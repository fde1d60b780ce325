//! Modular arithmetic over arbitrary-precision integers.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::{Error, Result};

/// Computes `base^exponent mod modulus` by square-and-multiply.
///
/// Needs `O(log exponent)` multiplications. A modulus of one yields zero.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> Result<BigUint> {
    if modulus.is_zero() {
        return Err(Error::InvalidParameter(
            "modulus cannot be zero".to_string(),
        ));
    }

    Ok(base.modpow(exponent, modulus))
}

/// Extended Euclidean algorithm.
///
/// Returns `(g, x, y)` with `g = gcd(a, b) >= 0` and `a*x + b*y = g`.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let q = old_r.div_floor(&r);

        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);

        let next_t = &old_t - &q * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    if old_r.is_negative() {
        (-old_r, -old_s, -old_t)
    } else {
        (old_r, old_s, old_t)
    }
}

/// Computes the inverse of `a` modulo `m`.
///
/// # Errors
///
/// Returns [`Error::NotInvertible`] when `gcd(a, m) != 1` and
/// [`Error::InvalidParameter`] for a zero modulus.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint> {
    if m.is_zero() {
        return Err(Error::InvalidParameter(
            "modulus cannot be zero".to_string(),
        ));
    }

    let modulus = BigInt::from(m.clone());
    let (g, x, _) = extended_gcd(&BigInt::from(a.clone()), &modulus);
    if !g.is_one() {
        return Err(Error::NotInvertible);
    }

    // mod_floor keeps the result in [0, m) for negative coefficients
    x.mod_floor(&modulus)
        .to_biguint()
        .ok_or(Error::NotInvertible)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn mod_pow_small_values() {
        assert_eq!(mod_pow(&big(4), &big(13), &big(497)).unwrap(), big(445));
        assert_eq!(mod_pow(&big(2), &big(10), &big(1000)).unwrap(), big(24));
    }

    #[test]
    fn mod_pow_zero_exponent_is_one() {
        assert_eq!(mod_pow(&big(12345), &big(0), &big(7)).unwrap(), big(1));
    }

    #[test]
    fn mod_pow_modulus_one_is_zero() {
        assert_eq!(mod_pow(&big(9), &big(3), &big(1)).unwrap(), big(0));
    }

    #[test]
    fn mod_pow_rejects_zero_modulus() {
        assert!(matches!(
            mod_pow(&big(2), &big(3), &big(0)),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn extended_gcd_satisfies_bezout() {
        let a = BigInt::from(240);
        let b = BigInt::from(46);
        let (g, x, y) = extended_gcd(&a, &b);
        assert_eq!(g, BigInt::from(2));
        assert_eq!(&a * &x + &b * &y, g);
    }

    #[test]
    fn extended_gcd_with_zero() {
        let (g, x, y) = extended_gcd(&BigInt::from(17), &BigInt::zero());
        assert_eq!(g, BigInt::from(17));
        assert_eq!(x, BigInt::one());
        assert_eq!(y, BigInt::zero());
    }

    #[test]
    fn extended_gcd_negative_input() {
        let a = BigInt::from(-35);
        let b = BigInt::from(15);
        let (g, x, y) = extended_gcd(&a, &b);
        assert_eq!(g, BigInt::from(5));
        assert_eq!(&a * &x + &b * &y, g);
    }

    #[test]
    fn inverse_of_coprime_value() {
        let inv = mod_inverse(&big(3), &big(11)).unwrap();
        assert_eq!(inv, big(4));
        assert_eq!((big(3) * inv) % big(11), big(1));
    }

    #[test]
    fn inverse_is_reduced() {
        let inv = mod_inverse(&big(10), &big(17)).unwrap();
        assert!(inv < big(17));
        assert_eq!((big(10) * inv) % big(17), big(1));
    }

    #[test]
    fn inverse_fails_for_shared_factor() {
        assert_eq!(mod_inverse(&big(6), &big(9)), Err(Error::NotInvertible));
    }

    #[test]
    fn inverse_rejects_zero_modulus() {
        assert!(matches!(
            mod_inverse(&big(3), &big(0)),
            Err(Error::InvalidParameter(_))
        ));
    }
}

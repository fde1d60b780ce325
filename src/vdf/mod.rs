//! Delay function over an RSA modulus.
//!
//! Given a modulus `N`, base `x` and delay `t`, the output is
//! `y = x^(2^t) mod N`, computed by `t` sequential squarings. No known
//! algorithm parallelizes the squarings without the factorization of `N`.
//!
//! ## Trusted setup
//!
//! [`verify`] is fast only because it is handed the trapdoor `phi(N)`: it
//! reduces the exponent to `2^t mod phi(N)` and performs one short
//! exponentiation. Anyone holding the trapdoor can therefore produce `y`
//! without waiting, so verification is restricted to the party that ran
//! [`setup`]. A verifier without the factorization would need a
//! proof-of-exponentiation (e.g. a Wesolowski proof), which this module does
//! not provide.

use num_bigint::BigUint;
use num_traits::Zero;
use tracing::{debug, trace};

use crate::primitives::mod_pow;
use crate::{Error, Result};

/// Modulus generation and parameter types.
pub mod setup;

pub use setup::{setup, PublicParams, Setup, Trapdoor, MIN_PRIME_BITS};

/// Computes `y = x^(2^t) mod N` by `t` sequential squarings.
///
/// Deterministic: identical inputs always yield the same output. `t = 0`
/// returns `x mod N`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for a zero modulus.
pub fn compute(t: u64, modulus: &BigUint, x: &BigUint) -> Result<BigUint> {
    compute_with_progress(t, modulus, x, 0, |_, _| {})
}

/// Like [`compute`], calling `progress(done, t)` every `checkpoint`
/// squarings and once at the end. A `checkpoint` of zero disables the
/// intermediate calls.
pub fn compute_with_progress<F>(
    t: u64,
    modulus: &BigUint,
    x: &BigUint,
    checkpoint: u64,
    mut progress: F,
) -> Result<BigUint>
where
    F: FnMut(u64, u64),
{
    if modulus.is_zero() {
        return Err(Error::InvalidParameter(
            "modulus cannot be zero".to_string(),
        ));
    }

    let mut y = x % modulus;
    for i in 1..=t {
        // sequential squaring; each step depends on the previous one
        y = &y * &y % modulus;
        if checkpoint != 0 && i % checkpoint == 0 && i != t {
            trace!(done = i, total = t, "delay checkpoint");
            progress(i, t);
        }
    }
    progress(t, t);

    debug!(t, "delay output computed");
    Ok(y)
}

/// Checks `y == x^(2^t) mod N` using the trapdoor `phi(N)`.
///
/// Computes `e = 2^t mod phi(N)` and compares `x^e mod N` against `y`. The
/// reduction is valid because `x` is coprime to `N`. This is trusted-setup
/// verification: see the module docs.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for a zero modulus or zero `phi`.
pub fn verify(
    t: u64,
    y: &BigUint,
    modulus: &BigUint,
    x: &BigUint,
    phi: &BigUint,
) -> Result<bool> {
    if modulus.is_zero() {
        return Err(Error::InvalidParameter(
            "modulus cannot be zero".to_string(),
        ));
    }
    if phi.is_zero() {
        return Err(Error::InvalidParameter(
            "trapdoor cannot be zero".to_string(),
        ));
    }

    let e = mod_pow(&BigUint::from(2u8), &BigUint::from(t), phi)?;
    let expected = mod_pow(x, &e, modulus)?;
    Ok(&expected == y)
}

/// Runs [`compute`] against a setup's public parameters.
pub fn evaluate(t: u64, params: &PublicParams) -> Result<BigUint> {
    compute(t, params.modulus(), params.base())
}

/// Runs [`verify`] against a full setup.
pub fn check(t: u64, y: &BigUint, setup: &Setup) -> Result<bool> {
    verify(
        t,
        y,
        setup.params().modulus(),
        setup.params().base(),
        setup.trapdoor().phi(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{seeded, RandomPrimes};

    fn small_setup() -> Setup {
        // 1009 * 1013
        let params =
            PublicParams::new(BigUint::from(1_022_117u64), BigUint::from(5u8)).unwrap();
        let trapdoor = Trapdoor::new(BigUint::from(1008u64 * 1012));
        Setup::from_parts(params, trapdoor)
    }

    #[test]
    fn compute_matches_direct_exponentiation() {
        let setup = small_setup();
        let n = setup.params().modulus();
        let x = setup.params().base();

        let y = compute(10, n, x).unwrap();
        let direct = x.modpow(&(BigUint::from(1u8) << 10u32), n);
        assert_eq!(y, direct);
    }

    #[test]
    fn compute_and_verify_round_trip() {
        let setup = small_setup();
        let y = evaluate(100, setup.params()).unwrap();
        assert!(check(100, &y, &setup).unwrap());
    }

    #[test]
    fn zero_delay_is_identity() {
        let setup = small_setup();
        let y = evaluate(0, setup.params()).unwrap();
        assert_eq!(&y, setup.params().base());
        assert!(check(0, &y, &setup).unwrap());
    }

    #[test]
    fn compute_reduces_oversized_base() {
        let n = BigUint::from(1_022_117u64);
        let x = BigUint::from(5u8) + &n;
        assert_eq!(compute(0, &n, &x).unwrap(), BigUint::from(5u8));
    }

    #[test]
    fn verify_rejects_wrong_output() {
        let setup = small_setup();
        let y = evaluate(50, setup.params()).unwrap();
        let wrong = (&y + 1u32) % setup.params().modulus();
        assert!(!check(50, &wrong, &setup).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_delay() {
        let setup = small_setup();
        let y = evaluate(50, setup.params()).unwrap();
        assert!(!check(51, &y, &setup).unwrap());
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let zero = BigUint::zero();
        let one = BigUint::from(1u8);
        assert!(matches!(
            compute(3, &zero, &one),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            verify(3, &one, &zero, &one, &one),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            verify(3, &one, &BigUint::from(15u8), &one, &zero),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn progress_reports_checkpoints() {
        let setup = small_setup();
        let mut seen = Vec::new();
        compute_with_progress(10, setup.params().modulus(), setup.params().base(), 4, |d, t| {
            seen.push((d, t))
        })
        .unwrap();
        assert_eq!(seen, vec![(4, 10), (8, 10), (10, 10)]);
    }

    #[test]
    fn generated_setup_verifies() {
        let mut primes = RandomPrimes::new(seeded(21));
        let setup = setup(64, &mut primes, &mut seeded(22)).unwrap();
        let y = evaluate(1_000, setup.params()).unwrap();
        assert!(check(1_000, &y, &setup).unwrap());
    }
}

//! Random probable primes for modulus setup.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use tracing::trace;

use crate::{Error, Result};

/// Miller-Rabin rounds used by [`RandomPrimes`]. Each round has error at
/// most 1/4, so 64 rounds bound a false positive by 2^-128.
pub const MILLER_RABIN_ROUNDS: usize = 64;

const SMALL_PRIMES: [u32; 24] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Source of large primes for delay-function setup.
///
/// The production implementation is [`RandomPrimes`]. Tests inject fixed
/// primes to make a setup reproducible without searching.
pub trait PrimeSource {
    /// Returns a prime with exactly `bits` significant bits.
    fn generate_prime(&mut self, bits: u64) -> Result<BigUint>;
}

impl<P: PrimeSource + ?Sized> PrimeSource for &mut P {
    fn generate_prime(&mut self, bits: u64) -> Result<BigUint> {
        (**self).generate_prime(bits)
    }
}

impl<P: PrimeSource + ?Sized> PrimeSource for Box<P> {
    fn generate_prime(&mut self, bits: u64) -> Result<BigUint> {
        (**self).generate_prime(bits)
    }
}

/// Draws random odd candidates and keeps the first probable prime.
#[derive(Debug)]
pub struct RandomPrimes<R> {
    rng: R,
    rounds: usize,
}

impl<R: CryptoRngCore> RandomPrimes<R> {
    /// Creates a prime source over the given RNG with
    /// [`MILLER_RABIN_ROUNDS`] rounds per candidate.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            rounds: MILLER_RABIN_ROUNDS,
        }
    }
}

impl<R: CryptoRngCore> PrimeSource for RandomPrimes<R> {
    fn generate_prime(&mut self, bits: u64) -> Result<BigUint> {
        if bits < 2 {
            return Err(Error::InvalidParameter(format!(
                "prime bit length must be at least 2, got {bits}"
            )));
        }

        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            let mut candidate = self.rng.gen_biguint(bits);
            candidate.set_bit(bits - 1, true);
            candidate.set_bit(0, true);

            if is_probable_prime(&candidate, self.rounds, &mut self.rng) {
                trace!(bits, attempts, "found probable prime");
                return Ok(candidate);
            }
        }
    }
}

/// Probabilistic primality test: trial division by small primes, then
/// `rounds` Miller-Rabin rounds with bases drawn from `rng`.
pub fn is_probable_prime<R: CryptoRngCore + ?Sized>(
    n: &BigUint,
    rounds: usize,
    rng: &mut R,
) -> bool {
    let two = BigUint::from(2u8);
    if *n < two {
        return false;
    }
    if *n == two {
        return true;
    }
    if n.is_even() {
        return false;
    }

    for p in SMALL_PRIMES {
        if (n % p).is_zero() {
            return *n == BigUint::from(p);
        }
    }
    // every odd composite below 101^2 has a factor under 100
    if *n < BigUint::from(101u32 * 101) {
        return true;
    }

    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = &x * &x % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

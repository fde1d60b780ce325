use core::fmt;

use num_bigint::{BigUint, RandBigInt};
use rand_core::CryptoRngCore;
use tracing::{debug, trace};

use crate::primitives::{mod_inverse, PrimeSource};
use crate::{Error, Result};

/// Smallest accepted bit length for each prime factor of the modulus.
pub const MIN_PRIME_BITS: u64 = 16;

/// Public half of a delay-function setup: the modulus `N = p*q` and the
/// base `x`, coprime to `N`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicParams {
    modulus: BigUint,
    base: BigUint,
}

impl PublicParams {
    /// Builds public parameters from an existing modulus and base.
    ///
    /// # Errors
    ///
    /// Returns an error if the modulus is below 3, the base lies outside
    /// `[2, N-1]`, or the base shares a factor with the modulus.
    pub fn new(modulus: BigUint, base: BigUint) -> Result<Self> {
        if modulus < BigUint::from(3u8) {
            return Err(Error::InvalidParameter(
                "modulus must be at least 3".to_string(),
            ));
        }
        if base < BigUint::from(2u8) || base >= modulus {
            return Err(Error::InvalidParameter(
                "base must lie in [2, N-1]".to_string(),
            ));
        }
        match mod_inverse(&base, &modulus) {
            Ok(_) => Ok(Self { modulus, base }),
            Err(Error::NotInvertible) => Err(Error::InvalidParameter(
                "base must be coprime to the modulus".to_string(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Returns the modulus `N`.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Returns the base `x`.
    pub fn base(&self) -> &BigUint {
        &self.base
    }
}

/// Euler's totient `phi(N) = (p-1)(q-1)`.
///
/// Knowing it is equivalent to knowing the factorization of `N`, which lets
/// the holder evaluate the delay function without waiting. It must never be
/// published alongside the output.
#[derive(Clone, PartialEq, Eq)]
pub struct Trapdoor {
    phi: BigUint,
}

impl Trapdoor {
    /// Wraps a known totient.
    pub fn new(phi: BigUint) -> Self {
        Self { phi }
    }

    /// Computes the totient from the two prime factors.
    pub fn from_primes(p: &BigUint, q: &BigUint) -> Self {
        Self {
            phi: (p - 1u32) * (q - 1u32),
        }
    }

    /// Returns `phi(N)`.
    pub fn phi(&self) -> &BigUint {
        &self.phi
    }
}

impl fmt::Debug for Trapdoor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trapdoor").finish_non_exhaustive()
    }
}

/// One fresh `(N, x, phi(N))` tuple. Lives for a single round.
#[derive(Clone, Debug)]
pub struct Setup {
    params: PublicParams,
    trapdoor: Trapdoor,
}

impl Setup {
    /// Assembles a setup from its parts.
    pub fn from_parts(params: PublicParams, trapdoor: Trapdoor) -> Self {
        Self { params, trapdoor }
    }

    /// Returns the publishable parameters.
    pub fn params(&self) -> &PublicParams {
        &self.params
    }

    /// Returns the secret trapdoor.
    pub fn trapdoor(&self) -> &Trapdoor {
        &self.trapdoor
    }

    /// Splits the setup into public parameters and trapdoor.
    pub fn into_parts(self) -> (PublicParams, Trapdoor) {
        (self.params, self.trapdoor)
    }
}

/// Generates a fresh modulus, trapdoor and base.
///
/// Draws two distinct `bits`-bit primes, then a base uniform in `[2, N-1]`,
/// redrawing while it is not invertible modulo `N`. Retries are internal and
/// unbounded.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] when `bits < MIN_PRIME_BITS`, or any
/// error the prime source reports.
pub fn setup<P, R>(bits: u64, primes: &mut P, rng: &mut R) -> Result<Setup>
where
    P: PrimeSource + ?Sized,
    R: CryptoRngCore + ?Sized,
{
    if bits < MIN_PRIME_BITS {
        return Err(Error::InvalidParameter(format!(
            "prime bit length must be at least {MIN_PRIME_BITS}, got {bits}"
        )));
    }

    let p = primes.generate_prime(bits)?;
    let mut q = primes.generate_prime(bits)?;
    while q == p {
        trace!("second prime equals the first, redrawing");
        q = primes.generate_prime(bits)?;
    }

    let modulus = &p * &q;
    let trapdoor = Trapdoor::from_primes(&p, &q);

    let two = BigUint::from(2u8);
    let base = loop {
        let candidate = rng.gen_biguint_range(&two, &modulus);
        match mod_inverse(&candidate, &modulus) {
            Ok(_) => break candidate,
            Err(Error::NotInvertible) => {
                trace!("base shares a factor with the modulus, redrawing");
            }
            Err(e) => return Err(e),
        }
    };

    debug!(
        bits,
        modulus_bits = modulus.bits(),
        "delay function setup complete"
    );

    Ok(Setup {
        params: PublicParams { modulus, base },
        trapdoor,
    })
}

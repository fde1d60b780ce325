//! Number-theoretic building blocks for the delay function.
//!
//! - **arithmetic**: modular exponentiation, extended Euclid, inverses
//! - **prime**: probable-prime generation for the RSA modulus
//! - **rng**: explicit random sources

/// Modular arithmetic over big integers.
pub mod arithmetic;
/// Prime generation and primality testing.
pub mod prime;
/// Cryptographically secure and seeded random sources.
pub mod rng;

pub use arithmetic::{extended_gcd, mod_inverse, mod_pow};
pub use prime::{is_probable_prime, PrimeSource, RandomPrimes, MILLER_RABIN_ROUNDS};
pub use rng::{round_stream, seeded, seeded_stream, SecureRng};

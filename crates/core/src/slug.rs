//! Public song identifiers.
//!
//! A slug is 16 characters drawn uniformly from `A-Z0-9`. Candidates come
//! from the thread-local CSPRNG so a pending song's URL cannot be guessed.

use rand::Rng;

use crate::error::CoreError;

/// Number of characters in a slug.
pub const SLUG_LENGTH: usize = 16;

/// Slug alphabet: uppercase ASCII letters followed by digits.
pub const SLUG_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Upper bound on insert attempts before giving up.
pub const MAX_SLUG_ATTEMPTS: u32 = 16;

/// Generate one slug candidate from the thread-local CSPRNG.
pub fn generate_slug() -> String {
    generate_slug_with(&mut rand::rng())
}

/// Generate one slug candidate from the supplied RNG.
pub fn generate_slug_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SLUG_LENGTH)
        .map(|_| SLUG_ALPHABET[rng.random_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

/// Error returned once every attempt collided.
pub fn slug_space_exhausted() -> CoreError {
    CoreError::Internal(format!(
        "Could not generate a unique slug after {MAX_SLUG_ATTEMPTS} attempts"
    ))
}

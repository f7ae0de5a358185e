//! Signing primitives shared by the identity service and its middleware.
//!
//! - `jwt`: typed claims and the per-algorithm token codecs (HS256 / RS256)
//! - `keys`: signing key material, loaded once at startup
//! - `test_keys`: fixed keys for tests (`test-utils` feature)

use rand::{rngs::OsRng, RngCore};

pub mod jwt;
pub mod keys;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_keys;

pub use jwt::{Claims, TokenCodec, TokenError, ValidationPolicy};
pub use keys::{KeyMaterial, SigningAlgorithm};

/// Number of random bytes behind an opaque token (256 bits).
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Generate an unpredictable opaque token, hex encoded.
///
/// Drawn from the operating system RNG; the value carries no information
/// about who it was issued to.
pub fn random_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

//! Signing key material.
//!
//! Keys are loaded once at process start and handed to the token codec.
//! Nothing in this module keeps global state; callers own the resulting
//! codec and share it explicitly.
use jsonwebtoken::Algorithm;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::jwt::{Hs256Codec, Rs256Codec, TokenCodec, TokenError, ValidationPolicy};

/// Shared secrets shorter than this are accepted but logged as weak.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Algorithms a codec can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    Hs256,
    Rs256,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Hs256 => "HS256",
            SigningAlgorithm::Rs256 => "RS256",
        }
    }

    pub(crate) fn jwt_algorithm(self) -> Algorithm {
        match self {
            SigningAlgorithm::Hs256 => Algorithm::HS256,
            SigningAlgorithm::Rs256 => Algorithm::RS256,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "RS256" => Ok(SigningAlgorithm::Rs256),
            other => Err(TokenError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Raw key bytes for one of the supported algorithms.
///
/// `RsaKeyPair` without a private key can only verify tokens.
#[derive(Clone)]
pub enum KeyMaterial {
    SharedSecret(Vec<u8>),
    RsaKeyPair {
        private_pem: Option<Vec<u8>>,
        public_pem: Vec<u8>,
    },
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::SharedSecret(secret) => f
                .debug_struct("SharedSecret")
                .field("len", &secret.len())
                .finish_non_exhaustive(),
            KeyMaterial::RsaKeyPair { private_pem, .. } => f
                .debug_struct("RsaKeyPair")
                .field("can_sign", &private_pem.is_some())
                .finish_non_exhaustive(),
        }
    }
}

impl KeyMaterial {
    /// HS256 shared secret. Empty secrets are rejected.
    pub fn shared_secret(secret: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::KeyMaterial(
                "shared secret must not be empty".to_string(),
            ));
        }
        if secret.len() < MIN_SECRET_LENGTH {
            warn!(
                length = secret.len(),
                minimum = MIN_SECRET_LENGTH,
                "HS256 shared secret is shorter than recommended"
            );
        }
        Ok(KeyMaterial::SharedSecret(secret))
    }

    /// RS256 key pair from PEM text (PKCS#1 or PKCS#8).
    pub fn rsa_key_pair(
        private_pem: impl Into<Vec<u8>>,
        public_pem: impl Into<Vec<u8>>,
    ) -> Self {
        KeyMaterial::RsaKeyPair {
            private_pem: Some(private_pem.into()),
            public_pem: public_pem.into(),
        }
    }

    /// RS256 public key only; the resulting codec verifies but cannot sign.
    pub fn rsa_public_key(public_pem: impl Into<Vec<u8>>) -> Self {
        KeyMaterial::RsaKeyPair {
            private_pem: None,
            public_pem: public_pem.into(),
        }
    }

    /// Read RS256 PEM files from disk.
    pub fn rsa_from_files(
        private_key_path: Option<&Path>,
        public_key_path: &Path,
    ) -> Result<Self, TokenError> {
        let private_pem = private_key_path.map(read_pem).transpose()?;
        let public_pem = read_pem(public_key_path)?;
        Ok(KeyMaterial::RsaKeyPair {
            private_pem,
            public_pem,
        })
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            KeyMaterial::SharedSecret(_) => SigningAlgorithm::Hs256,
            KeyMaterial::RsaKeyPair { .. } => SigningAlgorithm::Rs256,
        }
    }

    pub fn can_sign(&self) -> bool {
        match self {
            KeyMaterial::SharedSecret(_) => true,
            KeyMaterial::RsaKeyPair { private_pem, .. } => private_pem.is_some(),
        }
    }

    /// Parse the key bytes and build the codec for this algorithm.
    pub fn into_codec(self, policy: &ValidationPolicy) -> Result<Arc<dyn TokenCodec>, TokenError> {
        let codec: Arc<dyn TokenCodec> = match self {
            KeyMaterial::SharedSecret(secret) => Arc::new(Hs256Codec::new(&secret, policy)?),
            KeyMaterial::RsaKeyPair {
                private_pem: Some(private_pem),
                public_pem,
            } => Arc::new(Rs256Codec::new(&private_pem, &public_pem, policy)?),
            KeyMaterial::RsaKeyPair {
                private_pem: None,
                public_pem,
            } => Arc::new(Rs256Codec::verify_only(&public_pem, policy)?),
        };
        Ok(codec)
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TokenError> {
    fs::read(path).map_err(|e| {
        TokenError::KeyMaterial(format!("failed to read {}: {}", path.display(), e))
    })
}

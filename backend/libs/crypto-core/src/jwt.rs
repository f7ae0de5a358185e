/// Token codec for identity service access tokens
///
/// Signs and verifies compact JWS tokens carrying [`Claims`]. One codec is
/// bound to exactly one algorithm at construction; a token whose header
/// names any other algorithm is rejected before signature verification.
///
/// ## Security Design
///
/// - **Pinned algorithm**: the header `alg` must equal the codec's algorithm
/// - **`none` is never accepted**: unsigned tokens fail header parsing
/// - **Issuer and audience are mandatory**: checked on every verification
/// - **No global state**: keys live inside the codec value
///
/// ## Usage
///
/// ```rust
/// use crypto_core::{Claims, KeyMaterial, ValidationPolicy};
///
/// let policy = ValidationPolicy::new("identity-service", "api");
/// let codec = KeyMaterial::shared_secret("change-me-to-a-long-random-secret-value")
///     .and_then(|keys| keys.into_codec(&policy))
///     .expect("codec");
///
/// let now = chrono::Utc::now().timestamp();
/// let claims = Claims {
///     sub: "42".to_string(),
///     username: "alice".to_string(),
///     email: "alice@example.com".to_string(),
///     roles: vec!["user".to_string()],
///     iat: now,
///     exp: now + 3600,
///     iss: "identity-service".to_string(),
///     aud: "api".to_string(),
/// };
///
/// let token = codec.sign(&claims).expect("sign");
/// assert_eq!(codec.verify(&token).expect("verify"), claims);
/// ```
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::keys::SigningAlgorithm;

// ============================================================================
// Constants
// ============================================================================

/// Clock skew tolerated on `exp` (seconds)
pub const DEFAULT_VALIDATION_LEEWAY: u64 = 30;

/// Maximum amount `iat` may lie in the future (seconds)
pub const MAX_IAT_FUTURE_SKEW_SECS: i64 = 300;

// ============================================================================
// Data Structures
// ============================================================================

/// Claims carried by an access token.
///
/// Every field is required on decode; a token missing any of them is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id, decimal string)
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Role names held by the subject at issue time
    pub roles: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("key material error: {0}")]
    KeyMaterial(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Expected issuer/audience plus clock tolerance applied on verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub issuer: String,
    pub audience: String,
    pub leeway_secs: u64,
}

impl ValidationPolicy {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_secs: DEFAULT_VALIDATION_LEEWAY,
        }
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    fn validation(&self, algorithm: SigningAlgorithm) -> Validation {
        let mut validation = Validation::new(algorithm.jwt_algorithm());
        validation.leeway = self.leeway_secs;
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Signs and verifies access tokens with one fixed algorithm.
pub trait TokenCodec: Send + Sync {
    fn algorithm(&self) -> SigningAlgorithm;

    fn sign(&self, claims: &Claims) -> Result<String, TokenError>;

    /// Verify signature, algorithm, issuer, audience and time claims.
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

pub struct Hs256Codec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Hs256Codec {
    pub fn new(secret: &[u8], policy: &ValidationPolicy) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::KeyMaterial(
                "shared secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: policy.validation(SigningAlgorithm::Hs256),
        })
    }
}

impl fmt::Debug for Hs256Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hs256Codec").finish_non_exhaustive()
    }
}

impl TokenCodec for Hs256Codec {
    fn algorithm(&self) -> SigningAlgorithm {
        SigningAlgorithm::Hs256
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        sign_claims(Algorithm::HS256, &self.encoding_key, claims)
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        verify_claims(
            token,
            SigningAlgorithm::Hs256,
            &self.decoding_key,
            &self.validation,
        )
    }
}

/// RS256 codec. Without a private key it can only verify.
pub struct Rs256Codec {
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Rs256Codec {
    pub fn new(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        policy: &ValidationPolicy,
    ) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| TokenError::KeyMaterial(format!("invalid RSA private key: {}", e)))?;
        let mut codec = Self::verify_only(public_key_pem, policy)?;
        codec.encoding_key = Some(encoding_key);
        Ok(codec)
    }

    pub fn verify_only(public_key_pem: &[u8], policy: &ValidationPolicy) -> Result<Self, TokenError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| TokenError::KeyMaterial(format!("invalid RSA public key: {}", e)))?;
        Ok(Self {
            encoding_key: None,
            decoding_key,
            validation: policy.validation(SigningAlgorithm::Rs256),
        })
    }
}

impl fmt::Debug for Rs256Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rs256Codec")
            .field("can_sign", &self.encoding_key.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenCodec for Rs256Codec {
    fn algorithm(&self) -> SigningAlgorithm {
        SigningAlgorithm::Rs256
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let key = self.encoding_key.as_ref().ok_or_else(|| {
            TokenError::KeyMaterial("RS256 private key not configured".to_string())
        })?;
        sign_claims(Algorithm::RS256, key, claims)
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        verify_claims(
            token,
            SigningAlgorithm::Rs256,
            &self.decoding_key,
            &self.validation,
        )
    }
}

// ============================================================================
// Shared sign / verify
// ============================================================================

fn sign_claims(algorithm: Algorithm, key: &EncodingKey, claims: &Claims) -> Result<String, TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::Signing(
            "expiration must be after issued-at".to_string(),
        ));
    }
    encode(&Header::new(algorithm), claims, key).map_err(|e| TokenError::Signing(e.to_string()))
}

fn verify_claims(
    token: &str,
    expected: SigningAlgorithm,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<Claims, TokenError> {
    let header = match decode_header(token) {
        Ok(header) => header,
        // Algorithms jsonwebtoken cannot represent ("none", lowercase, ...)
        // still count as an algorithm mismatch if the header is readable.
        Err(e) => {
            return Err(match header_algorithm(token) {
                Some(alg) => TokenError::UnsupportedAlgorithm(alg),
                None => TokenError::InvalidToken(e.to_string()),
            })
        }
    };

    if header.alg != expected.jwt_algorithm() {
        return Err(TokenError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    let claims = decode::<Claims>(token, key, validation)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidAlgorithm => TokenError::UnsupportedAlgorithm(format!("{:?}", header.alg)),
            _ => TokenError::InvalidToken(e.to_string()),
        })?
        .claims;

    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidToken(
            "expiration is not after issued-at".to_string(),
        ));
    }

    let now = Utc::now().timestamp();
    if claims.iat > now + MAX_IAT_FUTURE_SKEW_SECS {
        return Err(TokenError::InvalidToken(
            "token issued in the future".to_string(),
        ));
    }

    Ok(claims)
}

/// Best-effort read of the raw `alg` header value.
fn header_algorithm(token: &str) -> Option<String> {
    let segment = token.split('.').next()?;
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    let header: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    header.get("alg")?.as_str().map(str::to_owned)
}

// ============================================================================
// Tests
// ============================================================================

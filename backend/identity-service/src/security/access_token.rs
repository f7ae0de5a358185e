/// Access token issuance
use chrono::{DateTime, Duration, TimeZone, Utc};
use crypto_core::{Claims, TokenCodec};
use std::sync::Arc;

use crate::config::JwtSettings;
use crate::error::{IdentityError, Result};
use crate::models::User;

/// Signed access token plus the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

/// Builds and signs access tokens for users.
///
/// Output depends only on the user and the supplied clock.
#[derive(Clone)]
pub struct AccessTokenIssuer {
    codec: Arc<dyn TokenCodec>,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl AccessTokenIssuer {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            codec,
            issuer: issuer.into(),
            audience: audience.into(),
            ttl,
        }
    }

    pub fn from_settings(codec: Arc<dyn TokenCodec>, settings: &JwtSettings) -> Self {
        Self::new(
            codec,
            settings.issuer.clone(),
            settings.audience.clone(),
            settings.access_token_ttl(),
        )
    }

    pub fn codec(&self) -> &Arc<dyn TokenCodec> {
        &self.codec
    }

    pub fn claims_for(&self, user: &User, now: DateTime<Utc>) -> Claims {
        let mut roles = user.roles.clone();
        roles.sort();
        roles.dedup();

        let iat = now.timestamp();
        Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            roles,
            iat,
            exp: iat + self.ttl.num_seconds(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        }
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedAccessToken> {
        let claims = self.claims_for(user, now);
        let token = self.codec.sign(&claims)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| IdentityError::Internal("access token expiry out of range".to_string()))?;

        Ok(IssuedAccessToken {
            token,
            claims,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::test_keys::{TEST_PRIVATE_KEY, TEST_PUBLIC_KEY, TEST_SECRET};
    use crypto_core::{KeyMaterial, ValidationPolicy};

    fn policy() -> ValidationPolicy {
        ValidationPolicy::new("identity-service", "api")
    }

    fn issuer_with(codec: Arc<dyn TokenCodec>) -> AccessTokenIssuer {
        AccessTokenIssuer::new(codec, "identity-service", "api", Duration::hours(1))
    }

    fn hs256_issuer() -> AccessTokenIssuer {
        issuer_with(
            KeyMaterial::shared_secret(TEST_SECRET)
                .unwrap()
                .into_codec(&policy())
                .unwrap(),
        )
    }

    fn user() -> User {
        User {
            id: 42,
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
            is_enabled: true,
            is_account_non_expired: true,
            is_account_non_locked: true,
            is_credentials_non_expired: true,
            is_deleted: false,
            last_login: None,
            roles: vec![
                "ROLE_USER".to_string(),
                "ROLE_ADMIN".to_string(),
                "ROLE_USER".to_string(),
            ],
        }
    }

    #[test]
    fn test_claims_reflect_user() {
        let now = Utc::now();
        let claims = hs256_issuer().claims_for(&user(), now);

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.email, "admin@example.com");
        assert_eq!(claims.roles, vec!["ROLE_ADMIN", "ROLE_USER"]);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, now.timestamp() + 3600);
        assert_eq!(claims.iss, "identity-service");
        assert_eq!(claims.aud, "api");
    }

    #[test]
    fn test_issued_token_verifies() {
        let issuer = hs256_issuer();
        let issued = issuer.issue(&user(), Utc::now()).unwrap();

        let verified = issuer.codec().verify(&issued.token).unwrap();
        assert_eq!(verified, issued.claims);
        assert_eq!(issued.expires_at.timestamp(), issued.claims.exp);
    }

    #[test]
    fn test_issue_is_deterministic_for_fixed_clock() {
        let now = Utc::now();
        for issuer in [
            hs256_issuer(),
            issuer_with(
                KeyMaterial::rsa_key_pair(TEST_PRIVATE_KEY, TEST_PUBLIC_KEY)
                    .into_codec(&policy())
                    .unwrap(),
            ),
        ] {
            let first = issuer.issue(&user(), now).unwrap();
            let second = issuer.issue(&user(), now).unwrap();
            assert_eq!(first.token, second.token);
        }
    }

    #[test]
    fn test_verify_only_codec_cannot_issue() {
        let issuer = issuer_with(
            KeyMaterial::rsa_public_key(TEST_PUBLIC_KEY)
                .into_codec(&policy())
                .unwrap(),
        );

        assert!(matches!(
            issuer.issue(&user(), Utc::now()),
            Err(IdentityError::JwtError(_))
        ));
    }
}

//! Access and refresh token handling.
//!
//! Access tokens are HS256 JWTs carrying [`Claims`]. Refresh tokens are opaque
//! random strings; only their SHA-256 hex digest is persisted.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::config::JwtConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, Claims};
use crate::features::users::models::User;

pub struct IssuedAccessToken {
    pub token: String,
    pub expires_in: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl_secs: config.access_token_ttl.as_secs() as i64,
            refresh_ttl_secs: config.refresh_token_ttl.as_secs() as i64,
        }
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    pub fn issue_access_token(&self, user: &User) -> Result<IssuedAccessToken> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + self.access_ttl_secs,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))?;

        Ok(IssuedAccessToken {
            token,
            expires_in: self.access_ttl_secs,
        })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AuthenticatedUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("Rejected access token: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;
        Ok(data.claims.into())
    }

    /// New opaque refresh token (two v4 UUIDs, 64 hex chars)
    pub fn generate_refresh_token() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    pub fn hash_refresh_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::users::models::UserRole;
    use std::time::Duration;

    fn config(access_secs: u64) -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
            access_token_ttl: Duration::from_secs(access_secs),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            leeway_secs: 0,
        }
    }

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "staff@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Sam".to_string(),
            last_name: "Staff".to_string(),
            role,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_token_carries_identity() {
        let service = TokenService::new(&config(900));
        let user = user(UserRole::Staff);
        let issued = service.issue_access_token(&user).unwrap();
        assert_eq!(issued.expires_in, 900);

        let authenticated = service.validate_access_token(&issued.token).unwrap();
        assert_eq!(authenticated.user_id, user.id);
        assert_eq!(authenticated.role, UserRole::Staff);
        assert_eq!(authenticated.email, user.email);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = TokenService::new(&config(900));
        let mut other = config(900);
        other.secret = "a-completely-different-secret-value-0123".to_string();
        let verifier = TokenService::new(&other);

        let issued = issuer.issue_access_token(&user(UserRole::Client)).unwrap();
        assert!(matches!(
            verifier.validate_access_token(&issued.token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let service = TokenService::new(&config(900));
        assert!(service.validate_access_token("not.a.jwt").is_err());
    }

    #[test]
    fn test_refresh_token_hashing() {
        let token = TokenService::generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, TokenService::generate_refresh_token());

        let hash = TokenService::hash_refresh_token(&token);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, TokenService::hash_refresh_token(&token));
    }
}

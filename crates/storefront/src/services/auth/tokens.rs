//! Access and refresh token issuance.
//!
//! Both tokens are HS256 JWTs signed with separate secrets. Access tokens
//! are stateless and short-lived. Refresh tokens are long-lived and the most
//! recent one per user is kept in the cache under `refresh_token:{user_id}`;
//! a refresh token is only honoured while it matches that entry, so logout
//! (or a newer login) revokes it.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use cartwheel_core::UserId;

use super::AuthError;
use crate::cache::KvCache;
use crate::config::TokenConfig;
use crate::models::session::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};

/// Claims carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID, as a string per RFC 7519.
    pub sub: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Unique token ID; only set on refresh tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    fn new(user_id: UserId, ttl: std::time::Duration, jti: Option<String>) -> Self {
        let iat = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            sub: user_id.to_string(),
            iat,
            exp: iat.saturating_add(ttl_secs),
            jti,
        }
    }

    /// The user this token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidAccessToken` if `sub` is not a user ID.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::InvalidAccessToken)
    }
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Cache key holding the current refresh token of a user.
#[must_use]
pub fn refresh_token_key(user_id: UserId) -> String {
    format!("refresh_token:{user_id}")
}

/// Issues, verifies and revokes session tokens.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    validation: Validation,
    cache: KvCache,
}

impl TokenService {
    /// Create a token service signing with the configured secrets.
    #[must_use]
    pub fn new(config: &TokenConfig, cache: KvCache) -> Self {
        let access = config.access_secret.expose_secret().as_bytes();
        let refresh = config.refresh_secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access_encoding: EncodingKey::from_secret(access),
            access_decoding: DecodingKey::from_secret(access),
            refresh_encoding: EncodingKey::from_secret(refresh),
            refresh_decoding: DecodingKey::from_secret(refresh),
            validation,
            cache,
        }
    }

    /// Issue a new access token and a new, unique refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if encoding fails.
    pub fn issue_token_pair(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        let access = self.issue_access(user_id)?;
        let claims = Claims::new(
            user_id,
            REFRESH_TOKEN_TTL,
            Some(Uuid::new_v4().simple().to_string()),
        );
        let refresh =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)?;
        Ok(TokenPair { access, refresh })
    }

    fn issue_access(&self, user_id: UserId) -> Result<String, AuthError> {
        let claims = Claims::new(user_id, ACCESS_TOKEN_TTL, None);
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.access_encoding,
        )?)
    }

    /// Record `refresh` as the current refresh token of `user_id` for seven days.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Cache` if the write fails.
    #[instrument(skip(self, refresh))]
    pub async fn persist_refresh(&self, user_id: UserId, refresh: &str) -> Result<(), AuthError> {
        self.cache
            .set_ex(&refresh_token_key(user_id), refresh, REFRESH_TOKEN_TTL)
            .await?;
        Ok(())
    }

    /// Exchange a valid refresh token for a new access token.
    ///
    /// The refresh token itself and its cache entry are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRefreshToken` if the token fails
    /// verification or is not the one on record for its user.
    #[instrument(skip_all)]
    pub async fn rotate_access(&self, refresh: &str) -> Result<String, AuthError> {
        let claims = self.verify_refresh(refresh)?;
        let user_id = claims
            .user_id()
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let stored = self.cache.get(&refresh_token_key(user_id)).await?;
        if stored.as_deref() != Some(refresh) {
            tracing::debug!(%user_id, "refresh token does not match stored token");
            return Err(AuthError::InvalidRefreshToken);
        }

        self.issue_access(user_id)
    }

    /// Delete the stored refresh token of a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Cache` if the delete fails.
    #[instrument(skip(self))]
    pub async fn revoke(&self, user_id: UserId) -> Result<(), AuthError> {
        self.cache.delete(&refresh_token_key(user_id)).await?;
        Ok(())
    }

    /// Revoke the session a refresh token belongs to.
    ///
    /// Returns the user whose session was revoked, or `None` when the token
    /// does not verify (there is nothing to revoke).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Cache` if the delete fails.
    pub async fn revoke_refresh(&self, refresh: &str) -> Result<Option<UserId>, AuthError> {
        let Ok(user_id) = self.verify_refresh(refresh).and_then(|c| c.user_id()) else {
            return Ok(None);
        };
        self.revoke(user_id).await?;
        Ok(Some(user_id))
    }

    /// Verify an access token's signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccessTokenExpired` for an expired but otherwise
    /// valid token, and `AuthError::InvalidAccessToken` for anything else.
    pub fn verify_access(&self, access: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(access, &self.access_decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::AccessTokenExpired,
                _ => AuthError::InvalidAccessToken,
            })
    }

    fn verify_refresh(&self, refresh: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(refresh, &self.refresh_decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidRefreshToken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn service() -> (TokenService, KvCache) {
        let cache = KvCache::memory();
        let config = TokenConfig {
            access_secret: SecretString::from("access-0123456789abcdefghijklmnopqrstuv"),
            refresh_secret: SecretString::from("refresh-0123456789abcdefghijklmnopqrstu"),
        };
        (TokenService::new(&config, cache.clone()), cache)
    }

    fn sign_access(service: &TokenService, claims: &Claims) -> String {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &service.access_encoding)
            .unwrap()
    }

    #[test]
    fn test_access_token_round_trip() {
        let (tokens, _) = service();
        let pair = tokens.issue_token_pair(UserId::new(42)).unwrap();

        let claims = tokens.verify_access(&pair.access).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert!(claims.jti.is_none());
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let (tokens, _) = service();
        let first = tokens.issue_token_pair(UserId::new(1)).unwrap();
        let second = tokens.issue_token_pair(UserId::new(1)).unwrap();
        assert_ne!(first.refresh, second.refresh);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let (tokens, _) = service();
        let pair = tokens.issue_token_pair(UserId::new(1)).unwrap();
        assert!(matches!(
            tokens.verify_access(&pair.refresh),
            Err(AuthError::InvalidAccessToken)
        ));
    }

    #[test]
    fn test_expired_access_token() {
        let (tokens, _) = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "1".to_string(),
            iat: now - 3600,
            exp: now - 60,
            jti: None,
        };
        let token = sign_access(&tokens, &claims);
        assert!(matches!(
            tokens.verify_access(&token),
            Err(AuthError::AccessTokenExpired)
        ));
    }

    #[test]
    fn test_garbage_access_token() {
        let (tokens, _) = service();
        assert!(matches!(
            tokens.verify_access("not.a.jwt"),
            Err(AuthError::InvalidAccessToken)
        ));
    }

    #[tokio::test]
    async fn test_rotate_access_keeps_refresh_token() {
        let (tokens, cache) = service();
        let user = UserId::new(9);
        let pair = tokens.issue_token_pair(user).unwrap();
        tokens.persist_refresh(user, &pair.refresh).await.unwrap();

        let access = tokens.rotate_access(&pair.refresh).await.unwrap();
        let claims = tokens.verify_access(&access).unwrap();
        assert_eq!(claims.user_id().unwrap(), user);

        let stored = cache.get(&refresh_token_key(user)).await.unwrap();
        assert_eq!(stored.as_deref(), Some(pair.refresh.as_str()));
    }

    #[tokio::test]
    async fn test_rotate_access_rejects_superseded_token() {
        let (tokens, _) = service();
        let user = UserId::new(9);
        let old = tokens.issue_token_pair(user).unwrap();
        let new = tokens.issue_token_pair(user).unwrap();
        tokens.persist_refresh(user, &new.refresh).await.unwrap();

        assert!(matches!(
            tokens.rotate_access(&old.refresh).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_revoke_refresh_invalidates_session() {
        let (tokens, _) = service();
        let user = UserId::new(3);
        let pair = tokens.issue_token_pair(user).unwrap();
        tokens.persist_refresh(user, &pair.refresh).await.unwrap();

        assert_eq!(tokens.revoke_refresh(&pair.refresh).await.unwrap(), Some(user));
        assert!(matches!(
            tokens.rotate_access(&pair.refresh).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert_eq!(tokens.revoke_refresh("garbage").await.unwrap(), None);
    }
}

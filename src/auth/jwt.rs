use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, error::AppError};

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("unexpected token kind")]
    WrongKind,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(inner) => AppError::Internal(anyhow::Error::new(inner)),
            TokenError::Expired => AppError::unauthenticated("Token has expired"),
            TokenError::Invalid | TokenError::WrongKind => {
                AppError::unauthenticated("Could not validate credentials")
            }
        }
    }
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub verification_ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::seconds(cfg.ttl_seconds),
            refresh_ttl: Duration::seconds(cfg.refresh_ttl_seconds),
            verification_ttl: Duration::seconds(cfg.verification_ttl_seconds),
        }
    }

    pub fn create_token(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.create_token_at(subject, kind, OffsetDateTime::now_utc(), ttl)
    }

    fn create_token_at(
        &self,
        subject: &str,
        kind: TokenKind,
        issued_at: OffsetDateTime,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4().to_string(),
            kind,
        };
        let token =
            encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(TokenError::Signing)?;
        debug!(kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn create_access_token(&self, subject: &str) -> Result<String, TokenError> {
        self.create_token(subject, TokenKind::Access, self.access_ttl)
    }

    pub fn create_refresh_token(&self, subject: &str) -> Result<String, TokenError> {
        self.create_token(subject, TokenKind::Refresh, self.refresh_ttl)
    }

    pub fn create_verification_token(&self, subject: &str) -> Result<String, TokenError> {
        self.create_token(subject, TokenKind::EmailVerification, self.verification_ttl)
    }

    /// Checks signature, issuer, audience and expiry (no leeway).
    pub fn decode_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn decode_kind(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.decode_token(token)?;
        if claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_seconds: 300,
            refresh_ttl_seconds: 3600,
            verification_ttl_seconds: 3600,
        })
    }

    #[test]
    fn sign_and_decode_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let token = keys.create_access_token("ann@example.com").expect("sign access");
        let claims = keys.decode_token(&token).expect("decode token");
        assert_eq!(claims.sub, "ann@example.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn refresh_tokens_are_unique_per_issue() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let a = keys.create_refresh_token("ann@example.com").unwrap();
        let b = keys.create_refresh_token("ann@example.com").unwrap();
        assert_ne!(a, b);
        let claims = keys.decode_kind(&a, TokenKind::Refresh).expect("decode refresh");
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn decode_kind_rejects_other_kinds() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let access = keys.create_access_token("ann@example.com").unwrap();
        assert!(matches!(
            keys.decode_kind(&access, TokenKind::Refresh),
            Err(TokenError::WrongKind)
        ));
        let verification = keys.create_verification_token("ann@example.com").unwrap();
        assert!(matches!(
            keys.decode_kind(&verification, TokenKind::Access),
            Err(TokenError::WrongKind)
        ));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - Duration::seconds(120);
        let token = keys
            .create_token_at("ann@example.com", TokenKind::Access, issued, Duration::seconds(60))
            .unwrap();
        assert!(matches!(keys.decode_token(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn token_within_ttl_is_accepted() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - Duration::seconds(30);
        let token = keys
            .create_token_at("ann@example.com", TokenKind::Access, issued, Duration::seconds(600))
            .unwrap();
        assert!(keys.decode_token(&token).is_ok());
    }

    #[test]
    fn bad_signature_is_invalid() {
        let good = make_keys("secret-a", "iss", "aud");
        let bad = make_keys("secret-b", "iss", "aud");
        let token = good.create_access_token("ann@example.com").unwrap();
        assert!(matches!(bad.decode_token(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn wrong_issuer_or_audience_is_invalid() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.create_access_token("ann@example.com").unwrap();
        assert!(matches!(bad.decode_token(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn garbage_is_invalid() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(matches!(keys.decode_token("not.a.jwt"), Err(TokenError::Invalid)));
    }

    #[test]
    fn token_errors_map_to_unauthenticated() {
        assert_eq!(
            AppError::from(TokenError::Expired).status(),
            axum::http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(TokenError::WrongKind).status(),
            axum::http::StatusCode::UNAUTHORIZED
        );
    }
}

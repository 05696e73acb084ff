//! HS256 bearer tokens for clients of a JWT-protected MCP deployment.

use crate::error::{ClientError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_ISSUER: &str = "https://example.com/";
pub const DEFAULT_AUDIENCE: &str = "my-mcp-server";
pub const DEFAULT_SUBJECT: &str = "user123";
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone)]
pub struct TokenOptions {
    pub issuer: String,
    pub audience: String,
    pub subject: String,
    pub ttl: Duration,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            ttl: DEFAULT_TTL,
        }
    }
}

impl Claims {
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if `iat + ttl` does not fit in a `u64`.
    pub fn issued_at(options: &TokenOptions, iat: u64) -> Result<Self> {
        let exp = iat.checked_add(options.ttl.as_secs()).ok_or_else(|| {
            ClientError::Config(format!(
                "token lifetime of {}s overflows the expiry timestamp",
                options.ttl.as_secs()
            ))
        })?;
        Ok(Self {
            iss: options.issuer.clone(),
            aud: options.audience.clone(),
            sub: options.subject.clone(),
            iat,
            exp,
        })
    }
}

/// Sign a token issued now.
///
/// # Errors
///
/// Returns [`ClientError::Config`] if `secret` is empty, the lifetime overflows, or signing fails.
pub fn generate_token(secret: &str, options: &TokenOptions) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ClientError::Config(format!("system clock before UNIX epoch: {e}")))?
        .as_secs();
    encode_claims(secret, &Claims::issued_at(options, now)?)
}

/// # Errors
///
/// Returns [`ClientError::Config`] if `secret` is empty or signing fails.
pub fn encode_claims(secret: &str, claims: &Claims) -> Result<String> {
    if secret.is_empty() {
        return Err(ClientError::Config("JWT signing secret must not be empty".into()));
    }
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ClientError::Config(format!("failed to sign token: {e}")))
}

/// Verify signature, expiry, issuer and audience.
///
/// # Errors
///
/// Returns [`ClientError::Authentication`] if any check fails.
pub fn verify_token(token: &str, secret: &str, issuer: &str, audience: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| ClientError::Authentication(format!("invalid token: {e}")))?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_with_same_secret() {
        let options = TokenOptions {
            subject: "curator".into(),
            ttl: Duration::from_secs(600),
            ..TokenOptions::default()
        };
        let token = generate_token("s3cret", &options).unwrap();
        let claims = verify_token(&token, "s3cret", DEFAULT_ISSUER, DEFAULT_AUDIENCE).unwrap();
        assert_eq!(claims.sub, "curator");
        assert_eq!(claims.exp - claims.iat, 600);

        assert!(verify_token(&token, "other", DEFAULT_ISSUER, DEFAULT_AUDIENCE).is_err());
        assert!(verify_token(&token, "s3cret", DEFAULT_ISSUER, "someone-else").is_err());
    }

    #[test]
    fn claims_expiry_is_iat_plus_ttl() {
        let claims = Claims::issued_at(&TokenOptions::default(), 1_700_000_000).unwrap();
        assert_eq!(claims.exp, 1_700_003_600);
        assert_eq!(claims.iss, DEFAULT_ISSUER);
        assert_eq!(claims.aud, DEFAULT_AUDIENCE);
    }

    #[test]
    fn oversized_ttl_is_a_config_error() {
        let options = TokenOptions {
            ttl: Duration::from_secs(u64::MAX),
            ..TokenOptions::default()
        };
        assert!(matches!(
            Claims::issued_at(&options, 1_700_000_000),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            generate_token("s3cret", &options),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            generate_token("", &TokenOptions::default()),
            Err(ClientError::Config(_))
        ));
    }
}

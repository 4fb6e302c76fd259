//! # JWT Token Management
//!
//! Bearer tokens carry the whole `Principal`: roles, permissions and shop
//! memberships travel in the claims, so validation never touches storage.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};
use super::principal::Principal;

/// JWT claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub permissions: Vec<String>,

    /// Retail shop ids the user belongs to
    #[serde(default)]
    pub shops: Vec<String>,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,

    pub aud: String,

    pub iss: String,
}

impl JwtClaims {
    pub fn into_principal(self) -> Principal {
        let mut principal = Principal::authenticated(self.sub);
        for role in self.roles {
            principal = principal.with_role(role);
        }
        for permission in self.permissions {
            principal = principal.with_permission(permission);
        }
        for shop in self.shops {
            principal = principal.with_shop(shop);
        }
        principal
    }
}

/// JWT configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for signing (256-bit minimum recommended)
    #[serde(default = "default_secret")]
    pub secret: String,

    #[serde(default = "default_issuer")]
    pub issuer: String,

    #[serde(default = "default_issuer")]
    pub audience: String,

    /// Access token lifetime
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
}

fn default_secret() -> String {
    "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string()
}

fn default_issuer() -> String {
    "retailpos".to_string()
}

fn default_ttl_minutes() -> i64 {
    60
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            issuer: default_issuer(),
            audience: default_issuer(),
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue an access token for an authenticated principal
    pub fn issue(&self, principal: &Principal) -> AuthResult<String> {
        let sub = principal
            .user_id
            .clone()
            .ok_or(AuthError::AuthenticationRequired)?;
        let now = Utc::now();
        let exp = now + Duration::minutes(self.config.ttl_minutes);

        let claims = JwtClaims {
            sub,
            roles: principal.roles.iter().cloned().collect(),
            permissions: principal.permissions.iter().cloned().collect(),
            shops: principal.retail_shop_ids.iter().cloned().collect(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Validate an access token and extract claims
    pub fn validate_token(&self, token: &str) -> AuthResult<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);

        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::MalformedToken,
                }
            })?;

        Ok(token_data.claims)
    }

    /// Validate a token and rebuild the principal it was issued for
    pub fn validate(&self, token: &str) -> AuthResult<Principal> {
        self.validate_token(token).map(JwtClaims::into_principal)
    }
}

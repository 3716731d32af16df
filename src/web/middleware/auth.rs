//! JWT authentication middleware.
//!
//! Session tokens are minted by the identity provider with the shared
//! secret; the `jti` claim identifies the session that unlock tokens are
//! scoped to.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Principal;
use crate::datetime::from_unix_seconds;
use crate::web::error::ApiError;
use crate::{Result, ShareboxError};

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    /// Username.
    pub username: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// JWT ID; doubles as the session id.
    pub jti: String,
}

impl JwtClaims {
    /// The principal these claims describe.
    pub fn principal(&self) -> Option<Principal> {
        let expires_at = from_unix_seconds(self.exp)?;
        Some(Principal::new(
            self.sub,
            self.username.clone(),
            self.jti.clone(),
            expires_at,
        ))
    }
}

/// Application state for JWT authentication.
#[derive(Clone)]
pub struct JwtState {
    /// Encoding key for minting tokens.
    pub encoding_key: EncodingKey,
    /// Decoding key for JWT verification.
    pub decoding_key: DecodingKey,
    /// Validation settings.
    pub validation: Validation,
}

impl JwtState {
    /// Create a new JWT state from a secret key.
    pub fn new(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key,
            validation,
        }
    }

    /// Mint a session token for a user, valid for `ttl`.
    pub fn issue(&self, user_id: i64, username: &str, ttl: Duration) -> Result<String> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = JwtClaims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: now + ttl.as_secs(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ShareboxError::Auth(format!("failed to issue token: {e}")))
    }

    /// Validate a token and return its claims.
    pub fn verify(&self, token: &str) -> std::result::Result<JwtClaims, ApiError> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                ApiError::unauthorized("Invalid or expired token")
            })
    }
}

/// Extractor for authenticated users.
///
/// Accepts `Authorization: Bearer <token>`, or a `token` query parameter
/// for elements such as `<video>` and `<img>` that cannot set headers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|header| header.strip_prefix("Bearer "))
                .map(|t| t.to_string());

            let token = match token {
                Some(t) => t,
                None => token_from_query(parts.uri.query().unwrap_or(""))
                    .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?,
            };

            let jwt_state = parts
                .extensions
                .get::<Arc<JwtState>>()
                .ok_or_else(|| ApiError::internal("JWT state not configured"))?;

            let claims = jwt_state.verify(&token)?;
            let principal = claims
                .principal()
                .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

            Ok(AuthUser(principal))
        })
    }
}

fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "token" {
            urlencoding::decode(value).ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

/// Middleware function to inject JWT state into request extensions.
pub async fn jwt_auth(
    jwt_state: Arc<JwtState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(jwt_state);
    next.run(request).await
}

/*!
 * # Authentication and Authorization Module
 *
 * Bearer-token authentication for the storefront API. Tokens are HS256 JWTs
 * issued by the account service; this crate only verifies them. The verified
 * subject is the buyer of recorded orders and the owner of a wishlist.
 *
 * Role checks are layered on top of authentication with [`AuthRouterExt`].
 */

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::errors::ServiceError;

/// Role required by administrative routes.
pub const ADMIN_ROLE: &str = "admin";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID); older tokens carry it as `_id`
    #[serde(alias = "_id")]
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of tokens minted by [`AuthService::generate_token`]
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            token_expiration,
        }
    }
}

/// Verifies (and, for tooling and tests, mints) access tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Mint an access token for `subject` with the given roles.
    pub fn generate_token(&self, subject: &str, roles: &[&str]) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            name: None,
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization token is required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin access required")]
    AdminRequired,

    #[error("Role '{0}' required")]
    RoleRequired(String),

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => {
                ServiceError::Unauthorized(err.to_string())
            }
            AuthError::AdminRequired | AuthError::RoleRequired(_) => {
                ServiceError::Forbidden(err.to_string())
            }
            AuthError::TokenCreation(_) | AuthError::ServiceUnavailable => {
                ServiceError::InternalError(err.to_string())
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingToken)?;

    if !user.has_role(&required_role) {
        debug!(user_id = %user.user_id, role = %required_role, "role check failed");
        return Err(if required_role == ADMIN_ROLE {
            AuthError::AdminRequired
        } else {
            AuthError::RoleRequired(required_role)
        });
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates auth tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => return AuthError::ServiceUnavailable.into_response(),
    };

    match authenticate(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn authenticate(headers: &HeaderMap, auth_service: &AuthService) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
    auth_service.validate_token(token).map(AuthUser::from)
}

/// Accepts `Bearer <token>` as well as a bare token.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match raw.get(..6) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => raw[6..].trim(),
        _ => raw,
    };
    (!token.is_empty()).then_some(token)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_role(self, role: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            role.to_string(),
            role_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "k3y-for-unit-tests-8f2a9c1d7e4b6053a".into(),
            Duration::from_secs(600),
        ))
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn minted_tokens_round_trip_through_validation() {
        let svc = service();
        let token = svc.generate_token("user-1", &[ADMIN_ROLE]).unwrap();
        let user = authenticate(&headers(&format!("Bearer {token}")), &svc).unwrap();
        assert_eq!(user.user_id, "user-1");
        assert!(user.is_admin());
    }

    #[test]
    fn bare_tokens_are_accepted() {
        let svc = service();
        let token = svc.generate_token("user-2", &[]).unwrap();
        let user = authenticate(&headers(&token), &svc).unwrap();
        assert_eq!(user.user_id, "user-2");
        assert!(!user.is_admin());
    }

    #[test]
    fn legacy_id_claim_is_read_as_subject() {
        let claims: Claims =
            serde_json::from_str(r#"{"_id":"abc","exp":4102444800}"#).unwrap();
        assert_eq!(claims.sub, "abc");
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn missing_and_foreign_tokens_are_rejected() {
        let svc = service();
        assert!(matches!(
            authenticate(&HeaderMap::new(), &svc),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            authenticate(&headers("Bearer "), &svc),
            Err(AuthError::MissingToken)
        ));

        let other = AuthService::new(AuthConfig::new(
            "another-secret-entirely-0f9e8d7c6b5a4".into(),
            Duration::from_secs(600),
        ));
        let token = other.generate_token("user-3", &[]).unwrap();
        assert!(matches!(
            authenticate(&headers(&format!("Bearer {token}")), &svc),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn auth_errors_map_to_http_statuses() {
        use axum::http::StatusCode;
        assert_eq!(
            ServiceError::from(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::AdminRequired).status_code(),
            StatusCode::FORBIDDEN
        );
    }
}

//! Bearer-token authentication and role gating.
//!
//! Tokens are HS256 JWTs carrying `sub` and `role`. A [`RoleGate`] layered
//! on a route group verifies the token, checks the role and stores the
//! [`Caller`] in request extensions for downstream handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Operator,
    #[serde(alias = "User", alias = "Viewer")]
    Citizen,
}

impl Role {
    pub const ANY: &'static [Role] = &[];
    pub const STAFF: &'static [Role] = &[Role::Admin, Role::Operator];
    pub const ADMIN: &'static [Role] = &[Role::Admin];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: u64,
}

/// The authenticated principal of a request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub subject: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No token, authorization denied")]
    MissingToken,

    #[error("Token is not valid")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Access denied: insufficient role")]
    InsufficientRole,

    #[error("Failed to issue token: {0}")]
    Issue(#[source] jsonwebtoken::errors::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken(_) => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::InsufficientRole => ApiError::Forbidden(err.to_string()),
            AuthError::Issue(_) => ApiError::Internal(err.to_string()),
        }
    }
}

/// Verifies and issues HS256 tokens with a shared secret.
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }

    /// Issue a token valid for `ttl`.
    pub fn issue(&self, subject: &str, role: Role, ttl: Duration) -> Result<String, AuthError> {
        let exp = OffsetDateTime::now_utc().unix_timestamp() as u64 + ttl.as_secs();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Issue)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Role policy for one route group.
#[derive(Clone)]
pub struct RoleGate {
    verifier: Arc<JwtVerifier>,
    allowed: &'static [Role],
}

impl RoleGate {
    /// `allowed` empty means any authenticated caller.
    pub fn new(verifier: Arc<JwtVerifier>, allowed: &'static [Role]) -> Self {
        Self { verifier, allowed }
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<Caller, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        let claims = self.verifier.verify(token)?;
        if !self.allowed.is_empty() && !self.allowed.contains(&claims.role) {
            return Err(AuthError::InsufficientRole);
        }
        Ok(Caller {
            subject: claims.sub,
            role: claims.role,
        })
    }
}

/// Middleware entry point, used with `axum::middleware::from_fn_with_state`.
pub async fn require_role(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = gate.authorize(req.headers()).map_err(|e| {
        tracing::debug!(error = %e, path = %req.uri().path(), "request rejected by auth gate");
        ApiError::from(e)
    })?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_issue_then_verify() {
        let verifier = JwtVerifier::new("secret");
        let token = verifier
            .issue("ops-1", Role::Operator, Duration::from_secs(60))
            .unwrap();
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "ops-1");
        assert_eq!(claims.role, Role::Operator);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = JwtVerifier::new("a")
            .issue("x", Role::Admin, Duration::from_secs(60))
            .unwrap();
        assert!(matches!(
            JwtVerifier::new("b").verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_gate_roles() {
        let verifier = Arc::new(JwtVerifier::new("secret"));
        let staff = RoleGate::new(verifier.clone(), Role::STAFF);
        let any = RoleGate::new(verifier.clone(), Role::ANY);

        let citizen = verifier
            .issue("c", Role::Citizen, Duration::from_secs(60))
            .unwrap();
        let admin = verifier
            .issue("a", Role::Admin, Duration::from_secs(60))
            .unwrap();

        assert!(matches!(
            staff.authorize(&headers(&citizen)),
            Err(AuthError::InsufficientRole)
        ));
        assert_eq!(staff.authorize(&headers(&admin)).unwrap().role, Role::Admin);
        assert_eq!(any.authorize(&headers(&citizen)).unwrap().subject, "c");
        assert!(matches!(
            any.authorize(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn test_legacy_role_names() {
        let role: Role = serde_json::from_str("\"User\"").unwrap();
        assert_eq!(role, Role::Citizen);
    }

    #[test]
    fn test_error_statuses() {
        use axum::http::StatusCode;
        assert_eq!(
            ApiError::from(AuthError::MissingToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::InsufficientRole).status(),
            StatusCode::FORBIDDEN
        );
    }
}

//! Player authentication: credential lookup and JWT verification

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::game::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Cookie set by the web client after login
pub const AUTH_COOKIE: &str = "jwt_token";

/// Resolves a bearer credential to the user it was issued for
pub trait IdentityResolver: Send + Sync {
    fn resolve_user_id(&self, credential: &str) -> Result<UserId, AuthError>;
}

/// JWT claims issued by the auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject; either a number or a numeric string
    #[serde(default)]
    pub sub: Option<Value>,
    /// Fallback user id claim
    #[serde(default)]
    pub user_id: Option<Value>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
}

impl JwtClaims {
    /// User id from `sub`, falling back to `user_id`
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .as_ref()
            .or(self.user_id.as_ref())
            .and_then(numeric_id)
            .ok_or(AuthError::InvalidSubject)
    }
}

fn numeric_id(value: &Value) -> Option<UserId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Verify an HS256 JWT and extract its claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken);
    };

    let message = format!("{}.{}", header_b64, payload_b64);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());

    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    mac.verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    let claims: JwtClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    if claims.exp < now {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Extract JWT from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Pick the credential to use: bearer header, then cookie, then query
pub fn select_credential<'a>(
    bearer: Option<&'a str>,
    cookie: Option<&'a str>,
    query: Option<&'a str>,
) -> Result<&'a str, AuthError> {
    [bearer, cookie, query]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|c| !c.is_empty())
        .ok_or(AuthError::MissingCredential)
}

/// Production resolver backed by a shared HMAC secret
pub struct JwtIdentity {
    secret: String,
}

impl JwtIdentity {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl IdentityResolver for JwtIdentity {
    fn resolve_user_id(&self, credential: &str) -> Result<UserId, AuthError> {
        let token = extract_bearer_token(credential).unwrap_or(credential);
        verify_jwt(token, &self.secret)?.user_id()
    }
}

/// Authentication error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token carries no usable user id")]
    InvalidSubject,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn sign(payload: Value, secret: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{header}.{payload}").as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{header}.{payload}.{signature}")
    }

    fn far_future() -> u64 {
        4_102_444_800 // 2100-01-01
    }

    #[test]
    fn test_numeric_and_string_subjects() {
        let identity = JwtIdentity::new(SECRET);

        let numeric = sign(serde_json::json!({ "sub": 42, "exp": far_future() }), SECRET);
        assert_eq!(identity.resolve_user_id(&numeric), Ok(42));

        let string = sign(serde_json::json!({ "sub": "17", "exp": far_future() }), SECRET);
        assert_eq!(identity.resolve_user_id(&string), Ok(17));

        let fallback = sign(serde_json::json!({ "user_id": 5, "exp": far_future() }), SECRET);
        assert_eq!(identity.resolve_user_id(&fallback), Ok(5));
    }

    #[test]
    fn test_bearer_prefix_is_accepted() {
        let identity = JwtIdentity::new(SECRET);
        let token = sign(serde_json::json!({ "sub": 3, "exp": far_future() }), SECRET);
        assert_eq!(identity.resolve_user_id(&format!("Bearer {token}")), Ok(3));
    }

    #[test]
    fn test_rejections() {
        let identity = JwtIdentity::new(SECRET);

        let wrong_key = sign(serde_json::json!({ "sub": 1, "exp": far_future() }), "other");
        assert_eq!(identity.resolve_user_id(&wrong_key), Err(AuthError::InvalidToken));

        let expired = sign(serde_json::json!({ "sub": 1, "exp": 1 }), SECRET);
        assert_eq!(identity.resolve_user_id(&expired), Err(AuthError::TokenExpired));

        let no_subject = sign(serde_json::json!({ "sub": "alice", "exp": far_future() }), SECRET);
        assert_eq!(identity.resolve_user_id(&no_subject), Err(AuthError::InvalidSubject));

        assert_eq!(identity.resolve_user_id("not-a-jwt"), Err(AuthError::InvalidToken));
        assert_eq!(identity.resolve_user_id("a.b.c.d"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_credential_precedence() {
        assert_eq!(select_credential(Some("h"), Some("c"), Some("q")), Ok("h"));
        assert_eq!(select_credential(None, Some("c"), Some("q")), Ok("c"));
        assert_eq!(select_credential(Some(" "), None, Some("q")), Ok("q"));
        assert_eq!(
            select_credential(None, None, None),
            Err(AuthError::MissingCredential)
        );
    }
}

//! Principal resolution for inbound callbacks
//!
//! A caller may present an HS256 JWT; a valid one names the user that owns the
//! session. Authentication is not a dispatch gate, so a missing or invalid
//! token only makes the request anonymous.

use anyhow::Result;
use http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use apigw_ws_common::utils::header_value;

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub exp: usize,  // Expiration time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>, // Issued at
}

/// Extract a bearer token
/// Checks (in order): Authorization header, `token` query parameter
fn extract_token<'a>(headers: &'a HeaderMap, query: &'a HashMap<String, String>) -> Option<&'a str> {
    if let Some(token) = header_value(headers, "Authorization").and_then(|s| s.strip_prefix("Bearer ")) {
        debug!("Token extracted from Authorization header");
        return Some(token);
    }

    if let Some(token) = query.get("token") {
        warn!("Token extracted from query parameter (consider using Authorization header)");
        return Some(token.as_str());
    }

    None
}

/// Validate an HS256 JWT
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Resolve the user ID behind a request, if any
///
/// Always `None` when no secret is configured.
pub fn resolve_principal(
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    secret: Option<&str>,
) -> Option<String> {
    let secret = secret?;
    let token = extract_token(headers, query)?;

    match validate_token(token, secret) {
        Ok(claims) => {
            debug!("Token validated for user: {}", claims.sub);
            Some(claims.sub)
        }
        Err(e) => {
            warn!("Token validation failed, treating request as anonymous: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, offset: chrono::Duration) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now() + offset).timestamp() as usize,
            iat: Some(chrono::Utc::now().timestamp() as usize),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_create_and_validate_token() {
        let token = token("user123", chrono::Duration::hours(1));

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.sub, "user123");
    }

    #[test]
    fn test_expired_token() {
        let token = token("user123", -chrono::Duration::hours(1));

        assert!(validate_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_principal_from_header() {
        let headers = bearer(&token("user-1", chrono::Duration::hours(1)));

        assert_eq!(
            resolve_principal(&headers, &HashMap::new(), Some(SECRET)),
            Some("user-1".to_string())
        );
    }

    #[test]
    fn test_principal_from_query() {
        let query = HashMap::from([(
            "token".to_string(),
            token("user-2", chrono::Duration::hours(1)),
        )]);

        assert_eq!(
            resolve_principal(&HeaderMap::new(), &query, Some(SECRET)),
            Some("user-2".to_string())
        );
    }

    #[test]
    fn test_invalid_token_is_anonymous() {
        let headers = bearer("not-a-jwt");
        assert_eq!(resolve_principal(&headers, &HashMap::new(), Some(SECRET)), None);

        let headers = bearer(&token("user-1", chrono::Duration::hours(1)));
        assert_eq!(resolve_principal(&headers, &HashMap::new(), Some("other")), None);
    }

    #[test]
    fn test_no_secret_is_anonymous() {
        let headers = bearer(&token("user-1", chrono::Duration::hours(1)));
        assert_eq!(resolve_principal(&headers, &HashMap::new(), None), None);
    }
}

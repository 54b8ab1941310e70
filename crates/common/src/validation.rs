//! Request validation predicates
//!
//! Every check here is a pure function over the headers of a proxied callback.
//! They never fail; a missing header simply makes the predicate return false.

use http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::constants::{ADDITIONAL_REQUIRED_HEADERS, CONNECTION_HEADERS, REQUIRED_HEADERS};
use crate::utils::header_value;

/// Regex for validating connection IDs (AWS API Gateway format)
static CONNECTION_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_=-]{1,128}$").unwrap());

/// Regex for validating additional route keys
static ROUTE_KEY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid connection ID format: {0}")]
    InvalidConnectionId(String),

    #[error("Invalid route key format: {0}")]
    InvalidRouteKey(String),
}

/// Header names a callback must carry
///
/// `required` and `additional` are kept apart so either list can be replaced on
/// its own; both are always enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRequirements {
    pub required: Vec<String>,
    pub additional: Vec<String>,
    /// Only enforced on the `connect` route
    pub connection: Vec<String>,
}

impl Default for HeaderRequirements {
    fn default() -> Self {
        fn owned(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }

        Self {
            required: owned(REQUIRED_HEADERS),
            additional: owned(ADDITIONAL_REQUIRED_HEADERS),
            connection: owned(CONNECTION_HEADERS),
        }
    }
}

/// Names from `names` that are absent from `headers`
pub fn missing_headers<'a>(headers: &HeaderMap, names: &'a [String]) -> Vec<&'a str> {
    names
        .iter()
        .map(String::as_str)
        .filter(|name| !headers.contains_key(*name))
        .collect()
}

/// True iff every required and additional header is present, whatever its value
pub fn has_required_headers(headers: &HeaderMap, requirements: &HeaderRequirements) -> bool {
    missing_headers(headers, &requirements.required).is_empty()
        && missing_headers(headers, &requirements.additional).is_empty()
}

/// True iff every WebSocket handshake header is present
pub fn has_connection_headers(headers: &HeaderMap, requirements: &HeaderRequirements) -> bool {
    missing_headers(headers, &requirements.connection).is_empty()
}

/// An empty allow-list allows every host
pub fn host_allowed(headers: &HeaderMap, allowed_hosts: &[String]) -> bool {
    if allowed_hosts.is_empty() {
        return true;
    }

    header_value(headers, "Host").is_some_and(|host| allowed_hosts.iter().any(|h| h == host))
}

/// Host must appear verbatim inside Origin (which also carries the scheme)
pub fn host_in_origin(headers: &HeaderMap) -> bool {
    match (header_value(headers, "Host"), header_value(headers, "Origin")) {
        (Some(host), Some(origin)) => origin.contains(host),
        _ => false,
    }
}

/// User-Agent check for every route except `connect`
///
/// With a fixed gateway ID, the gateway's own signature `{prefix}{id}` is
/// reserved for its connect call and rejected here. Without one, the agent must
/// contain the prefix somewhere.
pub fn useragent_expected(headers: &HeaderMap, expected_api_id: Option<&str>, prefix: &str) -> bool {
    let Some(useragent) = header_value(headers, "User-Agent") else {
        return false;
    };

    match expected_api_id {
        Some(api_id) => useragent != format!("{}{}", prefix, api_id),
        None => useragent.contains(prefix),
    }
}

/// Validate connection ID format
pub fn validate_connection_id(id: &str) -> Result<(), ValidationError> {
    if !CONNECTION_ID_REGEX.is_match(id) {
        return Err(ValidationError::InvalidConnectionId(
            id.chars().take(50).collect::<String>(), // Limit error message
        ));
    }
    Ok(())
}

/// Validate an additional route key
pub fn validate_route_key(key: &str) -> Result<(), ValidationError> {
    if !ROUTE_KEY_REGEX.is_match(key) {
        return Err(ValidationError::InvalidRouteKey(
            key.chars().take(50).collect::<String>(),
        ));
    }
    Ok(())
}

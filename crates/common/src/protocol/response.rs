use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};

/// Response returned to API Gateway for a proxied event
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code (200, 400, 405, etc.)
    pub status_code: u16,

    pub headers: HeaderMap,

    pub body: String,
}

impl HttpResponse {
    /// Create a response with a plain text body
    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self {
            status_code,
            headers,
            body: body.into(),
        }
    }

    /// Create a JSON response
    pub fn json(status_code: u16, value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status_code,
            headers,
            body: value.to_string(),
        }
    }

    /// 200 with an empty JSON object
    pub fn empty_json() -> Self {
        Self::json(200, &serde_json::json!({}))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::text(400, message)
    }

    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let mut response = Self::text(405, "Method not allowed");
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers.insert(ALLOW, value);
        }
        response
    }

    /// Check if the response is successful (2xx status code)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Check if the response is a client error (4xx status code)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }
}

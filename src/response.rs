//! Response builders shared by every endpoint.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

/// Response type produced by all handlers
pub type HttpResponse = Response<Full<Bytes>>;

/// Acknowledgment body returned by the echo-style endpoints
pub const GOT_IT: &str = "got it\n";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// Build a plain text response.
pub fn text(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    with_body(status, TEXT_PLAIN, body.into())
}

/// Build a `{"error": message}` JSON response.
pub fn json_error(status: StatusCode, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": message }).to_string();
    with_body(status, APPLICATION_JSON, Bytes::from(body))
}

/// 404 for unmatched method/path combinations.
pub fn not_found() -> HttpResponse {
    text(StatusCode::NOT_FOUND, "404 page not found")
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_json_error_body() {
        let response = json_error(StatusCode::BAD_REQUEST, "invalid JSON");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], APPLICATION_JSON);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"error":"invalid JSON"}"#);
    }

    #[test]
    fn test_text_content_type() {
        let response = text(StatusCode::OK, GOT_IT);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_PLAIN);
    }
}

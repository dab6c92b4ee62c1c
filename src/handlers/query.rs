//! `GET /get`: log the `query` parameter and headers, acknowledge.

use super::log_headers;
use crate::response::{self, HttpResponse, GOT_IT};
use hyper::{Request, StatusCode};
use tracing::info;

const QUERY_PARAM: &str = "query";

pub fn handle<B>(req: &Request<B>) -> HttpResponse {
    let query = query_param(req.uri().query(), QUERY_PARAM).unwrap_or_default();

    info!(query = %query, "Received query");
    log_headers(req.headers());

    response::text(StatusCode::OK, GOT_IT)
}

/// First value of `name` in a form-urlencoded query string.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

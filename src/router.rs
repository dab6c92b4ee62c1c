//! Route table.
//!
//! Maps an HTTP method and request path to one of the fixed endpoints:
//!
//! ```text
//! POST /post                   echo body and headers
//! POST /post-heavy             allocate and checksum memory blocks
//! GET  /get                    echo the `query` parameter
//! POST /post-panic             induced crash
//! POST /post-exit              respond, then terminate the process
//! POST /post-long-time         fixed 30s delay
//! POST /post/delay/{seconds}   caller-chosen delay
//! ```

use hyper::Method;

const DELAY_PREFIX: &str = "/post/delay/";

/// A resolved endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Echo,
    Heavy,
    Query,
    Panic,
    Exit,
    LongTime,
    /// Raw `{seconds}` path segment, validated by the handler.
    Delay(String),
}

/// Resolve a request to a route, or `None` when nothing matches.
pub fn resolve(method: &Method, path: &str) -> Option<Route> {
    match (method, path) {
        (&Method::POST, "/post") => Some(Route::Echo),
        (&Method::POST, "/post-heavy") => Some(Route::Heavy),
        (&Method::GET, "/get") => Some(Route::Query),
        (&Method::POST, "/post-panic") => Some(Route::Panic),
        (&Method::POST, "/post-exit") => Some(Route::Exit),
        (&Method::POST, "/post-long-time") => Some(Route::LongTime),
        (&Method::POST, _) => path
            .strip_prefix(DELAY_PREFIX)
            .filter(|seconds| !seconds.is_empty() && !seconds.contains('/'))
            .map(|seconds| Route::Delay(seconds.to_string())),
        _ => None,
    }
}

//! Endpoint handlers.
//!
//! Each submodule implements one endpoint. Handlers are generic over the
//! request body so the server can feed them `hyper::body::Incoming` while
//! tests use in-memory bodies.
//!
//! ## Endpoints
//! - `echo`: log body and headers, acknowledge
//! - `load`: allocate and checksum memory blocks
//! - `query`: log a query parameter, acknowledge
//! - `fault`: deliberate panic
//! - `exit`: respond, then terminate the process
//! - `delay`: fixed and caller-chosen response latency

pub mod delay;
pub mod echo;
pub mod exit;
pub mod fault;
pub mod load;
pub mod query;

use crate::config::Config;
use crate::response::{self, HttpResponse};
use crate::router::{self, Route};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::HeaderMap;
use hyper::{Request, StatusCode};
use std::fmt::Display;
use tracing::{info, warn};

use fault::FaultField;
use load::LoadLimits;

/// Read-only state shared by all connections.
#[derive(Debug)]
pub struct AppState {
    pub fault: FaultField,
    pub load: LoadLimits,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        AppState {
            fault: FaultField::unset(),
            load: LoadLimits {
                max_block_count: config.max_block_count,
            },
        }
    }
}

/// Route a request and run its handler.
pub async fn dispatch<B>(state: &AppState, req: Request<B>) -> HttpResponse
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let Some(route) = router::resolve(req.method(), req.uri().path()) else {
        return response::not_found();
    };

    match route {
        Route::Echo => echo::handle(req).await,
        Route::Heavy => load::handle(req, &state.load).await,
        Route::Query => query::handle(&req),
        Route::Panic => fault::handle(&state.fault),
        Route::Exit => exit::handle(),
        Route::LongTime => delay::fixed().await,
        Route::Delay(seconds) => delay::parametric(&seconds).await,
    }
}

/// Collect a request body, mapping failures to the 400 response.
async fn read_body<B>(body: B) -> Result<Bytes, HttpResponse>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    match body.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            Err(response::json_error(
                StatusCode::BAD_REQUEST,
                "unable to read body",
            ))
        }
    }
}

/// Log every header value, one event per value in received order.
fn log_headers(headers: &HeaderMap) {
    for (name, value) in headers {
        info!(
            header = %name,
            value = %String::from_utf8_lossy(value.as_bytes()),
            "Header"
        );
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use hyper::Method;

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let state = AppState::new(&Config::default());

        let response = dispatch(&state, request(Method::GET, "/nope", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "404 page not found");

        let response = dispatch(&state, request(Method::GET, "/post", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_handlers() {
        let state = AppState::new(&Config::default());

        let response = dispatch(&state, post("/post", "hello")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "got it\n");

        let response = dispatch(&state, request(Method::GET, "/get?query=x", "")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = dispatch(&state, post("/post/delay/abc", "")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_state_carries_ceiling() {
        let config = Config {
            max_block_count: Some(4),
            ..Config::default()
        };
        let state = AppState::new(&config);
        assert_eq!(state.load.max_block_count, Some(4));
        assert!(!state.fault.is_set());
    }
}

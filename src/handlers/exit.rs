//! `POST /post-exit`: acknowledge, then take the whole process down.
//!
//! The handler only describes the exit: it closes the connection after the
//! response and attaches an [`ExitAfterResponse`] marker. The server
//! terminates once that response has been written out.

use crate::lifecycle::{ExitAfterResponse, EXIT_STATUS};
use crate::response::{self, HttpResponse};
use hyper::header::{HeaderValue, CONNECTION};
use hyper::StatusCode;
use tracing::warn;

pub const SHUTDOWN_MESSAGE: &str = "server shutting down...\n";

pub fn handle() -> HttpResponse {
    warn!(status = EXIT_STATUS, "Process exit requested");

    let mut response = response::text(StatusCode::OK, SHUTDOWN_MESSAGE);
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    response.extensions_mut().insert(ExitAfterResponse {
        status: EXIT_STATUS,
    });
    response
}

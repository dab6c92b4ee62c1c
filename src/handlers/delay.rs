//! Latency endpoints for exercising client timeouts.
//!
//! - `POST /post-long-time` waits a fixed 30 seconds.
//! - `POST /post/delay/{seconds}` waits a caller-chosen time, where
//!   `{seconds}` is a non-negative decimal such as `2` or `0.25`.
//!
//! Neither delay is cut short by a client disconnect. A graceful shutdown
//! lets them finish within the configured grace period.

use crate::response::{self, HttpResponse};
use hyper::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

pub const FIXED_DELAY: Duration = Duration::from_secs(30);

pub async fn fixed() -> HttpResponse {
    debug!(seconds = FIXED_DELAY.as_secs(), "Delaying response");
    tokio::time::sleep(FIXED_DELAY).await;
    response::text(StatusCode::OK, "server Response after 30s\n")
}

pub async fn parametric(seconds: &str) -> HttpResponse {
    let Some(delay) = parse_seconds(seconds) else {
        warn!(seconds, "Invalid delay parameter");
        return response::json_error(StatusCode::BAD_REQUEST, "invalid seconds parameter");
    };

    debug!(seconds, "Delaying response");
    tokio::time::sleep(delay).await;
    response::text(StatusCode::OK, format!("Response after {seconds}s\n"))
}

/// Parse a non-negative decimal number of seconds.
fn parse_seconds(raw: &str) -> Option<Duration> {
    let mut digits = 0;
    let mut dots = 0;
    for c in raw.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return None,
        }
    }
    if digits == 0 || dots > 1 {
        return None;
    }

    let secs: f64 = raw.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

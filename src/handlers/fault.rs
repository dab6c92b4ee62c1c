//! `POST /post-panic`: deliberate crash.
//!
//! The handler reads a field that is never populated, unwrapping it on
//! purpose. The resulting panic unwinds the connection's task; tokio keeps
//! it contained, so the client sees its connection dropped with no response
//! while the process carries on serving other connections.

use crate::response::{self, HttpResponse};
use hyper::StatusCode;
use tracing::warn;

/// A process-wide optional that is built empty and never written.
#[derive(Debug, Default)]
pub struct FaultField {
    message: Option<String>,
}

impl FaultField {
    pub fn unset() -> Self {
        FaultField { message: None }
    }

    #[cfg(test)]
    pub fn is_set(&self) -> bool {
        self.message.is_some()
    }

    /// Unwrap the field. Panics, since it is always empty.
    pub fn read(&self) -> &str {
        self.message
            .as_deref()
            .expect("fault injection: read of unset field")
    }
}

pub fn handle(field: &FaultField) -> HttpResponse {
    warn!("Fault injection requested");
    let message = field.read();
    response::text(StatusCode::OK, format!("{message}\n"))
}

//! `POST /post`: log the raw body and headers, acknowledge.

use super::{log_headers, read_body};
use crate::response::{self, HttpResponse, GOT_IT};
use bytes::Bytes;
use hyper::body::Body;
use hyper::{Request, StatusCode};
use std::fmt::Display;
use tracing::info;

pub async fn handle<B>(req: Request<B>) -> HttpResponse
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();
    let body = match read_body(body).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    info!(
        len = body.len(),
        body = %String::from_utf8_lossy(&body),
        "Received body"
    );
    log_headers(&parts.headers);

    response::text(StatusCode::OK, GOT_IT)
}

//! `POST /post-heavy`: memory and CPU pressure on demand.
//!
//! The request body names how many 10 MiB blocks to build:
//!
//! ```text
//! {"block_count": 4}
//! ```
//!
//! Byte `j` of block `i` holds `(i + j) mod 256`. Every byte is then summed
//! and the sum logged, so a fixed `block_count` always yields the same sum.
//! Blocks live only for the duration of the request.
//!
//! There is no upper bound unless `max_block_count` is configured; callers
//! are trusted not to exhaust the host's memory.

use super::read_body;
use crate::response::{self, HttpResponse, GOT_IT};
use bytes::Bytes;
use hyper::body::Body;
use hyper::{Request, StatusCode};
use serde::Deserialize;
use std::fmt::Display;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Size of each allocated block
pub const BLOCK_SIZE: usize = 10 * 1024 * 1024; // 10 MiB

/// Limits applied before any allocation happens.
#[derive(Debug, Clone, Default)]
pub struct LoadLimits {
    pub max_block_count: Option<u64>,
}

/// JSON payload accepted by the endpoint
#[derive(Debug, Deserialize)]
pub struct LoadDirective {
    pub block_count: i64,
}

/// Reasons a directive is rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    InvalidJson,
    NonPositive,
    OverLimit(u64),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::InvalidJson => write!(f, "invalid JSON"),
            LoadError::NonPositive => write!(f, "block_count must be greater than 0"),
            LoadError::OverLimit(limit) => write!(f, "block_count must not exceed {limit}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl LoadDirective {
    /// Parse and validate a request body, returning the block count.
    pub fn parse(body: &[u8], limits: &LoadLimits) -> Result<usize, LoadError> {
        let directive: LoadDirective =
            serde_json::from_slice(body).map_err(|_| LoadError::InvalidJson)?;

        if directive.block_count <= 0 {
            return Err(LoadError::NonPositive);
        }

        let requested = directive.block_count.unsigned_abs();
        if let Some(limit) = limits.max_block_count {
            if requested > limit {
                return Err(LoadError::OverLimit(limit));
            }
        }

        usize::try_from(requested).map_err(|_| LoadError::OverLimit(usize::MAX as u64))
    }
}

/// Freshly allocated, deterministically filled blocks.
pub struct BlockBatch {
    blocks: Vec<Vec<u8>>,
}

impl BlockBatch {
    /// Build `count` blocks of [`BLOCK_SIZE`] bytes.
    pub fn generate(count: usize) -> Self {
        Self::with_block_size(count, BLOCK_SIZE)
    }

    pub fn with_block_size(count: usize, block_size: usize) -> Self {
        let mut blocks = Vec::with_capacity(count);
        for i in 0..count {
            let block: Vec<u8> = (0..block_size).map(|j| ((i + j) % 256) as u8).collect();
            blocks.push(block);
        }
        BlockBatch { blocks }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Sum of every byte in every block.
    pub fn checksum(&self) -> u64 {
        self.blocks
            .iter()
            .flat_map(|block| block.iter())
            .map(|&b| u64::from(b))
            .sum()
    }
}

pub async fn handle<B>(req: Request<B>, limits: &LoadLimits) -> HttpResponse
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let body = match read_body(req.into_body()).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let block_count = match LoadDirective::parse(&body, limits) {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Rejected load directive");
            return response::json_error(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    debug!(block_count, "Simulating load");
    let started = Instant::now();

    let simulated = tokio::task::spawn_blocking(move || {
        let batch = BlockBatch::generate(block_count);
        batch.checksum()
    })
    .await;

    match simulated {
        Ok(sum) => {
            info!(
                block_count,
                sum,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Simulated sum"
            );
            response::text(StatusCode::OK, GOT_IT)
        }
        Err(e) => {
            error!(block_count, error = %e, "Load simulation failed");
            response::json_error(StatusCode::INTERNAL_SERVER_ERROR, "load simulation failed")
        }
    }
}

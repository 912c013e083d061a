//! External squad solver.
//!
//! Defines the `Solver` trait. The optimizer itself is a black-box HTTP
//! service; `HttpSolver` is the client for it.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{SolveRequest, SolveResponse};

pub use http::HttpSolver;

/// Abstraction over the remote optimizer.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Send one solve request to `endpoint`. Network failures are errors and
    /// are not retried; a failing solver status is a normal response.
    async fn solve(&self, endpoint: &str, request: &SolveRequest) -> Result<SolveResponse>;
}

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use common::models::{AccountCredentials, Direction, Signal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod dry_run;
pub mod http_backend;

pub use dry_run::DryRunBackend;
pub use http_backend::HttpExecutionBackend;

pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by backend: {0}")]
    Rejected(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub comment: Option<String>,
}

impl OrderRequest {
    /// The order a student copies from `signal`; the signal's size wins over the student's lot.
    pub fn copy_of(signal: &Signal, default_size: f64) -> Self {
        Self {
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            size: signal.size.unwrap_or(default_size),
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            comment: Some(format!("signal:{}", signal.id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
}

/// The remote side that owns trading accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Logs the account in and returns the handle later orders are placed against.
    async fn open_session(&self, credentials: &AccountCredentials) -> Result<String, ExecutionError>;

    async fn place_order(
        &self,
        account_ref: &str,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, ExecutionError>;

    /// Logs out a session opened by `open_session`.
    async fn close_session(&self, account_ref: &str) -> Result<(), ExecutionError>;
}

/// Bounds a backend call; running out of time is an `ExecutionError::Timeout`.
pub async fn within<T, F>(limit: Duration, call: F) -> Result<T, ExecutionError>
where
    F: Future<Output = Result<T, ExecutionError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ExecutionError::Timeout(limit))?
}

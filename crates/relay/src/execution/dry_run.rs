use async_trait::async_trait;
use common::models::AccountCredentials;
use tracing::info;
use uuid::Uuid;

use super::{ExecutionBackend, ExecutionError, OrderReceipt, OrderRequest};

/// Backend used when no execution gateway is configured. Accepts everything
/// and only logs what would have been sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunBackend;

#[async_trait]
impl ExecutionBackend for DryRunBackend {
    async fn open_session(&self, credentials: &AccountCredentials) -> Result<String, ExecutionError> {
        let account_ref = format!("dry-{}", Uuid::new_v4());
        info!(
            "[dry-run] session {} for login {} on {}",
            account_ref, credentials.login, credentials.server
        );
        Ok(account_ref)
    }

    async fn place_order(
        &self,
        account_ref: &str,
        order: &OrderRequest,
    ) -> Result<OrderReceipt, ExecutionError> {
        info!(
            "[dry-run] {} {} {} SL={} TP={} on {}",
            order.direction, order.size, order.symbol, order.stop_loss, order.take_profit, account_ref
        );
        Ok(OrderReceipt {
            order_id: Uuid::new_v4().to_string(),
        })
    }

    async fn close_session(&self, account_ref: &str) -> Result<(), ExecutionError> {
        info!("[dry-run] closed session {}", account_ref);
        Ok(())
    }
}

// Order setup - lookup, configure, register the session row

use crate::application::engine::CountingEngine;
use crate::domain::OrderSetup;
use crate::error::{AppError, Result};
use crate::port::OrderSource;
use tracing::{error, info, warn};

impl CountingEngine {
    /// Look up `order_label`, configure the engine with it and open the active session row
    ///
    /// Fails with `NotFound` for unknown orders. A failed session insert is
    /// returned to the caller; the engine stays configured.
    pub async fn setup_order(
        &self,
        orders: &dyn OrderSource,
        order_label: &str,
        target_count: u64,
    ) -> Result<OrderSetup> {
        let record = orders.lookup_order(order_label).await?.ok_or_else(|| {
            warn!(order = %order_label, "Order not found");
            AppError::NotFound(format!("Order '{}' not found", order_label))
        })?;

        let setup = OrderSetup::from_record(record, order_label, target_count);
        self.configure(setup.clone())?;

        let opened_at = self.inner().clock.now();
        self.inner()
            .store
            .open_session(&setup.order_label, target_count, &setup.article, opened_at)
            .await
            .map_err(|e| {
                error!(order = %setup.order_label, error = %e, "Failed to register session");
                e
            })?;

        info!(order = %setup.order_label, target = target_count, "Session registered");
        Ok(setup)
    }
}

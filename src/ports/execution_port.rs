//! Order execution port trait.

use crate::domain::cycle::{PurchaseFill, SaleFill};
use crate::domain::error::DaytraderError;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Order placement venue. `purchase` sizes the order from the available
/// cash and may legitimately fill zero shares; `sell` always disposes of the
/// full quantity. Failures surface as
/// [`DaytraderError::ExecutionUnavailable`] (venue unreachable) or
/// [`DaytraderError::ExecutionRejected`] (order refused).
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    async fn purchase(
        &self,
        symbol: &str,
        available_cash: Decimal,
    ) -> Result<PurchaseFill, DaytraderError>;

    async fn sell(&self, symbol: &str, quantity: u64) -> Result<SaleFill, DaytraderError>;
}

//! Decision signal port trait.

use crate::domain::error::DaytraderError;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Source of buy/sell signals for a symbol. Implementations typically wrap a
/// remote signal provider; failures surface as
/// [`DaytraderError::DecisionUnavailable`].
#[async_trait]
pub trait DecisionPort: Send + Sync {
    /// Should the service buy the symbol right now?
    async fn should_buy(&self, symbol: &str) -> Result<bool, DaytraderError>;

    /// Should the service sell a position entered at `purchase_price`?
    async fn should_sell(
        &self,
        symbol: &str,
        purchase_price: Decimal,
    ) -> Result<bool, DaytraderError>;
}

//! Fill types and the balance arithmetic for each half of the cycle.
//!
//! `apply_purchase` and `apply_sale` are the only places cash, share counts,
//! counters and gain/loss move. Every ledger adapter funnels its commits
//! through them so the arithmetic is identical regardless of storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::DaytraderError;
use super::service::{TradingMode, TradingService};
use super::transaction::Transaction;

/// Result of a purchase order: how many shares filled at what price.
/// A quantity of zero means nothing filled (cash too small for one share).
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseFill {
    pub quantity: u64,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl PurchaseFill {
    pub fn cost(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }
}

/// Result of a sale order. The full held quantity always sells.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleFill {
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Commit a purchase fill against the service: debit the cost, take on the
/// shares, bump the buy counter and flip to sell mode. Nothing mutates if a
/// precondition fails.
pub fn apply_purchase(
    service: &mut TradingService,
    fill: &PurchaseFill,
) -> Result<(), DaytraderError> {
    if fill.quantity == 0 {
        return Err(DaytraderError::InvariantViolation {
            service_id: service.id,
            reason: "cannot commit a zero-quantity fill".into(),
        });
    }
    let cost = fill.cost();
    if cost > service.current_balance {
        return Err(DaytraderError::InsufficientFunds {
            required: cost,
            available: service.current_balance,
        });
    }

    service.current_balance -= cost;
    service.current_shares += fill.quantity;
    service.buy_count += 1;
    service.mode = TradingMode::Sell;
    Ok(())
}

/// Commit a sale fill: close the transaction, credit the proceeds,
/// accumulate the realized gain/loss, zero the holdings, bump the sell
/// counter and flip back to buy mode. Returns the realized gain/loss.
pub fn apply_sale(
    service: &mut TradingService,
    transaction: &mut Transaction,
    fill: &SaleFill,
) -> Result<Decimal, DaytraderError> {
    if transaction.service_id != service.id {
        return Err(DaytraderError::InvariantViolation {
            service_id: service.id,
            reason: format!(
                "transaction {} belongs to service {}",
                transaction.id, transaction.service_id
            ),
        });
    }
    if transaction.shares != service.current_shares {
        return Err(DaytraderError::InvariantViolation {
            service_id: service.id,
            reason: format!(
                "held shares {} do not match open transaction shares {}",
                service.current_shares, transaction.shares
            ),
        });
    }

    let gain_loss = transaction.close(fill.price, fill.executed_at)?;
    let proceeds = Decimal::from(transaction.shares) * fill.price;

    service.current_balance += proceeds;
    service.total_gain_loss += gain_loss;
    service.current_shares = 0;
    service.sell_count += 1;
    service.mode = TradingMode::Buy;
    Ok(gain_loss)
}

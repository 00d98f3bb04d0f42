//! Trading service records and lifecycle enums.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::DaytraderError;

/// Lifecycle state of a trading service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Inactive,
    Paused,
    Error,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Active => "ACTIVE",
            ServiceState::Inactive => "INACTIVE",
            ServiceState::Paused => "PAUSED",
            ServiceState::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(ServiceState::Active),
            "INACTIVE" => Some(ServiceState::Inactive),
            "PAUSED" => Some(ServiceState::Paused),
            "ERROR" => Some(ServiceState::Error),
            _ => None,
        }
    }
}

/// Which half of the buy/sell cycle the service is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Buy,
    Sell,
    Hold,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Buy => "BUY",
            TradingMode::Sell => "SELL",
            TradingMode::Hold => "HOLD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BUY" => Some(TradingMode::Buy),
            "SELL" => Some(TradingMode::Sell),
            "HOLD" => Some(TradingMode::Hold),
            _ => None,
        }
    }
}

/// Validated input for creating a service.
#[derive(Debug, Clone)]
pub struct NewService {
    pub symbol: String,
    pub starting_balance: Decimal,
}

impl NewService {
    pub fn new(symbol: &str, starting_balance: Decimal) -> Result<Self, DaytraderError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(DaytraderError::InvalidService {
                reason: "symbol must not be empty".into(),
            });
        }
        if starting_balance <= Decimal::ZERO {
            return Err(DaytraderError::InvalidService {
                reason: format!("starting balance must be positive, got {starting_balance}"),
            });
        }
        Ok(Self {
            symbol,
            starting_balance,
        })
    }
}

/// One automated trading service: a single symbol, its cash and share
/// holdings, and the cumulative result of completed cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingService {
    pub id: i64,
    pub symbol: String,
    pub starting_balance: Decimal,
    pub current_balance: Decimal,
    pub current_shares: u64,
    pub total_gain_loss: Decimal,
    pub buy_count: u32,
    pub sell_count: u32,
    pub state: ServiceState,
    pub mode: TradingMode,
    pub created_at: DateTime<Utc>,
}

impl TradingService {
    /// A freshly created service starts active in buy mode with its full
    /// balance in cash.
    pub fn create(id: i64, new: &NewService, created_at: DateTime<Utc>) -> Self {
        TradingService {
            id,
            symbol: new.symbol.clone(),
            starting_balance: new.starting_balance,
            current_balance: new.starting_balance,
            current_shares: 0,
            total_gain_loss: Decimal::ZERO,
            buy_count: 0,
            sell_count: 0,
            state: ServiceState::Active,
            mode: TradingMode::Buy,
            created_at,
        }
    }

    /// Cash plus holdings marked at the given price.
    pub fn total_value(&self, price: Decimal) -> Decimal {
        self.current_balance + Decimal::from(self.current_shares) * price
    }

    /// The mode a restarted service should resume in: holding shares means
    /// the open position must be sold before buying again.
    pub fn resume_mode(&self) -> TradingMode {
        if self.current_shares > 0 {
            TradingMode::Sell
        } else {
            TradingMode::Buy
        }
    }
}

//! Mock market adapters.
//!
//! Simulated decision signals and order fills for a small universe of
//! symbols, so the system runs end to end without a brokerage connection.
//! Both adapters are seedable for deterministic tests.

use crate::domain::cycle::{PurchaseFill, SaleFill};
use crate::domain::error::DaytraderError;
use crate::ports::decision_port::DecisionPort;
use crate::ports::execution_port::ExecutionPort;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;

pub const SUPPORTED_SYMBOLS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "META", "TSLA", "NVDA", "NFLX", "PYPL", "INTC",
];

/// Reference price per symbol. Quotes move randomly around these.
fn base_price(symbol: &str) -> Option<Decimal> {
    let price = match symbol {
        "AAPL" => dec!(175.00),
        "MSFT" => dec!(390.00),
        "GOOGL" => dec!(150.00),
        "AMZN" => dec!(178.00),
        "META" => dec!(478.00),
        "TSLA" => dec!(175.00),
        "NVDA" => dec!(950.00),
        "NFLX" => dec!(625.00),
        "PYPL" => dec!(62.00),
        "INTC" => dec!(31.00),
        _ => return None,
    };
    Some(price)
}

/// Maximum fractional move per quote, reflecting each symbol's volatility.
fn movement_range(symbol: &str) -> f64 {
    match symbol {
        "AAPL" => 0.02,
        "MSFT" => 0.015,
        "GOOGL" => 0.025,
        "AMZN" => 0.03,
        "META" => 0.035,
        "TSLA" => 0.04,
        "NVDA" => 0.045,
        "NFLX" => 0.03,
        "PYPL" => 0.025,
        "INTC" => 0.02,
        _ => 0.02,
    }
}

/// Chance a buy signal fires for the symbol on any given poll.
fn buy_probability(symbol: &str) -> Option<f64> {
    let probability = match symbol {
        "AAPL" => 0.75,
        "MSFT" => 0.70,
        "GOOGL" => 0.65,
        "AMZN" => 0.60,
        "META" => 0.55,
        "TSLA" => 0.50,
        "NVDA" => 0.75,
        "NFLX" => 0.55,
        "PYPL" => 0.45,
        "INTC" => 0.40,
        _ => return None,
    };
    Some(probability)
}

/// Per-symbol bias on the sell decision: negative holds longer,
/// positive sells sooner.
fn sell_adjustment(symbol: &str) -> f64 {
    match symbol {
        "AAPL" => -0.1,
        "MSFT" => -0.1,
        "GOOGL" => -0.05,
        "META" => 0.05,
        "TSLA" => 0.1,
        "NVDA" => -0.15,
        "PYPL" => 0.1,
        "INTC" => 0.05,
        _ => 0.0,
    }
}

/// Sell probability as a function of unrealized gain: sell into profit,
/// hold through small dips, cut severe losses. Clamped to [0.1, 0.9].
fn sell_probability(symbol: &str, purchase_price: Decimal, current_price: Decimal) -> f64 {
    let diff_pct = ((current_price - purchase_price) / purchase_price * dec!(100))
        .to_f64()
        .unwrap_or(0.0);

    let base = 0.5;
    let mut probability = if diff_pct > 0.0 {
        (base + diff_pct / 100.0).min(0.9)
    } else if diff_pct > -5.0 {
        (base + diff_pct / 100.0).max(0.1)
    } else if diff_pct > -15.0 {
        (base + diff_pct / 200.0).max(0.2)
    } else {
        (base - diff_pct / 50.0).min(0.8)
    };

    probability += sell_adjustment(symbol);
    probability.clamp(0.1, 0.9)
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// Simulated decision signals driven by per-symbol probabilities.
pub struct MockDecisionAdapter {
    rng: Mutex<StdRng>,
}

impl MockDecisionAdapter {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn roll(&self) -> f64 {
        self.rng
            .lock()
            .expect("decision rng lock poisoned")
            .r#gen::<f64>()
    }

    fn current_price(&self, symbol: &str) -> Option<Decimal> {
        let base = base_price(symbol)?;
        let range = movement_range(symbol);
        let movement = {
            let mut rng = self.rng.lock().expect("decision rng lock poisoned");
            rng.gen_range(-range..=range)
        };
        let factor = Decimal::from_f64_retain(1.0 + movement).unwrap_or(Decimal::ONE);
        Some(round_cents(base * factor))
    }
}

impl Default for MockDecisionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionPort for MockDecisionAdapter {
    async fn should_buy(&self, symbol: &str) -> Result<bool, DaytraderError> {
        let probability =
            buy_probability(symbol).ok_or_else(|| DaytraderError::DecisionUnavailable {
                symbol: symbol.to_string(),
                reason: "symbol not supported".into(),
            })?;
        Ok(self.roll() < probability)
    }

    async fn should_sell(
        &self,
        symbol: &str,
        purchase_price: Decimal,
    ) -> Result<bool, DaytraderError> {
        let current_price =
            self.current_price(symbol)
                .ok_or_else(|| DaytraderError::DecisionUnavailable {
                    symbol: symbol.to_string(),
                    reason: "symbol not supported".into(),
                })?;
        let probability = sell_probability(symbol, purchase_price, current_price);
        Ok(self.roll() < probability)
    }
}

/// Simulated execution venue: fills at the base price plus a bounded random
/// movement, rounded to whole cents.
pub struct MockExecutionAdapter {
    rng: Mutex<StdRng>,
}

impl MockExecutionAdapter {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn quote(&self, symbol: &str) -> Option<Decimal> {
        let base = base_price(symbol)?;
        let range = movement_range(symbol);
        let movement = {
            let mut rng = self.rng.lock().expect("execution rng lock poisoned");
            rng.gen_range(-range..=range)
        };
        let factor = Decimal::from_f64_retain(1.0 + movement).unwrap_or(Decimal::ONE);
        Some(round_cents(base * factor))
    }
}

impl Default for MockExecutionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionPort for MockExecutionAdapter {
    async fn purchase(
        &self,
        symbol: &str,
        available_cash: Decimal,
    ) -> Result<PurchaseFill, DaytraderError> {
        let price = self
            .quote(symbol)
            .ok_or_else(|| DaytraderError::ExecutionRejected {
                symbol: symbol.to_string(),
                reason: "symbol not supported".into(),
            })?;

        // Whole shares only; zero is a legitimate fill when cash is short.
        let quantity = (available_cash / price)
            .floor()
            .to_u64()
            .unwrap_or(0);

        Ok(PurchaseFill {
            quantity,
            price,
            executed_at: Utc::now(),
        })
    }

    async fn sell(&self, symbol: &str, quantity: u64) -> Result<SaleFill, DaytraderError> {
        if quantity == 0 {
            return Err(DaytraderError::ExecutionRejected {
                symbol: symbol.to_string(),
                reason: "cannot sell zero shares".into(),
            });
        }
        let price = self
            .quote(symbol)
            .ok_or_else(|| DaytraderError::ExecutionRejected {
                symbol: symbol.to_string(),
                reason: "symbol not supported".into(),
            })?;

        Ok(SaleFill {
            price,
            executed_at: Utc::now(),
        })
    }
}

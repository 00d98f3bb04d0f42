#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use daytrader::domain::cycle::{PurchaseFill, SaleFill};
use daytrader::domain::error::DaytraderError;
use daytrader::ports::decision_port::DecisionPort;
use daytrader::ports::execution_port::ExecutionPort;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted answer from a decision port. The script repeats its last
/// entry once exhausted; an empty script always answers no.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Yes,
    No,
    Unavailable,
}

pub struct ScriptedDecision {
    buy: Mutex<VecDeque<Signal>>,
    sell: Mutex<VecDeque<Signal>>,
}

impl ScriptedDecision {
    pub fn new() -> Self {
        Self {
            buy: Mutex::new(VecDeque::new()),
            sell: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_buy(self, signals: &[Signal]) -> Self {
        self.buy.lock().unwrap().extend(signals.iter().copied());
        self
    }

    pub fn with_sell(self, signals: &[Signal]) -> Self {
        self.sell.lock().unwrap().extend(signals.iter().copied());
        self
    }

    fn next(queue: &Mutex<VecDeque<Signal>>) -> Signal {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().copied().unwrap_or(Signal::No)
        }
    }
}

impl Default for ScriptedDecision {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionPort for ScriptedDecision {
    async fn should_buy(&self, symbol: &str) -> Result<bool, DaytraderError> {
        match Self::next(&self.buy) {
            Signal::Yes => Ok(true),
            Signal::No => Ok(false),
            Signal::Unavailable => Err(DaytraderError::DecisionUnavailable {
                symbol: symbol.to_string(),
                reason: "scripted outage".into(),
            }),
        }
    }

    async fn should_sell(
        &self,
        symbol: &str,
        _purchase_price: Decimal,
    ) -> Result<bool, DaytraderError> {
        match Self::next(&self.sell) {
            Signal::Yes => Ok(true),
            Signal::No => Ok(false),
            Signal::Unavailable => Err(DaytraderError::DecisionUnavailable {
                symbol: symbol.to_string(),
                reason: "scripted outage".into(),
            }),
        }
    }
}

pub struct ScriptedExecution {
    purchases: Mutex<VecDeque<(u64, Decimal)>>,
    sales: Mutex<VecDeque<Decimal>>,
}

impl ScriptedExecution {
    pub fn new() -> Self {
        Self {
            purchases: Mutex::new(VecDeque::new()),
            sales: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_purchase(self, quantity: u64, price: Decimal) -> Self {
        self.purchases.lock().unwrap().push_back((quantity, price));
        self
    }

    pub fn with_sale(self, price: Decimal) -> Self {
        self.sales.lock().unwrap().push_back(price);
        self
    }
}

impl Default for ScriptedExecution {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionPort for ScriptedExecution {
    async fn purchase(
        &self,
        symbol: &str,
        _available_cash: Decimal,
    ) -> Result<PurchaseFill, DaytraderError> {
        let (quantity, price) = self.purchases.lock().unwrap().pop_front().ok_or_else(|| {
            DaytraderError::ExecutionUnavailable {
                symbol: symbol.to_string(),
                reason: "no scripted fill".into(),
            }
        })?;
        Ok(PurchaseFill {
            quantity,
            price,
            executed_at: Utc::now(),
        })
    }

    async fn sell(&self, symbol: &str, _quantity: u64) -> Result<SaleFill, DaytraderError> {
        let price = self.sales.lock().unwrap().pop_front().ok_or_else(|| {
            DaytraderError::ExecutionUnavailable {
                symbol: symbol.to_string(),
                reason: "no scripted fill".into(),
            }
        })?;
        Ok(SaleFill {
            price,
            executed_at: Utc::now(),
        })
    }
}

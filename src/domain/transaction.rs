//! Transaction records: one buy-then-sell round trip each.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::DaytraderError;

/// State of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Closed,
    Cancelled,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Open => "OPEN",
            TransactionState::Closed => "CLOSED",
            TransactionState::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(TransactionState::Open),
            "CLOSED" => Some(TransactionState::Closed),
            "CANCELLED" => Some(TransactionState::Cancelled),
            _ => None,
        }
    }
}

/// A single purchase and its eventual sale. Sale fields stay `None` while
/// the transaction is open.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub service_id: i64,
    pub symbol: String,
    pub shares: u64,
    pub purchase_price: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub state: TransactionState,
    pub sale_price: Option<Decimal>,
    pub sale_date: Option<DateTime<Utc>>,
    pub gain_loss: Option<Decimal>,
    pub notes: Option<String>,
}

impl Transaction {
    pub fn open(
        id: i64,
        service_id: i64,
        symbol: &str,
        shares: u64,
        purchase_price: Decimal,
        purchase_date: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id,
            service_id,
            symbol: symbol.to_string(),
            shares,
            purchase_price,
            purchase_date,
            state: TransactionState::Open,
            sale_price: None,
            sale_date: None,
            gain_loss: None,
            notes: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == TransactionState::Closed
    }

    /// Record the sale. Only an open transaction can close, and it closes
    /// exactly once. Returns the realized gain or loss:
    /// (sale price - purchase price) * shares.
    pub fn close(
        &mut self,
        sale_price: Decimal,
        sale_date: DateTime<Utc>,
    ) -> Result<Decimal, DaytraderError> {
        if !self.is_open() {
            return Err(DaytraderError::TransactionNotOpen {
                transaction_id: self.id,
            });
        }
        let gain_loss = (sale_price - self.purchase_price) * Decimal::from(self.shares);
        self.state = TransactionState::Closed;
        self.sale_price = Some(sale_price);
        self.sale_date = Some(sale_date);
        self.gain_loss = Some(gain_loss);
        Ok(gain_loss)
    }

    /// Abnormal cleanup only. Open transactions cancel; anything else is
    /// already settled.
    pub fn cancel(&mut self, notes: &str) -> Result<(), DaytraderError> {
        if !self.is_open() {
            return Err(DaytraderError::TransactionNotOpen {
                transaction_id: self.id,
            });
        }
        self.state = TransactionState::Cancelled;
        self.notes = Some(notes.to_string());
        Ok(())
    }

    pub fn is_profitable(&self) -> bool {
        self.gain_loss.is_some_and(|g| g > Decimal::ZERO)
    }
}

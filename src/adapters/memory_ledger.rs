//! In-memory ledger adapter.
//!
//! Backs tests and demo runs. A single mutex around the whole store gives
//! each operation the same all-or-nothing visibility the SQL adapter gets
//! from its transactions.

use crate::domain::cycle::{self, PurchaseFill, SaleFill};
use crate::domain::error::DaytraderError;
use crate::domain::service::{NewService, ServiceState, TradingMode, TradingService};
use crate::domain::transaction::{Transaction, TransactionState};
use crate::ports::ledger_port::LedgerPort;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    services: BTreeMap<i64, TradingService>,
    transactions: BTreeMap<i64, Transaction>,
    next_service_id: i64,
    next_transaction_id: i64,
}

pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_service_id: 1,
                next_transaction_id: 1,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory ledger lock poisoned")
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn service_mut(&mut self, service_id: i64) -> Result<&mut TradingService, DaytraderError> {
        self.services
            .get_mut(&service_id)
            .ok_or(DaytraderError::ServiceNotFound { service_id })
    }

    fn open_transaction_id(&self, service_id: i64) -> Option<i64> {
        self.transactions
            .values()
            .filter(|t| t.service_id == service_id && t.state == TransactionState::Open)
            .map(|t| t.id)
            .next_back()
    }
}

impl LedgerPort for MemoryLedger {
    fn create_service(&self, new: &NewService) -> Result<TradingService, DaytraderError> {
        let mut inner = self.lock();
        let id = inner.next_service_id;
        inner.next_service_id += 1;
        let service = TradingService::create(id, new, Utc::now());
        inner.services.insert(id, service.clone());
        Ok(service)
    }

    fn service(&self, service_id: i64) -> Result<TradingService, DaytraderError> {
        self.lock()
            .services
            .get(&service_id)
            .cloned()
            .ok_or(DaytraderError::ServiceNotFound { service_id })
    }

    fn list_services(&self) -> Result<Vec<TradingService>, DaytraderError> {
        Ok(self.lock().services.values().cloned().collect())
    }

    fn set_service_state(
        &self,
        service_id: i64,
        state: ServiceState,
    ) -> Result<TradingService, DaytraderError> {
        let mut inner = self.lock();
        let service = inner.service_mut(service_id)?;
        service.state = state;
        Ok(service.clone())
    }

    fn set_service_mode(
        &self,
        service_id: i64,
        mode: TradingMode,
    ) -> Result<TradingService, DaytraderError> {
        let mut inner = self.lock();
        let service = inner.service_mut(service_id)?;
        service.mode = mode;
        Ok(service.clone())
    }

    fn activate_service(&self, service_id: i64) -> Result<TradingService, DaytraderError> {
        let mut inner = self.lock();
        let service = inner.service_mut(service_id)?;
        service.mode = service.resume_mode();
        service.state = ServiceState::Active;
        Ok(service.clone())
    }

    fn open_transaction(
        &self,
        service_id: i64,
        fill: &PurchaseFill,
    ) -> Result<(TradingService, Transaction), DaytraderError> {
        let mut inner = self.lock();
        if inner.open_transaction_id(service_id).is_some() {
            return Err(DaytraderError::OpenTransactionExists { service_id });
        }

        // Work on a copy so a failed precondition leaves the stored row alone.
        let mut service = inner
            .services
            .get(&service_id)
            .cloned()
            .ok_or(DaytraderError::ServiceNotFound { service_id })?;
        cycle::apply_purchase(&mut service, fill)?;

        let id = inner.next_transaction_id;
        inner.next_transaction_id += 1;
        let transaction = Transaction::open(
            id,
            service_id,
            &service.symbol,
            fill.quantity,
            fill.price,
            fill.executed_at,
        );

        inner.services.insert(service_id, service.clone());
        inner.transactions.insert(id, transaction.clone());
        Ok((service, transaction))
    }

    fn close_transaction(
        &self,
        service_id: i64,
        transaction_id: i64,
        fill: &SaleFill,
    ) -> Result<(TradingService, Transaction), DaytraderError> {
        let mut inner = self.lock();

        let mut service = inner
            .services
            .get(&service_id)
            .cloned()
            .ok_or(DaytraderError::ServiceNotFound { service_id })?;
        let mut transaction = inner
            .transactions
            .get(&transaction_id)
            .cloned()
            .ok_or(DaytraderError::TransactionNotFound { transaction_id })?;

        cycle::apply_sale(&mut service, &mut transaction, fill)?;

        inner.services.insert(service_id, service.clone());
        inner.transactions.insert(transaction_id, transaction.clone());
        Ok((service, transaction))
    }

    fn latest_open_transaction(
        &self,
        service_id: i64,
    ) -> Result<Option<Transaction>, DaytraderError> {
        let inner = self.lock();
        Ok(inner
            .open_transaction_id(service_id)
            .and_then(|id| inner.transactions.get(&id).cloned()))
    }

    fn cancel_transaction(
        &self,
        transaction_id: i64,
        notes: &str,
    ) -> Result<Transaction, DaytraderError> {
        let mut inner = self.lock();
        let transaction = inner
            .transactions
            .get_mut(&transaction_id)
            .ok_or(DaytraderError::TransactionNotFound { transaction_id })?;
        transaction.cancel(notes)?;
        Ok(transaction.clone())
    }

    fn transactions_for_service(
        &self,
        service_id: i64,
    ) -> Result<Vec<Transaction>, DaytraderError> {
        Ok(self
            .lock()
            .transactions
            .values()
            .filter(|t| t.service_id == service_id)
            .cloned()
            .collect())
    }
}

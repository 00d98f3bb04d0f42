//! Transaction ledger port trait.

use crate::domain::cycle::{PurchaseFill, SaleFill};
use crate::domain::error::DaytraderError;
use crate::domain::service::{NewService, ServiceState, TradingMode, TradingService};
use crate::domain::transaction::Transaction;

/// Persistent store of services and their transactions.
///
/// Every operation is atomic: concurrent readers see either the state before
/// the call or the state after it, never an intermediate. `open_transaction`
/// and `close_transaction` commit the transaction row and the service's
/// financial update together.
pub trait LedgerPort: Send + Sync {
    fn create_service(&self, new: &NewService) -> Result<TradingService, DaytraderError>;

    fn service(&self, service_id: i64) -> Result<TradingService, DaytraderError>;

    fn list_services(&self) -> Result<Vec<TradingService>, DaytraderError>;

    fn set_service_state(
        &self,
        service_id: i64,
        state: ServiceState,
    ) -> Result<TradingService, DaytraderError>;

    fn set_service_mode(
        &self,
        service_id: i64,
        mode: TradingMode,
    ) -> Result<TradingService, DaytraderError>;

    /// Re-activate a stopped or errored service in one commit: state goes
    /// to Active and the mode is recomputed from the holdings (shares held
    /// means the position must sell before buying again).
    fn activate_service(&self, service_id: i64) -> Result<TradingService, DaytraderError>;

    /// Record a purchase: insert an open transaction and apply the debit to
    /// the service in one commit. Fails with
    /// [`DaytraderError::OpenTransactionExists`] if the service already has
    /// an open transaction.
    fn open_transaction(
        &self,
        service_id: i64,
        fill: &PurchaseFill,
    ) -> Result<(TradingService, Transaction), DaytraderError>;

    /// Record a sale: close the open transaction and apply the credit and
    /// gain/loss to the service in one commit. Fails with
    /// [`DaytraderError::TransactionNotOpen`] unless the transaction is open.
    fn close_transaction(
        &self,
        service_id: i64,
        transaction_id: i64,
        fill: &SaleFill,
    ) -> Result<(TradingService, Transaction), DaytraderError>;

    fn latest_open_transaction(
        &self,
        service_id: i64,
    ) -> Result<Option<Transaction>, DaytraderError>;

    /// Abnormal cleanup: mark an open transaction cancelled with a reason.
    /// Does not touch the service's balance.
    fn cancel_transaction(
        &self,
        transaction_id: i64,
        notes: &str,
    ) -> Result<Transaction, DaytraderError>;

    fn transactions_for_service(
        &self,
        service_id: i64,
    ) -> Result<Vec<Transaction>, DaytraderError>;
}

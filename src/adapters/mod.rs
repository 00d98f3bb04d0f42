//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod memory_ledger;
pub mod mock_market;
#[cfg(feature = "sqlite")]
pub mod sqlite_ledger;

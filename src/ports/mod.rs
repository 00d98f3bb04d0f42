//! Port traits: the boundaries between domain logic and the outside world.

pub mod config_port;
pub mod decision_port;
pub mod execution_port;
pub mod ledger_port;

//! Core domain types and logic.

pub mod service;
pub mod transaction;
pub mod cycle;
pub mod engine;
pub mod scheduler;
pub mod error;

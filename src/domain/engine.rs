//! The per-service trading cycle engine.
//!
//! One engine drives one service: poll the decision port, place orders
//! through the execution port, and commit each completed half-cycle through
//! the ledger. The loop runs until the service leaves the Active state or
//! the stop signal fires.

use crate::domain::error::DaytraderError;
use crate::domain::service::{ServiceState, TradingMode, TradingService};
use crate::ports::config_port::ConfigPort;
use crate::ports::decision_port::DecisionPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::ledger_port::LedgerPort;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Engine timing and retry parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
    pub rejected_backoff: Duration,
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(5),
            rejected_backoff: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            poll_interval: Duration::from_secs(
                config.get_int(
                    "engine",
                    "poll_interval_secs",
                    defaults.poll_interval.as_secs() as i64,
                ) as u64,
            ),
            retry_backoff: Duration::from_secs(
                config.get_int(
                    "engine",
                    "retry_backoff_secs",
                    defaults.retry_backoff.as_secs() as i64,
                ) as u64,
            ),
            rejected_backoff: Duration::from_secs(
                config.get_int(
                    "engine",
                    "rejected_backoff_secs",
                    defaults.rejected_backoff.as_secs() as i64,
                ) as u64,
            ),
            max_retries: config.get_int("engine", "max_retries", defaults.max_retries as i64)
                as u32,
        }
    }
}

pub struct TradingCycleEngine {
    ledger: Arc<dyn LedgerPort>,
    decision: Arc<dyn DecisionPort>,
    execution: Arc<dyn ExecutionPort>,
    config: EngineConfig,
    stop: watch::Receiver<bool>,
}

impl TradingCycleEngine {
    pub fn new(
        ledger: Arc<dyn LedgerPort>,
        decision: Arc<dyn DecisionPort>,
        execution: Arc<dyn ExecutionPort>,
        config: EngineConfig,
        stop: watch::Receiver<bool>,
    ) -> Self {
        TradingCycleEngine {
            ledger,
            decision,
            execution,
            config,
            stop,
        }
    }

    /// Drive the service until it stops. A fatal error (or an exhausted
    /// retry budget) parks the service in the Error state before returning.
    pub async fn run(mut self, service_id: i64) -> Result<(), DaytraderError> {
        info!(service_id, "trading cycle engine starting");
        match self.drive(service_id).await {
            Ok(()) => {
                info!(service_id, "trading cycle engine stopped");
                Ok(())
            }
            Err(err) => {
                warn!(service_id, error = %err, "trading cycle engine failed");
                // Best effort: the original failure is the one worth reporting.
                if let Err(state_err) =
                    self.ledger.set_service_state(service_id, ServiceState::Error)
                {
                    warn!(service_id, error = %state_err, "failed to record error state");
                }
                Err(err)
            }
        }
    }

    async fn drive(&mut self, service_id: i64) -> Result<(), DaytraderError> {
        let mut retries_left = self.config.max_retries;

        loop {
            if self.stopped() {
                return Ok(());
            }

            let service = self.ledger.service(service_id)?;
            if service.state != ServiceState::Active {
                debug!(service_id, state = service.state.as_str(), "service no longer active");
                return Ok(());
            }

            match self.step(&service).await {
                Ok(()) => {
                    retries_left = self.config.max_retries;
                    self.wait(self.config.poll_interval).await;
                }
                Err(err) if err.is_retryable() && retries_left > 0 => {
                    retries_left -= 1;
                    let backoff = match &err {
                        DaytraderError::ExecutionRejected { .. } => self.config.rejected_backoff,
                        _ => self.config.retry_backoff,
                    };
                    warn!(
                        service_id,
                        error = %err,
                        retries_left,
                        backoff_secs = backoff.as_secs(),
                        "retryable failure, backing off"
                    );
                    self.wait(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn step(&mut self, service: &TradingService) -> Result<(), DaytraderError> {
        match service.mode {
            TradingMode::Buy => self.try_buy(service).await,
            TradingMode::Sell => self.try_sell(service).await,
            TradingMode::Hold => Ok(()),
        }
    }

    async fn try_buy(&mut self, service: &TradingService) -> Result<(), DaytraderError> {
        if !self.decision.should_buy(&service.symbol).await? {
            debug!(service_id = service.id, symbol = %service.symbol, "buy signal negative");
            return Ok(());
        }
        // The signal may have raced a stop request; do not place new orders
        // after one arrives.
        if self.stopped() {
            return Ok(());
        }

        let fill = self
            .execution
            .purchase(&service.symbol, service.current_balance)
            .await?;
        if fill.quantity == 0 {
            debug!(
                service_id = service.id,
                symbol = %service.symbol,
                price = %fill.price,
                "fill came back empty, will retry next poll"
            );
            return Ok(());
        }

        let (updated, transaction) = self.ledger.open_transaction(service.id, &fill)?;
        info!(
            service_id = service.id,
            symbol = %service.symbol,
            transaction_id = transaction.id,
            shares = fill.quantity,
            price = %fill.price,
            balance = %updated.current_balance,
            "purchase committed"
        );
        Ok(())
    }

    async fn try_sell(&mut self, service: &TradingService) -> Result<(), DaytraderError> {
        if service.current_shares == 0 {
            return Err(DaytraderError::InvariantViolation {
                service_id: service.id,
                reason: "sell mode with no shares held".into(),
            });
        }
        let transaction = self.ledger.latest_open_transaction(service.id)?.ok_or(
            DaytraderError::InvariantViolation {
                service_id: service.id,
                reason: "sell mode with no open transaction".into(),
            },
        )?;

        if !self
            .decision
            .should_sell(&service.symbol, transaction.purchase_price)
            .await?
        {
            debug!(service_id = service.id, symbol = %service.symbol, "sell signal negative");
            return Ok(());
        }
        if self.stopped() {
            return Ok(());
        }

        let fill = self
            .execution
            .sell(&service.symbol, service.current_shares)
            .await?;

        let (updated, closed) =
            self.ledger
                .close_transaction(service.id, transaction.id, &fill)?;
        info!(
            service_id = service.id,
            symbol = %service.symbol,
            transaction_id = closed.id,
            price = %fill.price,
            gain_loss = %closed.gain_loss.unwrap_or_default(),
            balance = %updated.current_balance,
            "sale committed"
        );
        Ok(())
    }

    fn stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Sleep that a stop signal cuts short.
    async fn wait(&mut self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.stop.changed() => {}
        }
    }
}

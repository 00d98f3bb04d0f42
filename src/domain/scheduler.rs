//! Engine supervision: one running engine per service, at most.

use crate::domain::engine::{EngineConfig, TradingCycleEngine};
use crate::domain::error::DaytraderError;
use crate::domain::service::ServiceState;
use crate::ports::decision_port::DecisionPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::ledger_port::LedgerPort;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Whether a service currently has an engine task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Running,
    Idle,
}

struct EngineHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Result<(), DaytraderError>>,
}

/// Owns the engine tasks. `start` is single-flight per service id: a second
/// start while an engine is alive is rejected rather than queued.
pub struct Scheduler {
    ledger: Arc<dyn LedgerPort>,
    decision: Arc<dyn DecisionPort>,
    execution: Arc<dyn ExecutionPort>,
    config: EngineConfig,
    running: Mutex<HashMap<i64, EngineHandle>>,
}

impl Scheduler {
    pub fn new(
        ledger: Arc<dyn LedgerPort>,
        decision: Arc<dyn DecisionPort>,
        execution: Arc<dyn ExecutionPort>,
        config: EngineConfig,
    ) -> Self {
        Scheduler {
            ledger,
            decision,
            execution,
            config,
            running: Mutex::new(HashMap::new()),
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<i64, EngineHandle>> {
        let mut registry = self.running.lock().expect("scheduler registry poisoned");
        registry.retain(|_, handle| !handle.task.is_finished());
        registry
    }

    /// Launch an engine for the service. A stopped or errored service is
    /// re-activated first, resuming in the mode its holdings dictate.
    pub fn start(&self, service_id: i64) -> Result<(), DaytraderError> {
        let mut registry = self.registry();
        if registry.contains_key(&service_id) {
            return Err(DaytraderError::ConcurrentStartRejected { service_id });
        }

        let service = self.ledger.service(service_id)?;
        if service.state != ServiceState::Active {
            let updated = self.ledger.activate_service(service_id)?;
            info!(
                service_id,
                mode = updated.mode.as_str(),
                "service re-activated"
            );
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let engine = TradingCycleEngine::new(
            self.ledger.clone(),
            self.decision.clone(),
            self.execution.clone(),
            self.config.clone(),
            stop_rx,
        );
        let task = tokio::spawn(engine.run(service_id));
        registry.insert(service_id, EngineHandle { stop_tx, task });
        info!(service_id, "engine started");
        Ok(())
    }

    /// Deactivate the service and signal its engine, if one is running.
    /// The engine exits promptly even from the middle of a backoff wait.
    pub fn stop(&self, service_id: i64) -> Result<(), DaytraderError> {
        self.ledger
            .set_service_state(service_id, ServiceState::Inactive)?;
        if let Some(handle) = self.registry().get(&service_id) {
            // Receiver may already be gone if the task just finished.
            let _ = handle.stop_tx.send(true);
        }
        info!(service_id, "service stopped");
        Ok(())
    }

    pub fn status(&self, service_id: i64) -> EngineStatus {
        if self.registry().contains_key(&service_id) {
            EngineStatus::Running
        } else {
            EngineStatus::Idle
        }
    }

    /// Launch engines for every service the ledger holds in the Active
    /// state. Returns how many were started.
    pub fn start_active_services(&self) -> Result<usize, DaytraderError> {
        let mut started = 0;
        for service in self.ledger.list_services()? {
            if service.state == ServiceState::Active {
                match self.start(service.id) {
                    Ok(()) => started += 1,
                    Err(DaytraderError::ConcurrentStartRejected { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(started)
    }

    /// Signal every running engine and wait for all of them to finish.
    /// Persisted service states are left alone so the same services resume
    /// on the next boot.
    pub async fn shutdown(&self) {
        let handles: Vec<(i64, EngineHandle)> = {
            let mut registry = self.registry();
            registry.drain().collect()
        };
        for (_, handle) in &handles {
            let _ = handle.stop_tx.send(true);
        }
        for (service_id, handle) in handles {
            match handle.task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(service_id, error = %err, "engine exited with error"),
                Err(err) => warn!(service_id, error = %err, "engine task panicked"),
            }
        }
        info!("scheduler shut down");
    }
}

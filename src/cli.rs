//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::DaytraderError;
use crate::domain::service::NewService;

#[derive(Parser, Debug)]
#[command(name = "daytrader", about = "Automated buy/sell trading cycle service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new trading service
    Create {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        balance: String,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List all trading services
    List {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the transaction history of a service
    Transactions {
        #[arg(long)]
        service_id: i64,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Mark a service active so the next run picks it up
    Start {
        #[arg(long)]
        service_id: i64,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Mark a service inactive
    Stop {
        #[arg(long)]
        service_id: i64,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run engines for all active services until interrupted
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Create {
            symbol,
            balance,
            config,
        } => run_create(&symbol, &balance, &config),
        Command::List { config } => run_list(&config),
        Command::Transactions { service_id, config } => run_transactions(service_id, &config),
        Command::Start { service_id, config } => run_start(service_id, &config),
        Command::Stop { service_id, config } => run_stop(service_id, &config),
        Command::Run { config } => run_engines(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = DaytraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

#[cfg(feature = "sqlite")]
fn open_ledger(
    config: &FileConfigAdapter,
) -> Result<crate::adapters::sqlite_ledger::SqliteLedger, ExitCode> {
    use crate::adapters::sqlite_ledger::SqliteLedger;

    let ledger = SqliteLedger::from_config(config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    ledger.initialize_schema().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(ledger)
}

fn run_create(symbol: &str, balance: &str, config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let balance = match Decimal::from_str(balance) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: invalid balance {balance}: {e}");
            return ExitCode::from(2);
        }
    };

    let new = match NewService::new(symbol, balance) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::ports::ledger_port::LedgerPort;

        let ledger = match open_ledger(&config) {
            Ok(l) => l,
            Err(code) => return code,
        };

        match ledger.create_service(&new) {
            Ok(service) => {
                println!(
                    "created service {} for {} with balance {}",
                    service.id, service.symbol, service.starting_balance
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(&e)
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, new);
        eprintln!("error: sqlite feature is required for create");
        ExitCode::from(1)
    }
}

fn run_list(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::ports::ledger_port::LedgerPort;

        let ledger = match open_ledger(&config) {
            Ok(l) => l,
            Err(code) => return code,
        };

        let services = match ledger.list_services() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(&e);
            }
        };

        if services.is_empty() {
            eprintln!("no services");
            return ExitCode::SUCCESS;
        }

        for service in &services {
            println!(
                "{}  {}  {}  {}  balance {}  shares {}  gain/loss {}  buys {}  sells {}",
                service.id,
                service.symbol,
                service.state.as_str(),
                service.mode.as_str(),
                service.current_balance,
                service.current_shares,
                service.total_gain_loss,
                service.buy_count,
                service.sell_count,
            );
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        eprintln!("error: sqlite feature is required for list");
        ExitCode::from(1)
    }
}

fn run_transactions(service_id: i64, config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::ports::ledger_port::LedgerPort;

        let ledger = match open_ledger(&config) {
            Ok(l) => l,
            Err(code) => return code,
        };

        let transactions = match ledger.transactions_for_service(service_id) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(&e);
            }
        };

        if transactions.is_empty() {
            eprintln!("no transactions for service {service_id}");
            return ExitCode::SUCCESS;
        }

        for tx in &transactions {
            let sale = match (tx.sale_price, tx.gain_loss) {
                (Some(price), Some(gain)) => format!("sold at {price}, gain/loss {gain}"),
                _ => "open".to_string(),
            };
            println!(
                "{}  {}  {}  {} shares at {}  {}",
                tx.id,
                tx.state.as_str(),
                tx.symbol,
                tx.shares,
                tx.purchase_price,
                sale,
            );
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, service_id);
        eprintln!("error: sqlite feature is required for transactions");
        ExitCode::from(1)
    }
}

fn run_start(service_id: i64, config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::ports::ledger_port::LedgerPort;

        let ledger = match open_ledger(&config) {
            Ok(l) => l,
            Err(code) => return code,
        };

        // One commit: activate and resume in the mode the holdings dictate.
        match ledger.activate_service(service_id) {
            Ok(updated) => {
                println!(
                    "service {} active in {} mode; `daytrader run` will pick it up",
                    updated.id,
                    updated.mode.as_str()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(&e)
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, service_id);
        eprintln!("error: sqlite feature is required for start");
        ExitCode::from(1)
    }
}

fn run_stop(service_id: i64, config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::domain::service::ServiceState;
        use crate::ports::ledger_port::LedgerPort;

        let ledger = match open_ledger(&config) {
            Ok(l) => l,
            Err(code) => return code,
        };

        match ledger.set_service_state(service_id, ServiceState::Inactive) {
            Ok(updated) => {
                println!("service {} is now inactive", updated.id);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(&e)
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, service_id);
        eprintln!("error: sqlite feature is required for stop");
        ExitCode::from(1)
    }
}

fn run_engines(config_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::mock_market::{MockDecisionAdapter, MockExecutionAdapter};
        use crate::domain::engine::EngineConfig;
        use crate::domain::scheduler::Scheduler;
        use crate::ports::config_port::ConfigPort;
        use std::sync::Arc;
        use tracing_subscriber::EnvFilter;

        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();

        eprintln!("Loading config from {}", config_path.display());
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };

        let ledger = match open_ledger(&config) {
            Ok(l) => Arc::new(l),
            Err(code) => return code,
        };

        let (decision, execution) = match config.get_int("market", "seed", -1) {
            seed if seed >= 0 => (
                Arc::new(MockDecisionAdapter::with_seed(seed as u64)),
                Arc::new(MockExecutionAdapter::with_seed(seed as u64)),
            ),
            _ => (
                Arc::new(MockDecisionAdapter::new()),
                Arc::new(MockExecutionAdapter::new()),
            ),
        };

        let engine_config = EngineConfig::from_config(&config);
        let scheduler = Scheduler::new(ledger, decision, execution, engine_config);

        tokio::runtime::Runtime::new()
            .expect("failed to start tokio runtime")
            .block_on(async {
                match scheduler.start_active_services() {
                    Ok(0) => {
                        eprintln!("no active services; create one with `daytrader create`");
                        return ExitCode::SUCCESS;
                    }
                    Ok(started) => eprintln!("{started} service(s) running, ctrl-c to stop"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return ExitCode::from(&e);
                    }
                }

                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("error: failed to listen for ctrl-c: {e}");
                }
                eprintln!("shutting down...");
                scheduler.shutdown().await;
                ExitCode::SUCCESS
            })
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config_path;
        eprintln!("error: sqlite feature is required for run");
        ExitCode::from(1)
    }
}

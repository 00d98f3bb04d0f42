//! SQLite ledger adapter.
//!
//! Decimal amounts are stored as TEXT to keep them exact; timestamps as
//! RFC 3339 TEXT. Each ledger operation runs inside its own SQL transaction
//! so the service row and the transaction row always move together.

use crate::domain::cycle::{self, PurchaseFill, SaleFill};
use crate::domain::error::DaytraderError;
use crate::domain::service::{NewService, ServiceState, TradingMode, TradingService};
use crate::domain::transaction::{Transaction, TransactionState};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct SqliteLedger {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLedger {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, DaytraderError> {
        let db_path =
            config
                .get_string("ledger", "path")
                .ok_or_else(|| DaytraderError::ConfigMissing {
                    section: "ledger".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("ledger", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| DaytraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, DaytraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| DaytraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), DaytraderError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trading_services (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                starting_balance TEXT NOT NULL,
                current_balance TEXT NOT NULL,
                current_shares INTEGER NOT NULL,
                total_gain_loss TEXT NOT NULL,
                buy_count INTEGER NOT NULL,
                sell_count INTEGER NOT NULL,
                state TEXT NOT NULL,
                mode TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS trading_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service_id INTEGER NOT NULL REFERENCES trading_services(id),
                symbol TEXT NOT NULL,
                shares INTEGER NOT NULL,
                purchase_price TEXT NOT NULL,
                purchase_date TEXT NOT NULL,
                state TEXT NOT NULL,
                sale_price TEXT,
                sale_date TEXT,
                gain_loss TEXT,
                notes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_service_state
                ON trading_transactions(service_id, state);",
        )
        .map_err(|e: rusqlite::Error| DaytraderError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, DaytraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| DaytraderError::Database {
                reason: e.to_string(),
            })
    }
}

fn query_err(e: rusqlite::Error) -> DaytraderError {
    DaytraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_decimal(value: &str, idx: usize) -> Result<Decimal, rusqlite::Error> {
    Decimal::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(value: &str, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn service_from_row(row: &rusqlite::Row<'_>) -> Result<TradingService, rusqlite::Error> {
    let starting: String = row.get(2)?;
    let current: String = row.get(3)?;
    let gain_loss: String = row.get(5)?;
    let state: String = row.get(8)?;
    let mode: String = row.get(9)?;
    let created: String = row.get(10)?;
    let shares: i64 = row.get(4)?;

    Ok(TradingService {
        id: row.get(0)?,
        symbol: row.get(1)?,
        starting_balance: parse_decimal(&starting, 2)?,
        current_balance: parse_decimal(&current, 3)?,
        current_shares: shares as u64,
        total_gain_loss: parse_decimal(&gain_loss, 5)?,
        buy_count: row.get::<_, i64>(6)? as u32,
        sell_count: row.get::<_, i64>(7)? as u32,
        state: ServiceState::parse(&state).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                format!("unknown service state: {state}").into(),
            )
        })?,
        mode: TradingMode::parse(&mode).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                9,
                rusqlite::types::Type::Text,
                format!("unknown trading mode: {mode}").into(),
            )
        })?,
        created_at: parse_timestamp(&created, 10)?,
    })
}

fn transaction_from_row(row: &rusqlite::Row<'_>) -> Result<Transaction, rusqlite::Error> {
    let purchase_price: String = row.get(4)?;
    let purchase_date: String = row.get(5)?;
    let state: String = row.get(6)?;
    let sale_price: Option<String> = row.get(7)?;
    let sale_date: Option<String> = row.get(8)?;
    let gain_loss: Option<String> = row.get(9)?;
    let shares: i64 = row.get(3)?;

    Ok(Transaction {
        id: row.get(0)?,
        service_id: row.get(1)?,
        symbol: row.get(2)?,
        shares: shares as u64,
        purchase_price: parse_decimal(&purchase_price, 4)?,
        purchase_date: parse_timestamp(&purchase_date, 5)?,
        state: TransactionState::parse(&state).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("unknown transaction state: {state}").into(),
            )
        })?,
        sale_price: sale_price.as_deref().map(|v| parse_decimal(v, 7)).transpose()?,
        sale_date: sale_date.as_deref().map(|v| parse_timestamp(v, 8)).transpose()?,
        gain_loss: gain_loss.as_deref().map(|v| parse_decimal(v, 9)).transpose()?,
        notes: row.get(10)?,
    })
}

const SERVICE_COLUMNS: &str = "id, symbol, starting_balance, current_balance, current_shares,
     total_gain_loss, buy_count, sell_count, state, mode, created_at";

const TRANSACTION_COLUMNS: &str = "id, service_id, symbol, shares, purchase_price, purchase_date,
     state, sale_price, sale_date, gain_loss, notes";

fn fetch_service(
    conn: &rusqlite::Connection,
    service_id: i64,
) -> Result<TradingService, DaytraderError> {
    let query = format!("SELECT {SERVICE_COLUMNS} FROM trading_services WHERE id = ?1");
    conn.query_row(&query, params![service_id], service_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DaytraderError::ServiceNotFound { service_id }
            }
            other => query_err(other),
        })
}

fn fetch_transaction(
    conn: &rusqlite::Connection,
    transaction_id: i64,
) -> Result<Transaction, DaytraderError> {
    let query = format!("SELECT {TRANSACTION_COLUMNS} FROM trading_transactions WHERE id = ?1");
    conn.query_row(&query, params![transaction_id], transaction_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DaytraderError::TransactionNotFound { transaction_id }
            }
            other => query_err(other),
        })
}

fn store_service(
    conn: &rusqlite::Connection,
    service: &TradingService,
) -> Result<(), DaytraderError> {
    conn.execute(
        "UPDATE trading_services SET current_balance = ?1, current_shares = ?2,
             total_gain_loss = ?3, buy_count = ?4, sell_count = ?5, state = ?6, mode = ?7
         WHERE id = ?8",
        params![
            service.current_balance.to_string(),
            service.current_shares as i64,
            service.total_gain_loss.to_string(),
            service.buy_count as i64,
            service.sell_count as i64,
            service.state.as_str(),
            service.mode.as_str(),
            service.id,
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

fn store_transaction(
    conn: &rusqlite::Connection,
    transaction: &Transaction,
) -> Result<(), DaytraderError> {
    conn.execute(
        "UPDATE trading_transactions SET state = ?1, sale_price = ?2, sale_date = ?3,
             gain_loss = ?4, notes = ?5
         WHERE id = ?6",
        params![
            transaction.state.as_str(),
            transaction.sale_price.map(|p| p.to_string()),
            transaction.sale_date.map(|d| d.to_rfc3339()),
            transaction.gain_loss.map(|g| g.to_string()),
            transaction.notes,
            transaction.id,
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

impl LedgerPort for SqliteLedger {
    fn create_service(&self, new: &NewService) -> Result<TradingService, DaytraderError> {
        let conn = self.conn()?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO trading_services (symbol, starting_balance, current_balance,
                 current_shares, total_gain_loss, buy_count, sell_count, state, mode, created_at)
             VALUES (?1, ?2, ?2, 0, '0', 0, 0, ?3, ?4, ?5)",
            params![
                new.symbol,
                new.starting_balance.to_string(),
                ServiceState::Active.as_str(),
                TradingMode::Buy.as_str(),
                created_at.to_rfc3339(),
            ],
        )
        .map_err(query_err)?;

        fetch_service(&conn, conn.last_insert_rowid())
    }

    fn service(&self, service_id: i64) -> Result<TradingService, DaytraderError> {
        let conn = self.conn()?;
        fetch_service(&conn, service_id)
    }

    fn list_services(&self) -> Result<Vec<TradingService>, DaytraderError> {
        let conn = self.conn()?;
        let query = format!("SELECT {SERVICE_COLUMNS} FROM trading_services ORDER BY id");
        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt.query_map([], service_from_row).map_err(query_err)?;

        let mut services = Vec::new();
        for row in rows {
            services.push(row.map_err(query_err)?);
        }
        Ok(services)
    }

    fn set_service_state(
        &self,
        service_id: i64,
        state: ServiceState,
    ) -> Result<TradingService, DaytraderError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE trading_services SET state = ?1 WHERE id = ?2",
                params![state.as_str(), service_id],
            )
            .map_err(query_err)?;
        if changed == 0 {
            return Err(DaytraderError::ServiceNotFound { service_id });
        }
        fetch_service(&conn, service_id)
    }

    fn set_service_mode(
        &self,
        service_id: i64,
        mode: TradingMode,
    ) -> Result<TradingService, DaytraderError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE trading_services SET mode = ?1 WHERE id = ?2",
                params![mode.as_str(), service_id],
            )
            .map_err(query_err)?;
        if changed == 0 {
            return Err(DaytraderError::ServiceNotFound { service_id });
        }
        fetch_service(&conn, service_id)
    }

    fn activate_service(&self, service_id: i64) -> Result<TradingService, DaytraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut service = fetch_service(&tx, service_id)?;
        service.mode = service.resume_mode();
        service.state = ServiceState::Active;
        store_service(&tx, &service)?;

        tx.commit().map_err(query_err)?;
        Ok(service)
    }

    fn open_transaction(
        &self,
        service_id: i64,
        fill: &PurchaseFill,
    ) -> Result<(TradingService, Transaction), DaytraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let open_count: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM trading_transactions WHERE service_id = ?1 AND state = ?2",
                params![service_id, TransactionState::Open.as_str()],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        if open_count > 0 {
            return Err(DaytraderError::OpenTransactionExists { service_id });
        }

        let mut service = fetch_service(&tx, service_id)?;
        cycle::apply_purchase(&mut service, fill)?;

        tx.execute(
            "INSERT INTO trading_transactions (service_id, symbol, shares, purchase_price,
                 purchase_date, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                service_id,
                service.symbol,
                fill.quantity as i64,
                fill.price.to_string(),
                fill.executed_at.to_rfc3339(),
                TransactionState::Open.as_str(),
            ],
        )
        .map_err(query_err)?;
        let transaction_id = tx.last_insert_rowid();

        store_service(&tx, &service)?;
        let transaction = fetch_transaction(&tx, transaction_id)?;

        tx.commit().map_err(query_err)?;
        Ok((service, transaction))
    }

    fn close_transaction(
        &self,
        service_id: i64,
        transaction_id: i64,
        fill: &SaleFill,
    ) -> Result<(TradingService, Transaction), DaytraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut service = fetch_service(&tx, service_id)?;
        let mut transaction = fetch_transaction(&tx, transaction_id)?;

        cycle::apply_sale(&mut service, &mut transaction, fill)?;

        store_service(&tx, &service)?;
        store_transaction(&tx, &transaction)?;

        tx.commit().map_err(query_err)?;
        Ok((service, transaction))
    }

    fn latest_open_transaction(
        &self,
        service_id: i64,
    ) -> Result<Option<Transaction>, DaytraderError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM trading_transactions
             WHERE service_id = ?1 AND state = ?2
             ORDER BY id DESC LIMIT 1"
        );
        let result = conn.query_row(
            &query,
            params![service_id, TransactionState::Open.as_str()],
            transaction_from_row,
        );
        match result {
            Ok(transaction) => Ok(Some(transaction)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(query_err(e)),
        }
    }

    fn cancel_transaction(
        &self,
        transaction_id: i64,
        notes: &str,
    ) -> Result<Transaction, DaytraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut transaction = fetch_transaction(&tx, transaction_id)?;
        transaction.cancel(notes)?;
        store_transaction(&tx, &transaction)?;

        tx.commit().map_err(query_err)?;
        Ok(transaction)
    }

    fn transactions_for_service(
        &self,
        service_id: i64,
    ) -> Result<Vec<Transaction>, DaytraderError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM trading_transactions
             WHERE service_id = ?1 ORDER BY id"
        );
        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map(params![service_id], transaction_from_row)
            .map_err(query_err)?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row.map_err(query_err)?);
        }
        Ok(transactions)
    }
}

//! sqlite-adapter — SQLite implementation of the `AccountStore` port.
//!
//! Purpose
//! - Back the `BankAccountMapper` with a real relational table
//!   `bankaccount(id INTEGER PRIMARY KEY, balance TEXT)`.
//! - Load and dump flat datasets (see [`fixture`]) so tests can seed the table
//!   and compare its contents after an operation.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Balances are stored as their decimal text so every digit survives a
//!   save and reload.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use domain::{AccountId, AccountRow, AccountStore, CoreError};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use tracing::{debug, info};

pub mod fixture;

const SCHEMA: &str = include_str!("../sql/bankaccount.sql");

/// SQLite-backed `bankaccount` table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        debug!(path = %path.display(), "sqlite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private in-memory database; gone when the store is dropped.
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }

    /// Replace the table contents with `rows` in one transaction.
    pub fn load_rows(&self, rows: &[AccountRow]) -> Result<(), CoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        tx.execute("DELETE FROM bankaccount", []).map_err(map_sqerr)?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO bankaccount(id, balance) VALUES (?1, ?2)")
                .map_err(map_sqerr)?;
            for row in rows {
                stmt.execute(params![row.id.as_i64(), to_sql_balance(row.balance)])
                    .map_err(map_insert_err)?;
            }
        }
        tx.commit().map_err(map_sqerr)?;
        info!(count = rows.len(), "bankaccount table loaded");
        Ok(())
    }

    /// Current table contents ordered by id.
    pub fn rows(&self) -> Result<Vec<AccountRow>, CoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, balance FROM bankaccount ORDER BY id")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_account(row)?);
        }
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(SCHEMA).map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn map_insert_err(e: rusqlite::Error) -> CoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return CoreError::AlreadyExists;
        }
    }
    map_sqerr(e)
}

fn to_sql_balance(balance: Decimal) -> String {
    balance.to_string()
}

fn row_to_account(row: &rusqlite::Row) -> Result<AccountRow, CoreError> {
    let id: i64 = row.get(0).map_err(map_sqerr)?;
    let raw: String = row.get(1).map_err(map_sqerr)?;
    let balance = Decimal::from_str(&raw)
        .map_err(|e| CoreError::Repository(format!("bad balance in db '{raw}': {e}")))?;
    Ok(AccountRow::new(id, balance))
}

impl AccountStore for SqliteStore {
    fn all_ids(&self) -> Result<Vec<AccountId>, CoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id FROM bankaccount ORDER BY id")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            let id: i64 = row.get(0).map_err(map_sqerr)?;
            out.push(AccountId::new(id));
        }
        Ok(out)
    }

    fn fetch(&self, id: AccountId) -> Result<Option<AccountRow>, CoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, balance FROM bankaccount WHERE id = ?1")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![id.as_i64()]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(row_to_account(row)?))
        } else {
            Ok(None)
        }
    }

    fn exists(&self, id: AccountId) -> Result<bool, CoreError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM bankaccount WHERE id = ?1",
                params![id.as_i64()],
                |row| row.get(0),
            )
            .map_err(map_sqerr)?;
        Ok(count > 0)
    }

    fn insert(&self, balance: Decimal) -> Result<AccountId, CoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO bankaccount(balance) VALUES (?1)",
            params![to_sql_balance(balance)],
        )
        .map_err(map_insert_err)?;
        Ok(AccountId::new(conn.last_insert_rowid()))
    }

    fn update(&self, row: &AccountRow) -> Result<(), CoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE bankaccount SET balance = ?1 WHERE id = ?2",
                params![to_sql_balance(row.balance), row.id.as_i64()],
            )
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn delete(&self, id: AccountId) -> Result<(), CoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM bankaccount WHERE id = ?1", params![id.as_i64()])
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }
}

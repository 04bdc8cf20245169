//! Domain library for the bank account mapper.
//!
//! Holds the `BankAccount` entity, the `AccountStore` port (trait) that
//! storage adapters implement, the identity-mapped `BankAccountMapper`, and
//! the error definitions. Keep driver and IO concerns out of this crate.

use std::error::Error;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of a persisted bank account (the table's integer primary key).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for AccountId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-memory bank account entity.
///
/// The id stays `None` until the mapper inserts the account; it is assigned
/// once and never changes afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BankAccount {
    id: Option<AccountId>,
    balance: Decimal,
}

impl BankAccount {
    /// A fresh, unpersisted account with a zero balance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an account from a stored row.
    pub(crate) fn restore(row: &AccountRow) -> Self {
        Self {
            id: Some(row.id),
            balance: row.balance,
        }
    }

    pub fn id(&self) -> Option<AccountId> {
        self.id
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Add `amount` to the balance.
    pub fn deposit_money(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount < Decimal::ZERO {
            return Err(AccountError::NegativeAmount(amount));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(AccountError::Overflow)?;
        Ok(())
    }

    /// Take `amount` off the balance. Overdrafts are rejected and leave the
    /// balance untouched.
    pub fn withdraw_money(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount < Decimal::ZERO {
            return Err(AccountError::NegativeAmount(amount));
        }
        if amount > self.balance {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(AccountError::Overflow)?;
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: AccountId) {
        debug_assert!(self.id.is_none(), "account id is assigned once");
        self.id = Some(id);
    }

    /// The store-side shape of this account, if it has been persisted.
    pub fn to_row(&self) -> Option<AccountRow> {
        self.id.map(|id| AccountRow {
            id,
            balance: self.balance,
        })
    }
}

/// One row of the `bankaccount` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: AccountId,
    pub balance: Decimal,
}

impl AccountRow {
    pub fn new(id: impl Into<AccountId>, balance: Decimal) -> Self {
        Self {
            id: id.into(),
            balance,
        }
    }
}

/// Store port for the `bankaccount` table.
///
/// Every call is a single request/response against the store. `update` and
/// `delete` report `CoreError::NotFound` when no row carries the id.
pub trait AccountStore: Send + Sync {
    /// All persisted ids in ascending order.
    fn all_ids(&self) -> Result<Vec<AccountId>, CoreError>;
    fn fetch(&self, id: AccountId) -> Result<Option<AccountRow>, CoreError>;
    fn exists(&self, id: AccountId) -> Result<bool, CoreError>;
    /// Insert a new row and return the id the store generated for it.
    fn insert(&self, balance: Decimal) -> Result<AccountId, CoreError>;
    fn update(&self, row: &AccountRow) -> Result<(), CoreError>;
    fn delete(&self, id: AccountId) -> Result<(), CoreError>;
}

/// Store-level errors (no external error crates to keep deps small).
#[derive(Debug)]
pub enum CoreError {
    AlreadyExists,
    NotFound,
    Repository(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::AlreadyExists => write!(f, "row already exists"),
            CoreError::NotFound => write!(f, "not found"),
            CoreError::Repository(msg) => write!(f, "repository error: {}", msg),
        }
    }
}

impl Error for CoreError {}

/// Balance mutation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    NegativeAmount(Decimal),
    InsufficientFunds { balance: Decimal, requested: Decimal },
    /// The resulting balance does not fit in a `Decimal`.
    Overflow,
}

impl Display for AccountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountError::NegativeAmount(amount) => {
                write!(f, "amount must not be negative: {}", amount)
            }
            AccountError::InsufficientFunds { balance, requested } => write!(
                f,
                "insufficient funds: balance {} is less than {}",
                balance, requested
            ),
            AccountError::Overflow => write!(f, "balance overflow"),
        }
    }
}

impl Error for AccountError {}

/// Return a short about/version line for binaries to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{}: bank account domain library", pkg, ver)
}

pub mod adapters;
pub mod mapper;

pub use mapper::{AccountHandle, BankAccountMapper, ErrorKind, MapperError};

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal")
    }

    #[test]
    fn new_account_is_unpersisted_with_zero_balance() {
        let ba = BankAccount::new();
        assert_eq!(ba.id(), None);
        assert!(!ba.is_persisted());
        assert_eq!(ba.balance(), Decimal::ZERO);
        assert!(ba.to_row().is_none());
    }

    #[test]
    fn deposit_then_withdraw() {
        let mut ba = BankAccount::new();
        ba.deposit_money(dec("2.50")).unwrap();
        ba.withdraw_money(dec("1")).unwrap();
        assert_eq!(ba.balance(), dec("1.5"));
    }

    #[test]
    fn withdraw_rejects_overdraft_and_keeps_balance() {
        let mut ba = BankAccount::restore(&AccountRow::new(1, dec("1.0")));
        let err = ba.withdraw_money(dec("1.01")).unwrap_err();
        assert!(matches!(err, AccountError::InsufficientFunds { .. }));
        assert_eq!(ba.balance(), dec("1.0"));

        ba.withdraw_money(dec("1")).unwrap();
        assert_eq!(ba.balance(), Decimal::ZERO);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let mut ba = BankAccount::new();
        assert!(matches!(
            ba.deposit_money(dec("-1")),
            Err(AccountError::NegativeAmount(_))
        ));
        assert!(matches!(
            ba.withdraw_money(dec("-1")),
            Err(AccountError::NegativeAmount(_))
        ));
        assert_eq!(ba.balance(), Decimal::ZERO);
    }

    #[test]
    fn deposit_overflow_is_an_error() {
        let mut ba = BankAccount::new();
        ba.deposit_money(Decimal::MAX).unwrap();
        let err = ba.deposit_money(Decimal::ONE).unwrap_err();
        assert_eq!(err, AccountError::Overflow);
        assert_eq!(ba.balance(), Decimal::MAX);
    }

    #[test]
    fn restore_carries_id_and_balance() {
        let row = AccountRow::new(7, dec("3.25"));
        let ba = BankAccount::restore(&row);
        assert_eq!(ba.id(), Some(AccountId::new(7)));
        assert_eq!(ba.to_row(), Some(row));
    }

    #[test]
    fn account_id_displays_raw_value() {
        assert_eq!(AccountId::new(42).to_string(), "42");
        assert!(AccountId::new(1) < AccountId::new(2));
    }
}

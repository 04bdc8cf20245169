use std::collections::BTreeMap;
use std::sync::Mutex;

use rust_decimal::Decimal;

use crate::{AccountId, AccountRow, AccountStore, CoreError};

/// Simple in-memory `bankaccount` table; nothing is persisted.
///
/// New ids follow the SQLite rowid rule: one past the largest id present.
pub struct InMemoryStore {
    inner: Mutex<BTreeMap<AccountId, Decimal>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// A store pre-populated with `rows`. Later rows win on duplicate ids.
    pub fn with_rows<I: IntoIterator<Item = AccountRow>>(rows: I) -> Self {
        let map = rows.into_iter().map(|r| (r.id, r.balance)).collect();
        Self {
            inner: Mutex::new(map),
        }
    }

    /// Replace the table contents with `rows`.
    pub fn load_rows(&self, rows: &[AccountRow]) -> Result<(), CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        map.clear();
        map.extend(rows.iter().map(|r| (r.id, r.balance)));
        Ok(())
    }

    /// Current contents ordered by id.
    pub fn rows(&self) -> Vec<AccountRow> {
        match self.inner.lock() {
            Ok(map) => map
                .iter()
                .map(|(id, balance)| AccountRow::new(*id, *balance))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for InMemoryStore {
    fn all_ids(&self) -> Result<Vec<AccountId>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.keys().copied().collect())
    }

    fn fetch(&self, id: AccountId) -> Result<Option<AccountRow>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.get(&id).map(|balance| AccountRow::new(id, *balance)))
    }

    fn exists(&self, id: AccountId) -> Result<bool, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.contains_key(&id))
    }

    fn insert(&self, balance: Decimal) -> Result<AccountId, CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let next = match map.keys().next_back() {
            Some(last) => last
                .as_i64()
                .checked_add(1)
                .ok_or_else(|| CoreError::Repository("id space exhausted".into()))?,
            None => 1,
        };
        let id = AccountId::new(next);
        map.insert(id, balance);
        Ok(id)
    }

    fn update(&self, row: &AccountRow) -> Result<(), CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        match map.get_mut(&row.id) {
            Some(balance) => {
                *balance = row.balance;
                Ok(())
            }
            None => Err(CoreError::NotFound),
        }
    }

    fn delete(&self, id: AccountId) -> Result<(), CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        match map.remove(&id) {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn insert_generates_sequential_ids() {
        let store = InMemoryStore::new();
        let a = store.insert(Decimal::ZERO).unwrap();
        let b = store.insert(dec("5")).unwrap();
        assert_eq!(a, AccountId::new(1));
        assert_eq!(b, AccountId::new(2));
        assert_eq!(store.all_ids().unwrap(), vec![a, b]);
    }

    #[test]
    fn insert_continues_after_seeded_rows() {
        let store =
            InMemoryStore::with_rows([AccountRow::new(1, dec("1")), AccountRow::new(2, dec("2"))]);
        assert_eq!(store.insert(Decimal::ZERO).unwrap(), AccountId::new(3));
    }

    #[test]
    fn update_and_delete_missing_rows_report_not_found() {
        let store = InMemoryStore::new();
        let err = store.update(&AccountRow::new(9, dec("1"))).unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
        let err = store.delete(AccountId::new(9)).unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
    }

    #[test]
    fn load_rows_replaces_contents() {
        let store = InMemoryStore::with_rows([AccountRow::new(5, dec("5"))]);
        store.load_rows(&[AccountRow::new(1, dec("1.0"))]).unwrap();
        assert_eq!(store.rows(), vec![AccountRow::new(1, dec("1.0"))]);
        assert!(!store.exists(AccountId::new(5)).unwrap());
        assert_eq!(
            store.fetch(AccountId::new(1)).unwrap(),
            Some(AccountRow::new(1, dec("1")))
        );
    }
}

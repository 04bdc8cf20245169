use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::{AccountError, AccountId, AccountStore, BankAccount, CoreError};

/// Shared reference to the single live instance of an account.
///
/// Cloning the handle clones the reference, not the account. Two handles
/// point at the same instance iff [`AccountHandle::ptr_eq`] holds.
#[derive(Clone, Debug, Default)]
pub struct AccountHandle(Arc<Mutex<BankAccount>>);

impl AccountHandle {
    pub fn new(account: BankAccount) -> Self {
        Self(Arc::new(Mutex::new(account)))
    }

    /// Lock the account, ignoring poisoning.
    pub fn lock(&self) -> MutexGuard<'_, BankAccount> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Option<AccountId> {
        self.lock().id()
    }

    pub fn balance(&self) -> Decimal {
        self.lock().balance()
    }

    pub fn deposit_money(&self, amount: Decimal) -> Result<(), AccountError> {
        self.lock().deposit_money(amount)
    }

    pub fn withdraw_money(&self, amount: Decimal) -> Result<(), AccountError> {
        self.lock().withdraw_money(amount)
    }

    pub fn ptr_eq(&self, other: &AccountHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<BankAccount> for AccountHandle {
    fn from(account: BankAccount) -> Self {
        Self::new(account)
    }
}

/// Coarse classification of mapper failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// No row matches the requested id.
    NotFound,
    /// The entity's persistence state rules the operation out.
    Mapper,
    /// The underlying store failed.
    Store,
}

#[derive(Debug)]
pub enum MapperError {
    /// `find_by_id` found no account with this id.
    NotFound(AccountId),
    /// The entity was inserted before.
    AlreadyPersisted(AccountId),
    /// The entity was never inserted.
    NotPersisted,
    /// The entity carries an id but its row is gone.
    UnknownAccount(AccountId),
    Store(CoreError),
}

impl MapperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapperError::NotFound(_) => ErrorKind::NotFound,
            MapperError::AlreadyPersisted(_)
            | MapperError::NotPersisted
            | MapperError::UnknownAccount(_) => ErrorKind::Mapper,
            MapperError::Store(_) => ErrorKind::Store,
        }
    }
}

impl Display for MapperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MapperError::NotFound(id) => write!(f, "no account with id {}", id),
            MapperError::AlreadyPersisted(id) => {
                write!(f, "account {} is already persisted", id)
            }
            MapperError::NotPersisted => write!(f, "account has not been persisted"),
            MapperError::UnknownAccount(id) => write!(f, "account {} does not exist", id),
            MapperError::Store(e) => write!(f, "store failure: {}", e),
        }
    }
}

impl Error for MapperError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MapperError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoreError> for MapperError {
    fn from(e: CoreError) -> Self {
        MapperError::Store(e)
    }
}

/// Data mapper between [`BankAccount`] entities and an [`AccountStore`].
///
/// The mapper borrows the store for its whole lifetime and never opens or
/// closes it. It keeps an identity map so that every lookup of a tracked id
/// hands back the same [`AccountHandle`] without going to the store again.
/// Preconditions of `insert`, `update` and `delete` are checked before the
/// store is touched.
pub struct BankAccountMapper<'s, S: AccountStore + ?Sized> {
    store: &'s S,
    identity_map: Mutex<HashMap<AccountId, AccountHandle>>,
}

impl<'s, S: AccountStore + ?Sized> BankAccountMapper<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            identity_map: Mutex::new(HashMap::new()),
        }
    }

    fn tracked(&self) -> MutexGuard<'_, HashMap<AccountId, AccountHandle>> {
        self.identity_map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Ids of every persisted account, ascending.
    pub fn get_all_ids(&self) -> Result<Vec<AccountId>, MapperError> {
        Ok(self.store.all_ids()?)
    }

    /// Look an account up, preferring the instance already in the identity map.
    pub fn find_by_id(&self, id: AccountId) -> Result<AccountHandle, MapperError> {
        let mut map = self.tracked();
        if let Some(handle) = map.get(&id) {
            debug!(%id, "identity map hit");
            return Ok(handle.clone());
        }

        debug!(%id, "identity map miss");
        let row = self
            .store
            .fetch(id)?
            .ok_or(MapperError::NotFound(id))?;
        let handle = AccountHandle::new(BankAccount::restore(&row));
        map.insert(id, handle.clone());
        Ok(handle)
    }

    /// Persist a never-inserted account and start tracking it.
    pub fn insert(&self, account: &AccountHandle) -> Result<(), MapperError> {
        let mut entity = account.lock();
        if let Some(id) = entity.id() {
            warn!(%id, "refusing to insert an already persisted account");
            return Err(MapperError::AlreadyPersisted(id));
        }

        // Held across the store insert so no lookup can materialize the new
        // row before this handle is registered. Lock order: account, then map.
        let mut map = self.tracked();
        let id = self.store.insert(entity.balance())?;
        entity.assign_id(id);
        map.insert(id, account.clone());
        drop(map);
        drop(entity);

        info!(%id, "account inserted");
        Ok(())
    }

    /// Write the account's current balance back to its row.
    pub fn update(&self, account: &AccountHandle) -> Result<(), MapperError> {
        let Some(row) = account.lock().to_row() else {
            warn!("refusing to update an unpersisted account");
            return Err(MapperError::NotPersisted);
        };
        self.ensure_exists(row.id)?;

        self.store.update(&row).map_err(|e| match e {
            CoreError::NotFound => MapperError::UnknownAccount(row.id),
            other => MapperError::Store(other),
        })?;
        info!(id = %row.id, balance = %row.balance, "account updated");
        Ok(())
    }

    /// Remove the account's row and stop tracking it.
    pub fn delete(&self, account: &AccountHandle) -> Result<(), MapperError> {
        let Some(id) = account.id() else {
            warn!("refusing to delete an unpersisted account");
            return Err(MapperError::NotPersisted);
        };
        self.ensure_exists(id)?;

        self.store.delete(id).map_err(|e| match e {
            CoreError::NotFound => MapperError::UnknownAccount(id),
            other => MapperError::Store(other),
        })?;
        self.tracked().remove(&id);
        info!(%id, "account deleted");
        Ok(())
    }

    /// Whether the identity map currently holds an instance for `id`.
    pub fn is_tracked(&self, id: AccountId) -> bool {
        self.tracked().contains_key(&id)
    }

    /// Forget every tracked instance; the next lookups go to the store.
    pub fn detach_all(&self) {
        let mut map = self.tracked();
        debug!(count = map.len(), "detaching all tracked accounts");
        map.clear();
    }

    fn ensure_exists(&self, id: AccountId) -> Result<(), MapperError> {
        if self.store.exists(id)? {
            Ok(())
        } else {
            warn!(%id, "account row is missing");
            Err(MapperError::UnknownAccount(id))
        }
    }
}

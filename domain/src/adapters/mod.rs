//! Store adapters that live inside the domain crate.
//!
//! `InMemoryStore` backs unit tests and the `STORAGE_PROVIDER=memory` mode of
//! ledger-cli; its contents last only as long as the process. The SQLite
//! adapter lives in a separate crate.

pub mod memory_store;

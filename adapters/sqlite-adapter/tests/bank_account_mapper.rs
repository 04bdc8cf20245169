//! Mapper scenarios against a SQLite table seeded from CSV fixtures.

use std::path::PathBuf;

use domain::{AccountHandle, AccountId, AccountRow, BankAccount, BankAccountMapper, ErrorKind};
use rust_decimal::Decimal;
use sqlite_adapter::fixture::read_rows_from_path;
use sqlite_adapter::SqliteStore;

fn fixture(name: &str) -> Vec<AccountRow> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    read_rows_from_path(path).expect("fixture readable")
}

fn seeded_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("in-memory db");
    store
        .load_rows(&fixture("bankaccount-seed.csv"))
        .expect("seed loaded");
    store
}

fn assert_table_eq(store: &SqliteStore, expected: &str) {
    assert_eq!(store.rows().expect("rows"), fixture(expected));
}

#[test]
fn list_of_account_ids_can_be_retrieved() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);
    assert_eq!(
        mapper.get_all_ids().unwrap(),
        vec![AccountId::new(1), AccountId::new(2)]
    );
}

#[test]
fn account_can_be_found_by_id() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);

    let ba = mapper.find_by_id(AccountId::new(1)).unwrap();
    assert_eq!(ba.balance(), Decimal::ONE);

    let ba = mapper.find_by_id(AccountId::new(2)).unwrap();
    assert_eq!(ba.balance(), Decimal::new(2, 0));

    assert!(ba.ptr_eq(&mapper.find_by_id(AccountId::new(2)).unwrap()));
}

#[test]
fn missing_account_is_not_found() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);
    let err = mapper.find_by_id(AccountId::new(3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn account_can_be_inserted() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);

    mapper.insert(&AccountHandle::new(BankAccount::new())).unwrap();

    assert_table_eq(&store, "bankaccount-after-insert.csv");
}

#[test]
fn account_cannot_be_inserted_twice() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);
    let ba = AccountHandle::new(BankAccount::new());

    mapper.insert(&ba).unwrap();
    let err = mapper.insert(&ba).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Mapper);
    assert_table_eq(&store, "bankaccount-after-insert.csv");
}

#[test]
fn account_can_be_updated() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);

    let ba = mapper.find_by_id(AccountId::new(1)).unwrap();
    ba.withdraw_money(Decimal::ONE).unwrap();
    mapper.update(&ba).unwrap();

    assert_table_eq(&store, "bankaccount-after-update.csv");
}

#[test]
fn account_that_does_not_exist_cannot_be_updated() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);

    let err = mapper.update(&AccountHandle::default()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Mapper);
    assert_table_eq(&store, "bankaccount-seed.csv");
}

#[test]
fn account_can_be_deleted() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);

    let ba = mapper.find_by_id(AccountId::new(1)).unwrap();
    mapper.delete(&ba).unwrap();

    assert_table_eq(&store, "bankaccount-after-delete.csv");
}

#[test]
fn account_that_does_not_exist_cannot_be_deleted() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);

    let err = mapper.delete(&AccountHandle::default()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Mapper);
    assert_table_eq(&store, "bankaccount-seed.csv");
}

#[test]
fn row_removed_behind_the_mappers_back_cannot_be_updated() {
    let store = seeded_store();
    let mapper = BankAccountMapper::new(&store);

    let ba = mapper.find_by_id(AccountId::new(2)).unwrap();
    store.load_rows(&fixture("bankaccount-after-update.csv")[..1]).unwrap();

    let err = mapper.update(&ba).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Mapper);
}

#[test]
fn large_balance_survives_reload() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mapper = BankAccountMapper::new(&store);
    let big: Decimal = "12345678901234567.89".parse().unwrap();

    let mut account = BankAccount::new();
    account.deposit_money(big).unwrap();
    let ba = AccountHandle::new(account);
    mapper.insert(&ba).unwrap();

    mapper.detach_all();
    let reloaded = mapper.find_by_id(AccountId::new(1)).unwrap();
    assert!(!reloaded.ptr_eq(&ba));
    assert_eq!(reloaded.balance(), big);
}

use std::env;
use std::process;

use domain::adapters::memory_store::InMemoryStore;
use domain::{
    AccountHandle, AccountId, AccountRow, AccountStore, BankAccount, BankAccountMapper, CoreError,
};
use rust_decimal::Decimal;
use sqlite_adapter::fixture;
use sqlite_adapter::SqliteStore;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

/// Store selected at startup.
enum AnyStore {
    Memory(InMemoryStore),
    Sqlite(SqliteStore),
}

impl AnyStore {
    fn from_config(cfg: &config::Config) -> Result<Self, CoreError> {
        match cfg.storage_provider {
            config::StorageProvider::Memory => Ok(Self::Memory(InMemoryStore::new())),
            config::StorageProvider::Sqlite => {
                if let Some(dir) = cfg.db_path.parent() {
                    std::fs::create_dir_all(dir).map_err(|e| {
                        CoreError::Repository(format!(
                            "cannot create database directory {}: {e}",
                            dir.display()
                        ))
                    })?;
                }
                Ok(Self::Sqlite(SqliteStore::new(&cfg.db_path)?))
            }
        }
    }

    fn inner(&self) -> &dyn AccountStore {
        match self {
            Self::Memory(s) => s,
            Self::Sqlite(s) => s,
        }
    }

    fn load_rows(&self, rows: &[AccountRow]) -> Result<(), CoreError> {
        match self {
            Self::Memory(s) => s.load_rows(rows),
            Self::Sqlite(s) => s.load_rows(rows),
        }
    }

    fn rows(&self) -> Result<Vec<AccountRow>, CoreError> {
        match self {
            Self::Memory(s) => Ok(s.rows()),
            Self::Sqlite(s) => s.rows(),
        }
    }
}

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  ledger-cli ids\n  ledger-cli show <id>\n  ledger-cli open [<deposit>]\n  ledger-cli deposit <id> <amount>\n  ledger-cli withdraw <id> <amount>\n  ledger-cli close <id>\n  ledger-cli seed <csv>\n  ledger-cli dump\n\nEnvironment:\n  STORAGE_PROVIDER  memory | sqlite (default sqlite)\n  DB_PATH           sqlite file (default ./data/bankaccount.db)\n  SEED_FILE         CSV dataset loaded before the command\n  LOG_FORMAT        pretty | json",
        domain::about()
    );
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .init();
        }
    }
}

fn parse_id(arg: Option<String>) -> Result<AccountId, String> {
    let Some(raw) = arg else {
        return Err("missing <id>".into());
    };
    raw.parse::<i64>()
        .map(AccountId::new)
        .map_err(|_| format!("invalid id: {}", raw))
}

fn parse_amount(arg: Option<String>) -> Result<Decimal, String> {
    let Some(raw) = arg else {
        return Err("missing <amount>".into());
    };
    raw.parse::<Decimal>()
        .map_err(|e| format!("invalid amount '{}': {}", raw, e))
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    let cfg = config::Config::from_env().map_err(|e| e.to_string())?;
    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let store = AnyStore::from_config(&cfg).map_err(|e| format!("store init failed: {}", e))?;
    if let Some(ref path) = cfg.seed_file {
        let rows = fixture::read_rows_from_path(path).map_err(|e| e.to_string())?;
        store.load_rows(&rows).map_err(|e| e.to_string())?;
        info!(path = %path.display(), count = rows.len(), "seed dataset loaded");
    }
    let mapper = BankAccountMapper::new(store.inner());

    match cmd.as_str() {
        "ids" => {
            let ids = mapper.get_all_ids().map_err(|e| e.to_string())?;
            for id in ids {
                println!("{}", id);
            }
            Ok(())
        }
        "show" => {
            let id = parse_id(args.next())?;
            let ba = mapper.find_by_id(id).map_err(|e| e.to_string())?;
            println!("{}\t{}", id, ba.balance());
            Ok(())
        }
        "open" => {
            let mut account = BankAccount::new();
            if let Some(raw) = args.next() {
                let amount = parse_amount(Some(raw))?;
                account.deposit_money(amount).map_err(|e| e.to_string())?;
            }
            let ba = AccountHandle::new(account);
            mapper.insert(&ba).map_err(|e| format!("open failed: {}", e))?;
            match ba.id() {
                Some(id) => println!("opened: {}", id),
                None => return Err("open failed: no id assigned".into()),
            }
            Ok(())
        }
        "deposit" | "withdraw" => {
            let id = parse_id(args.next())?;
            let amount = parse_amount(args.next())?;
            let ba = mapper.find_by_id(id).map_err(|e| e.to_string())?;
            let res = if cmd == "deposit" {
                ba.deposit_money(amount)
            } else {
                ba.withdraw_money(amount)
            };
            res.map_err(|e| format!("{} failed: {}", cmd, e))?;
            mapper.update(&ba).map_err(|e| {
                error!(%id, err = ?e, "update error");
                format!("{} failed: {}", cmd, e)
            })?;
            println!("{}\t{}", id, ba.balance());
            Ok(())
        }
        "close" => {
            let id = parse_id(args.next())?;
            let ba = mapper.find_by_id(id).map_err(|e| e.to_string())?;
            mapper.delete(&ba).map_err(|e| format!("close failed: {}", e))?;
            println!("closed: {}", id);
            Ok(())
        }
        "seed" => {
            let Some(path) = args.next() else {
                return Err("missing <csv> for seed".into());
            };
            let rows = fixture::read_rows_from_path(&path).map_err(|e| e.to_string())?;
            store.load_rows(&rows).map_err(|e| e.to_string())?;
            println!("seeded {} accounts", rows.len());
            Ok(())
        }
        "dump" => {
            let rows = store.rows().map_err(|e| e.to_string())?;
            fixture::write_rows(std::io::stdout(), &rows).map_err(|e| e.to_string())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}

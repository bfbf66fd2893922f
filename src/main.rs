use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{Local, Utc};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use khata::config::{Config, StoreConfig};
use khata::format::inr;
use khata::store::{LedgerStore, MemoryStore, PgStore};
use khata::tui::run_tui;

const USAGE: &str = "\
usage: khata [command]

commands:
  (none)          open the terminal dashboard
  summary         print dashboard metrics and customer balances
  summary --json  print dashboard metrics as JSON
  help            show this message

environment:
  DATABASE_URL            postgres connection string (in-memory demo ledger when unset)
  LEDGER_USER_ID          owner of the ledger rows (required with DATABASE_URL)
  LEDGER_SNAPSHOT         JSON file backing the in-memory ledger
  DB_MAX_CONNECTIONS      pool size (default 10)
  LEDGER_PAGE_SIZE        customers per page (default 10)
  LEDGER_WINDOW_BASIS     event | created (default event)
  LEDGER_RUN_MIGRATIONS   apply migrations on start (default true)
  RUST_LOG                log filter, logs go to stderr (default warn)
";

/// The opened store, plus the in-memory store and file to write back on exit.
struct Backend {
    store: Arc<dyn LedgerStore>,
    snapshot: Option<(Arc<MemoryStore>, PathBuf)>,
}

enum Command {
    Tui,
    Summary { json: bool },
}

fn parse_command(args: &[&str]) -> Option<Command> {
    match args {
        [] => Some(Command::Tui),
        ["summary"] => Some(Command::Summary { json: false }),
        ["summary", "--json"] => Some(Command::Summary { json: true }),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    if matches!(words.as_slice(), ["help"] | ["--help"] | ["-h"]) {
        print!("{USAGE}");
        return Ok(());
    }
    let Some(command) = parse_command(&words) else {
        eprint!("{USAGE}");
        bail!("unknown command `{}`", args.join(" "));
    };

    let config = Config::from_env()?;
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let backend = open_store(&config, &rt)?;
    tracing::info!(user_id = %config.user_id, "ledger opened");

    let outcome = match command {
        Command::Tui => run_tui(backend.store.clone(), &config, &rt),
        Command::Summary { json } => print_summary(&backend, &config, &rt, json),
    };
    finish(&backend, &rt, outcome)
}

/// Writes the snapshot back even when `outcome` failed; that failure is
/// still the one returned.
fn finish(
    backend: &Backend,
    rt: &Runtime,
    outcome: anyhow::Result<()>,
) -> anyhow::Result<()> {
    let saved = match &backend.snapshot {
        Some((memory, path)) => rt
            .block_on(memory.save_json(path))
            .with_context(|| format!("saving ledger snapshot to {}", path.display())),
        None => Ok(()),
    };
    if outcome.is_err() {
        if let Err(e) = &saved {
            tracing::error!(error = %format!("{e:#}"), "ledger snapshot not saved");
        }
    }
    outcome.and(saved)
}

fn open_store(config: &Config, rt: &Runtime) -> anyhow::Result<Backend> {
    match &config.store {
        StoreConfig::Postgres {
            url,
            max_connections,
            run_migrations,
        } => {
            let store = rt
                .block_on(PgStore::connect(url, *max_connections))
                .context("connecting to DATABASE_URL")?;
            if *run_migrations {
                rt.block_on(store.migrate())?;
            }
            Ok(Backend {
                store: Arc::new(store),
                snapshot: None,
            })
        }
        StoreConfig::Memory {
            snapshot: Some(path),
        } => {
            let memory = if path.exists() {
                MemoryStore::load_json(path)
                    .with_context(|| format!("loading ledger snapshot {}", path.display()))?
            } else {
                tracing::info!(
                    path = %path.display(),
                    "snapshot not found, starting an empty ledger"
                );
                MemoryStore::new()
            };
            let memory = Arc::new(memory);
            Ok(Backend {
                store: memory.clone(),
                snapshot: Some((memory, path.clone())),
            })
        }
        StoreConfig::Memory { snapshot: None } => {
            tracing::info!("no DATABASE_URL or LEDGER_SNAPSHOT, using the demo ledger");
            Ok(Backend {
                store: Arc::new(MemoryStore::demo(Utc::now())),
                snapshot: None,
            })
        }
    }
}

fn print_summary(
    backend: &Backend,
    config: &Config,
    rt: &Runtime,
    json: bool,
) -> anyhow::Result<()> {
    let ledger = rt.block_on(backend.store.snapshot(config.user_id))?;
    let metrics = ledger.dashboard(&Local::now(), config.window_basis);

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    println!("== Dashboard ==\n");
    println!("Last 7 days   : {}", inr(metrics.last_week_amount));
    println!("Last 30 days  : {}", inr(metrics.last_month_amount));
    println!(
        "Customers     : {} ({} active in the last 30 days)",
        metrics.total_customers, metrics.active_customers
    );
    println!("Credit given  : {}", inr(metrics.credit_amount));
    println!("Debit settled : {}", inr(metrics.debit_amount));

    println!("\n== Customer Balances ==\n");
    for s in ledger.all_customer_summary() {
        if s.has_drift() {
            tracing::warn!(
                customer_id = %s.customer_id,
                stored = %s.stored_pending,
                computed = %s.summary.net_balance,
                "stored pending amount differs from transactions"
            );
        }
        println!(
            "[page {:>3}] {:<24} | {:<14} | pending: {:>12} | entries: {}",
            s.page_number,
            s.name,
            s.village,
            inr(s.summary.net_balance),
            s.summary.transaction_count,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use khata::stat::{NewCustomer, NewTransaction};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn commands() {
        assert!(matches!(parse_command(&[]), Some(Command::Tui)));
        assert!(matches!(
            parse_command(&["summary", "--json"]),
            Some(Command::Summary { json: true })
        ));
        assert!(parse_command(&["summary", "--yaml"]).is_none());
        assert!(parse_command(&["serve"]).is_none());
    }

    #[test]
    fn snapshot_is_saved_when_the_dashboard_fails() {
        let rt = runtime();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let memory = Arc::new(MemoryStore::new());
        let backend = Backend {
            store: memory.clone(),
            snapshot: Some((memory.clone(), path.clone())),
        };

        let user = Uuid::new_v4();
        rt.block_on(async {
            let c = memory
                .create_customer(
                    user,
                    NewCustomer {
                        page_number: 1,
                        first_name: "Asha".into(),
                        last_name: "Pawar".into(),
                        village: "Wadgaon".into(),
                        notes: None,
                    },
                )
                .await
                .unwrap();
            let entry = NewTransaction {
                amount: dec!(250),
                event_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                notes: None,
            };
            memory.create_transaction(user, c.id, entry).await.unwrap();
        });

        let err = finish(&backend, &rt, Err(anyhow::anyhow!("terminal went away"))).unwrap_err();
        assert_eq!(err.to_string(), "terminal went away");

        let reloaded = MemoryStore::load_json(&path).unwrap();
        let customers = rt.block_on(reloaded.list_customers(user)).unwrap();
        assert_eq!(customers[0].pending_amount, dec!(250));
    }

    #[test]
    fn save_failure_surfaces_after_success() {
        let rt = runtime();
        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(MemoryStore::new());
        let backend = Backend {
            store: memory.clone(),
            snapshot: Some((memory, dir.path().join("missing").join("ledger.json"))),
        };
        let err = finish(&backend, &rt, Ok(())).unwrap_err();
        assert!(err.to_string().starts_with("saving ledger snapshot"));
    }
}

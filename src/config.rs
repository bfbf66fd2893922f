use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use uuid::Uuid;

use crate::listing::DEFAULT_PAGE_SIZE;
use crate::stat::WindowBasis;
use crate::stat::sample_data::DEMO_USER;

/// Where the ledger rows come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres {
        url: String,
        max_connections: u32,
        run_migrations: bool,
    },
    /// JSON snapshot file, or the built-in demo ledger when `None`.
    Memory { snapshot: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreConfig,
    pub user_id: Uuid,
    pub page_size: usize,
    pub window_basis: WindowBasis,
}

impl Config {
    /// Reads the process environment, loading `.env` first unless `ENV=prod`.
    pub fn from_env() -> Result<Self> {
        if std::env::var("ENV").ok().as_deref() != Some("prod") {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store = match get("DATABASE_URL") {
            Some(url) => StoreConfig::Postgres {
                url,
                max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10)?,
                run_migrations: parse_bool(get("LEDGER_RUN_MIGRATIONS"), true)?,
            },
            None => StoreConfig::Memory {
                snapshot: get("LEDGER_SNAPSHOT").map(PathBuf::from),
            },
        };

        let user_id = match (get("LEDGER_USER_ID"), &store) {
            (Some(raw), _) => Uuid::parse_str(raw.trim())
                .with_context(|| format!("LEDGER_USER_ID `{raw}` is not a UUID"))?,
            (None, StoreConfig::Memory { .. }) => DEMO_USER,
            (None, StoreConfig::Postgres { .. }) => {
                bail!("LEDGER_USER_ID must be set when DATABASE_URL is set")
            }
        };

        let page_size: usize =
            parse_or(get("LEDGER_PAGE_SIZE"), "LEDGER_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            bail!("LEDGER_PAGE_SIZE must be at least 1");
        }

        let window_basis = match get("LEDGER_WINDOW_BASIS") {
            Some(raw) => raw.parse::<WindowBasis>().map_err(anyhow::Error::msg)?,
            None => WindowBasis::default(),
        };

        Ok(Self {
            store,
            user_id,
            page_size,
            window_basis,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} `{v}` is not a valid number")),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<String>, default: bool) -> Result<bool> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("LEDGER_RUN_MIGRATIONS `{v}` is not a boolean"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_to_demo_memory_store() {
        let c = config(&[]).unwrap();
        assert_eq!(c.store, StoreConfig::Memory { snapshot: None });
        assert_eq!(c.user_id, DEMO_USER);
        assert_eq!(c.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(c.window_basis, WindowBasis::EventDate);
    }

    #[test]
    fn database_requires_user() {
        let err = config(&[("DATABASE_URL", "postgres://localhost/khata")]).unwrap_err();
        assert!(err.to_string().contains("LEDGER_USER_ID"));

        let user = Uuid::new_v4().to_string();
        let c = config(&[
            ("DATABASE_URL", "postgres://localhost/khata"),
            ("LEDGER_USER_ID", user.as_str()),
            ("DB_MAX_CONNECTIONS", "4"),
            ("LEDGER_RUN_MIGRATIONS", "no"),
            ("LEDGER_WINDOW_BASIS", "created"),
        ])
        .unwrap();
        assert_eq!(
            c.store,
            StoreConfig::Postgres {
                url: "postgres://localhost/khata".into(),
                max_connections: 4,
                run_migrations: false,
            }
        );
        assert_eq!(c.window_basis, WindowBasis::CreatedAt);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("LEDGER_PAGE_SIZE", "0")]).is_err());
        assert!(config(&[("LEDGER_PAGE_SIZE", "ten")]).is_err());
        assert!(config(&[("LEDGER_WINDOW_BASIS", "weekly")]).is_err());
        assert!(config(&[("LEDGER_USER_ID", "not-a-uuid")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let c = config(&[("DATABASE_URL", "  "), ("LEDGER_SNAPSHOT", "ledger.json")]).unwrap();
        assert_eq!(
            c.store,
            StoreConfig::Memory {
                snapshot: Some(PathBuf::from("ledger.json"))
            }
        );
    }
}

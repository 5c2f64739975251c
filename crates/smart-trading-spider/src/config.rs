use crate::http::var;
use crate::Error;
use chrono::NaiveDate;
use std::path::PathBuf;

// constants
// ----------------------------------------------------------------------------

/// Intraday prices older than this many days are truncated when no start date is given.
pub const DEFAULT_DAYS_INTRA: i64 = 30;

/// Daily prices older than this many days are truncated when no start date is given.
pub const DEFAULT_DAYS_DAILY: i64 = 10_000;

/// Minimum wall time of one chunk of Alpha Vantage requests.
pub const SLEEP_TIME_SEC: u64 = 70;

// When scraping index constituents, the row count must fall strictly inside these bounds.
pub const NASDAQ_LL: usize = 85;
pub const NASDAQ_UL: usize = 130;
pub const SP500_LL: usize = 450;
pub const SP500_UL: usize = 600;

/// Floor of the worker pool; also the chunk size on small machines.
pub const MIN_WORKERS: usize = 4;

pub const DEFAULT_PRICE_STORE: &str = "./prices";
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// environment
// ----------------------------------------------------------------------------

pub const DATABASE_URL_VAR: &str = "SMART_TRADING_URL";
pub const API_KEY_VAR: &str = "ALPHAVANTAGE_API_KEY";
pub const PRICE_STORE_VAR: &str = "PRICE_STORE_PATH";

/// Number of tickers fetched concurrently: one less than the CPU count, never below [`MIN_WORKERS`].
pub fn workers() -> usize {
    num_cpus::get().saturating_sub(1).max(MIN_WORKERS)
}

/// Settings read from the environment (and `.env`, when present).
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub database_url: Option<String>,
    pub api_key: Option<String>,
    pub price_store: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            database_url: var(DATABASE_URL_VAR).ok(),
            api_key: var(API_KEY_VAR).ok(),
            price_store: var(PRICE_STORE_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_PRICE_STORE)),
        }
    }

    pub fn database_url(&self) -> Result<&str, Error> {
        self.database_url
            .as_deref()
            .ok_or(Error::MissingVar(DATABASE_URL_VAR))
    }

    pub fn api_key(&self) -> Result<&str, Error> {
        self.api_key.as_deref().ok_or(Error::MissingVar(API_KEY_VAR))
    }

    /// CSV files of one run land in `<price_store>/<yyyy-mm-dd>/`.
    pub fn price_store_dir(&self, today: NaiveDate) -> PathBuf {
        self.price_store.join(today.format("%Y-%m-%d").to_string())
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_never_below_floor() {
        assert!(workers() >= MIN_WORKERS);
    }

    #[test]
    fn price_store_dir_is_dated() {
        let config = Config {
            price_store: PathBuf::from("/data/prices"),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            config.price_store_dir(today),
            PathBuf::from("/data/prices/2024-03-07")
        );
    }

    #[test]
    fn missing_vars_are_named() {
        let config = Config::default();
        let err = config.database_url().unwrap_err();
        assert!(err.to_string().contains(DATABASE_URL_VAR));
        let err = config.api_key().unwrap_err();
        assert!(err.to_string().contains(API_KEY_VAR));
    }
}

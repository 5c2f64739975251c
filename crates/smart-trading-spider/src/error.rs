use std::path::PathBuf;

/// Failures the spider reports to its callers.
///
/// Network, database and I/O errors travel as [`anyhow::Error`] from the
/// orchestration functions; this enum covers the conditions the spider itself
/// detects.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An environment variable the command needs is not set.
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("stock_index value {0} not defined")]
    UnknownIndex(String),

    #[error("\"price_type\" must be one of \"intraday\" or \"daily\", found {0:?}")]
    UnknownPriceType(String),

    #[error("interval must be one of 1min, 5min, 15min, 30min, 60min, found {0:?}")]
    UnknownInterval(String),

    #[error("check \"start_date\" format - should be passed as \"yyyy-mm-dd\" string, found {0:?}")]
    InvalidStartDate(String),

    /// The scraped constituents table has an implausible number of rows.
    #[error("check wikipedia data source for {index} at {url}: found {count} tickers, expected between {lower} and {upper}")]
    TickerCount {
        index: &'static str,
        url: &'static str,
        count: usize,
        lower: usize,
        upper: usize,
    },

    /// No table on the page carries the expected ticker column.
    #[error("no constituents table with a {column:?} column at {url}")]
    MissingTable { column: &'static str, url: &'static str },

    #[error("tickers_list not provided, either pass tickers or a stock index to fetch them")]
    NoTickers,

    /// Alpha Vantage answered with an error, rate-limit note or information payload.
    #[error("Alpha Vantage refused {ticker}: {message}")]
    Api { ticker: String, message: String },

    #[error("no {key:?} series in the Alpha Vantage response for {ticker}")]
    MissingSeries { ticker: String, key: String },

    #[error("malformed value {value:?} for {field} in {ticker}")]
    Malformed {
        ticker: String,
        field: &'static str,
        value: String,
    },

    /// The Yahoo earnings page did not embed the expected application state.
    #[error("earnings payload for {0} could not be located")]
    EarningsPayload(String),

    #[error("could not write CSV to {0}")]
    Csv(PathBuf, #[source] csv::Error),
}

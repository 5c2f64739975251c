use crate::db::Table;

//////////////////////////////////////////////////////////////////
// schema
//////////////////////////////////////////////////////////////////

/// Every table the spider writes to, created on demand by `Database::migrate`.
pub static CREATE_SCHEMA: &str = "
    CREATE SCHEMA IF NOT EXISTS stock;

    CREATE TABLE IF NOT EXISTS stock.tickers (
        ticker VARCHAR(16) NOT NULL,
        stock_index VARCHAR(16) NOT NULL,
        company TEXT,
        PRIMARY KEY (ticker, stock_index)
    );

    CREATE TABLE IF NOT EXISTS stock.daily_prices (
        ticker VARCHAR(16) NOT NULL,
        dt TIMESTAMP NOT NULL,
        open DOUBLE PRECISION,
        high DOUBLE PRECISION,
        low DOUBLE PRECISION,
        close DOUBLE PRECISION,
        volume BIGINT,
        PRIMARY KEY (ticker, dt)
    );

    CREATE TABLE IF NOT EXISTS stock.intraday_prices (
        ticker VARCHAR(16) NOT NULL,
        ts TIMESTAMP NOT NULL,
        open DOUBLE PRECISION,
        high DOUBLE PRECISION,
        low DOUBLE PRECISION,
        close DOUBLE PRECISION,
        volume BIGINT,
        PRIMARY KEY (ticker, ts)
    );

    CREATE TABLE IF NOT EXISTS stock.earnings (
        ticker VARCHAR(16) NOT NULL,
        ds DATE NOT NULL,
        company_name TEXT,
        earnings_dt TIMESTAMP WITH TIME ZONE,
        datetime_type VARCHAR(8),
        eps_estimate DOUBLE PRECISION,
        eps_actual DOUBLE PRECISION,
        eps_surprise_pct DOUBLE PRECISION,
        time_zone VARCHAR(8),
        gmt_offset_ms BIGINT,
        quote_type VARCHAR(16),
        PRIMARY KEY (ticker, ds)
    );
";

//////////////////////////////////////////////////////////////////
// tickers
//////////////////////////////////////////////////////////////////

/// `stock.tickers` holds the constituents of each index, and feeds the earnings scrape.
pub const TICKERS: Table = Table {
    name: "stock.tickers",
    columns: &["ticker", "stock_index", "company"],
    keys: &["ticker", "stock_index"],
};

pub static SELECT_INDEX_TICKERS: &str = "
    SELECT ticker
    FROM stock.tickers
    WHERE stock_index = $1
    ORDER BY ticker
";

//////////////////////////////////////////////////////////////////
// prices
//////////////////////////////////////////////////////////////////

pub const DAILY_PRICES: Table = Table {
    name: "stock.daily_prices",
    columns: &["ticker", "dt", "open", "high", "low", "close", "volume"],
    keys: &["ticker", "dt"],
};

/// Same layout as [`DAILY_PRICES`], with the timestamp column named `ts`.
pub const INTRADAY_PRICES: Table = Table {
    name: "stock.intraday_prices",
    columns: &["ticker", "ts", "open", "high", "low", "close", "volume"],
    keys: &["ticker", "ts"],
};

//////////////////////////////////////////////////////////////////
// earnings
//////////////////////////////////////////////////////////////////

pub const EARNINGS: Table = Table {
    name: "stock.earnings",
    columns: &[
        "ticker",
        "ds",
        "company_name",
        "earnings_dt",
        "datetime_type",
        "eps_estimate",
        "eps_actual",
        "eps_surprise_pct",
        "time_zone",
        "gmt_offset_ms",
        "quote_type",
    ],
    keys: &["ticker", "ds"],
};

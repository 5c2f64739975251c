use clap::{Parser, Subcommand, ValueEnum};
use smart_trading_spider::stock::index::StockIndex;
use smart_trading_spider::stock::prices::{Interval, PriceType};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    ///
    /// Without it, progress bars are shown instead of logs.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect daily or intraday prices from Alpha Vantage.
    Prices {
        /// Tickers to collect, space separated; overrides the index lookup.
        #[arg(long, num_args = 1..)]
        tickers_list: Option<Vec<String>>,

        /// Index whose constituents are collected, SP500 or NASDAQ [default: SP500].
        #[arg(long)]
        stock_index: Option<StockIndex>,

        /// daily or intraday.
        #[arg(long)]
        price_type: PriceType,

        /// Width of intraday bars: 1min, 5min, 15min, 30min or 60min.
        #[arg(long, default_value = "15min")]
        interval: Interval,

        /// Keep pre-market and after-hours intraday bars.
        #[arg(long)]
        after_hours: bool,

        /// Earliest bar to keep, as yyyy-mm-dd.
        #[arg(long)]
        start_date: Option<String>,

        /// Write one CSV file per ticker.
        #[arg(long)]
        save_csv: bool,

        /// Upsert prices into the database.
        #[arg(long)]
        write_db: bool,
    },

    /// Scrape the earnings calendar of every stored ticker of an index.
    Earnings {
        /// Keep earnings announced today or earlier.
        #[arg(long)]
        earnings_bootstrap: bool,

        /// SP500 or NASDAQ.
        #[arg(long, default_value = "NASDAQ")]
        stock_index: StockIndex,

        /// Also write the earnings to a CSV file.
        #[arg(long)]
        save_csv: bool,
    },

    /// Scrape the constituents of an index from Wikipedia into the database.
    Tickers {
        /// SP500 or NASDAQ.
        #[arg(long, default_value = "SP500")]
        stock_index: StockIndex,
    },

    /// Create the database schema.
    Init,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}

use smart_trading_spider::config::Config;
use smart_trading_spider::db::Database;
use smart_trading_spider::stock::alpha_vantage::AlphaVantage;
use smart_trading_spider::stock::batch::{PriceJob, Summary};
use smart_trading_spider::stock::earnings::Earnings;
use smart_trading_spider::stock::index::{get_tickers_index, StockIndex};
use smart_trading_spider::stock::prices::{resolve_start_date, Interval, PriceType};
use smart_trading_spider::{fs, std_client_build};
use tracing::{debug, error, info, warn};

/// Inputs of the `prices` command.
#[derive(Debug)]
pub(crate) struct PricesArgs {
    pub tickers_list: Option<Vec<String>>,
    pub stock_index: Option<StockIndex>,
    pub price_type: PriceType,
    pub interval: Interval,
    pub after_hours: bool,
    pub start_date: Option<String>,
    pub save_csv: bool,
    pub write_db: bool,
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn connect(config: &Config) -> anyhow::Result<Database> {
    let db = Database::connect(config.database_url()?).map_err(|err| {
        error!("smart-trading connection error: {err}");
        err
    })?;
    Ok(db)
}

/// Collect prices for an explicit ticker list, or for the constituents of an index.
pub(crate) async fn prices(config: &Config, args: PricesArgs, tui: bool) -> anyhow::Result<Summary> {
    let time = std::time::Instant::now();
    let today = today();
    let http_client = std_client_build()?;

    // validate everything before the first request
    let start = resolve_start_date(args.start_date.as_deref(), args.price_type, today)?;
    let source = AlphaVantage::new(http_client.clone(), config.api_key()?);
    let db = match args.write_db {
        true => Some(connect(config)?),
        false => None,
    };

    let tickers = match args.tickers_list {
        Some(tickers) => tickers,
        None => {
            let index = args.stock_index.unwrap_or_else(|| {
                warn!("\"stock_index\" not specified, using default of \"SP500\"");
                StockIndex::SP500
            });
            get_tickers_index(&http_client, index).await?.symbols()
        }
    };
    debug!("{} tickers to collect", tickers.len());

    let mut job = PriceJob::new(
        tickers,
        args.price_type,
        start,
        config.price_store_dir(today),
        today,
    );
    job.interval = args.interval;
    job.after_hours = args.after_hours;
    job.write_csv = args.save_csv;
    job.write_db = args.write_db;

    let summary = job.get_list_stock_prices(&source, db.as_ref(), tui).await?;
    if tui {
        println!(
            "{} prices: {} fetched, {} skipped",
            args.price_type, summary.fetched, summary.skipped
        );
    }

    info!("prices collected, time elapsed: {:?}", time.elapsed());
    Ok(summary)
}

/// Scrape the earnings calendar of every stored ticker of `index`.
pub(crate) async fn earnings(
    config: &Config,
    index: StockIndex,
    bootstrap: bool,
    save_csv: bool,
    tui: bool,
) -> anyhow::Result<()> {
    let time = std::time::Instant::now();
    let today = today();
    let db = connect(config)?;

    let earnings = Earnings::new(std_client_build()?, bootstrap);
    let rows = earnings
        .load_earnings_all_tickers(&db, index, today, tui)
        .await?;

    if save_csv && !rows.is_empty() {
        let dir = config.price_store_dir(today);
        fs::ensure_dir(&dir).await?;
        let path = fs::csv_path(&dir, index.as_str(), "earnings", today);
        fs::write_csv(&path, &rows)?;
        info!("earnings saved to {}", path.display());
    }
    if tui {
        println!("{index} earnings: {} rows", rows.len());
    }

    info!("earnings collected, time elapsed: {:?}", time.elapsed());
    Ok(())
}

/// Scrape the constituents of `index` and upsert them.
pub(crate) async fn tickers(config: &Config, index: StockIndex, tui: bool) -> anyhow::Result<()> {
    let time = std::time::Instant::now();
    let db = connect(config)?;

    let tickers = get_tickers_index(&std_client_build()?, index).await?;
    let written = tickers.insert(&db).await?;
    if tui {
        println!("{index} tickers: {written} stored");
    }

    info!("tickers collected, time elapsed: {:?}", time.elapsed());
    Ok(())
}

/// Create the schema and its tables.
pub(crate) async fn init(config: &Config, tui: bool) -> anyhow::Result<()> {
    connect(config)?.migrate().await?;
    if tui {
        println!("database schema ready");
    }
    Ok(())
}

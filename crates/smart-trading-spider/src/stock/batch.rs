use super::alpha_vantage::RawSeries;
use super::prices::{Interval, PriceTable, PriceType};
use crate::config::{self, DATABASE_URL_VAR, SLEEP_TIME_SEC};
use crate::db::Database;
use crate::{fs, tui, Error};
use chrono::{NaiveDate, NaiveDateTime};
use futures::{stream, StreamExt};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Anything that can return the raw price series of a ticker.
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    async fn fetch(
        &self,
        ticker: &str,
        price_type: PriceType,
        interval: Interval,
    ) -> anyhow::Result<RawSeries>;
}

/// Counts of one batch run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Tickers that returned at least one row.
    pub fetched: usize,
    /// Tickers skipped because the fetch failed or nothing was left after filtering.
    pub skipped: usize,
    pub db_written: usize,
    pub csv_written: usize,
}

/// Fetch the prices of a list of tickers, and write them out.
#[derive(Clone, Debug)]
pub struct PriceJob {
    pub tickers: Vec<String>,
    pub price_type: PriceType,
    pub interval: Interval,
    pub after_hours: bool,
    pub start: NaiveDateTime,
    pub write_csv: bool,
    pub write_db: bool,
    /// Directory receiving the CSV files.
    pub store: PathBuf,
    /// Date stamped into CSV file names.
    pub today: NaiveDate,
    /// Chunk size, and the number of concurrent requests.
    pub workers: usize,
    /// Minimum wall time of each chunk but the last.
    pub sleep: Duration,
}

impl PriceJob {
    pub fn new(
        tickers: Vec<String>,
        price_type: PriceType,
        start: NaiveDateTime,
        store: PathBuf,
        today: NaiveDate,
    ) -> Self {
        Self {
            tickers,
            price_type,
            interval: Interval::default(),
            after_hours: false,
            start,
            write_csv: false,
            write_db: false,
            store,
            today,
            workers: config::workers(),
            sleep: Duration::from_secs(SLEEP_TIME_SEC),
        }
    }

    /// Fetch a single ticker; any failure is logged and yields an empty table.
    pub async fn get_prices_av<S: PriceSource>(&self, source: &S, ticker: &str) -> PriceTable {
        let table = match source.fetch(ticker, self.price_type, self.interval).await {
            Ok(series) => PriceTable::from_series(
                ticker,
                self.price_type,
                series,
                self.start,
                self.after_hours,
            )
            .map_err(anyhow::Error::from),
            Err(err) => Err(err),
        };

        match table {
            Ok(table) => table,
            Err(err) => {
                warn!("{ticker}: Skipped by Alphavantage.");
                debug!("{ticker}: {err}");
                PriceTable::empty(ticker, self.price_type)
            }
        }
    }

    /// Upsert a table; failure is logged and reported as `false`.
    pub async fn write_to_db(&self, db: &Database, table: &PriceTable) -> bool {
        match db
            .execute_write_query(self.price_type.table(), &table.rows)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                error!("{}: Could not write to DB. error({err})", table.ticker);
                false
            }
        }
    }

    /// Save a table to its CSV file; failure is logged and reported as `false`.
    pub fn write_to_csv(&self, table: &PriceTable) -> bool {
        let path = fs::csv_path(
            &self.store,
            &table.ticker,
            self.price_type.as_str(),
            self.today,
        );
        match fs::write_csv(&path, table.csv_rows()) {
            Ok(_) => {
                info!("{}: Saved prices.", table.ticker);
                true
            }
            Err(err) => {
                warn!("{}: Could not save prices. error({err})", table.ticker);
                false
            }
        }
    }

    /// Fetch every ticker in chunks of `workers`, writing each chunk before
    /// moving on, and sleeping between chunks so that each one spans at least
    /// `sleep`.
    pub async fn get_list_stock_prices<S: PriceSource>(
        &self,
        source: &S,
        db: Option<&Database>,
        tui: bool,
    ) -> anyhow::Result<Summary> {
        if self.tickers.is_empty() {
            return Err(Error::NoTickers.into());
        }
        let db = match (self.write_db, db) {
            (true, None) => return Err(Error::MissingVar(DATABASE_URL_VAR).into()),
            (true, Some(db)) => Some(db),
            (false, _) => None,
        };
        if self.write_csv {
            fs::ensure_dir(&self.store).await?;
        }

        let time = Instant::now();
        let progress = tui::multi_progress(self.tickers.len(), tui)?;
        let chunks = self.tickers.chunks(self.workers.max(1)).collect::<Vec<_>>();
        let mut summary = Summary::default();

        info!(
            "fetching {} prices for {} tickers in {} chunks ...",
            self.price_type,
            self.tickers.len(),
            chunks.len()
        );
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_time = Instant::now();

            let tables = stream::iter(chunk.iter())
                .map(|ticker| self.get_prices_av(source, ticker))
                .buffered(chunk.len())
                .collect::<Vec<PriceTable>>()
                .await;

            for table in tables.iter() {
                progress.total.inc(1);
                if table.is_empty() {
                    summary.skipped += 1;
                    progress.fails.inc(1);
                } else {
                    summary.fetched += 1;
                    progress.success.inc(1);
                }
            }

            if let Some(db) = db {
                for table in tables.iter().filter(|t| !t.is_empty()) {
                    if self.write_to_db(db, table).await {
                        summary.db_written += 1;
                    }
                }
            }

            if self.write_csv {
                for table in tables.iter().filter(|t| !t.is_empty()) {
                    if self.write_to_csv(table) {
                        summary.csv_written += 1;
                    }
                }
            }

            // no need to wait after the last chunk
            if i + 1 == chunks.len() {
                break;
            }
            if let Some(delay) = throttle(chunk_time.elapsed(), self.sleep) {
                info!("System sleep {:.2} sec ....", delay.as_secs_f64());
                let spinner = progress.spinner(format!("sleeping {:.0}s ...", delay.as_secs_f64()));
                tokio::time::sleep(delay).await;
                spinner.finish_and_clear();
            }
        }
        progress.finish();

        info!(
            "{} prices collected: {} fetched, {} skipped, {} written to DB, {} saved to CSV. {}",
            self.price_type,
            summary.fetched,
            summary.skipped,
            summary.db_written,
            summary.csv_written,
            crate::time_elapsed(time)
        );
        Ok(summary)
    }
}

/// Remaining time to wait when a chunk finished `elapsed` into a `window`.
pub fn throttle(elapsed: Duration, window: Duration) -> Option<Duration> {
    window.checked_sub(elapsed).filter(|delay| !delay.is_zero())
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::alpha_vantage::{parse_series, series_key};
    use std::sync::Mutex;

    const DAILY_FIXTURE: &str = include_str!("../../tests/fixtures/daily.json");

    // serves the daily fixture for every ticker, except `refuse`
    struct FixtureSource {
        calls: Mutex<Vec<String>>,
        refuse: &'static str,
    }

    impl FixtureSource {
        fn new(refuse: &'static str) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                refuse,
            }
        }
    }

    impl PriceSource for FixtureSource {
        async fn fetch(
            &self,
            ticker: &str,
            price_type: PriceType,
            interval: Interval,
        ) -> anyhow::Result<RawSeries> {
            self.calls.lock().unwrap().push(ticker.to_string());
            if ticker == self.refuse {
                anyhow::bail!("refused");
            }
            parse_series(DAILY_FIXTURE, ticker, &series_key(price_type, interval))
        }
    }

    fn job(tickers: &[&str], store: PathBuf) -> PriceJob {
        let today = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut job = PriceJob::new(
            tickers.iter().map(|t| t.to_string()).collect(),
            PriceType::Daily,
            start,
            store,
            today,
        );
        job.workers = 2;
        job.sleep = Duration::from_millis(40);
        job
    }

    #[test]
    fn throttle_waits_out_the_window() {
        let window = Duration::from_secs(70);
        assert_eq!(
            throttle(Duration::from_secs(20), window),
            Some(Duration::from_secs(50))
        );
        assert_eq!(throttle(Duration::from_secs(70), window), None);
        assert_eq!(throttle(Duration::from_secs(95), window), None);
    }

    #[tokio::test]
    async fn batch_writes_csv_and_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("2024-01-08");
        let mut job = job(&["AAA", "BBB", "BAD", "CCC", "DDD"], store.clone());
        job.write_csv = true;
        let source = FixtureSource::new("BAD");

        let time = Instant::now();
        let summary = job.get_list_stock_prices(&source, None, false).await.unwrap();

        // three chunks, two sleeps
        assert!(time.elapsed() >= Duration::from_millis(80));
        assert_eq!(
            summary,
            Summary {
                fetched: 4,
                skipped: 1,
                db_written: 0,
                csv_written: 4,
            }
        );
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["AAA", "BBB", "BAD", "CCC", "DDD"]
        );

        assert!(!store.join("BAD_daily_2024_01_08.csv").exists());
        let csv = std::fs::read_to_string(store.join("AAA_daily_2024_01_08.csv")).unwrap();
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "ticker,dt,open,high,low,close,volume");
        assert_eq!(lines[1], "AAA,2024-01-02,162.83,163.29,160.38,161.5,4032887");
        assert_eq!(lines.len(), 5);
    }

    #[tokio::test]
    async fn single_chunk_never_sleeps() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(&["AAA", "BBB"], dir.path().to_path_buf());
        job.sleep = Duration::from_secs(60);

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            job.get_list_stock_prices(&FixtureSource::new("NONE"), None, false),
        )
        .await
        .expect("no sleep after the last chunk")
        .unwrap();
        assert_eq!(summary.fetched, 2);
    }

    #[tokio::test]
    async fn empty_ticker_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = job(&[], dir.path().to_path_buf())
            .get_list_stock_prices(&FixtureSource::new("NONE"), None, false)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoTickers)));
    }

    #[tokio::test]
    async fn db_output_requires_a_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(&["AAA"], dir.path().to_path_buf());
        job.write_db = true;
        let err = job
            .get_list_stock_prices(&FixtureSource::new("NONE"), None, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingVar(DATABASE_URL_VAR))
        ));
    }

    #[tokio::test]
    async fn filtered_out_series_counts_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(&["AAA"], dir.path().to_path_buf());
        job.start = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let table = job.get_prices_av(&FixtureSource::new("NONE"), "AAA").await;
        assert!(table.is_empty());
        assert_eq!(table.ticker, "AAA");
    }
}

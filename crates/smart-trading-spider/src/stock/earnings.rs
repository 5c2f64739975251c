use super::index::{read_tickers, StockIndex};
use super::sql;
use crate::db::{Database, Record};
use crate::http::*;
use crate::{config, tui, Error};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_postgres::types::ToSql;
use tracing::{debug, error, info, trace, warn};

// earnings = `https://finance.yahoo.com/calendar/earnings?symbol=AAPL&offset=0&size=100`, per ticker
//
// The calendar is a server-rendered page; its records live in the application
// state assigned to `root.App.main` inside a <script> tag.

const EARNINGS_URL: &str = "https://finance.yahoo.com/calendar/earnings";
const PAGE_SIZE: usize = 100;
const APP_STATE_MARKER: &str = "root.App.main = ";

/// One earnings announcement, keyed by `(ticker, ds)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EarningsRow {
    pub ticker: String,
    pub ds: NaiveDate,
    pub company_name: Option<String>,
    pub earnings_dt: DateTime<Utc>,
    pub datetime_type: Option<String>,
    pub eps_estimate: Option<f64>,
    pub eps_actual: Option<f64>,
    pub eps_surprise_pct: Option<f64>,
    pub time_zone: Option<String>,
    pub gmt_offset_ms: Option<i64>,
    pub quote_type: Option<String>,
}

impl Record for EarningsRow {
    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.ticker,
            &self.ds,
            &self.company_name,
            &self.earnings_dt,
            &self.datetime_type,
            &self.eps_estimate,
            &self.eps_actual,
            &self.eps_surprise_pct,
            &self.time_zone,
            &self.gmt_offset_ms,
            &self.quote_type,
        ]
    }
}

/// Scraper for the Yahoo Finance earnings calendar.
#[derive(Clone, Debug)]
pub struct Earnings {
    http_client: HttpClient,
    base_url: String,
    /// Keep announcements dated today or earlier.
    pub historical_earnings: bool,
}

impl Earnings {
    pub fn new(http_client: HttpClient, historical_earnings: bool) -> Self {
        Self {
            http_client,
            base_url: EARNINGS_URL.to_string(),
            historical_earnings,
        }
    }

    /// Point the scraper at another host, e.g. a local mirror.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Every raw record the calendar holds for `ticker`, across all pages.
    async fn extract_earnings_json(&self, ticker: &str) -> anyhow::Result<Vec<EarningsRecord>> {
        let mut records = vec![];
        let mut offset = 0;
        loop {
            trace!("fetching earnings page at offset {offset} for {ticker}");
            let html = self
                .http_client
                .get(&self.base_url)
                .query(&[
                    ("symbol", ticker.to_string()),
                    ("offset", offset.to_string()),
                    ("size", PAGE_SIZE.to_string()),
                ])
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let page = parse_page(&html, ticker)?;
            let received = page.rows.len();
            records.extend(page.rows);

            offset += PAGE_SIZE;
            let total = page.total.unwrap_or(records.len());
            if received == 0 || offset >= total {
                break;
            }
        }
        Ok(records)
    }

    /// Earnings rows of one ticker; an unreadable payload yields no rows.
    pub async fn get_earnings_features_ticker(
        &self,
        ticker: &str,
        today: NaiveDate,
    ) -> anyhow::Result<Vec<EarningsRow>> {
        let records = match self.extract_earnings_json(ticker).await {
            Ok(records) => records,
            Err(err) if err.downcast_ref::<Error>().is_some() || err.is::<serde_json::Error>() => {
                warn!("Could not get earnings data, returning empty data frame...");
                debug!("{ticker}: {err}");
                return Ok(vec![]);
            }
            Err(err) => return Err(err),
        };
        Ok(to_rows(records, self.historical_earnings, today))
    }

    /// Fetch the earnings of every ticker in `tickers`, `config::workers()` at a time.
    ///
    /// A ticker that fails is skipped; the rows of the others are concatenated.
    pub async fn get_earnings_all_tickers(
        &self,
        tickers: Vec<String>,
        today: NaiveDate,
        tui: bool,
    ) -> anyhow::Result<Vec<EarningsRow>> {
        let progress = tui::multi_progress(tickers.len(), tui)?;
        let progress = &progress;
        let rows = stream::iter(tickers)
            .map(|ticker| async move {
                let result = self.get_earnings_features_ticker(&ticker, today).await;
                progress.total.inc(1);
                match result {
                    Ok(rows) => {
                        progress.success.inc(1);
                        rows
                    }
                    Err(err) => {
                        progress.fails.inc(1);
                        info!("Skipped ticker: {ticker}");
                        debug!("{ticker}: {err}");
                        vec![]
                    }
                }
            })
            .buffered(config::workers())
            .concat()
            .await;
        progress.finish();
        Ok(rows)
    }

    /// Fetch the earnings of every ticker stored for `index` and upsert them.
    pub async fn load_earnings_all_tickers(
        &self,
        db: &Database,
        index: StockIndex,
        today: NaiveDate,
        tui: bool,
    ) -> anyhow::Result<Vec<EarningsRow>> {
        let time = std::time::Instant::now();
        let tickers = read_tickers(db, index).await.map_err(|err| {
            error!("failed to read tickers for {index}, error({err})");
            err
        })?;

        info!("fetching earnings for {} {index} tickers ...", tickers.len());
        let rows = self.get_earnings_all_tickers(tickers, today, tui).await?;

        if !rows.is_empty() {
            write_earnings_to_db(db, &rows).await?;
        }
        info!(
            "{} earnings rows collected for {index}. {}",
            rows.len(),
            crate::time_elapsed(time)
        );
        Ok(rows)
    }
}

pub async fn write_earnings_to_db(db: &Database, rows: &[EarningsRow]) -> anyhow::Result<u64> {
    let written = db.execute_write_query(&sql::EARNINGS, rows).await?;
    info!("Successfully written earnings...");
    Ok(written)
}

/// Map raw records to rows, dropping those dated today or earlier unless `historical`.
fn to_rows(records: Vec<EarningsRecord>, historical: bool, today: NaiveDate) -> Vec<EarningsRow> {
    records
        .into_iter()
        .filter_map(|record| {
            let ticker = record.ticker.clone();
            match record.into_row() {
                Some(row) => Some(row),
                None => {
                    warn!("{ticker}: malformed earnings record, skipped");
                    None
                }
            }
        })
        // truncate historical earnings
        .filter(|row| historical || row.ds > today)
        .collect()
}

// de
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AppState {
    context: Context,
}

#[derive(Debug, Deserialize)]
struct Context {
    dispatcher: Dispatcher,
}

#[derive(Debug, Deserialize)]
struct Dispatcher {
    stores: Stores,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Stores {
    screener_results_store: ResultsStore,
    screener_criteria_store: Option<CriteriaStore>,
}

#[derive(Debug, Deserialize)]
struct ResultsStore {
    results: Results,
}

#[derive(Debug, Deserialize)]
struct Results {
    #[serde(default)]
    rows: Vec<EarningsRecord>,
}

#[derive(Debug, Deserialize)]
struct CriteriaStore {
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EarningsRecord {
    ticker: String,
    companyshortname: Option<String>,
    startdatetime: String,
    startdatetimetype: Option<String>,
    epsestimate: Option<f64>,
    epsactual: Option<f64>,
    epssurprisepct: Option<f64>,
    #[serde(rename = "timeZoneShortName")]
    time_zone_short_name: Option<String>,
    #[serde(rename = "gmtOffsetMilliSeconds")]
    gmt_offset_milli_seconds: Option<i64>,
    #[serde(rename = "quoteType")]
    quote_type: Option<String>,
}

impl EarningsRecord {
    fn into_row(self) -> Option<EarningsRow> {
        let ds = NaiveDate::parse_from_str(self.startdatetime.get(..10)?, "%Y-%m-%d").ok()?;
        let earnings_dt =
            NaiveDateTime::parse_from_str(&self.startdatetime, "%Y-%m-%dT%H:%M:%S%.fZ").ok()?;
        Some(EarningsRow {
            ticker: self.ticker,
            ds,
            company_name: self.companyshortname,
            earnings_dt: DateTime::from_naive_utc_and_offset(earnings_dt, Utc),
            datetime_type: self.startdatetimetype,
            eps_estimate: self.epsestimate,
            eps_actual: self.epsactual,
            eps_surprise_pct: self.epssurprisepct,
            time_zone: self.time_zone_short_name,
            gmt_offset_ms: self.gmt_offset_milli_seconds,
            quote_type: self.quote_type,
        })
    }
}

#[derive(Debug)]
struct Page {
    rows: Vec<EarningsRecord>,
    total: Option<usize>,
}

/// Locate the JSON assigned to `root.App.main` within the page.
fn extract_app_state(html: &str) -> Option<&str> {
    let start = html.find(APP_STATE_MARKER)? + APP_STATE_MARKER.len();
    let rest = &html[start..];
    let end = rest.find("}(this)").unwrap_or(rest.len());
    Some(rest[..end].trim_end().trim_end_matches(';').trim_end())
}

fn parse_page(html: &str, ticker: &str) -> anyhow::Result<Page> {
    let json = extract_app_state(html).ok_or_else(|| Error::EarningsPayload(ticker.to_string()))?;
    let state: AppState = serde_json::from_str(json)?;
    let stores = state.context.dispatcher.stores;
    Ok(Page {
        rows: stores.screener_results_store.results.rows,
        total: stores
            .screener_criteria_store
            .and_then(|store| store.meta)
            .and_then(|meta| meta.total),
    })
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{query_param, MockServer};
    use chrono::TimeZone;

    const EARNINGS_FIXTURE: &str = include_str!("../../tests/fixtures/earnings.html");

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn app_state_is_located() {
        let html = "<script>root.App.main = {\"a\": 1};\n}(this));</script>";
        assert_eq!(extract_app_state(html), Some("{\"a\": 1}"));
        assert_eq!(extract_app_state("<html></html>"), None);
    }

    #[test]
    fn page_yields_records_and_total() {
        let page = parse_page(EARNINGS_FIXTURE, "AAPL").unwrap();
        assert_eq!(page.rows.len(), 3);
        assert_eq!(page.total, Some(3));
    }

    #[test]
    fn page_without_state_is_a_payload_error() {
        let err = parse_page("<html><body>consent</body></html>", "AAPL").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::EarningsPayload(t)) if t == "AAPL"
        ));
    }

    #[test]
    fn historical_rows_are_kept_on_bootstrap() {
        let page = parse_page(EARNINGS_FIXTURE, "AAPL").unwrap();
        let rows = to_rows(page.rows, true, today());
        assert_eq!(rows.len(), 3);

        let past = &rows[0];
        assert_eq!(past.ticker, "AAPL");
        assert_eq!(past.ds, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(past.company_name.as_deref(), Some("Apple Inc"));
        assert_eq!(
            past.earnings_dt,
            Utc.with_ymd_and_hms(2024, 2, 1, 21, 30, 0).unwrap()
        );
        assert_eq!(past.datetime_type.as_deref(), Some("AMC"));
        assert_eq!(past.eps_estimate, Some(2.1));
        assert_eq!(past.eps_actual, Some(2.18));
        assert_eq!(past.eps_surprise_pct, Some(3.81));
        assert_eq!(past.time_zone.as_deref(), Some("EST"));
        assert_eq!(past.gmt_offset_ms, Some(-18_000_000));
        assert_eq!(past.quote_type.as_deref(), Some("EQUITY"));
    }

    #[test]
    fn only_future_rows_without_bootstrap() {
        let page = parse_page(EARNINGS_FIXTURE, "AAPL").unwrap();
        let rows = to_rows(page.rows, false, today());

        // the upcoming announcement has no actuals yet
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ds, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(rows[0].eps_actual, None);
        assert_eq!(rows[0].eps_surprise_pct, None);
    }

    #[test]
    fn announcement_on_today_is_historical() {
        let page = parse_page(EARNINGS_FIXTURE, "AAPL").unwrap();
        let rows = to_rows(page.rows, false, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert!(rows.is_empty());
    }

    #[test]
    fn malformed_start_is_skipped() {
        let record: EarningsRecord = serde_json::from_str(
            r#"{"ticker": "AAPL", "startdatetime": "soon", "epsestimate": null}"#,
        )
        .unwrap();
        assert!(to_rows(vec![record], true, today()).is_empty());
    }

    // a calendar page holding `count` future announcements, numbered from `first`
    fn calendar_page(ticker: &str, first: usize, count: usize, total: usize) -> String {
        let start = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let rows = (first..first + count)
            .map(|i| {
                let ds = start + chrono::Duration::days(i as i64);
                serde_json::json!({
                    "ticker": ticker,
                    "companyshortname": ticker,
                    "startdatetime": format!("{}T20:30:00.000Z", ds.format("%Y-%m-%d")),
                    "startdatetimetype": "AMC",
                    "epsestimate": 1.0,
                    "epsactual": null,
                    "epssurprisepct": null,
                    "timeZoneShortName": "EST",
                    "gmtOffsetMilliSeconds": -18000000,
                    "quoteType": "EQUITY"
                })
            })
            .collect::<Vec<_>>();
        let state = serde_json::json!({
            "context": {"dispatcher": {"stores": {
                "ScreenerCriteriaStore": {"meta": {"total": total}},
                "ScreenerResultsStore": {"results": {"rows": rows}}
            }}}
        });
        format!("<script>(function (root) {{\nroot.App.main = {state};\n}}(this));</script>")
    }

    fn offset_of(target: &str) -> usize {
        query_param(target, "offset").unwrap().parse().unwrap()
    }


    #[tokio::test]
    async fn calendar_is_paged_until_total() {
        let server = MockServer::start(|target| {
            let offset = offset_of(target);
            (200, calendar_page("AAPL", offset, (150 - offset).min(100), 150))
        })
        .await;
        let earnings = Earnings::new(HttpClient::new(), false).with_base_url(&server.url);

        let records = earnings.extract_earnings_json("AAPL").await.unwrap();
        assert_eq!(records.len(), 150);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(offset_of(&requests[0]), 0);
        assert_eq!(offset_of(&requests[1]), 100);
        assert!(requests
            .iter()
            .all(|r| query_param(r, "size") == Some("100") && query_param(r, "symbol") == Some("AAPL")));
    }

    #[tokio::test]
    async fn empty_page_ends_paging() {
        let server = MockServer::start(|_| (200, calendar_page("AAPL", 0, 0, 500))).await;
        let earnings = Earnings::new(HttpClient::new(), false).with_base_url(&server.url);

        let records = earnings.extract_earnings_json("AAPL").await.unwrap();
        assert!(records.is_empty());
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn page_without_state_yields_no_rows() {
        let server = MockServer::start(|_| (200, "<html>consent</html>".to_string())).await;
        let earnings = Earnings::new(HttpClient::new(), false).with_base_url(&server.url);

        let rows = earnings
            .get_earnings_features_ticker("AAPL", today())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn failing_ticker_is_skipped() {
        let server = MockServer::start(|target| match query_param(target, "symbol") {
            Some("FAIL") => (500, "internal error".to_string()),
            Some(ticker) => (200, calendar_page(ticker, 0, 2, 2)),
            None => (400, String::new()),
        })
        .await;
        let earnings = Earnings::new(HttpClient::new(), false).with_base_url(&server.url);

        let err = earnings
            .get_earnings_features_ticker("FAIL", today())
            .await
            .unwrap_err();
        assert!(err.is::<reqwest::Error>());

        let rows = earnings
            .get_earnings_all_tickers(
                vec!["AAPL".to_string(), "FAIL".to_string(), "MSFT".to_string()],
                today(),
                false,
            )
            .await
            .unwrap();
        let tickers = rows.iter().map(|r| r.ticker.as_str()).collect::<Vec<_>>();
        assert_eq!(tickers, vec!["AAPL", "AAPL", "MSFT", "MSFT"]);
        assert_eq!(server.requests().len(), 4);
    }
}

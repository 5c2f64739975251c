use super::sql;
use crate::config::{NASDAQ_LL, NASDAQ_UL, SP500_LL, SP500_UL};
use crate::db::{Database, Record};
use crate::http::*;
use crate::Error;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::str::FromStr;
use tokio_postgres::types::ToSql;
use tracing::{debug, error, info, trace};

const SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";
const NASDAQ_URL: &str = "https://en.wikipedia.org/wiki/Nasdaq-100";

/// Stock market index whose constituents can be scraped from Wikipedia.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StockIndex {
    SP500,
    NASDAQ,
}

impl StockIndex {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockIndex::SP500 => "SP500",
            StockIndex::NASDAQ => "NASDAQ",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            StockIndex::SP500 => SP500_URL,
            StockIndex::NASDAQ => NASDAQ_URL,
        }
    }

    /// [`StockIndex::as_str`] as a statement parameter, for rows that only lend borrowed params.
    fn param(&self) -> &'static (dyn ToSql + Sync) {
        match self {
            StockIndex::SP500 => &"SP500",
            StockIndex::NASDAQ => &"NASDAQ",
        }
    }

    /// Exclusive bounds on a plausible constituent count.
    pub fn bounds(&self) -> (usize, usize) {
        match self {
            StockIndex::SP500 => (SP500_LL, SP500_UL),
            StockIndex::NASDAQ => (NASDAQ_LL, NASDAQ_UL),
        }
    }

    // header of the ticker column in the constituents table
    fn ticker_column(&self) -> &'static str {
        match self {
            StockIndex::SP500 => "Symbol",
            StockIndex::NASDAQ => "Ticker",
        }
    }

    fn company_column(&self) -> &'static str {
        match self {
            StockIndex::SP500 => "Security",
            StockIndex::NASDAQ => "Company",
        }
    }

    /// Fail unless `count` lies strictly inside [`StockIndex::bounds`].
    pub fn check_count(&self, count: usize) -> Result<(), Error> {
        let (lower, upper) = self.bounds();
        if count > lower && count < upper {
            Ok(())
        } else {
            Err(Error::TickerCount {
                index: self.as_str(),
                url: self.url(),
                count,
                lower,
                upper,
            })
        }
    }
}

impl fmt::Display for StockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SP500" => Ok(StockIndex::SP500),
            "NASDAQ" => Ok(StockIndex::NASDAQ),
            other => Err(Error::UnknownIndex(other.to_string())),
        }
    }
}

// scrape
// ----------------------------------------------------------------------------

/// Get the list of all stocks in `index` from its Wikipedia page.
pub async fn get_tickers_index(http_client: &HttpClient, index: StockIndex) -> anyhow::Result<Tickers> {
    info!("Getting stock tickers for {index} from Wiki .....");
    let html = http_client
        .get(index.url())
        .send()
        .await
        .map_err(|err| {
            error!("failed to fetch {index} constituents, error({err})");
            err
        })?
        .error_for_status()?
        .text()
        .await?;

    let tickers = parse_constituents(&html, index)?;
    index.check_count(tickers.0.len()).map_err(|err| {
        error!("{err}");
        err
    })?;

    info!("Fetched stock tickers from {index}.");
    Ok(tickers)
}

/// Read the tickers of `index` previously stored in `stock.tickers`.
pub async fn read_tickers(db: &Database, index: StockIndex) -> anyhow::Result<Vec<String>> {
    let tickers = db
        .execute_read_query(sql::SELECT_INDEX_TICKERS, &[&index.as_str()])
        .await?
        .into_iter()
        .map(|row| row.get(0))
        .collect::<Vec<String>>();
    debug!("{} tickers stored for {index}", tickers.len());
    Ok(tickers)
}

// de
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Tickers(pub Vec<Ticker>);

/// One constituent of an index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticker {
    pub ticker: String,
    pub stock_index: StockIndex,
    pub company: Option<String>,
}

impl Record for Ticker {
    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![&self.ticker, self.stock_index.param(), &self.company]
    }
}

impl Tickers {
    pub fn symbols(&self) -> Vec<String> {
        self.0.iter().map(|t| t.ticker.clone()).collect()
    }

    pub async fn insert(&self, db: &Database) -> anyhow::Result<u64> {
        db.execute_write_query(&sql::TICKERS, &self.0).await
    }
}

/// Find the first table whose header row names the index's ticker column, and
/// read a [`Ticker`] from each of its data rows.
pub fn parse_constituents(html: &str, index: StockIndex) -> Result<Tickers, Error> {
    let doc = Html::parse_document(html);
    let sel_table = selector("table");
    let sel_tr = selector("tr");
    let sel_th = selector("th");
    let sel_cell = selector("th, td");
    let sel_td = selector("td");

    for table in doc.select(&sel_table) {
        // header cells come from the first row holding any <th>
        let Some(headers) = table
            .select(&sel_tr)
            .map(|tr| tr.select(&sel_th).map(text).collect::<Vec<_>>())
            .find(|hs| !hs.is_empty())
        else {
            continue;
        };

        let Some(ticker_col) = headers.iter().position(|h| h == index.ticker_column()) else {
            continue;
        };
        let company_col = headers.iter().position(|h| h == index.company_column());
        trace!("constituents table found, headers: {headers:?}");

        let tickers = table
            .select(&sel_tr)
            // data rows carry at least one <td>; some tables put the row label in a <th>
            .filter(|tr| tr.select(&sel_td).next().is_some())
            .filter_map(|tr| {
                let cells = tr.select(&sel_cell).map(text).collect::<Vec<_>>();
                let ticker = cells.get(ticker_col).filter(|t| !t.is_empty())?.clone();
                let company = company_col
                    .and_then(|c| cells.get(c))
                    .filter(|c| !c.is_empty())
                    .cloned();
                Some(Ticker {
                    ticker,
                    stock_index: index,
                    company,
                })
            })
            .collect();

        return Ok(Tickers(tickers));
    }

    Err(Error::MissingTable {
        column: index.ticker_column(),
        url: index.url(),
    })
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

// collapse whitespace & trim
fn text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

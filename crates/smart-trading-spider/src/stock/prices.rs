use super::alpha_vantage::RawSeries;
use super::sql;
use crate::config::{DEFAULT_DAYS_DAILY, DEFAULT_DAYS_INTRA};
use crate::db::{Record, Table};
use crate::Error;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::types::ToSql;
use tracing::info;

/// Frequency of a price series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PriceType {
    Daily,
    Intraday,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Daily => "daily",
            PriceType::Intraday => "intraday",
        }
    }

    /// Destination table; intraday rows key on `ts` rather than `dt`.
    pub fn table(&self) -> &'static Table {
        match self {
            PriceType::Daily => &sql::DAILY_PRICES,
            PriceType::Intraday => &sql::INTRADAY_PRICES,
        }
    }

    /// Look-back used when no start date is given.
    pub fn default_days(&self) -> i64 {
        match self {
            PriceType::Daily => DEFAULT_DAYS_DAILY,
            PriceType::Intraday => DEFAULT_DAYS_INTRA,
        }
    }

    fn timestamp_format(&self) -> &'static str {
        match self {
            PriceType::Daily => "%Y-%m-%d",
            PriceType::Intraday => "%Y-%m-%d %H:%M:%S",
        }
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(PriceType::Daily),
            "intraday" => Ok(PriceType::Intraday),
            other => Err(Error::UnknownPriceType(other.to_string())),
        }
    }
}

/// Width of an intraday bar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interval {
    Min1,
    Min5,
    #[default]
    Min15,
    Min30,
    Min60,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Min1 => "1min",
            Interval::Min5 => "5min",
            Interval::Min15 => "15min",
            Interval::Min30 => "30min",
            Interval::Min60 => "60min",
        }
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" => Ok(Interval::Min1),
            "5min" => Ok(Interval::Min5),
            "15min" => Ok(Interval::Min15),
            "30min" => Ok(Interval::Min30),
            "60min" => Ok(Interval::Min60),
            other => Err(Error::UnknownInterval(other.to_string())),
        }
    }
}

/// Resolve the earliest timestamp to keep.
///
/// Without `start_date`, go back the price type's default number of days from
/// `today`; otherwise `start_date` must be a `yyyy-mm-dd` string.
pub fn resolve_start_date(
    start_date: Option<&str>,
    price_type: PriceType,
    today: NaiveDate,
) -> Result<NaiveDateTime, Error> {
    match start_date {
        None => {
            let days = price_type.default_days();
            let start = today - Duration::days(days);
            info!(
                "\"start_date\" not specified, using default of {days} (business) days, with start date of {start}."
            );
            Ok(start.and_time(NaiveTime::MIN))
        }
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(|date| date.and_time(NaiveTime::MIN))
            .map_err(|_| Error::InvalidStartDate(raw.to_string())),
    }
}

/// Strip the ordinal from an Alpha Vantage column name, e.g. `"1. open"` -> `"open"`.
pub fn normalize_column(column: &str) -> String {
    column
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .replace(". ", "")
}

// output
// ----------------------------------------------------------------------------

/// One bar, indexed by `(ticker, dt)`.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceRow {
    pub ticker: String,
    pub dt: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Record for PriceRow {
    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.ticker,
            &self.dt,
            &self.open,
            &self.high,
            &self.low,
            &self.close,
            &self.volume,
        ]
    }
}

/// CSV shape of a [`PriceRow`]; `dt` keeps the API's own timestamp format.
#[derive(Debug, Serialize)]
pub(crate) struct CsvPrice<'a> {
    ticker: &'a str,
    dt: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

/// The price series of one ticker, sorted by timestamp.
#[derive(Clone, Debug)]
pub struct PriceTable {
    pub ticker: String,
    pub price_type: PriceType,
    pub rows: Vec<PriceRow>,
}

impl PriceTable {
    pub fn empty(ticker: &str, price_type: PriceType) -> Self {
        Self {
            ticker: ticker.to_string(),
            price_type,
            rows: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Reshape a raw Alpha Vantage series into a table.
    ///
    /// Rows before `start` are dropped, and unless `after_hours` is set,
    /// intraday bars outside 09:30-16:00 are dropped too.
    pub fn from_series(
        ticker: &str,
        price_type: PriceType,
        series: RawSeries,
        start: NaiveDateTime,
        after_hours: bool,
    ) -> Result<Self, Error> {
        let truncate = price_type == PriceType::Intraday && !after_hours;
        if truncate {
            info!("{ticker}: Truncating pre-market and after-hours data.");
        }

        let mut rows = Vec::with_capacity(series.len());
        for (stamp, columns) in series {
            let dt = parse_timestamp(&stamp, price_type).ok_or_else(|| Error::Malformed {
                ticker: ticker.to_string(),
                field: "timestamp",
                value: stamp.clone(),
            })?;
            if dt < start {
                continue;
            }
            if truncate && !in_market_hours(dt.time()) {
                continue;
            }

            let columns = columns
                .into_iter()
                .map(|(col, val)| (normalize_column(&col), val))
                .collect::<std::collections::HashMap<_, _>>();
            let field = |name: &'static str| -> Result<&String, Error> {
                columns.get(name).ok_or_else(|| Error::Malformed {
                    ticker: ticker.to_string(),
                    field: name,
                    value: String::new(),
                })
            };

            rows.push(PriceRow {
                ticker: ticker.to_string(),
                dt,
                open: parse_value(ticker, "open", field("open")?)?,
                high: parse_value(ticker, "high", field("high")?)?,
                low: parse_value(ticker, "low", field("low")?)?,
                close: parse_value(ticker, "close", field("close")?)?,
                volume: parse_value(ticker, "volume", field("volume")?)?,
            });
        }
        rows.sort_by_key(|row| row.dt);

        Ok(Self {
            ticker: ticker.to_string(),
            price_type,
            rows,
        })
    }

    pub(crate) fn csv_rows(&self) -> impl Iterator<Item = CsvPrice<'_>> {
        let format = self.price_type.timestamp_format();
        self.rows.iter().map(move |row| CsvPrice {
            ticker: &row.ticker,
            dt: row.dt.format(format).to_string(),
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        })
    }
}

// regular session, both ends inclusive, as (hour, minute, second)
const MARKET_OPEN: (u32, u32, u32) = (9, 30, 0);
const MARKET_CLOSE: (u32, u32, u32) = (16, 0, 0);

fn in_market_hours(time: NaiveTime) -> bool {
    let hms = (time.hour(), time.minute(), time.second());
    (MARKET_OPEN..=MARKET_CLOSE).contains(&hms)
}

fn parse_timestamp(stamp: &str, price_type: PriceType) -> Option<NaiveDateTime> {
    match price_type {
        PriceType::Daily => NaiveDate::parse_from_str(stamp, "%Y-%m-%d")
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN)),
        PriceType::Intraday => NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").ok(),
    }
}

fn parse_value<T: FromStr>(ticker: &str, field: &'static str, value: &str) -> Result<T, Error> {
    value.trim().parse::<T>().map_err(|_| Error::Malformed {
        ticker: ticker.to_string(),
        field,
        value: value.to_string(),
    })
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

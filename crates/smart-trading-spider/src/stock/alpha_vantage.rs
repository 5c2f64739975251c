use super::batch::PriceSource;
use super::prices::{Interval, PriceType};
use crate::http::*;
use crate::Error;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{error, trace};

// RATE_LIMIT = 5 /60s on the free tier
//
// daily = `https://www.alphavantage.co/query?function=TIME_SERIES_DAILY&symbol=IBM&outputsize=full&apikey=...`
//
// intraday = `https://www.alphavantage.co/query?function=TIME_SERIES_INTRADAY&symbol=IBM&interval=15min&outputsize=full&apikey=...`

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Timestamp -> column (`"1. open"`, ...) -> value, exactly as the API returns it.
pub type RawSeries = BTreeMap<String, HashMap<String, String>>;

/// Client for the Alpha Vantage time series endpoints.
#[derive(Clone, Debug)]
pub struct AlphaVantage {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
}

impl AlphaVantage {
    pub fn new(http_client: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at another host, e.g. a local mirror.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn query(&self, ticker: &str, price_type: PriceType, interval: Interval) -> Vec<(&'static str, String)> {
        let mut query = vec![("symbol", ticker.to_string()), ("outputsize", "full".to_string())];
        match price_type {
            PriceType::Daily => query.push(("function", "TIME_SERIES_DAILY".to_string())),
            PriceType::Intraday => {
                query.push(("function", "TIME_SERIES_INTRADAY".to_string()));
                query.push(("interval", interval.as_str().to_string()));
            }
        }
        query.push(("apikey", self.api_key.clone()));
        query
    }
}

impl PriceSource for AlphaVantage {
    async fn fetch(
        &self,
        ticker: &str,
        price_type: PriceType,
        interval: Interval,
    ) -> anyhow::Result<RawSeries> {
        trace!("fetching {price_type} prices for {ticker}");
        let body = self
            .http_client
            .get(&self.base_url)
            .query(&self.query(ticker, price_type, interval))
            .send()
            .await
            .map_err(|err| {
                // the url carries the api key
                error!("failed to fetch Alpha Vantage prices for {ticker}, error({})", err.without_url());
                anyhow::anyhow!("request for {ticker} failed")
            })?
            .text()
            .await
            .map_err(|err| err.without_url())?;

        trace!("deserializing prices for {ticker}");
        let series = parse_series(&body, ticker, &series_key(price_type, interval))?;
        Ok(series)
    }
}

/// Name of the object holding the bars, e.g. `"Time Series (Daily)"`.
pub fn series_key(price_type: PriceType, interval: Interval) -> String {
    match price_type {
        PriceType::Daily => "Time Series (Daily)".to_string(),
        PriceType::Intraday => format!("Time Series ({})", interval.as_str()),
    }
}

// de
// ----------------------------------------------------------------------------

// Successful responses carry "Meta Data" plus one series object; refusals carry
// one of the message fields instead, still with a 200 status.
#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(flatten)]
    rest: HashMap<String, serde_json::Value>,
}

/// Deserialize an Alpha Vantage body and pull out the series under `key`.
pub fn parse_series(body: &str, ticker: &str, key: &str) -> anyhow::Result<RawSeries> {
    let mut response: SeriesResponse = serde_json::from_str(body)?;

    if let Some(message) = response
        .error_message
        .or(response.note)
        .or(response.information)
    {
        return Err(Error::Api {
            ticker: ticker.to_string(),
            message,
        }
        .into());
    }

    let series = response.rest.remove(key).ok_or_else(|| Error::MissingSeries {
        ticker: ticker.to_string(),
        key: key.to_string(),
    })?;
    Ok(serde_json::from_value(series)?)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

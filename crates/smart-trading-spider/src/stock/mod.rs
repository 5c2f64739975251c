pub mod sql;

/// Daily and intraday price series from the [Alpha Vantage] API.
///
/// [Alpha Vantage]: https://www.alphavantage.co/documentation/
pub mod alpha_vantage;

/// Chunked, rate limited collection of prices for a list of tickers.
pub mod batch;

/// Earnings calendar scraped from [Yahoo Finance].
///
/// [Yahoo Finance]: https://finance.yahoo.com/calendar/earnings
pub mod earnings;

/// Index constituents (S&P 500, NASDAQ-100) scraped from Wikipedia.
pub mod index;

pub mod prices;

use super::{price_window, DividendEvent, MarketData, MarketDataError};
use crate::model::amount::Price;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{collections::BTreeMap, time::Instant};
use tracing::{debug, info, trace};
use ureq::tls::{TlsConfig, TlsProvider};
use ureq::Agent;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    events: ChartEvents,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC, in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    /// Keyed by the ex-date timestamp as a string.
    #[serde(default)]
    dividends: BTreeMap<String, ChartDividend>,
}

#[derive(Debug, Deserialize)]
struct ChartDividend {
    amount: f64,
    date: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// A blocking client for the Yahoo Finance chart API.
pub struct YahooClient {
    agent: Agent,
    base_url: String,
    suffix: String,
}

impl YahooClient {
    /// Create a client for the API server at `base_url`.
    ///
    /// `suffix` is appended to every ledger ticker to form the exchange symbol, e.g. `2330` and
    /// `.TW` query `2330.TW`.
    pub fn new(base_url: &str, suffix: &str) -> Self {
        let agent = Agent::from(
            Agent::config_builder()
                .tls_config(
                    TlsConfig::builder()
                        .provider(TlsProvider::NativeTls)
                        .build(),
                )
                .build(),
        );

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            suffix: suffix.to_string(),
        }
    }

    fn symbol(&self, ticker: &str) -> String {
        format!("{ticker}{}", self.suffix)
    }

    /// Fetch one chart. Returns `Ok(None)` when the symbol is unknown to the API.
    fn fetch_chart(
        &self,
        symbol: &str,
        query: &[(&str, String)],
    ) -> Result<Option<ChartResult>, MarketDataError> {
        let url = format!("{}/v8/finance/chart/{symbol}", self.base_url);
        info!("Fetching chart `{symbol}` {query:?}");

        let start = Instant::now();
        let mut req = self.agent.get(&url).header("User-Agent", USER_AGENT);
        for (key, value) in query {
            req = req.query(*key, value);
        }

        let mut resp = match req.call() {
            Ok(resp) => resp,
            Err(ureq::Error::StatusCode(404)) => {
                debug!("Chart `{symbol}` not found");
                return Ok(None);
            }
            Err(err) => return Err(MarketDataError::Http(symbol.to_string(), err)),
        };
        let chart: ChartResponse = resp
            .body_mut()
            .read_json()
            .map_err(|err| MarketDataError::Http(symbol.to_string(), err))?;
        let dur = start.elapsed();

        info!("Chart `{symbol}` received in {dur:?}");
        trace!("{chart:#?}");

        first_result(symbol, chart)
    }
}

impl MarketData for YahooClient {
    fn dividend_history(&self, ticker: &str) -> Result<Vec<DividendEvent>, MarketDataError> {
        let symbol = self.symbol(ticker);
        let query = [
            ("range", "max".to_string()),
            ("interval", "1mo".to_string()),
            ("events", "div".to_string()),
        ];

        match self.fetch_chart(&symbol, &query)? {
            Some(result) => parse_dividends(&symbol, &result),
            None => Ok(Vec::new()),
        }
    }

    fn closing_price(&self, ticker: &str, as_of: NaiveDateTime) -> Result<Price, MarketDataError> {
        let symbol = self.symbol(ticker);
        let (start, end) = price_window(as_of);

        // Pad the request by a day on each side; the window is matched on exchange-local dates.
        let period1 = start
            .checked_sub_days(Days::new(1))
            .unwrap_or(start)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        let period2 = end
            .checked_add_days(Days::new(2))
            .unwrap_or(end)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        let query = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
        ];

        let closes = match self.fetch_chart(&symbol, &query)? {
            Some(result) => parse_closes(&symbol, &result)?,
            None => BTreeMap::new(),
        };

        closes
            .range(start..=end)
            .next_back()
            .map(|(_date, close)| *close)
            .ok_or_else(|| MarketDataError::PriceUnavailable {
                ticker: ticker.to_string(),
                start,
                end,
            })
    }
}

fn first_result(
    symbol: &str,
    chart: ChartResponse,
) -> Result<Option<ChartResult>, MarketDataError> {
    if let Some(error) = chart.chart.error {
        return Err(MarketDataError::Api(
            symbol.to_string(),
            format!("{}: {}", error.code, error.description),
        ));
    }

    Ok(chart.chart.result.and_then(|results| results.into_iter().next()))
}

/// Exchange-local trading date for a UTC timestamp.
fn local_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|datetime| datetime.date_naive())
}

fn to_price(symbol: &str, value: f64) -> Result<Price, MarketDataError> {
    Decimal::try_from(value)
        .map(|value| Price::from(value.normalize()))
        .map_err(|err| MarketDataError::Decimal(symbol.to_string(), err))
}

fn parse_closes(
    symbol: &str,
    result: &ChartResult,
) -> Result<BTreeMap<NaiveDate, Price>, MarketDataError> {
    let closes = result
        .indicators
        .quote
        .first()
        .map(|quote| quote.close.as_slice())
        .unwrap_or_default();

    let mut prices = BTreeMap::new();
    for (timestamp, close) in result.timestamp.iter().zip(closes) {
        // Days without trades are reported as `null`
        let (Some(date), Some(close)) = (local_date(*timestamp, result.meta.gmtoffset), close)
        else {
            continue;
        };
        prices.insert(date, to_price(symbol, *close)?);
    }

    Ok(prices)
}

fn parse_dividends(
    symbol: &str,
    result: &ChartResult,
) -> Result<Vec<DividendEvent>, MarketDataError> {
    let mut dividends = result
        .events
        .dividends
        .values()
        .filter_map(|dividend| {
            local_date(dividend.date, result.meta.gmtoffset).map(|ex_date| (ex_date, dividend))
        })
        .map(|(ex_date, dividend)| {
            Ok(DividendEvent {
                ex_date,
                amount: to_price(symbol, dividend.amount)?,
            })
        })
        .collect::<Result<Vec<_>, MarketDataError>>()?;
    dividends.sort_by_key(|dividend| dividend.ex_date);

    Ok(dividends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    // Trimmed from a real `2330.TW` response, timestamps at 09:00 +08:00.
    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "2330.TW", "currency": "TWD", "gmtoffset": 28800 },
                "timestamp": [1640653200, 1640739600, 1640826000, 1640912400],
                "events": {
                    "dividends": {
                        "1639616400": { "amount": 2.75, "date": 1639616400 },
                        "1615942800": { "amount": 2.5, "date": 1615942800 }
                    }
                },
                "indicators": { "quote": [{ "close": [604.0, 600.5, null, 615.0] }] }
            }],
            "error": null
        }
    }"#;

    const NOT_FOUND: &str = r#"{
        "chart": {
            "result": null,
            "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
        }
    }"#;

    fn chart() -> ChartResult {
        let chart: ChartResponse = serde_json::from_str(CHART).unwrap();
        first_result("2330.TW", chart).unwrap().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%F").unwrap()
    }

    #[test]
    fn test_parse_closes() {
        let closes = parse_closes("2330.TW", &chart()).unwrap();
        let closes: Vec<_> = closes
            .into_iter()
            .map(|(date, close)| (date.to_string(), close.to_string()))
            .collect();

        assert_eq!(
            closes,
            [
                ("2021-12-28".to_string(), "604".to_string()),
                ("2021-12-29".to_string(), "600.5".to_string()),
                ("2021-12-31".to_string(), "615".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_dividends() {
        let dividends = parse_dividends("2330.TW", &chart()).unwrap();

        assert_eq!(
            dividends,
            [
                DividendEvent {
                    ex_date: date("2021-03-17"),
                    amount: "2.5".parse().unwrap(),
                },
                DividendEvent {
                    ex_date: date("2021-12-16"),
                    amount: "2.75".parse().unwrap(),
                },
            ]
        );
    }

    #[test]
    fn test_api_error() {
        let chart: ChartResponse = serde_json::from_str(NOT_FOUND).unwrap();
        let err = first_result("9999.TW", chart).unwrap_err();

        assert!(matches!(err, MarketDataError::Api(symbol, _) if symbol == "9999.TW"));
    }

    #[test]
    fn test_symbol_suffix() {
        let client = YahooClient::new("https://example.com/", ".TW");

        assert_eq!(client.symbol("2330"), "2330.TW");
        assert_eq!(client.base_url, "https://example.com");
    }
}

// Polymorphic data source capability: `{get_option_chain, get_spot_price,
// get_available_expiries}`. The core depends on this trait, never on a
// concrete vendor -- see spec.md §9's "Polymorphic data source" note.
//
// Three implementations, grounded on the source project's
// `data_sources/base_client.py` + `data_sources/eod_client.py`, and this
// crate's own `models::bs_mod` / csv-loading conventions:
//   - `SyntheticClient`: Black-Scholes-generated chains, for tests and demos.
//   - `CsvReplayClient`: on-disk chain replay, in the teacher's csv-loading style.
//   - `HttpDataClient`: a live vendor sketch (rate-limited, env-keyed).

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::models::bs_mod::black_scholes_merton_call;
use crate::rnd::chain::{Chain, OptionQuote, Right};
use crate::rnd::error::RndError;

pub trait DataClient: Send + Sync {
    fn get_option_chain(&self, symbol: &str, trade_date: NaiveDate) -> Result<Chain, RndError>;
    fn get_spot_price(&self, symbol: &str, trade_date: NaiveDate) -> Result<Option<f64>, RndError>;
    fn get_available_expiries(&self, symbol: &str, trade_date: NaiveDate) -> Result<Vec<NaiveDate>, RndError>;
}

/// Generates a Black-Scholes-consistent chain around a flat or term-structured
/// implied vol, for seed-vector tests and local demos. Liquidity fields are
/// filled with values that pass the default [`crate::rnd::cleaner::CleanerConfig`].
pub struct SyntheticClient {
    spot: f64,
    sigma: f64,
    r: f64,
    dte_list: Vec<i64>,
}

impl SyntheticClient {
    pub fn new(spot: f64, sigma: f64, r: f64, dte_list: Vec<i64>) -> Self {
        Self { spot, sigma, r, dte_list }
    }
}

impl DataClient for SyntheticClient {
    fn get_option_chain(&self, symbol: &str, trade_date: NaiveDate) -> Result<Chain, RndError> {
        let mut quotes = Vec::new();
        for &dte in &self.dte_list {
            let expiry = trade_date + chrono::Duration::days(dte);
            let t = (dte as f64 / 365.0).max(1e-6);
            for i in 0..41 {
                let strike = self.spot * 0.5 + i as f64 * (self.spot / 40.0);
                if strike <= 0.0 {
                    continue;
                }
                for right in [Right::Call, Right::Put] {
                    let call_price = black_scholes_merton_call(self.spot, strike, t, self.r, self.sigma, 0.0);
                    let price = match right {
                        Right::Call => call_price,
                        // Put via parity: P = C - S + K*e^{-rT}
                        Right::Put => call_price - self.spot + strike * (-self.r * t).exp(),
                    };
                    if price <= 0.0 {
                        continue;
                    }
                    let spread = (price * 0.02).max(0.01);
                    quotes.push(OptionQuote {
                        underlying: symbol.to_string(),
                        contract_id: format!("{symbol}{expiry}{strike}{right:?}"),
                        expiry,
                        strike,
                        right,
                        bid: (price - spread / 2.0).max(0.0),
                        ask: price + spread / 2.0,
                        last: price,
                        volume: 100,
                        open_interest: 500,
                        iv: Some(self.sigma),
                        delta: None,
                        gamma: None,
                        theta: None,
                        vega: None,
                    });
                }
            }
        }
        Ok(Chain::new(quotes))
    }

    fn get_spot_price(&self, _symbol: &str, _trade_date: NaiveDate) -> Result<Option<f64>, RndError> {
        Ok(Some(self.spot))
    }

    fn get_available_expiries(&self, symbol: &str, trade_date: NaiveDate) -> Result<Vec<NaiveDate>, RndError> {
        Ok(self.get_option_chain(symbol, trade_date)?.expiries())
    }
}

/// One CSV row, matching the vendor-agnostic schema in
/// [`crate::rnd::chain::OptionQuote`]. Expiry is parsed as `%Y-%m-%d`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    underlying_symbol: String,
    option_symbol: String,
    expiry: String,
    strike: f64,
    right: String,
    bid: f64,
    ask: f64,
    last: f64,
    volume: u64,
    open_interest: u64,
    iv: Option<f64>,
    delta: Option<f64>,
    gamma: Option<f64>,
    theta: Option<f64>,
    vega: Option<f64>,
}

/// Replays a previously-saved chain from disk. One file per (symbol, trade
/// date), in the directory layout the teacher's `csv_loader.rs` assumes for
/// its own flat per-symbol files.
pub struct CsvReplayClient {
    root: PathBuf,
}

impl CsvReplayClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, symbol: &str, trade_date: NaiveDate) -> PathBuf {
        self.root.join(format!("{symbol}_{trade_date}.csv"))
    }

    fn load(&self, symbol: &str, trade_date: NaiveDate) -> Result<Chain, RndError> {
        let path = self.path_for(symbol, trade_date);
        if !path.exists() {
            return Ok(Chain::default());
        }
        let file = File::open(&path)?;
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).has_headers(true).from_reader(file);

        let mut quotes = Vec::new();
        for record in reader.deserialize::<CsvRow>() {
            let row = record?;
            let expiry = NaiveDate::parse_from_str(&row.expiry, "%Y-%m-%d")
                .map_err(|e| RndError::Config(format!("bad expiry '{}' in {}: {e}", row.expiry, path.display())))?;
            let right = match row.right.trim().to_uppercase().as_str() {
                "C" | "CALL" => Right::Call,
                "P" | "PUT" => Right::Put,
                other => return Err(RndError::Config(format!("unknown right '{other}' in {}", path.display()))),
            };
            quotes.push(OptionQuote {
                underlying: row.underlying_symbol,
                contract_id: row.option_symbol,
                expiry,
                strike: row.strike,
                right,
                bid: row.bid,
                ask: row.ask,
                last: row.last,
                volume: row.volume,
                open_interest: row.open_interest,
                iv: row.iv,
                delta: row.delta,
                gamma: row.gamma,
                theta: row.theta,
                vega: row.vega,
            });
        }
        Ok(Chain::new(quotes))
    }
}

impl DataClient for CsvReplayClient {
    fn get_option_chain(&self, symbol: &str, trade_date: NaiveDate) -> Result<Chain, RndError> {
        self.load(symbol, trade_date)
    }

    fn get_spot_price(&self, symbol: &str, trade_date: NaiveDate) -> Result<Option<f64>, RndError> {
        Ok(self.load(symbol, trade_date)?.median_strike())
    }

    fn get_available_expiries(&self, symbol: &str, trade_date: NaiveDate) -> Result<Vec<NaiveDate>, RndError> {
        Ok(self.load(symbol, trade_date)?.expiries())
    }
}

/// Live HTTP vendor sketch, rate-limited to 1 request/second like the source
/// project's `EODClient`. Wraps a `tokio` runtime so it can satisfy the
/// synchronous [`DataClient`] contract from the rest of the core, which does
/// no async I/O of its own.
pub struct HttpDataClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    last_request: Mutex<Option<Instant>>,
}

impl HttpDataClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RndError> {
        let api_key = crate::config::require_env("EOD_API_KEY")?;
        let runtime = tokio::runtime::Runtime::new().map_err(RndError::Io)?;
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            client: reqwest::Client::new(),
            runtime,
            last_request: Mutex::new(None),
        })
    }

    fn rate_limit_wait(&self) {
        let mut last = self.last_request.lock().unwrap();
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < Duration::from_secs(1) {
                std::thread::sleep(Duration::from_secs(1) - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_chain(&self, symbol: &str, trade_date: NaiveDate) -> Result<Chain, RndError> {
        let url = format!("{}/options/{symbol}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("trade_date", trade_date.to_string()), ("api_token", self.api_key.clone())])
            .send()
            .await
            .map_err(|e| RndError::Config(format!("request to {url} failed: {e}")))?;
        let rows: Vec<CsvRow> = response
            .json()
            .await
            .map_err(|e| RndError::Config(format!("malformed response from {url}: {e}")))?;

        let quotes = rows
            .into_iter()
            .filter_map(|row| {
                let expiry = NaiveDate::parse_from_str(&row.expiry, "%Y-%m-%d").ok()?;
                let right = match row.right.trim().to_uppercase().as_str() {
                    "C" | "CALL" => Right::Call,
                    "P" | "PUT" => Right::Put,
                    _ => return None,
                };
                Some(OptionQuote {
                    underlying: row.underlying_symbol,
                    contract_id: row.option_symbol,
                    expiry,
                    strike: row.strike,
                    right,
                    bid: row.bid,
                    ask: row.ask,
                    last: row.last,
                    volume: row.volume,
                    open_interest: row.open_interest,
                    iv: row.iv,
                    delta: row.delta,
                    gamma: row.gamma,
                    theta: row.theta,
                    vega: row.vega,
                })
            })
            .collect();
        Ok(Chain::new(quotes))
    }
}

impl DataClient for HttpDataClient {
    fn get_option_chain(&self, symbol: &str, trade_date: NaiveDate) -> Result<Chain, RndError> {
        self.rate_limit_wait();
        self.runtime.block_on(self.fetch_chain(symbol, trade_date))
    }

    fn get_spot_price(&self, symbol: &str, trade_date: NaiveDate) -> Result<Option<f64>, RndError> {
        Ok(self.get_option_chain(symbol, trade_date)?.median_strike())
    }

    fn get_available_expiries(&self, symbol: &str, trade_date: NaiveDate) -> Result<Vec<NaiveDate>, RndError> {
        Ok(self.get_option_chain(symbol, trade_date)?.expiries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_client_generates_nonempty_two_sided_chain() {
        let trade_date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let client = SyntheticClient::new(100.0, 0.2, 0.05, vec![30]);
        let chain = client.get_option_chain("SYN", trade_date).unwrap();
        assert!(!chain.is_empty());
        assert!(chain.quotes.iter().any(|q| q.right == Right::Call));
        assert!(chain.quotes.iter().any(|q| q.right == Right::Put));
    }

    #[test]
    fn csv_replay_returns_empty_chain_for_missing_file() {
        let client = CsvReplayClient::new("/nonexistent/path/definitely");
        let trade_date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let chain = client.get_option_chain("SYN", trade_date).unwrap();
        assert!(chain.is_empty());
    }
}

// Option chain data model.
//
// Columns mirror the vendor-agnostic schema in the original project's
// `BaseDataClient.CHAIN_COLUMNS` — underlying/contract identity, expiry,
// strike, right, quote, liquidity, optional Greeks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Right {
    Call,
    Put,
}

/// One row per listed contract.
///
/// Invariant after cleaning (see [`crate::rnd::cleaner::ChainCleaner`]):
/// `0 <= bid <= ask`, `ask > 0`, `mid = (bid+ask)/2 > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub underlying: String,
    pub contract_id: String,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub right: Right,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub iv: Option<f64>,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
}

impl OptionQuote {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    pub fn spread_pct(&self) -> f64 {
        let mid = self.mid();
        if mid > 0.0 {
            self.spread() / mid
        } else {
            f64::INFINITY
        }
    }
}

/// Ordered set of quotes sharing a trade date.
/// Sort key: (expiry ascending, strike ascending, right).
#[derive(Debug, Clone, Default)]
pub struct Chain {
    pub quotes: Vec<OptionQuote>,
}

fn right_rank(r: Right) -> u8 {
    match r {
        Right::Call => 0,
        Right::Put => 1,
    }
}

impl Chain {
    pub fn new(mut quotes: Vec<OptionQuote>) -> Self {
        quotes.sort_by(|a, b| {
            a.expiry
                .cmp(&b.expiry)
                .then_with(|| a.strike.partial_cmp(&b.strike).unwrap_or(Ordering::Equal))
                .then_with(|| right_rank(a.right).cmp(&right_rank(b.right)))
        });
        Self { quotes }
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn expiries(&self) -> Vec<NaiveDate> {
        let mut out: Vec<NaiveDate> = self.quotes.iter().map(|q| q.expiry).collect();
        out.dedup();
        out
    }

    /// Emergency spot proxy when the data client has none: the median strike.
    pub fn median_strike(&self) -> Option<f64> {
        if self.quotes.is_empty() {
            return None;
        }
        let mut strikes: Vec<f64> = self.quotes.iter().map(|q| q.strike).collect();
        strikes.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = strikes.len();
        Some(if n % 2 == 1 {
            strikes[n / 2]
        } else {
            (strikes[n / 2 - 1] + strikes[n / 2]) / 2.0
        })
    }
}

/// Where an OTM row's synthetic-call price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtmSource {
    Call,
    PutSynthetic,
}

/// One row per (expiry, strike) in the OTM synthetic-call chain.
/// Invariant: `mid > 0`; at most one row per (expiry, strike).
#[derive(Debug, Clone)]
pub struct OtmRow {
    pub expiry: NaiveDate,
    pub strike: f64,
    pub mid: f64,
    pub source: OtmSource,
}

/// The OTM chain built by [`crate::rnd::cleaner::ChainCleaner::build_otm_chain`],
/// sorted by (expiry, strike), deduplicated on (expiry, strike).
#[derive(Debug, Clone, Default)]
pub struct OtmChain {
    pub rows: Vec<OtmRow>,
}

impl OtmChain {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn expiries(&self) -> Vec<NaiveDate> {
        let mut out: Vec<NaiveDate> = self.rows.iter().map(|r| r.expiry).collect();
        out.dedup();
        out
    }

    pub fn for_expiry(&self, expiry: NaiveDate) -> Vec<&OtmRow> {
        self.rows.iter().filter(|r| r.expiry == expiry).collect()
    }
}

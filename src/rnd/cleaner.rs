// Options chain cleaning: quote validity, liquidity filters, DTE windowing,
// OTM selection, put -> synthetic-call conversion, quality scoring.
//
// Translated operation for operation from the source project's
// `processing/chain_cleaner.py`.

use crate::rnd::chain::{Chain, OptionQuote, OtmChain, OtmRow, OtmSource, Right};
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct CleanerConfig {
    pub min_volume: u64,
    pub min_oi: u64,
    pub max_spread_pct: f64,
    pub min_dte: i64,
    pub max_dte: i64,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            min_volume: 10,
            min_oi: 100,
            max_spread_pct: 0.20,
            min_dte: 1,
            max_dte: 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLabel {
    High,
    Medium,
    Low,
}

/// Per-expiry data quality metrics, computed while building the OTM chain.
#[derive(Debug, Clone)]
pub struct DataQuality {
    pub num_raw: usize,
    pub num_otm: usize,
    pub num_calls: usize,
    pub num_puts_synthetic: usize,
    pub strike_range: (f64, f64),
    pub spot: f64,
    pub avg_strike_gap: f64,
    pub max_strike_gap: f64,
    pub quality_score: f64,
}

impl DataQuality {
    pub fn strike_coverage(&self) -> f64 {
        (self.strike_range.1 - self.strike_range.0) / self.spot
    }

    pub fn moneyness_range(&self) -> (f64, f64) {
        (self.strike_range.0 / self.spot, self.strike_range.1 / self.spot)
    }

    pub fn quality_label(&self) -> QualityLabel {
        if self.quality_score >= 0.8 {
            QualityLabel::High
        } else if self.quality_score >= 0.5 {
            QualityLabel::Medium
        } else {
            QualityLabel::Low
        }
    }
}

impl std::fmt::Display for DataQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Options: {} ({}C + {}P->C)\nStrikes: {:.0}-{:.0} ({:.0}% of spot)\n\
             Gaps: avg={:.1}, max={:.1}\nMoneyness: {:.2}-{:.2}\nQuality: {:.0}%",
            self.num_otm,
            self.num_calls,
            self.num_puts_synthetic,
            self.strike_range.0,
            self.strike_range.1,
            self.strike_coverage() * 100.0,
            self.avg_strike_gap,
            self.max_strike_gap,
            self.moneyness_range().0,
            self.moneyness_range().1,
            self.quality_score * 100.0,
        )
    }
}

/// Weighted average of four sub-scores, each in [0,1]; see spec.md §4.2.
fn score_quality(
    num_otm: usize,
    num_calls: usize,
    num_puts_synthetic: usize,
    strikes: &[f64],
    spot: f64,
) -> (f64, f64, f64) {
    let mut sorted = strikes.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let range = sorted.last().unwrap() - sorted.first().unwrap();
    let coverage = range / spot;

    let gaps: Vec<f64> = sorted.windows(2).map(|w| w[1] - w[0]).collect();
    let max_gap = gaps.iter().cloned().fold(0.0, f64::max);
    let avg_gap = if gaps.is_empty() {
        0.0
    } else {
        gaps.iter().sum::<f64>() / gaps.len() as f64
    };

    let n_score = (num_otm as f64 / 30.0).min(1.0);
    let cov_score = (coverage / 0.6).min(1.0);
    let gap_score = (1.0 - (max_gap - 5.0) / 45.0).max(0.0);
    let balance_score = if num_otm > 0 {
        (num_calls.min(num_puts_synthetic) as f64 * 2.0 / num_otm as f64).min(1.0)
    } else {
        0.0
    };
    let quality = 0.3 * n_score + 0.3 * cov_score + 0.2 * gap_score + 0.2 * balance_score;
    (quality, max_gap, avg_gap)
}

pub struct ChainCleaner {
    config: CleanerConfig,
}

impl ChainCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    /// Apply filters (a)-(f) from spec.md §4.2 in order. Never fails on
    /// empty input — an empty chain in yields an empty chain out.
    pub fn clean(&self, chain: &Chain, trade_date: NaiveDate) -> Chain {
        if chain.is_empty() {
            return Chain::default();
        }

        let kept: Vec<OptionQuote> = chain
            .quotes
            .iter()
            .filter(|q| q.bid >= 0.0 && q.bid <= q.ask && q.ask > 0.0)
            .filter(|q| q.volume >= self.config.min_volume)
            .filter(|q| q.open_interest >= self.config.min_oi)
            .filter(|q| q.spread_pct() <= self.config.max_spread_pct)
            .filter(|q| {
                let dte = (q.expiry - trade_date).num_days();
                dte >= self.config.min_dte && dte <= self.config.max_dte
            })
            .cloned()
            .collect();

        Chain::new(kept)
    }

    /// Build the OTM synthetic-call chain for every expiry, using put-call
    /// parity for the left tail (`C_synth = P + S - K*e^{-rT}`), and return
    /// per-expiry [`DataQuality`] alongside it. `trade_date` is needed to
    /// compute each expiry's `T` for the parity discount factor.
    pub fn build_otm_chain(
        &self,
        chain: &Chain,
        spot: f64,
        r: f64,
        trade_date: NaiveDate,
    ) -> (OtmChain, HashMap<NaiveDate, DataQuality>) {
        if chain.is_empty() {
            return (OtmChain::default(), HashMap::new());
        }

        let mut rows = Vec::new();
        let mut quality = HashMap::new();

        for expiry in chain.expiries() {
            let expiry_quotes: Vec<&OptionQuote> =
                chain.quotes.iter().filter(|q| q.expiry == expiry).collect();
            let num_raw = expiry_quotes.len();
            let t_years = (expiry - trade_date).num_days() as f64 / 365.0;

            let mut expiry_rows: Vec<OtmRow> = Vec::new();
            let mut num_calls = 0usize;
            let mut num_puts_synthetic = 0usize;

            // OTM calls (K > spot)
            for q in expiry_quotes.iter().filter(|q| q.right == Right::Call && q.strike > spot) {
                expiry_rows.push(OtmRow {
                    expiry,
                    strike: q.strike,
                    mid: q.mid(),
                    source: OtmSource::Call,
                });
                num_calls += 1;
            }

            // OTM puts (K < spot) -> synthetic call via put-call parity
            let discount = (-r * t_years).exp();
            for q in expiry_quotes.iter().filter(|q| q.right == Right::Put && q.strike < spot) {
                let c_synth = q.mid() + spot - q.strike * discount;
                if c_synth > 0.0 {
                    expiry_rows.push(OtmRow {
                        expiry,
                        strike: q.strike,
                        mid: c_synth,
                        source: OtmSource::PutSynthetic,
                    });
                    num_puts_synthetic += 1;
                }
            }

            // ATM band: add the real call if that strike isn't already present.
            // The real call wins over a synthetic at the same strike since its
            // quote isn't distorted by the parity-rate assumption.
            for q in expiry_quotes
                .iter()
                .filter(|q| q.right == Right::Call && q.strike >= spot * 0.99 && q.strike <= spot * 1.01)
            {
                let already_present = expiry_rows.iter().any(|r| (r.strike - q.strike).abs() < 1e-9);
                if !already_present {
                    expiry_rows.push(OtmRow {
                        expiry,
                        strike: q.strike,
                        mid: q.mid(),
                        source: OtmSource::Call,
                    });
                    num_calls += 1;
                }
            }

            if expiry_rows.is_empty() {
                continue;
            }

            let strikes: Vec<f64> = expiry_rows.iter().map(|r| r.strike).collect();
            let (score, max_gap, avg_gap) =
                score_quality(expiry_rows.len(), num_calls, num_puts_synthetic, &strikes, spot);
            let strike_min = strikes.iter().cloned().fold(f64::INFINITY, f64::min);
            let strike_max = strikes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            quality.insert(
                expiry,
                DataQuality {
                    num_raw,
                    num_otm: expiry_rows.len(),
                    num_calls,
                    num_puts_synthetic,
                    strike_range: (strike_min, strike_max),
                    spot,
                    avg_strike_gap: avg_gap,
                    max_strike_gap: max_gap,
                    quality_score: score,
                },
            );

            rows.extend(expiry_rows);
        }

        rows.sort_by(|a, b| a.expiry.cmp(&b.expiry).then_with(|| a.strike.partial_cmp(&b.strike).unwrap()));
        (OtmChain { rows }, quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rnd::chain::Right;

    fn quote(expiry: NaiveDate, strike: f64, right: Right, bid: f64, ask: f64, volume: u64, oi: u64) -> OptionQuote {
        OptionQuote {
            underlying: "ES".into(),
            contract_id: format!("ES{strike}{right:?}"),
            expiry,
            strike,
            right,
            bid,
            ask,
            last: (bid + ask) / 2.0,
            volume,
            open_interest: oi,
            iv: None,
            delta: None,
            gamma: None,
            theta: None,
            vega: None,
        }
    }

    fn trade_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()
    }

    #[test]
    fn clean_drops_crossed_and_illiquid_quotes() {
        let expiry = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let quotes = vec![
            quote(expiry, 100.0, Right::Call, 5.0, 5.2, 50, 200),
            quote(expiry, 105.0, Right::Call, 6.0, 4.0, 50, 200), // bid > ask
            quote(expiry, 110.0, Right::Call, 1.0, 1.1, 1, 200),  // volume below min
        ];
        let chain = Chain::new(quotes);
        let cleaner = ChainCleaner::new(CleanerConfig::default());
        let cleaned = cleaner.clean(&chain, trade_date());
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.quotes[0].strike, 100.0);
    }

    #[test]
    fn otm_build_dedups_with_call_precedence_in_atm_band() {
        let expiry = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let spot = 100.0;
        let quotes = vec![
            quote(expiry, 100.0, Right::Call, 5.0, 5.2, 50, 200),
            quote(expiry, 100.0, Right::Put, 4.8, 5.0, 50, 200),
        ];
        let chain = Chain::new(quotes);
        let cleaner = ChainCleaner::new(CleanerConfig::default());
        let cleaned = cleaner.clean(&chain, trade_date());
        let (otm, _) = cleaner.build_otm_chain(&cleaned, spot, 0.05, trade_date());
        let rows = otm.for_expiry(expiry);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, OtmSource::Call);
    }

    #[test]
    fn empty_chain_never_throws() {
        let cleaner = ChainCleaner::new(CleanerConfig::default());
        let cleaned = cleaner.clean(&Chain::default(), trade_date());
        assert!(cleaned.is_empty());
        let (otm, quality) = cleaner.build_otm_chain(&cleaned, 100.0, 0.05, trade_date());
        assert!(otm.is_empty());
        assert!(quality.is_empty());
    }

    #[test]
    fn quality_score_in_unit_interval_and_monotone_in_coverage() {
        let expiry = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let spot = 100.0;
        let mut quotes = Vec::new();
        for k in (60..=140).step_by(5) {
            let right = if (k as f64) > spot { Right::Call } else { Right::Put };
            quotes.push(quote(expiry, k as f64, right, 1.0, 1.2, 50, 200));
        }
        let chain = Chain::new(quotes);
        let cleaner = ChainCleaner::new(CleanerConfig::default());
        let cleaned = cleaner.clean(&chain, trade_date());
        let (_otm, quality) = cleaner.build_otm_chain(&cleaned, spot, 0.05, trade_date());
        let dq = quality.get(&expiry).unwrap();
        assert!(dq.quality_score >= 0.0 && dq.quality_score <= 1.0);
    }
}

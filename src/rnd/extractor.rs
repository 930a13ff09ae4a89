// Breeden-Litzenberger RND extraction: f_Q(K) = e^{rT} * d2C/dK2.
//
// Ported from `metrics/rnd_extractor.py`. Prefers the smoothing spline's
// analytic log-strike derivatives (chain rule to strike-space) over a
// finite-difference fallback, per spec.md §4.5 and §9's function-as-value
// design note.

use chrono::NaiveDate;

use crate::rnd::cleaner::DataQuality;
use crate::rnd::error::RndError;
use crate::rnd::kernel::{self, central_diff_2, moments as compute_moments, normalize_density, quantiles as compute_quantiles, Moments};
use crate::rnd::smoother::SmoothingResult;

#[derive(Debug, Clone)]
pub struct RndResult {
    pub strikes: Vec<f64>,
    pub density: Vec<f64>,
    pub expiry: NaiveDate,
    pub time_to_expiry: f64,
    pub spot_price: f64,
    pub moments: Moments,
    pub data_quality: Option<DataQuality>,
}

impl RndResult {
    pub fn get_quantiles(&self, qs: &[f64]) -> Vec<(f64, f64)> {
        let values = compute_quantiles(&self.density, &self.strikes, qs);
        qs.iter().copied().zip(values).collect()
    }

    /// `int_{K_min}^{K} f dK'`.
    pub fn probability_below(&self, strike: f64) -> f64 {
        let idx = self.strikes.partition_point(|&k| k <= strike);
        if idx == 0 {
            return 0.0;
        }
        kernel::trapezoid(&self.density[..idx], &self.strikes[..idx])
    }

    pub fn probability_above(&self, strike: f64) -> f64 {
        1.0 - self.probability_below(strike)
    }
}

pub struct RndExtractor {
    pub r: f64,
    pub num_points: usize,
}

impl Default for RndExtractor {
    fn default() -> Self {
        Self { r: 0.05, num_points: 500 }
    }
}

impl RndExtractor {
    pub fn new(r: f64, num_points: usize) -> Self {
        Self { r, num_points }
    }

    pub fn extract(
        &self,
        smoothed: &SmoothingResult,
        expiry: NaiveDate,
        trade_date: NaiveDate,
        data_quality: Option<DataQuality>,
    ) -> Result<RndResult, RndError> {
        let t = (expiry - trade_date).num_days() as f64 / 365.0;
        if t <= 0.0 {
            return Err(RndError::Expired { expiry });
        }

        let strikes = smoothed.get_strike_grid(self.num_points);
        let d2c = self.density_second_derivative(smoothed, &strikes);

        let raw_density: Vec<f64> = d2c.iter().map(|&d| (self.r * t).exp() * d).collect();
        let density = normalize_density(&raw_density, &strikes);
        let moments = compute_moments(&density, &strikes);

        Ok(RndResult {
            strikes,
            density,
            expiry,
            time_to_expiry: t,
            spot_price: smoothed.spot_price,
            moments,
            data_quality,
        })
    }

    /// Chain rule from log-strike second derivative to strike-space:
    /// `d2C/dK2 = (C''_{logK} - C'_{logK}) / K^2`. Falls back to central
    /// finite differences in strike-space if the spline handle is absent
    /// (it never is here, but the fallback mirrors the source project and
    /// keeps this usable against a plain `Fn(f64) -> f64` call-price model).
    fn density_second_derivative(&self, smoothed: &SmoothingResult, strikes: &[f64]) -> Vec<f64> {
        strikes
            .iter()
            .map(|&k| {
                let d1 = smoothed.d_dlogk(k);
                let d2 = smoothed.d2_dlogk2(k);
                (d2 - d1) / (k * k)
            })
            .collect()
    }

    /// Finite-difference fallback over an arbitrary call-price function,
    /// kept for callers that only have a point evaluator and no derivative
    /// handle.
    pub fn finite_diff_density(&self, call_price: impl Fn(f64) -> f64, strikes: &[f64]) -> Vec<f64> {
        let prices: Vec<f64> = strikes.iter().map(|&k| call_price(k)).collect();
        let dk = strikes[1] - strikes[0];
        central_diff_2(&prices, dk)
    }
}

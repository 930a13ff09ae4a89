// Call-price smoothing: fit a monotone, convex, positive C(K) through a
// single expiry's OTM rows.
//
// Ported from the source project's `processing/smoothing.py`, which leans on
// `scipy.interpolate.UnivariateSpline` in log-strike space. No such spline
// crate is in reach here, so the smoothing spline itself -- the Reinsch
// penalized natural cubic spline, searched over the regularization parameter
// `lambda` by bisection until the fitted residual sum matches the target `s`
// -- is hand-rolled, pure Rust, zero external crates, in the same style as
// the Black-Scholes and Newton-Raphson routines elsewhere in this crate.

use crate::rnd::chain::OtmRow;
use crate::rnd::error::RndError;

/// Knots, fitted values and second derivatives of a natural cubic spline
/// fitted in log-strike space, plus the data it was fit from.
#[derive(Debug, Clone)]
pub struct SmoothingResult {
    pub strikes: Vec<f64>,
    pub prices: Vec<f64>,
    pub spot_price: f64,
    pub strike_min: f64,
    pub strike_max: f64,
    log_knots: Vec<f64>,
    fitted: Vec<f64>,
    second_deriv: Vec<f64>,
    lambda: f64,
}

impl SmoothingResult {
    pub fn get_strike_grid(&self, num_points: usize) -> Vec<f64> {
        linspace(self.strike_min, self.strike_max, num_points)
    }

    /// `C(K)`: flat extrapolation outside `[K_min, K_max]`, clipped to >= 0.
    pub fn call_price(&self, k: f64) -> f64 {
        let log_k = k.max(1e-10).ln();
        self.eval(log_k).max(0.0)
    }

    /// First derivative of `C` with respect to log-strike, at `K`.
    pub fn d_dlogk(&self, k: f64) -> f64 {
        let log_k = k.max(1e-10).ln();
        self.eval_deriv1(log_k)
    }

    /// Second derivative of `C` with respect to log-strike, at `K`.
    pub fn d2_dlogk2(&self, k: f64) -> f64 {
        let log_k = k.max(1e-10).ln();
        self.eval_deriv2(log_k)
    }

    fn clip_log_k(&self, log_k: f64) -> f64 {
        let lo = self.log_knots[0];
        let hi = *self.log_knots.last().unwrap();
        log_k.clamp(lo, hi)
    }

    fn locate(&self, log_k: f64) -> usize {
        let n = self.log_knots.len();
        if log_k <= self.log_knots[0] {
            return 0;
        }
        if log_k >= self.log_knots[n - 1] {
            return n - 2;
        }
        match self
            .log_knots
            .binary_search_by(|v| v.partial_cmp(&log_k).unwrap())
        {
            Ok(i) => i.min(n - 2),
            Err(i) => i - 1,
        }
    }

    fn eval(&self, log_k: f64) -> f64 {
        let x = self.clip_log_k(log_k);
        let i = self.locate(x);
        let (x0, x1) = (self.log_knots[i], self.log_knots[i + 1]);
        let h = x1 - x0;
        let (g0, g1) = (self.fitted[i], self.fitted[i + 1]);
        let (m0, m1) = (self.second_deriv[i], self.second_deriv[i + 1]);
        let a = x1 - x;
        let b = x - x0;
        m0 * a.powi(3) / (6.0 * h) + m1 * b.powi(3) / (6.0 * h) + (g0 / h - m0 * h / 6.0) * a
            + (g1 / h - m1 * h / 6.0) * b
    }

    fn eval_deriv1(&self, log_k: f64) -> f64 {
        let x = self.clip_log_k(log_k);
        let i = self.locate(x);
        let (x0, x1) = (self.log_knots[i], self.log_knots[i + 1]);
        let h = x1 - x0;
        let (g0, g1) = (self.fitted[i], self.fitted[i + 1]);
        let (m0, m1) = (self.second_deriv[i], self.second_deriv[i + 1]);
        let a = x1 - x;
        let b = x - x0;
        -m0 * a.powi(2) / (2.0 * h) + m1 * b.powi(2) / (2.0 * h) - (g0 / h - m0 * h / 6.0)
            + (g1 / h - m1 * h / 6.0)
    }

    fn eval_deriv2(&self, log_k: f64) -> f64 {
        let x = self.clip_log_k(log_k);
        let i = self.locate(x);
        let (x0, x1) = (self.log_knots[i], self.log_knots[i + 1]);
        let h = x1 - x0;
        let (m0, m1) = (self.second_deriv[i], self.second_deriv[i + 1]);
        m0 * (x1 - x) / h + m1 * (x - x0) / h
    }
}

pub struct CallPriceSmoother {
    pub smoothing_factor: Option<f64>,
    pub min_points: usize,
}

impl Default for CallPriceSmoother {
    fn default() -> Self {
        Self {
            smoothing_factor: None,
            min_points: 10,
        }
    }
}

impl CallPriceSmoother {
    pub fn new(smoothing_factor: Option<f64>, min_points: usize) -> Self {
        Self { smoothing_factor, min_points }
    }

    pub fn fit(&self, rows: &[&OtmRow], spot: f64) -> Result<SmoothingResult, RndError> {
        let mut points: Vec<(f64, f64)> = rows
            .iter()
            .filter(|r| r.strike > 0.0 && r.mid > 0.0)
            .map(|r| (r.strike, r.mid))
            .collect();
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let (strikes, prices) = collapse_duplicate_strikes(&points);

        if strikes.len() < self.min_points {
            let expiry = rows
                .first()
                .map(|r| r.expiry)
                .expect("fit is always called with at least one OTM row for its expiry");
            return Err(RndError::InsufficientData {
                expiry,
                got: strikes.len(),
                needed: self.min_points,
            });
        }

        let n = strikes.len();
        let log_strikes: Vec<f64> = strikes.iter().map(|k| k.ln()).collect();

        let s = match self.smoothing_factor {
            Some(s0) => s0 * n as f64,
            None => n as f64 * population_variance(&prices) * 0.01,
        };

        let (fitted, second_deriv, lambda) = fit_smoothing_spline(&log_strikes, &prices, s);

        Ok(SmoothingResult {
            strikes: strikes.clone(),
            prices,
            spot_price: spot,
            strike_min: strikes[0],
            strike_max: strikes[n - 1],
            log_knots: log_strikes,
            fitted,
            second_deriv,
            lambda,
        })
    }
}

fn collapse_duplicate_strikes(points: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    let mut strikes = Vec::new();
    let mut prices = Vec::new();
    for &(k, p) in points {
        if let Some(last) = strikes.last().copied() {
            if (last - k).abs() < 1e-9 {
                let idx = prices.len() - 1;
                prices[idx] = (prices[idx] + p) / 2.0;
                continue;
            }
        }
        strikes.push(k);
        prices.push(p);
    }
    (strikes, prices)
}

fn population_variance(v: &[f64]) -> f64 {
    let n = v.len() as f64;
    let mean = v.iter().sum::<f64>() / n;
    v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![lo];
    }
    let step = (hi - lo) / (n as f64 - 1.0);
    (0..n).map(|i| lo + step * i as f64).collect()
}

/// Natural cubic smoothing spline via the Reinsch formulation: solve for the
/// interior second derivatives `gamma` from `(R + lambda * Q^T Q) gamma = Q^T y`,
/// then recover fitted values `g_hat = y - lambda * Q * gamma`. `lambda` is
/// found by bisection so that `sum((y - g_hat)^2) ~= target_s`: `lambda = 0`
/// interpolates exactly (residual 0), `lambda -> infinity` converges to the
/// ordinary least-squares line (residual at its maximum for this family).
fn fit_smoothing_spline(x: &[f64], y: &[f64], target_s: f64) -> (Vec<f64>, Vec<f64>, f64) {
    let n = x.len();
    if n < 4 || target_s <= 0.0 {
        // Not enough interior knots to penalize, or exact interpolation
        // requested: fall back to the interpolating natural spline (lambda=0).
        let gamma = vec![0.0; n.saturating_sub(2)];
        let fitted = y.to_vec();
        let second_deriv = natural_spline_second_derivatives(x, &fitted);
        return (fitted, second_deriv, 0.0);
    }

    let h: Vec<f64> = (0..n - 1).map(|i| x[i + 1] - x[i]).collect();
    let m = n - 2; // number of interior knots

    // R: (m x m) tridiagonal.
    let mut r = vec![vec![0.0; m]; m];
    for i in 0..m {
        r[i][i] = (h[i] + h[i + 1]) / 3.0;
        if i + 1 < m {
            r[i][i + 1] = h[i + 1] / 6.0;
            r[i + 1][i] = h[i + 1] / 6.0;
        }
    }

    // Q: (n x m), banded.
    let mut q = vec![vec![0.0; m]; n];
    for j in 0..m {
        q[j][j] = 1.0 / h[j];
        q[j + 1][j] = -1.0 / h[j] - 1.0 / h[j + 1];
        q[j + 2][j] = 1.0 / h[j + 1];
    }

    // Q^T Q: (m x m).
    let mut qtq = vec![vec![0.0; m]; m];
    for i in 0..m {
        for j in 0..m {
            let mut acc = 0.0;
            for row in 0..n {
                acc += q[row][i] * q[row][j];
            }
            qtq[i][j] = acc;
        }
    }

    // Q^T y: (m).
    let qty: Vec<f64> = (0..m)
        .map(|j| (0..n).map(|row| q[row][j] * y[row]).sum())
        .collect();

    let solve_for_lambda = |lambda: f64| -> (Vec<f64>, Vec<f64>, f64) {
        if lambda <= 0.0 {
            let gamma = vec![0.0; m];
            let fitted = y.to_vec();
            return (fitted, gamma, residual_sum(y, &fitted));
        }
        let mut a = vec![vec![0.0; m]; m];
        for i in 0..m {
            for j in 0..m {
                a[i][j] = r[i][j] + lambda * qtq[i][j];
            }
        }
        let gamma = gaussian_solve(a, qty.clone());
        // fitted = y - lambda * Q * gamma
        let mut fitted = y.to_vec();
        for row in 0..n {
            let mut acc = 0.0;
            for col in 0..m {
                acc += q[row][col] * gamma[col];
            }
            fitted[row] -= lambda * acc;
        }
        let rs = residual_sum(y, &fitted);
        (fitted, gamma, rs)
    };

    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    let (_, _, mut rs_hi) = solve_for_lambda(hi);
    let mut iterations = 0;
    while rs_hi < target_s && hi < 1e12 && iterations < 60 {
        hi *= 4.0;
        let (_, _, rs) = solve_for_lambda(hi);
        rs_hi = rs;
        iterations += 1;
    }

    let mut best_lambda = hi;
    for _ in 0..50 {
        let mid = 0.5 * (lo + hi);
        let (_, _, rs_mid) = solve_for_lambda(mid);
        if rs_mid < target_s {
            lo = mid;
        } else {
            hi = mid;
        }
        best_lambda = mid;
    }

    let (fitted, gamma, _) = solve_for_lambda(best_lambda);
    let mut full_second_deriv = vec![0.0; n];
    full_second_deriv[1..n - 1].copy_from_slice(&gamma);
    (fitted, full_second_deriv, best_lambda)
}

fn residual_sum(y: &[f64], fitted: &[f64]) -> f64 {
    y.iter().zip(fitted).map(|(a, b)| (a - b).powi(2)).sum()
}

/// Standard interpolating natural cubic spline (M_0 = M_{n-1} = 0), used only
/// as the `lambda = 0` limit of the smoothing spline above.
fn natural_spline_second_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }
    let h: Vec<f64> = (0..n - 1).map(|i| x[i + 1] - x[i]).collect();
    let interior = n - 2;
    let mut a = vec![vec![0.0; interior]; interior];
    let mut b = vec![0.0; interior];
    for i in 0..interior {
        a[i][i] = (h[i] + h[i + 1]) / 3.0;
        if i + 1 < interior {
            a[i][i + 1] = h[i + 1] / 6.0;
            a[i + 1][i] = h[i + 1] / 6.0;
        }
        b[i] = (y[i + 2] - y[i + 1]) / h[i + 1] - (y[i + 1] - y[i]) / h[i];
    }
    if interior > 0 {
        let gamma = gaussian_solve(a, b);
        m[1..n - 1].copy_from_slice(&gamma);
    }
    m
}

/// Gaussian elimination with partial pivoting. `a` is consumed; callers pass
/// small dense systems (tens of knots per expiry), so no banded solver is
/// warranted.
fn gaussian_solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    if n == 0 {
        return Vec::new();
    }
    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = a[col][col].abs();
        for row in (col + 1)..n {
            if a[row][col].abs() > pivot_val {
                pivot_val = a[row][col].abs();
                pivot_row = row;
            }
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let diag = a[col][col];
        if diag.abs() < 1e-15 {
            continue;
        }
        for row in (col + 1)..n {
            let factor = a[row][col] / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in (row + 1)..n {
            acc -= a[row][k] * x[k];
        }
        x[row] = if a[row][row].abs() < 1e-15 { 0.0 } else { acc / a[row][row] };
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rnd::chain::OtmSource;
    use chrono::NaiveDate;

    fn rows(strikes: &[f64], prices: &[f64]) -> Vec<OtmRow> {
        let expiry = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        strikes
            .iter()
            .zip(prices)
            .map(|(&k, &p)| OtmRow { expiry, strike: k, mid: p, source: OtmSource::Call })
            .collect()
    }

    #[test]
    fn fit_rejects_too_few_points() {
        let r = rows(&[90.0, 95.0, 100.0], &[12.0, 8.0, 5.0]);
        let refs: Vec<&OtmRow> = r.iter().collect();
        let smoother = CallPriceSmoother::default();
        let result = smoother.fit(&refs, 100.0);
        assert!(matches!(result, Err(RndError::InsufficientData { .. })));
    }

    #[test]
    fn fit_produces_monotone_decreasing_prices_on_clean_data() {
        // Roughly BS-call-shaped: decreasing, convex in strike.
        let strikes: Vec<f64> = (80..=140).step_by(4).map(|k| k as f64).collect();
        let spot = 100.0_f64;
        let prices: Vec<f64> = strikes.iter().map(|&k| (spot - k).max(0.5).max(0.0) + 2.0).collect();
        let r = rows(&strikes, &prices);
        let refs: Vec<&OtmRow> = r.iter().collect();
        let smoother = CallPriceSmoother::default();
        let result = smoother.fit(&refs, spot).unwrap();

        let grid = result.get_strike_grid(50);
        let values: Vec<f64> = grid.iter().map(|&k| result.call_price(k)).collect();
        let mut violations = 0;
        for w in values.windows(2) {
            if w[1] > w[0] + 1e-6 {
                violations += 1;
            }
        }
        assert!((violations as f64) / (values.len() as f64) < 0.10);
    }

    #[test]
    fn call_price_is_clipped_non_negative_and_flat_outside_bounds() {
        let strikes: Vec<f64> = (80..=140).step_by(4).map(|k| k as f64).collect();
        let prices: Vec<f64> = strikes.iter().map(|&k| (100.0_f64 - k).max(0.0) + 1.0).collect();
        let r = rows(&strikes, &prices);
        let refs: Vec<&OtmRow> = r.iter().collect();
        let smoother = CallPriceSmoother::default();
        let result = smoother.fit(&refs, 100.0).unwrap();

        let far_below = result.call_price(1.0);
        let at_min = result.call_price(result.strike_min);
        assert!((far_below - at_min).abs() < 1e-9);
        assert!(result.call_price(10_000.0) >= 0.0);
    }

    #[test]
    fn gaussian_solve_handles_identity() {
        let a = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let b = vec![3.0, 4.0];
        let x = gaussian_solve(a, b);
        assert!((x[0] - 3.0).abs() < 1e-12);
        assert!((x[1] - 4.0).abs() < 1e-12);
    }
}

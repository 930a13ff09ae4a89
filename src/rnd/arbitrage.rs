// Non-fatal arbitrage audit: call prices must be non-increasing and convex
// in strike. Violations are reported as a warning, never as a pipeline
// failure -- see spec.md's ARBITRAGE_VIOLATION taxonomy entry.
//
// Ported from `processing/arbitrage_checks.py`.

use crate::rnd::kernel::central_diff_2;

#[derive(Debug, Clone, Copy)]
pub struct ArbitrageChecker {
    pub monotonicity_tol: f64,
    pub convexity_tol: f64,
}

impl Default for ArbitrageChecker {
    fn default() -> Self {
        Self {
            monotonicity_tol: 1e-6,
            convexity_tol: -1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArbitrageReport {
    pub is_valid: bool,
    pub num_violations: usize,
    pub monotonicity_ok: bool,
    pub convexity_ok: bool,
}

impl ArbitrageChecker {
    pub fn new(monotonicity_tol: f64, convexity_tol: f64) -> Self {
        Self { monotonicity_tol, convexity_tol }
    }

    /// `strikes` must be sorted ascending and uniformly spaced (the grid the
    /// RND extractor evaluates `C` on); `prices` is `C` sampled on that grid.
    pub fn check(&self, prices: &[f64], strikes: &[f64]) -> ArbitrageReport {
        if prices.len() < 3 {
            return ArbitrageReport {
                is_valid: true,
                num_violations: 0,
                monotonicity_ok: true,
                convexity_ok: true,
            };
        }

        let mono_violations = prices
            .windows(2)
            .zip(strikes.windows(2))
            .filter(|(p, k)| (p[1] - p[0]) / (k[1] - k[0]) > self.monotonicity_tol)
            .count();
        let monotonicity_ok = mono_violations == 0;

        let dk = strikes[1] - strikes[0];
        let second_deriv = central_diff_2(prices, dk);
        let conv_violations = second_deriv[1..second_deriv.len() - 1]
            .iter()
            .filter(|&&d| d < self.convexity_tol)
            .count();
        let convexity_ok = conv_violations == 0;

        ArbitrageReport {
            is_valid: monotonicity_ok && convexity_ok,
            num_violations: mono_violations + conv_violations,
            monotonicity_ok,
            convexity_ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotone_convex_prices_pass_clean() {
        let strikes: Vec<f64> = (0..50).map(|i| 80.0 + i as f64).collect();
        let prices: Vec<f64> = strikes.iter().map(|&k| ((-(k - 80.0) / 10.0).exp())).collect();
        let checker = ArbitrageChecker::default();
        let report = checker.check(&prices, &strikes);
        assert!(report.is_valid);
        assert_eq!(report.num_violations, 0);
    }

    #[test]
    fn increasing_segment_flags_monotonicity_violation() {
        let strikes: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut prices: Vec<f64> = strikes.iter().map(|&k| 10.0 - k).collect();
        prices[5] += 5.0; // artificial upward blip
        let checker = ArbitrageChecker::default();
        let report = checker.check(&prices, &strikes);
        assert!(!report.monotonicity_ok);
        assert!(!report.is_valid);
    }

    #[test]
    fn concave_bump_flags_convexity_violation() {
        let strikes: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let prices: Vec<f64> = strikes
            .iter()
            .map(|&k| 20.0 - k - 2.0 * (-(k - 10.0).powi(2) / 8.0).exp())
            .collect();
        let checker = ArbitrageChecker::default();
        let report = checker.check(&prices, &strikes);
        assert!(!report.convexity_ok);
    }

    #[test]
    fn short_grid_is_trivially_valid() {
        let checker = ArbitrageChecker::default();
        let report = checker.check(&[5.0, 4.0], &[1.0, 2.0]);
        assert!(report.is_valid);
    }
}

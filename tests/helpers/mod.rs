// Shared fixtures for the integration tests: a hand-rolled Black-Scholes call
// price (independent of `models::bs_mod`, so these tests check the crate
// against an outside ground truth) and density-sanity assertions reused
// across scenarios.

use es_rnd::rnd::kernel::trapezoid;

pub fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

pub fn bs_call(spot: f64, strike: f64, t: f64, r: f64, sigma: f64) -> f64 {
    let d1 = ((spot / strike).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt());
    let d2 = d1 - sigma * t.sqrt();
    spot * norm_cdf(d1) - strike * (-r * t).exp() * norm_cdf(d2)
}

/// Analytic lognormal RND at strike `k`, for comparison against extracted
/// densities on a pure Black-Scholes chain.
pub fn lognormal_density(k: f64, spot: f64, t: f64, r: f64, sigma: f64) -> f64 {
    let mu = spot.ln() + (r - 0.5 * sigma * sigma) * t;
    let var = sigma * sigma * t;
    let z = (k.ln() - mu).powi(2) / (2.0 * var);
    (-z).exp() / (k * (2.0 * std::f64::consts::PI * var).sqrt())
}

pub fn assert_is_density(density: &[f64], strikes: &[f64]) {
    assert_eq!(density.len(), strikes.len());
    assert!(density.iter().all(|d| d.is_finite() && *d >= 0.0), "density must be finite and non-negative");
    let integral = trapezoid(density, strikes);
    assert!((integral - 1.0).abs() < 0.05, "density should integrate near 1.0, got {integral}");
}

pub const EPSILON: f64 = 1e-6;

#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {
        let diff = ($left - $right).abs();
        assert!(
            diff < $epsilon,
            "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}`,\n epsilon: `{:?}`",
            $left, $right, diff, $epsilon
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bs_call_matches_intrinsic_deep_in_the_money_at_small_t() {
        let price = bs_call(150.0, 50.0, 0.01, 0.0, 0.01);
        assert!((price - 100.0).abs() < 1.0);
    }
}

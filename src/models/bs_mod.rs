// Black-Scholes-Merton call pricer. Pure Rust, zero external crates.
// Internal to the crate: the only caller is `rnd::data_source::SyntheticClient`,
// which needs a closed-form pricer to generate arbitrage-free chains for
// tests and demos. Greeks/IV are a named Non-goal, so only the price is
// computed, not the full Greeks set the teacher's version carries.

const FRAC_1_SQRT_2PI: f64 = 0.39894228040143267793994605993439; // 1 / √(2π)

fn norm_pdf(x: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * x * x).exp()
}

pub fn norm_cdf_abst(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }

    if x.is_infinite() {
        return if x.is_sign_positive() { 1.0 } else { 0.0 };
    }

    if x >= 0.0 {
        let t = 1.0 / (1.0 + 0.2316419 * x);
        let poly = t * (0.319381530 + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));
        let pdf_part = norm_pdf(x);
        1.0 - pdf_part * poly * t
    } else {
        1.0 - norm_cdf_abst(-x)
    }
}

/// Black-Scholes-Merton European call price.
/// `q` = continuous dividend yield (0.0 = vanilla Black-Scholes).
pub fn black_scholes_merton_call(s: f64, k: f64, t: f64, r: f64, sigma: f64, q: f64) -> f64 {
    if t <= 0.0 {
        return s.max(k) - k;
    }

    let sqrt_t = t.sqrt();
    let d1 = ((s / k).ln() + (r - q + 0.5 * sigma * sigma) * t) / (sigma * sqrt_t);
    let d2 = d1 - sigma * sqrt_t;

    let e_qt = (-q * t).exp();
    let e_rt = (-r * t).exp();

    s * e_qt * norm_cdf_abst(d1) - k * e_rt * norm_cdf_abst(d2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atm_call_price_is_positive_and_less_than_spot() {
        let price = black_scholes_merton_call(100.0, 100.0, 1.0, 0.05, 0.2, 0.0);
        assert!(price > 0.0 && price < 100.0);
    }

    #[test]
    fn expired_option_prices_at_intrinsic() {
        let price = black_scholes_merton_call(110.0, 100.0, 0.0, 0.05, 0.2, 0.0);
        assert!((price - 10.0).abs() < 1e-9);
    }
}

// Numerical kernel: trapezoidal integration, normalization, moments,
// quantile inversion, and the second-difference operator shared by the
// arbitrage checker and the RND extractor's finite-difference fallback.
//
// Pure Rust, zero external crates — mirrors `utils/math_utils.py` from the
// source project, translated operation for operation.

const DENSITY_FLOOR: f64 = 1e-10;

/// Composite trapezoidal rule over possibly non-uniform `x`.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    debug_assert_eq!(y.len(), x.len());
    if y.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 1..x.len() {
        total += 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]);
    }
    total
}

/// Clip `f <- max(f, eps)`, divide by `trapezoid(f, x)`. If the integral is
/// non-positive, fall back to the uniform density `1/(x_N - x_1)`.
pub fn normalize_density(f: &[f64], x: &[f64]) -> Vec<f64> {
    let clipped: Vec<f64> = f.iter().map(|&v| v.max(DENSITY_FLOOR)).collect();
    let integral = trapezoid(&clipped, x);
    if integral > 0.0 {
        clipped.iter().map(|&v| v / integral).collect()
    } else {
        let span = x.last().unwrap() - x.first().unwrap();
        let uniform = 1.0 / span;
        vec![uniform; f.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub std: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

/// `mu = int(x*f)`, `sigma^2 = int((x-mu)^2*f)`, skew/kurt normalized by
/// sigma^3 / sigma^4. Skew and excess kurtosis default to 0 when sigma = 0.
pub fn moments(f: &[f64], x: &[f64]) -> Moments {
    let xf: Vec<f64> = x.iter().zip(f).map(|(&xi, &fi)| xi * fi).collect();
    let mean = trapezoid(&xf, x);

    let var_integrand: Vec<f64> = x.iter().zip(f).map(|(&xi, &fi)| (xi - mean).powi(2) * fi).collect();
    let variance = trapezoid(&var_integrand, x).max(0.0);
    let std = variance.sqrt();

    if std > 0.0 {
        let skew_integrand: Vec<f64> = x.iter().zip(f).map(|(&xi, &fi)| (xi - mean).powi(3) * fi).collect();
        let kurt_integrand: Vec<f64> = x.iter().zip(f).map(|(&xi, &fi)| (xi - mean).powi(4) * fi).collect();
        let skewness = trapezoid(&skew_integrand, x) / std.powi(3);
        let kurtosis = trapezoid(&kurt_integrand, x) / std.powi(4) - 3.0;
        Moments { mean, std, skewness, kurtosis }
    } else {
        Moments { mean, std, skewness: 0.0, kurtosis: 0.0 }
    }
}

/// Form `CDF_i = sum_{j<=i} f_j * dx` (uniform `dx` assumed), rescale so
/// `CDF_N = 1`, then linearly invert at each requested `q`.
pub fn quantiles(f: &[f64], x: &[f64], qs: &[f64]) -> Vec<f64> {
    debug_assert!(x.len() >= 2);
    let dx = x[1] - x[0];
    let mut cdf = vec![0.0; f.len()];
    let mut running = 0.0;
    for (i, &fi) in f.iter().enumerate() {
        running += fi * dx;
        cdf[i] = running;
    }
    let last = *cdf.last().unwrap();
    if last > 0.0 {
        for v in cdf.iter_mut() {
            *v /= last;
        }
    }
    qs.iter().map(|&q| interp(q, &cdf, x)).collect()
}

/// `np.interp`-equivalent: linear interpolation of `xp -> fp`, clamped at
/// the boundaries, assuming `xp` is sorted ascending.
fn interp(q: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if q <= xp[0] {
        return fp[0];
    }
    if q >= *xp.last().unwrap() {
        return *fp.last().unwrap();
    }
    let idx = match xp.binary_search_by(|v| v.partial_cmp(&q).unwrap()) {
        Ok(i) => return fp[i],
        Err(i) => i,
    };
    let (x0, x1) = (xp[idx - 1], xp[idx]);
    let (y0, y1) = (fp[idx - 1], fp[idx]);
    let w = (q - x0) / (x1 - x0);
    y0 + w * (y1 - y0)
}

/// Interior cells use the standard central second difference; the first and
/// last cells copy the nearest interior stencil rather than a one-sided
/// difference, which preserves smoothness at the edges.
pub fn central_diff_2(v: &[f64], h: f64) -> Vec<f64> {
    let n = v.len();
    let mut out = vec![0.0; n];
    if n < 3 {
        return out;
    }
    for i in 1..n - 1 {
        out[i] = (v[i + 1] - 2.0 * v[i] + v[i - 1]) / (h * h);
    }
    out[0] = out[1];
    out[n - 1] = out[n - 2];
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn trapezoid_of_constant_is_rectangle_area() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = vec![2.0; 4];
        assert_relative_eq!(trapezoid(&y, &x), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn normalize_density_integrates_to_one() {
        let x: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let f: Vec<f64> = x.iter().map(|&xi| (-0.5 * (xi - 5.0).powi(2)).exp()).collect();
        let n = normalize_density(&f, &x);
        assert_relative_eq!(trapezoid(&n, &x), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn normalize_density_falls_back_to_uniform_when_integral_nonpositive() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let f = vec![0.0, 0.0, 0.0, 0.0];
        let n = normalize_density(&f, &x);
        for v in n {
            assert_relative_eq!(v, 1.0 / 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn moments_of_standard_normal_grid() {
        let x: Vec<f64> = (-400..=400).map(|i| i as f64 * 0.02).collect();
        let f: Vec<f64> = x
            .iter()
            .map(|&xi| (1.0 / (2.0 * std::f64::consts::PI).sqrt()) * (-0.5 * xi * xi).exp())
            .collect();
        let f = normalize_density(&f, &x);
        let m = moments(&f, &x);
        assert_relative_eq!(m.mean, 0.0, epsilon = 1e-3);
        assert_relative_eq!(m.std, 1.0, epsilon = 2e-2);
    }

    #[test]
    fn quantile_inversion_round_trips() {
        let x: Vec<f64> = (0..500).map(|i| i as f64 * 0.02).collect();
        let f = vec![1.0 / (x.last().unwrap() - x[0]); x.len()];
        let target = 0.5;
        let qs = quantiles(&f, &x, &[target]);
        assert!((qs[0] - 5.0).abs() < 0.1);
    }

    #[test]
    fn central_diff_2_of_quadratic_is_constant() {
        let h = 0.1;
        let x: Vec<f64> = (0..50).map(|i| i as f64 * h).collect();
        let v: Vec<f64> = x.iter().map(|&xi| xi * xi).collect();
        let d2 = central_diff_2(&v, h);
        for &d in &d2[1..d2.len() - 1] {
            assert_relative_eq!(d, 2.0, epsilon = 1e-6);
        }
        assert_relative_eq!(d2[0], d2[1], epsilon = 1e-12);
        assert_relative_eq!(d2[d2.len() - 1], d2[d2.len() - 2], epsilon = 1e-12);
    }
}

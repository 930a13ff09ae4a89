// Strike x DTE surface assembly: a common strike grid, piecewise-linear
// interpolation across expiries, separable 2D Gaussian smoothing, and
// per-column quantile bands.
//
// Ported from `viz/rnd_surface_plotter.py`'s numerical core -- the plotting
// itself (matplotlib figures) is out of scope; this module produces the
// dense grids a caller would hand to any renderer.

use crate::rnd::extractor::RndResult;
use crate::rnd::kernel::quantiles as compute_quantiles;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// 200 strikes within [0.7*spot, 1.3*spot], 100 uniform DTEs.
    ThreeD,
    /// 200 strikes within [0.75*spot, 1.25*spot], one column per integer day.
    Heatmap,
}

#[derive(Debug, Clone)]
pub struct RndSurface {
    pub strike_grid: Vec<f64>,
    pub day_grid: Vec<f64>,
    /// `density[day_idx][strike_idx]`.
    pub density: Vec<Vec<f64>>,
    pub spot: f64,
    /// `day_idx -> (q05, q25, q50, q75, q95)`.
    pub quantile_bands: Vec<(f64, f64, f64, f64, f64)>,
}

impl RndSurface {
    pub fn build(results: &[RndResult], kind: SurfaceKind, sigma: f64) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let spot = results[0].spot_price;

        let all_min = results.iter().flat_map(|r| r.strikes.iter().copied()).fold(f64::INFINITY, f64::min);
        let all_max = results.iter().flat_map(|r| r.strikes.iter().copied()).fold(f64::NEG_INFINITY, f64::max);

        let (strike_lo_frac, strike_hi_frac) = match kind {
            SurfaceKind::ThreeD => (0.7, 1.3),
            SurfaceKind::Heatmap => (0.75, 1.25),
        };
        let strike_min = (spot * strike_lo_frac).max(all_min);
        let strike_max = (spot * strike_hi_frac).min(all_max);
        let strike_grid = linspace(strike_min, strike_max, 200);

        let mut dtes: Vec<i64> = results.iter().map(|r| (r.time_to_expiry * 365.0).round() as i64).collect();
        dtes.sort_unstable();
        dtes.dedup();

        let day_grid: Vec<f64> = match kind {
            SurfaceKind::ThreeD => {
                let lo = *dtes.first().unwrap() as f64;
                let hi = *dtes.last().unwrap() as f64;
                linspace(lo, hi, 100)
            }
            SurfaceKind::Heatmap => {
                let max_dte = *dtes.last().unwrap();
                (0..=max_dte).map(|d| d as f64).collect()
            }
        };

        let mut density = Vec::with_capacity(day_grid.len());
        for &d in &day_grid {
            density.push(interpolate_column(results, &dtes, d, &strike_grid));
        }

        gaussian_smooth_2d(&mut density, sigma);

        let quantile_bands = density
            .iter()
            .map(|col| {
                let integral = crate::rnd::kernel::trapezoid(col, &strike_grid);
                let normalized: Vec<f64> = if integral > 0.0 {
                    col.iter().map(|&v| v / integral).collect()
                } else {
                    col.clone()
                };
                let qs = compute_quantiles(&normalized, &strike_grid, &[0.05, 0.25, 0.50, 0.75, 0.95]);
                (qs[0], qs[1], qs[2], qs[3], qs[4])
            })
            .collect();

        Some(Self { strike_grid, day_grid, density, spot, quantile_bands })
    }
}

/// Density on `strike_grid` at target DTE `d`, per spec.md §4.7's
/// interpolation rule: copy the nearest expiry outside `[min(D), max(D)]`,
/// linearly blend between bracketing expiries inside it.
fn interpolate_column(results: &[RndResult], sorted_dtes: &[i64], d: f64, strike_grid: &[f64]) -> Vec<f64> {
    let lo_dte = *sorted_dtes.first().unwrap();
    let hi_dte = *sorted_dtes.last().unwrap();

    let density_for_dte = |dte: i64| -> Vec<f64> {
        let r = results
            .iter()
            .find(|r| (r.time_to_expiry * 365.0).round() as i64 == dte)
            .expect("dte drawn from sorted_dtes always has a matching result");
        interp_to_grid(strike_grid, &r.strikes, &r.density)
    };

    if d <= lo_dte as f64 {
        return density_for_dte(lo_dte);
    }
    if d >= hi_dte as f64 {
        return density_for_dte(hi_dte);
    }

    let lower = sorted_dtes.iter().copied().filter(|&dte| dte as f64 <= d).max().unwrap();
    let upper = sorted_dtes.iter().copied().filter(|&dte| dte as f64 >= d).min().unwrap();
    if lower == upper {
        return density_for_dte(lower);
    }

    let weight = (d - lower as f64) / (upper as f64 - lower as f64);
    let z_low = density_for_dte(lower);
    let z_high = density_for_dte(upper);
    z_low.iter().zip(&z_high).map(|(&a, &b)| (1.0 - weight) * a + weight * b).collect()
}

fn interp_to_grid(target: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    target
        .iter()
        .map(|&x| {
            if x <= xp[0] {
                return fp[0];
            }
            if x >= *xp.last().unwrap() {
                return *fp.last().unwrap();
            }
            let idx = match xp.binary_search_by(|v| v.partial_cmp(&x).unwrap()) {
                Ok(i) => return fp[i],
                Err(i) => i,
            };
            let (x0, x1) = (xp[idx - 1], xp[idx]);
            let (y0, y1) = (fp[idx - 1], fp[idx]);
            y0 + (x - x0) / (x1 - x0) * (y1 - y0)
        })
        .collect()
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![lo];
    }
    let step = (hi - lo) / (n as f64 - 1.0);
    (0..n).map(|i| lo + step * i as f64).collect()
}

/// Separable Gaussian blur (row pass, then column pass) over a dense
/// `[day][strike]` matrix; kernel truncated at +/-3 sigma.
fn gaussian_smooth_2d(grid: &mut [Vec<f64>], sigma: f64) {
    if sigma <= 0.0 || grid.is_empty() {
        return;
    }
    let kernel = gaussian_kernel(sigma);

    for row in grid.iter_mut() {
        *row = convolve_1d(row, &kernel);
    }

    let ncols = grid[0].len();
    let nrows = grid.len();
    for col in 0..ncols {
        let column: Vec<f64> = (0..nrows).map(|row| grid[row][col]).collect();
        let smoothed = convolve_1d(&column, &kernel);
        for row in 0..nrows {
            grid[row][col] = smoothed[row];
        }
    }
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil() as i64;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }
    kernel
}

/// Edge-replicated ("nearest") boundary convolution, matching
/// `scipy.ndimage.gaussian_filter`'s default `mode='reflect'` closely enough
/// for visual-grade smoothing at the grid edges.
fn convolve_1d(v: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = v.len();
    let radius = (kernel.len() / 2) as i64;
    (0..n)
        .map(|i| {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let offset = k as i64 - radius;
                let mut idx = i as i64 + offset;
                idx = idx.clamp(0, n as i64 - 1);
                acc += w * v[idx as usize];
            }
            acc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rnd::kernel::Moments;
    use chrono::NaiveDate;

    fn fake_result(expiry_days: i64, spot: f64) -> RndResult {
        let strikes: Vec<f64> = (0..100).map(|i| spot * 0.5 + i as f64 * (spot / 100.0)).collect();
        let density: Vec<f64> = strikes
            .iter()
            .map(|&k| (-(k - spot).powi(2) / (2.0 * 100.0)).exp())
            .collect();
        let integral = crate::rnd::kernel::trapezoid(&density, &strikes);
        let density: Vec<f64> = density.iter().map(|&d| d / integral).collect();
        RndResult {
            strikes,
            density,
            expiry: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Duration::days(expiry_days),
            time_to_expiry: expiry_days as f64 / 365.0,
            spot_price: spot,
            moments: Moments { mean: spot, std: 10.0, skewness: 0.0, kurtosis: 0.0 },
            data_quality: None,
        }
    }

    #[test]
    fn build_produces_monotone_day_grid_and_matching_density_shape() {
        let results = vec![fake_result(30, 100.0), fake_result(60, 100.0), fake_result(120, 100.0)];
        let surface = RndSurface::build(&results, SurfaceKind::ThreeD, 2.0).unwrap();
        assert_eq!(surface.day_grid.len(), 100);
        assert_eq!(surface.strike_grid.len(), 200);
        assert_eq!(surface.density.len(), surface.day_grid.len());
        for row in &surface.density {
            assert_eq!(row.len(), surface.strike_grid.len());
        }
        for w in surface.day_grid.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn median_quantile_is_monotone_non_decreasing_when_means_increase_in_t() {
        let mut results = vec![fake_result(30, 100.0), fake_result(60, 105.0), fake_result(120, 112.0)];
        for r in results.iter_mut() {
            let shift = r.spot_price - 100.0;
            r.strikes = r.strikes.iter().map(|&k| k + shift).collect();
        }
        let surface = RndSurface::build(&results, SurfaceKind::ThreeD, 1.0).unwrap();
        let medians: Vec<f64> = surface.quantile_bands.iter().map(|b| b.2).collect();
        for w in medians.windows(2) {
            assert!(w[1] >= w[0] - 1e-6);
        }
    }

    #[test]
    fn empty_results_yields_no_surface() {
        assert!(RndSurface::build(&[], SurfaceKind::Heatmap, 1.5).is_none());
    }
}

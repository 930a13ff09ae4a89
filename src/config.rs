// Configuration surface: every key from spec.md §6, loadable from a JSON
// file (mirroring the teacher's `StocksConfig::load_from_file`) and
// overridable by environment variables (mirroring the source project's
// `ConfigLoader.require_env`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::rnd::pipeline::PipelineConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RndSettings {
    pub r: f64,
    pub min_dte: i64,
    pub max_dte: i64,
    pub min_volume: u64,
    pub min_oi: u64,
    pub max_spread_pct: f64,
    pub smoothing_factor: Option<f64>,
    pub num_points: usize,
    pub monotonicity_tol: f64,
    pub convexity_tol: f64,
    pub min_points: usize,
    pub parallel: bool,
}

impl Default for RndSettings {
    fn default() -> Self {
        let d = PipelineConfig::default();
        Self {
            r: d.r,
            min_dte: d.min_dte,
            max_dte: d.max_dte,
            min_volume: d.min_volume,
            min_oi: d.min_oi,
            max_spread_pct: d.max_spread_pct,
            smoothing_factor: d.smoothing_factor,
            num_points: d.num_points,
            monotonicity_tol: d.monotonicity_tol,
            convexity_tol: d.convexity_tol,
            min_points: d.min_points,
            parallel: d.parallel,
        }
    }
}

impl From<RndSettings> for PipelineConfig {
    fn from(s: RndSettings) -> Self {
        PipelineConfig {
            r: s.r,
            min_dte: s.min_dte,
            max_dte: s.max_dte,
            min_volume: s.min_volume,
            min_oi: s.min_oi,
            max_spread_pct: s.max_spread_pct,
            smoothing_factor: s.smoothing_factor,
            num_points: s.num_points,
            monotonicity_tol: s.monotonicity_tol,
            convexity_tol: s.convexity_tol,
            min_points: s.min_points,
            parallel: s.parallel,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    pub market: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
    #[serde(default)]
    pub rnd: RndSettings,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn enabled_symbols(&self) -> Vec<String> {
        self.symbols.iter().filter(|s| s.enabled).map(|s| s.symbol.clone()).collect()
    }

    pub fn symbols_by_market(&self, market: &str) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|s| s.enabled && s.market.as_deref() == Some(market))
            .map(|s| s.symbol.clone())
            .collect()
    }
}

/// Read a required environment variable, or a config error naming it.
pub fn require_env(key: &str) -> Result<String, crate::rnd::error::RndError> {
    std::env::var(key).map_err(|_| crate::rnd::error::RndError::Config(format!("required env var '{key}' not set")))
}

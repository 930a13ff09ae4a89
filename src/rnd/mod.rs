//! Risk-neutral density extraction core.
//!
//! Pipeline stages, leaves first: [`kernel`] (numerical primitives),
//! [`chain`] (data model), [`cleaner`] (quote filtering + OTM synthesis),
//! [`smoother`] (log-strike smoothing spline), [`arbitrage`] (monotonicity /
//! convexity audit), [`extractor`] (Breeden-Litzenberger), [`pipeline`]
//! (per-expiry orchestration), [`surface`] (strike x DTE assembly).

pub mod arbitrage;
pub mod chain;
pub mod cleaner;
pub mod data_source;
pub mod error;
pub mod extractor;
pub mod kernel;
pub mod pipeline;
pub mod smoother;
pub mod surface;

pub use arbitrage::{ArbitrageChecker, ArbitrageReport};
pub use chain::{Chain, OptionQuote, OtmChain, OtmRow, OtmSource, Right};
pub use cleaner::{ChainCleaner, CleanerConfig, DataQuality, QualityLabel};
pub use data_source::{CsvReplayClient, DataClient, HttpDataClient, SyntheticClient};
pub use error::RndError;
pub use extractor::{RndExtractor, RndResult};
pub use kernel::Moments;
pub use pipeline::{PipelineConfig, PipelineResult, RndPipeline};
pub use smoother::{CallPriceSmoother, SmoothingResult};
pub use surface::{RndSurface, SurfaceKind};

// Error taxonomy for the RND core.
// Per-expiry failures never propagate as an `Err` through the pipeline — they
// are caught and folded into `PipelineResult.errors` (see pipeline.rs). This
// type exists for the stage-level functions (smoother, extractor) that a
// caller can invoke directly outside of `RndPipeline::run`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RndError {
    #[error("empty option chain")]
    EmptyChain,

    #[error("insufficient data for {expiry}: need {needed} usable OTM rows, got {got}")]
    InsufficientData {
        expiry: NaiveDate,
        got: usize,
        needed: usize,
    },

    #[error("{expiry} has already expired relative to trade date")]
    Expired { expiry: NaiveDate },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

// Library exports for es-rnd: risk-neutral density extraction from options
// chains via Breeden-Litzenberger.

pub mod config;
pub mod drawdown;
pub(crate) mod models;
pub mod rnd;

// CLI entry point: run the RND pipeline for a symbol/trade-date, or build a
// multi-expiry surface, against a synthetic, CSV-replay, or live data client.

use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use es_rnd::config::AppConfig;
use es_rnd::rnd::{CsvReplayClient, DataClient, HttpDataClient, PipelineConfig, RndPipeline, RndSurface, SurfaceKind, SyntheticClient};

#[derive(Parser)]
#[command(name = "es-rnd", about = "Risk-neutral density extraction from options chains")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a JSON config file overriding pipeline defaults.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Data source: "synthetic", "csv:<dir>", or "http:<base_url>".
    #[arg(long, global = true, default_value = "synthetic")]
    source: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline for one symbol and trade date, printing a summary table.
    Run {
        symbol: String,
        /// Trade date, YYYY-MM-DD.
        trade_date: String,
        #[arg(long)]
        spot: Option<f64>,
    },
    /// Build a multi-expiry surface (3D grid or heatmap) and print its quantile bands.
    Surface {
        symbol: String,
        trade_date: String,
        #[arg(long, value_enum, default_value = "three-d")]
        kind: SurfaceKindArg,
        #[arg(long, default_value_t = 2.0)]
        sigma: f64,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum SurfaceKindArg {
    ThreeD,
    Heatmap,
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    let app_config = match &cli.config {
        Some(path) => match AppConfig::load_from_file(path) {
            Ok(c) => c,
            Err(e) => {
                error!(path, %e, "failed to load config file");
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };
    let pipeline_config: PipelineConfig = app_config.rnd.into();

    let client = match build_client(&cli.source) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "failed to build data client");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Run { symbol, trade_date, spot } => run_command(client.as_ref(), pipeline_config, &symbol, &trade_date, spot),
        Command::Surface { symbol, trade_date, kind, sigma } => {
            surface_command(client.as_ref(), pipeline_config, &symbol, &trade_date, kind, sigma)
        }
    }
}

fn build_client(source: &str) -> Result<Box<dyn DataClient>, String> {
    if source == "synthetic" {
        return Ok(Box::new(SyntheticClient::new(100.0, 0.20, 0.05, vec![30, 60, 90, 180])));
    }
    if let Some(dir) = source.strip_prefix("csv:") {
        return Ok(Box::new(CsvReplayClient::new(dir)));
    }
    if let Some(base_url) = source.strip_prefix("http:") {
        return HttpDataClient::new(base_url).map(|c| Box::new(c) as Box<dyn DataClient>).map_err(|e| e.to_string());
    }
    Err(format!("unrecognized --source '{source}' (expected synthetic, csv:<dir>, or http:<url>)"))
}

fn parse_trade_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|e| {
        error!(trade_date = s, %e, "invalid trade date, expected YYYY-MM-DD");
        std::process::exit(1);
    })
}

fn run_command(client: &dyn DataClient, config: PipelineConfig, symbol: &str, trade_date: &str, spot: Option<f64>) {
    let trade_date = parse_trade_date(trade_date);
    let pipeline = RndPipeline::new(config);

    let start = Instant::now();
    let result = pipeline.run(client, symbol, trade_date, spot);
    let elapsed = start.elapsed();

    info!(symbol, %trade_date, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "pipeline finished");

    if !result.success {
        println!("FAILED: {}", result.errors.join("; "));
        std::process::exit(1);
    }

    println!("{:<12} {:<8} {:<10} {:<10} {:<10} {:<8}", "Expiry", "DTE", "Mean", "Std", "Skew", "Quality");
    println!("{}", "-".repeat(66));
    for rnd in &result.rnd_results {
        let dte = (rnd.time_to_expiry * 365.0).round() as i64;
        let quality = rnd
            .data_quality
            .as_ref()
            .map(|q| format!("{:?}", q.quality_label()))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<12} {:<8} {:<10.2} {:<10.2} {:<10.3} {:<8}",
            rnd.expiry, dte, rnd.moments.mean, rnd.moments.std, rnd.moments.skewness, quality
        );
    }
    if !result.errors.is_empty() {
        println!("\nWarnings:");
        for e in &result.errors {
            println!("  - {e}");
        }
    }
}

fn surface_command(client: &dyn DataClient, config: PipelineConfig, symbol: &str, trade_date: &str, kind: SurfaceKindArg, sigma: f64) {
    let trade_date = parse_trade_date(trade_date);
    let pipeline = RndPipeline::new(config);
    let result = pipeline.run(client, symbol, trade_date, None);

    if !result.success {
        println!("FAILED: {}", result.errors.join("; "));
        std::process::exit(1);
    }

    let surface_kind = match kind {
        SurfaceKindArg::ThreeD => SurfaceKind::ThreeD,
        SurfaceKindArg::Heatmap => SurfaceKind::Heatmap,
    };
    let surface = match RndSurface::build(&result.rnd_results, surface_kind, sigma) {
        Some(s) => s,
        None => {
            println!("FAILED: no RND results to build a surface from");
            std::process::exit(1);
        }
    };

    println!("Spot: {:.2}", surface.spot);
    println!("{:<8} {:<8} {:<8} {:<8} {:<8} {:<8}", "Day", "Q05", "Q25", "Q50", "Q75", "Q95");
    for (day, band) in surface.day_grid.iter().zip(&surface.quantile_bands) {
        println!("{:<8.0} {:<8.2} {:<8.2} {:<8.2} {:<8.2} {:<8.2}", day, band.0, band.1, band.2, band.3, band.4);
    }
}

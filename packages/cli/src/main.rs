#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line interface for the risk radar engine.
//!
//! Runs one-off queries against the bundled sources and prints the JSON
//! response, lists the registered sources, or starts the API server.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use risk_radar_server_models::AlertQueryParams;

#[derive(Parser)]
#[command(name = "risk_radar", about = "Location-based risk alert aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query every eligible source around a point and print the merged
    /// result as JSON
    Query {
        /// Latitude of the query point
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude of the query point
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Search radius in meters
        #[arg(long)]
        radius: Option<f64>,
        /// Time window preset (e.g. "past-24h", "next-7d")
        #[arg(long, conflicts_with_all = ["start", "end"])]
        window: Option<String>,
        /// Explicit window start (RFC 3339)
        #[arg(long, requires = "end")]
        start: Option<DateTime<Utc>>,
        /// Explicit window end (RFC 3339)
        #[arg(long, requires = "start")]
        end: Option<DateTime<Utc>>,
        /// Minimum risk level (low, moderate, high, severe, extreme)
        #[arg(long)]
        min_risk: Option<String>,
        /// Comma-separated categories (e.g. "crime,fire")
        #[arg(long)]
        categories: Option<String>,
        /// Comma-separated temporal types (historical, scheduled, real-time)
        #[arg(long)]
        temporal_types: Option<String>,
        /// Maximum number of alerts
        #[arg(long)]
        limit: Option<usize>,
        /// Include per-source diagnostics
        #[arg(long)]
        diagnostics: bool,
        /// Comma-separated list of source IDs to enable (overrides `RISK_RADAR_SOURCES` env var)
        #[arg(long)]
        sources: Option<String>,
    },
    /// List all bundled data sources
    Sources,
    /// Start the HTTP API server
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            lat,
            lon,
            radius,
            window,
            start,
            end,
            min_risk,
            categories,
            temporal_types,
            limit,
            diagnostics,
            sources,
        } => {
            let query = AlertQueryParams {
                lat,
                lon,
                radius,
                window,
                start,
                end,
                min_risk,
                categories,
                temporal_types,
                limit,
                diagnostics,
            }
            .into_query()?;

            let config = risk_radar_server::load_config()?;
            let filter = risk_radar_server::source_filter(sources);
            let engine = risk_radar_server::build_engine(config, filter.as_deref()).await;

            let result = engine.query(&query).await;
            engine.shutdown().await;

            println!("{}", serde_json::to_string_pretty(&result?)?);
        }
        Commands::Sources => {
            let engine = risk_radar_server::build_engine(
                risk_radar_engine::config::EngineConfig::default(),
                risk_radar_server::source_filter(None).as_deref(),
            )
            .await;

            println!("{:<20} {:<8} {:<14} NAME", "ID", "ENABLED", "TYPE");
            println!("{}", "-".repeat(70));
            for source in engine.registry().descriptors().await {
                println!(
                    "{:<20} {:<8} {:<14} {}",
                    source.descriptor.id,
                    source.enabled,
                    source.descriptor.source_type,
                    source.descriptor.name
                );
            }
            engine.shutdown().await;
        }
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(risk_radar_server::run_server())
            })
            .await??;
        }
    }

    log::debug!("Done");
    Ok(())
}

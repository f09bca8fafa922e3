#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the risk radar engine.
//!
//! Registers the bundled sources, builds an [`AlertEngine`], and serves
//! `/api/health`, `/api/sources` and `/api/alerts`.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use risk_radar_engine::AlertEngine;
use risk_radar_engine::config::EngineConfig;
use risk_radar_source::cache::{Cache, MemoryCache};
use risk_radar_source::catalog::builtin_sources;
use risk_radar_source::registry::SourceRegistry;

/// Environment variable naming an optional engine config TOML file.
pub const CONFIG_PATH_ENV: &str = "RISK_RADAR_CONFIG";

/// Environment variable holding a comma-separated allow-list of source ids.
pub const SOURCES_ENV: &str = "RISK_RADAR_SOURCES";

/// Shared application state.
pub struct AppState {
    /// The query engine.
    pub engine: Arc<AlertEngine>,
}

/// Errors that can occur while assembling the engine.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`EngineConfig`].
    #[error("Invalid config file: {0}")]
    Config(#[from] toml::de::Error),
}

/// Loads the engine config from [`CONFIG_PATH_ENV`] (if set), then applies
/// `RISK_RADAR_*` environment overrides.
///
/// # Errors
///
/// Returns [`BootstrapError`] if the config file is unreadable or invalid.
pub fn load_config() -> Result<EngineConfig, BootstrapError> {
    let base = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => {
            log::info!("Loading engine config from {path}");
            EngineConfig::from_toml_str(&std::fs::read_to_string(&path)?)?
        }
        Err(_) => EngineConfig::default(),
    };
    Ok(base.with_env_overrides())
}

/// Parses a comma-separated allow-list, falling back to [`SOURCES_ENV`].
/// `None` means every source is enabled.
#[must_use]
pub fn source_filter(cli_filter: Option<String>) -> Option<Vec<String>> {
    let raw = cli_filter.or_else(|| std::env::var(SOURCES_ENV).ok())?;
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!ids.is_empty()).then_some(ids)
}

/// Registers every bundled source and wraps the registry in an engine.
///
/// Sources outside `filter` are registered disabled. A source that fails
/// to initialize is logged and left out.
pub async fn build_engine(config: EngineConfig, filter: Option<&[String]>) -> AlertEngine {
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let registry = Arc::new(SourceRegistry::new());

    for source in builtin_sources(Some(cache)) {
        let id = source.id().to_string();
        let enabled = filter.is_none_or(|ids| ids.contains(&id));
        if let Err(e) = registry.register(source, None, enabled).await {
            log::error!("Failed to register source {id}: {e}");
        }
    }

    if let Some(ids) = filter {
        let known = registry.descriptors().await;
        for id in ids {
            if !known.iter().any(|s| &s.descriptor.id == id) {
                log::warn!(
                    "Unknown source {id:?} in filter. Available: {}",
                    known
                        .iter()
                        .map(|s| s.descriptor.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
    }

    AlertEngine::new(registry, config)
}

/// Mounts the `/api` routes.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/sources", web::get().to(handlers::sources))
            .route("/alerts", web::get().to(handlers::alerts)),
    );
}

/// Starts the risk radar API server.
///
/// Reads `BIND_ADDR` (default `127.0.0.1`) and `PORT` (default 8080). The
/// caller is responsible for providing the async runtime (e.g. via
/// `#[actix_web::main]`) and for initializing logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the config cannot be loaded, the
/// HTTP server fails to bind, or it encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let config = load_config().map_err(std::io::Error::other)?;
    let filter = source_filter(None);
    let engine = Arc::new(build_engine(config, filter.as_deref()).await);

    let state = web::Data::new(AppState {
        engine: Arc::clone(&engine),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure_api)
    })
    .bind((bind_addr, port))?
    .run()
    .await;

    engine.shutdown().await;
    result
}

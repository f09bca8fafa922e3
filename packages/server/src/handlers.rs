//! HTTP handler functions for the risk radar API.

use actix_web::{HttpResponse, web};
use risk_radar_engine::EngineError;
use risk_radar_server_models::{AlertQueryParams, ApiHealth, ApiSource};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/sources`
///
/// Lists every registered source with its descriptor and state.
pub async fn sources(state: web::Data<AppState>) -> HttpResponse {
    let sources: Vec<ApiSource> = state
        .engine
        .registry()
        .descriptors()
        .await
        .into_iter()
        .map(|s| ApiSource {
            descriptor: s.descriptor,
            enabled: s.enabled,
            initialized: s.initialized,
        })
        .collect();

    HttpResponse::Ok().json(sources)
}

/// `GET /api/alerts`
///
/// Runs a query against every eligible source and returns the merged
/// result.
pub async fn alerts(
    state: web::Data<AppState>,
    params: web::Query<AlertQueryParams>,
) -> HttpResponse {
    let query = match params.into_inner().into_query() {
        Ok(query) => query,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": e.to_string()
            }));
        }
    };

    match state.engine.query(&query).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(EngineError::TimeWindow(e)) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": e.to_string()
        })),
        Err(e @ EngineError::Source { .. }) => {
            log::error!("Query aborted: {e}");
            HttpResponse::BadGateway().json(serde_json::json!({
                "error": e.to_string()
            }))
        }
    }
}

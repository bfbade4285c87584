use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::error::MatchError;
use crate::models::{ErrorResponse, GenerateMatchesRequest, HealthResponse, PolicyOverrides};
use crate::services::{MatchService, MatchStore};

/// Application state shared across all handlers
pub struct AppState<S> {
    pub service: MatchService<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

/// Configure all match-related routes
pub fn configure<S: MatchStore>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check::<S>))
        .route("/zones/{zone_id}/matches/simulate", web::post().to(simulate_matching::<S>))
        .route("/zones/{zone_id}/matches/generate", web::post().to(generate_matches::<S>));
}

/// Map an engine or service error to its HTTP response
pub fn error_response(err: &MatchError) -> HttpResponse {
    let (error, status) = match err {
        e if e.is_validation() => ("validation_failed", 400),
        MatchError::ZoneNotFound(_) => ("zone_not_found", 404),
        _ => ("internal_error", 500),
    };

    if status == 500 {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::info!("Request rejected: {}", err);
    }

    let body = ErrorResponse {
        error: error.to_string(),
        message: err.to_string(),
        status_code: status,
    };
    match status {
        400 => HttpResponse::BadRequest().json(body),
        404 => HttpResponse::NotFound().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Health check endpoint
async fn health_check<S: MatchStore>(state: web::Data<AppState<S>>) -> impl Responder {
    let store_healthy = state.service.store().health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Simulate matching endpoint
///
/// POST /api/v1/zones/{zone_id}/matches/simulate
///
/// Request body: any subset of policy fields, merged onto the stored policy
/// ```json
/// { "default_group_size": 5, "location_hard": true }
/// ```
async fn simulate_matching<S: MatchStore>(
    state: web::Data<AppState<S>>,
    path: web::Path<String>,
    overrides: web::Json<PolicyOverrides>,
) -> impl Responder {
    let zone_id = path.into_inner();
    tracing::info!(zone_id = %zone_id, "Simulating matching");

    match state.service.simulate_matching(&zone_id, &overrides).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => error_response(&e),
    }
}

/// Generate matches endpoint
///
/// POST /api/v1/zones/{zone_id}/matches/generate
///
/// Request body:
/// ```json
/// { "policy": { "zone_id": "riverside", "default_group_size": 4 } }
/// ```
/// `policy` may be null or omitted to use the stored policy.
async fn generate_matches<S: MatchStore>(
    state: web::Data<AppState<S>>,
    path: web::Path<String>,
    req: web::Json<GenerateMatchesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "validation_failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let zone_id = path.into_inner();
    tracing::info!(zone_id = %zone_id, snapshot = req.policy.is_some(), "Generating matches");

    match state.service.generate_matches(&zone_id, req.into_inner().policy).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_response(&e),
    }
}

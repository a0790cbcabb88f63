use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::catalog::CurriculumCatalog;
use super::domain::SubjectRecord;
use super::repository::DistributionCache;
use super::service::{ConvalidationError, ConvalidationService, ImpactRequest};

#[derive(Debug, Deserialize)]
pub struct DistributionRequest {
    pub records: Vec<SubjectRecord>,
    pub catalog: CurriculumCatalog,
}

#[derive(Debug, Deserialize)]
pub struct BulkImpactRequest {
    pub students: Vec<ImpactRequest>,
}

/// Router builder exposing the distribution and impact endpoints.
pub fn convalidation_router<C>(service: Arc<ConvalidationService<C>>) -> Router
where
    C: DistributionCache + 'static,
{
    Router::new()
        .route(
            "/api/v1/convalidation/distribution",
            post(distribution_handler::<C>),
        )
        .route("/api/v1/convalidation/impact", post(impact_handler::<C>))
        .route("/api/v1/convalidation/bulk", post(bulk_handler::<C>))
        .with_state(service)
}

pub(crate) async fn distribution_handler<C>(
    State(service): State<Arc<ConvalidationService<C>>>,
    axum::Json(request): axum::Json<DistributionRequest>,
) -> Response
where
    C: DistributionCache + 'static,
{
    match service.distribution_view(&request.records, &request.catalog) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn impact_handler<C>(
    State(service): State<Arc<ConvalidationService<C>>>,
    axum::Json(request): axum::Json<ImpactRequest>,
) -> Response
where
    C: DistributionCache + 'static,
{
    match service.compute_impact(&request) {
        Ok(report) => (StatusCode::OK, axum::Json(report.summary())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn bulk_handler<C>(
    State(service): State<Arc<ConvalidationService<C>>>,
    axum::Json(request): axum::Json<BulkImpactRequest>,
) -> Response
where
    C: DistributionCache + 'static,
{
    let outcome =
        tokio::task::spawn_blocking(move || service.bulk_impact(&request.students)).await;

    match outcome {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => {
            let payload = json!({
                "error": format!("bulk run aborted: {error}"),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn error_response(error: ConvalidationError) -> Response {
    let status = if error.is_structural() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

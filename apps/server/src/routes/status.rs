use actix_web::{HttpResponse, get, web};
use chrono::{DateTime, Utc};
use fleetwatch::StatusService;
use serde::Deserialize;

use crate::error::ApiError;

/// Optional RFC 3339 bounds for a history query. Both default to the last
/// 24 hours when omitted.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

#[get("/endpoints/{id}/status")]
pub async fn endpoint_status_route(
    service: web::Data<StatusService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let endpoint_id = path.into_inner();

    match service.endpoint_status(endpoint_id).await? {
        Some(status) => Ok(HttpResponse::Ok().json(status)),
        None => Err(ApiError::NotFound(format!("no current status for endpoint {endpoint_id}"))),
    }
}

#[get("/endpoints/{id}/history")]
pub async fn endpoint_history_route(
    service: web::Data<StatusService>,
    path: web::Path<i64>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let endpoint_id = path.into_inner();
    let end = query.end.unwrap_or_else(Utc::now);
    let start = query.start.unwrap_or_else(|| end - chrono::Duration::hours(24));

    let points = service.endpoint_history(endpoint_id, start, end).await?;
    Ok(HttpResponse::Ok().json(points))
}

#[get("/sites/{id}/status")]
pub async fn site_status_route(
    service: web::Data<StatusService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let status = service.site_status(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(status))
}

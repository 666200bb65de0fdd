use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::tenant::TenantContext;

use crate::models::{AvailabilityResponse, ScheduleError};
use crate::services::availability::AvailabilityService;

#[derive(Clone)]
pub struct ScheduleState {
    pub availability: Arc<AvailabilityService>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQueryParams {
    /// Comma-separated employee ids.
    pub employee_ids: String,
    /// Comma-separated service ids.
    pub service_ids: String,
    pub date: NaiveDate,
    pub window_start: Option<NaiveTime>,
    pub window_end: Option<NaiveTime>,
}

fn parse_id_list(raw: &str, field: &str) -> Result<Vec<Uuid>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            Uuid::parse_str(part)
                .map_err(|_| AppError::BadRequest(format!("{} contains an invalid UUID", field)))
        })
        .collect()
}

pub fn map_schedule_error(err: ScheduleError) -> AppError {
    match err {
        ScheduleError::EmployeeNotFound => AppError::NotFound("Employee not found".to_string()),
        ScheduleError::ServiceNotFound => AppError::NotFound("Service not found".to_string()),
        ScheduleError::InvalidRequest(msg) => AppError::BadRequest(msg),
        ScheduleError::Storage(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn compute_availability(
    State(state): State<ScheduleState>,
    Extension(tenant): Extension<TenantContext>,
    Query(params): Query<AvailabilityQueryParams>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let employee_ids = parse_id_list(&params.employee_ids, "employee_ids")?;
    let service_ids = parse_id_list(&params.service_ids, "service_ids")?;

    let window = match (params.window_start, params.window_end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "window_start and window_end must be provided together".to_string(),
            ))
        }
    };

    let free = state
        .availability
        .free_windows(
            tenant.organization_id,
            &employee_ids,
            &service_ids,
            params.date,
            window,
        )
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(AvailabilityResponse {
        date: params.date,
        duration_minutes: free.duration().num_minutes(),
        slots: free.candidates().collect(),
    }))
}

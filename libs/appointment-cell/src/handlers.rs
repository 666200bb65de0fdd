use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::tenant::TenantContext;

use crate::models::{
    AppointmentError, CancelAppointmentRequest, CreateAppointmentRequest,
    RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::services::booking::BookingService;

#[derive(Clone)]
pub struct AppointmentState {
    pub booking: Arc<BookingService>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeDayQuery {
    pub date: NaiveDate,
}

pub fn map_appointment_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::EmployeeNotFound => {
            AppError::NotFound("Employee not found".to_string())
        }
        AppointmentError::ServiceNotFound => AppError::NotFound("Service not found".to_string()),
        AppointmentError::SlotUnavailable => {
            AppError::Conflict("Appointment slot not available".to_string())
        }
        AppointmentError::InvalidTransition { from, to } => AppError::Unprocessable(format!(
            "Invalid status transition from {} to {}",
            from, to
        )),
        AppointmentError::Conflict(msg) => AppError::Conflict(msg),
        AppointmentError::InvalidRequest(msg) => AppError::BadRequest(msg),
        AppointmentError::Storage(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentState>,
    Extension(tenant): Extension<TenantContext>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .create_appointment(tenant.organization_id, request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(tenant): Extension<TenantContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .get_appointment(tenant.organization_id, appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn get_customer_appointments(
    State(state): State<AppointmentState>,
    Extension(tenant): Extension<TenantContext>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .booking
        .list_for_customer(tenant.organization_id, customer_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn get_employee_appointments(
    State(state): State<AppointmentState>,
    Extension(tenant): Extension<TenantContext>,
    Path(employee_id): Path<Uuid>,
    Query(query): Query<EmployeeDayQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .booking
        .list_for_employee_on(tenant.organization_id, employee_id, query.date)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Extension(tenant): Extension<TenantContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .update_status(tenant.organization_id, appointment_id, request.status)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(tenant): Extension<TenantContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .cancel_appointment(tenant.organization_id, appointment_id, request.refund_first)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Extension(tenant): Extension<TenantContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .reschedule_appointment(
            tenant.organization_id,
            appointment_id,
            request.new_start_time,
        )
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled"
    })))
}

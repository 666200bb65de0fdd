use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::tenant::TenantContext;

use crate::models::{ChargeError, CreateChargeRequest, ProcessPaymentRequest};
use crate::services::charges::{ChargeCoordinator, ChargeLedger};

#[derive(Clone)]
pub struct BillingState {
    pub charges: Arc<ChargeCoordinator>,
}

pub fn map_charge_error(err: ChargeError) -> AppError {
    match err {
        ChargeError::NotFound => AppError::NotFound("Charge not found".to_string()),
        ChargeError::Conflict(msg) => AppError::Conflict(msg),
        ChargeError::InvalidRequest(msg) => AppError::BadRequest(msg),
        ChargeError::Storage(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn create_charges(
    State(state): State<BillingState>,
    Extension(tenant): Extension<TenantContext>,
    Json(request): Json<CreateChargeRequest>,
) -> Result<Json<Value>, AppError> {
    let charges = state
        .charges
        .create_charges(tenant.organization_id, request)
        .await
        .map_err(map_charge_error)?;

    Ok(Json(json!({
        "success": true,
        "charges": charges,
    })))
}

#[axum::debug_handler]
pub async fn get_charge(
    State(state): State<BillingState>,
    Extension(tenant): Extension<TenantContext>,
    Path(charge_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let charge = state
        .charges
        .get_charge(tenant.organization_id, charge_id)
        .await
        .map_err(map_charge_error)?;

    Ok(Json(json!({ "charge": charge })))
}

#[axum::debug_handler]
pub async fn list_appointment_charges(
    State(state): State<BillingState>,
    Extension(tenant): Extension<TenantContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let charges = state
        .charges
        .charges_for_appointment(tenant.organization_id, appointment_id)
        .await
        .map_err(map_charge_error)?;

    Ok(Json(json!({ "charges": charges })))
}

#[axum::debug_handler]
pub async fn process_payment(
    State(state): State<BillingState>,
    Extension(tenant): Extension<TenantContext>,
    Path(charge_id): Path<Uuid>,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let charge = state
        .charges
        .process_payment(
            tenant.organization_id,
            charge_id,
            request.amount_cents,
            request.method,
        )
        .await
        .map_err(map_charge_error)?;

    Ok(Json(json!({
        "success": true,
        "charge": charge,
        "message": "Payment applied"
    })))
}

#[axum::debug_handler]
pub async fn refund_charge(
    State(state): State<BillingState>,
    Extension(tenant): Extension<TenantContext>,
    Path(charge_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let charge = state
        .charges
        .refund(tenant.organization_id, charge_id)
        .await
        .map_err(map_charge_error)?;

    Ok(Json(json!({
        "success": true,
        "charge": charge,
        "message": "Charge refunded"
    })))
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::tenant::TenantContext;

use crate::error::ConfirmationError;
use crate::models::{
    InboundMessage, OpenConfirmationRequest, RecordResponseRequest, SelectTimeSlotRequest,
    SetDesiredDateRequest,
};
use crate::services::conversation::ConversationService;

#[derive(Clone)]
pub struct ConversationState {
    pub conversation: Arc<ConversationService>,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub phone: String,
    pub channel_instance: String,
}

pub fn map_confirmation_error(err: ConfirmationError) -> AppError {
    match err {
        ConfirmationError::NotFound => AppError::NotFound("Notification not found".to_string()),
        // A lost CAS means the event was already applied; webhooks must not
        // see that as a failure.
        ConfirmationError::Superseded => {
            AppError::Conflict("Notification already advanced".to_string())
        }
        ConfirmationError::InvalidRequest(msg) => AppError::BadRequest(msg),
        ConfirmationError::Conflict(msg) => AppError::Conflict(msg),
        ConfirmationError::Storage(msg) => AppError::Internal(msg),
    }
}

/// Inbound webhook from the messaging gateway. Replies that match no active
/// thread are acknowledged and dropped: gateways retry on error statuses,
/// and there is nothing to retry into.
#[axum::debug_handler]
pub async fn receive_webhook(
    State(state): State<ConversationState>,
    Json(inbound): Json<InboundMessage>,
) -> Result<Json<Value>, AppError> {
    let Some(notification) = state
        .conversation
        .get_pending(&inbound.phone, &inbound.channel_instance)
        .await
        .map_err(map_confirmation_error)?
    else {
        return Ok(Json(json!({ "handled": false })));
    };

    let updated = state
        .conversation
        .record_response(notification.id, &inbound.message)
        .await
        .map_err(map_confirmation_error)?;

    Ok(Json(json!({
        "handled": true,
        "notification": updated,
    })))
}

#[axum::debug_handler]
pub async fn open_confirmation(
    State(state): State<ConversationState>,
    Extension(tenant): Extension<TenantContext>,
    Json(request): Json<OpenConfirmationRequest>,
) -> Result<Json<Value>, AppError> {
    let notification = state
        .conversation
        .open_confirmation(tenant.organization_id, request)
        .await
        .map_err(map_confirmation_error)?;

    Ok(Json(json!({
        "success": true,
        "notification": notification,
    })))
}

#[axum::debug_handler]
pub async fn get_pending_confirmation(
    State(state): State<ConversationState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Value>, AppError> {
    let notification = state
        .conversation
        .get_pending(&query.phone, &query.channel_instance)
        .await
        .map_err(map_confirmation_error)?;

    Ok(Json(json!({ "notification": notification })))
}

#[axum::debug_handler]
pub async fn record_response(
    State(state): State<ConversationState>,
    Path(notification_id): Path<Uuid>,
    Json(request): Json<RecordResponseRequest>,
) -> Result<Json<Value>, AppError> {
    let notification = state
        .conversation
        .record_response(notification_id, &request.text)
        .await
        .map_err(map_confirmation_error)?;

    Ok(Json(json!({ "notification": notification })))
}

#[axum::debug_handler]
pub async fn set_desired_date(
    State(state): State<ConversationState>,
    Path(notification_id): Path<Uuid>,
    Json(request): Json<SetDesiredDateRequest>,
) -> Result<Json<Value>, AppError> {
    let notification = state
        .conversation
        .set_desired_date(notification_id, request.date)
        .await
        .map_err(map_confirmation_error)?;

    Ok(Json(json!({ "notification": notification })))
}

#[axum::debug_handler]
pub async fn select_time_slot(
    State(state): State<ConversationState>,
    Path(notification_id): Path<Uuid>,
    Json(request): Json<SelectTimeSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let notification = state
        .conversation
        .select_time_slot(notification_id, request.slot)
        .await
        .map_err(map_confirmation_error)?;

    Ok(Json(json!({ "notification": notification })))
}

#[axum::debug_handler]
pub async fn complete_confirmation(
    State(state): State<ConversationState>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notification = state
        .conversation
        .complete(notification_id)
        .await
        .map_err(map_confirmation_error)?;

    Ok(Json(json!({ "notification": notification })))
}

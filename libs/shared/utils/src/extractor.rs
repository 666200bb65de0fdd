use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::tenant::TenantContext;

/// Middleware resolving the current organization. Token-based resolution is
/// owned by the gateway in front of this service; here the resolved tenant
/// arrives as a header and is turned into an explicit request extension.
pub async fn tenant_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get("X-Organization-Id")
        .ok_or_else(|| AppError::BadRequest("Missing X-Organization-Id header".to_string()))?;

    let raw = header
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid X-Organization-Id header".to_string()))?;

    let organization_id = Uuid::parse_str(raw)
        .map_err(|_| AppError::BadRequest("X-Organization-Id must be a UUID".to_string()))?;

    request
        .extensions_mut()
        .insert(TenantContext::new(organization_id));

    Ok(next.run(request).await)
}

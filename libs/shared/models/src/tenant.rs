use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolved organization for the current request. Every core operation takes
/// this explicitly; there is no ambient tenant state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub organization_id: Uuid,
}

impl TenantContext {
    pub fn new(organization_id: Uuid) -> Self {
        Self { organization_id }
    }
}

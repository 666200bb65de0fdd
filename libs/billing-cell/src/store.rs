use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use uuid::Uuid;

use shared_database::rest::RestStore;

use crate::models::{Charge, ChargeError, ChargeStatus, PaymentMethod};

/// Persistence seam for charges. `settle` is a compare-and-swap on
/// `paid_cents` so two concurrent payments cannot both apply against the
/// same prior balance.
#[async_trait]
pub trait ChargeStore: Send + Sync {
    async fn insert(&self, charge: Charge) -> Result<Charge, ChargeError>;

    async fn get(&self, organization_id: Uuid, charge_id: Uuid) -> Result<Charge, ChargeError>;

    async fn list_for_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError>;

    async fn settle(
        &self,
        organization_id: Uuid,
        charge_id: Uuid,
        expected_paid_cents: i64,
        new_paid_cents: i64,
        new_status: ChargeStatus,
        method: Option<PaymentMethod>,
    ) -> Result<Charge, ChargeError>;
}

// ==============================================================================
// REST-BACKED STORE
// ==============================================================================

pub struct RestChargeStore {
    store: Arc<RestStore>,
}

impl RestChargeStore {
    pub fn new(store: Arc<RestStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChargeStore for RestChargeStore {
    async fn insert(&self, charge: Charge) -> Result<Charge, ChargeError> {
        let row = serde_json::to_value(&charge)
            .map_err(|e| ChargeError::Storage(e.to_string()))?;
        let stored: Charge = self.store.insert_returning("charges", row).await?;
        Ok(stored)
    }

    async fn get(&self, organization_id: Uuid, charge_id: Uuid) -> Result<Charge, ChargeError> {
        let path = format!(
            "/rest/v1/charges?id=eq.{}&organization_id=eq.{}",
            charge_id, organization_id
        );
        let rows: Vec<Charge> = self.store.request(Method::GET, &path, None).await?;
        rows.into_iter().next().ok_or(ChargeError::NotFound)
    }

    async fn list_for_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError> {
        let path = format!(
            "/rest/v1/charges?organization_id=eq.{}&appointment_id=eq.{}&order=created_at.asc",
            organization_id, appointment_id
        );
        let rows: Vec<Charge> = self.store.request(Method::GET, &path, None).await?;
        Ok(rows)
    }

    async fn settle(
        &self,
        organization_id: Uuid,
        charge_id: Uuid,
        expected_paid_cents: i64,
        new_paid_cents: i64,
        new_status: ChargeStatus,
        method: Option<PaymentMethod>,
    ) -> Result<Charge, ChargeError> {
        // The paid_cents filter makes the PATCH a CAS: a concurrent writer
        // that already moved the balance leaves this update matching zero rows.
        let path = format!(
            "/rest/v1/charges?id=eq.{}&organization_id=eq.{}&paid_cents=eq.{}",
            charge_id, organization_id, expected_paid_cents
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let mut body = serde_json::Map::new();
        body.insert("paid_cents".to_string(), json!(new_paid_cents));
        body.insert("status".to_string(), json!(new_status));
        body.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(method) = method {
            body.insert("last_payment_method".to_string(), json!(method));
        }

        let rows: Vec<Charge> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(serde_json::Value::Object(body)),
                Some(headers),
            )
            .await?;

        rows.into_iter().next().ok_or_else(|| {
            ChargeError::Conflict("Charge was modified concurrently".to_string())
        })
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
pub struct MemoryChargeStore {
    charges: Mutex<HashMap<Uuid, Charge>>,
}

impl MemoryChargeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChargeStore for MemoryChargeStore {
    async fn insert(&self, charge: Charge) -> Result<Charge, ChargeError> {
        let mut charges = self.charges.lock().unwrap();
        charges.insert(charge.id, charge.clone());
        Ok(charge)
    }

    async fn get(&self, organization_id: Uuid, charge_id: Uuid) -> Result<Charge, ChargeError> {
        let charges = self.charges.lock().unwrap();
        charges
            .get(&charge_id)
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .ok_or(ChargeError::NotFound)
    }

    async fn list_for_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError> {
        let charges = self.charges.lock().unwrap();
        let mut rows: Vec<Charge> = charges
            .values()
            .filter(|c| {
                c.organization_id == organization_id && c.appointment_id == appointment_id
            })
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.created_at);
        Ok(rows)
    }

    async fn settle(
        &self,
        organization_id: Uuid,
        charge_id: Uuid,
        expected_paid_cents: i64,
        new_paid_cents: i64,
        new_status: ChargeStatus,
        method: Option<PaymentMethod>,
    ) -> Result<Charge, ChargeError> {
        let mut charges = self.charges.lock().unwrap();
        let charge = charges
            .get_mut(&charge_id)
            .filter(|c| c.organization_id == organization_id)
            .ok_or(ChargeError::NotFound)?;

        if charge.paid_cents != expected_paid_cents {
            return Err(ChargeError::Conflict(
                "Charge was modified concurrently".to_string(),
            ));
        }

        charge.paid_cents = new_paid_cents;
        charge.status = new_status;
        if method.is_some() {
            charge.last_payment_method = method;
        }
        charge.updated_at = Utc::now();
        Ok(charge.clone())
    }
}

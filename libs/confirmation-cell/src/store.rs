use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::json;
use uuid::Uuid;

use shared_database::rest::RestStore;

use crate::error::ConfirmationError;
use crate::models::{ConfirmationNotification, ConfirmationState};

/// Fields a conversation transition may change alongside the state.
#[derive(Debug, Clone, Default)]
pub struct NotificationUpdate {
    pub desired_date: Option<NaiveDate>,
    pub offered_slots: Option<Vec<DateTime<Utc>>>,
}

/// Persistence seam for confirmation threads. `transition` is a
/// compare-and-swap on the current state: webhook processing for one
/// notification serializes there, and a lost swap means another delivery
/// of the same conversation already won.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(
        &self,
        notification: ConfirmationNotification,
    ) -> Result<ConfirmationNotification, ConfirmationError>;

    async fn get(&self, notification_id: Uuid)
        -> Result<ConfirmationNotification, ConfirmationError>;

    /// Newest active thread for a phone number on a channel instance.
    async fn find_active_by_phone(
        &self,
        phone: &str,
        channel_instance: &str,
    ) -> Result<Option<ConfirmationNotification>, ConfirmationError>;

    async fn transition(
        &self,
        notification_id: Uuid,
        expected: ConfirmationState,
        next: ConfirmationState,
        update: NotificationUpdate,
    ) -> Result<ConfirmationNotification, ConfirmationError>;

    /// Active threads untouched since the cutoff, for the expiry sweep.
    async fn list_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ConfirmationNotification>, ConfirmationError>;
}

// ==============================================================================
// REST-BACKED STORE
// ==============================================================================

pub struct RestNotificationStore {
    store: Arc<RestStore>,
}

impl RestNotificationStore {
    pub fn new(store: Arc<RestStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationStore for RestNotificationStore {
    async fn insert(
        &self,
        notification: ConfirmationNotification,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let row = serde_json::to_value(&notification)
            .map_err(|e| ConfirmationError::Storage(e.to_string()))?;
        let stored: ConfirmationNotification = self
            .store
            .insert_returning("confirmation_notifications", row)
            .await?;
        Ok(stored)
    }

    async fn get(
        &self,
        notification_id: Uuid,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let path = format!(
            "/rest/v1/confirmation_notifications?id=eq.{}",
            notification_id
        );
        let rows: Vec<ConfirmationNotification> =
            self.store.request(Method::GET, &path, None).await?;
        rows.into_iter().next().ok_or(ConfirmationError::NotFound)
    }

    async fn find_active_by_phone(
        &self,
        phone: &str,
        channel_instance: &str,
    ) -> Result<Option<ConfirmationNotification>, ConfirmationError> {
        let path = format!(
            "/rest/v1/confirmation_notifications?phone=eq.{}&channel_instance=eq.{}&state=not.in.(completed,expired)&order=created_at.desc&limit=1",
            phone, channel_instance
        );
        let rows: Vec<ConfirmationNotification> =
            self.store.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn transition(
        &self,
        notification_id: Uuid,
        expected: ConfirmationState,
        next: ConfirmationState,
        update: NotificationUpdate,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        // The state filter turns this PATCH into a CAS; zero matched rows
        // means another delivery advanced the thread first.
        let path = format!(
            "/rest/v1/confirmation_notifications?id=eq.{}&state=eq.{}",
            notification_id, expected
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let mut body = serde_json::Map::new();
        body.insert("state".to_string(), json!(next));
        body.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(date) = update.desired_date {
            body.insert("desired_date".to_string(), json!(date));
        }
        if let Some(slots) = update.offered_slots {
            body.insert("offered_slots".to_string(), json!(slots));
        }

        let rows: Vec<ConfirmationNotification> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(serde_json::Value::Object(body)),
                Some(headers),
            )
            .await?;

        rows.into_iter().next().ok_or(ConfirmationError::Superseded)
    }

    async fn list_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ConfirmationNotification>, ConfirmationError> {
        let path = format!(
            "/rest/v1/confirmation_notifications?state=not.in.(completed,expired)&updated_at=lt.{}",
            cutoff.to_rfc3339()
        );
        let rows: Vec<ConfirmationNotification> =
            self.store.request(Method::GET, &path, None).await?;
        Ok(rows)
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
pub struct MemoryNotificationStore {
    notifications: Mutex<HashMap<Uuid, ConfirmationNotification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(
        &self,
        notification: ConfirmationNotification,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let mut table = self.notifications.lock().unwrap();
        table.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn get(
        &self,
        notification_id: Uuid,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let table = self.notifications.lock().unwrap();
        table
            .get(&notification_id)
            .cloned()
            .ok_or(ConfirmationError::NotFound)
    }

    async fn find_active_by_phone(
        &self,
        phone: &str,
        channel_instance: &str,
    ) -> Result<Option<ConfirmationNotification>, ConfirmationError> {
        let table = self.notifications.lock().unwrap();
        Ok(table
            .values()
            .filter(|n| {
                n.phone == phone && n.channel_instance == channel_instance && n.state.is_active()
            })
            .max_by_key(|n| n.created_at)
            .cloned())
    }

    async fn transition(
        &self,
        notification_id: Uuid,
        expected: ConfirmationState,
        next: ConfirmationState,
        update: NotificationUpdate,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let mut table = self.notifications.lock().unwrap();
        let notification = table
            .get_mut(&notification_id)
            .ok_or(ConfirmationError::NotFound)?;

        if notification.state != expected {
            return Err(ConfirmationError::Superseded);
        }

        notification.state = next;
        if let Some(date) = update.desired_date {
            notification.desired_date = Some(date);
        }
        if let Some(slots) = update.offered_slots {
            notification.offered_slots = slots;
        }
        notification.updated_at = Utc::now();
        Ok(notification.clone())
    }

    async fn list_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ConfirmationNotification>, ConfirmationError> {
        let table = self.notifications.lock().unwrap();
        Ok(table
            .values()
            .filter(|n| n.state.is_active() && n.updated_at < cutoff)
            .cloned()
            .collect())
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use billing_cell::models::{ChargeError, CreateChargeRequest};
use billing_cell::services::charges::{AppointmentHook, ChargeCoordinator, ChargeLedger};
use schedule_cell::services::availability::AvailabilityService;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CreateAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::store::AppointmentStore;

pub struct BookingService {
    store: Arc<dyn AppointmentStore>,
    availability: Arc<AvailabilityService>,
    charges: Arc<ChargeCoordinator>,
    lifecycle: AppointmentLifecycleService,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        availability: Arc<AvailabilityService>,
        charges: Arc<ChargeCoordinator>,
    ) -> Self {
        Self {
            store,
            availability,
            charges,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Book an appointment. Validation happens against the availability
    /// calculator, but the store's overlap constraint is what finally
    /// decides between two concurrent requests for the same slot.
    pub async fn create_appointment(
        &self,
        organization_id: Uuid,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for customer {} with {} employee(s)",
            request.customer_id,
            request.employee_ids.len()
        );

        // **Step 1: Input validation**
        let employee_ids = dedup(&request.employee_ids);
        let service_ids = dedup(&request.service_ids);
        if employee_ids.is_empty() {
            return Err(AppointmentError::InvalidRequest(
                "At least one employee is required".to_string(),
            ));
        }
        if service_ids.is_empty() {
            return Err(AppointmentError::InvalidRequest(
                "At least one service is required".to_string(),
            ));
        }
        if request.require_payment_confirmation && request.charge.is_none() {
            return Err(AppointmentError::InvalidRequest(
                "Payment confirmation requires a charge".to_string(),
            ));
        }

        // **Step 2: Slot validation via the availability calculator**
        let date = request.start_time.date_naive();
        let free = self
            .availability
            .free_windows(organization_id, &employee_ids, &service_ids, date, None)
            .await?;
        let end_time = request.start_time + free.duration();

        let status = if free.fits(request.start_time) {
            if request.require_payment_confirmation {
                AppointmentStatus::Pending
            } else {
                AppointmentStatus::Scheduled
            }
        } else if request.waitlist_if_unavailable {
            info!(
                "No slot at {} for customer {}, waitlisting",
                request.start_time, request.customer_id
            );
            AppointmentStatus::Waitlisted
        } else {
            return Err(AppointmentError::SlotUnavailable);
        };

        // **Step 3: Persist; the store enforces the overlap constraint**
        let now = Utc::now();
        let mut appointment = self
            .store
            .insert(Appointment {
                id: Uuid::new_v4(),
                organization_id,
                customer_id: request.customer_id,
                employee_ids,
                service_ids,
                start_time: request.start_time,
                end_time,
                status,
                charge_ids: vec![],
                rescheduled_to: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        // **Step 4: Billing**
        if let Some(instruction) = request.charge {
            let created = self
                .charges
                .create_charges(
                    organization_id,
                    CreateChargeRequest {
                        appointment_id: appointment.id,
                        total_cents: instruction.total_cents,
                        deposit_percentage: instruction.deposit_percentage,
                    },
                )
                .await?;
            let charge_ids = created.iter().map(|c| c.id).collect();
            appointment = self
                .store
                .attach_charges(organization_id, appointment.id, charge_ids)
                .await?;
        }

        info!(
            "Appointment {} created as {}",
            appointment.id, appointment.status
        );
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        self.store.get(organization_id, appointment_id).await
    }

    pub async fn list_for_customer(
        &self,
        organization_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .list_for_customer(organization_id, customer_id)
            .await
    }

    pub async fn list_for_employee_on(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .list_for_employee_on(organization_id, employee_id, date)
            .await
    }

    /// Apply a status transition from the allowed table. Cancellation goes
    /// through the charge guard; rescheduling needs a new start time and is
    /// its own operation.
    pub async fn update_status(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        target: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get(organization_id, appointment_id).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, target)?;

        match target {
            AppointmentStatus::Cancelled => {
                return self
                    .cancel_appointment(organization_id, appointment_id, false)
                    .await;
            }
            AppointmentStatus::Rescheduled => {
                return Err(AppointmentError::InvalidRequest(
                    "Rescheduling requires a new start time".to_string(),
                ));
            }
            AppointmentStatus::Scheduled if appointment.status == AppointmentStatus::Waitlisted => {
                // Promoting a waitlisted request claims a slot: re-validate
                // before the store's constraint gets the final word.
                let free = self
                    .availability
                    .free_windows(
                        organization_id,
                        &appointment.employee_ids,
                        &appointment.service_ids,
                        appointment.start_time.date_naive(),
                        None,
                    )
                    .await?;
                if !free.fits(appointment.start_time) {
                    return Err(AppointmentError::SlotUnavailable);
                }
            }
            _ => {}
        }

        self.store
            .update_status(organization_id, appointment_id, appointment.status, target)
            .await
    }

    /// Cancel an appointment. A charge holding collected funds blocks the
    /// cancellation unless `refund_first` is set, in which case the refund
    /// and the status change are applied as one unit.
    pub async fn cancel_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        refund_first: bool,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get(organization_id, appointment_id).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let blocking = self
            .charges
            .blocking_charges(organization_id, appointment_id)
            .await?;

        if blocking.is_empty() {
            return self
                .store
                .update_status(
                    organization_id,
                    appointment_id,
                    appointment.status,
                    AppointmentStatus::Cancelled,
                )
                .await;
        }

        if !refund_first {
            warn!(
                "Cancellation of appointment {} blocked by {} collected charge(s)",
                appointment_id,
                blocking.len()
            );
            return Err(AppointmentError::Conflict(
                "Cannot cancel: collected charge must be refunded first".to_string(),
            ));
        }

        let refunded = self
            .charges
            .refund_appointment_charges(organization_id, appointment_id)
            .await?;

        match self
            .store
            .update_status(
                organization_id,
                appointment_id,
                appointment.status,
                AppointmentStatus::Cancelled,
            )
            .await
        {
            Ok(cancelled) => {
                info!(
                    "Appointment {} cancelled after refunding {} charge(s)",
                    appointment_id,
                    refunded.len()
                );
                Ok(cancelled)
            }
            Err(err) => {
                // The refund already went through; put the charges back so
                // money-state and booking-state stay consistent.
                if let Err(restore_err) = self
                    .charges
                    .reinstate_charges(organization_id, refunded)
                    .await
                {
                    error!(
                        "Failed to reinstate charges for appointment {} after cancel failure: {}",
                        appointment_id, restore_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Move a scheduled appointment to a new start time. The original
    /// becomes Rescheduled and a linked replacement is created in the same
    /// store operation.
    pub async fn reschedule_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        new_start_time: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let original = self.store.get(organization_id, appointment_id).await?;
        self.lifecycle
            .validate_status_transition(original.status, AppointmentStatus::Rescheduled)?;

        let date = new_start_time.date_naive();
        let free = self
            .availability
            .free_windows_excluding(
                organization_id,
                &original.employee_ids,
                &original.service_ids,
                date,
                None,
                Some(original.id),
            )
            .await?;
        if !free.fits(new_start_time) {
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = Utc::now();
        let replacement = Appointment {
            id: Uuid::new_v4(),
            organization_id,
            customer_id: original.customer_id,
            employee_ids: original.employee_ids.clone(),
            service_ids: original.service_ids.clone(),
            start_time: new_start_time,
            end_time: new_start_time + free.duration(),
            status: AppointmentStatus::Scheduled,
            charge_ids: original.charge_ids.clone(),
            rescheduled_to: None,
            created_at: now,
            updated_at: now,
        };

        let replacement = self
            .store
            .reschedule(organization_id, original.id, replacement)
            .await?;

        info!(
            "Appointment {} rescheduled to {} as {}",
            original.id, new_start_time, replacement.id
        );
        Ok(replacement)
    }
}

/// Billing calls back here when every charge of an appointment settles: a
/// Pending booking is promoted to Scheduled.
#[async_trait]
impl AppointmentHook for BookingService {
    async fn payment_confirmed(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<(), ChargeError> {
        let appointment = match self.store.get(organization_id, appointment_id).await {
            Ok(appointment) => appointment,
            Err(AppointmentError::NotFound) => {
                warn!(
                    "Payment settled for unknown appointment {}, ignoring",
                    appointment_id
                );
                return Ok(());
            }
            Err(err) => return Err(ChargeError::Storage(err.to_string())),
        };

        if appointment.status != AppointmentStatus::Pending {
            return Ok(());
        }

        self.store
            .update_status(
                organization_id,
                appointment_id,
                AppointmentStatus::Pending,
                AppointmentStatus::Scheduled,
            )
            .await
            .map_err(|e| ChargeError::Storage(e.to_string()))?;

        info!(
            "Appointment {} confirmed after full payment",
            appointment_id
        );
        Ok(())
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

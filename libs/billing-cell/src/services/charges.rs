use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Charge, ChargeError, ChargeKind, ChargeStatus, CreateChargeRequest, PaymentMethod,
};
use crate::store::ChargeStore;

/// Callback into the lifecycle manager: full settlement of a pending
/// appointment's charges promotes the booking. Implemented by the
/// appointment cell and wired at startup.
#[async_trait]
pub trait AppointmentHook: Send + Sync {
    async fn payment_confirmed(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<(), ChargeError>;
}

/// Charge state as the lifecycle manager consumes it: the cancellation
/// guard and the refund path.
#[async_trait]
pub trait ChargeLedger: Send + Sync {
    async fn charges_for_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError>;

    /// Charges currently holding collected, unreturned funds.
    async fn blocking_charges(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError>;

    /// Refund every charge of the appointment that holds collected funds.
    /// Returns the charges as they were before the refund, for compensation.
    async fn refund_appointment_charges(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError>;

    /// Compensating write: restore charges to their pre-refund state after a
    /// failed follow-up step.
    async fn reinstate_charges(
        &self,
        organization_id: Uuid,
        charges: Vec<Charge>,
    ) -> Result<(), ChargeError>;
}

pub struct ChargeCoordinator {
    store: Arc<dyn ChargeStore>,
    appointment_hook: OnceLock<Arc<dyn AppointmentHook>>,
}

impl ChargeCoordinator {
    pub fn new(store: Arc<dyn ChargeStore>) -> Self {
        Self {
            store,
            appointment_hook: OnceLock::new(),
        }
    }

    /// Wire the lifecycle callback. Called once during startup composition.
    pub fn set_appointment_hook(&self, hook: Arc<dyn AppointmentHook>) {
        if self.appointment_hook.set(hook).is_err() {
            warn!("Appointment hook already wired, ignoring replacement");
        }
    }

    /// Create the charge(s) for an appointment: a single full charge, or a
    /// deposit/remainder pair when a deposit percentage is given.
    pub async fn create_charges(
        &self,
        organization_id: Uuid,
        request: CreateChargeRequest,
    ) -> Result<Vec<Charge>, ChargeError> {
        if request.total_cents <= 0 {
            return Err(ChargeError::InvalidRequest(
                "Charge amount must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        let base = Charge {
            id: Uuid::new_v4(),
            organization_id,
            appointment_id: request.appointment_id,
            kind: ChargeKind::Full,
            total_cents: request.total_cents,
            paid_cents: 0,
            status: ChargeStatus::Pending,
            deposit_percentage: None,
            parent_charge_id: None,
            last_payment_method: None,
            created_at: now,
            updated_at: now,
        };

        let charges = match request.deposit_percentage {
            None => vec![self.store.insert(base).await?],
            Some(percentage) => {
                if !(1..=99).contains(&percentage) {
                    return Err(ChargeError::InvalidRequest(
                        "Deposit percentage must be between 1 and 99".to_string(),
                    ));
                }
                // Deposit rounds up so the remainder never exceeds it on
                // tiny amounts.
                let deposit_cents =
                    (request.total_cents * i64::from(percentage) + 99) / 100;
                let remainder_cents = request.total_cents - deposit_cents;

                let deposit = Charge {
                    kind: ChargeKind::Deposit,
                    total_cents: deposit_cents,
                    deposit_percentage: Some(percentage),
                    ..base.clone()
                };
                let deposit = self.store.insert(deposit).await?;

                let remainder = Charge {
                    id: Uuid::new_v4(),
                    kind: ChargeKind::Remainder,
                    total_cents: remainder_cents,
                    parent_charge_id: Some(deposit.id),
                    ..base
                };
                if remainder.total_cents > 0 {
                    vec![deposit, self.store.insert(remainder).await?]
                } else {
                    vec![deposit]
                }
            }
        };

        info!(
            "Created {} charge(s) for appointment {}",
            charges.len(),
            request.appointment_id
        );
        Ok(charges)
    }

    pub async fn get_charge(
        &self,
        organization_id: Uuid,
        charge_id: Uuid,
    ) -> Result<Charge, ChargeError> {
        self.store.get(organization_id, charge_id).await
    }

    /// Apply a payment. Accumulates into `paid_cents`; the charge becomes
    /// Paid when fully covered, PartiallyPaid otherwise. When every charge
    /// of the appointment is settled, the lifecycle hook fires as part of
    /// the same operation.
    pub async fn process_payment(
        &self,
        organization_id: Uuid,
        charge_id: Uuid,
        amount_cents: i64,
        method: PaymentMethod,
    ) -> Result<Charge, ChargeError> {
        if amount_cents <= 0 {
            return Err(ChargeError::InvalidRequest(
                "Payment amount must be positive".to_string(),
            ));
        }

        let charge = self.store.get(organization_id, charge_id).await?;
        if charge.status.is_terminal() {
            return Err(ChargeError::Conflict(format!(
                "Cannot pay a charge in {} status",
                charge.status
            )));
        }
        if amount_cents > charge.outstanding_cents() {
            return Err(ChargeError::Conflict(format!(
                "Payment of {} exceeds outstanding balance of {}",
                amount_cents,
                charge.outstanding_cents()
            )));
        }

        let new_paid = charge.paid_cents + amount_cents;
        let new_status = if new_paid >= charge.total_cents {
            ChargeStatus::Paid
        } else {
            ChargeStatus::PartiallyPaid
        };

        let updated = self
            .store
            .settle(
                organization_id,
                charge_id,
                charge.paid_cents,
                new_paid,
                new_status,
                Some(method),
            )
            .await?;

        debug!(
            "Payment of {} applied to charge {} ({})",
            amount_cents, charge_id, updated.status
        );

        if updated.status == ChargeStatus::Paid {
            self.notify_if_fully_settled(organization_id, updated.appointment_id)
                .await?;
        }

        Ok(updated)
    }

    /// Return collected funds. Only charges with collected money can be
    /// refunded; refusal keeps the operation explicit rather than silently
    /// absorbing bookkeeping mistakes.
    pub async fn refund(
        &self,
        organization_id: Uuid,
        charge_id: Uuid,
    ) -> Result<Charge, ChargeError> {
        let charge = self.store.get(organization_id, charge_id).await?;
        if !charge.has_collected_funds() {
            return Err(ChargeError::Conflict(format!(
                "Cannot refund a charge in {} status with {} cents collected",
                charge.status, charge.paid_cents
            )));
        }

        let refunded = self
            .store
            .settle(
                organization_id,
                charge_id,
                charge.paid_cents,
                charge.paid_cents,
                ChargeStatus::Refunded,
                None,
            )
            .await?;

        info!(
            "Refunded charge {} ({} cents) for appointment {}",
            charge_id, charge.paid_cents, charge.appointment_id
        );
        Ok(refunded)
    }

    async fn notify_if_fully_settled(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<(), ChargeError> {
        let charges = self
            .store
            .list_for_appointment(organization_id, appointment_id)
            .await?;
        let fully_settled = charges
            .iter()
            .filter(|c| !c.status.is_terminal())
            .all(|c| c.status == ChargeStatus::Paid);

        if fully_settled {
            if let Some(hook) = self.appointment_hook.get() {
                hook.payment_confirmed(organization_id, appointment_id)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChargeLedger for ChargeCoordinator {
    async fn charges_for_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError> {
        self.store
            .list_for_appointment(organization_id, appointment_id)
            .await
    }

    async fn blocking_charges(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError> {
        let charges = self
            .store
            .list_for_appointment(organization_id, appointment_id)
            .await?;
        Ok(charges
            .into_iter()
            .filter(Charge::has_collected_funds)
            .collect())
    }

    async fn refund_appointment_charges(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<Charge>, ChargeError> {
        let blocking = self
            .blocking_charges(organization_id, appointment_id)
            .await?;
        for charge in &blocking {
            self.refund(organization_id, charge.id).await?;
        }
        Ok(blocking)
    }

    async fn reinstate_charges(
        &self,
        organization_id: Uuid,
        charges: Vec<Charge>,
    ) -> Result<(), ChargeError> {
        for charge in charges {
            let current = self.store.get(organization_id, charge.id).await?;
            self.store
                .settle(
                    organization_id,
                    charge.id,
                    current.paid_cents,
                    charge.paid_cents,
                    charge.status,
                    charge.last_payment_method,
                )
                .await?;
        }
        Ok(())
    }
}

//! Demo payment state machine.
//!
//! Payments are simulated: a `PENDING` payment is settled by an explicit update to `PAID`,
//! `FAILED` or `CANCELLED` and is immutable afterwards. Settling as `PAID` confirms the
//! appointment unless it has already reached a terminal status. Every settlement appends one
//! event to the appointment's audit trail.

use crate::{
    entities::{Appointment, AppointmentStatus, Payment, PaymentMethod, PaymentStatus, Service, payment},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{Set, SqlErr, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{
    appointment::{AppointmentDetails, get_appointment_details, record_event, write_status},
    settings::acquire_write_lock,
    whole_seconds,
};

const TRANSACTION_ID_PREFIX: &str = "TXN-";
const TRANSACTION_ID_LEN: usize = 10;
const TRANSACTION_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDemoPayment {
    pub appointment_id: i64,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoPaymentUpdate {
    pub status: PaymentStatus,
}

/// Result of a payment operation; `payment` is `None` for on-site payments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub payment: Option<payment::Model>,
    pub method: PaymentMethod,
    pub appointment: AppointmentDetails,
}

/// A fresh demo transaction id such as `TXN-7Q2K9D0XAB`.
#[must_use]
pub fn generate_transaction_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..TRANSACTION_ID_LEN)
        .map(|_| char::from(TRANSACTION_ID_CHARSET[rng.gen_range(0..TRANSACTION_ID_CHARSET.len())]))
        .collect();
    format!("{TRANSACTION_ID_PREFIX}{suffix}")
}

const fn method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::DemoGcash => "GCash (demo)",
        PaymentMethod::DemoPaymaya => "PayMaya (demo)",
        PaymentMethod::Onsite => "on-site",
    }
}

/// Opens a demo payment for an appointment.
///
/// On-site payments are settled at the counter and create no record.
///
/// # Errors
/// Returns an error if:
/// - The appointment does not exist
/// - The appointment is cancelled
/// - The appointment already has a payment
/// - The database operation fails
#[instrument(skip(db))]
pub async fn create_demo_payment(
    db: &DatabaseConnection,
    appointment_id: i64,
    method: PaymentMethod,
    now: DateTime<Utc>,
) -> Result<PaymentOutcome> {
    let txn = db.begin().await?;
    acquire_write_lock(&txn).await?;

    let appointment = Appointment::find_by_id(appointment_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Appointment", appointment_id))?;

    if appointment.status == AppointmentStatus::Cancelled {
        return Err(Error::validation("Cannot pay for a cancelled appointment"));
    }

    if method == PaymentMethod::Onsite {
        let details = get_appointment_details(&txn, appointment_id).await?;
        txn.commit().await?;
        return Ok(PaymentOutcome {
            payment: None,
            method,
            appointment: details,
        });
    }

    let existing = Payment::find()
        .filter(payment::Column::AppointmentId.eq(appointment_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::conflict("A payment already exists for this appointment"));
    }

    let service = Service::find_by_id(appointment.service_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Service", appointment.service_id))?;

    let inserted = payment::ActiveModel {
        appointment_id: Set(appointment_id),
        status: Set(PaymentStatus::Pending),
        method: Set(method),
        amount_cents: Set(service.price_cents),
        transaction_id: Set(None),
        created_at: Set(whole_seconds(now)),
        updated_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(&txn)
    .await;

    let created = match inserted {
        Ok(created) => created,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(Error::conflict("A payment already exists for this appointment"));
        }
        Err(e) => return Err(e.into()),
    };

    let details = get_appointment_details(&txn, appointment_id).await?;
    txn.commit().await?;

    info!(
        payment_id = created.id,
        appointment_id,
        amount_cents = created.amount_cents,
        "Demo payment opened"
    );
    Ok(PaymentOutcome {
        payment: Some(created),
        method,
        appointment: details,
    })
}

/// Settles a pending demo payment.
///
/// # Errors
/// Returns an error if:
/// - `target` is `PENDING`
/// - The payment does not exist
/// - The payment is already settled, or was settled concurrently
/// - The database operation fails
#[instrument(skip(db))]
pub async fn update_demo_payment(
    db: &DatabaseConnection,
    payment_id: i64,
    target: PaymentStatus,
    actor_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<PaymentOutcome> {
    if target == PaymentStatus::Pending {
        return Err(Error::validation(
            "Payment status must be PAID, FAILED or CANCELLED",
        ));
    }

    let txn = db.begin().await?;
    acquire_write_lock(&txn).await?;

    let current = Payment::find_by_id(payment_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Payment", payment_id))?;

    if current.status.is_final() {
        return Err(Error::validation("Payment is already finalized"));
    }

    let transaction_id = match (&current.transaction_id, target) {
        (None, PaymentStatus::Paid) => Some(generate_transaction_id()),
        (existing, _) => existing.clone(),
    };

    let result = Payment::update_many()
        .set(payment::ActiveModel {
            status: Set(target),
            transaction_id: Set(transaction_id.clone()),
            updated_at: Set(whole_seconds(now)),
            ..Default::default()
        })
        .filter(payment::Column::Id.eq(payment_id))
        .filter(payment::Column::Status.eq(PaymentStatus::Pending))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::conflict("Payment was modified concurrently"));
    }

    let appointment = Appointment::find_by_id(current.appointment_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Appointment", current.appointment_id))?;

    let method = method_label(current.method);
    let (status, notes) = match target {
        PaymentStatus::Paid => {
            let reference = transaction_id.as_deref().unwrap_or_default();
            let confirms = appointment.status.is_active()
                && appointment.status != AppointmentStatus::Confirmed;
            if confirms {
                write_status(&txn, &appointment, AppointmentStatus::Confirmed, now).await?;
                (
                    AppointmentStatus::Confirmed,
                    format!("Payment received via {method} ({reference}); appointment confirmed"),
                )
            } else {
                (
                    appointment.status,
                    format!("Payment received via {method} ({reference})"),
                )
            }
        }
        PaymentStatus::Failed => (appointment.status, format!("Payment via {method} failed")),
        PaymentStatus::Cancelled | PaymentStatus::Pending => {
            (appointment.status, format!("Payment via {method} cancelled"))
        }
    };
    record_event(&txn, appointment.id, status, Some(notes), actor_id, now).await?;

    let details = get_appointment_details(&txn, appointment.id).await?;
    let updated = details.payment.clone();
    txn.commit().await?;

    info!(
        payment_id,
        appointment_id = appointment.id,
        status = ?target,
        "Demo payment settled"
    );
    Ok(PaymentOutcome {
        payment: updated,
        method: current.method,
        appointment: details,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::appointment::update_status, test_utils::*};
    use sea_orm::PaginatorTrait;

    async fn booked(db: &DatabaseConnection, hour: u32) -> Result<i64> {
        let service = create_test_service(db, &format!("Treatment {hour}"), 60).await?;
        let outcome =
            book_test_appointment(db, service.id, test_day_at(hour, 0), "pay@example.com").await?;
        Ok(outcome.appointment.appointment.id)
    }

    async fn open(db: &DatabaseConnection, appointment_id: i64) -> Result<payment::Model> {
        let outcome =
            create_demo_payment(db, appointment_id, PaymentMethod::DemoGcash, fixed_now()).await?;
        Ok(outcome.payment.unwrap())
    }

    #[test]
    fn test_transaction_id_format() {
        let id = generate_transaction_id();
        assert_eq!(id.len(), 14);
        assert!(id.starts_with("TXN-"));
        assert!(id[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_open_snapshots_price_once() -> Result<()> {
        let db = setup_test_db().await?;
        let id = booked(&db, 9).await?;

        let payment = open(&db, id).await?;
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount_cents, 25_000);
        assert!(payment.transaction_id.is_none());

        let again = create_demo_payment(&db, id, PaymentMethod::DemoPaymaya, fixed_now()).await;
        assert!(matches!(again, Err(Error::Conflict { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_onsite_creates_no_record() -> Result<()> {
        let db = setup_test_db().await?;
        let id = booked(&db, 9).await?;

        let outcome = create_demo_payment(&db, id, PaymentMethod::Onsite, fixed_now()).await?;
        assert!(outcome.payment.is_none());
        assert_eq!(outcome.method, PaymentMethod::Onsite);
        assert_eq!(Payment::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_rejects_cancelled_or_missing() -> Result<()> {
        let db = setup_test_db().await?;
        let id = booked(&db, 9).await?;
        update_status(&db, id, AppointmentStatus::Cancelled, None, None, fixed_now()).await?;

        let cancelled = create_demo_payment(&db, id, PaymentMethod::DemoGcash, fixed_now()).await;
        assert!(matches!(cancelled, Err(Error::Validation { .. })));

        let missing = create_demo_payment(&db, 999, PaymentMethod::DemoGcash, fixed_now()).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_paid_confirms_appointment() -> Result<()> {
        let db = setup_test_db().await?;
        let id = booked(&db, 9).await?;
        let payment = open(&db, id).await?;

        let outcome =
            update_demo_payment(&db, payment.id, PaymentStatus::Paid, None, fixed_now()).await?;

        let settled = outcome.payment.unwrap();
        assert_eq!(settled.status, PaymentStatus::Paid);
        assert!(settled.transaction_id.as_deref().unwrap().starts_with("TXN-"));
        assert_eq!(outcome.appointment.appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(outcome.appointment.events.len(), 2);
        let last = outcome.appointment.events.last().unwrap();
        assert_eq!(last.status, AppointmentStatus::Confirmed);
        assert!(last.notes.as_deref().unwrap().contains(settled.transaction_id.as_deref().unwrap()));
        Ok(())
    }

    #[tokio::test]
    async fn test_paid_leaves_terminal_appointment_alone() -> Result<()> {
        let db = setup_test_db().await?;
        let id = booked(&db, 9).await?;
        let payment = open(&db, id).await?;
        update_status(&db, id, AppointmentStatus::Completed, None, None, fixed_now()).await?;

        let outcome =
            update_demo_payment(&db, payment.id, PaymentStatus::Paid, Some(4), fixed_now()).await?;
        assert_eq!(outcome.appointment.appointment.status, AppointmentStatus::Completed);
        // Created, completed, paid
        assert_eq!(outcome.appointment.events.len(), 3);
        assert_eq!(outcome.appointment.events[2].status, AppointmentStatus::Completed);
        assert_eq!(outcome.appointment.events[2].created_by_id, Some(4));
        Ok(())
    }

    #[tokio::test]
    async fn test_paid_on_confirmed_logs_without_status_change() -> Result<()> {
        let db = setup_test_db().await?;
        let id = booked(&db, 9).await?;
        let payment = open(&db, id).await?;
        update_status(&db, id, AppointmentStatus::Confirmed, None, None, fixed_now()).await?;

        let outcome =
            update_demo_payment(&db, payment.id, PaymentStatus::Paid, None, fixed_now()).await?;
        assert_eq!(outcome.appointment.appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(outcome.appointment.events.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_payment_is_final() -> Result<()> {
        let db = setup_test_db().await?;
        let id = booked(&db, 9).await?;
        let payment = open(&db, id).await?;

        let outcome =
            update_demo_payment(&db, payment.id, PaymentStatus::Failed, None, fixed_now()).await?;
        let failed = outcome.payment.unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert!(failed.transaction_id.is_none());
        assert_eq!(outcome.appointment.appointment.status, AppointmentStatus::Pending);
        assert_eq!(outcome.appointment.events.len(), 2);

        let retry = update_demo_payment(&db, payment.id, PaymentStatus::Paid, None, fixed_now()).await;
        assert!(matches!(retry, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_rejects_pending_target_and_unknown_payment() -> Result<()> {
        let db = setup_test_db().await?;
        let id = booked(&db, 9).await?;
        let payment = open(&db, id).await?;

        let pending =
            update_demo_payment(&db, payment.id, PaymentStatus::Pending, None, fixed_now()).await;
        assert!(matches!(pending, Err(Error::Validation { .. })));

        let missing = update_demo_payment(&db, 404, PaymentStatus::Paid, None, fixed_now()).await;
        assert!(matches!(missing, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_settlements_finalize_once() -> Result<()> {
        let (db, _dir) = setup_shared_test_db(8).await?;
        let id = booked(&db, 9).await?;
        let payment_id = open(&db, id).await?.id;

        let handles: Vec<_> = [PaymentStatus::Paid, PaymentStatus::Failed, PaymentStatus::Cancelled]
            .into_iter()
            .map(|target| {
                let db = db.clone();
                tokio::spawn(async move {
                    update_demo_payment(&db, payment_id, target, None, fixed_now()).await
                })
            })
            .collect();

        let mut settled = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => settled += 1,
                Err(Error::Validation { .. }) => refused += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((settled, refused), (1, 2));

        // Booking event plus exactly one settlement event
        let details = get_appointment_details(&db, id).await?;
        assert_eq!(details.events.len(), 2);
        Ok(())
    }
}

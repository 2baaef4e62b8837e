//! Booking transaction manager.
//!
//! A booking re-validates availability against the current database state inside the same
//! transaction that inserts the appointment. The transaction opens with
//! [`settings::acquire_booking_lock`], so two bookings can never both read the last free unit
//! of capacity: the second one waits for the first to commit and then sees its appointment.
//!
//! Customer accounts are provisioned inside the same transaction, so a rejected booking never
//! leaves an orphan account behind.

use crate::{
    config::BookingPolicy,
    entities::{AppointmentStatus, PaymentMethod, Role, User, appointment, user},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{
    appointment::{AppointmentDetails, get_appointment_details, record_event},
    availability::{
        CapacityLimit, TimeRange, count_overlapping, effective_capacity, find_active_overlapping,
    },
    blocked_range, clean_text, service, settings, slot_limit, whole_seconds,
};

/// Length of the one-time password handed to new customers
const GENERATED_PASSWORD_LEN: usize = 12;

/// Contact details supplied with a booking.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A booking request for one service occurrence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub service_id: i64,
    pub scheduled_start: DateTime<Utc>,
    pub customer: CustomerContact,
    pub notes: Option<String>,
    /// Echoed back only; payments are opened separately
    pub payment_method: Option<PaymentMethod>,
}

/// Login of a freshly provisioned customer. Returned once and never stored in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOutcome {
    pub appointment: AppointmentDetails,
    pub credentials: Option<GeneratedCredentials>,
    pub requested_payment_method: Option<PaymentMethod>,
}

/// Trims the contact and lower-cases the email.
fn normalize_contact(contact: CustomerContact) -> Result<CustomerContact> {
    let name = contact.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::validation("Customer name is required"));
    }

    let email = contact.email.trim().to_lowercase();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    });
    if !valid {
        return Err(Error::validation("A valid customer email is required"));
    }

    Ok(CustomerContact {
        name,
        email,
        phone: clean_text(contact.phone),
    })
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str) -> Result<String> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Internal {
            message: format!("Failed to hash password: {e}"),
        })?;
    Ok(hash.to_string())
}

/// A one-time password and its hash.
struct NewLogin {
    password: String,
    password_hash: String,
}

impl NewLogin {
    fn generate() -> Result<Self> {
        let password = generate_password();
        let password_hash = hash_password(&password)?;
        Ok(Self {
            password,
            password_hash,
        })
    }
}

async fn find_customer<C>(db: &C, email: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the account for the contact's email, creating a customer account if none exists.
async fn resolve_customer<C>(
    db: &C,
    contact: &CustomerContact,
    login: Option<NewLogin>,
    now: DateTime<Utc>,
) -> Result<(user::Model, Option<GeneratedCredentials>)>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_customer(db, &contact.email).await? {
        return Ok((existing, None));
    }

    let login = match login {
        Some(login) => login,
        None => NewLogin::generate()?,
    };

    let created = user::ActiveModel {
        email: Set(contact.email.clone()),
        full_name: Set(contact.name.clone()),
        phone: Set(contact.phone.clone()),
        role: Set(Role::Customer),
        password_hash: Set(login.password_hash),
        created_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = created.id, "Provisioned customer account");
    let credentials = GeneratedCredentials {
        username: created.email.clone(),
        password: login.password,
    };
    Ok((created, Some(credentials)))
}

/// Books a service occurrence.
///
/// `actor_id` is the authenticated caller, if any; it is recorded on the creation event,
/// falling back to the resolved customer.
///
/// # Errors
/// Returns an error if:
/// - The contact details are invalid
/// - The service does not exist or is inactive
/// - The start lies beyond the booking window or in the past
/// - The interval overlaps a blocked range
/// - The interval is already at capacity
/// - The database operation fails
#[instrument(skip(db, policy, request), fields(service_id = request.service_id))]
pub async fn create_booking(
    db: &DatabaseConnection,
    policy: &BookingPolicy,
    request: BookingRequest,
    actor_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<BookingOutcome> {
    let contact = normalize_contact(request.customer)?;
    let scheduled_start = whole_seconds(request.scheduled_start);

    let service = service::get_active_service(db, request.service_id).await?;
    let scheduled_end = scheduled_start
        .checked_add_signed(Duration::minutes(i64::from(service.duration_minutes)))
        .ok_or_else(|| Error::validation("Scheduled start is out of range"))?;

    // Hash outside the lock; discarded if the account turns out to exist
    let login = match find_customer(db, &contact.email).await? {
        Some(_) => None,
        None => Some(NewLogin::generate()?),
    };

    let txn = db.begin().await?;
    let current = settings::acquire_booking_lock(&txn, policy, now).await?;

    if policy.local_date(scheduled_start)
        > policy.last_bookable_date(now, current.booking_window_days)
    {
        debug!(%scheduled_start, "Rejected booking beyond the window");
        return Err(Error::BookingWindowExceeded {
            days: current.booking_window_days,
        });
    }
    if scheduled_start < now {
        debug!(%scheduled_start, "Rejected booking in the past");
        return Err(Error::validation("Cannot book an appointment in the past"));
    }

    let requested = TimeRange::new(scheduled_start, scheduled_end);

    if let Some(blocked) = blocked_range::find_overlapping(&txn, scheduled_start, scheduled_end)
        .await?
        .first()
    {
        debug!(blocked_range_id = blocked.id, "Rejected booking in a blocked range");
        let message = match &blocked.reason {
            Some(reason) => format!("Time slot is blocked: {reason}"),
            None => "Time slot is blocked".to_string(),
        };
        return Err(Error::conflict(message));
    }

    let limits: Vec<CapacityLimit> =
        slot_limit::find_overlapping(&txn, scheduled_start, scheduled_end)
            .await?
            .iter()
            .map(CapacityLimit::from)
            .collect();
    let capacity = effective_capacity(current.max_concurrent_appointments, &limits, &requested);

    let occupied: Vec<TimeRange> = find_active_overlapping(&txn, scheduled_start, scheduled_end)
        .await?
        .iter()
        .map(TimeRange::from)
        .collect();
    if count_overlapping(&occupied, &requested) >= capacity {
        debug!(capacity, "Rejected booking for a full slot");
        return Err(Error::conflict(format!(
            "Time slot is fully booked (max {capacity} concurrent appointments)"
        )));
    }

    let (customer, credentials) = resolve_customer(&txn, &contact, login, now).await?;

    let created = appointment::ActiveModel {
        status: Set(AppointmentStatus::Pending),
        scheduled_start: Set(scheduled_start),
        scheduled_end: Set(scheduled_end),
        service_id: Set(service.id),
        customer_id: Set(Some(customer.id)),
        customer_name: Set(contact.name),
        customer_email: Set(contact.email),
        customer_phone: Set(contact.phone),
        notes: Set(clean_text(request.notes)),
        created_at: Set(whole_seconds(now)),
        updated_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    record_event(
        &txn,
        created.id,
        created.status,
        Some("Appointment created".to_string()),
        actor_id.or(Some(customer.id)),
        now,
    )
    .await?;

    let appointment = get_appointment_details(&txn, created.id).await?;
    txn.commit().await?;

    info!(
        appointment_id = created.id,
        customer_id = customer.id,
        start = %scheduled_start,
        "Booking created"
    );

    Ok(BookingOutcome {
        appointment,
        credentials,
        requested_payment_method: request.payment_method,
    })
}

//! Service catalogue - bookable services and the consumables each one uses.
//!
//! Requirements keep their submission order in `position`; settlement walks them in that order.

use crate::{
    entities::{Inventory, Service, ServiceRequirement, inventory, service, service_requirement},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument};

use super::{clean_text, whole_seconds};

/// Shortest bookable service
pub const MIN_DURATION_MINUTES: i32 = 15;

/// One consumable line of a new service.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementInput {
    pub inventory_id: i64,
    pub quantity: i64,
}

/// Request to add a service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub price_cents: i64,
    #[serde(default)]
    pub requirements: Vec<RequirementInput>,
}

/// A requirement joined with its inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementDetails {
    pub inventory_id: i64,
    pub name: String,
    pub unit: String,
    pub quantity: i64,
}

/// A service with its ordered requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetails {
    #[serde(flatten)]
    pub service: service::Model,
    pub requirements: Vec<RequirementDetails>,
}

fn validate(request: &NewService) -> Result<()> {
    if request.name.trim().is_empty() {
        return Err(Error::validation("Service name is required"));
    }
    if request.duration_minutes < MIN_DURATION_MINUTES {
        return Err(Error::validation(format!(
            "Service duration must be at least {MIN_DURATION_MINUTES} minutes"
        )));
    }
    if request.price_cents < 0 {
        return Err(Error::validation("Service price cannot be negative"));
    }

    let mut seen = HashSet::new();
    for requirement in &request.requirements {
        if requirement.quantity < 1 {
            return Err(Error::validation("Requirement quantity must be at least 1"));
        }
        if !seen.insert(requirement.inventory_id) {
            return Err(Error::validation(format!(
                "Inventory item {} is listed more than once",
                requirement.inventory_id
            )));
        }
    }
    Ok(())
}

/// Creates a service together with its inventory requirements.
///
/// # Errors
/// Returns an error if:
/// - The name is blank, duration is under 15 minutes or price is negative
/// - A requirement has a quantity below 1 or repeats an inventory item
/// - A referenced inventory item does not exist
/// - The database operation fails
#[instrument(skip(db, request), fields(name = %request.name))]
pub async fn create_service(
    db: &DatabaseConnection,
    request: NewService,
    now: DateTime<Utc>,
) -> Result<ServiceDetails> {
    validate(&request)?;

    let txn = db.begin().await?;

    let created = service::ActiveModel {
        name: Set(request.name.trim().to_string()),
        description: Set(clean_text(request.description)),
        duration_minutes: Set(request.duration_minutes),
        price_cents: Set(request.price_cents),
        is_active: Set(true),
        created_at: Set(whole_seconds(now)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut requirements = Vec::with_capacity(request.requirements.len());
    for (position, input) in (0_i32..).zip(&request.requirements) {
        let item = super::inventory::get_inventory_item(&txn, input.inventory_id).await?;

        service_requirement::ActiveModel {
            service_id: Set(created.id),
            inventory_id: Set(item.id),
            quantity: Set(input.quantity),
            position: Set(position),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        requirements.push(RequirementDetails {
            inventory_id: item.id,
            name: item.name,
            unit: item.unit,
            quantity: input.quantity,
        });
    }

    txn.commit().await?;
    info!(id = created.id, requirements = requirements.len(), "Service created");

    Ok(ServiceDetails {
        service: created,
        requirements,
    })
}

/// Looks up a bookable service.
///
/// Inactive services are reported as missing.
pub async fn get_active_service<C>(db: &C, id: i64) -> Result<service::Model>
where
    C: ConnectionTrait,
{
    Service::find_by_id(id)
        .filter(service::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Service", id))
}

/// Requirements of a service in position order, each with its inventory item.
pub async fn load_requirements<C>(
    db: &C,
    service_id: i64,
) -> Result<Vec<(service_requirement::Model, inventory::Model)>>
where
    C: ConnectionTrait,
{
    let rows = ServiceRequirement::find()
        .filter(service_requirement::Column::ServiceId.eq(service_id))
        .find_also_related(Inventory)
        .order_by_asc(service_requirement::Column::Position)
        .all(db)
        .await?;

    rows.into_iter()
        .map(|(requirement, item)| match item {
            Some(item) => Ok((requirement, item)),
            None => Err(Error::not_found("Inventory item", requirement.inventory_id)),
        })
        .collect()
}

pub async fn list_active_services(db: &DatabaseConnection) -> Result<Vec<service::Model>> {
    Service::find()
        .filter(service::Column::IsActive.eq(true))
        .order_by_asc(service::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// An active service with its requirements.
pub async fn get_service_details(db: &DatabaseConnection, id: i64) -> Result<ServiceDetails> {
    let service = get_active_service(db, id).await?;
    let requirements = load_requirements(db, id)
        .await?
        .into_iter()
        .map(|(requirement, item)| RequirementDetails {
            inventory_id: item.id,
            name: item.name,
            unit: item.unit,
            quantity: requirement.quantity,
        })
        .collect();

    Ok(ServiceDetails {
        service,
        requirements,
    })
}

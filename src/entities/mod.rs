//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod appointment;
pub mod appointment_event;
pub mod blocked_range;
pub mod inventory;
pub mod inventory_adjustment;
pub mod payment;
pub mod service;
pub mod service_requirement;
pub mod settings;
pub mod slot_limit;
pub mod user;

// Re-export specific types to avoid conflicts
pub use appointment::{AppointmentStatus, Entity as Appointment, Model as AppointmentModel};
pub use appointment_event::{Entity as AppointmentEvent, Model as AppointmentEventModel};
pub use blocked_range::{Entity as BlockedRange, Model as BlockedRangeModel};
pub use inventory::{Entity as Inventory, Model as InventoryModel};
pub use inventory_adjustment::{Entity as InventoryAdjustment, Model as InventoryAdjustmentModel};
pub use payment::{
    Entity as Payment, Model as PaymentModel, PaymentMethod, PaymentStatus,
};
pub use service::{Entity as Service, Model as ServiceModel};
pub use service_requirement::{Entity as ServiceRequirement, Model as ServiceRequirementModel};
pub use settings::{Entity as Settings, Model as SettingsModel};
pub use slot_limit::{Entity as SlotLimit, Model as SlotLimitModel};
pub use user::{Entity as User, Model as UserModel, Role};

/// Application configuration from config.toml and environment variables
pub mod app;

/// Booking defaults and the salon timezone
pub mod booking;

/// Database configuration and connection management
pub mod database;

pub use app::{AppConfig, load_app_configuration};
pub use booking::BookingPolicy;

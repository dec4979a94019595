//! TimescaleDB log store configuration loading and validation.
//!
//! This crate provides:
//! - Typed settings for the store (TOML file, environment, host-supplied map)
//! - The validated, immutable [`ConnectionConfig`] the client connects with
//! - Settings resolution (CLI → env → XDG → system → none)
//! - A request-scoped context for validating a single settings save

pub mod resolve;
pub mod save;
pub mod settings;
pub mod validate;

pub use resolve::{load_settings, load_settings_with, resolve_settings_path, ConfigSource};
pub use save::{validate_for_save, SettingsSaveContext};
pub use settings::{ConnectionConfig, StoreSettings, WriteMode, REQUIRED_KEYS};
pub use validate::{ValidationError, ValidationResult};

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

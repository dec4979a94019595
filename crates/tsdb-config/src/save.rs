//! Validation for a single settings save.
//!
//! A host typically saves several settings in one submission and validates
//! each of them; the connection test must still run only once per
//! submission. [`SettingsSaveContext`] carries that state for exactly one
//! save: create it when the save starts, pass it to every validation call,
//! drop it when the save ends.

use tracing::{info, warn};

use crate::settings::{ConnectionConfig, StoreSettings};
use crate::validate::{ValidationError, ValidationResult};

/// State scoped to one settings save.
#[derive(Debug, Default)]
pub struct SettingsSaveContext {
    connection_test: Option<Result<(), String>>,
    tests_run: u32,
}

impl SettingsSaveContext {
    /// Start a new save.
    pub fn begin() -> Self {
        Self::default()
    }

    /// Run `tester` against `config` unless this save already tested.
    ///
    /// Later calls return the first outcome without running `tester`.
    pub fn test_connection_once<F, E>(
        &mut self,
        config: &ConnectionConfig,
        tester: F,
    ) -> Result<(), String>
    where
        F: FnOnce(&ConnectionConfig) -> Result<(), E>,
        E: std::fmt::Display,
    {
        if let Some(outcome) = &self.connection_test {
            return outcome.clone();
        }

        self.tests_run += 1;
        let outcome = tester(config).map_err(|e| e.to_string());
        match &outcome {
            Ok(()) => info!(endpoint = %config.endpoint(), "settings connection test passed"),
            Err(e) => warn!(endpoint = %config.endpoint(), error = %e, "settings connection test failed"),
        }
        self.connection_test = Some(outcome.clone());
        outcome
    }

    /// How many connection tests this save has actually run (0 or 1).
    pub fn tests_run(&self) -> u32 {
        self.tests_run
    }

    /// Whether a connection test has completed in this save.
    pub fn tested(&self) -> bool {
        self.connection_test.is_some()
    }
}

/// Validate `settings` for saving: identity fields first, then one
/// connection test per save.
pub fn validate_for_save<F, E>(
    settings: &StoreSettings,
    ctx: &mut SettingsSaveContext,
    tester: F,
) -> ValidationResult<ConnectionConfig>
where
    F: FnOnce(&ConnectionConfig) -> Result<(), E>,
    E: std::fmt::Display,
{
    let config = settings.connection_config()?;
    ctx.test_connection_once(&config, tester)
        .map_err(ValidationError::ConnectionTest)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn settings() -> StoreSettings {
        StoreSettings {
            host: Some("db".into()),
            password: Some("pw".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_connection_tested_once_per_save() {
        let calls = Cell::new(0);
        let mut ctx = SettingsSaveContext::begin();
        for _ in 0..3 {
            validate_for_save(&settings(), &mut ctx, |_| {
                calls.set(calls.get() + 1);
                Ok::<(), String>(())
            })
            .unwrap();
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(ctx.tests_run(), 1);
        assert!(ctx.tested());
    }

    #[test]
    fn test_new_save_tests_again() {
        let calls = Cell::new(0);
        for _ in 0..2 {
            let mut ctx = SettingsSaveContext::begin();
            validate_for_save(&settings(), &mut ctx, |_| {
                calls.set(calls.get() + 1);
                Ok::<(), String>(())
            })
            .unwrap();
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_failed_test_is_cached_for_the_save() {
        let mut ctx = SettingsSaveContext::begin();
        let first = validate_for_save(&settings(), &mut ctx, |_| Err("refused"));
        assert_eq!(
            first.unwrap_err(),
            ValidationError::ConnectionTest("refused".into())
        );
        let second = validate_for_save(&settings(), &mut ctx, |_| Ok::<(), String>(()));
        assert!(second.is_err());
        assert_eq!(ctx.tests_run(), 1);
    }

    #[test]
    fn test_missing_field_skips_connection_test() {
        let mut ctx = SettingsSaveContext::begin();
        let err = validate_for_save(&StoreSettings::default(), &mut ctx, |_| {
            Ok::<(), String>(())
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("host".into()));
        assert!(!ctx.tested());
    }
}

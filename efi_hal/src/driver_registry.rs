//! Name → factory table for EFI drivers.
//!
//! Built once at startup (see [`crate::default_registry`]) and consulted by
//! the runner to pick the driver named on the command line.

use std::collections::BTreeMap;

use efi_common::hal::driver::{DriverFactory, EfiDriver, HalError};
use tracing::debug;

/// Registry of available drivers, ordered by name.
#[derive(Default)]
pub struct DriverRegistry {
    factories: BTreeMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `factory` under `name`.
    ///
    /// # Panics
    /// A second registration under the same name is a wiring bug and panics.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        let previous = self.factories.insert(name, factory);
        assert!(previous.is_none(), "Driver '{name}' is already registered");
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build a fresh, uninitialized driver.
    ///
    /// # Errors
    /// `HalError::DriverNotFound` for an unknown name.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn EfiDriver>, HalError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        let driver = factory();
        debug!("Created driver '{}' ({} v{})", name, driver.name(), driver.version());
        Ok(driver)
    }

    /// Registered names in ascending order.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

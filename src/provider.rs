//! Algorithm provider and processing registry.
//!
//! Hosts install the provider explicitly with
//! [`ProcessingRegistry::add_provider`] and remove it again on teardown;
//! nothing is registered implicitly.

use std::collections::HashMap;

use crate::algorithm::{ALGORITHM_ID, ALGORITHM_NAME, StationLinesAlgorithm};
use crate::transect::StationParameters;

pub const PROVIDER_ID: &str = "stationlines";
pub const PROVIDER_NAME: &str = "Station Lines";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("provider `{0}` is already registered")]
    DuplicateProvider(String),

    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),
}

/// Algorithms a provider can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    StationLines,
}

impl AlgorithmKind {
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::StationLines => ALGORITHM_ID,
        }
    }

    #[must_use]
    pub fn create(self, params: StationParameters) -> StationLinesAlgorithm {
        match self {
            Self::StationLines => StationLinesAlgorithm::new(params),
        }
    }
}

/// Lookup entry for an algorithm.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub names: &'static [&'static str],
    pub kind: AlgorithmKind,
}

pub const REGISTRATIONS: &[Registration] = &[Registration {
    names: &[ALGORITHM_ID, ALGORITHM_NAME, "Transects"],
    kind: AlgorithmKind::StationLines,
}];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationLinesProvider;

impl StationLinesProvider {
    #[must_use]
    pub const fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    #[must_use]
    pub const fn long_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    #[must_use]
    pub const fn algorithms(&self) -> &'static [Registration] {
        REGISTRATIONS
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingRegistry {
    providers: Vec<StationLinesProvider>,
    by_name: HashMap<String, (String, AlgorithmKind)>,
}

impl ProcessingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the station lines provider installed.
    #[must_use]
    pub fn with_default_providers() -> Self {
        let mut registry = Self::new();
        // A fresh registry cannot hold a duplicate.
        let _ = registry.add_provider(StationLinesProvider);
        registry
    }

    /// Installs `provider` and indexes its algorithms under their names and
    /// under `provider:algorithm`.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateProvider`] if a provider with the same id is present.
    pub fn add_provider(&mut self, provider: StationLinesProvider) -> Result<(), RegistryError> {
        if self.provider(provider.id()).is_some() {
            return Err(RegistryError::DuplicateProvider(provider.id().to_owned()));
        }

        for registration in provider.algorithms() {
            let qualified = format!("{}:{}", provider.id(), registration.kind.id());
            self.by_name.insert(
                normalize_name(&qualified),
                (provider.id().to_owned(), registration.kind),
            );
            for name in registration.names {
                self.by_name
                    .insert(normalize_name(name), (provider.id().to_owned(), registration.kind));
            }
        }
        log::debug!("registered processing provider `{}`", provider.id());
        self.providers.push(provider);
        Ok(())
    }

    /// Removes a provider and its algorithms. Returns `false` if it was not registered.
    pub fn remove_provider(&mut self, id: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|provider| provider.id() != id);
        self.by_name.retain(|_, (provider, _)| provider != id);
        let removed = self.providers.len() != before;
        if removed {
            log::debug!("removed processing provider `{id}`");
        }
        removed
    }

    #[must_use]
    pub fn provider(&self, id: &str) -> Option<&StationLinesProvider> {
        self.providers.iter().find(|provider| provider.id() == id)
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<AlgorithmKind> {
        self.by_name.get(&normalize_name(name)).map(|(_, kind)| *kind)
    }

    /// Instantiates an algorithm by name.
    ///
    /// # Errors
    /// Returns [`RegistryError::UnknownAlgorithm`] if no provider offers `name`.
    pub fn create_algorithm(
        &self,
        name: &str,
        params: StationParameters,
    ) -> Result<StationLinesAlgorithm, RegistryError> {
        self.resolve(name)
            .map(|kind| kind.create(params))
            .ok_or_else(|| RegistryError::UnknownAlgorithm(name.to_owned()))
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id_name_and_qualified_name() {
        let registry = ProcessingRegistry::with_default_providers();
        for name in ["stationlines", "Transect at fixed distance", "STATIONLINES:stationlines"] {
            assert_eq!(registry.resolve(name), Some(AlgorithmKind::StationLines));
        }
        assert_eq!(registry.resolve("buffer"), None);
    }

    #[test]
    fn duplicate_provider_is_rejected() {
        let mut registry = ProcessingRegistry::with_default_providers();
        assert_eq!(
            registry.add_provider(StationLinesProvider),
            Err(RegistryError::DuplicateProvider("stationlines".to_owned()))
        );
    }

    #[test]
    fn remove_provider_unregisters_algorithms() {
        let mut registry = ProcessingRegistry::with_default_providers();
        assert!(registry.remove_provider(PROVIDER_ID));
        assert!(!registry.remove_provider(PROVIDER_ID));
        assert!(registry.provider(PROVIDER_ID).is_none());
        assert!(matches!(
            registry.create_algorithm("stationlines", StationParameters::default()),
            Err(RegistryError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn created_algorithm_carries_parameters() {
        let registry = ProcessingRegistry::with_default_providers();
        let params = StationParameters::new(12.5);
        let algorithm = registry.create_algorithm("Transects", params).unwrap();
        assert_eq!(algorithm.params(), &params);
        assert_eq!(algorithm.display_name(), "Transect at fixed distance");
    }
}

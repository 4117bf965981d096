//! Dependent services and their resolved addresses

use exposure_api::{service_name, NfType};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;

/// A service type this instance calls
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dependency {
    PolicyAuthorization,
    DataRepository,
}

impl Dependency {
    pub const ALL: [Dependency; 2] = [Dependency::PolicyAuthorization, Dependency::DataRepository];

    /// Cache key / logging name
    pub fn name(&self) -> &'static str {
        match self {
            Dependency::PolicyAuthorization => "policy-authorization",
            Dependency::DataRepository => "data-repository",
        }
    }

    /// Service name the registry is queried with
    pub fn service_name(&self) -> &'static str {
        match self {
            Dependency::PolicyAuthorization => service_name::NPCF_POLICYAUTHORIZATION,
            Dependency::DataRepository => service_name::NUDR_DR,
        }
    }

    /// Network function type that hosts the service
    pub fn nf_type(&self) -> NfType {
        match self {
            Dependency::PolicyAuthorization => NfType::Pcf,
            Dependency::DataRepository => NfType::Udr,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved base address per dependency, at most one entry each.
///
/// Entries are only written after a successful discovery and only removed by
/// an explicit `remove`.
pub struct AddressCache {
    entries: RwLock<HashMap<Dependency, String>>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, dependency: Dependency) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(&dependency).cloned()
    }

    pub async fn insert(&self, dependency: Dependency, address: String) {
        let mut entries = self.entries.write().await;
        debug!("Cached address for {}: {}", dependency, address);
        entries.insert(dependency, address);
    }

    pub async fn remove(&self, dependency: Dependency) -> Option<String> {
        let mut entries = self.entries.write().await;
        entries.remove(&dependency)
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_names() {
        assert_eq!(Dependency::PolicyAuthorization.name(), "policy-authorization");
        assert_eq!(
            Dependency::PolicyAuthorization.service_name(),
            "npcf-policyauthorization"
        );
        assert_eq!(Dependency::DataRepository.nf_type(), NfType::Udr);
    }

    #[tokio::test]
    async fn test_cache_single_entry_per_dependency() {
        let cache = AddressCache::new();
        assert_eq!(cache.get(Dependency::DataRepository).await, None);

        cache
            .insert(Dependency::DataRepository, "http://10.0.0.1:8000".into())
            .await;
        cache
            .insert(Dependency::DataRepository, "http://10.0.0.2:8000".into())
            .await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(
            cache.get(Dependency::DataRepository).await.as_deref(),
            Some("http://10.0.0.2:8000")
        );

        assert!(cache.remove(Dependency::DataRepository).await.is_some());
        assert_eq!(cache.get(Dependency::DataRepository).await, None);
    }
}

//! Dependency address resolution through registry discovery
//!
//! Addresses are cached per dependency until explicitly invalidated. Each
//! dependency has its own address-keyed pool of client handles, kept apart
//! from the cache so that dropping a cached address never tears down a
//! handle another caller still holds.

use crate::{ClientPool, DiscoveryQuery, ExposureMetrics, NrfClient, ServiceClient};
use exposure_api::NfStatus;
use exposure_core::{AddressCache, CoreError, Dependency, NfContext, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DependencyResolver {
    context: Arc<NfContext>,
    nrf: Arc<dyn NrfClient>,
    cache: AddressCache,
    clients: HashMap<Dependency, ClientPool>,
    metrics: Option<ExposureMetrics>,
}

impl DependencyResolver {
    pub fn new(context: Arc<NfContext>, nrf: Arc<dyn NrfClient>, http: reqwest::Client) -> Self {
        Self {
            context,
            nrf,
            cache: AddressCache::new(),
            clients: Dependency::ALL
                .into_iter()
                .map(|dependency| (dependency, ClientPool::with_http(http.clone())))
                .collect(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ExposureMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Base address of `dependency`, from cache or a discovery query
    pub async fn resolve_address(&self, dependency: Dependency) -> Result<String> {
        if let Some(address) = self.cache.get(dependency).await {
            return Ok(address);
        }

        let query = DiscoveryQuery {
            target_nf_type: dependency.nf_type(),
            requester_nf_type: self.context.nf_type(),
            service_names: vec![dependency.service_name().to_string()],
        };

        let result = match self.nrf.search(&self.context.nrf_uri(), &query).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Discovery for {} failed: {}", dependency, e);
                self.record(dependency, "failed");
                return Err(CoreError::DiscoveryFailed {
                    dependency: dependency.name().to_string(),
                    problem: e.into_problem(),
                });
            }
        };

        let address = result.nf_instances.iter().find_map(|profile| {
            profile.service_uri(dependency.service_name(), NfStatus::Registered)
        });

        match address {
            Some(address) => {
                info!("Resolved {} at {}", dependency, address);
                self.record(dependency, "found");
                self.cache.insert(dependency, address.clone()).await;
                Ok(address)
            }
            None => {
                warn!(
                    "No registered {} among {} discovered instances",
                    dependency.service_name(),
                    result.nf_instances.len()
                );
                self.record(dependency, "not_found");
                Err(CoreError::DependencyNotFound(dependency.name().to_string()))
            }
        }
    }

    /// Pooled client handle for an address of `dependency`
    pub async fn client(
        &self,
        dependency: Dependency,
        address: &str,
    ) -> Result<Arc<ServiceClient>> {
        let pool = self
            .clients
            .get(&dependency)
            .ok_or_else(|| CoreError::Internal(format!("no client pool for {}", dependency)))?;
        pool.get(address)
            .await
            .map_err(|e| CoreError::Internal(e.to_string()))
    }

    /// Resolve `dependency` and return the client handle for its address
    pub async fn resolve_client(&self, dependency: Dependency) -> Result<Arc<ServiceClient>> {
        let address = self.resolve_address(dependency).await?;
        self.client(dependency, &address).await
    }

    /// Drop the cached address so the next resolution queries the registry.
    ///
    /// Pooled client handles are kept.
    pub async fn invalidate(&self, dependency: Dependency) {
        if let Some(address) = self.cache.remove(dependency).await {
            debug!("Invalidated {} address {}", dependency, address);
        }
    }

    pub async fn cached_address(&self, dependency: Dependency) -> Option<String> {
        self.cache.get(dependency).await
    }

    fn record(&self, dependency: Dependency, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.discovery(dependency.name(), outcome);
        }
    }
}

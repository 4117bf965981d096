//! Prometheus metrics for registration, discovery and notification delivery

use anyhow::Result;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics shared by the broker components. Clones share one registry.
#[derive(Clone)]
pub struct ExposureMetrics {
    /// Registration attempts by outcome (success, failure)
    pub registration_attempts_total: IntCounterVec,
    /// Discovery queries by dependency and outcome (found, not_found, failed)
    pub discovery_requests_total: IntCounterVec,
    /// Subscriptions currently tracked
    pub subscriptions_active: IntGauge,
    /// Notification deliveries by outcome (delivered, rejected, failed, panicked)
    pub notifications_total: IntCounterVec,
    pub registry: Arc<Registry>,
}

impl ExposureMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let registration_attempts_total = IntCounterVec::new(
            Opts::new(
                "registration_attempts_total",
                "Registration attempts against the registry",
            ),
            &["outcome"],
        )?;

        let discovery_requests_total = IntCounterVec::new(
            Opts::new(
                "discovery_requests_total",
                "Discovery queries issued for dependencies",
            ),
            &["dependency", "outcome"],
        )?;

        let subscriptions_active =
            IntGauge::new("subscriptions_active", "Change-notification subscriptions")?;

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Notification deliveries to subscribers"),
            &["outcome"],
        )?;

        registry.register(Box::new(registration_attempts_total.clone()))?;
        registry.register(Box::new(discovery_requests_total.clone()))?;
        registry.register(Box::new(subscriptions_active.clone()))?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            registration_attempts_total,
            discovery_requests_total,
            subscriptions_active,
            notifications_total,
            registry,
        })
    }

    pub fn registration_attempt(&self, outcome: &str) {
        self.registration_attempts_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn discovery(&self, dependency: &str, outcome: &str) {
        self.discovery_requests_total
            .with_label_values(&[dependency, outcome])
            .inc();
    }

    pub fn notification(&self, outcome: &str) {
        self.notifications_total.with_label_values(&[outcome]).inc();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

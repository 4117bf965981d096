//! Change-notification fan-out to subscribers
//!
//! Changes are collected per topic in a `ChangeBatch` and flushed as one
//! delivery per affected subscriber. Deliveries run as independent tasks; a
//! failing or panicking delivery affects no other delivery and never reaches
//! the caller of `flush`.

use crate::{client, ExposureMetrics, SbiError, TokenSource};
use async_trait::async_trait;
use exposure_api::{service_name, NfType, PfdChangeNotification};
use exposure_core::{Result, Subscription, SubscriptionRegistry};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Delivers a notification list to one callback address
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn notify(
        &self,
        notify_uri: &str,
        notifications: &[PfdChangeNotification],
    ) -> std::result::Result<(), SbiError>;
}

/// Posts notification lists as JSON to the subscriber's callback
pub struct HttpNotifySink {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

impl HttpNotifySink {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenSource>) -> Self {
        Self { http, tokens }
    }
}

#[async_trait]
impl NotifySink for HttpNotifySink {
    async fn notify(
        &self,
        notify_uri: &str,
        notifications: &[PfdChangeNotification],
    ) -> std::result::Result<(), SbiError> {
        let token = self
            .tokens
            .token(service_name::NNEF_PFDMANAGEMENT, NfType::Af)
            .await?;

        let request = self.http.post(notify_uri).json(notifications);
        client::send(request, token.as_deref()).await?;
        Ok(())
    }
}

pub struct PfdChangeNotifier {
    registry: SubscriptionRegistry,
    sink: Arc<dyn NotifySink>,
    metrics: Option<ExposureMetrics>,
}

impl PfdChangeNotifier {
    pub fn new(sink: Arc<dyn NotifySink>) -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            sink,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ExposureMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub async fn subscribe(&self, topics: &[String], notify_uri: &str) -> Result<String> {
        let id = self.registry.subscribe(topics, notify_uri).await?;
        info!("Subscription [{}] added for {} topics", id, topics.len());
        self.update_gauge().await;
        Ok(id)
    }

    pub async fn unsubscribe(&self, id: &str) -> Result<()> {
        self.registry.unsubscribe(id).await?;
        info!("Subscription [{}] removed", id);
        self.update_gauge().await;
        Ok(())
    }

    pub async fn subscription(&self, id: &str) -> Result<Subscription> {
        self.registry.get(id).await
    }

    /// Start collecting changes for one fan-out pass
    pub fn begin_change_batch(&self) -> ChangeBatch<'_> {
        ChangeBatch {
            notifier: self,
            notifications: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    async fn update_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            let count = self.registry.subscription_count().await;
            metrics.subscriptions_active.set(count as i64);
        }
    }
}

/// Topic changes accumulated between `begin_change_batch` and `flush`
pub struct ChangeBatch<'a> {
    notifier: &'a PfdChangeNotifier,
    notifications: HashMap<String, PfdChangeNotification>,
    /// Subscription id to its changed topics, in recording order
    pending: HashMap<String, Vec<String>>,
}

impl ChangeBatch<'_> {
    /// Record the latest change for `topic`.
    ///
    /// A topic recorded twice keeps the second payload and its first position,
    /// so each subscriber receives it once rather than once per recording.
    pub async fn record_change(&mut self, topic: &str, change: PfdChangeNotification) {
        self.notifications.insert(topic.to_string(), change);

        for id in self.notifier.registry.subscribers(topic).await {
            let topics = self.pending.entry(id).or_default();
            if !topics.iter().any(|t| t == topic) {
                topics.push(topic.to_string());
            }
        }
    }

    /// Number of subscribers that would receive a delivery
    pub fn pending_deliveries(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_topics(&self, id: &str) -> &[String] {
        self.pending.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dispatch one delivery per pending subscriber without waiting for them.
    ///
    /// Subscriptions removed since their changes were recorded are skipped.
    /// The returned handles complete when the deliveries finish; they never
    /// carry an error.
    pub async fn flush(self) -> Vec<JoinHandle<()>> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let uris = self.notifier.registry.notify_uris(self.pending.keys()).await;
        let mut handles = Vec::with_capacity(uris.len());

        for (id, topics) in self.pending {
            let Some(notify_uri) = uris.get(&id).cloned() else {
                debug!("Subscription [{}] removed before flush", id);
                continue;
            };

            let payloads: Vec<PfdChangeNotification> = topics
                .iter()
                .filter_map(|topic| self.notifications.get(topic).cloned())
                .collect();

            let sink = self.notifier.sink.clone();
            let metrics = self.notifier.metrics.clone();
            handles.push(tokio::spawn(async move {
                let delivery = AssertUnwindSafe(sink.notify(&notify_uri, &payloads))
                    .catch_unwind()
                    .await;

                let outcome = match delivery {
                    Ok(Ok(())) => {
                        debug!(
                            "Delivered {} notifications to [{}] at {}",
                            payloads.len(),
                            id,
                            notify_uri
                        );
                        "delivered"
                    }
                    Ok(Err(SbiError::Remote(problem))) => {
                        warn!("Notification to [{}] rejected: {}", id, problem);
                        "rejected"
                    }
                    Ok(Err(e)) => {
                        warn!("Notification to [{}] failed: {}", id, e);
                        "failed"
                    }
                    Err(_) => {
                        error!("Notification to [{}] panicked", id);
                        "panicked"
                    }
                };

                if let Some(metrics) = metrics {
                    metrics.notification(outcome);
                }
            }));
        }

        handles
    }
}

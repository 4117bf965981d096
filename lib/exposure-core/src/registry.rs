//! Subscription registry for change notifications
//!
//! Two indexes are kept in step under one lock: subscription id to callback
//! address, and topic (application id) to the set of subscribed ids.

use crate::{CoreError, Result};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// A tracked subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub notify_uri: String,
    /// Sorted topic list
    pub topics: Vec<String>,
}

#[derive(Default)]
struct Indexes {
    last_id: u64,
    notify_uris: HashMap<String, String>,
    topics: HashMap<String, HashSet<String>>,
}

/// SubscriptionRegistry maintains subscribers and the topics they watch
pub struct SubscriptionRegistry {
    indexes: RwLock<Indexes>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(Indexes::default()),
        }
    }

    /// Add a subscription and return its id.
    ///
    /// Ids are decimal strings of a counter that is never rewound. An empty
    /// topic list registers the callback without indexing it under any topic.
    pub async fn subscribe(&self, topics: &[String], notify_uri: &str) -> Result<String> {
        if notify_uri.is_empty() {
            return Err(CoreError::InvalidSubscription(
                "Absent of Notify URI".to_string(),
            ));
        }

        let mut indexes = self.indexes.write().await;
        indexes.last_id += 1;
        let id = indexes.last_id.to_string();

        indexes
            .notify_uris
            .insert(id.clone(), notify_uri.to_string());
        for topic in topics {
            indexes
                .topics
                .entry(topic.clone())
                .or_default()
                .insert(id.clone());
        }

        debug!(subscription_id = %id, topics = topics.len(), "Added subscription");
        Ok(id)
    }

    /// Remove a subscription from both indexes
    pub async fn unsubscribe(&self, id: &str) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        if indexes.notify_uris.remove(id).is_none() {
            return Err(CoreError::SubscriptionNotFound(id.to_string()));
        }

        indexes.topics.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });

        debug!(subscription_id = %id, "Removed subscription");
        Ok(())
    }

    /// Ids currently subscribed to `topic`
    pub async fn subscribers(&self, topic: &str) -> Vec<String> {
        let indexes = self.indexes.read().await;
        indexes
            .topics
            .get(topic)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn notify_uri(&self, id: &str) -> Option<String> {
        let indexes = self.indexes.read().await;
        indexes.notify_uris.get(id).cloned()
    }

    /// Callback addresses of every id in `ids` that is still subscribed
    pub async fn notify_uris<'a, I>(&self, ids: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let indexes = self.indexes.read().await;
        ids.into_iter()
            .filter_map(|id| {
                indexes
                    .notify_uris
                    .get(id)
                    .map(|uri| (id.clone(), uri.clone()))
            })
            .collect()
    }

    /// Get a subscription with its topics
    pub async fn get(&self, id: &str) -> Result<Subscription> {
        let indexes = self.indexes.read().await;
        let notify_uri = indexes
            .notify_uris
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::SubscriptionNotFound(id.to_string()))?;

        let mut topics: Vec<String> = indexes
            .topics
            .iter()
            .filter(|(_, ids)| ids.contains(id))
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();

        Ok(Subscription {
            id: id.to_string(),
            notify_uri,
            topics,
        })
    }

    pub async fn subscription_count(&self) -> usize {
        let indexes = self.indexes.read().await;
        indexes.notify_uris.len()
    }

    pub async fn topic_count(&self) -> usize {
        let indexes = self.indexes.read().await;
        indexes.topics.len()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

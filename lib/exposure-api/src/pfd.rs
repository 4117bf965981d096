//! Packet flow description subscriptions and change notifications

use serde::{Deserialize, Serialize};

/// Subscription request: callback address plus the application identifiers of interest
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdSubscription {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub application_ids: Vec<String>,
    #[serde(default)]
    pub notify_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<String>,
}

/// A single packet flow description
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfd_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_descriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_names: Vec<String>,
}

/// Change payload for one application identifier
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdChangeNotification {
    pub application_id: String,
    /// All PFDs of the application were removed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remove_all: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pfds: Vec<PfdContent>,
}

impl PfdChangeNotification {
    pub fn updated(application_id: impl Into<String>, pfds: Vec<PfdContent>) -> Self {
        Self {
            application_id: application_id.into(),
            remove_all: false,
            pfds,
        }
    }

    pub fn removed(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            remove_all: true,
            pfds: Vec::new(),
        }
    }
}

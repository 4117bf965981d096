//! Outbound service-based interface of the exposure broker
pub mod client;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod nrf;
pub mod oauth;
pub mod registration;
pub mod resolver;

pub use client::{ClientPool, SbiResponse, ServiceClient};
pub use error::SbiError;
pub use metrics::ExposureMetrics;
pub use notifier::{ChangeBatch, HttpNotifySink, NotifySink, PfdChangeNotifier};
pub use nrf::{DiscoveryQuery, HttpNrfClient, NrfClient, RegisterOutcome};
pub use oauth::{NrfTokenSource, TokenSource};
pub use registration::{Registration, RegistrationManager};
pub use resolver::DependencyResolver;

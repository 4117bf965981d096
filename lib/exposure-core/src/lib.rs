//! Core state of the exposure broker
//!
//! This library provides:
//! - The process-wide instance context (self profile inputs, registry address, OAuth flag)
//! - Configuration file model and validation
//! - Dependency names and the resolved-address cache
//! - The subscription registry backing change notifications

pub mod config;
pub mod context;
pub mod dependency;
pub mod error;
pub mod registry;

pub use config::Config;
pub use context::NfContext;
pub use dependency::{AddressCache, Dependency};
pub use error::{CoreError, Result};
pub use registry::{Subscription, SubscriptionRegistry};

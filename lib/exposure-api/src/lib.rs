//! Wire models exchanged with the registry, dependent services and subscribers
//!
//! This library defines the service-based interface payloads used by the broker:
//! - NfProfile / NfService: instance profiles registered with and discovered from the registry
//! - SearchResult: discovery query results
//! - ProblemDetails: structured error bodies, preserved end-to-end
//! - PfdSubscription / PfdChangeNotification: change-notification subscriptions and payloads
//! - AccessTokenRsp: OAuth2 client-credentials token responses

pub mod nf_profile;
pub mod oauth;
pub mod pfd;
pub mod problem;

pub use nf_profile::{
    service_name, IpEndPoint, NfProfile, NfService, NfServiceVersion, NfStatus, NfType,
    SearchResult, TransportProtocol, UriScheme,
};
pub use oauth::AccessTokenRsp;
pub use pfd::{PfdChangeNotification, PfdContent, PfdSubscription};
pub use problem::ProblemDetails;

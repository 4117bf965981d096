use serde::{Deserialize, Serialize};
use std::fmt;

/// Service names used on the service-based interface
pub mod service_name {
    pub const NNRF_NFM: &str = "nnrf-nfm";
    pub const NNRF_DISC: &str = "nnrf-disc";
    pub const NPCF_POLICYAUTHORIZATION: &str = "npcf-policyauthorization";
    pub const NUDR_DR: &str = "nudr-dr";
    pub const NNEF_PFDMANAGEMENT: &str = "nnef-pfdmanagement";
    pub const NNEF_OAM: &str = "nnef-oam";
}

/// Network function type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfType {
    Nef,
    Nrf,
    Pcf,
    Udr,
    Smf,
    Af,
    /// Any type this broker does not call
    #[serde(other)]
    Unknown,
}

impl NfType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NfType::Nef => "NEF",
            NfType::Nrf => "NRF",
            NfType::Pcf => "PCF",
            NfType::Udr => "UDR",
            NfType::Smf => "SMF",
            NfType::Af => "AF",
            NfType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for NfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration status of an instance or of one of its services
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NfStatus {
    #[default]
    Registered,
    Suspended,
    Undiscoverable,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UriScheme {
    Http,
    #[default]
    Https,
}

impl UriScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UriScheme::Http => "http",
            UriScheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            UriScheme::Http => 80,
            UriScheme::Https => 443,
        }
    }
}

impl fmt::Display for UriScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportProtocol {
    #[default]
    Tcp,
    #[serde(other)]
    Unknown,
}

/// One API version exposed by a service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfServiceVersion {
    pub api_version_in_uri: String,
    pub api_full_version: String,
}

/// Transport endpoint of a service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpEndPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// A service exposed by a network function instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfService {
    pub service_instance_id: String,
    pub service_name: String,
    #[serde(default)]
    pub versions: Vec<NfServiceVersion>,
    #[serde(default)]
    pub scheme: UriScheme,
    pub nf_service_status: NfStatus,
    /// Base address ("scheme://host:port") the service is reachable at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_end_points: Vec<IpEndPoint>,
}

/// Profile of a network function instance as stored by the registry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfProfile {
    pub nf_instance_id: String,
    pub nf_type: NfType,
    pub nf_status: NfStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv4_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nf_services: Vec<NfService>,
    /// Registry-defined metadata, e.g. `{"oauth2": true}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_info: Option<serde_json::Map<String, serde_json::Value>>,
}

impl NfProfile {
    /// Base address of the first service named `name` in state `status`.
    ///
    /// `apiPrefix` wins when set; otherwise the address is built from the
    /// service's first IP endpoint, falling back to the profile's first IPv4
    /// address when the endpoint carries none.
    pub fn service_uri(&self, name: &str, status: NfStatus) -> Option<String> {
        self.nf_services
            .iter()
            .filter(|svc| svc.service_name == name && svc.nf_service_status == status)
            .find_map(|svc| self.service_base_uri(svc))
    }

    fn service_base_uri(&self, svc: &NfService) -> Option<String> {
        if let Some(prefix) = svc.api_prefix.as_deref().filter(|p| !p.is_empty()) {
            return Some(prefix.to_string());
        }

        let endpoint = svc.ip_end_points.first()?;
        let host = endpoint
            .ipv4_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .or_else(|| self.ipv4_addresses.first().map(String::as_str))?;
        let port = endpoint.port.unwrap_or_else(|| svc.scheme.default_port());

        Some(format!("{}://{}:{}", svc.scheme, host, port))
    }

    /// Boolean entry of `customInfo`, if present
    pub fn custom_flag(&self, key: &str) -> Option<bool> {
        self.custom_info.as_ref()?.get(key)?.as_bool()
    }
}

/// Result of a discovery query
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_period: Option<u32>,
    #[serde(default)]
    pub nf_instances: Vec<NfProfile>,
}

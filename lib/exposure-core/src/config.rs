//! Configuration file model
//!
//! The file is YAML with three sections: `info`, `configuration` and `logger`.

use crate::{CoreError, Result};
use exposure_api::{service_name, UriScheme};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const EXPECTED_CONFIG_VERSION: &str = "1.0.1";
pub const DEFAULT_CONFIG_PATH: &str = "./config/nefcfg.yaml";
pub const SBI_DEFAULT_IPV4: &str = "127.0.0.5";
pub const SBI_DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_NRF_URI: &str = "https://127.0.0.10:8000";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    pub info: Info,
    pub configuration: Configuration,
    #[serde(default)]
    pub logger: Logger,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Info {
    pub version: String,
    #[serde(default)]
    pub description: String,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            version: EXPECTED_CONFIG_VERSION.to_string(),
            description: "exposure broker configuration".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Name given to this instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nef_name: Option<String>,
    /// Fixed instance id; a random one is generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nf_instance_id: Option<String>,
    #[serde(default)]
    pub sbi: Sbi,
    #[serde(default = "default_nrf_uri")]
    pub nrf_uri: String,
    /// Registry certificate, required when the registry demands OAuth2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nrf_cert_pem: Option<String>,
    #[serde(default)]
    pub service_list: Vec<ServiceEntry>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            nef_name: None,
            nf_instance_id: None,
            sbi: Sbi::default(),
            nrf_uri: default_nrf_uri(),
            nrf_cert_pem: None,
            service_list: vec![ServiceEntry {
                service_name: service_name::NNEF_PFDMANAGEMENT.to_string(),
                supp_feat: None,
            }],
        }
    }
}

fn default_nrf_uri() -> String {
    DEFAULT_NRF_URI.to_string()
}

/// Service-based interface settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sbi {
    #[serde(default)]
    pub scheme: UriScheme,
    /// Address advertised to the registry
    #[serde(rename = "registerIPv4", default)]
    pub register_ipv4: String,
    /// Address the HTTP server binds to
    #[serde(rename = "bindingIPv4", default)]
    pub binding_ipv4: String,
    #[serde(default = "default_sbi_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Tls>,
}

impl Default for Sbi {
    fn default() -> Self {
        Self {
            scheme: UriScheme::Https,
            register_ipv4: SBI_DEFAULT_IPV4.to_string(),
            binding_ipv4: SBI_DEFAULT_IPV4.to_string(),
            port: SBI_DEFAULT_PORT,
            tls: None,
        }
    }
}

fn default_sbi_port() -> u16 {
    SBI_DEFAULT_PORT
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tls {
    pub pem: String,
    pub key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supp_feat: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logger {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub report_caller: bool,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            enable: true,
            level: default_log_level(),
            report_caller: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Read, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.info.version != EXPECTED_CONFIG_VERSION {
            return Err(CoreError::Configuration(format!(
                "config version should be {}, got {}",
                EXPECTED_CONFIG_VERSION, self.info.version
            )));
        }

        if self.configuration.nrf_uri.is_empty() {
            return Err(CoreError::Configuration("nrfUri is required".to_string()));
        }

        for (i, svc) in self.configuration.service_list.iter().enumerate() {
            match svc.service_name.as_str() {
                service_name::NNEF_PFDMANAGEMENT | service_name::NNEF_OAM => {}
                other => {
                    return Err(CoreError::Configuration(format!(
                        "invalid serviceList[{}]: {}, should be {} or {}",
                        i,
                        other,
                        service_name::NNEF_PFDMANAGEMENT,
                        service_name::NNEF_OAM
                    )))
                }
            }
        }

        if !LOG_LEVELS.contains(&self.logger.level.as_str()) {
            return Err(CoreError::Configuration(format!(
                "invalid logger level: {}",
                self.logger.level
            )));
        }

        Ok(())
    }

    /// "scheme://registerIPv4:port"
    pub fn sbi_uri(&self) -> String {
        let sbi = &self.configuration.sbi;
        format!("{}://{}:{}", sbi.scheme, sbi.register_ipv4, sbi.port)
    }

    /// "bindingIPv4:port"
    pub fn binding_addr(&self) -> String {
        let sbi = &self.configuration.sbi;
        format!("{}:{}", sbi.binding_ipv4, sbi.port)
    }

    /// Resource prefix of one of this instance's services
    pub fn service_uri(&self, name: &str) -> String {
        format!("{}/{}/v1", self.sbi_uri(), name)
    }

    /// "v" followed by the major part of the config version
    pub fn api_version_in_uri(&self) -> String {
        let major = self.info.version.split('.').next().unwrap_or("1");
        format!("v{}", major)
    }
}

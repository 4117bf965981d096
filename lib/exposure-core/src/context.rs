//! Process-wide instance context
//!
//! Built once by the entry point and handed to every component by `Arc`.
//! Only the registry address, the confirmed instance id, the registration
//! flag and the OAuth flag change after construction.

use crate::config::Config;
use exposure_api::{
    IpEndPoint, NfService, NfServiceVersion, NfStatus, NfType, TransportProtocol, UriScheme,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::info;
use uuid::Uuid;

pub struct NfContext {
    name: String,
    nf_instance_id: RwLock<String>,
    scheme: UriScheme,
    register_ipv4: String,
    sbi_port: u16,
    nrf_uri: RwLock<String>,
    nrf_cert_pem: Option<String>,
    nf_services: Vec<NfService>,
    registered: AtomicBool,
    oauth2_required: AtomicBool,
}

impl NfContext {
    /// Build the context from configuration
    pub fn from_config(config: &Config) -> Self {
        let configuration = &config.configuration;
        let sbi = &configuration.sbi;

        let nf_instance_id = configuration
            .nf_instance_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let api_prefix = config.sbi_uri();
        let nf_services = configuration
            .service_list
            .iter()
            .enumerate()
            .map(|(index, svc)| NfService {
                service_instance_id: index.to_string(),
                service_name: svc.service_name.clone(),
                versions: vec![NfServiceVersion {
                    api_version_in_uri: config.api_version_in_uri(),
                    api_full_version: config.info.version.clone(),
                }],
                scheme: sbi.scheme,
                nf_service_status: NfStatus::Registered,
                api_prefix: Some(api_prefix.clone()),
                ip_end_points: vec![IpEndPoint {
                    ipv4_address: Some(sbi.register_ipv4.clone()),
                    transport: Some(TransportProtocol::Tcp),
                    port: Some(sbi.port),
                }],
            })
            .collect();

        let ctx = Self {
            name: configuration
                .nef_name
                .clone()
                .unwrap_or_else(|| "nef".to_string()),
            nf_instance_id: RwLock::new(nf_instance_id),
            scheme: sbi.scheme,
            register_ipv4: sbi.register_ipv4.clone(),
            sbi_port: sbi.port,
            nrf_uri: RwLock::new(configuration.nrf_uri.clone()),
            nrf_cert_pem: configuration.nrf_cert_pem.clone(),
            nf_services,
            registered: AtomicBool::new(false),
            oauth2_required: AtomicBool::new(false),
        };

        info!(
            "Context initialized: name={}, nfInstanceId={}, nrfUri={}",
            ctx.name,
            ctx.nf_instance_id(),
            ctx.nrf_uri()
        );
        ctx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nf_type(&self) -> NfType {
        NfType::Nef
    }

    pub fn nf_instance_id(&self) -> String {
        read(&self.nf_instance_id)
    }

    pub fn set_nf_instance_id(&self, id: impl Into<String>) {
        let id = id.into();
        info!("Set nfInstanceId: [{}]", id);
        write(&self.nf_instance_id, id);
    }

    pub fn scheme(&self) -> UriScheme {
        self.scheme
    }

    /// Externally reachable address advertised to the registry
    pub fn register_ipv4(&self) -> &str {
        &self.register_ipv4
    }

    pub fn sbi_port(&self) -> u16 {
        self.sbi_port
    }

    pub fn nrf_uri(&self) -> String {
        read(&self.nrf_uri)
    }

    pub fn set_nrf_uri(&self, uri: impl Into<String>) {
        let uri = uri.into();
        info!("Set nrfUri: [{}]", uri);
        write(&self.nrf_uri, uri);
    }

    pub fn nrf_cert_pem(&self) -> Option<&str> {
        self.nrf_cert_pem.as_deref()
    }

    /// Services this instance exposes
    pub fn nf_services(&self) -> &[NfService] {
        &self.nf_services
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    /// Whether outbound calls must carry an OAuth2 access token
    pub fn oauth2_required(&self) -> bool {
        self.oauth2_required.load(Ordering::SeqCst)
    }

    pub fn set_oauth2_required(&self, required: bool) {
        self.oauth2_required.store(required, Ordering::SeqCst);
    }
}

fn read(lock: &RwLock<String>) -> String {
    match lock.read() {
        Ok(value) => value.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn write(lock: &RwLock<String>, value: String) {
    match lock.write() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

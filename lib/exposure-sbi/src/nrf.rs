//! Registry client: instance management and discovery

use crate::{ClientPool, SbiError, TokenSource};
use async_trait::async_trait;
use exposure_api::{service_name, NfProfile, NfType, SearchResult};
use reqwest::Method;
use std::sync::Arc;
use tracing::debug;

pub const NFM_PATH: &str = "/nnrf-nfm/v1/nf-instances";
pub const DISC_PATH: &str = "/nnrf-disc/v1/nf-instances";

/// Discovery query parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryQuery {
    pub target_nf_type: NfType,
    pub requester_nf_type: NfType,
    pub service_names: Vec<String>,
}

/// Result of a registration request.
///
/// `location` is only set when the registry created a new record; an update
/// of an existing one leaves both fields empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegisterOutcome {
    pub location: Option<String>,
    pub profile: Option<NfProfile>,
}

impl RegisterOutcome {
    pub fn created(&self) -> bool {
        self.location.is_some()
    }
}

#[async_trait]
pub trait NrfClient: Send + Sync {
    async fn register(&self, nrf_uri: &str, profile: &NfProfile)
        -> Result<RegisterOutcome, SbiError>;

    async fn deregister(&self, nrf_uri: &str, nf_instance_id: &str) -> Result<(), SbiError>;

    async fn search(&self, nrf_uri: &str, query: &DiscoveryQuery)
        -> Result<SearchResult, SbiError>;
}

/// HTTP registry client with separate handle pools for management and discovery
pub struct HttpNrfClient {
    nfm_clients: ClientPool,
    disc_clients: ClientPool,
    tokens: Arc<dyn TokenSource>,
}

impl HttpNrfClient {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            nfm_clients: ClientPool::with_http(http.clone()),
            disc_clients: ClientPool::with_http(http),
            tokens,
        }
    }
}

#[async_trait]
impl NrfClient for HttpNrfClient {
    async fn register(
        &self,
        nrf_uri: &str,
        profile: &NfProfile,
    ) -> Result<RegisterOutcome, SbiError> {
        let client = self.nfm_clients.get(nrf_uri).await?;
        let path = format!("{}/{}", NFM_PATH, profile.nf_instance_id);
        let request = client.request(Method::PUT, &path).json(profile);

        let response = client.send(request, None).await?;
        debug!("Registration answered with status {}", response.status);

        if response.status == 201 {
            let profile = if response.body.is_empty() {
                None
            } else {
                Some(response.json::<NfProfile>()?)
            };
            // Some registries omit the header; fall back to the request URL
            let location = response.location.or_else(|| Some(client.url(&path)));
            Ok(RegisterOutcome { location, profile })
        } else {
            Ok(RegisterOutcome::default())
        }
    }

    async fn deregister(&self, nrf_uri: &str, nf_instance_id: &str) -> Result<(), SbiError> {
        let token = self
            .tokens
            .token(service_name::NNRF_NFM, NfType::Nrf)
            .await?;
        let client = self.nfm_clients.get(nrf_uri).await?;
        let path = format!("{}/{}", NFM_PATH, nf_instance_id);

        client
            .send(client.request(Method::DELETE, &path), token.as_deref())
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        nrf_uri: &str,
        query: &DiscoveryQuery,
    ) -> Result<SearchResult, SbiError> {
        let token = self
            .tokens
            .token(service_name::NNRF_DISC, NfType::Nrf)
            .await?;
        let client = self.disc_clients.get(nrf_uri).await?;

        let mut params = vec![
            ("target-nf-type", query.target_nf_type.as_str().to_string()),
            (
                "requester-nf-type",
                query.requester_nf_type.as_str().to_string(),
            ),
        ];
        if !query.service_names.is_empty() {
            params.push(("service-names", query.service_names.join(",")));
        }

        let request = client.request(Method::GET, DISC_PATH).query(&params);
        let response = client.send(request, token.as_deref()).await?;
        response.json()
    }
}

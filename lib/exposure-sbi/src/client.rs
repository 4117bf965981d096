//! Pooled HTTP clients bound to resolved service addresses

use crate::SbiError;
use exposure_api::ProblemDetails;
use reqwest::header::LOCATION;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Build the shared HTTP client all service clients are cloned from.
///
/// Request timeouts are enforced here, not by the callers.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, SbiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .build()
        .map_err(SbiError::from)
}

/// Client handle for one service base address ("scheme://host:port")
#[derive(Clone, Debug)]
pub struct ServiceClient {
    base_uri: String,
    http: reqwest::Client,
}

/// Status, location and body of a successful response
#[derive(Clone, Debug)]
pub struct SbiResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl SbiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SbiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

impl ServiceClient {
    pub fn new(base_uri: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_uri: base_uri.into(),
            http,
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Absolute URL of `path` under the base address
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_uri.trim_end_matches('/'), path)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Send a request built from this client, classifying the outcome
    pub async fn send(
        &self,
        request: RequestBuilder,
        bearer: Option<&str>,
    ) -> Result<SbiResponse, SbiError> {
        send(request, bearer).await
    }
}

/// Send any request, classifying the outcome.
///
/// Non-2xx responses are decoded as problem details; a body that is not a
/// problem detail yields one built from the status and the decode error.
pub async fn send(request: RequestBuilder, bearer: Option<&str>) -> Result<SbiResponse, SbiError> {
    let request = match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    };

    let response = request.send().await?;
    let status = response.status();
    let url = response.url().to_string();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await?.to_vec();

    debug!("{} responded with status {} ({} bytes)", url, status, body.len());

    if !status.is_success() {
        let problem = serde_json::from_slice::<ProblemDetails>(&body).unwrap_or_else(|e| {
            warn!("Deserialize ProblemDetails error from {}: {}", url, e);
            ProblemDetails::undecodable(status.as_u16(), e.to_string())
        });
        return Err(SbiError::Remote(problem));
    }

    Ok(SbiResponse {
        status: status.as_u16(),
        location,
        body,
    })
}

type Factory<C> = Box<dyn Fn(&str) -> C + Send + Sync>;

/// Address-keyed pool of client handles.
///
/// Handles are created on first use and kept for the life of the pool. Two
/// callers racing on a new address may both build a handle; only the first
/// insert is kept and both callers receive it.
pub struct ClientPool<C = ServiceClient> {
    clients: RwLock<HashMap<String, Arc<C>>>,
    factory: Factory<C>,
}

impl<C> ClientPool<C> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> C + Send + Sync + 'static,
    {
        Self {
            clients: RwLock::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    /// Get the handle for `address`, creating it on first use
    pub async fn get(&self, address: &str) -> Result<Arc<C>, SbiError> {
        if address.is_empty() {
            return Err(SbiError::InvalidAddress("empty address".to_string()));
        }

        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(address) {
                return Ok(client.clone());
            }
        }

        let candidate = Arc::new((self.factory)(address));

        let mut clients = self.clients.write().await;
        let client = clients
            .entry(address.to_string())
            .or_insert_with(|| {
                debug!("Created client for {}", address);
                candidate
            })
            .clone();
        Ok(client)
    }

    pub async fn len(&self) -> usize {
        let clients = self.clients.read().await;
        clients.len()
    }
}

impl ClientPool<ServiceClient> {
    /// Pool of service clients sharing one HTTP connection pool
    pub fn with_http(http: reqwest::Client) -> Self {
        Self::new(move |address| ServiceClient::new(address, http.clone()))
    }
}

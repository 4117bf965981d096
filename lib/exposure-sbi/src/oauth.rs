//! OAuth2 client-credentials tokens issued by the registry

use crate::SbiError;
use async_trait::async_trait;
use exposure_api::{AccessTokenRsp, NfType, ProblemDetails};
use exposure_core::NfContext;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

const TOKEN_PATH: &str = "/oauth2/token";
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);
const EXPIRY_MARGIN: Duration = Duration::from_secs(5);

/// Supplies bearer tokens for outbound calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Token for `scope` on a `target` function, or `None` when calls go
    /// out unauthenticated.
    async fn token(&self, scope: &str, target: NfType) -> Result<Option<String>, SbiError>;
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Requests tokens from the registry's token endpoint, cached per scope
pub struct NrfTokenSource {
    context: Arc<NfContext>,
    http: reqwest::Client,
    cache: RwLock<HashMap<String, CachedToken>>,
}

impl NrfTokenSource {
    pub fn new(context: Arc<NfContext>, http: reqwest::Client) -> Self {
        Self {
            context,
            http,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn request(&self, scope: &str, target: NfType) -> Result<AccessTokenRsp, SbiError> {
        let url = format!("{}{}", self.context.nrf_uri().trim_end_matches('/'), TOKEN_PATH);
        let nf_instance_id = self.context.nf_instance_id();
        let form = [
            ("grant_type", "client_credentials"),
            ("nfInstanceId", nf_instance_id.as_str()),
            ("nfType", self.context.nf_type().as_str()),
            ("targetNfType", target.as_str()),
            ("scope", scope),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| SbiError::Credential(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SbiError::Credential(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ProblemDetails>(&body)
                .map(|problem| problem.to_string())
                .unwrap_or_else(|_| format!("status {}", status.as_u16()));
            return Err(SbiError::Credential(format!(
                "token request for {} rejected: {}",
                scope, detail
            )));
        }

        serde_json::from_slice(&body).map_err(|e| SbiError::Credential(e.to_string()))
    }
}

#[async_trait]
impl TokenSource for NrfTokenSource {
    async fn token(&self, scope: &str, target: NfType) -> Result<Option<String>, SbiError> {
        if !self.context.oauth2_required() {
            return Ok(None);
        }

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(scope) {
                if cached.expires_at > Instant::now() {
                    return Ok(Some(cached.value.clone()));
                }
            }
        }

        let rsp = match self.request(scope, target).await {
            Ok(rsp) => rsp,
            Err(e) => {
                warn!("Failed to obtain token for {}: {}", scope, e);
                return Err(e);
            }
        };

        let lifetime = rsp
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);
        let expires_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);

        let mut cache = self.cache.write().await;
        cache.insert(
            scope.to_string(),
            CachedToken {
                value: rsp.access_token.clone(),
                expires_at,
            },
        );
        debug!("Cached token for {} ({}s)", scope, lifetime.as_secs());

        Ok(Some(rsp.access_token))
    }
}

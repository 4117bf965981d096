//! Registration of this instance with the registry
//!
//! Registration is retried until it succeeds or the caller cancels it.
//! Deregistration is a single attempt made at shutdown.

use crate::{ExposureMetrics, NrfClient, RegisterOutcome};
use exposure_api::{NfProfile, NfStatus, ProblemDetails};
use exposure_core::{CoreError, NfContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const RETRY_REGISTER_INTERVAL: Duration = Duration::from_secs(2);

const NFM_SEGMENT: &str = "/nnrf-nfm/";

/// Registry address and instance id confirmed by a successful registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub nrf_uri: String,
    pub nf_instance_id: String,
    /// The registry created a new record rather than updating one
    pub created: bool,
}

pub struct RegistrationManager {
    context: Arc<NfContext>,
    nrf: Arc<dyn NrfClient>,
    retry_interval: Duration,
    metrics: Option<ExposureMetrics>,
}

impl RegistrationManager {
    pub fn new(context: Arc<NfContext>, nrf: Arc<dyn NrfClient>) -> Self {
        Self {
            context,
            nrf,
            retry_interval: RETRY_REGISTER_INTERVAL,
            metrics: None,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_metrics(mut self, metrics: ExposureMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Profile advertised to the registry
    pub fn build_profile(&self) -> Result<NfProfile> {
        let address = self.context.register_ipv4();
        if address.is_empty() {
            return Err(CoreError::Configuration("NEF address is empty".to_string()));
        }

        Ok(NfProfile {
            nf_instance_id: self.context.nf_instance_id(),
            nf_type: self.context.nf_type(),
            nf_status: NfStatus::Registered,
            ipv4_addresses: vec![address.to_string()],
            nf_services: self.context.nf_services().to_vec(),
            custom_info: None,
        })
    }

    /// Register, retrying at a fixed interval until success or cancellation.
    ///
    /// Cancellation is observed between attempts, never during one.
    pub async fn register(&self, cancel: &CancellationToken) -> Result<Registration> {
        let profile = self.build_profile()?;

        loop {
            if cancel.is_cancelled() {
                warn!("Registration cancelled");
                return Err(CoreError::Cancelled);
            }

            let nrf_uri = self.context.nrf_uri();
            match self.nrf.register(&nrf_uri, &profile).await {
                Ok(outcome) => {
                    self.record("success");
                    return Ok(self.apply(outcome, &nrf_uri));
                }
                Err(e) => {
                    self.record("failure");
                    error!("NEF register to NRF Error[{}]", e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("Registration cancelled");
                    return Err(CoreError::Cancelled);
                }
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }

    /// Run `register` as a background task
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<Registration>> {
        tokio::spawn(async move { self.register(&cancel).await })
    }

    /// Single deregistration attempt
    pub async fn deregister(&self) -> std::result::Result<(), ProblemDetails> {
        let nrf_uri = self.context.nrf_uri();
        let nf_instance_id = self.context.nf_instance_id();

        match self.nrf.deregister(&nrf_uri, &nf_instance_id).await {
            Ok(()) => {
                self.context.set_registered(false);
                info!("Deregistered [{}] from NRF", nf_instance_id);
                Ok(())
            }
            Err(e) => Err(e.into_problem()),
        }
    }

    fn apply(&self, outcome: RegisterOutcome, requested_uri: &str) -> Registration {
        let created = outcome.created();

        if let Some(location) = outcome.location.as_deref() {
            let (nrf_uri, nf_instance_id) = split_location(location, requested_uri);
            self.context.set_nrf_uri(nrf_uri);
            self.context.set_nf_instance_id(nf_instance_id);

            let oauth2 = outcome
                .profile
                .as_ref()
                .and_then(|p| p.custom_flag("oauth2"))
                .unwrap_or(false);
            self.context.set_oauth2_required(oauth2);
            if oauth2 && self.context.nrf_cert_pem().is_none() {
                error!("OAuth2 enable but no nrfCertPem provided in config.");
            }
        }

        self.context.set_registered(true);
        let registration = Registration {
            nrf_uri: self.context.nrf_uri(),
            nf_instance_id: self.context.nf_instance_id(),
            created,
        };
        info!(
            "Registered [{}] with NRF {} (created: {})",
            registration.nf_instance_id, registration.nrf_uri, created
        );
        registration
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.registration_attempt(outcome);
        }
    }
}

/// Registry base address and instance id taken from a resource location
fn split_location(location: &str, fallback_uri: &str) -> (String, String) {
    let nrf_uri = match location.find(NFM_SEGMENT) {
        Some(index) => location[..index].to_string(),
        None => fallback_uri.to_string(),
    };
    let nf_instance_id = location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    (nrf_uri, nf_instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiscoveryQuery, SbiError};
    use async_trait::async_trait;
    use exposure_api::{NfType, SearchResult};
    use exposure_core::Config;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Registry fake answering from a script, then repeating the last entry
    struct ScriptedNrf {
        script: Mutex<Vec<std::result::Result<RegisterOutcome, SbiError>>>,
        attempts: AtomicUsize,
        deregister: Mutex<Option<SbiError>>,
        delay: Duration,
    }

    impl ScriptedNrf {
        fn new(script: Vec<std::result::Result<RegisterOutcome, SbiError>>) -> Self {
            Self {
                script: Mutex::new(script),
                attempts: AtomicUsize::new(0),
                deregister: Mutex::new(None),
                delay: Duration::ZERO,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    fn clone_result(
        r: &std::result::Result<RegisterOutcome, SbiError>,
    ) -> std::result::Result<RegisterOutcome, SbiError> {
        match r {
            Ok(outcome) => Ok(outcome.clone()),
            Err(SbiError::Remote(p)) => Err(SbiError::Remote(p.clone())),
            Err(e) => Err(SbiError::Transport(e.to_string())),
        }
    }

    #[async_trait]
    impl NrfClient for ScriptedNrf {
        async fn register(
            &self,
            _nrf_uri: &str,
            _profile: &NfProfile,
        ) -> std::result::Result<RegisterOutcome, SbiError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                clone_result(&script[0])
            }
        }

        async fn deregister(
            &self,
            _nrf_uri: &str,
            _nf_instance_id: &str,
        ) -> std::result::Result<(), SbiError> {
            match self.deregister.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn search(
            &self,
            _nrf_uri: &str,
            _query: &DiscoveryQuery,
        ) -> std::result::Result<SearchResult, SbiError> {
            Ok(SearchResult::default())
        }
    }

    fn context() -> Arc<NfContext> {
        let mut config = Config::default();
        config.configuration.nf_instance_id = Some("nef-local".to_string());
        config.configuration.nrf_uri = "http://10.0.0.10:8000".to_string();
        Arc::new(NfContext::from_config(&config))
    }

    fn created(location: &str, oauth2: bool) -> RegisterOutcome {
        let profile: NfProfile = serde_json::from_value(json!({
            "nfInstanceId": "nef-assigned",
            "nfType": "NEF",
            "nfStatus": "REGISTERED",
            "customInfo": {"oauth2": oauth2}
        }))
        .unwrap();
        RegisterOutcome {
            location: Some(location.to_string()),
            profile: Some(profile),
        }
    }

    fn manager(ctx: Arc<NfContext>, nrf: Arc<ScriptedNrf>) -> RegistrationManager {
        RegistrationManager::new(ctx, nrf).with_retry_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_build_profile() {
        let ctx = context();
        let nrf = Arc::new(ScriptedNrf::new(vec![Ok(RegisterOutcome::default())]));
        let profile = manager(ctx, nrf).build_profile().unwrap();

        assert_eq!(profile.nf_instance_id, "nef-local");
        assert_eq!(profile.nf_type, NfType::Nef);
        assert_eq!(profile.ipv4_addresses, vec!["127.0.0.5".to_string()]);
        assert_eq!(profile.nf_services.len(), 1);
    }

    #[test]
    fn test_build_profile_requires_address() {
        let mut config = Config::default();
        config.configuration.sbi.register_ipv4 = String::new();
        let ctx = Arc::new(NfContext::from_config(&config));
        let nrf = Arc::new(ScriptedNrf::new(vec![Ok(RegisterOutcome::default())]));

        let err = manager(ctx, nrf).build_profile().unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn test_split_location() {
        assert_eq!(
            split_location(
                "http://10.0.0.10:8000/nnrf-nfm/v1/nf-instances/abc",
                "http://fallback"
            ),
            ("http://10.0.0.10:8000".to_string(), "abc".to_string())
        );
        assert_eq!(
            split_location("http://other/instances/xyz", "http://fallback"),
            ("http://fallback".to_string(), "xyz".to_string())
        );
    }

    #[tokio::test]
    async fn test_created_learns_location_and_oauth() {
        let ctx = context();
        let nrf = Arc::new(ScriptedNrf::new(vec![Ok(created(
            "http://10.0.0.11:8000/nnrf-nfm/v1/nf-instances/nef-assigned",
            true,
        ))]));

        let registration = manager(ctx.clone(), nrf)
            .register(&CancellationToken::new())
            .await
            .unwrap();

        assert!(registration.created);
        assert_eq!(registration.nrf_uri, "http://10.0.0.11:8000");
        assert_eq!(registration.nf_instance_id, "nef-assigned");
        assert_eq!(ctx.nf_instance_id(), "nef-assigned");
        assert!(ctx.oauth2_required());
        assert!(ctx.is_registered());
    }

    #[tokio::test]
    async fn test_updated_keeps_current_values() {
        let ctx = context();
        let nrf = Arc::new(ScriptedNrf::new(vec![Ok(RegisterOutcome::default())]));

        let registration = manager(ctx.clone(), nrf)
            .register(&CancellationToken::new())
            .await
            .unwrap();

        assert!(!registration.created);
        assert_eq!(registration.nrf_uri, "http://10.0.0.10:8000");
        assert_eq!(registration.nf_instance_id, "nef-local");
        assert!(!ctx.oauth2_required());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let ctx = context();
        let nrf = Arc::new(ScriptedNrf::new(vec![
            Err(SbiError::Transport("connection refused".into())),
            Err(SbiError::Remote(ProblemDetails::system_failure("busy"))),
            Ok(RegisterOutcome::default()),
        ]));
        let metrics = ExposureMetrics::new().unwrap();

        manager(ctx, nrf.clone())
            .with_metrics(metrics.clone())
            .register(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(nrf.attempts(), 3);
        assert_eq!(
            metrics
                .registration_attempts_total
                .with_label_values(&["failure"])
                .get(),
            2
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_retry_loop() {
        let ctx = context();
        let nrf = Arc::new(ScriptedNrf::new(vec![Err(SbiError::Transport(
            "connection refused".into(),
        ))]));
        let cancel = CancellationToken::new();
        let handle = Arc::new(manager(ctx.clone(), nrf.clone())).spawn(cancel.clone());

        while nrf.attempts() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("registration did not stop after cancel")
            .unwrap();
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert!(!ctx.is_registered());
    }

    #[tokio::test]
    async fn test_cancel_during_attempt_keeps_its_outcome() {
        let ctx = context();
        let nrf = Arc::new(
            ScriptedNrf::new(vec![Ok(created(
                "http://10.0.0.10:8000/nnrf-nfm/v1/nf-instances/nef-assigned",
                false,
            ))])
            .slow(Duration::from_millis(200)),
        );
        let cancel = CancellationToken::new();
        let handle = Arc::new(manager(ctx.clone(), nrf.clone())).spawn(cancel.clone());

        while nrf.attempts() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let registration = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("registration did not finish")
            .unwrap()
            .unwrap();
        assert_eq!(registration.nf_instance_id, "nef-assigned");
        assert!(ctx.is_registered());
        assert_eq!(nrf.attempts(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let nrf = Arc::new(ScriptedNrf::new(vec![Ok(RegisterOutcome::default())]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = manager(context(), nrf.clone()).register(&cancel).await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert_eq!(nrf.attempts(), 0);
    }

    #[tokio::test]
    async fn test_deregister_surfaces_problem() {
        let nrf = Arc::new(ScriptedNrf::new(vec![Ok(RegisterOutcome::default())]));
        *nrf.deregister.lock().unwrap() = Some(SbiError::Transport("no route".into()));

        let problem = manager(context(), nrf.clone())
            .deregister()
            .await
            .unwrap_err();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.detail.as_deref(), Some("no route"));

        let nrf_ok = Arc::new(ScriptedNrf::new(vec![Ok(RegisterOutcome::default())]));
        assert!(manager(context(), nrf_ok).deregister().await.is_ok());
    }
}

use anyhow::Result;
use exposure_api::service_name;
use exposure_core::config::{Logger, DEFAULT_CONFIG_PATH};
use exposure_core::{Config, CoreError, Dependency, NfContext};
use exposure_sbi::client::http_client;
use exposure_sbi::{
    DependencyResolver, ExposureMetrics, HttpNotifySink, HttpNrfClient, NrfTokenSource,
    PfdChangeNotifier, RegistrationManager,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::tokio::TokioIo;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;

use api::Api;

const CONFIG_ENV: &str = "EXPOSURE_CONFIG";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    init_tracing(&config.logger);

    info!("Starting exposure-broker...");

    let context = Arc::new(NfContext::from_config(&config));
    let metrics = ExposureMetrics::new()?;
    info!("Metrics initialized");

    // Every outbound client shares one connection pool
    let http = http_client(REQUEST_TIMEOUT)?;
    let tokens = Arc::new(NrfTokenSource::new(context.clone(), http.clone()));
    let nrf = Arc::new(HttpNrfClient::new(http.clone(), tokens.clone()));

    let registration = Arc::new(
        RegistrationManager::new(context.clone(), nrf.clone()).with_metrics(metrics.clone()),
    );
    let resolver = Arc::new(
        DependencyResolver::new(context.clone(), nrf, http.clone()).with_metrics(metrics.clone()),
    );
    let notifier = Arc::new(
        PfdChangeNotifier::new(Arc::new(HttpNotifySink::new(http, tokens)))
            .with_metrics(metrics.clone()),
    );

    let api = Arc::new(Api::new(
        notifier,
        metrics,
        config.service_uri(service_name::NNEF_PFDMANAGEMENT),
    ));

    let cancel = CancellationToken::new();

    let listener = TcpListener::bind(config.binding_addr()).await?;
    info!("HTTP server listening on {}", config.binding_addr());
    let server = tokio::spawn(serve(listener, api, cancel.clone()));

    // Cancellation only takes effect between attempts, so a request already
    // sent may still register us; its outcome decides the deregistration.
    let registering = registration.clone().spawn(cancel.clone());
    let startup = {
        let resolver = resolver.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let outcome = registering.await;
            if let Ok(Ok(_)) = &outcome {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = warm_up(&resolver) => {}
                }
            }
            outcome
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancel.cancel();

    if let Err(e) = server.await {
        warn!("HTTP server task did not finish cleanly: {}", e);
    }

    let registered = match startup.await {
        Ok(Ok(Ok(registration))) => Some(registration),
        Ok(Ok(Err(CoreError::Cancelled))) => None,
        Ok(Ok(Err(e))) => {
            error!("Registration failed: {}", e);
            None
        }
        Ok(Err(e)) | Err(e) => {
            warn!("Registration task did not finish cleanly: {}", e);
            None
        }
    };

    if let Some(confirmed) = registered {
        match registration.deregister().await {
            Ok(()) => info!("Deregistered [{}] from NRF", confirmed.nf_instance_id),
            Err(problem) => error!("Deregister from NRF failed: {}", problem),
        }
    }

    info!("exposure-broker stopped");
    Ok(())
}

/// Configure the subscriber. `RUST_LOG` takes precedence over the file's level.
fn init_tracing(logger: &Logger) {
    let filter = if !logger.enable {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logger.level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logger.report_caller)
        .with_line_number(logger.report_caller)
        .init();
}

/// Resolve every dependency once so the first request finds a cached address
async fn warm_up(resolver: &DependencyResolver) {
    for dependency in Dependency::ALL {
        match resolver.resolve_address(dependency).await {
            Ok(address) => debug!("{} available at {}", dependency, address),
            Err(e) => warn!("{} not resolved yet: {}", dependency, e),
        }
    }
}

/// Accept connections until cancelled
async fn serve(listener: TcpListener, api: Arc<Api>, cancel: CancellationToken) {
    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = cancel.cancelled() => {
                info!("HTTP server stopped");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let api = api.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| api.clone().handle(req));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving HTTP connection from {}: {}", peer_addr, e);
            }
        });
    }
}

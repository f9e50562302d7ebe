use std::{sync::Arc, time::Duration};

use aws_credential_types::Credentials;
use hyper::service::service_fn;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as ConnBuilder,
};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub use bucket_proxy::{BucketProxy, VERIFY_KEY};
pub use config::Config;
pub use error::{ApplicationError, ResolveError};
pub use object_store::{BackendError, FetchOutcome, ObjectStore, S3ObjectStore};
pub use rewrite::{Eligibility, RewriteRule};
pub use validator_cache::{ValidatorCache, ValidatorCacheStatistics};

pub mod bucket_proxy;
mod config;
mod error;
pub mod http_service;
mod metrics_writer;
pub mod object_store;
mod rewrite;
mod telemetry;
mod validator_cache;

pub type Result<T> = std::result::Result<T, ApplicationError>;

static CARGO_CRATE_NAME: &str = env!("CARGO_CRATE_NAME");

async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let mut loader = aws_config::from_env();

    if let Some(endpoint) = &config.upstream_endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let Some(region) = &config.upstream_region {
        loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
    }

    if let (Some(access_key_id), Some(secret_access_key)) = (
        &config.upstream_access_key_id,
        &config.upstream_secret_access_key,
    ) {
        loader = loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "helm-s3-proxy-static",
        ));
    }

    let sdk_config = loader.load().await;

    aws_sdk_s3::Client::from_conf(
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.upstream_endpoint.is_some())
            .build(),
    )
}

pub async fn start_app(config: Config) -> Result<()> {
    let (metrics_provider, logs_provider) = telemetry::initialize_telemetry(&config)?;

    info!("Starting {CARGO_CRATE_NAME} with {config}");

    let s3_client = build_s3_client(&config).await;
    let store = S3ObjectStore::new(s3_client, config.s3_bucket.clone());

    let cache = Arc::new(ValidatorCache::new());
    let proxy = Arc::new(BucketProxy::new(
        store,
        cache.clone(),
        config.eligibility(),
        config.rewrite_rule(),
    ));

    if let Err(err) = proxy.verify_backend().await {
        error!(bucket = %config.s3_bucket, error = %err, "unable to setup bucket handler");
        telemetry::shutdown_metrics(metrics_provider);
        telemetry::shutdown_logs(logs_provider);
        return Err(err.into());
    }

    info!(bucket = %config.s3_bucket, "bucket verified");

    match proxy.rewrite_rule() {
        Some(rule) => info!(rule = %rule, "rewriting index files"),
        None => info!("REPLACE_HTTP_PATH not set, index files are served unmodified"),
    }

    if let Some(textfile_dir) = config.prometheus_textfile_dir.clone() {
        tokio::spawn(metrics_writer::start_metrics_writer(textfile_dir, cache));
    }

    // Start hyper server
    let listener = TcpListener::bind(config.listen_addr).await?;
    let http_server = ConnBuilder::new(TokioExecutor::new());
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());

    info!("Listening on http://{}/", config.listen_addr);

    loop {
        let (socket, remote_addr) = tokio::select! {
            res = listener.accept() => {
                match res {
                    Ok(conn) => conn,
                    Err(err) => {
                        error!("Error accepting connection: {err}");
                        continue;
                    }
                }
            }
            _ = ctrl_c.as_mut() => { break; }
        };

        debug!("Accepted connection from {remote_addr}");

        let proxy = proxy.clone();
        let service = service_fn(move |req| http_service::handle_request(proxy.clone(), req));

        let conn = http_server.serve_connection(TokioIo::new(socket), service);
        let conn = graceful.watch(conn.into_owned());
        tokio::spawn(async move {
            // Covers protocol errors and resets as well as failed body writes.
            if let Err(err) = conn.await {
                warn!("connection error from {remote_addr}: {err}");
            }
        });
    }

    info!("Shutting down gracefully...");

    tokio::select! {
        () = graceful.shutdown() => {
            info!("Graceful shutdown complete");
        },
        () = tokio::time::sleep(Duration::from_secs(10)) => {
            info!("Graceful shutdown timed out after 10s, aborting");
        }
    }

    telemetry::shutdown_metrics(metrics_provider);
    telemetry::shutdown_logs(logs_provider);

    Ok(())
}

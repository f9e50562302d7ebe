use std::{sync::LazyLock, time::Duration};

use opentelemetry::metrics::{Counter, Gauge};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use prometheus::{IntCounter, IntGauge, Registry};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{CARGO_CRATE_NAME, Config};

static RESOURCE: LazyLock<opentelemetry_sdk::Resource> = LazyLock::new(|| {
    opentelemetry_sdk::Resource::builder()
        .with_service_name(CARGO_CRATE_NAME)
        .build()
});

// Prometheus registry and metrics

pub(crate) static PROMETHEUS_REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    Registry::new_custom(Some("helm_s3_proxy".to_string()), None)
        .expect("Failed to create Prometheus registry")
});

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter definition");
    PROMETHEUS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

fn register_gauge(name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("valid gauge definition");
    PROMETHEUS_REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("gauge registered once");
    gauge
}

static PROM_CACHE_HIT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "cache_hit_total",
        "Number of requests answered from cache after a not-modified revalidation",
    )
});

static PROM_CACHE_MISS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "cache_miss_total",
        "Number of requests that received fresh content from S3",
    )
});

static PROM_CACHE_STORE: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter("cache_store_total", "Number of index files written to the cache")
});

static PROM_REWRITE: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter("rewrite_total", "Number of bodies passed through the s3:// rewrite")
});

static PROM_NOT_FOUND: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter("not_found_total", "Number of requests for missing keys")
});

static PROM_UPSTREAM_ERROR: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter("upstream_error_total", "Number of upstream S3 errors")
});

static PROM_CACHE_SIZE_BYTES: LazyLock<IntGauge> = LazyLock::new(|| {
    register_gauge("cache_size_bytes", "Current cache size in bytes")
});

static PROM_CACHE_OBJECT_COUNT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_gauge("cache_object_count", "Current number of objects in cache")
});

pub(crate) fn initialize_telemetry(
    config: &Config,
) -> crate::Result<(
    opentelemetry_sdk::metrics::SdkMeterProvider,
    Option<opentelemetry_sdk::logs::SdkLoggerProvider>,
)> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let logs_provider = init_logs(config.otel_grpc_endpoint_url.as_deref())?;

    match logs_provider.as_ref() {
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        Some(logs_provider) => {
            let otel_layer = OpenTelemetryTracingBridge::new(logs_provider);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(otel_layer)
                .init();
        }
    }

    let metrics_provider = init_metrics(config.otel_grpc_endpoint_url.as_deref())?;

    Ok((metrics_provider, logs_provider))
}

fn init_logs(
    otel_grpc_endpoint_url: Option<&str>,
) -> crate::Result<Option<opentelemetry_sdk::logs::SdkLoggerProvider>> {
    let Some(otel_grpc_endpoint_url) = otel_grpc_endpoint_url else {
        return Ok(None);
    };

    let otlp_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_compression(Compression::Gzip)
        .with_endpoint(otel_grpc_endpoint_url)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    let provider = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_resource(RESOURCE.clone())
        .with_batch_exporter(otlp_exporter)
        .build();

    Ok(Some(provider))
}

pub(crate) fn shutdown_logs(logs_provider: Option<opentelemetry_sdk::logs::SdkLoggerProvider>) {
    let Some(logs_provider) = logs_provider else {
        return;
    };

    if let Err(error) = logs_provider.shutdown() {
        error!("Error during logs shutdown: {error:?}");
    }
}

fn init_metrics(
    otel_grpc_endpoint_url: Option<&str>,
) -> crate::Result<opentelemetry_sdk::metrics::SdkMeterProvider> {
    let builder =
        opentelemetry_sdk::metrics::SdkMeterProvider::builder().with_resource(RESOURCE.clone());

    let provider = match otel_grpc_endpoint_url {
        None => {
            info!("opentelemetry_stdout initialized");
            builder.with_periodic_exporter(opentelemetry_stdout::MetricExporter::default())
        }
        Some(otel_grpc_endpoint_url) => {
            info!("opentelemetry_otlp initialized");
            let otlp_exporter = opentelemetry_otlp::MetricExporter::builder()
                .with_tonic()
                .with_compression(Compression::Gzip)
                .with_endpoint(otel_grpc_endpoint_url)
                .with_timeout(Duration::from_secs(5))
                .build()?;

            builder.with_periodic_exporter(otlp_exporter)
        }
    }
    .build();

    opentelemetry::global::set_meter_provider(provider.clone());

    Ok(provider)
}

pub(crate) fn shutdown_metrics(metric_provider: opentelemetry_sdk::metrics::SdkMeterProvider) {
    if let Err(error) = metric_provider.shutdown() {
        error!("Error during metric shutdown: {error:?}");
    }
}

// Cache metrics

fn u64_counter(name: &'static str, description: &'static str) -> Counter<u64> {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_counter(name)
        .with_description(description)
        .build()
}

fn u64_gauge(name: &'static str, description: &'static str) -> Gauge<u64> {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_gauge(name)
        .with_description(description)
        .build()
}

static CACHE_HIT: LazyLock<Counter<u64>> =
    LazyLock::new(|| u64_counter("cache.hit", "Number of not-modified revalidations"));

static CACHE_MISS: LazyLock<Counter<u64>> =
    LazyLock::new(|| u64_counter("cache.miss", "Number of fresh fetches"));

static CACHE_STORE: LazyLock<Counter<u64>> =
    LazyLock::new(|| u64_counter("cache.store", "Number of index files written to the cache"));

static REWRITE: LazyLock<Counter<u64>> =
    LazyLock::new(|| u64_counter("rewrite", "Number of bodies passed through the rewrite"));

static NOT_FOUND: LazyLock<Counter<u64>> =
    LazyLock::new(|| u64_counter("not_found", "Number of requests for missing keys"));

static UPSTREAM_ERROR: LazyLock<Counter<u64>> =
    LazyLock::new(|| u64_counter("upstream_error", "Number of upstream S3 errors"));

static CACHE_SIZE_BYTES: LazyLock<Gauge<u64>> =
    LazyLock::new(|| u64_gauge("cache.size_bytes", "Current cache size in bytes"));

static CACHE_OBJECT_COUNT: LazyLock<Gauge<u64>> =
    LazyLock::new(|| u64_gauge("cache.object_count", "Current number of objects in cache"));

pub(crate) fn record_cache_hit() {
    CACHE_HIT.add(1, &[]);
    PROM_CACHE_HIT.inc();
}

pub(crate) fn record_cache_miss() {
    CACHE_MISS.add(1, &[]);
    PROM_CACHE_MISS.inc();
}

pub(crate) fn record_cache_store() {
    CACHE_STORE.add(1, &[]);
    PROM_CACHE_STORE.inc();
}

pub(crate) fn record_rewrite() {
    REWRITE.add(1, &[]);
    PROM_REWRITE.inc();
}

pub(crate) fn record_not_found() {
    NOT_FOUND.add(1, &[]);
    PROM_NOT_FOUND.inc();
}

pub(crate) fn record_upstream_error() {
    UPSTREAM_ERROR.add(1, &[]);
    PROM_UPSTREAM_ERROR.inc();
}

pub(crate) fn record_cache_stats(object_count: usize, size_bytes: usize) {
    CACHE_SIZE_BYTES.record(size_bytes as u64, &[]);
    CACHE_OBJECT_COUNT.record(object_count as u64, &[]);
    PROM_CACHE_SIZE_BYTES.set(size_bytes as i64);
    PROM_CACHE_OBJECT_COUNT.set(object_count as i64);
}

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error, info};

use crate::telemetry;
use crate::validator_cache::ValidatorCache;

const METRICS_FILE_NAME: &str = "helm_s3_proxy.prom";

/// Start the Prometheus metrics writer background task.
///
/// Every 10 seconds the cache gauges are refreshed and the whole registry is
/// written to `<textfile_dir>/helm_s3_proxy.prom` for node_exporter's textfile
/// collector. Individual write failures are logged and the loop keeps going.
pub async fn start_metrics_writer(textfile_dir: String, cache: Arc<ValidatorCache>) {
    let (tmp_path, final_path) = metrics_paths(Path::new(&textfile_dir));

    info!(
        "Prometheus metrics writer started, writing to {}",
        final_path.display()
    );

    let mut interval = tokio::time::interval(Duration::from_secs(10));

    loop {
        interval.tick().await;

        let stats = cache.statistics().await;
        telemetry::record_cache_stats(stats.len, stats.size);

        match encode_registry() {
            Ok(buffer) => match write_metrics_atomic(&tmp_path, &final_path, &buffer) {
                Ok(()) => {
                    debug!(
                        "Successfully wrote {} bytes to {}",
                        buffer.len(),
                        final_path.display()
                    );
                }
                Err(e) => {
                    error!("Failed to write metrics file: {}", e);
                }
            },
            Err(e) => {
                error!("Failed to encode Prometheus metrics: {}", e);
            }
        }
    }
}

fn metrics_paths(textfile_dir: &Path) -> (PathBuf, PathBuf) {
    let final_path = textfile_dir.join(METRICS_FILE_NAME);
    let tmp_path = textfile_dir.join(format!("{METRICS_FILE_NAME}.tmp"));
    (tmp_path, final_path)
}

fn encode_registry() -> prometheus::Result<Vec<u8>> {
    let metric_families = telemetry::PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}

/// Write to a temporary file, then rename it over the final path, so
/// node_exporter never reads a partially written file.
fn write_metrics_atomic(tmp_path: &Path, final_path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    std::fs::rename(tmp_path, final_path)?;

    Ok(())
}

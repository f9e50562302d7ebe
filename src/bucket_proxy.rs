use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::ResolveError;
use crate::object_store::{FetchOutcome, ObjectStore, S3ObjectStore};
use crate::rewrite::{Eligibility, RewriteRule};
use crate::telemetry;
use crate::validator_cache::ValidatorCache;

/// Key that is never expected to exist; fetching it proves the bucket is
/// reachable with the configured credentials.
pub const VERIFY_KEY: &str = "/verify_s3_downloader_works";

/// Resolves request keys against a bucket, revalidating cached index files
/// with their ETag and rewriting `s3://` references in them.
pub struct BucketProxy<S = S3ObjectStore> {
    store: S,
    cache: Arc<ValidatorCache>,
    eligibility: Eligibility,
    rewrite: Option<RewriteRule>,
}

impl<S> BucketProxy<S> {
    pub fn new(
        store: S,
        cache: Arc<ValidatorCache>,
        eligibility: Eligibility,
        rewrite: Option<RewriteRule>,
    ) -> Self {
        Self {
            store,
            cache,
            eligibility,
            rewrite,
        }
    }

    pub fn cache(&self) -> &Arc<ValidatorCache> {
        &self.cache
    }

    pub fn rewrite_rule(&self) -> Option<&RewriteRule> {
        self.rewrite.as_ref()
    }
}

impl<S: ObjectStore> BucketProxy<S> {
    /// Produces the bytes to serve for `key`.
    ///
    /// Dropping the returned future abandons the backend call; the cache is
    /// only written after a fetch completed.
    pub async fn resolve(&self, key: &str) -> Result<Bytes, ResolveError> {
        let (cached_body, cached_validator) = self.cache.get(key).await;
        let if_none_match = (!cached_validator.is_empty()).then_some(cached_validator.as_str());

        let (body, validator) = match self.store.get_object(key, if_none_match).await {
            FetchOutcome::NotModified => {
                debug!(key = %key, "cached result");
                telemetry::record_cache_hit();
                return Ok(cached_body);
            }
            FetchOutcome::NotFound => {
                debug!(key = %key, "object not found");
                telemetry::record_not_found();
                return Err(ResolveError::NotFound {
                    key: key.to_owned(),
                });
            }
            FetchOutcome::Failed(source) => {
                debug!(key = %key, error = %source, "upstream error on get_object");
                telemetry::record_upstream_error();
                return Err(ResolveError::Backend {
                    key: key.to_owned(),
                    source,
                });
            }
            FetchOutcome::Fresh { body, validator } => (body, validator),
        };

        telemetry::record_cache_miss();

        if !self.eligibility.is_eligible(key) {
            return Ok(body);
        }

        let body = match &self.rewrite {
            Some(rule) => {
                telemetry::record_rewrite();
                rule.apply(body)
            }
            None => body,
        };

        if let Some(validator) = validator {
            info!(key = %key, validator = %validator, "caching result");
            self.cache.put(key, body.clone(), validator).await;
            telemetry::record_cache_store();
            self.report_stats().await;
        }

        Ok(body)
    }

    /// Startup check: a missing object is the expected answer, anything else
    /// other than content means the bucket cannot be served.
    pub async fn verify_backend(&self) -> Result<(), ResolveError> {
        match self.resolve(VERIFY_KEY).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn report_stats(&self) {
        let stats = self.cache.statistics().await;
        telemetry::record_cache_stats(stats.len, stats.size);
    }
}

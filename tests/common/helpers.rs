#![allow(dead_code)]

use bytes::Bytes;
use helm_s3_proxy::{BucketProxy, Eligibility, ObjectStore, RewriteRule, ValidatorCache};
use http::{Method, Request, Response};
use http_body_util::{BodyExt, Full};
use std::sync::Arc;

pub const BUCKET: &str = "mybucket";
pub const CDN: &str = "https://cdn.example.com";

/// Build a proxy over `store` for `BUCKET`, rewriting `.yaml` keys to
/// `prefix` (empty disables rewriting).
pub fn build_proxy<S: ObjectStore>(store: S, prefix: &str) -> Arc<BucketProxy<S>> {
    Arc::new(BucketProxy::new(
        store,
        Arc::new(ValidatorCache::new()),
        Eligibility::default(),
        RewriteRule::new(BUCKET, prefix),
    ))
}

/// Build a request for `path`
pub fn build_request(method: Method, path: &str) -> Request<()> {
    Request::builder().method(method).uri(path).body(()).unwrap()
}

/// Build a GET request for `path`
pub fn build_get_request(path: &str) -> Request<()> {
    build_request(Method::GET, path)
}

/// Collect the full response body
pub async fn extract_body(response: Response<Full<Bytes>>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Check the proxy cache holds `body` and `validator` under `key`
pub async fn assert_cached<S>(proxy: &BucketProxy<S>, key: &str, body: &[u8], validator: &str) {
    let (cached_body, cached_validator) = proxy.cache().get(key).await;
    assert_eq!(
        cached_body,
        Bytes::copy_from_slice(body),
        "cached body for {key}"
    );
    assert_eq!(cached_validator, validator, "cached validator for {key}");
}

/// Check the proxy cache holds nothing under `key`
pub async fn assert_not_cached<S>(proxy: &BucketProxy<S>, key: &str) {
    assert!(
        !proxy.cache().contains_key(key).await,
        "Expected cache to NOT contain {key}"
    );
}

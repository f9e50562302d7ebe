use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode, header};
use http_body_util::Full;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::bucket_proxy::BucketProxy;
use crate::error::ResolveError;
use crate::object_store::ObjectStore;

pub const HEALTH_PATH: &str = "/health";

/// Routes one request: `/health` answers directly for any method, every
/// other `GET` resolves its percent-decoded path against the bucket.
pub async fn handle_request<S, B>(
    proxy: Arc<BucketProxy<S>>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    S: ObjectStore,
{
    if req.uri().path() == HEALTH_PATH {
        return Ok(response(StatusCode::OK, Bytes::from_static(b"OK")));
    }

    if req.method() != Method::GET {
        return Ok(method_not_allowed());
    }

    let path = match percent_decode_str(req.uri().path()).decode_utf8() {
        Ok(path) => path.into_owned(),
        Err(err) => {
            debug!(path = %req.uri().path(), error = %err, "path is not valid UTF-8");
            return Ok(response(StatusCode::BAD_REQUEST, Bytes::new()));
        }
    };
    drop(req);

    debug!(path = %path, "GET");

    let reply = match proxy.resolve(&path).await {
        Ok(content) => response(StatusCode::OK, content),
        Err(ResolveError::NotFound { .. }) => response(StatusCode::NOT_FOUND, Bytes::new()),
        Err(err) => {
            warn!(key = %path, error = %err, "unable to fetch object");
            response(StatusCode::INTERNAL_SERVER_ERROR, Bytes::from(err.to_string()))
        }
    };

    Ok(reply)
}

fn response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}

fn method_not_allowed() -> Response<Full<Bytes>> {
    let mut response = response(StatusCode::METHOD_NOT_ALLOWED, Bytes::new());
    response
        .headers_mut()
        .insert(header::ALLOW, header::HeaderValue::from_static("GET"));
    response
}

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{Stream, TryStreamExt};
use hyper::{Body, HeaderMap, Method, Response};
use hyper::header::{self, HeaderName, HeaderValue};
use lazy_static::lazy_static;
use tokio::time::timeout;

use crate::errors::GatewayError;


lazy_static! {
    static ref HOP_BY_HOP: HashSet<HeaderName> = [
        header::CONNECTION,
        HeaderName::from_static("keep-alive"),
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ]
    .into_iter()
    .collect();
}

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Client for the backend origin.
pub struct Upstream {
    client: reqwest::Client,
    timeout: Duration,
}

impl Upstream {
    pub fn new(request_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self { client, timeout: request_timeout })
    }

    /// Sends the request to `destination` and streams the response back.
    pub async fn forward(
        &self,
        method: Method,
        destination: &str,
        headers: &HeaderMap,
        client_addr: Option<SocketAddr>,
        body: Bytes,
    ) -> Result<Response<Body>, GatewayError> {
        let url = reqwest::Url::parse(destination)
            .map_err(|e| GatewayError::InvalidUri(format!("{destination}: {e}")))?;

        let mut request = self
            .client
            .request(method, url)
            .headers(upstream_headers(headers, client_addr));
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = match timeout(self.timeout, request.send()).await {
            Ok(result) => result?,
            Err(_) => return Err(GatewayError::Timeout),
        };

        let status = response.status();
        let headers = downstream_headers(response.headers());
        let mut response = Response::builder()
            .status(status)
            .body(Body::wrap_stream(response.bytes_stream()))
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        *response.headers_mut() = headers;

        Ok(response)
    }
}

/// Buffers the inbound body, refusing anything over `limit` bytes.
/// A declared `Content-Length` over the limit fails before any read.
pub async fn collect_body<S, B, E>(
    headers: &HeaderMap,
    body: S,
    limit: u64,
) -> Result<Bytes, GatewayError>
where
    S: Stream<Item = Result<B, E>>,
    B: Buf,
    E: std::fmt::Display,
{
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(GatewayError::PayloadTooLarge(limit));
    }

    futures::pin_mut!(body);
    let mut buf = BytesMut::new();
    while let Some(chunk) = body
        .try_next()
        .await
        .map_err(|e| GatewayError::Body(e.to_string()))?
    {
        if (buf.len() + chunk.remaining()) as u64 > limit {
            return Err(GatewayError::PayloadTooLarge(limit));
        }
        buf.put(chunk);
    }

    Ok(buf.freeze())
}

/// Headers listed in `Connection` are hop-by-hop as well.
fn connection_listed(headers: &HeaderMap) -> HashSet<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect()
}

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !HOP_BY_HOP.contains(name) && !listed.contains(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Inbound headers as sent to the backend. `Host` and `Content-Length`
/// are left to the client.
pub fn upstream_headers(inbound: &HeaderMap, client_addr: Option<SocketAddr>) -> HeaderMap {
    let mut headers = end_to_end(inbound);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let forwarded = match inbound.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}, {ip}"),
            _ => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    if let Some(host) = inbound.get(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    headers
}

/// Backend response headers as returned to the client.
pub fn downstream_headers(upstream: &HeaderMap) -> HeaderMap {
    end_to_end(upstream)
}

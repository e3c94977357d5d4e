use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Buf;
use futures::Stream;
use hyper::{Body, HeaderMap, Method, Response, StatusCode};
use warp::{path::FullPath, Reply};

use crate::models::{AppState, ErrorBody, Matched};
use crate::services::collect_body;

#[cfg(test)]
mod tests;

/// Resolves the rewrite destination, or rejects so page routing can
/// take the request.
pub async fn match_route(
    path: FullPath,
    query: String,
    state: Arc<AppState>,
) -> Result<Matched, warp::Rejection> {
    let query = Some(query.as_str()).filter(|q| !q.is_empty());
    match state.table.resolve(path.as_str(), query) {
        Some(destination) => Ok(Matched {
            path: path.as_str().to_string(),
            destination,
        }),
        None => Err(warp::reject::not_found()),
    }
}

pub async fn proxy<S, B>(
    matched: Matched,
    method: Method,
    headers: HeaderMap,
    remote: Option<SocketAddr>,
    body: S,
    state: Arc<AppState>,
) -> Result<Response<Body>, warp::Rejection>
where
    S: Stream<Item = Result<B, warp::Error>> + Send,
    B: Buf + Send,
{
    let start_time = Instant::now();

    let forwarded = match collect_body(&headers, body, state.max_body_bytes).await {
        Ok(body) => {
            state
                .upstream
                .forward(method.clone(), &matched.destination, &headers, remote, body)
                .await
        }
        Err(e) => Err(e),
    };

    let mut response = match forwarded {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                %method,
                path = %matched.path,
                destination = %matched.destination,
                error = %e,
                "forwarding failed"
            );
            error_response(e.status(), &e.to_string())
        }
    };

    state.table.apply_headers(&matched.path, response.headers_mut());

    tracing::info!(
        %method,
        path = %matched.path,
        status = response.status().as_u16(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "proxied"
    );

    Ok(response)
}

pub fn error_response(code: StatusCode, message: &str) -> Response<Body> {
    let body = ErrorBody {
        error: message.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), code).into_response()
}

pub async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(error_response(code, message))
}

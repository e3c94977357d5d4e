use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use hyper::{Body, Response};
use warp::filters::BoxedFilter;
use warp::{Filter, Rejection, Reply};

use crate::handlers;
use crate::models::AppState;

/// Rewritten routes first, then static pages, then JSON errors.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let static_dir = state.static_dir.clone();

    proxy(state)
        .or(pages(static_dir))
        .recover(handlers::handle_rejection)
        .with(warp::trace::request())
}

pub fn proxy(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Response<Body>,), Error = Rejection> + Clone {
    warp::path::full()
        .and(warp::query::raw().or_else(|_| async { Ok::<(String,), Infallible>((String::new(),)) }))
        .and(with_state(state.clone()))
        .and_then(handlers::match_route)
        .and(warp::method())
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and(warp::body::stream())
        .and(with_state(state))
        .and_then(handlers::proxy)
}

fn pages(static_dir: Option<PathBuf>) -> BoxedFilter<(warp::fs::File,)> {
    match static_dir {
        Some(dir) => warp::fs::dir(dir).boxed(),
        None => warp::any()
            .and_then(|| async { Err::<warp::fs::File, Rejection>(warp::reject::not_found()) })
            .boxed(),
    }
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

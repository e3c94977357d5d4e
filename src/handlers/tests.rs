use hyper::StatusCode;
use warp::Reply;

use crate::handlers::{error_response, handle_rejection};

async fn body_json(response: warp::reply::Response) -> serde_json::Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_handle_not_found_rejection() {
    let rejection = warp::reject::not_found();
    let response = handle_rejection(rejection).await.unwrap().into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Not Found");
}

#[tokio::test]
async fn test_handle_unknown_rejection() {
    #[derive(Debug)]
    struct Unknown;
    impl warp::reject::Reject for Unknown {}

    let rejection = warp::reject::custom(Unknown);
    let response = handle_rejection(rejection).await.unwrap().into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_error_response_is_json() {
    let response = error_response(StatusCode::BAD_GATEWAY, "Upstream unavailable: refused");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers().get("content-type").unwrap(), "application/json");
    assert_eq!(body_json(response).await["error"], "Upstream unavailable: refused");
}

//! In-process checks of the mock server's routes via tower's oneshot,
//! without binding a socket.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn status_endpoint_echoes_the_code() {
    let app = mock_server::app();
    let response = app
        .oneshot(Request::get("/status/418").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
}

#[tokio::test]
async fn echo_returns_form_fields_as_json() {
    let app = mock_server::app();
    let response = app
        .oneshot(
            Request::post("/echo")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("name=bolt&qty=2"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["name"], "bolt");
    assert_eq!(value["qty"], "2");
}

#[tokio::test]
async fn count_increments_per_request() {
    let app = mock_server::app();
    let first = app
        .clone()
        .oneshot(Request::get("/count").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let second = app
        .oneshot(Request::get("/count").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(first).await["count"], 1);
    assert_eq!(json_body(second).await["count"], 2);
}

#[tokio::test]
async fn items_create_then_fetch() {
    let app = mock_server::app();
    let created = app
        .clone()
        .oneshot(
            Request::post("/items")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("name=bolt&qty=3"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let item = json_body(created).await;
    let id = item["id"].as_str().unwrap().to_string();

    let fetched = app
        .oneshot(
            Request::get(format!("/items/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json_body(fetched).await["name"], "bolt");
}

#[tokio::test]
async fn missing_item_is_404() {
    let app = mock_server::app();
    let response = app
        .oneshot(
            Request::get("/items/00000000-0000-0000-0000-000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

//! End-to-end tests against a running server.

use std::time::Duration;

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;

mod common;
use common::{cookie_pair, message_body, signed_init_data, start_server, test_config};

#[tokio::test]
async fn test_login_then_fetch_profile() {
    let server = start_server(test_config()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/auth/telegram"))
        .json(&serde_json::json!({ "initData": signed_init_data(555, "Grace") }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let cookie = cookie_pair(res.headers()[SET_COOKIE].to_str().unwrap());

    let res = client
        .get(server.url("/api/user/me"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["id"], 555);
    assert_eq!(body["first_name"], "Grace");

    let res = client
        .post(server.url("/api/auth/logout"))
        .header(COOKIE, &cookie)
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()[SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_message_caps_over_http() {
    let server = start_server(test_config()).await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for _ in 0..6 {
        let res = client
            .post(server.url("/api/message/"))
            .json(&message_body("e2e"))
            .send()
            .await
            .unwrap();
        statuses.push(res.status());
    }

    assert_eq!(&statuses[..5], &[StatusCode::CREATED; 5]);
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);

    let res = client
        .get(server.url("/api/message/?client_id=e2e"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["messages"].as_array().unwrap().len(), 5);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_health_and_cors() {
    let server = start_server(test_config()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/health"))
        .header("origin", "http://localhost:3030")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "http://localhost:3030"
    );
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let server = start_server(test_config()).await;

    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    drop(res);

    server.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

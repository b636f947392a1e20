//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::response::Response;
use chrono::Utc;
use miniapp_gateway::config::AppConfig;
use miniapp_gateway::security::handshake::sign_init_data;
use miniapp_gateway::store::{InMemoryMessageStore, InMemoryUserStore, Message};
use miniapp_gateway::{HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const BOT_TOKEN: &str = "123456:TEST-BOT-TOKEN";
pub const COOKIE_KEY: &str = "0123456789abcdef0123456789abcdef";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.auth.bot_token = BOT_TOKEN.to_string();
    config.session.cookie_key = COOKIE_KEY.to_string();
    config
}

/// A stored message created `age_secs` ago.
#[allow(dead_code)]
pub fn message(client_id: &str, age_secs: i64) -> Message {
    let at = Utc::now() - chrono::Duration::seconds(age_secs);
    Message {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: client_id.to_string(),
        client_secret: "secret".to_string(),
        message: "hello".to_string(),
        name: "tester".to_string(),
        is_active: true,
        created_at: at,
        updated_at: at,
    }
}

#[allow(dead_code)]
pub fn message_body(client_id: &str) -> serde_json::Value {
    serde_json::json!({
        "client_id": client_id,
        "client_secret": "secret",
        "message": "hello",
        "name": "tester",
    })
}

/// A correctly signed handshake payload for `user_id`.
pub fn signed_init_data(user_id: i64, first_name: &str) -> String {
    let user = serde_json::json!({
        "id": user_id,
        "first_name": first_name,
        "username": "tester",
        "language_code": "en",
    })
    .to_string();
    sign_init_data(
        &[
            ("query_id", "AAH-test"),
            ("user", &user),
            ("auth_date", "1700000000"),
        ],
        BOT_TOKEN,
    )
}

/// The `name=value` part of a `Set-Cookie` header.
#[allow(dead_code)]
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub messages: InMemoryMessageStore,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    #[allow(dead_code)]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the real server on a loopback port with in-memory stores.
#[allow(dead_code)]
pub async fn start_server(config: AppConfig) -> TestServer {
    let messages = InMemoryMessageStore::new();
    let server = HttpServer::with_stores(
        config,
        Arc::new(InMemoryUserStore::new()),
        Arc::new(messages.clone()),
    )
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        messages,
        shutdown,
        handle,
    }
}

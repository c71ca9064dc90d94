#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use serde_json::{Value, json};

use courier_api::auth::{AppState, AppStateInner};
use courier_api::clock::SystemClock;
use courier_api::files::FileStore;
use courier_api::router;
use courier_api::service::Service;
use courier_db::Database;

pub struct TestApp {
    pub server: TestServer,
    pub upload_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.upload_dir).ok();
    }
}

/// The real router over an in-memory database and a throwaway upload dir.
pub async fn setup() -> TestApp {
    let upload_dir = std::env::temp_dir().join(format!("courier-test-{}", uuid::Uuid::new_v4()));
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    let files = FileStore::new(&upload_dir).await.expect("Failed to create upload dir");

    let state: AppState = Arc::new(AppStateInner {
        service: Service::new(Arc::new(db), Arc::new(SystemClock)),
        files,
    });
    let server = TestServer::new(router::build(state, 1024 * 1024)).unwrap();

    TestApp { server, upload_dir }
}

pub fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        format!("Bearer {}", token).parse().unwrap(),
    )
}

/// Logs in (registering on first use) and returns the bearer token.
pub async fn login(server: &TestServer, username: &str) -> String {
    let res = server.post("/session").json(&json!({ "username": username })).await;
    let body: Value = res.json();
    body["identifier"].as_str().unwrap().to_string()
}

pub async fn create_private(server: &TestServer, token: &str, other: &str) -> Value {
    let (h, v) = auth_header(token);
    server
        .post("/conversations")
        .add_header(h, v)
        .json(&json!({ "type": "private", "user_id": other }))
        .await
        .json()
}

pub async fn create_group(server: &TestServer, token: &str, name: &str, members: &[&str]) -> Value {
    let (h, v) = auth_header(token);
    server
        .post("/conversations")
        .add_header(h, v)
        .json(&json!({ "type": "group", "name": name, "members": members }))
        .await
        .json()
}

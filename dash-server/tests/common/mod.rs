#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use dash_server::auth::{User, hash_password};
use dash_server::db::DbService;
use dash_server::pubsub::MemoryBroker;
use dash_server::{Config, ServerState};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use shared::{Dish, DishExtra, Role};
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub state: ServerState,
    pub broker: MemoryBroker,
    pub app: Router,
    _dir: TempDir,
}

pub const KITCHEN_EMAIL: &str = "kitchen@dash.local";
pub const CUSTOMER_EMAIL: &str = "customer@dash.local";
pub const PASSWORD: &str = "secret-pass";

pub fn test_app() -> TestApp {
    test_app_with(|_| {})
}

/// Same fixture, with config tweaks applied before the state is built
pub fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_overrides(dir.path().to_string_lossy().to_string(), 0);
    configure(&mut config);
    config.ensure_work_dir_structure().unwrap();
    let db = DbService::open(config.database_dir().join("dash.redb")).unwrap();
    let broker = MemoryBroker::new();
    let state = ServerState::with_broker(&config, db, Arc::new(broker.clone())).unwrap();

    state
        .dishes
        .upsert(&[
            Dish {
                id: "D1".into(),
                title: "Burger".into(),
                description: Some("House burger".into()),
                cost_unit: 10.0,
                id_categories: vec!["mains".into()],
                preview_image: None,
                extras: vec![DishExtra {
                    name: "Cheese".into(),
                    cost: 1.0,
                }],
            },
            Dish {
                id: "D2".into(),
                title: "Fries".into(),
                description: None,
                cost_unit: 3.5,
                id_categories: vec!["sides".into()],
                preview_image: None,
                extras: vec![],
            },
        ])
        .unwrap();

    for (i, (email, role)) in [(KITCHEN_EMAIL, Role::Kitchen), (CUSTOMER_EMAIL, Role::Customer)]
        .into_iter()
        .enumerate()
    {
        state
            .users
            .upsert(&User {
                id: format!("u-{}", i + 1),
                email: email.into(),
                password_hash: hash_password(PASSWORD).unwrap(),
                role,
            })
            .unwrap();
    }

    let app = dash_server::api::build_app(&state);
    TestApp {
        state,
        broker,
        app,
        _dir: dir,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn login(&self, email: &str) -> String {
        let res = self
            .send(json_request(
                "POST",
                "/login",
                None,
                serde_json::json!({"email": email, "password": PASSWORD}),
            ))
            .await;
        assert_eq!(res.status, StatusCode::OK, "{}", res.body);
        res.body["session_id"].as_str().unwrap().to_string()
    }
}

pub fn json_request(method: &str, uri: &str, session: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(session) = session {
        builder = builder.header("session-id", session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(session) = session {
        builder = builder.header("session-id", session);
    }
    builder.body(Body::empty()).unwrap()
}

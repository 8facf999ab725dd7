//! End-to-end: HTTP checkout → broker → relay → hub → WebSocket

mod common;

use std::time::Duration;

use common::{CUSTOMER_EMAIL, KITCHEN_EMAIL, json_request, test_app};
use futures::StreamExt;
use serde_json::json;
use shared::{Order, OrderStatus};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{self, Message};

async fn serve(app: axum::Router) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn next_order<S>(ws: &mut S) -> Order
where
    S: futures::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("no order pushed in time")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_checkout_reaches_kitchen_socket() {
    let app = test_app();
    let tasks = app.state.start_background_tasks();
    let addr = serve(app.app.clone()).await;

    let kitchen = app.login(KITCHEN_EMAIL).await;
    let customer = app.login(CUSTOMER_EMAIL).await;

    let (mut ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{}/ws/orders?session-id={}", addr, kitchen))
            .await
            .unwrap();

    let res = app
        .send(json_request(
            "POST",
            "/orders",
            Some(&customer),
            json!({"items": [{"id_dish": "D2", "quantity": 2}], "type": "dinein"}),
        ))
        .await;
    assert_eq!(res.status, http::StatusCode::CREATED);
    let id = res.body["_id"].as_str().unwrap().to_string();

    let pushed = next_order(&mut ws).await;
    assert_eq!(pushed.id, id);
    assert_eq!(pushed.status, OrderStatus::Preparing);
    assert_eq!(pushed.total_cost, 7.0);

    let res = app
        .send(json_request(
            "PUT",
            &format!("/orders/{}/status", id),
            Some(&kitchen),
            json!({"status": "done"}),
        ))
        .await;
    assert_eq!(res.status, http::StatusCode::OK);

    let pushed = next_order(&mut ws).await;
    assert_eq!(pushed.id, id);
    assert_eq!(pushed.status, OrderStatus::Done);
    assert_eq!(pushed.version, 2);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_socket_subscribed_when_handshake_returns() {
    let app = test_app();
    let addr = serve(app.app.clone()).await;
    let kitchen = app.login(KITCHEN_EMAIL).await;
    let customer = app.login(CUSTOMER_EMAIL).await;

    let created = app
        .send(json_request(
            "POST",
            "/orders",
            Some(&customer),
            json!({"items": [{"id_dish": "D1", "quantity": 1}], "type": "delivery"}),
        ))
        .await;
    let order: Order = serde_json::from_value(created.body).unwrap();

    let (mut ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{}/ws/orders?session-id={}", addr, kitchen))
            .await
            .unwrap();

    // 不等待 session 任务启动，直接广播
    assert_eq!(app.state.hub.publish(order.clone()), 1);
    assert_eq!(next_order(&mut ws).await, order);
}

#[tokio::test]
async fn test_socket_requires_session() {
    let app = test_app();
    let addr = serve(app.app.clone()).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{}/ws/orders", addr))
        .await
        .unwrap_err();
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED)
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = tokio_tungstenite::connect_async(format!("ws://{}/ws/orders?session-id=bogus", addr))
        .await
        .unwrap_err();
    assert!(matches!(err, tungstenite::Error::Http(_)));
    assert_eq!(app.state.hub.connection_count(), 0);
}

#[tokio::test]
async fn test_shutdown_closes_socket() {
    let app = test_app();
    let addr = serve(app.app.clone()).await;
    let kitchen = app.login(KITCHEN_EMAIL).await;

    let (mut ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{}/ws/orders?session-id={}", addr, kitchen))
            .await
            .unwrap();

    app.state.shutdown_token.cancel();
    let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match msg {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1001),
        other => panic!("expected close frame, got {other:?}"),
    }
}

//! ApiClient + OrderFeed against a live dash-server (memory broker)

use std::sync::Arc;
use std::time::Duration;

use dash_client::{
    ApiClient, Applied, ClientConfig, ClientError, ConnectionState, FeedEvent, OrderBoard,
    AdminFilter, Cart, OrderFeed, OrderQuery, Propagation,
};
use dash_server::auth::{User, hash_password};
use dash_server::db::DbService;
use dash_server::pubsub::MemoryBroker;
use dash_server::{Config, ServerState};
use shared::{Dish, ErrorCode, OrderItem, OrderStatus, OrderType, Role};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const EMAIL: &str = "kitchen@dash.local";
const PASSWORD: &str = "kitchen-pass";

struct Harness {
    state: ServerState,
    config: ClientConfig,
    _dir: tempfile::TempDir,
}

async fn start_server() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let server_config = Config::with_overrides(dir.path().to_string_lossy().to_string(), 0);
    server_config.ensure_work_dir_structure().unwrap();
    let db = DbService::open(server_config.database_dir().join("dash.redb")).unwrap();
    let state =
        ServerState::with_broker(&server_config, db, Arc::new(MemoryBroker::new())).unwrap();

    state
        .dishes
        .upsert(&[Dish {
            id: "D1".into(),
            title: "Burger".into(),
            description: None,
            cost_unit: 10.0,
            id_categories: vec![],
            preview_image: None,
            extras: vec![],
        }])
        .unwrap();
    state
        .users
        .upsert(&User {
            id: "u-1".into(),
            email: EMAIL.into(),
            password_hash: hash_password(PASSWORD).unwrap(),
            role: Role::Kitchen,
        })
        .unwrap();

    // 句柄丢弃后 relay 继续运行，随测试 runtime 退出
    drop(state.start_background_tasks());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = dash_server::api::build_app(&state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Harness {
        state,
        config: ClientConfig::new(format!("http://{}", addr)).with_timeout(5),
        _dir: dir,
    }
}

async fn next_event(rx: &mut mpsc::Receiver<FeedEvent>) -> FeedEvent {
    tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("feed event timeout")
        .expect("feed closed")
}

fn burger(quantity: u32) -> Vec<OrderItem> {
    vec![OrderItem {
        id_dish: "D1".into(),
        quantity,
        selected_extras: vec![],
    }]
}

#[tokio::test]
async fn test_api_client_round_trip() {
    let h = start_server().await;
    let mut api = ApiClient::new(&h.config).unwrap();

    let err = api.list_orders(&OrderQuery::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));

    let login = api.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(login.role, Role::Kitchen);

    let created = api.create_order(burger(2), OrderType::Dinein).await.unwrap();
    assert_eq!(created.propagation, Propagation::Published);
    let order = created.order;
    assert_eq!(order.total_cost, 20.0);

    let err = api
        .update_status(&order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidTransition));

    let done = api.update_status(&order.id, OrderStatus::Done).await.unwrap().order;
    assert_eq!(done.version, 2);

    let listed = api.list_orders(&OrderQuery::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(api.get_order(&order.id).await.unwrap().status, OrderStatus::Done);
    assert_eq!(api.list_dishes(0, 10).await.unwrap().len(), 1);
    assert_eq!(api.load_menu().await.unwrap()[0].id, "D1");

    api.logout().await.unwrap();
    assert!(api.session_id().is_none());
}

#[tokio::test]
async fn test_register_cart_and_admin_filter() {
    let h = start_server().await;
    let mut api = ApiClient::new(&h.config).unwrap();
    api.login(EMAIL, PASSWORD).await.unwrap();

    let menu = api.load_menu().await.unwrap();
    let mut cart = Cart::new();
    cart.add(&menu[0]);
    cart.add(&menu[0]);
    cart.toggle_order_type();
    assert_eq!(cart.total(), 20.0);

    let submitted = api.create_order(cart.items(), cart.order_type()).await.unwrap();
    assert_eq!(submitted.propagation, Propagation::Published);
    assert_eq!(submitted.order.total_cost, cart.total());
    assert_eq!(submitted.order.order_type, cart.order_type());
    assert_eq!(submitted.order.items[0].quantity, 2);

    // 今天的范围命中，昨天的范围为空
    let today = submitted.order.created_at.date_naive();
    let mut filter = AdminFilter::default();
    filter.set_dates(&format!("{}..{}", today, today)).unwrap();
    let listed = api.list_orders(&filter.query()).await.unwrap();
    assert_eq!(listed.len(), 1);

    let yesterday = today.pred_opt().unwrap();
    filter.set_dates(&format!("..{}", yesterday)).unwrap();
    assert!(api.list_orders(&filter.query()).await.unwrap().is_empty());

    filter.set_dates("").unwrap();
    while filter.order_type != Some(submitted.order.order_type) {
        filter.cycle_type();
    }
    assert_eq!(api.list_orders(&filter.query()).await.unwrap().len(), 1);
    filter.cycle_type();
    let other = api.list_orders(&filter.query()).await.unwrap();
    assert!(other.iter().all(|o| o.order_type != submitted.order.order_type));
}

#[tokio::test]
async fn test_feed_backfills_then_streams() {
    let h = start_server().await;
    let mut api = ApiClient::new(&h.config).unwrap();
    api.login(EMAIL, PASSWORD).await.unwrap();

    // 订阅前已有的订单走回补
    let early = api.create_order(burger(1), OrderType::Delivery).await.unwrap().order;

    let shutdown = CancellationToken::new();
    let mut rx = OrderFeed::new(&h.config, api.clone(), shutdown.clone())
        .unwrap()
        .spawn();

    let mut board = OrderBoard::new();
    assert_eq!(next_event(&mut rx).await, FeedEvent::Connecting);
    assert_eq!(next_event(&mut rx).await, FeedEvent::Connected);
    match next_event(&mut rx).await {
        FeedEvent::Backfill(orders) => assert_eq!(board.merge_listing(orders), 1),
        other => panic!("expected backfill, got {other:?}"),
    }
    assert_eq!(board.orders()[0].id, early.id);

    // 握手完成即已订阅，回补之后的变更不会丢
    api.update_status(&early.id, OrderStatus::Done).await.unwrap();
    match next_event(&mut rx).await {
        FeedEvent::Order(order) => {
            assert_eq!(board.apply(order), Applied::Replaced);
        }
        other => panic!("expected order, got {other:?}"),
    }
    assert_eq!(board.get(&early.id).unwrap().status, OrderStatus::Done);
    assert_eq!(board.len(), 1);

    shutdown.cancel();
}

#[tokio::test]
async fn test_feed_stops_when_session_rejected() {
    let h = start_server().await;
    let api = ApiClient::new(&h.config).unwrap().with_session("bogus");

    let mut rx = OrderFeed::new(&h.config, api, CancellationToken::new())
        .unwrap()
        .with_reconnect_delay(Duration::from_millis(10))
        .spawn();

    assert_eq!(next_event(&mut rx).await, FeedEvent::Connecting);
    assert_eq!(next_event(&mut rx).await, FeedEvent::Rejected);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_feed_recovers_missed_orders_after_reconnect() {
    let h = start_server().await;
    let mut api = ApiClient::new(&h.config).unwrap();
    api.login(EMAIL, PASSWORD).await.unwrap();
    let seen = api.create_order(burger(1), OrderType::Dinein).await.unwrap().order;

    let shutdown = CancellationToken::new();
    let mut rx = OrderFeed::new(&h.config, api.clone(), shutdown.clone())
        .unwrap()
        .with_reconnect_delay(Duration::from_millis(200))
        .spawn();

    let mut board = OrderBoard::new();
    assert_eq!(next_event(&mut rx).await, FeedEvent::Connecting);
    assert_eq!(next_event(&mut rx).await, FeedEvent::Connected);
    match next_event(&mut rx).await {
        FeedEvent::Backfill(orders) => assert_eq!(board.merge_listing(orders), 1),
        other => panic!("expected backfill, got {other:?}"),
    }

    // 灌满订阅缓冲区，服务端以 1013 关闭落后的连接
    for version in 0..300 {
        let mut noise = seen.clone();
        noise.version = version;
        h.state.hub.publish(noise);
    }
    match next_event(&mut rx).await {
        FeedEvent::Disconnected(reason) => {
            assert!(reason.contains("lagged"), "{reason}");
            board.set_connection(ConnectionState::Disconnected {
                reason: Some(reason),
            });
        }
        other => panic!("expected disconnect, got {other:?}"),
    }

    // 断线期间产生的订单
    let missed = api.create_order(burger(3), OrderType::Delivery).await.unwrap().order;

    assert_eq!(next_event(&mut rx).await, FeedEvent::Connecting);
    assert_eq!(next_event(&mut rx).await, FeedEvent::Connected);
    board.set_connection(ConnectionState::Connected);
    match next_event(&mut rx).await {
        FeedEvent::Backfill(orders) => {
            assert!(orders.iter().any(|o| o.id == missed.id));
            assert_eq!(board.merge_listing(orders), 1);
        }
        other => panic!("expected backfill, got {other:?}"),
    }
    assert_eq!(board.orders()[0].id, missed.id);
    assert_eq!(board.get(&missed.id).unwrap().total_cost, 30.0);
    assert_eq!(board.connection(), &ConnectionState::Connected);
    assert_eq!(board.len(), 2);

    shutdown.cancel();
}

#[tokio::test]
async fn test_feed_reports_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(format!("http://{}", addr)).with_timeout(1);
    let api = ApiClient::new(&config).unwrap().with_session("s-1");
    let shutdown = CancellationToken::new();
    let mut rx = OrderFeed::new(&config, api, shutdown.clone())
        .unwrap()
        .with_reconnect_delay(Duration::from_millis(10))
        .spawn();

    assert_eq!(next_event(&mut rx).await, FeedEvent::Connecting);
    match next_event(&mut rx).await {
        FeedEvent::Disconnected(reason) => assert!(reason.starts_with("WebSocket error"), "{reason}"),
        other => panic!("expected disconnect, got {other:?}"),
    }
    shutdown.cancel();
}

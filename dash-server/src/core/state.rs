//! Server State

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{BackgroundTasks, BrokerKind, Config, Result};
use crate::auth::{SessionStore, UserStore};
use crate::catalog::{DishStorage, import_seed};
use crate::db::DbService;
use crate::orders::{OrderService, OrderStorage};
use crate::pubsub::{AmqpConnector, BrokerConnector, EventPublisher, MemoryBroker};
use crate::realtime::{OrderHub, OrderRelay};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 在 `main` 中构建一次，克隆进每个 handler。使用 Arc 实现浅拷贝。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | DbService | redb 数据库 |
/// | orders | OrderService | 订单生命周期 |
/// | dishes | DishStorage | 菜品目录 |
/// | users | UserStore | 用户 |
/// | sessions | SessionStore | 会话 |
/// | broker | Arc<dyn BrokerConnector> | 代理连接器 (发布器与 relay 共用) |
/// | publisher | EventPublisher | 事件发布器 |
/// | hub | OrderHub | WebSocket 广播 |
/// | shutdown_token | CancellationToken | 全局关闭信号 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub orders: OrderService,
    pub dishes: DishStorage,
    pub users: UserStore,
    pub sessions: SessionStore,
    pub broker: Arc<dyn BrokerConnector>,
    pub publisher: EventPublisher,
    pub hub: OrderHub,
    pub shutdown_token: CancellationToken,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("broker", &self.broker)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/dash.redb) 与各 store
    /// 3. 种子数据 (可选)
    /// 4. 代理连接 (按 RetryPolicy 重试，用尽即启动失败)
    pub async fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let db_path = config.database_dir().join("dash.redb");
        let db = DbService::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Database opened");

        let broker: Arc<dyn BrokerConnector> = match config.broker.kind {
            BrokerKind::Amqp => Arc::new(AmqpConnector::new(config.broker.amqp_uri())),
            BrokerKind::Memory => Arc::new(MemoryBroker::new()),
        };

        let state = Self::with_broker(config, db, broker)?;

        if let Some(seed) = &config.seed_file {
            import_seed(Path::new(seed), &state.dishes, &state.users)?;
        }

        tracing::info!(
            kind = ?config.broker.kind,
            host = %config.broker.host,
            port = config.broker.port,
            "Connecting to message broker"
        );
        state.publisher.connect().await?;

        Ok(state)
    }

    /// Wire all services on top of an opened database and a broker connector
    ///
    /// 不连接代理；用于测试和 [`initialize`](Self::initialize)。
    pub fn with_broker(
        config: &Config,
        db: DbService,
        broker: Arc<dyn BrokerConnector>,
    ) -> Result<Self> {
        let orders = OrderStorage::new(db.db.clone())?;
        let dishes = DishStorage::new(db.db.clone())?;
        let users = UserStore::new(db.db.clone())?;
        let sessions = SessionStore::new(db.db.clone(), config.session_ttl())?;

        let publisher = EventPublisher::new(broker.clone(), config.broker.retry_policy());
        let order_service = OrderService::new(
            Arc::new(orders),
            Arc::new(dishes.clone()),
            Arc::new(publisher.clone()),
        )
        .with_publish_timeout(config.publish_timeout());

        Ok(Self {
            config: config.clone(),
            db,
            orders: order_service,
            dishes,
            users,
            sessions,
            broker,
            publisher,
            hub: OrderHub::new(),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// 启动后台任务
    ///
    /// - order relay: 代理队列 → OrderHub
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new(self.shutdown_token.clone());
        let relay = OrderRelay::new(
            self.broker.clone(),
            self.config.broker.retry_policy(),
            self.hub.clone(),
        );
        tasks.spawn("order_relay", relay.run(tasks.shutdown_token()));
        tasks
    }
}

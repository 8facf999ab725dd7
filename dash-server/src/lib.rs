//! DashDish Server - 订单生命周期与实时推送
//!
//! # 架构概述
//!
//! - **订单** (`orders`): 创建、定价、持久化、状态推进
//! - **定价** (`pricing`): `rust_decimal` 计算总价
//! - **事件发布** (`pubsub`): AMQP durable 队列，统一重连策略
//! - **实时推送** (`realtime`): relay 消费队列，WebSocket 广播
//! - **认证** (`auth`): Argon2 + 不透明会话
//! - **数据库** (`db`): 嵌入式 redb
//!
//! # 模块结构
//!
//! ```text
//! dash-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── auth/          # 用户、会话、提取器
//! ├── catalog/       # 菜品目录、种子数据
//! ├── db/            # redb 句柄与存储错误
//! ├── orders/        # Order Store + Order Service
//! ├── pricing/       # Price Calculator
//! ├── pubsub/        # Event Publisher、代理抽象
//! ├── realtime/      # relay、hub、WebSocket
//! └── utils/         # 日志
//! ```

pub mod api;
pub mod auth;
pub mod catalog;
pub mod core;
pub mod db;
pub mod orders;
pub mod pricing;
pub mod pubsub;
pub mod realtime;
pub mod utils;

// Re-export 公共类型
pub use auth::CurrentSession;
pub use core::{Config, Server, ServerState};
pub use orders::{OrderService, OrderStorage};
pub use pubsub::{EventPublisher, RetryPolicy};
pub use shared::{ApiResponse, AppError, AppResult, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

// Security logging macro
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

pub fn print_banner() {
    println!(
        r#"
    ____             __    ____  _      __
   / __ \____ ______/ /_  / __ \(_)____/ /_
  / / / / __ `/ ___/ __ \/ / / / / ___/ __ \
 / /_/ / /_/ (__  ) / / / /_/ / (__  ) / / /
/_____/\__,_/____/_/ /_/_____/_/____/_/ /_/
    "#
    );
}

/// 加载 `.env`，读取配置并初始化日志
pub fn setup_environment() -> anyhow::Result<Config> {
    // .env 不存在时忽略
    let _ = dotenv::dotenv();

    let config = Config::from_env();
    let log_dir = config.logs_dir();
    init_logger_with_file(&config.log_level, config.log_json, log_dir.as_deref())?;
    Ok(config)
}

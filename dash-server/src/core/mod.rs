//! 核心模块 - 服务器配置、状态和错误定义
//!
//! # 模块结构
//!
//! - [`Config`] - 服务器配置
//! - [`ServerState`] - 服务器状态 (显式依赖注入)
//! - [`Server`] - HTTP 服务器
//! - [`BackgroundTasks`] - 后台任务 (order relay)
//! - [`ServerError`] - 启动 / 运行错误

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{BrokerConfig, BrokerKind, Config};
pub use error::{Result, ServerError};
pub use server::Server;
pub use state::ServerState;
pub use tasks::BackgroundTasks;

use thiserror::Error;

use crate::catalog::SeedError;
use crate::db::StorageError;
use crate::pubsub::BrokerError;

/// Startup and serve errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("工作目录初始化失败: {0}")]
    WorkDir(#[from] std::io::Error),

    #[error("数据库初始化失败: {0}")]
    Storage(#[from] StorageError),

    #[error("种子数据导入失败: {0}")]
    Seed(#[from] SeedError),

    /// 启动时用尽重试次数仍无法连接代理
    #[error("消息代理不可用: {0}")]
    Broker(#[from] BrokerError),

    #[error("HTTP 服务错误: {0}")]
    Serve(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

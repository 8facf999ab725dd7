//! Client configuration

use std::time::Duration;

use shared::{Order, OrderStatus};

use crate::{ClientError, ClientResult};

/// Which board the terminal shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    /// 厨房：未送达的订单，Enter 推进状态
    #[default]
    Kitchen,
    /// 管理：全部订单，可按类型和日期过滤
    Admin,
    /// 收银台：从菜单点单并提交
    Register,
}

impl Screen {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kitchen" => Some(Screen::Kitchen),
            "admin" => Some(Screen::Admin),
            "register" => Some(Screen::Register),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Kitchen => "kitchen",
            Screen::Admin => "admin",
            Screen::Register => "register",
        }
    }

    /// Whether an order belongs on this screen
    pub fn shows(&self, order: &Order) -> bool {
        match self {
            Screen::Kitchen => order.status != OrderStatus::Delivered,
            Screen::Admin => true,
            Screen::Register => false,
        }
    }

    /// Whether the screen shows the live order board
    pub fn uses_feed(&self) -> bool {
        !matches!(self, Screen::Register)
    }
}

/// Client configuration for connecting to dash-server
///
/// # 环境变量
///
/// | 变量 | 默认值 |
/// |------|--------|
/// | API_URL | http://localhost:8000 |
/// | DASH_EMAIL | (必填，终端登录) |
/// | DASH_PASSWORD | (必填，终端登录) |
/// | DASH_SCREEN | kitchen (kitchen / admin / register) |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:8000")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout: u64,
    pub email: Option<String>,
    pub password: Option<String>,
    pub screen: Screen,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: 30,
            email: None,
            password: None,
            screen: Screen::default(),
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:8000".into()),
        );
        config.email = std::env::var("DASH_EMAIL").ok().filter(|v| !v.is_empty());
        config.password = std::env::var("DASH_PASSWORD").ok().filter(|v| !v.is_empty());
        if let Ok(raw) = std::env::var("DASH_SCREEN") {
            match Screen::parse(&raw) {
                Some(screen) => config.screen = screen,
                None => tracing::warn!(value = %raw, "Unknown DASH_SCREEN, using kitchen"),
            }
        }
        config
    }

    /// Set request timeout (seconds)
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self.password = Some(password.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// 终端登录凭据，缺失时报错
    pub fn credentials(&self) -> ClientResult<(&str, &str)> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(ClientError::Config(
                "DASH_EMAIL and DASH_PASSWORD must be set".into(),
            )),
        }
    }

    /// WebSocket URL of the realtime order feed
    pub fn ws_url(&self, session_id: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws/orders?session-id={}", base, session_id)
    }
}

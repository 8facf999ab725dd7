//! 会话认证
//!
//! - [`UserStore`] - 用户 (email 唯一，Argon2 密码哈希)
//! - [`SessionStore`] - 不透明 session id，带 TTL
//! - [`CurrentSession`] - axum 提取器，读取 `session-id` header / cookie

mod extractor;
mod password;
mod session;
mod user;

pub use extractor::{CurrentSession, SESSION_HEADER, session_id_from_parts};
pub use password::{hash_password, verify_password};
pub use session::{Session, SessionStore};
pub use user::{User, UserStore};

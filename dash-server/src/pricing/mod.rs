//! Price Calculator
//!
//! 纯函数：`(items, 已解析的菜品)` → 总价。内部使用 `rust_decimal` 计算，
//! 存储为保留两位小数的 `f64`。

mod calculator;

pub use calculator::*;

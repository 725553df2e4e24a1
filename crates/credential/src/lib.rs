//! 凭证池管理 crate
//!
//! 提供多凭证轮换、本地速率预算和凭证池持久化契约。
//! 调用方在发起 AI 请求前向 [`CredentialManager`] 取凭证，
//! 请求结束后回报用量或错误，由管理器驱动轮换。
//!
//! ## 模块结构
//!
//! - `tracker` - 滑动窗口速率预算跟踪
//! - `rotation` - 凭证轮换策略（手动选择、到期回退、错误前移）
//! - `store` - 凭证存储适配器 trait 与内存实现
//! - `manager` - 凭证管理器（对外唯一入口）

mod manager;
mod rotation;
mod store;
mod tracker;

pub use manager::CredentialManager;
pub use rotation::{AddReject, RotationPolicy};
pub use store::{CredentialStore, MemoryCredentialStore};
pub use tracker::RateLimitTracker;

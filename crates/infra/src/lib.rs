//! AeroView 基础设施 crate
//!
//! 提供凭证池的 SQLite 持久化：建表、数据访问对象和
//! 实现 `CredentialStore` 契约的存储适配器。
//!
//! ## 模块结构
//!
//! - `db` - 数据库打开与初始化
//! - `schema` - 建表语句
//! - `dao` - api_keys 表的 CRUD
//! - `store` - `SqliteCredentialStore` 适配器

mod dao;
mod db;
mod schema;
mod store;

pub use dao::ApiKeyDao;
pub use db::Database;
pub use schema::create_tables;
pub use store::SqliteCredentialStore;

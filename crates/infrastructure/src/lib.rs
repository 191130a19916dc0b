//! 基础设施层实现。
//!
//! 提供 Postgres 存储、bcrypt 密码哈希和存储装配，实现应用层定义的接口。

pub mod builder;
pub mod credential_store;
pub mod db;
pub mod message_store;
pub mod migrations;
pub mod password;
pub mod token_store;

pub use builder::{refresh_lifespan, Infrastructure, InfrastructureError};
pub use credential_store::PgCredentialStore;
pub use db::create_pg_pool;
pub use message_store::PgMessageStore;
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use token_store::PgTokenStore;

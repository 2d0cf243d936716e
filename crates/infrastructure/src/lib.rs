//! 基础设施层实现。
//!
//! 提供 PostgreSQL 仓储、内嵌迁移、密码哈希以及存储装配，实现应用层定义的接口。

pub mod builder;
pub mod migrations;
pub mod password;
pub mod repository;

pub use builder::{
    Infrastructure, InfrastructureConfig, InfrastructureError, Repositories, MEMORY_DATABASE_URL,
};
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use repository::{
    create_pg_pool, PgCategoryRepository, PgChatMessageRepository, PgPostRepository, PgStorage,
    PgThreadRepository, PgUserRepository,
};

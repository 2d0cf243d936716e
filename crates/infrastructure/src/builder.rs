//! 存储装配
//!
//! `memory://` 使用进程内存储，其余地址按 PostgreSQL 连接并执行迁移。

use std::sync::Arc;

use application::{
    CategoryRepository, ChatMessageRepository, MemoryStorage, PasswordHasher, PostRepository,
    ThreadRepository, UserRepository,
};
use thiserror::Error;

use crate::{
    migrations::MIGRATOR,
    password::BcryptPasswordHasher,
    repository::{create_pg_pool, PgStorage},
};

pub const MEMORY_DATABASE_URL: &str = "memory://";

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bcrypt_cost: Option<u32>,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            database_url: MEMORY_DATABASE_URL.to_string(),
            max_connections: 5,
            bcrypt_cost: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 服务所需的全部存储端口。
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub threads: Arc<dyn ThreadRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub chat: Arc<dyn ChatMessageRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        Self {
            users: storage.clone(),
            categories: storage.clone(),
            threads: storage.clone(),
            posts: storage.clone(),
            chat: storage,
        }
    }

    pub fn postgres(storage: &PgStorage) -> Self {
        Self {
            users: storage.user_repository.clone(),
            categories: storage.category_repository.clone(),
            threads: storage.thread_repository.clone(),
            posts: storage.post_repository.clone(),
            chat: storage.chat_repository.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Infrastructure {
    pub repositories: Repositories,
    pub password_hasher: Arc<BcryptPasswordHasher>,
}

impl Infrastructure {
    pub async fn connect(config: InfrastructureConfig) -> Result<Self, InfrastructureError> {
        let repositories = if config.database_url.starts_with(MEMORY_DATABASE_URL) {
            tracing::warn!("using in-memory storage, data is lost on restart");
            Repositories::in_memory()
        } else {
            let pool = create_pg_pool(&config.database_url, config.max_connections).await?;
            MIGRATOR.run(&pool).await?;
            tracing::info!("database migrations applied");
            Repositories::postgres(&PgStorage::new(pool))
        };

        Ok(Self {
            repositories,
            password_hasher: Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost)),
        })
    }

    pub fn password_hasher_trait(&self) -> Arc<dyn PasswordHasher> {
        self.password_hasher.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_url_needs_no_database() {
        let infrastructure = Infrastructure::connect(InfrastructureConfig::default())
            .await
            .unwrap();
        assert_eq!(infrastructure.repositories.chat.count().await.unwrap(), 0);
    }
}

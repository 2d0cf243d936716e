//! 存储端口
//!
//! PostgreSQL 与内存两种实现都满足这些契约。

use async_trait::async_trait;
use domain::{
    Category, CategoryId, ChatMessage, ChatMessageId, NewChatMessage, Post, RepositoryError,
    Thread, ThreadId, Timestamp, User, UserEmail, UserId, Username,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 邮箱或用户名重复时返回 `RepositoryError::Conflict`。
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    /// 连同角色集合一起保存。
    async fn update(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError>;
    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &Username)
        -> Result<Option<User>, RepositoryError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: Category) -> Result<Category, RepositoryError>;
    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;
    /// 按创建顺序返回。
    async fn list_top_level(&self) -> Result<Vec<Category>, RepositoryError>;
    /// 按创建顺序返回。
    async fn list_children(&self, parent_id: CategoryId) -> Result<Vec<Category>, RepositoryError>;
}

#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// 主题与首帖在同一事务中写入。
    async fn create_with_original_post(
        &self,
        thread: Thread,
        original: Post,
    ) -> Result<Thread, RepositoryError>;
    async fn find_by_id(&self, id: ThreadId) -> Result<Option<Thread>, RepositoryError>;
    /// 最近有回复的主题在前。
    async fn list_by_category(&self, category_id: CategoryId)
        -> Result<Vec<Thread>, RepositoryError>;
    async fn touch(&self, id: ThreadId, last_post_at: Timestamp) -> Result<(), RepositoryError>;
    async fn count_posts(&self, id: ThreadId) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError>;
    async fn find_original(&self, thread_id: ThreadId) -> Result<Option<Post>, RepositoryError>;
    /// 按创建顺序返回。
    async fn list_by_thread(&self, thread_id: ThreadId) -> Result<Vec<Post>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// 分配递增 id 并保存。
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, RepositoryError>;
    async fn find_by_id(&self, id: ChatMessageId) -> Result<Option<ChatMessage>, RepositoryError>;
    async fn update(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError>;
    /// 不存在时返回 `RepositoryError::NotFound`。
    async fn delete(&self, id: ChatMessageId) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<usize, RepositoryError>;
    /// id 降序，最多 `limit` 条。
    async fn list_newest(&self, limit: usize) -> Result<Vec<ChatMessage>, RepositoryError>;
    /// 只保留 id 最大的 `keep` 条，返回删除数量。
    async fn retain_newest(&self, keep: usize) -> Result<usize, RepositoryError>;
}

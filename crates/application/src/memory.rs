//! 内存存储实现
//!
//! 用于服务测试、HTTP 测试以及 `memory://` 开发模式。
//! 每组数据由一把 `tokio::sync::RwLock` 保护；主题与首帖在同一把锁内写入。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use domain::{
    Category, CategoryId, ChatMessage, ChatMessageId, NewChatMessage, Post, RepositoryError,
    Thread, ThreadId, Timestamp, User, UserEmail, UserId, Username,
};
use tokio::sync::RwLock;

use crate::repository::{
    CategoryRepository, ChatMessageRepository, PostRepository, ThreadRepository, UserRepository,
};

#[derive(Default)]
struct ForumTables {
    categories: HashMap<CategoryId, Category>,
    threads: HashMap<ThreadId, Thread>,
    posts: HashMap<ThreadId, Vec<Post>>,
}

#[derive(Default)]
struct ChatTable {
    last_id: i64,
    messages: BTreeMap<ChatMessageId, ChatMessage>,
}

#[derive(Default)]
pub struct MemoryStorage {
    users: RwLock<HashMap<UserId, User>>,
    forum: RwLock<ForumTables>,
    chat: RwLock<ChatTable>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStorage {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.users.write().await;
        let duplicate = guard.values().any(|existing| {
            existing.id == user.id
                || existing.email == user.email
                || existing.username == user.username
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.users.write().await;
        match guard.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(user)
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let guard = self.users.read().await;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError> {
        let guard = self.users.read().await;
        Ok(guard.values().find(|user| &user.email == email).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let guard = self.users.read().await;
        Ok(guard.values().find(|user| &user.username == username).cloned())
    }
}

#[async_trait]
impl CategoryRepository for MemoryStorage {
    async fn create(&self, category: Category) -> Result<Category, RepositoryError> {
        let mut guard = self.forum.write().await;
        if guard.categories.contains_key(&category.id) {
            return Err(RepositoryError::Conflict);
        }
        if let Some(parent_id) = category.parent_id {
            if !guard.categories.contains_key(&parent_id) {
                return Err(RepositoryError::NotFound);
            }
        }
        guard.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self.forum.read().await.categories.get(&id).cloned())
    }

    async fn list_top_level(&self) -> Result<Vec<Category>, RepositoryError> {
        let guard = self.forum.read().await;
        let mut categories: Vec<_> = guard
            .categories
            .values()
            .filter(|category| category.is_top_level())
            .cloned()
            .collect();
        domain::category::sort_by_creation(&mut categories);
        Ok(categories)
    }

    async fn list_children(&self, parent_id: CategoryId) -> Result<Vec<Category>, RepositoryError> {
        let guard = self.forum.read().await;
        let mut children: Vec<_> = guard
            .categories
            .values()
            .filter(|category| category.parent_id == Some(parent_id))
            .cloned()
            .collect();
        domain::category::sort_by_creation(&mut children);
        Ok(children)
    }
}

#[async_trait]
impl ThreadRepository for MemoryStorage {
    async fn create_with_original_post(
        &self,
        thread: Thread,
        original: Post,
    ) -> Result<Thread, RepositoryError> {
        let mut guard = self.forum.write().await;
        if !guard.categories.contains_key(&thread.category_id) {
            return Err(RepositoryError::NotFound);
        }
        if guard.threads.contains_key(&thread.id) || original.thread_id != thread.id {
            return Err(RepositoryError::Conflict);
        }
        guard.threads.insert(thread.id, thread.clone());
        guard.posts.insert(thread.id, vec![original]);
        Ok(thread)
    }

    async fn find_by_id(&self, id: ThreadId) -> Result<Option<Thread>, RepositoryError> {
        Ok(self.forum.read().await.threads.get(&id).cloned())
    }

    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Thread>, RepositoryError> {
        let guard = self.forum.read().await;
        let mut threads: Vec<_> = guard
            .threads
            .values()
            .filter(|thread| thread.category_id == category_id)
            .cloned()
            .collect();
        threads.sort_by(|a, b| (b.last_post_at, b.id).cmp(&(a.last_post_at, a.id)));
        Ok(threads)
    }

    async fn touch(&self, id: ThreadId, last_post_at: Timestamp) -> Result<(), RepositoryError> {
        let mut guard = self.forum.write().await;
        let thread = guard.threads.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        thread.touch(last_post_at);
        Ok(())
    }

    async fn count_posts(&self, id: ThreadId) -> Result<u64, RepositoryError> {
        let guard = self.forum.read().await;
        Ok(guard.posts.get(&id).map_or(0, |posts| posts.len() as u64))
    }
}

#[async_trait]
impl PostRepository for MemoryStorage {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError> {
        let mut guard = self.forum.write().await;
        if !guard.threads.contains_key(&post.thread_id) {
            return Err(RepositoryError::NotFound);
        }
        let posts = guard.posts.entry(post.thread_id).or_default();
        if posts.iter().any(|existing| existing.id == post.id) {
            return Err(RepositoryError::Conflict);
        }
        posts.push(post.clone());
        domain::post::sort_by_creation(posts);
        Ok(post)
    }

    async fn find_original(&self, thread_id: ThreadId) -> Result<Option<Post>, RepositoryError> {
        let guard = self.forum.read().await;
        Ok(guard
            .posts
            .get(&thread_id)
            .and_then(|posts| posts.iter().find(|post| post.is_original()).cloned()))
    }

    async fn list_by_thread(&self, thread_id: ThreadId) -> Result<Vec<Post>, RepositoryError> {
        let guard = self.forum.read().await;
        Ok(guard.posts.get(&thread_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ChatMessageRepository for MemoryStorage {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, RepositoryError> {
        let mut guard = self.chat.write().await;
        guard.last_id += 1;
        let id = ChatMessageId(guard.last_id);
        let stored = message.into_message(id);
        guard.messages.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: ChatMessageId) -> Result<Option<ChatMessage>, RepositoryError> {
        Ok(self.chat.read().await.messages.get(&id).cloned())
    }

    async fn update(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let mut guard = self.chat.write().await;
        let existing = guard
            .messages
            .get_mut(&message.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = message.clone();
        Ok(message)
    }

    async fn delete(&self, id: ChatMessageId) -> Result<(), RepositoryError> {
        let mut guard = self.chat.write().await;
        guard
            .messages
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.chat.read().await.messages.len())
    }

    async fn list_newest(&self, limit: usize) -> Result<Vec<ChatMessage>, RepositoryError> {
        let guard = self.chat.read().await;
        Ok(guard.messages.values().rev().take(limit).cloned().collect())
    }

    async fn retain_newest(&self, keep: usize) -> Result<usize, RepositoryError> {
        let mut guard = self.chat.write().await;
        let excess = guard.messages.len().saturating_sub(keep);
        for _ in 0..excess {
            guard.messages.pop_first();
        }
        Ok(excess)
    }
}

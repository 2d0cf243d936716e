use std::sync::Arc;

use application::repository::{
    CategoryRepository, ChatMessageRepository, PostRepository, ThreadRepository, UserRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Category, CategoryId, CategoryName, ChatMessage, ChatMessageId, ChatText, ImageUrl,
    NewChatMessage, PasswordHash, Post, PostBody, PostId, PostTitle, RepositoryError, Role,
    RoleSet, Thread, ThreadId, Timestamp, User, UserEmail, UserId, Username,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            // unique_violation
            Some("23505") => return RepositoryError::Conflict,
            // foreign_key_violation
            Some("23503") => return RepositoryError::NotFound,
            _ => {}
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username = Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let email = UserEmail::parse(value.email).map_err(|err| invalid_data(err.to_string()))?;
        let password =
            PasswordHash::new(value.password_hash).map_err(|err| invalid_data(err.to_string()))?;
        let roles = value
            .roles
            .iter()
            .map(|role| role.parse::<Role>().map_err(|err| invalid_data(err.to_string())))
            .collect::<Result<RoleSet, _>>()?;

        Ok(User {
            id: UserId::from(value.id),
            username,
            email,
            password,
            roles,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CategoryRecord {
    id: Uuid,
    name: String,
    image_url: Option<String>,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CategoryRecord> for Category {
    type Error = RepositoryError;

    fn try_from(value: CategoryRecord) -> Result<Self, Self::Error> {
        let name = CategoryName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        let image_url =
            ImageUrl::parse_optional(value.image_url).map_err(|err| invalid_data(err.to_string()))?;

        Ok(Category {
            id: CategoryId::from(value.id),
            name,
            image_url,
            parent_id: value.parent_id.map(CategoryId::from),
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ThreadRecord {
    id: Uuid,
    category_id: Uuid,
    title: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    last_post_at: DateTime<Utc>,
}

impl TryFrom<ThreadRecord> for Thread {
    type Error = RepositoryError;

    fn try_from(value: ThreadRecord) -> Result<Self, Self::Error> {
        let title = PostTitle::parse(value.title).map_err(|err| invalid_data(err.to_string()))?;

        Ok(Thread {
            id: ThreadId::from(value.id),
            category_id: CategoryId::from(value.category_id),
            title,
            author_id: UserId::from(value.author_id),
            created_at: value.created_at,
            last_post_at: value.last_post_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PostRecord {
    id: Uuid,
    thread_id: Uuid,
    author_id: Uuid,
    title: String,
    body: String,
    parent_post_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PostRecord> for Post {
    type Error = RepositoryError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        let title = PostTitle::parse(value.title).map_err(|err| invalid_data(err.to_string()))?;
        let body = PostBody::parse(value.body).map_err(|err| invalid_data(err.to_string()))?;

        Ok(Post {
            id: PostId::from(value.id),
            thread_id: ThreadId::from(value.thread_id),
            author_id: UserId::from(value.author_id),
            title,
            body,
            parent_post: value.parent_post_id.map(PostId::from),
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatMessageRecord {
    id: i64,
    author: String,
    text: String,
    created_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
}

impl TryFrom<ChatMessageRecord> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(value: ChatMessageRecord) -> Result<Self, Self::Error> {
        let author = Username::parse(value.author).map_err(|err| invalid_data(err.to_string()))?;
        let text = ChatText::parse(value.text).map_err(|err| invalid_data(err.to_string()))?;

        Ok(ChatMessage {
            id: ChatMessageId(value.id),
            author,
            text,
            created_at: value.created_at,
            edited_at: value.edited_at,
        })
    }
}

/// 用户连同角色数组一起查询。
fn user_query(condition: &str) -> String {
    format!(
        r#"
        SELECT u.id, u.username, u.email, u.password_hash, u.created_at, u.updated_at,
               COALESCE(array_agg(r.role ORDER BY r.role) FILTER (WHERE r.role IS NOT NULL), '{{}}') AS roles
        FROM users u
        LEFT JOIN user_roles r ON r.user_id = u.id
        WHERE {condition}
        GROUP BY u.id
        "#
    )
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace_roles(
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(Uuid::from(user.id))
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_err)?;

        let roles: Vec<String> = user.roles.iter().map(|role| role.as_str().to_owned()).collect();
        sqlx::query("INSERT INTO user_roles (user_id, role) SELECT $1, UNNEST($2::text[])")
            .bind(Uuid::from(user.id))
            .bind(&roles)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(user.id))
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        Self::replace_roles(&mut tx, &user).await?;
        tx.commit().await.map_err(map_sqlx_err)?;

        self.find_by_id(user.id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, email = $3, password_hash = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(user.id))
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password.as_str())
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Self::replace_roles(&mut tx, &user).await?;
        tx.commit().await.map_err(map_sqlx_err)?;

        self.find_by_id(user.id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&user_query("u.id = $1"))
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let records = sqlx::query_as::<_, UserRecord>(&user_query("u.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        records.into_iter().map(User::try_from).collect()
    }

    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&user_query("u.email = $1"))
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&user_query("u.username = $1"))
            .bind(username.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }
}

#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: PgPool,
}

impl PgCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn create(&self, category: Category) -> Result<Category, RepositoryError> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            r#"
            INSERT INTO categories (id, name, image_url, parent_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, image_url, parent_id, created_at
            "#,
        )
        .bind(Uuid::from(category.id))
        .bind(category.name.as_str())
        .bind(category.image_url.as_ref().map(|url| url.as_str()))
        .bind(category.parent_id.map(Uuid::from))
        .bind(category.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Category::try_from(record)
    }

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, image_url, parent_id, created_at FROM categories WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Category::try_from).transpose()
    }

    async fn list_top_level(&self) -> Result<Vec<Category>, RepositoryError> {
        let records = sqlx::query_as::<_, CategoryRecord>(
            r#"
            SELECT id, name, image_url, parent_id, created_at
            FROM categories
            WHERE parent_id IS NULL
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Category::try_from).collect()
    }

    async fn list_children(&self, parent_id: CategoryId) -> Result<Vec<Category>, RepositoryError> {
        let records = sqlx::query_as::<_, CategoryRecord>(
            r#"
            SELECT id, name, image_url, parent_id, created_at
            FROM categories
            WHERE parent_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(Uuid::from(parent_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Category::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgThreadRepository {
    pool: PgPool,
}

impl PgThreadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThreadRepository for PgThreadRepository {
    async fn create_with_original_post(
        &self,
        thread: Thread,
        original: Post,
    ) -> Result<Thread, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, ThreadRecord>(
            r#"
            INSERT INTO threads (id, category_id, title, author_id, created_at, last_post_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, category_id, title, author_id, created_at, last_post_at
            "#,
        )
        .bind(Uuid::from(thread.id))
        .bind(Uuid::from(thread.category_id))
        .bind(thread.title.as_str())
        .bind(Uuid::from(thread.author_id))
        .bind(thread.created_at)
        .bind(thread.last_post_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        insert_post(&mut tx, &original).await?;
        tx.commit().await.map_err(map_sqlx_err)?;

        Thread::try_from(record)
    }

    async fn find_by_id(&self, id: ThreadId) -> Result<Option<Thread>, RepositoryError> {
        let record = sqlx::query_as::<_, ThreadRecord>(
            r#"
            SELECT id, category_id, title, author_id, created_at, last_post_at
            FROM threads WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Thread::try_from).transpose()
    }

    async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Thread>, RepositoryError> {
        let records = sqlx::query_as::<_, ThreadRecord>(
            r#"
            SELECT id, category_id, title, author_id, created_at, last_post_at
            FROM threads
            WHERE category_id = $1
            ORDER BY last_post_at DESC, id DESC
            "#,
        )
        .bind(Uuid::from(category_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Thread::try_from).collect()
    }

    async fn touch(&self, id: ThreadId, last_post_at: Timestamp) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE threads SET last_post_at = GREATEST(last_post_at, $2) WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .bind(last_post_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_posts(&self, id: ThreadId) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE thread_id = $1")
            .bind(Uuid::from(id))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

async fn insert_post(
    tx: &mut Transaction<'_, Postgres>,
    post: &Post,
) -> Result<PostRecord, RepositoryError> {
    sqlx::query_as::<_, PostRecord>(
        r#"
        INSERT INTO posts (id, thread_id, author_id, title, body, parent_post_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, thread_id, author_id, title, body, parent_post_id, created_at
        "#,
    )
    .bind(Uuid::from(post.id))
    .bind(Uuid::from(post.thread_id))
    .bind(Uuid::from(post.author_id))
    .bind(post.title.as_str())
    .bind(post.body.as_str())
    .bind(post.parent_post.map(Uuid::from))
    .bind(post.created_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(map_sqlx_err)
}

#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let record = insert_post(&mut tx, &post).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        Post::try_from(record)
    }

    async fn find_original(&self, thread_id: ThreadId) -> Result<Option<Post>, RepositoryError> {
        let record = sqlx::query_as::<_, PostRecord>(
            r#"
            SELECT id, thread_id, author_id, title, body, parent_post_id, created_at
            FROM posts
            WHERE thread_id = $1 AND parent_post_id IS NULL
            "#,
        )
        .bind(Uuid::from(thread_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Post::try_from).transpose()
    }

    async fn list_by_thread(&self, thread_id: ThreadId) -> Result<Vec<Post>, RepositoryError> {
        let records = sqlx::query_as::<_, PostRecord>(
            r#"
            SELECT id, thread_id, author_id, title, body, parent_post_id, created_at
            FROM posts
            WHERE thread_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(Uuid::from(thread_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Post::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgChatMessageRepository {
    pool: PgPool,
}

impl PgChatMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatMessageRepository for PgChatMessageRepository {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, RepositoryError> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            INSERT INTO chat_messages (author, text, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, author, text, created_at, edited_at
            "#,
        )
        .bind(message.author.as_str())
        .bind(message.text.as_str())
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        ChatMessage::try_from(record)
    }

    async fn find_by_id(&self, id: ChatMessageId) -> Result<Option<ChatMessage>, RepositoryError> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, author, text, created_at, edited_at FROM chat_messages WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(ChatMessage::try_from).transpose()
    }

    async fn update(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            UPDATE chat_messages
            SET text = $2, edited_at = $3
            WHERE id = $1
            RETURNING id, author, text, created_at, edited_at
            "#,
        )
        .bind(message.id.0)
        .bind(message.text.as_str())
        .bind(message.edited_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        ChatMessage::try_from(record)
    }

    async fn delete(&self, id: ChatMessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn list_newest(&self, limit: usize) -> Result<Vec<ChatMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            SELECT id, author, text, created_at, edited_at
            FROM chat_messages
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn retain_newest(&self, keep: usize) -> Result<usize, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM chat_messages
            WHERE id NOT IN (SELECT id FROM chat_messages ORDER BY id DESC LIMIT $1)
            "#,
        )
        .bind(to_i64(keep))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }
}

/// PostgreSQL 仓储集合。
pub struct PgStorage {
    pub user_repository: Arc<PgUserRepository>,
    pub category_repository: Arc<PgCategoryRepository>,
    pub thread_repository: Arc<PgThreadRepository>,
    pub post_repository: Arc<PgPostRepository>,
    pub chat_repository: Arc<PgChatMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            category_repository: Arc::new(PgCategoryRepository::new(pool.clone())),
            thread_repository: Arc::new(PgThreadRepository::new(pool.clone())),
            post_repository: Arc::new(PgPostRepository::new(pool.clone())),
            chat_repository: Arc::new(PgChatMessageRepository::new(pool)),
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

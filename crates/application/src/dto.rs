use domain::{Category, ChatMessage, Post, Role, Thread, Timestamp, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            username: user.username.as_str().to_owned(),
            email: user.email.as_str().to_owned(),
            roles: user.roles.to_vec(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// 帖子、主题中展示的作者信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDto {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for AuthorDto {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            username: user.username.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDto {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: Timestamp,
}

impl From<&Category> for CategoryDto {
    fn from(category: &Category) -> Self {
        Self {
            id: Uuid::from(category.id),
            name: category.name.as_str().to_owned(),
            image_url: category.image_url.as_ref().map(|url| url.as_str().to_owned()),
            parent_id: category.parent_id.map(Uuid::from),
            created_at: category.created_at,
        }
    }
}

/// 版块及其直接子版块。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTreeDto {
    #[serde(flatten)]
    pub category: CategoryDto,
    pub children: Vec<CategoryDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummaryDto {
    pub id: Uuid,
    pub title: String,
    pub author: AuthorDto,
    pub created_at: Timestamp,
    pub last_post_at: Timestamp,
    pub post_count: u64,
}

/// 打开版块时的视图：子版块与主题列表。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPageDto {
    pub category: CategoryDto,
    pub children: Vec<CategoryDto>,
    pub threads: Vec<ThreadSummaryDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDto {
    pub id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub author_id: Uuid,
    pub created_at: Timestamp,
    pub last_post_at: Timestamp,
}

impl From<&Thread> for ThreadDto {
    fn from(thread: &Thread) -> Self {
        Self {
            id: Uuid::from(thread.id),
            category_id: Uuid::from(thread.category_id),
            title: thread.title.as_str().to_owned(),
            author_id: Uuid::from(thread.author_id),
            created_at: thread.created_at,
            last_post_at: thread.last_post_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDto {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author: AuthorDto,
    pub parent_post: Option<Uuid>,
    pub created_at: Timestamp,
}

impl PostDto {
    pub fn new(post: &Post, author: AuthorDto) -> Self {
        Self {
            id: Uuid::from(post.id),
            title: post.title.as_str().to_owned(),
            body: post.body.as_str().to_owned(),
            author,
            parent_post: post.parent_post.map(Uuid::from),
            created_at: post.created_at,
        }
    }
}

/// 打开主题时的视图，帖子按创建顺序排列。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadPageDto {
    pub thread: ThreadDto,
    pub category: CategoryDto,
    pub posts: Vec<PostDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub id: i64,
    pub author: String,
    pub text: String,
    pub created_at: Timestamp,
    pub edited_at: Option<Timestamp>,
}

impl From<&ChatMessage> for ChatMessageDto {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id.0,
            author: message.author.as_str().to_owned(),
            text: message.text.as_str().to_owned(),
            created_at: message.created_at,
            edited_at: message.edited_at,
        }
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

pub const USERNAME_MAX_CHARS: usize = 50;
pub const CATEGORY_NAME_MAX_CHARS: usize = 100;
pub const IMAGE_URL_MAX_CHARS: usize = 2048;
pub const POST_TITLE_MAX_CHARS: usize = 200;
pub const POST_BODY_MAX_CHARS: usize = 10_000;
pub const CHAT_TEXT_MAX_CHARS: usize = 500;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

uuid_id!(
    /// 用户唯一标识。
    UserId
);
uuid_id!(
    /// 版块（分类）唯一标识。
    CategoryId
);
uuid_id!(
    /// 主题帖唯一标识。
    ThreadId
);
uuid_id!(
    /// 帖子唯一标识，使用 v7 以保证按创建时间有序。
    PostId
);

/// 聊天消息标识，由存储按插入顺序递增分配；数值越小越旧。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatMessageId(pub i64);

impl fmt::Display for ChatMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatMessageId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<ChatMessageId> for i64 {
    fn from(value: ChatMessageId) -> Self {
        value.0
    }
}

fn bounded_text(
    field: &str,
    value: impl Into<String>,
    max_chars: usize,
) -> Result<String, DomainError> {
    let value = value.into().trim().to_owned();
    if value.is_empty() {
        return Err(DomainError::invalid_argument(field, "cannot be empty"));
    }
    if value.chars().count() > max_chars {
        return Err(DomainError::invalid_argument(
            field,
            format!("must be at most {max_chars} characters"),
        ));
    }
    Ok(value)
}

/// 经过验证的用户名。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        bounded_text("username", value, USERNAME_MAX_CHARS).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 经过验证的邮箱。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserEmail(String);

impl UserEmail {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_lowercase();
        if value.is_empty() {
            return Err(DomainError::invalid_argument("email", "cannot be empty"));
        }
        if !value.contains('@') {
            return Err(DomainError::invalid_argument("email", "must contain '@'"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 经过外部服务生成的密码哈希。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let hash = value.into();
        if hash.trim().is_empty() {
            return Err(DomainError::invalid_argument(
                "password_hash",
                "cannot be empty",
            ));
        }
        Ok(Self(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 版块名称。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryName(String);

impl CategoryName {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        bounded_text("name", value, CATEGORY_NAME_MAX_CHARS).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 版块配图地址，仅接受 http(s)。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl(String);

impl ImageUrl {
    /// 空字符串视为未设置。
    pub fn parse_optional(value: Option<String>) -> Result<Option<Self>, DomainError> {
        match value {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => Self::parse(raw).map(Some),
        }
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = bounded_text("image_url", value, IMAGE_URL_MAX_CHARS)?;
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            return Err(DomainError::invalid_argument(
                "image_url",
                "must be an http(s) url",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 帖子标题。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTitle(String);

impl PostTitle {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        bounded_text("title", value, POST_TITLE_MAX_CHARS).map(Self)
    }

    /// 回复未填写标题时沿用主题标题。
    pub fn reply_to(thread_title: &PostTitle) -> Self {
        let title = format!("Re: {}", thread_title.as_str());
        let title: String = title.chars().take(POST_TITLE_MAX_CHARS).collect();
        Self(title)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 帖子正文。首尾空白保留，但不允许全空白。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostBody(String);

impl PostBody {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_argument("body", "cannot be empty"));
        }
        if value.chars().count() > POST_BODY_MAX_CHARS {
            return Err(DomainError::invalid_argument(
                "body",
                format!("must be at most {POST_BODY_MAX_CHARS} characters"),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 聊天消息正文。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatText(String);

impl ChatText {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        bounded_text("message", value, CHAT_TEXT_MAX_CHARS).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_text_rejects_blank_and_oversized() {
        assert!(ChatText::parse("   ").is_err());
        assert!(ChatText::parse("x".repeat(CHAT_TEXT_MAX_CHARS + 1)).is_err());

        let text = ChatText::parse("  gg wp  ").unwrap();
        assert_eq!(text.as_str(), "gg wp");
    }

    #[test]
    fn chat_text_counts_characters_not_bytes() {
        let text = "é".repeat(CHAT_TEXT_MAX_CHARS);
        assert!(ChatText::parse(text).is_ok());
    }

    #[test]
    fn image_url_must_be_http() {
        assert_eq!(ImageUrl::parse_optional(None).unwrap(), None);
        assert_eq!(ImageUrl::parse_optional(Some("  ".into())).unwrap(), None);
        assert!(ImageUrl::parse("ftp://example.com/logo.png").is_err());

        let url = ImageUrl::parse("http://i.imgur.com/soaxrw9.png").unwrap();
        assert_eq!(url.as_str(), "http://i.imgur.com/soaxrw9.png");
    }

    #[test]
    fn reply_title_is_derived_from_thread_title() {
        let title = PostTitle::parse("Patch 7.35 notes").unwrap();
        assert_eq!(PostTitle::reply_to(&title).as_str(), "Re: Patch 7.35 notes");

        let long = PostTitle::parse("a".repeat(POST_TITLE_MAX_CHARS)).unwrap();
        assert_eq!(
            PostTitle::reply_to(&long).as_str().chars().count(),
            POST_TITLE_MAX_CHARS
        );
    }

    #[test]
    fn post_body_keeps_formatting() {
        let body = PostBody::parse("  line one\n  line two\n").unwrap();
        assert_eq!(body.as_str(), "  line one\n  line two\n");
        assert!(PostBody::parse("\n\t ").is_err());
    }

    #[test]
    fn email_is_normalized() {
        let email = UserEmail::parse(" Admin@Forum.Example ").unwrap();
        assert_eq!(email.as_str(), "admin@forum.example");
        assert!(UserEmail::parse("not-an-email").is_err());
    }
}

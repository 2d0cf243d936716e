//! 聊天框
//!
//! 消息 id 由存储按插入顺序递增分配。插入后若总数超过上限，
//! 删除 id 最小的消息直到剩余数量等于下限。

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ChatMessageId, ChatText, Timestamp, Username};

pub const DEFAULT_VIEW_LIMIT: usize = 20;
pub const DEFAULT_RETENTION_UPPER: usize = 250;
pub const DEFAULT_RETENTION_LOWER: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    /// 作者用户名，冗余存储，不是外键。
    pub author: Username,
    pub text: ChatText,
    pub created_at: Timestamp,
    pub edited_at: Option<Timestamp>,
}

impl ChatMessage {
    pub fn edit(&mut self, text: ChatText, now: Timestamp) {
        self.text = text;
        self.edited_at = Some(now);
    }
}

/// 尚未分配 id 的消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub author: Username,
    pub text: ChatText,
    pub created_at: Timestamp,
}

impl NewChatMessage {
    pub fn into_message(self, id: ChatMessageId) -> ChatMessage {
        ChatMessage {
            id,
            author: self.author,
            text: self.text,
            created_at: self.created_at,
            edited_at: None,
        }
    }
}

/// 保留策略：超过 `upper` 时裁剪到 `lower`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatRetention {
    upper: usize,
    lower: usize,
}

impl ChatRetention {
    pub fn new(upper: usize, lower: usize) -> Result<Self, DomainError> {
        if lower == 0 {
            return Err(DomainError::invalid_argument(
                "retention_lower",
                "must be greater than zero",
            ));
        }
        if lower > upper {
            return Err(DomainError::invalid_argument(
                "retention_lower",
                "must not exceed retention_upper",
            ));
        }
        Ok(Self { upper, lower })
    }

    /// 需要保留的最新消息数量；无需裁剪时返回 `None`。
    pub fn trim_target(&self, stored: usize) -> Option<usize> {
        (stored > self.upper).then_some(self.lower)
    }
}

impl Default for ChatRetention {
    fn default() -> Self {
        Self {
            upper: DEFAULT_RETENTION_UPPER,
            lower: DEFAULT_RETENTION_LOWER,
        }
    }
}

/// 最近消息视图实际返回的数量：`min(requested, stored, view_limit)`。
pub fn effective_view_count(requested: Option<usize>, stored: usize, view_limit: usize) -> usize {
    requested
        .unwrap_or(view_limit)
        .min(stored)
        .min(view_limit)
}

use std::sync::Arc;

use domain::{
    effective_view_count, Actor, Capability, ChatMessageId, ChatRetention, ChatText, DomainError,
    NewChatMessage, RepositoryError,
};

use super::{gate, gate_actor};
use crate::{
    clock::Clock, dto::ChatMessageDto, error::ApplicationError, repository::ChatMessageRepository,
};

/// 聊天框参数
#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    /// 最近消息视图最多展示的条数
    pub view_limit: usize,
    pub retention: ChatRetention,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            view_limit: domain::chat::DEFAULT_VIEW_LIMIT,
            retention: ChatRetention::default(),
        }
    }
}

pub struct ChatServiceDependencies {
    pub chat_repository: Arc<dyn ChatMessageRepository>,
    pub clock: Arc<dyn Clock>,
    pub settings: ChatSettings,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 最近的消息，新消息在前。
    pub async fn list_recent(
        &self,
        actor: Option<&Actor>,
        count: Option<usize>,
    ) -> Result<Vec<ChatMessageDto>, ApplicationError> {
        gate(actor, Capability::Browse)?;

        let stored = self.deps.chat_repository.count().await?;
        let limit = effective_view_count(count, stored, self.deps.settings.view_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let messages = self.deps.chat_repository.list_newest(limit).await?;
        Ok(messages.iter().map(ChatMessageDto::from).collect())
    }

    /// 发送消息，写入后执行保留策略。
    pub async fn post_message(
        &self,
        actor: Option<&Actor>,
        text: String,
    ) -> Result<ChatMessageDto, ApplicationError> {
        let actor = gate_actor(actor, Capability::Participate)?;
        let text = ChatText::parse(text)?;

        let stored = self
            .deps
            .chat_repository
            .append(NewChatMessage {
                author: actor.username.clone(),
                text,
                created_at: self.deps.clock.now(),
            })
            .await?;

        // 消息已写入；裁剪失败只记录，下一次发送会再次裁剪
        if let Err(err) = self.apply_retention().await {
            tracing::error!(error = %err, message_id = stored.id.0, "chat retention failed");
        }
        Ok(ChatMessageDto::from(&stored))
    }

    pub async fn edit_message(
        &self,
        actor: Option<&Actor>,
        id: i64,
        text: String,
    ) -> Result<ChatMessageDto, ApplicationError> {
        let actor = gate_actor(actor, Capability::ModerateChat)?;
        let text = ChatText::parse(text)?;

        let mut message = self
            .deps
            .chat_repository
            .find_by_id(ChatMessageId(id))
            .await?
            .ok_or(DomainError::ChatMessageNotFound)?;
        message.edit(text, self.deps.clock.now());

        let updated = self
            .deps
            .chat_repository
            .update(message)
            .await
            .map_err(not_found_as_missing_message)?;

        tracing::info!(message_id = id, moderator_id = %actor.user_id, "chat message edited");
        Ok(ChatMessageDto::from(&updated))
    }

    pub async fn delete_message(
        &self,
        actor: Option<&Actor>,
        id: i64,
    ) -> Result<(), ApplicationError> {
        let actor = gate_actor(actor, Capability::ModerateChat)?;

        self.deps
            .chat_repository
            .delete(ChatMessageId(id))
            .await
            .map_err(not_found_as_missing_message)?;

        tracing::info!(message_id = id, moderator_id = %actor.user_id, "chat message deleted");
        Ok(())
    }

    async fn apply_retention(&self) -> Result<(), ApplicationError> {
        let stored = self.deps.chat_repository.count().await?;
        if let Some(keep) = self.deps.settings.retention.trim_target(stored) {
            let removed = self.deps.chat_repository.retain_newest(keep).await?;
            tracing::info!(stored, keep, removed, "chat retention applied");
        }
        Ok(())
    }
}

fn not_found_as_missing_message(err: RepositoryError) -> ApplicationError {
    match err {
        RepositoryError::NotFound => DomainError::ChatMessageNotFound.into(),
        other => other.into(),
    }
}

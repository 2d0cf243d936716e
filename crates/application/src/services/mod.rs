mod category_service;
mod chat_service;
mod thread_service;
mod user_service;

use std::collections::HashMap;

use domain::{authorize, AccessDenied, Actor, Capability, User, UserId};
use uuid::Uuid;

use crate::{dto::AuthorDto, error::ApplicationError, repository::UserRepository};

pub use category_service::{CategoryService, CategoryServiceDependencies, CreateCategoryRequest};
pub use chat_service::{ChatService, ChatServiceDependencies, ChatSettings};
pub use thread_service::{
    CreateReplyRequest, CreateThreadRequest, ThreadService, ThreadServiceDependencies,
};
pub use user_service::{
    AuthenticateUserRequest, RegisterUserRequest, UserService, UserServiceDependencies,
};

/// 门禁检查；需要登录的能力返回已确认的请求者。
fn gate(actor: Option<&Actor>, capability: Capability) -> Result<Option<&Actor>, ApplicationError> {
    if let Err(denied) = authorize(actor, capability) {
        match denied {
            AccessDenied::Unauthenticated => {
                tracing::debug!(capability = %capability, "anonymous request denied");
            }
            AccessDenied::Banned | AccessDenied::Forbidden { .. } => {
                tracing::warn!(
                    capability = %capability,
                    user_id = ?actor.map(|actor| actor.user_id),
                    reason = %denied,
                    "access denied"
                );
            }
        }
        return Err(denied.into());
    }
    Ok(actor)
}

fn gate_actor(actor: Option<&Actor>, capability: Capability) -> Result<&Actor, ApplicationError> {
    gate(actor, capability)?.ok_or_else(|| AccessDenied::Unauthenticated.into())
}

/// 批量加载作者；缺失的用户显示为占位名。
async fn load_authors(
    users: &dyn UserRepository,
    ids: impl IntoIterator<Item = UserId>,
) -> Result<HashMap<UserId, AuthorDto>, ApplicationError> {
    let mut ids: Vec<UserId> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();

    let found = users.find_by_ids(&ids).await?;
    let mut authors: HashMap<UserId, AuthorDto> = found
        .iter()
        .map(|user: &User| (user.id, AuthorDto::from(user)))
        .collect();
    for id in ids {
        authors.entry(id).or_insert_with(|| AuthorDto {
            id: Uuid::from(id),
            username: "[unknown]".to_owned(),
        });
    }
    Ok(authors)
}

fn author_of(authors: &HashMap<UserId, AuthorDto>, id: UserId) -> AuthorDto {
    authors.get(&id).cloned().unwrap_or_else(|| AuthorDto {
        id: Uuid::from(id),
        username: "[unknown]".to_owned(),
    })
}

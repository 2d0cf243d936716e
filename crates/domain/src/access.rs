//! 访问门禁
//!
//! 每个业务操作在读取输入、访问存储之前先调用 [`authorize`]。
//! 检查顺序固定：封禁 → 未登录 → 角色不足。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::role::{Role, RoleSet};
use crate::value_objects::{UserId, Username};

/// 已解析身份的请求者。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub username: Username,
    pub roles: RoleSet,
}

impl Actor {
    pub fn new(user_id: UserId, username: Username, roles: RoleSet) -> Self {
        Self {
            user_id,
            username,
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }
}

/// 操作所需的能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// 浏览版块、主题和聊天，匿名可用
    Browse,
    /// 发帖、回复、发送聊天消息
    Participate,
    ModerateChat,
    ModerateUsers,
    ManageCategories,
    ManageRoles,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Browse => "browse",
            Capability::Participate => "participate",
            Capability::ModerateChat => "moderate_chat",
            Capability::ModerateUsers => "moderate_users",
            Capability::ManageCategories => "manage_categories",
            Capability::ManageRoles => "manage_roles",
        }
    }

    pub fn requires_authentication(&self) -> bool {
        !matches!(self, Capability::Browse)
    }

    /// 满足该能力的角色；`None` 表示不限角色。
    fn required_roles(&self) -> Option<&'static [Role]> {
        match self {
            Capability::Browse | Capability::Participate => None,
            Capability::ModerateChat | Capability::ModerateUsers => {
                Some(&[Role::Admin, Role::Moderator])
            }
            Capability::ManageCategories | Capability::ManageRoles => Some(&[Role::Admin]),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 门禁拒绝原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("authentication required")]
    Unauthenticated,

    #[error("account is banned")]
    Banned,

    #[error("missing capability {capability}")]
    Forbidden { capability: Capability },
}

pub fn authorize(actor: Option<&Actor>, capability: Capability) -> Result<(), AccessDenied> {
    if actor.is_some_and(|actor| actor.roles.is_banned()) {
        return Err(AccessDenied::Banned);
    }

    let Some(actor) = actor else {
        if capability.requires_authentication() {
            return Err(AccessDenied::Unauthenticated);
        }
        return Ok(());
    };

    match capability.required_roles() {
        Some(roles) if !roles.iter().any(|role| actor.has_role(*role)) => {
            Err(AccessDenied::Forbidden { capability })
        }
        _ => Ok(()),
    }
}

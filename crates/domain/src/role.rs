//! 论坛角色
//!
//! 一个用户可以同时持有多个角色；`Banned` 是终止性角色，由访问门禁最先检查。

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// 角色类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 管理员
    Admin,
    /// 版主
    Moderator,
    /// 普通成员
    Member,
    /// 已封禁
    Banned,
    /// 撰稿人，不附带额外能力
    Writer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Moderator,
        Role::Member,
        Role::Banned,
        Role::Writer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Member => "member",
            Role::Banned => "banned",
            Role::Writer => "writer",
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    /// 忽略大小写
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "member" => Ok(Role::Member),
            "banned" => Ok(Role::Banned),
            "writer" => Ok(Role::Writer),
            _ => Err(DomainError::invalid_argument("role", format!("unknown role {s}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 用户持有的角色集合，按枚举顺序保持有序。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn member() -> Self {
        Self::from_iter([Role::Member])
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// 返回是否发生了变化。
    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn remove(&mut self, role: Role) -> bool {
        self.0.remove(&role)
    }

    pub fn is_banned(&self) -> bool {
        self.contains(Role::Banned)
    }

    pub fn is_staff(&self) -> bool {
        self.contains(Role::Admin) || self.contains(Role::Moderator)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Role> {
        self.iter().collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!("Moderator".parse::<Role>(), Ok(Role::Moderator));
        assert!(matches!(
            "owner".parse::<Role>(),
            Err(DomainError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn role_set_tracks_changes() {
        let mut roles = RoleSet::member();
        assert!(!roles.is_staff());
        assert!(roles.insert(Role::Moderator));
        assert!(!roles.insert(Role::Moderator));
        assert!(roles.is_staff());
        assert_eq!(roles.to_vec(), vec![Role::Moderator, Role::Member]);
        assert!(roles.remove(Role::Moderator));
        assert!(!roles.remove(Role::Banned));
    }
}

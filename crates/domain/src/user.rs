use serde::{Deserialize, Serialize};

use crate::access::Actor;
use crate::role::{Role, RoleSet};
use crate::value_objects::{PasswordHash, Timestamp, UserEmail, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: UserEmail,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    pub roles: RoleSet,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// 新注册用户默认为普通成员。
    pub fn register(
        id: UserId,
        username: Username,
        email: UserEmail,
        password: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password,
            roles: RoleSet::member(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_banned(&self) -> bool {
        self.roles.is_banned()
    }

    pub fn grant(&mut self, role: Role, now: Timestamp) -> bool {
        let changed = self.roles.insert(role);
        if changed {
            self.updated_at = now;
        }
        changed
    }

    pub fn revoke(&mut self, role: Role, now: Timestamp) -> bool {
        let changed = self.roles.remove(role);
        if changed {
            self.updated_at = now;
        }
        changed
    }

    pub fn to_actor(&self) -> Actor {
        Actor::new(self.id, self.username.clone(), self.roles.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn user() -> User {
        User::register(
            UserId::from(Uuid::new_v4()),
            Username::parse("gamer").unwrap(),
            UserEmail::parse("gamer@forum.example").unwrap(),
            PasswordHash::new("hash").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn registered_user_is_member() {
        let user = user();
        assert!(user.roles.contains(Role::Member));
        assert!(!user.is_banned());
        assert_eq!(user.to_actor().username.as_str(), "gamer");
    }

    #[test]
    fn grant_only_touches_on_change() {
        let mut user = user();
        let later = user.updated_at + Duration::seconds(5);

        assert!(!user.grant(Role::Member, later));
        assert_eq!(user.updated_at, user.created_at);

        assert!(user.grant(Role::Banned, later));
        assert!(user.is_banned());
        assert_eq!(user.updated_at, later);
    }

    #[test]
    fn password_is_not_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["roles"], serde_json::json!(["member"]));
    }
}

use std::sync::Arc;

use domain::{
    Actor, Capability, DomainError, RepositoryError, Role, User, UserEmail, UserId, Username,
};
use uuid::Uuid;

use super::gate_actor;
use crate::{
    clock::Clock,
    error::ApplicationError,
    password::{validate_password, PasswordHasher},
    repository::UserRepository,
};

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateUserRequest {
    pub email: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    /// 注册时自动授予 Admin 的用户名
    pub bootstrap_admins: Vec<String>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApplicationError> {
        let username = Username::parse(request.username)?;
        let email = UserEmail::parse(request.email)?;
        validate_password(&request.password)?;

        if self
            .deps
            .user_repository
            .find_by_email(&email)
            .await?
            .is_some()
            || self
                .deps
                .user_repository
                .find_by_username(&username)
                .await?
                .is_some()
        {
            return Err(DomainError::UserAlreadyExists.into());
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;

        let now = self.deps.clock.now();
        let mut user = User::register(
            UserId::from(Uuid::new_v4()),
            username,
            email,
            password_hash,
            now,
        );
        if self.is_bootstrap_admin(&user.username) {
            user.grant(Role::Admin, now);
            tracing::info!(username = %user.username, "bootstrap admin registered");
        }

        let stored = self
            .deps
            .user_repository
            .create(user)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::from(DomainError::UserAlreadyExists),
                other => other.into(),
            })?;
        tracing::info!(user_id = %stored.id, "user registered");
        Ok(stored)
    }

    /// 封禁用户仍可登录，由访问门禁阻止后续操作。
    pub async fn authenticate(
        &self,
        request: AuthenticateUserRequest,
    ) -> Result<User, ApplicationError> {
        let email = UserEmail::parse(request.email).map_err(|_| ApplicationError::Authentication)?;
        let user = self
            .deps
            .user_repository
            .find_by_email(&email)
            .await?
            .ok_or(ApplicationError::Authentication)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            return Err(ApplicationError::Authentication);
        }

        Ok(user)
    }

    /// 每个请求重新加载用户，封禁立即生效。
    pub async fn resolve_actor(&self, user_id: Uuid) -> Result<Actor, ApplicationError> {
        let user = self
            .deps
            .user_repository
            .find_by_id(UserId::from(user_id))
            .await?
            .ok_or(ApplicationError::Authentication)?;
        Ok(user.to_actor())
    }

    pub async fn ban_user(
        &self,
        actor: Option<&Actor>,
        target_id: Uuid,
    ) -> Result<User, ApplicationError> {
        let actor = gate_actor(actor, Capability::ModerateUsers)?;
        let mut target = self.find_user(target_id).await?;
        ensure_can_moderate(actor, &target)?;

        if target.grant(Role::Banned, self.deps.clock.now()) {
            target = self.deps.user_repository.update(target).await?;
            tracing::info!(user_id = %target.id, moderator_id = %actor.user_id, "user banned");
        }
        Ok(target)
    }

    pub async fn unban_user(
        &self,
        actor: Option<&Actor>,
        target_id: Uuid,
    ) -> Result<User, ApplicationError> {
        let actor = gate_actor(actor, Capability::ModerateUsers)?;
        let mut target = self.find_user(target_id).await?;
        ensure_can_moderate(actor, &target)?;

        if target.revoke(Role::Banned, self.deps.clock.now()) {
            target = self.deps.user_repository.update(target).await?;
            tracing::info!(user_id = %target.id, moderator_id = %actor.user_id, "user unbanned");
        }
        Ok(target)
    }

    pub async fn grant_role(
        &self,
        actor: Option<&Actor>,
        target_id: Uuid,
        role: Role,
    ) -> Result<User, ApplicationError> {
        let actor = gate_actor(actor, Capability::ManageRoles)?;
        let mut target = self.find_user(target_id).await?;
        if target.id == actor.user_id && role == Role::Banned {
            return Err(DomainError::OperationNotAllowed.into());
        }

        if target.grant(role, self.deps.clock.now()) {
            target = self.deps.user_repository.update(target).await?;
            tracing::info!(user_id = %target.id, role = %role, granted_by = %actor.user_id, "role granted");
        }
        Ok(target)
    }

    pub async fn revoke_role(
        &self,
        actor: Option<&Actor>,
        target_id: Uuid,
        role: Role,
    ) -> Result<User, ApplicationError> {
        let actor = gate_actor(actor, Capability::ManageRoles)?;
        let mut target = self.find_user(target_id).await?;
        if target.id == actor.user_id && role == Role::Admin {
            return Err(DomainError::OperationNotAllowed.into());
        }

        if target.revoke(role, self.deps.clock.now()) {
            target = self.deps.user_repository.update(target).await?;
            tracing::info!(user_id = %target.id, role = %role, revoked_by = %actor.user_id, "role revoked");
        }
        Ok(target)
    }

    async fn find_user(&self, id: Uuid) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(UserId::from(id))
            .await?
            .ok_or_else(|| DomainError::UserNotFound.into())
    }

    fn is_bootstrap_admin(&self, username: &Username) -> bool {
        self.deps
            .bootstrap_admins
            .iter()
            .any(|name| name.trim().eq_ignore_ascii_case(username.as_str()))
    }
}

/// 不能处理自己；版主不能处理管理员或其他版主。
fn ensure_can_moderate(actor: &Actor, target: &User) -> Result<(), ApplicationError> {
    if actor.user_id == target.id {
        return Err(DomainError::OperationNotAllowed.into());
    }
    if !actor.has_role(Role::Admin) && target.roles.is_staff() {
        tracing::warn!(
            moderator_id = %actor.user_id,
            target_id = %target.id,
            "moderator attempted to moderate staff"
        );
        return Err(DomainError::OperationNotAllowed.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use crate::password::{MockPasswordHasher, PasswordHasherError};
    use crate::services::test_support::{seed_user, SteppingClock};
    use domain::{AccessDenied, PasswordHash};

    fn plain_hasher() -> MockPasswordHasher {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .returning(|plain| Ok(PasswordHash::new(format!("hashed:{plain}")).unwrap()));
        hasher
            .expect_verify()
            .returning(|plain, hashed| Ok(hashed.as_str() == format!("hashed:{plain}")));
        hasher
    }

    fn service_with(
        storage: &Arc<MemoryStorage>,
        hasher: MockPasswordHasher,
        bootstrap_admins: Vec<String>,
    ) -> UserService {
        UserService::new(UserServiceDependencies {
            user_repository: storage.clone(),
            password_hasher: Arc::new(hasher),
            clock: Arc::new(SteppingClock::default()),
            bootstrap_admins,
        })
    }

    fn service(storage: &Arc<MemoryStorage>) -> UserService {
        service_with(storage, plain_hasher(), Vec::new())
    }

    fn register_request(username: &str) -> RegisterUserRequest {
        RegisterUserRequest {
            username: username.to_owned(),
            email: format!("{username}@example.com"),
            password: "correct horse".to_owned(),
        }
    }

    #[tokio::test]
    async fn register_and_authenticate() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(&storage);

        let user = service.register(register_request("alice")).await.unwrap();
        assert_eq!(user.roles.to_vec(), vec![Role::Member]);

        let authenticated = service
            .authenticate(AuthenticateUserRequest {
                email: "ALICE@example.com".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap();
        assert_eq!(authenticated.id, user.id);

        let err = service
            .authenticate(AuthenticateUserRequest {
                email: "alice@example.com".into(),
                password: "wrong password".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Authentication));
    }

    #[tokio::test]
    async fn duplicate_email_or_username_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(&storage);
        service.register(register_request("alice")).await.unwrap();

        let err = service
            .register(register_request("alice"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::UserAlreadyExists)
        ));

        let err = service
            .register(RegisterUserRequest {
                username: "alice".into(),
                email: "other@example.com".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_hashing() {
        let storage = Arc::new(MemoryStorage::new());
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash().never();
        let service = service_with(&storage, hasher, Vec::new());

        let err = service
            .register(RegisterUserRequest {
                username: "bob".into(),
                email: "bob@example.com".into(),
                password: "short".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn hasher_failure_is_propagated() {
        let storage = Arc::new(MemoryStorage::new());
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .returning(|_| Err(PasswordHasherError::hash_error("boom")));
        let service = service_with(&storage, hasher, Vec::new());

        let err = service.register(register_request("carol")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Password(_)));
    }

    #[tokio::test]
    async fn bootstrap_admin_gets_admin_role() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service_with(&storage, plain_hasher(), vec!["root".into()]);

        let root = service.register(register_request("root")).await.unwrap();
        assert!(root.roles.contains(Role::Admin));

        let other = service.register(register_request("guest")).await.unwrap();
        assert!(!other.roles.contains(Role::Admin));
    }

    #[tokio::test]
    async fn resolve_actor_reflects_current_roles() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(&storage);
        let admin = seed_user(&storage, "admin", &[Role::Admin]).await;
        let user = service.register(register_request("dave")).await.unwrap();

        service
            .ban_user(Some(&admin), Uuid::from(user.id))
            .await
            .unwrap();
        let actor = service.resolve_actor(Uuid::from(user.id)).await.unwrap();
        assert!(actor.roles.is_banned());

        let err = service.resolve_actor(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Authentication));
    }

    #[tokio::test]
    async fn moderator_bans_members_but_not_staff() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(&storage);
        let moderator = seed_user(&storage, "mod", &[Role::Member, Role::Moderator]).await;
        let other_mod = seed_user(&storage, "mod2", &[Role::Member, Role::Moderator]).await;
        let admin = seed_user(&storage, "admin", &[Role::Admin]).await;
        let member = seed_user(&storage, "member", &[]).await;

        let banned = service
            .ban_user(Some(&moderator), Uuid::from(member.user_id))
            .await
            .unwrap();
        assert!(banned.is_banned());

        for target in [&other_mod, &admin, &moderator] {
            let err = service
                .ban_user(Some(&moderator), Uuid::from(target.user_id))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ApplicationError::Domain(DomainError::OperationNotAllowed)
            ));
        }

        let unbanned = service
            .unban_user(Some(&admin), Uuid::from(member.user_id))
            .await
            .unwrap();
        assert!(!unbanned.is_banned());
    }

    #[tokio::test]
    async fn members_cannot_ban() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(&storage);
        let member = seed_user(&storage, "member", &[]).await;
        let victim = seed_user(&storage, "victim", &[]).await;

        let err = service
            .ban_user(Some(&member), Uuid::from(victim.user_id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Access(AccessDenied::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn admin_manages_roles() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(&storage);
        let admin = seed_user(&storage, "admin", &[Role::Admin]).await;
        let member = seed_user(&storage, "member", &[]).await;

        let promoted = service
            .grant_role(Some(&admin), Uuid::from(member.user_id), Role::Moderator)
            .await
            .unwrap();
        assert!(promoted.roles.contains(Role::Moderator));

        let demoted = service
            .revoke_role(Some(&admin), Uuid::from(member.user_id), Role::Moderator)
            .await
            .unwrap();
        assert!(!demoted.roles.contains(Role::Moderator));

        let err = service
            .revoke_role(Some(&admin), Uuid::from(admin.user_id), Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::OperationNotAllowed)
        ));

        let err = service
            .grant_role(Some(&admin), Uuid::new_v4(), Role::Writer)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::UserNotFound)
        ));
    }
}

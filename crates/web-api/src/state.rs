use std::sync::Arc;

use application::{
    CategoryService, CategoryServiceDependencies, ChatService, ChatServiceDependencies,
    ChatSettings, Clock, SystemClock, ThreadService, ThreadServiceDependencies, UserService,
    UserServiceDependencies,
};
use config::AppConfig;
use domain::{ChatRetention, DomainError};
use infrastructure::Infrastructure;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub thread_service: Arc<ThreadService>,
    pub chat_service: Arc<ChatService>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        category_service: Arc<CategoryService>,
        thread_service: Arc<ThreadService>,
        chat_service: Arc<ChatService>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            user_service,
            category_service,
            thread_service,
            chat_service,
            jwt_service,
        }
    }

    /// 用已连接的存储和配置装配全部服务；保留区间非法时返回错误。
    pub fn build(infrastructure: &Infrastructure, config: &AppConfig) -> Result<Self, DomainError> {
        let repos = &infrastructure.repositories;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let retention =
            ChatRetention::new(config.chat.retention_upper, config.chat.retention_lower)?;

        let user_service = UserService::new(UserServiceDependencies {
            user_repository: repos.users.clone(),
            password_hasher: infrastructure.password_hasher_trait(),
            clock: clock.clone(),
            bootstrap_admins: config.admin.bootstrap_admins.clone(),
        });
        let category_service = CategoryService::new(CategoryServiceDependencies {
            category_repository: repos.categories.clone(),
            thread_repository: repos.threads.clone(),
            user_repository: repos.users.clone(),
            clock: clock.clone(),
        });
        let thread_service = ThreadService::new(ThreadServiceDependencies {
            category_repository: repos.categories.clone(),
            thread_repository: repos.threads.clone(),
            post_repository: repos.posts.clone(),
            user_repository: repos.users.clone(),
            clock: clock.clone(),
        });
        let chat_service = ChatService::new(ChatServiceDependencies {
            chat_repository: repos.chat.clone(),
            clock,
            settings: ChatSettings {
                view_limit: config.chat.view_limit,
                retention,
            },
        });

        Ok(Self::new(
            Arc::new(user_service),
            Arc::new(category_service),
            Arc::new(thread_service),
            Arc::new(chat_service),
            Arc::new(JwtService::new(config.jwt.clone())),
        ))
    }
}

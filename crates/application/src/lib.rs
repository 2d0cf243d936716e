//! 应用层实现。
//!
//! 围绕领域模型的用例服务：访问门禁、输入校验，以及对存储和
//! 外部适配器（密码哈希、时钟）的抽象。

pub mod clock;
pub mod dto;
pub mod error;
pub mod memory;
pub mod password;
pub mod repository;
pub mod services;

pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use memory::MemoryStorage;
pub use password::{PasswordHasher, PasswordHasherError};
pub use repository::{
    CategoryRepository, ChatMessageRepository, PostRepository, ThreadRepository, UserRepository,
};
pub use services::{
    AuthenticateUserRequest, CategoryService, CategoryServiceDependencies, ChatService,
    ChatServiceDependencies, ChatSettings, CreateCategoryRequest, CreateReplyRequest,
    CreateThreadRequest, RegisterUserRequest, ThreadService, ThreadServiceDependencies,
    UserService, UserServiceDependencies,
};

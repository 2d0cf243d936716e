//! 论坛核心领域模型
//!
//! 版块树、主题与帖子、聊天框保留策略，以及基于角色的访问门禁。

pub mod access;
pub mod category;
pub mod chat;
pub mod errors;
pub mod post;
pub mod role;
pub mod thread;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use access::{authorize, AccessDenied, Actor, Capability};
pub use category::Category;
pub use chat::{effective_view_count, ChatMessage, ChatRetention, NewChatMessage};
pub use errors::*;
pub use post::Post;
pub use role::{Role, RoleSet};
pub use thread::Thread;
pub use user::User;
pub use value_objects::*;

use std::sync::Arc;

use domain::{
    Actor, Capability, CategoryId, DomainError, Post, PostBody, PostId, PostTitle,
    RepositoryError, Thread, ThreadId,
};
use uuid::Uuid;

use super::{author_of, gate, gate_actor, load_authors};
use crate::{
    clock::Clock,
    dto::{CategoryDto, PostDto, ThreadDto, ThreadPageDto},
    error::ApplicationError,
    repository::{CategoryRepository, PostRepository, ThreadRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct CreateThreadRequest {
    pub category_id: Uuid,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CreateReplyRequest {
    pub thread_id: Uuid,
    /// 为空时使用 "Re: <主题标题>"
    pub title: Option<String>,
    pub body: String,
}

pub struct ThreadServiceDependencies {
    pub category_repository: Arc<dyn CategoryRepository>,
    pub thread_repository: Arc<dyn ThreadRepository>,
    pub post_repository: Arc<dyn PostRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct ThreadService {
    deps: ThreadServiceDependencies,
}

impl ThreadService {
    pub fn new(deps: ThreadServiceDependencies) -> Self {
        Self { deps }
    }

    /// 在版块下创建主题及其首帖。
    pub async fn create_thread(
        &self,
        actor: Option<&Actor>,
        request: CreateThreadRequest,
    ) -> Result<ThreadPageDto, ApplicationError> {
        let actor = gate_actor(actor, Capability::Participate)?;

        let title = PostTitle::parse(request.title)?;
        let body = PostBody::parse(request.body)?;

        let category = self
            .deps
            .category_repository
            .find_by_id(CategoryId::from(request.category_id))
            .await?
            .ok_or(DomainError::CategoryNotFound)?;

        let now = self.deps.clock.now();
        let thread = Thread::new(
            ThreadId::from(Uuid::new_v4()),
            category.id,
            title.clone(),
            actor.user_id,
            now,
        );
        let original = Post::original(
            PostId::from(Uuid::now_v7()),
            thread.id,
            actor.user_id,
            title,
            body,
            now,
        );

        let thread = self
            .deps
            .thread_repository
            .create_with_original_post(thread, original)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => ApplicationError::from(DomainError::CategoryNotFound),
                other => other.into(),
            })?;

        tracing::info!(
            thread_id = %thread.id,
            category_id = %thread.category_id,
            author_id = %actor.user_id,
            "thread created"
        );

        self.page(thread).await
    }

    /// 回复主题，回复挂在首帖之下。
    pub async fn create_reply(
        &self,
        actor: Option<&Actor>,
        request: CreateReplyRequest,
    ) -> Result<ThreadPageDto, ApplicationError> {
        let actor = gate_actor(actor, Capability::Participate)?;

        let body = PostBody::parse(request.body)?;
        let title = match request.title {
            Some(raw) if !raw.trim().is_empty() => Some(PostTitle::parse(raw)?),
            _ => None,
        };

        let thread = self.find_thread(request.thread_id).await?;
        let original = self
            .deps
            .post_repository
            .find_original(thread.id)
            .await?
            .ok_or_else(|| {
                ApplicationError::infrastructure(format!("thread {} has no original post", thread.id))
            })?;

        let now = self.deps.clock.now();
        let title = title.unwrap_or_else(|| PostTitle::reply_to(&thread.title));
        let reply = Post::reply(
            PostId::from(Uuid::now_v7()),
            &original,
            actor.user_id,
            title,
            body,
            now,
        );
        let reply = self
            .deps
            .post_repository
            .create(reply)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => ApplicationError::from(DomainError::ThreadNotFound),
                other => other.into(),
            })?;
        self.deps.thread_repository.touch(thread.id, now).await?;

        tracing::info!(
            thread_id = %thread.id,
            post_id = %reply.id,
            author_id = %actor.user_id,
            "reply posted"
        );

        let thread = self.find_thread(request.thread_id).await?;
        self.page(thread).await
    }

    pub async fn open_thread(
        &self,
        actor: Option<&Actor>,
        id: Uuid,
    ) -> Result<ThreadPageDto, ApplicationError> {
        gate(actor, Capability::Browse)?;

        let thread = self.find_thread(id).await?;
        self.page(thread).await
    }

    async fn find_thread(&self, id: Uuid) -> Result<Thread, ApplicationError> {
        self.deps
            .thread_repository
            .find_by_id(ThreadId::from(id))
            .await?
            .ok_or_else(|| DomainError::ThreadNotFound.into())
    }

    async fn page(&self, thread: Thread) -> Result<ThreadPageDto, ApplicationError> {
        let category = self
            .deps
            .category_repository
            .find_by_id(thread.category_id)
            .await?
            .ok_or(DomainError::CategoryNotFound)?;
        let posts = self.deps.post_repository.list_by_thread(thread.id).await?;

        let authors = load_authors(
            self.deps.user_repository.as_ref(),
            posts.iter().map(|post| post.author_id),
        )
        .await?;

        Ok(ThreadPageDto {
            thread: ThreadDto::from(&thread),
            category: CategoryDto::from(&category),
            posts: posts
                .iter()
                .map(|post| PostDto::new(post, author_of(&authors, post.author_id)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use crate::services::test_support::{seed_user, SteppingClock};
    use domain::{Category, CategoryName, Role};

    fn service(storage: &Arc<MemoryStorage>) -> ThreadService {
        ThreadService::new(ThreadServiceDependencies {
            category_repository: storage.clone(),
            thread_repository: storage.clone(),
            post_repository: storage.clone(),
            user_repository: storage.clone(),
            clock: Arc::new(SteppingClock::default()),
        })
    }

    async fn seed_category(storage: &Arc<MemoryStorage>, name: &str) -> Uuid {
        let category = Category::new(
            CategoryId::from(Uuid::new_v4()),
            CategoryName::parse(name).unwrap(),
            None,
            None,
            chrono::Utc::now(),
        );
        let stored = CategoryRepository::create(storage.as_ref(), category)
            .await
            .unwrap();
        Uuid::from(stored.id)
    }

    fn thread_request(category_id: Uuid) -> CreateThreadRequest {
        CreateThreadRequest {
            category_id,
            title: "Best hero for beginners?".into(),
            body: "Just started playing, any tips?".into(),
        }
    }

    #[tokio::test]
    async fn new_thread_starts_with_original_post() {
        let storage = Arc::new(MemoryStorage::new());
        let member = seed_user(&storage, "newbie", &[]).await;
        let category_id = seed_category(&storage, "General Discussion").await;

        let page = service(&storage)
            .create_thread(Some(&member), thread_request(category_id))
            .await
            .unwrap();

        assert_eq!(page.category.id, category_id);
        assert_eq!(page.thread.title, "Best hero for beginners?");
        assert_eq!(page.posts.len(), 1);
        let op = &page.posts[0];
        assert_eq!(op.parent_post, None);
        assert_eq!(op.author.username, "newbie");
        assert_eq!(op.body, "Just started playing, any tips?");
    }

    #[tokio::test]
    async fn replies_follow_creation_order_and_reference_op() {
        let storage = Arc::new(MemoryStorage::new());
        let alice = seed_user(&storage, "alice", &[]).await;
        let bob = seed_user(&storage, "bob", &[]).await;
        let category_id = seed_category(&storage, "Support").await;
        let service = service(&storage);

        let page = service
            .create_thread(Some(&alice), thread_request(category_id))
            .await
            .unwrap();
        let thread_id = page.thread.id;
        let op_id = page.posts[0].id;

        service
            .create_reply(
                Some(&bob),
                CreateReplyRequest {
                    thread_id,
                    title: None,
                    body: "Try Wraith King.".into(),
                },
            )
            .await
            .unwrap();
        let page = service
            .create_reply(
                Some(&alice),
                CreateReplyRequest {
                    thread_id,
                    title: Some("Thanks".into()),
                    body: "Will do".into(),
                },
            )
            .await
            .unwrap();

        let titles: Vec<_> = page.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            ["Best hero for beginners?", "Re: Best hero for beginners?", "Thanks"]
        );
        let authors: Vec<_> = page.posts.iter().map(|p| p.author.username.as_str()).collect();
        assert_eq!(authors, ["alice", "bob", "alice"]);
        assert!(page.posts[1..].iter().all(|p| p.parent_post == Some(op_id)));
        assert!(page.thread.last_post_at > page.thread.created_at);

        let count = storage.count_posts(ThreadId::from(thread_id)).await.unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn thread_in_missing_category_fails() {
        let storage = Arc::new(MemoryStorage::new());
        let member = seed_user(&storage, "member", &[]).await;

        let err = service(&storage)
            .create_thread(Some(&member), thread_request(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::CategoryNotFound)
        ));
    }

    #[tokio::test]
    async fn reply_to_missing_thread_fails() {
        let storage = Arc::new(MemoryStorage::new());
        let member = seed_user(&storage, "member", &[]).await;

        let err = service(&storage)
            .create_reply(
                Some(&member),
                CreateReplyRequest {
                    thread_id: Uuid::new_v4(),
                    title: None,
                    body: "hello?".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::ThreadNotFound)
        ));
    }

    #[tokio::test]
    async fn banned_user_cannot_post_and_nothing_is_written() {
        let storage = Arc::new(MemoryStorage::new());
        let banned = seed_user(&storage, "troll", &[Role::Member, Role::Banned]).await;
        let category_id = seed_category(&storage, "News").await;

        let err = service(&storage)
            .create_thread(Some(&banned), thread_request(category_id))
            .await
            .unwrap_err();
        assert!(err.is_banned());

        let threads = storage
            .list_by_category(CategoryId::from(category_id))
            .await
            .unwrap();
        assert!(threads.is_empty());
    }

    #[tokio::test]
    async fn anonymous_can_read_but_not_write() {
        let storage = Arc::new(MemoryStorage::new());
        let member = seed_user(&storage, "member", &[]).await;
        let category_id = seed_category(&storage, "Media").await;
        let service = service(&storage);

        let page = service
            .create_thread(Some(&member), thread_request(category_id))
            .await
            .unwrap();

        let opened = service.open_thread(None, page.thread.id).await.unwrap();
        assert_eq!(opened.posts.len(), 1);

        let err = service
            .create_thread(None, thread_request(category_id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Access(_)));
    }

    #[tokio::test]
    async fn blank_body_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let member = seed_user(&storage, "member", &[]).await;
        let category_id = seed_category(&storage, "Media").await;

        let err = service(&storage)
            .create_thread(
                Some(&member),
                CreateThreadRequest {
                    category_id,
                    title: "Clip".into(),
                    body: "   ".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn banned_admin_cannot_reply() {
        let storage = Arc::new(MemoryStorage::new());
        let alice = seed_user(&storage, "alice", &[]).await;
        let banned = seed_user(&storage, "troll", &[Role::Member, Role::Admin, Role::Banned]).await;
        let category_id = seed_category(&storage, "General Discussion").await;
        let service = service(&storage);

        let page = service
            .create_thread(Some(&alice), thread_request(category_id))
            .await
            .unwrap();
        let thread_id = page.thread.id;

        let err = service
            .create_reply(
                Some(&banned),
                CreateReplyRequest {
                    thread_id,
                    title: None,
                    body: "spam".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_banned());

        let err = service
            .create_thread(Some(&banned), thread_request(category_id))
            .await
            .unwrap_err();
        assert!(err.is_banned());

        let count = storage.count_posts(ThreadId::from(thread_id)).await.unwrap();
        assert_eq!(count, 1);
        let threads = storage
            .list_by_category(CategoryId::from(category_id))
            .await
            .unwrap();
        assert_eq!(threads.len(), 1);
        let page = service.open_thread(None, thread_id).await.unwrap();
        assert_eq!(page.thread.last_post_at, page.thread.created_at);
    }
}

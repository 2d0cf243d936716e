use serde::{Deserialize, Serialize};

use crate::value_objects::{PostBody, PostId, PostTitle, ThreadId, Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub thread_id: ThreadId,
    pub author_id: UserId,
    pub title: PostTitle,
    pub body: PostBody,
    /// `None` 表示主题的首帖。
    pub parent_post: Option<PostId>,
    pub created_at: Timestamp,
}

impl Post {
    pub fn original(
        id: PostId,
        thread_id: ThreadId,
        author_id: UserId,
        title: PostTitle,
        body: PostBody,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            thread_id,
            author_id,
            title,
            body,
            parent_post: None,
            created_at: now,
        }
    }

    pub fn reply(
        id: PostId,
        original: &Post,
        author_id: UserId,
        title: PostTitle,
        body: PostBody,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            thread_id: original.thread_id,
            author_id,
            title,
            body,
            parent_post: Some(original.id),
            created_at: now,
        }
    }

    pub fn is_original(&self) -> bool {
        self.parent_post.is_none()
    }
}

/// 帖子按创建顺序排列：创建时间，其次 v7 id。
pub fn sort_by_creation(posts: &mut [Post]) {
    posts.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn reply_points_at_original_post() {
        let now = Utc::now();
        let op = Post::original(
            PostId::from(Uuid::now_v7()),
            ThreadId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
            PostTitle::parse("Server maintenance").unwrap(),
            PostBody::parse("Downtime tonight.").unwrap(),
            now,
        );
        let reply = Post::reply(
            PostId::from(Uuid::now_v7()),
            &op,
            UserId::from(Uuid::new_v4()),
            PostTitle::reply_to(&op.title),
            PostBody::parse("Thanks").unwrap(),
            now + Duration::seconds(1),
        );

        assert!(op.is_original());
        assert_eq!(reply.parent_post, Some(op.id));
        assert_eq!(reply.thread_id, op.thread_id);

        let mut posts = vec![reply.clone(), op.clone()];
        sort_by_creation(&mut posts);
        assert_eq!(posts[0].id, op.id);
    }
}

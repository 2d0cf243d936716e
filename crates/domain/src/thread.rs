use serde::{Deserialize, Serialize};

use crate::value_objects::{CategoryId, PostTitle, ThreadId, Timestamp, UserId};

/// 主题帖，归属于一个版块，拥有一组按创建顺序排列的帖子。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub category_id: CategoryId,
    pub title: PostTitle,
    pub author_id: UserId,
    pub created_at: Timestamp,
    pub last_post_at: Timestamp,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        category_id: CategoryId,
        title: PostTitle,
        author_id: UserId,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            category_id,
            title,
            author_id,
            created_at: now,
            last_post_at: now,
        }
    }

    /// 时间不会回退。
    pub fn touch(&mut self, at: Timestamp) {
        if at > self.last_post_at {
            self.last_post_at = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn touch_moves_forward_only() {
        let now = Utc::now();
        let mut thread = Thread::new(
            ThreadId::from(Uuid::new_v4()),
            CategoryId::from(Uuid::new_v4()),
            PostTitle::parse("Looking for a duo").unwrap(),
            UserId::from(Uuid::new_v4()),
            now,
        );

        thread.touch(now - Duration::minutes(1));
        assert_eq!(thread.last_post_at, now);

        let later = now + Duration::minutes(1);
        thread.touch(later);
        assert_eq!(thread.last_post_at, later);
    }
}

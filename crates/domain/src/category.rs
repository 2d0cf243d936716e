//! 版块树
//!
//! 没有父节点的版块是顶级版块；子版块按创建顺序排列。

use serde::{Deserialize, Serialize};

use crate::value_objects::{CategoryId, CategoryName, ImageUrl, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: CategoryName,
    pub image_url: Option<ImageUrl>,
    pub parent_id: Option<CategoryId>,
    pub created_at: Timestamp,
}

impl Category {
    pub fn new(
        id: CategoryId,
        name: CategoryName,
        image_url: Option<ImageUrl>,
        parent_id: Option<CategoryId>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            image_url,
            parent_id,
            created_at: now,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// 子版块排序：创建时间，其次 id。
pub fn sort_by_creation(categories: &mut [Category]) {
    categories.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn children_sort_by_creation_time() {
        let now = Utc::now();
        let parent = CategoryId::from(Uuid::new_v4());
        let make = |name: &str, offset: i64| {
            Category::new(
                CategoryId::from(Uuid::new_v4()),
                CategoryName::parse(name).unwrap(),
                None,
                Some(parent),
                now + Duration::seconds(offset),
            )
        };

        let mut children = vec![make("News", 2), make("General Discussion", 1), make("Media", 3)];
        sort_by_creation(&mut children);

        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["General Discussion", "News", "Media"]);
        assert!(!children[0].is_top_level());
    }
}

use std::sync::Arc;

use domain::{
    Actor, Capability, Category, CategoryId, CategoryName, DomainError, ImageUrl, RepositoryError,
};
use uuid::Uuid;

use super::{author_of, gate, load_authors};
use crate::{
    clock::Clock,
    dto::{CategoryDto, CategoryPageDto, CategoryTreeDto, ThreadSummaryDto},
    error::ApplicationError,
    repository::{CategoryRepository, ThreadRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
}

pub struct CategoryServiceDependencies {
    pub category_repository: Arc<dyn CategoryRepository>,
    pub thread_repository: Arc<dyn ThreadRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct CategoryService {
    deps: CategoryServiceDependencies,
}

impl CategoryService {
    pub fn new(deps: CategoryServiceDependencies) -> Self {
        Self { deps }
    }

    /// 论坛首页：所有顶级版块及其子版块。
    pub async fn list_top_categories(
        &self,
        actor: Option<&Actor>,
    ) -> Result<Vec<CategoryTreeDto>, ApplicationError> {
        gate(actor, Capability::Browse)?;
        self.top_level_tree().await
    }

    /// 创建版块，返回刷新后的首页列表。
    pub async fn create_category(
        &self,
        actor: Option<&Actor>,
        request: CreateCategoryRequest,
    ) -> Result<Vec<CategoryTreeDto>, ApplicationError> {
        let actor = gate(actor, Capability::ManageCategories)?;

        let name = CategoryName::parse(request.name)?;
        let image_url = ImageUrl::parse_optional(request.image_url)?;

        let parent_id = match request.parent_id {
            Some(raw) => {
                let parent = self
                    .deps
                    .category_repository
                    .find_by_id(CategoryId::from(raw))
                    .await?
                    .ok_or(DomainError::CategoryNotFound)?;
                Some(parent.id)
            }
            None => None,
        };

        let category = Category::new(
            CategoryId::from(Uuid::new_v4()),
            name,
            image_url,
            parent_id,
            self.deps.clock.now(),
        );
        let stored = self
            .deps
            .category_repository
            .create(category)
            .await
            .map_err(|err| match err {
                // 父版块在检查之后消失
                RepositoryError::NotFound => ApplicationError::from(DomainError::CategoryNotFound),
                other => other.into(),
            })?;

        tracing::info!(
            category_id = %stored.id,
            parent_id = ?stored.parent_id.map(|id| id.to_string()),
            created_by = ?actor.map(|actor| actor.user_id.to_string()),
            "category created"
        );

        self.top_level_tree().await
    }

    /// 打开版块：子版块以及该版块下的主题。
    pub async fn open_category(
        &self,
        actor: Option<&Actor>,
        id: Uuid,
    ) -> Result<CategoryPageDto, ApplicationError> {
        gate(actor, Capability::Browse)?;

        let category = self.find_category(id).await?;
        let children = self
            .deps
            .category_repository
            .list_children(category.id)
            .await?;
        let threads = self
            .deps
            .thread_repository
            .list_by_category(category.id)
            .await?;

        let authors = load_authors(
            self.deps.user_repository.as_ref(),
            threads.iter().map(|thread| thread.author_id),
        )
        .await?;

        let mut summaries = Vec::with_capacity(threads.len());
        for thread in &threads {
            let post_count = self.deps.thread_repository.count_posts(thread.id).await?;
            summaries.push(ThreadSummaryDto {
                id: Uuid::from(thread.id),
                title: thread.title.as_str().to_owned(),
                author: author_of(&authors, thread.author_id),
                created_at: thread.created_at,
                last_post_at: thread.last_post_at,
                post_count,
            });
        }

        Ok(CategoryPageDto {
            category: CategoryDto::from(&category),
            children: children.iter().map(CategoryDto::from).collect(),
            threads: summaries,
        })
    }

    /// 打开顶级版块概览：版块及其子版块。
    pub async fn open_top_category(
        &self,
        actor: Option<&Actor>,
        id: Uuid,
    ) -> Result<CategoryTreeDto, ApplicationError> {
        gate(actor, Capability::Browse)?;

        let category = self.find_category(id).await?;
        self.tree_of(&category).await
    }

    async fn find_category(&self, id: Uuid) -> Result<Category, ApplicationError> {
        self.deps
            .category_repository
            .find_by_id(CategoryId::from(id))
            .await?
            .ok_or_else(|| DomainError::CategoryNotFound.into())
    }

    async fn tree_of(&self, category: &Category) -> Result<CategoryTreeDto, ApplicationError> {
        let children = self
            .deps
            .category_repository
            .list_children(category.id)
            .await?;
        Ok(CategoryTreeDto {
            category: CategoryDto::from(category),
            children: children.iter().map(CategoryDto::from).collect(),
        })
    }

    async fn top_level_tree(&self) -> Result<Vec<CategoryTreeDto>, ApplicationError> {
        let top = self.deps.category_repository.list_top_level().await?;
        let mut tree = Vec::with_capacity(top.len());
        for category in &top {
            tree.push(self.tree_of(category).await?);
        }
        Ok(tree)
    }
}

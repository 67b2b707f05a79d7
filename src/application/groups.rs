use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;
use crate::domain::groups::validate_group;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("a group with slug `{slug}` already exists")]
    DuplicateSlug { slug: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn create(
        &self,
        slug: &str,
        title: &str,
        description: &str,
    ) -> Result<GroupRecord, GroupError> {
        let valid = validate_group(slug, title, description)?;
        if self.groups.find_group_by_slug(&valid.slug).await?.is_some() {
            return Err(GroupError::DuplicateSlug { slug: valid.slug });
        }

        let slug = valid.slug.clone();
        let group = self
            .groups
            .create_group(CreateGroupParams {
                slug: valid.slug,
                title: valid.title,
                description: valid.description,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::DuplicateSlug { slug },
                other => GroupError::Repo(other),
            })?;

        info!(group_id = group.id, slug = %group.slug, "group created");
        Ok(group)
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.groups.list_groups().await?)
    }
}

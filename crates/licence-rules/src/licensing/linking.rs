use std::collections::HashSet;
use std::sync::Arc;

use tracing::Span;

use super::domain::{CategoryStateId, GroupId, LicenceTypeId};
use super::lookup::{locate_category, CategoryLookup};
use super::payload::CategorySpec;
use super::repository::{LicenceRepository, RepositoryError};
use crate::telemetry;

/// Maintains category-state ↔ group and group ↔ licence-type associations.
pub struct GroupLinker<R> {
    repository: Arc<R>,
    span: Span,
}

impl<R> GroupLinker<R>
where
    R: LicenceRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_span(repository, telemetry::component_span("group_linker"))
    }

    pub fn with_span(repository: Arc<R>, span: Span) -> Self {
        Self { repository, span }
    }

    /// Relinks every declared jurisdiction of every category that lists groups.
    ///
    /// Failures are logged per category and never abort the remaining categories.
    pub async fn link_all_category_states_to_groups(&self, categories: &[CategorySpec]) {
        tracing::info!(parent: &self.span, categories = categories.len(), "linking category states to groups");

        for category in categories {
            if let Err(error) = self.link_category(category).await {
                tracing::error!(
                    parent: &self.span,
                    category = %category.name,
                    %error,
                    "error linking groups for category"
                );
            }
        }
    }

    async fn link_category(&self, category: &CategorySpec) -> Result<(), RepositoryError> {
        let target = match locate_category(self.repository.as_ref(), category).await? {
            CategoryLookup::Found(target) => target,
            CategoryLookup::Missing(missing) => {
                tracing::warn!(
                    parent: &self.span,
                    category = %missing.name,
                    sub_category = missing.sub_category_name.as_deref().unwrap_or(""),
                    reason = %missing.reason,
                    "skipping group links for unresolved category"
                );
                return Ok(());
            }
        };

        let sub = target.sub.as_ref().map(|sub| sub.id);
        for (state, data) in &category.states {
            if data.groups.is_empty() {
                continue;
            }
            let found = self
                .repository
                .find_category_state(target.parent.id, sub, state)
                .await?;
            match found.and_then(|record| record.id()) {
                Some(id) => self.link_licence_requirement_groups(id, &data.groups).await?,
                None => tracing::warn!(
                    parent: &self.span,
                    category = %category.name,
                    state = %state,
                    "no category state to link groups to"
                ),
            }
        }
        Ok(())
    }

    /// Replaces the group links of one category state with `group_keys`.
    ///
    /// Unknown keys are logged and skipped; a key listed twice links once.
    pub async fn link_licence_requirement_groups(
        &self,
        category_state: CategoryStateId,
        group_keys: &[String],
    ) -> Result<(), RepositoryError> {
        self.unlink_groups_from_category_state(category_state).await?;

        let mut linked = HashSet::new();
        for key in group_keys {
            if !linked.insert(key.as_str()) {
                continue;
            }
            let group = self.repository.find_group_by_key(key).await?;
            match group.and_then(|group| group.id()) {
                Some(group_id) => {
                    self.repository
                        .link_category_state_group(category_state, group_id)
                        .await?;
                    tracing::debug!(
                        parent: &self.span,
                        group = %key,
                        %category_state,
                        "linked group to category state"
                    );
                }
                None => tracing::warn!(
                    parent: &self.span,
                    group = %key,
                    %category_state,
                    "group not found"
                ),
            }
        }
        Ok(())
    }

    /// Links licence types to a group, skipping pairs that are already linked.
    pub async fn link_licence_types_to_group(
        &self,
        group: GroupId,
        licence_types: &[LicenceTypeId],
    ) -> Result<usize, RepositoryError> {
        let mut inserted = 0;
        for licence_type in licence_types {
            if self
                .repository
                .group_licence_exists(group, *licence_type)
                .await?
            {
                continue;
            }
            self.repository
                .link_group_licence(group, *licence_type)
                .await?;
            inserted += 1;
        }

        tracing::debug!(parent: &self.span, %group, inserted, "linked licence types to group");
        Ok(inserted)
    }

    pub async fn unlink_groups_from_category_state(
        &self,
        category_state: CategoryStateId,
    ) -> Result<(), RepositoryError> {
        tracing::debug!(parent: &self.span, %category_state, "unlinking groups from category state");
        self.repository
            .unlink_category_state_groups(category_state)
            .await
    }

    pub async fn clear_all_group_links(&self) -> Result<(), RepositoryError> {
        tracing::info!(parent: &self.span, "clearing all group links");
        self.repository.clear_category_state_groups().await
    }
}

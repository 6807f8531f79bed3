use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::domain::{
    AbnCondition, Authority, AuthorityId, CategoryState, CategoryStateId, CategorySummary, GroupId,
    LicenceRequirementGroup, LicenceType, LicenceTypeId, ParentCategory, ParentCategoryId,
    SubCategory, SubCategoryId,
};

/// Data-access contract the import, linking and resolution engines depend on.
///
/// A save without an id inserts and one with an id updates, except category states, which
/// upsert on their (parent, sub, state) triple. The returned value carries the store's id.
#[async_trait]
pub trait LicenceRepository: Send + Sync {
    async fn find_category_state(
        &self,
        parent: ParentCategoryId,
        sub: Option<SubCategoryId>,
        state: &str,
    ) -> Result<Option<CategoryState>, RepositoryError>;
    async fn save_category_state(
        &self,
        category_state: CategoryState,
    ) -> Result<CategoryState, RepositoryError>;
    async fn clear_category_states(&self) -> Result<(), RepositoryError>;

    async fn find_abn_conditions(
        &self,
        category_state: CategoryStateId,
    ) -> Result<Vec<AbnCondition>, RepositoryError>;
    async fn save_abn_condition(
        &self,
        condition: AbnCondition,
    ) -> Result<AbnCondition, RepositoryError>;
    async fn delete_abn_conditions(
        &self,
        category_state: CategoryStateId,
    ) -> Result<(), RepositoryError>;
    async fn clear_abn_conditions(&self) -> Result<(), RepositoryError>;

    async fn find_group_by_key(
        &self,
        key: &str,
    ) -> Result<Option<LicenceRequirementGroup>, RepositoryError>;
    async fn save_group(
        &self,
        group: LicenceRequirementGroup,
    ) -> Result<LicenceRequirementGroup, RepositoryError>;
    async fn clear_groups(&self) -> Result<(), RepositoryError>;

    /// Groups linked to a category state, in link order.
    async fn find_groups_for_category_state(
        &self,
        category_state: CategoryStateId,
    ) -> Result<Vec<LicenceRequirementGroup>, RepositoryError>;
    async fn link_category_state_group(
        &self,
        category_state: CategoryStateId,
        group: GroupId,
    ) -> Result<(), RepositoryError>;
    async fn unlink_category_state_groups(
        &self,
        category_state: CategoryStateId,
    ) -> Result<(), RepositoryError>;
    async fn clear_category_state_groups(&self) -> Result<(), RepositoryError>;

    async fn group_licence_exists(
        &self,
        group: GroupId,
        licence_type: LicenceTypeId,
    ) -> Result<bool, RepositoryError>;
    async fn link_group_licence(
        &self,
        group: GroupId,
        licence_type: LicenceTypeId,
    ) -> Result<(), RepositoryError>;
    /// Member licence types of a group, in link order.
    async fn find_licence_types_for_group(
        &self,
        group: GroupId,
    ) -> Result<Vec<LicenceType>, RepositoryError>;
    async fn clear_group_licences(&self) -> Result<(), RepositoryError>;

    async fn find_licence_type(&self, name: &str) -> Result<Option<LicenceType>, RepositoryError>;
    async fn save_licence_type(
        &self,
        licence_type: LicenceType,
    ) -> Result<LicenceType, RepositoryError>;
    async fn clear_licence_types(&self) -> Result<(), RepositoryError>;

    async fn find_authority(&self, name: &str) -> Result<Option<Authority>, RepositoryError>;
    async fn save_authority(&self, authority: Authority) -> Result<Authority, RepositoryError>;
    async fn clear_authorities(&self) -> Result<(), RepositoryError>;

    async fn find_parent_category(
        &self,
        id: ParentCategoryId,
    ) -> Result<Option<ParentCategory>, RepositoryError>;
    async fn find_parent_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ParentCategory>, RepositoryError>;
    async fn find_sub_category(
        &self,
        id: SubCategoryId,
    ) -> Result<Option<SubCategory>, RepositoryError>;
    /// `parent` restricts the match to that parent's sub-categories; `None` searches all.
    async fn find_sub_category_by_name(
        &self,
        parent: Option<ParentCategoryId>,
        name: &str,
    ) -> Result<Option<SubCategory>, RepositoryError>;
    async fn find_sub_category_by_short_name(
        &self,
        parent: Option<ParentCategoryId>,
        short_name: &str,
    ) -> Result<Option<SubCategory>, RepositoryError>;
    async fn list_categories(&self) -> Result<Vec<CategorySummary>, RepositoryError>;

    async fn find_authority_id(&self, name: &str) -> Result<Option<AuthorityId>, RepositoryError> {
        Ok(self.find_authority(name).await?.and_then(|authority| authority.id))
    }
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("duplicate key violates unique constraint \"{constraint}\"")]
    Conflict { constraint: String },
    #[error("foreign key constraint \"{constraint}\" violated")]
    Reference { constraint: String },
    #[error("value too long: {0}")]
    FieldTooLong(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Store(String),
}

fn constraint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"constraint "([^"]+)""#).expect("constraint pattern compiles"))
}

impl RepositoryError {
    /// Classifies a raw store message; unrecognised text passes through as `Store`.
    pub fn from_store_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();
        let constraint = || {
            constraint_pattern()
                .captures(&message)
                .and_then(|captures| captures.get(1))
                .map(|found| found.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };

        if lowered.contains("value too long") {
            Self::FieldTooLong(message)
        } else if lowered.contains("duplicate key") || lowered.contains("unique constraint") {
            Self::Conflict {
                constraint: constraint(),
            }
        } else if lowered.contains("foreign key") {
            Self::Reference {
                constraint: constraint(),
            }
        } else {
            Self::Store(message)
        }
    }
}

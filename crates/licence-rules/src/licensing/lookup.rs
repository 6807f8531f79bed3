use serde::{Deserialize, Serialize};

use super::domain::{ParentCategory, ParentCategoryId, SubCategory};
use super::payload::CategorySpec;
use super::repository::{LicenceRepository, RepositoryError};

/// Category level a missing entry failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKind {
    Parent,
    Sub,
}

/// An import category that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingCategory {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category_name: Option<String>,
    pub reason: String,
    #[serde(rename = "type")]
    pub kind: MissingKind,
}

impl MissingCategory {
    pub fn for_spec(spec: &CategorySpec, reason: impl Into<String>) -> Self {
        Self {
            name: spec.name.clone(),
            sub_category_name: spec.sub_category_name.clone(),
            reason: reason.into(),
            kind: if spec.is_parent {
                MissingKind::Parent
            } else {
                MissingKind::Sub
            },
        }
    }
}

/// Reference rows an import category resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTarget {
    pub parent: ParentCategory,
    pub sub: Option<SubCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryLookup {
    Found(CategoryTarget),
    Missing(MissingCategory),
}

pub(crate) const PARENT_MISSING: &str = "Parent category not found in database";
pub(crate) const SUB_MISSING: &str = "Sub-category not found in database";
pub(crate) const BOTH_MISSING: &str = "Parent category and sub-category not found in database";
pub(crate) const SUB_NAME_MISSING: &str = "Sub-category name not provided";

/// Resolves sub-categories by `name`, falling back to `short_name`, within `parent` when given.
pub async fn find_sub_category<R>(
    repository: &R,
    parent: Option<ParentCategoryId>,
    name: &str,
) -> Result<Option<SubCategory>, RepositoryError>
where
    R: LicenceRepository + ?Sized,
{
    if let Some(found) = repository.find_sub_category_by_name(parent, name).await? {
        return Ok(Some(found));
    }
    repository.find_sub_category_by_short_name(parent, name).await
}

/// Resolves the parent (and, for sub-category records, the sub-category) an import
/// category names.
pub async fn locate_category<R>(
    repository: &R,
    spec: &CategorySpec,
) -> Result<CategoryLookup, RepositoryError>
where
    R: LicenceRepository + ?Sized,
{
    let parent = repository.find_parent_category_by_name(&spec.name).await?;

    if spec.is_parent {
        return Ok(match parent {
            Some(parent) => CategoryLookup::Found(CategoryTarget { parent, sub: None }),
            None => CategoryLookup::Missing(MissingCategory::for_spec(spec, PARENT_MISSING)),
        });
    }

    let sub_name = spec
        .sub_category_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let Some(sub_name) = sub_name else {
        let reason = match parent {
            Some(_) => SUB_NAME_MISSING.to_string(),
            None => format!("{PARENT_MISSING}; {SUB_NAME_MISSING}"),
        };
        return Ok(CategoryLookup::Missing(MissingCategory::for_spec(spec, reason)));
    };

    // A sub-category only counts when it sits under the named parent.
    let parent_id = parent.as_ref().map(|parent| parent.id);
    let sub = find_sub_category(repository, parent_id, sub_name).await?;
    Ok(match (parent, sub) {
        (Some(parent), Some(sub)) => CategoryLookup::Found(CategoryTarget {
            parent,
            sub: Some(sub),
        }),
        (None, Some(_)) => CategoryLookup::Missing(MissingCategory::for_spec(spec, PARENT_MISSING)),
        (Some(_), None) => CategoryLookup::Missing(MissingCategory::for_spec(spec, SUB_MISSING)),
        (None, None) => CategoryLookup::Missing(MissingCategory::for_spec(spec, BOTH_MISSING)),
    })
}

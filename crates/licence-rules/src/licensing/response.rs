use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{AbnKind, ParentCategoryId, SubCategoryId};
use super::payload::CategoryRequest;

/// Requirements for one or more categories, shaped like the import payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementsResponse {
    pub groups: BTreeMap<String, GroupView>,
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupView {
    pub name: String,
    pub min_required: u32,
    pub state: String,
    /// `REQUIRED`, `ANY 1 OF`, `ALL OF` or `N OF`.
    pub rule: String,
    pub authority: AuthorityView,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityView {
    pub name: String,
    /// Holds at most the requested kind.
    pub abn_conditions: BTreeMap<AbnKind, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category_name: Option<String>,
    pub is_parent: bool,
    pub states: BTreeMap<String, StateView>,
}

impl CategoryView {
    /// Categories are the same iff name, sub-category name and level all match.
    pub fn same_category(&self, other: &Self) -> bool {
        self.name == other.name
            && self.sub_category_name == other.sub_category_name
            && self.is_parent == other.is_parent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    pub licence_required: bool,
    pub licence_note: String,
    pub groups: Vec<String>,
}

/// Result of resolving one request inside a batch.
#[derive(Debug, Clone)]
pub struct CategoryOutcome {
    pub request: CategoryRequest,
    pub result: Result<RequirementsResponse, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundEntry {
    pub parent_category_id: ParentCategoryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category_id: Option<SubCategoryId>,
    pub abn_kind: AbnKind,
    pub reason: String,
}

impl NotFoundEntry {
    pub fn new(request: &CategoryRequest, reason: impl Into<String>) -> Self {
        Self {
            parent_category_id: request.parent_category_id,
            sub_category_id: request.sub_category_id,
            abn_kind: request.abn_kind,
            reason: reason.into(),
        }
    }
}

/// Merged batch response; `found + not_found.len()` equals the request count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequirements {
    pub data: RequirementsResponse,
    pub found: usize,
    #[serde(rename = "notFound")]
    pub not_found: Vec<NotFoundEntry>,
}

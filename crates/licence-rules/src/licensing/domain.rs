use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Jurisdiction sentinel for licences recognised in every state and territory.
pub const NATIONAL: &str = "National";

/// Closed set of jurisdictions a category state may be recorded against.
pub const VALID_STATES: [&str; 9] = [
    "NSW", "VIC", "QLD", "WA", "SA", "TAS", "ACT", "NT", NATIONAL,
];

pub fn is_valid_state(state: &str) -> bool {
    VALID_STATES.contains(&state)
}

macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

surrogate_id!(ParentCategoryId);
surrogate_id!(SubCategoryId);
surrogate_id!(CategoryStateId);
surrogate_id!(GroupId);
surrogate_id!(LicenceTypeId);
surrogate_id!(AuthorityId);

impl SubCategoryId {
    /// Collapses the `0` / absent "no sub-category" sentinels into `None`.
    pub fn normalize(raw: Option<i64>) -> Option<Self> {
        raw.filter(|id| *id != 0).map(Self)
    }
}

/// Raised when a factory receives data that would break an entity invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    #[error("invalid {entity}: {reason}")]
    InvalidEntity {
        entity: &'static str,
        reason: String,
    },
}

impl EntityError {
    fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            entity,
            reason: reason.into(),
        }
    }
}

/// Business structure of the ABN a tradesperson trades under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbnKind {
    Company,
    Individual,
    Partnership,
    Trust,
    Other,
}

impl AbnKind {
    pub const ALL: [Self; 5] = [
        Self::Company,
        Self::Individual,
        Self::Partnership,
        Self::Trust,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Individual => "individual",
            Self::Partnership => "partnership",
            Self::Trust => "trust",
            Self::Other => "other",
        }
    }

    pub fn valid_kinds() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for AbnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("abn_kind must be one of: {}. Got: {0}", AbnKind::valid_kinds())]
pub struct UnknownAbnKind(pub String);

impl FromStr for AbnKind {
    type Err = UnknownAbnKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownAbnKind(value.to_string()))
    }
}

/// Explanatory text per business structure, owned by a requirement group.
///
/// `other` has no group-level column and is never stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbnConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partnership: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust: Option<String>,
}

impl AbnConditions {
    pub fn message_for(&self, kind: AbnKind) -> Option<&str> {
        let slot = match kind {
            AbnKind::Company => &self.company,
            AbnKind::Individual => &self.individual,
            AbnKind::Partnership => &self.partnership,
            AbnKind::Trust => &self.trust,
            AbnKind::Other => return None,
        };
        slot.as_deref()
    }

    /// Returns `false` when the kind has no group-level column.
    pub fn set(&mut self, kind: AbnKind, message: impl Into<String>) -> bool {
        let slot = match kind {
            AbnKind::Company => &mut self.company,
            AbnKind::Individual => &mut self.individual,
            AbnKind::Partnership => &mut self.partnership,
            AbnKind::Trust => &mut self.trust,
            AbnKind::Other => return false,
        };
        *slot = Some(message.into());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.company.is_none()
            && self.individual.is_none()
            && self.partnership.is_none()
            && self.trust.is_none()
    }
}

/// Legacy per-category-state ABN condition row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbnCondition {
    id: Option<i64>,
    category_state_id: CategoryStateId,
    kind: AbnKind,
    message: String,
}

impl AbnCondition {
    pub fn new(
        category_state_id: CategoryStateId,
        kind: AbnKind,
        message: impl Into<String>,
    ) -> Result<Self, EntityError> {
        let message = message.into();
        if category_state_id.0 <= 0 {
            return Err(EntityError::invalid(
                "abn condition",
                "category state id must be positive",
            ));
        }
        if message.trim().is_empty() {
            return Err(EntityError::invalid(
                "abn condition",
                "message cannot be empty",
            ));
        }

        Ok(Self {
            id: None,
            category_state_id,
            kind,
            message,
        })
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn category_state_id(&self) -> CategoryStateId {
        self.category_state_id
    }

    pub fn kind(&self) -> AbnKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Licensing status of one (category, sub-category or none, jurisdiction) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryState {
    id: Option<CategoryStateId>,
    parent_category_id: ParentCategoryId,
    sub_category_id: Option<SubCategoryId>,
    state: String,
    licence_required: bool,
    licence_note: String,
}

impl CategoryState {
    pub fn new(
        parent_category_id: ParentCategoryId,
        sub_category_id: Option<SubCategoryId>,
        state: impl Into<String>,
        licence_required: bool,
        licence_note: impl Into<String>,
    ) -> Result<Self, EntityError> {
        let candidate = Self {
            id: None,
            parent_category_id,
            sub_category_id,
            state: state.into(),
            licence_required,
            licence_note: licence_note.into(),
        };

        if parent_category_id.0 <= 0 {
            return Err(EntityError::invalid(
                "category state",
                "parent category id must be positive",
            ));
        }
        if matches!(sub_category_id, Some(sub) if sub.0 <= 0) {
            return Err(EntityError::invalid(
                "category state",
                "sub-category id must be positive when present",
            ));
        }
        if !candidate.has_valid_state() {
            return Err(EntityError::invalid(
                "category state",
                format!(
                    "'{}' is not one of {}",
                    candidate.state,
                    VALID_STATES.join(", ")
                ),
            ));
        }

        Ok(candidate)
    }

    pub fn with_id(mut self, id: CategoryStateId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<CategoryStateId> {
        self.id
    }

    pub fn parent_category_id(&self) -> ParentCategoryId {
        self.parent_category_id
    }

    pub fn sub_category_id(&self) -> Option<SubCategoryId> {
        self.sub_category_id
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn licence_note(&self) -> &str {
        &self.licence_note
    }

    pub fn requires_licence(&self) -> bool {
        self.licence_required
    }

    pub fn is_parent_category(&self) -> bool {
        self.sub_category_id.is_none()
    }

    pub fn is_sub_category(&self) -> bool {
        self.sub_category_id.is_some()
    }

    pub fn has_valid_state(&self) -> bool {
        is_valid_state(&self.state)
    }

    pub fn is_compatible_with_sub_category(&self, sub_category_id: SubCategoryId) -> bool {
        !self.is_sub_category() && sub_category_id.0 > 0
    }

    /// Derives the record for a sub-category of this parent-category record.
    pub fn for_sub_category(&self, sub_category_id: SubCategoryId) -> Result<Self, EntityError> {
        if self.is_sub_category() {
            return Err(EntityError::invalid(
                "category state",
                "a sub-category record cannot carry a further sub-category",
            ));
        }
        Self::new(
            self.parent_category_id,
            Some(sub_category_id),
            self.state.clone(),
            self.licence_required,
            self.licence_note.clone(),
        )
    }

    /// Applies imported requirement data, keeping identity.
    pub fn with_requirement(mut self, licence_required: bool, licence_note: impl Into<String>) -> Self {
        self.licence_required = licence_required;
        self.licence_note = licence_note.into();
        self
    }
}

/// Category level a requirement group is attached to; the levels are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum GroupAssignment {
    #[default]
    Unassigned,
    ParentCategory { parent: ParentCategoryId },
    SubCategory {
        parent: ParentCategoryId,
        sub: SubCategoryId,
    },
}

/// A set of licence types of which `min_required` must be held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenceRequirementGroup {
    id: Option<GroupId>,
    name: String,
    key: String,
    min_required: u32,
    state: String,
    authority_name: String,
    abn_conditions: AbnConditions,
    is_active: bool,
    assignment: GroupAssignment,
}

fn group_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_]+$").expect("group key pattern compiles"))
}

impl LicenceRequirementGroup {
    pub const DEFAULT_STATE: &'static str = "NSW";
    pub const UNKNOWN_AUTHORITY: &'static str = "Unknown";

    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        min_required: u32,
    ) -> Result<Self, EntityError> {
        let group = Self {
            id: None,
            name: name.into(),
            key: key.into(),
            min_required,
            state: Self::DEFAULT_STATE.to_string(),
            authority_name: Self::UNKNOWN_AUTHORITY.to_string(),
            abn_conditions: AbnConditions::default(),
            is_active: true,
            assignment: GroupAssignment::Unassigned,
        };

        if !Self::is_valid_key(&group.key) {
            return Err(EntityError::invalid(
                "licence requirement group",
                format!("key '{}' must match ^[a-z0-9_]+$", group.key),
            ));
        }
        if !group.has_valid_name() {
            return Err(EntityError::invalid(
                "licence requirement group",
                "name cannot be empty",
            ));
        }
        if !Self::is_valid_min_required(min_required) {
            return Err(EntityError::invalid(
                "licence requirement group",
                "min_required must be greater than 0",
            ));
        }

        Ok(group)
    }

    pub fn is_valid_key(key: &str) -> bool {
        group_key_pattern().is_match(key)
    }

    pub fn is_valid_min_required(min_required: u32) -> bool {
        min_required > 0
    }

    pub fn with_id(mut self, id: GroupId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_authority(mut self, name: impl Into<String>, conditions: AbnConditions) -> Self {
        self.authority_name = name.into();
        self.abn_conditions = conditions;
        self
    }

    pub fn id(&self) -> Option<GroupId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn min_required(&self) -> u32 {
        self.min_required
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn authority_name(&self) -> &str {
        &self.authority_name
    }

    pub fn abn_conditions(&self) -> &AbnConditions {
        &self.abn_conditions
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn assignment(&self) -> GroupAssignment {
        self.assignment
    }

    pub fn parent_category_id(&self) -> Option<ParentCategoryId> {
        match self.assignment {
            GroupAssignment::Unassigned => None,
            GroupAssignment::ParentCategory { parent }
            | GroupAssignment::SubCategory { parent, .. } => Some(parent),
        }
    }

    pub fn sub_category_id(&self) -> Option<SubCategoryId> {
        match self.assignment {
            GroupAssignment::SubCategory { sub, .. } => Some(sub),
            _ => None,
        }
    }

    pub fn has_valid_key(&self) -> bool {
        Self::is_valid_key(&self.key)
    }

    pub fn has_valid_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn is_assigned_to_category(&self) -> bool {
        self.assignment != GroupAssignment::Unassigned
    }

    pub fn is_assigned_to_parent_category(&self) -> bool {
        matches!(self.assignment, GroupAssignment::ParentCategory { .. })
    }

    pub fn is_assigned_to_sub_category(&self) -> bool {
        matches!(self.assignment, GroupAssignment::SubCategory { .. })
    }

    pub fn can_be_activated(&self) -> bool {
        self.has_valid_key() && self.has_valid_name() && Self::is_valid_min_required(self.min_required)
    }

    pub fn activate(mut self) -> Result<Self, EntityError> {
        if !self.can_be_activated() {
            return Err(EntityError::invalid(
                "licence requirement group",
                "cannot activate a group with an invalid key, name or min_required",
            ));
        }
        self.is_active = true;
        Ok(self)
    }

    /// Assigns to the parent level, clearing any sub-category assignment.
    pub fn assign_to_parent_category(mut self, parent: ParentCategoryId) -> Result<Self, EntityError> {
        if parent.0 <= 0 {
            return Err(EntityError::invalid(
                "licence requirement group",
                "parent category id must be positive",
            ));
        }
        self.assignment = GroupAssignment::ParentCategory { parent };
        Ok(self)
    }

    /// Assigns to the sub-category level, replacing any parent-level assignment.
    pub fn assign_to_sub_category(
        mut self,
        parent: ParentCategoryId,
        sub: SubCategoryId,
    ) -> Result<Self, EntityError> {
        if parent.0 <= 0 || sub.0 <= 0 {
            return Err(EntityError::invalid(
                "licence requirement group",
                "category ids must be positive",
            ));
        }
        self.assignment = GroupAssignment::SubCategory { parent, sub };
        Ok(self)
    }

    pub fn update_min_required(mut self, min_required: u32) -> Result<Self, EntityError> {
        if !Self::is_valid_min_required(min_required) {
            return Err(EntityError::invalid(
                "licence requirement group",
                "min_required must be greater than 0",
            ));
        }
        self.min_required = min_required;
        Ok(self)
    }

    pub fn rule(&self, member_count: usize) -> RequirementRule {
        RequirementRule::classify(self.min_required, member_count)
    }
}

/// How many members of a group must be held, in the wording shown to tradespeople.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementRule {
    Required,
    AnyOneOf,
    AllOf,
    NOf(u32),
}

impl RequirementRule {
    pub fn classify(min_required: u32, member_count: usize) -> Self {
        let size = u32::try_from(member_count).unwrap_or(u32::MAX);
        match (min_required, size) {
            (1, 1) => Self::Required,
            (1, _) => Self::AnyOneOf,
            (min, size) if min == size => Self::AllOf,
            (min, _) => Self::NOf(min),
        }
    }
}

impl fmt::Display for RequirementRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("REQUIRED"),
            Self::AnyOneOf => f.write_str("ANY 1 OF"),
            Self::AllOf => f.write_str("ALL OF"),
            Self::NOf(min) => write!(f, "{min} OF"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentCategory {
    pub id: ParentCategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCategory {
    pub id: SubCategoryId,
    pub parent_id: ParentCategoryId,
    pub name: String,
    pub short_name: String,
}

/// A licensing body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub id: Option<AuthorityId>,
    pub authority: String,
    pub authority_name: String,
    pub state: String,
    pub link: Option<String>,
}

impl Authority {
    pub fn new(name: impl Into<String>, state: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: None,
            authority_name: name.clone(),
            authority: name,
            state: state.into(),
            link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenceType {
    pub id: Option<LicenceTypeId>,
    pub name: String,
    pub state: String,
    /// Key of the group that first introduced this licence type.
    pub licence_type: String,
    pub authority_id: Option<AuthorityId>,
    pub is_active: bool,
}

impl LicenceType {
    pub fn new(
        name: impl Into<String>,
        state: impl Into<String>,
        licence_type: impl Into<String>,
        authority_id: Option<AuthorityId>,
    ) -> Result<Self, EntityError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EntityError::invalid("licence type", "name cannot be empty"));
        }
        Ok(Self {
            id: None,
            name,
            state: state.into(),
            licence_type: licence_type.into(),
            authority_id,
            is_active: true,
        })
    }

    /// National licences apply under every jurisdiction.
    pub fn applies_in(&self, state: &str) -> bool {
        self.state == state || self.state == NATIONAL
    }
}

/// Flattened parent/sub category row for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub parent_category_id: ParentCategoryId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category_id: Option<SubCategoryId>,
}

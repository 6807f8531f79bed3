//! Typed import payload and request parsing.
//!
//! Raw JSON is always validated by [`super::rules`] before it is deserialized into these
//! records, so the engines never dereference an unchecked field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{AbnConditions, AbnKind, ParentCategoryId, SubCategoryId};
use super::error::{ValidationErrors, Violation};
use super::rules::{self, ValidationProfile};

/// Rule data submitted for a full import or a selective update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeMap<String, GroupSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategorySpec>>,
}

impl ImportPayload {
    /// Validates `value` under `profile`, then converts it into typed records.
    pub fn from_value(value: &Value, profile: ValidationProfile) -> Result<Self, ValidationErrors> {
        rules::validate(value, profile).into_result()?;
        serde_json::from_value(value.clone()).map_err(|error| {
            ValidationErrors(vec![Violation::new(
                "payload",
                format!("unexpected shape: {error}"),
            )])
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = (&String, &GroupSpec)> {
        self.groups.iter().flatten()
    }

    pub fn categories(&self) -> &[CategorySpec] {
        self.categories.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub min_required: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<AuthoritySpec>,
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
}

impl GroupSpec {
    pub fn state_or_default(&self) -> &str {
        self.state
            .as_deref()
            .filter(|state| !state.trim().is_empty())
            .unwrap_or(super::domain::LicenceRequirementGroup::DEFAULT_STATE)
    }

    pub fn authority_name(&self) -> Option<&str> {
        self.authority
            .as_ref()
            .map(|authority| authority.name.as_str())
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoritySpec {
    pub name: String,
    #[serde(default)]
    pub abn_conditions: AbnConditions,
}

/// A group member: either a bare licence name or the older object form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassSpec {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        authority: Option<String>,
    },
}

impl ClassSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => name,
        }
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Name(_) => None,
            Self::Detailed { state, .. } => state.as_deref(),
        }
    }

    pub fn authority(&self) -> Option<&str> {
        match self {
            Self::Name(_) => None,
            Self::Detailed { authority, .. } => authority.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category_name: Option<String>,
    pub is_parent: bool,
    pub states: BTreeMap<String, StateSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    pub licence_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licence_note: Option<String>,
    /// Legacy per-state ABN conditions; non-string and unknown entries are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abn_conditions: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl StateSpec {
    pub fn licence_note(&self) -> &str {
        self.licence_note.as_deref().unwrap_or_default()
    }

    /// Recognised, non-empty ABN condition messages.
    pub fn abn_conditions(&self) -> Vec<(AbnKind, &str)> {
        self.abn_conditions
            .iter()
            .flatten()
            .filter_map(|(key, message)| {
                let kind = key.parse::<AbnKind>().ok()?;
                let message = message.as_str().filter(|text| !text.is_empty())?;
                Some((kind, message))
            })
            .collect()
    }
}

/// One validated resolution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRequest {
    pub parent_category_id: ParentCategoryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category_id: Option<SubCategoryId>,
    pub abn_kind: AbnKind,
    pub state: String,
}

impl CategoryRequest {
    pub fn new(
        parent_category_id: i64,
        sub_category_id: Option<i64>,
        abn_kind: AbnKind,
        state: impl Into<String>,
    ) -> Self {
        Self {
            parent_category_id: ParentCategoryId(parent_category_id),
            sub_category_id: SubCategoryId::normalize(sub_category_id),
            abn_kind,
            state: state.into(),
        }
    }
}

fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

/// Parses one request object, prefixing every message with `context`.
pub fn parse_category_request(
    raw: &Value,
    context: &str,
    default_state: &str,
) -> Result<CategoryRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let Some(object) = raw.as_object() else {
        errors.push(context, "Must be a valid object");
        return Err(errors);
    };

    let parent = object.get("parent_category_id");
    let parent_category_id = match parent.and_then(Value::as_i64) {
        Some(id) => Some(id),
        None => {
            errors.push(
                context,
                format!(
                    "parent_category_id must be a number, got {}",
                    type_name(parent)
                ),
            );
            None
        }
    };

    let sub_category_id = match object.get("sub_category_id") {
        None | Some(Value::Null) => Some(None),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(id) => Some(Some(id)),
            None => {
                errors.push(
                    context,
                    format!("sub_category_id must be a valid number, got \"{number}\""),
                );
                None
            }
        },
        Some(Value::String(text)) if text.trim().is_empty() => Some(None),
        Some(Value::String(text)) => match text.trim().parse::<i64>() {
            Ok(id) => Some(Some(id)),
            Err(_) => {
                errors.push(
                    context,
                    format!("sub_category_id must be a valid number, got \"{text}\""),
                );
                None
            }
        },
        other => {
            errors.push(
                context,
                format!("sub_category_id must be a number, got {}", type_name(other)),
            );
            None
        }
    };

    let abn_kind = match object.get("abn_kind") {
        Some(Value::String(kind)) if !kind.is_empty() => match kind.parse::<AbnKind>() {
            Ok(kind) => Some(kind),
            Err(error) => {
                errors.push(context, error.to_string());
                None
            }
        },
        None | Some(Value::Null) | Some(Value::String(_)) => {
            errors.push(context, "abn_kind is required");
            None
        }
        Some(other) => {
            errors.push(
                context,
                format!(
                    "abn_kind must be one of: {}. Got: {other}",
                    AbnKind::valid_kinds()
                ),
            );
            None
        }
    };

    let state = match object.get("state") {
        None | Some(Value::Null) => Some(default_state.to_string()),
        Some(Value::String(state)) => Some(state.clone()),
        other => {
            errors.push(
                context,
                format!(
                    "state must be a string if provided, got {}",
                    type_name(other)
                ),
            );
            None
        }
    };

    match (parent_category_id, sub_category_id, abn_kind, state) {
        (Some(parent), Some(sub), Some(kind), Some(state)) if errors.is_empty() => {
            Ok(CategoryRequest::new(parent, sub, kind, state))
        }
        _ => Err(errors),
    }
}

/// Parses the batch `filter` parameter: a JSON array of request objects.
///
/// Every item is checked; the error lists problems for all of them.
pub fn parse_batch_filter(
    raw: &str,
    default_state: &str,
) -> Result<Vec<CategoryRequest>, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if raw.trim().is_empty() {
        errors.push("", "Missing required query parameter: filter");
        return Err(errors);
    }

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(_) => {
            errors.push("", "Invalid filter parameter. Expected valid JSON array.");
            return Err(errors);
        }
    };
    let Some(items) = parsed.as_array() else {
        errors.push("", "Filter parameter must be a JSON array.");
        return Err(errors);
    };

    let mut requests = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let context = format!("Category {}", index + 1);
        match parse_category_request(item, &context, default_state) {
            Ok(request) => requests.push(request),
            Err(item_errors) => errors.0.extend(item_errors.0),
        }
    }

    errors.into_result().map(|()| requests)
}

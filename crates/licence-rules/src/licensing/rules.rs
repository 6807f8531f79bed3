//! Stateless business rules: payload validation, id compatibility, batch
//! aggregation and entity factories.

use serde_json::{Map, Value};

use super::domain::{
    AbnCondition, AbnKind, CategoryState, CategoryStateId, EntityError, LicenceRequirementGroup,
    ParentCategoryId, SubCategoryId,
};
use super::error::ValidationErrors;
use super::payload::GroupSpec;
use super::response::{BatchRequirements, CategoryOutcome, NotFoundEntry};

/// How strictly an import payload is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationProfile {
    /// Full import: both sections and every state field are mandatory.
    Strict,
    /// Selective update: sections may be omitted; per-state `abn_conditions` and `groups`
    /// are optional.
    Selective,
}

pub fn validate(payload: &Value, profile: ValidationProfile) -> ValidationErrors {
    match profile {
        ValidationProfile::Strict => validate_import_data(payload),
        ValidationProfile::Selective => validate_update_data(payload),
    }
}

/// Checks a full-import payload and reports every violation found.
pub fn validate_import_data(payload: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    let sections = payload
        .as_object()
        .and_then(|object| Some((object.get("groups")?, object.get("categories")?)));
    let Some((groups, categories)) = sections else {
        errors.push(
            "",
            "Invalid data format. Expected \"groups\" and \"categories\" properties.",
        );
        return errors;
    };

    check_groups(groups, &mut errors);
    check_categories(categories, ValidationProfile::Strict, &mut errors);
    errors
}

/// Checks a selective-update payload; either section may be absent.
pub fn validate_update_data(payload: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    let Some(object) = payload.as_object() else {
        errors.push("", "Request body is required for this endpoint");
        return errors;
    };

    let groups = object.get("groups").filter(|value| !value.is_null());
    let categories = object.get("categories").filter(|value| !value.is_null());
    if groups.is_none() && categories.is_none() {
        errors.push(
            "",
            "Request body must contain a groups object or a categories array",
        );
        return errors;
    }

    if let Some(groups) = groups {
        check_groups(groups, &mut errors);
    }
    if let Some(categories) = categories {
        check_categories(categories, ValidationProfile::Selective, &mut errors);
    }
    errors
}

fn check_groups(groups: &Value, errors: &mut ValidationErrors) {
    let Some(groups) = groups.as_object() else {
        errors.push("groups", "must be an object keyed by group key");
        return;
    };

    for (key, group) in groups {
        let path = format!("Group {key}");
        if !LicenceRequirementGroup::is_valid_key(key) {
            errors.push(&path, "invalid group key, expected ^[a-z0-9_]+$");
        }
        let Some(group) = group.as_object() else {
            errors.push(&path, "Must be a valid object");
            continue;
        };

        if !is_non_empty_string(group.get("name")) {
            errors.push(&path, "name is required and must be a string");
        }
        let min_required = group
            .get("min_required")
            .and_then(Value::as_u64)
            .filter(|min| *min > 0 && u32::try_from(*min).is_ok());
        if min_required.is_none() {
            errors.push(&path, "min_required must be a positive number");
        }
        if !is_optional_string(group.get("state")) {
            errors.push(&path, "state must be a string if provided");
        }
        check_group_authority(group, &path, errors);
        check_classes(group, &path, errors);
    }
}

fn check_group_authority(group: &Map<String, Value>, path: &str, errors: &mut ValidationErrors) {
    let authority = match group.get("authority") {
        None | Some(Value::Null) => return,
        Some(Value::Object(authority)) => authority,
        Some(_) => {
            errors.push(path, "authority must be an object");
            return;
        }
    };

    if !matches!(authority.get("name"), Some(Value::String(_))) {
        errors.push(path, "authority.name must be a string");
    }
    match authority.get("abn_conditions") {
        None | Some(Value::Null) => {}
        Some(Value::Object(conditions)) => {
            for (kind, message) in conditions {
                if !is_optional_string(Some(message)) {
                    errors.push(
                        path,
                        format!("authority.abn_conditions.{kind} must be a string"),
                    );
                }
            }
        }
        Some(_) => errors.push(path, "authority.abn_conditions must be an object"),
    }
}

fn check_classes(group: &Map<String, Value>, path: &str, errors: &mut ValidationErrors) {
    let classes = match group.get("classes") {
        None | Some(Value::Null) => return,
        Some(Value::Array(classes)) => classes,
        Some(_) => {
            errors.push(path, "classes must be an array");
            return;
        }
    };

    for (index, class) in classes.iter().enumerate() {
        let valid = match class {
            Value::String(name) => !name.trim().is_empty(),
            Value::Object(object) => {
                is_non_empty_string(object.get("name"))
                    && is_optional_string(object.get("state"))
                    && is_optional_string(object.get("authority"))
            }
            _ => false,
        };
        if !valid {
            errors.push(
                path,
                format!("classes[{index}] must be a licence name or an object with a name"),
            );
        }
    }
}

fn check_categories(categories: &Value, profile: ValidationProfile, errors: &mut ValidationErrors) {
    let Some(categories) = categories.as_array() else {
        errors.push("", "Request body must contain a categories array");
        return;
    };

    for (index, category) in categories.iter().enumerate() {
        let path = format!("Category {}", index + 1);
        let Some(category) = category.as_object() else {
            errors.push(&path, "Must be a valid object");
            continue;
        };

        if !is_non_empty_string(category.get("name")) {
            errors.push(&path, "name is required and must be a string");
        }
        if !is_optional_string(category.get("sub_category_name")) {
            errors.push(&path, "sub_category_name must be a string if provided");
        }
        if !matches!(category.get("is_parent"), Some(Value::Bool(_))) {
            errors.push(&path, "is_parent must be a boolean");
        }
        let Some(states) = category.get("states").and_then(Value::as_object) else {
            errors.push(&path, "states object is required");
            continue;
        };

        for (state, data) in states {
            check_state(&format!("{path}, state {state}"), data, profile, errors);
        }
    }
}

fn check_state(path: &str, data: &Value, profile: ValidationProfile, errors: &mut ValidationErrors) {
    let Some(data) = data.as_object() else {
        errors.push(path, "Must be a valid object");
        return;
    };

    if !matches!(data.get("licence_required"), Some(Value::Bool(_))) {
        errors.push(path, "licence_required must be a boolean");
    }
    if !is_optional_string(data.get("licence_note")) {
        errors.push(path, "licence_note must be a string if provided");
    }

    match (data.get("abn_conditions"), profile) {
        (Some(Value::Object(_)), _) => {}
        (None | Some(Value::Null), ValidationProfile::Selective) => {}
        _ => errors.push(path, "abn_conditions object is required"),
    }

    match (data.get("groups"), profile) {
        (Some(Value::Array(keys)), _) => {
            if !keys.iter().all(Value::is_string) {
                errors.push(path, "groups must contain only group keys");
            }
        }
        (None | Some(Value::Null), ValidationProfile::Selective) => {}
        _ => errors.push(path, "groups must be an array"),
    }
}

fn is_non_empty_string(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(text)) if !text.trim().is_empty())
}

fn is_optional_string(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null) | Some(Value::String(_)))
}

/// `parent` must be positive; `sub`, when given, is `0` (no sub-category) or positive.
pub fn validate_category_compatibility(parent: i64, sub: Option<i64>) -> bool {
    parent > 0 && sub.map_or(true, |sub| sub >= 0)
}

/// Merges per-request outcomes into one batch response.
///
/// Groups merge by key with the first occurrence kept. Categories with the same name,
/// sub-category name and level collapse into one entry whose states are unioned.
pub fn aggregate_results(outcomes: Vec<CategoryOutcome>) -> BatchRequirements {
    let mut batch = BatchRequirements::default();

    for outcome in outcomes {
        let response = match outcome.result {
            Ok(response) => response,
            Err(reason) => {
                batch
                    .not_found
                    .push(NotFoundEntry::new(&outcome.request, reason));
                continue;
            }
        };

        for (key, group) in response.groups {
            batch.data.groups.entry(key).or_insert(group);
        }

        for category in response.categories {
            match batch
                .data
                .categories
                .iter_mut()
                .find(|existing| existing.same_category(&category))
            {
                Some(existing) => existing.states.extend(category.states),
                None => batch.data.categories.push(category),
            }
        }
        batch.found += 1;
    }

    batch
}

/// Slug used as a group key when none is stored.
pub fn group_key_from_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

pub fn create_category_state(
    parent: ParentCategoryId,
    sub: Option<SubCategoryId>,
    state: &str,
    licence_required: bool,
    licence_note: &str,
) -> Result<CategoryState, EntityError> {
    CategoryState::new(parent, sub, state, licence_required, licence_note)
}

pub fn create_abn_condition(
    category_state: CategoryStateId,
    kind: AbnKind,
    message: &str,
) -> Result<AbnCondition, EntityError> {
    AbnCondition::new(category_state, kind, message)
}

/// Builds a group from its import record, carrying group-level ABN conditions.
pub fn create_requirement_group(
    key: &str,
    spec: &GroupSpec,
) -> Result<LicenceRequirementGroup, EntityError> {
    let group = LicenceRequirementGroup::new(spec.name.clone(), key, spec.min_required)?
        .with_state(spec.state_or_default());

    Ok(match &spec.authority {
        Some(authority) => group.with_authority(
            spec.authority_name()
                .unwrap_or(LicenceRequirementGroup::UNKNOWN_AUTHORITY),
            authority.abn_conditions.clone(),
        ),
        None => group,
    })
}

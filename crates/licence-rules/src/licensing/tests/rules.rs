use std::collections::BTreeMap;

use serde_json::json;

use super::common::*;
use crate::licensing::domain::{AbnKind, SubCategoryId};
use crate::licensing::payload::{
    parse_batch_filter, parse_category_request, ClassSpec, ImportPayload,
};
use crate::licensing::response::{
    AuthorityView, CategoryOutcome, CategoryView, GroupView, RequirementsResponse, StateView,
};
use crate::licensing::rules::{
    aggregate_results, group_key_from_name, validate_category_compatibility,
    validate_import_data, validate_update_data, ValidationProfile,
};

#[test]
fn import_validation_reports_every_violation() {
    let payload = json!({
        "groups": {
            "Bad-Key": { "name": "Bad", "min_required": 1 },
            "no_name": { "min_required": 0 }
        },
        "categories": [
            {
                "name": "Electrical",
                "states": {
                    "NSW": { "licence_required": "yes" }
                }
            }
        ]
    });

    let errors = validate_import_data(&payload);
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();

    assert!(messages.contains(&"Group Bad-Key: invalid group key, expected ^[a-z0-9_]+$".to_string()));
    assert!(messages.contains(&"Group no_name: name is required and must be a string".to_string()));
    assert!(messages.contains(&"Group no_name: min_required must be a positive number".to_string()));
    assert!(messages.contains(&"Category 1: is_parent must be a boolean".to_string()));
    assert!(messages
        .contains(&"Category 1, state NSW: licence_required must be a boolean".to_string()));
    assert!(messages
        .contains(&"Category 1, state NSW: abn_conditions object is required".to_string()));
    assert!(messages.contains(&"Category 1, state NSW: groups must be an array".to_string()));
    assert_eq!(errors.len(), 7);
}

#[test]
fn import_validation_requires_both_sections() {
    let errors = validate_import_data(&json!({ "groups": {} }));
    assert_eq!(errors.len(), 1);
    assert!(errors.to_string().contains("Expected \"groups\" and \"categories\""));
}

#[test]
fn fixture_payloads_pass_strict_validation() {
    assert!(validate_import_data(&arc_payload()).is_empty());
    assert!(validate_import_data(&electrical_payload()).is_empty());
}

#[test]
fn update_validation_allows_partial_payloads() {
    let categories_only = json!({
        "categories": [
            {
                "name": "Plumbing",
                "is_parent": true,
                "states": { "VIC": { "licence_required": true } }
            }
        ]
    });
    assert!(validate_update_data(&categories_only).is_empty());

    let groups_only = json!({
        "groups": { "plumber": { "name": "Plumbing Licence", "min_required": 1 } }
    });
    assert!(validate_update_data(&groups_only).is_empty());

    let errors = validate_update_data(&json!({}));
    assert_eq!(errors.len(), 1);
}

#[test]
fn typed_payload_accepts_string_and_object_classes() {
    let payload =
        ImportPayload::from_value(&electrical_payload(), ValidationProfile::Strict)
            .expect("payload converts");
    let groups = payload.groups.expect("groups present");
    let electrician = &groups["electrician"];

    assert_eq!(electrician.classes[0], ClassSpec::Name("Electrician".to_string()));
    assert_eq!(electrician.classes[1].name(), "Restricted Electrician");
    assert_eq!(electrician.classes[1].state(), Some("National"));
    assert_eq!(
        electrician.classes[1].authority(),
        Some("Electrical Safety Office")
    );
}

#[test]
fn typed_payload_surfaces_validation_before_conversion() {
    let error = ImportPayload::from_value(&json!([]), ValidationProfile::Strict)
        .expect_err("arrays are not payloads");
    assert_eq!(error.len(), 1);
}

#[test]
fn legacy_state_abn_conditions_ignore_unknown_kinds() {
    let payload = json!({
        "categories": [
            {
                "name": "Plumbing",
                "is_parent": true,
                "states": {
                    "NSW": {
                        "licence_required": true,
                        "abn_conditions": {
                            "company": "Company needs a contractor licence",
                            "sole_trader": "ignored",
                            "trust": ""
                        }
                    }
                }
            }
        ]
    });
    let payload =
        ImportPayload::from_value(&payload, ValidationProfile::Selective).expect("valid");
    let state = &payload.categories()[0].states["NSW"];

    assert_eq!(
        state.abn_conditions(),
        vec![(AbnKind::Company, "Company needs a contractor licence")]
    );
}

#[test]
fn category_compatibility_treats_zero_as_no_sub_category() {
    assert!(validate_category_compatibility(4, None));
    assert!(validate_category_compatibility(4, Some(0)));
    assert!(validate_category_compatibility(4, Some(12)));
    assert!(!validate_category_compatibility(0, None));
    assert!(!validate_category_compatibility(-3, Some(1)));
    assert!(!validate_category_compatibility(4, Some(-1)));
}

#[test]
fn group_keys_are_slugged_from_names() {
    assert_eq!(
        group_key_from_name("Air  Conditioning Licence (ARC)"),
        "air_conditioning_licence_arc"
    );
    assert_eq!(group_key_from_name("Gas-Fitting 2"), "gasfitting_2");
}

fn group_view(name: &str) -> GroupView {
    GroupView {
        name: name.to_string(),
        min_required: 1,
        state: "NSW".to_string(),
        rule: "REQUIRED".to_string(),
        authority: AuthorityView::default(),
        classes: vec![name.to_string()],
    }
}

fn response_for(group_key: &str, group_name: &str, state: &str) -> RequirementsResponse {
    let mut groups = BTreeMap::new();
    groups.insert(group_key.to_string(), group_view(group_name));
    let mut states = BTreeMap::new();
    states.insert(
        state.to_string(),
        StateView {
            licence_required: true,
            licence_note: String::new(),
            groups: vec![group_key.to_string()],
        },
    );
    RequirementsResponse {
        groups,
        categories: vec![CategoryView {
            name: "Electrical".to_string(),
            sub_category_name: None,
            is_parent: true,
            states,
        }],
    }
}

#[test]
fn aggregation_merges_groups_and_consolidates_categories() {
    let outcomes = vec![
        CategoryOutcome {
            request: request(ELECTRICAL, None, AbnKind::Company, "NSW"),
            result: Ok(response_for("electrician", "First", "NSW")),
        },
        CategoryOutcome {
            request: request(ELECTRICAL, None, AbnKind::Company, "QLD"),
            result: Ok(response_for("electrician", "Second", "QLD")),
        },
        CategoryOutcome {
            request: request(PLUMBING, Some(GAS_FITTING.0), AbnKind::Trust, "VIC"),
            result: Err("No licence requirements found".to_string()),
        },
    ];

    let batch = aggregate_results(outcomes);

    assert_eq!(batch.found, 2);
    assert_eq!(batch.not_found.len(), 1);
    assert_eq!(batch.data.groups["electrician"].name, "First");
    assert_eq!(batch.data.categories.len(), 1);
    let states: Vec<&String> = batch.data.categories[0].states.keys().collect();
    assert_eq!(states, vec!["NSW", "QLD"]);

    let missing = &batch.not_found[0];
    assert_eq!(missing.parent_category_id, PLUMBING);
    assert_eq!(missing.sub_category_id, Some(GAS_FITTING));
    assert_eq!(missing.abn_kind, AbnKind::Trust);
    assert_eq!(missing.reason, "No licence requirements found");
}

#[test]
fn aggregation_keeps_parent_and_sub_category_entries_apart() {
    let mut sub_response = response_for("electrician", "Electrical Licence", "NSW");
    sub_response.categories[0].sub_category_name = Some("Electrical Repairs".to_string());
    sub_response.categories[0].is_parent = false;

    let batch = aggregate_results(vec![
        CategoryOutcome {
            request: request(ELECTRICAL, None, AbnKind::Company, "NSW"),
            result: Ok(response_for("electrician", "Electrical Licence", "NSW")),
        },
        CategoryOutcome {
            request: request(ELECTRICAL, Some(ELECTRICAL_REPAIRS.0), AbnKind::Company, "NSW"),
            result: Ok(sub_response),
        },
    ]);

    assert_eq!(batch.found, 2);
    assert_eq!(batch.data.categories.len(), 2);
}

#[test]
fn batch_filter_normalizes_sub_category_sentinels() {
    let filter = r#"[
        {"parent_category_id": 2, "sub_category_id": 0, "abn_kind": "company"},
        {"parent_category_id": 2, "sub_category_id": "", "abn_kind": "trust", "state": "QLD"},
        {"parent_category_id": 2, "sub_category_id": "20", "abn_kind": "individual"}
    ]"#;

    let requests = parse_batch_filter(filter, "NSW").expect("filter parses");

    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].sub_category_id, None);
    assert_eq!(requests[0].state, "NSW");
    assert_eq!(requests[1].sub_category_id, None);
    assert_eq!(requests[1].state, "QLD");
    assert_eq!(requests[2].sub_category_id, Some(SubCategoryId(20)));
}

#[test]
fn batch_filter_reports_problems_for_every_item() {
    let filter = r#"[
        {"parent_category_id": "two", "abn_kind": "company"},
        {"parent_category_id": 2, "abn_kind": "sole_trader"},
        {"parent_category_id": 2, "sub_category_id": "abc", "abn_kind": "trust", "state": 7},
        "not an object"
    ]"#;

    let errors = parse_batch_filter(filter, "NSW").expect_err("filter rejected");
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();

    assert_eq!(
        messages,
        vec![
            "Category 1: parent_category_id must be a number, got string".to_string(),
            "Category 2: abn_kind must be one of: company, individual, partnership, trust, other. Got: sole_trader".to_string(),
            "Category 3: sub_category_id must be a valid number, got \"abc\"".to_string(),
            "Category 3: state must be a string if provided, got number".to_string(),
            "Category 4: Must be a valid object".to_string(),
        ]
    );
}

#[test]
fn batch_filter_rejects_malformed_json() {
    let missing = parse_batch_filter("", "NSW").expect_err("empty filter");
    assert_eq!(
        missing.to_string(),
        "Missing required query parameter: filter"
    );

    let invalid = parse_batch_filter("[{", "NSW").expect_err("bad json");
    assert_eq!(
        invalid.to_string(),
        "Invalid filter parameter. Expected valid JSON array."
    );

    let object = parse_batch_filter(r#"{"parent_category_id": 1}"#, "NSW").expect_err("not array");
    assert_eq!(object.to_string(), "Filter parameter must be a JSON array.");
}

#[test]
fn single_request_requires_abn_kind() {
    let errors = parse_category_request(&json!({ "parent_category_id": 1 }), "Single request", "NSW")
        .expect_err("abn kind missing");
    assert_eq!(errors.to_string(), "Single request: abn_kind is required");
}

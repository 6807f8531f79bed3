use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Value};

use crate::licensing::domain::{
    AbnCondition, AbnKind, Authority, CategoryState, CategoryStateId, CategorySummary, GroupId,
    LicenceRequirementGroup, LicenceType, LicenceTypeId, ParentCategory, ParentCategoryId,
    SubCategory, SubCategoryId,
};
use crate::licensing::payload::{CategoryRequest, ImportPayload};
use crate::licensing::repository::{LicenceRepository, RepositoryError};
use crate::licensing::rules::ValidationProfile;
use crate::licensing::{InMemoryLicenceStore, LicenceRequirementService};

pub(super) const AIR_CONDITIONING: ParentCategoryId = ParentCategoryId(1);
pub(super) const ELECTRICAL: ParentCategoryId = ParentCategoryId(2);
pub(super) const PLUMBING: ParentCategoryId = ParentCategoryId(3);
pub(super) const ELECTRICAL_REPAIRS: SubCategoryId = SubCategoryId(20);
pub(super) const DATA_CABLING: SubCategoryId = SubCategoryId(21);
pub(super) const GAS_FITTING: SubCategoryId = SubCategoryId(30);

pub(super) fn seeded_store() -> Arc<InMemoryLicenceStore> {
    let store = InMemoryLicenceStore::new();
    for (id, name) in [
        (AIR_CONDITIONING, "Air Conditioning"),
        (ELECTRICAL, "Electrical"),
        (PLUMBING, "Plumbing"),
    ] {
        store
            .insert_parent_category(ParentCategory {
                id,
                name: name.to_string(),
            })
            .expect("parent seeded");
    }
    for (id, parent_id, name, short_name) in [
        (ELECTRICAL_REPAIRS, ELECTRICAL, "Electrical Repairs", "Repairs"),
        (DATA_CABLING, ELECTRICAL, "Data Cabling", "Cabling"),
        (GAS_FITTING, PLUMBING, "Gas Fitting", "Gas"),
    ] {
        store
            .insert_sub_category(SubCategory {
                id,
                parent_id,
                name: name.to_string(),
                short_name: short_name.to_string(),
            })
            .expect("sub-category seeded");
    }
    Arc::new(store)
}

/// Single national group covering air conditioning work in NSW.
pub(super) fn arc_payload() -> Value {
    json!({
        "groups": {
            "arc_requirement": {
                "name": "ARC Refrigerant Handling Licence",
                "min_required": 1,
                "state": "National",
                "authority": {
                    "name": "Australian Refrigeration Council",
                    "abn_conditions": {
                        "company": "The company must hold a refrigerant trading authorisation",
                        "individual": "You must hold a refrigerant handling licence"
                    }
                },
                "classes": [{ "name": "Air Conditioning", "state": "National" }]
            }
        },
        "categories": [
            {
                "name": "Air Conditioning",
                "is_parent": true,
                "states": {
                    "NSW": {
                        "licence_required": true,
                        "licence_note": "ARC licence required",
                        "abn_conditions": {},
                        "groups": ["arc_requirement"]
                    }
                }
            }
        ]
    })
}

/// Two NSW groups, a QLD state, and a sub-category addressed by its short name.
pub(super) fn electrical_payload() -> Value {
    json!({
        "groups": {
            "electrician": {
                "name": "Electrical Licence",
                "min_required": 1,
                "state": "NSW",
                "authority": {
                    "name": "NSW Fair Trading",
                    "abn_conditions": {
                        "company": "A nominated supervisor must hold the licence",
                        "individual": "You must hold the licence",
                        "partnership": "Each partner must hold the licence",
                        "trust": "The trustee must hold the licence"
                    }
                },
                "classes": [
                    "Electrician",
                    {
                        "name": "Restricted Electrician",
                        "state": "National",
                        "authority": "Electrical Safety Office"
                    }
                ]
            },
            "contractor": {
                "name": "Contractor Licence",
                "min_required": 2,
                "state": "NSW",
                "authority": { "name": "NSW Fair Trading" },
                "classes": ["Contractor Licence", "Qualified Supervisor Certificate"]
            }
        },
        "categories": [
            {
                "name": "Electrical",
                "is_parent": true,
                "states": {
                    "NSW": {
                        "licence_required": true,
                        "licence_note": "Licence required for all electrical work",
                        "abn_conditions": { "company": "Company must hold a contractor licence" },
                        "groups": ["electrician", "contractor"]
                    },
                    "QLD": {
                        "licence_required": true,
                        "licence_note": "",
                        "abn_conditions": {},
                        "groups": ["electrician"]
                    }
                }
            },
            {
                "name": "Electrical",
                "sub_category_name": "Repairs",
                "is_parent": false,
                "states": {
                    "NSW": {
                        "licence_required": false,
                        "licence_note": "Minor repairs exempt",
                        "abn_conditions": {},
                        "groups": []
                    }
                }
            }
        ]
    })
}

pub(super) fn typed(payload: &Value) -> ImportPayload {
    ImportPayload::from_value(payload, ValidationProfile::Strict).expect("fixture payload is valid")
}

pub(super) fn build_service(
    store: Arc<InMemoryLicenceStore>,
) -> LicenceRequirementService<InMemoryLicenceStore> {
    LicenceRequirementService::new(store, "NSW")
}

/// Service over a seeded store with the electrical and ARC payloads imported.
pub(super) async fn imported_service() -> (
    LicenceRequirementService<InMemoryLicenceStore>,
    Arc<InMemoryLicenceStore>,
) {
    let store = seeded_store();
    let service = build_service(store.clone());
    service
        .import_requirements(&electrical_payload())
        .await
        .expect("electrical import succeeds");
    service
        .update_requirements(&arc_payload())
        .await
        .expect("arc update succeeds");
    (service, store)
}

pub(super) fn request(
    parent: ParentCategoryId,
    sub: Option<i64>,
    abn_kind: AbnKind,
    state: &str,
) -> CategoryRequest {
    CategoryRequest::new(parent.0, sub, abn_kind, state)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Delegates to an in-memory store but fails category-state writes for one parent.
pub(super) struct FailingCategoryStore {
    pub(super) inner: Arc<InMemoryLicenceStore>,
    pub(super) failing_parent: ParentCategoryId,
}

#[async_trait]
impl LicenceRepository for FailingCategoryStore {
    async fn find_category_state(
        &self,
        parent: ParentCategoryId,
        sub: Option<SubCategoryId>,
        state: &str,
    ) -> Result<Option<CategoryState>, RepositoryError> {
        self.inner.find_category_state(parent, sub, state).await
    }

    async fn save_category_state(
        &self,
        category_state: CategoryState,
    ) -> Result<CategoryState, RepositoryError> {
        if category_state.parent_category_id() == self.failing_parent {
            return Err(RepositoryError::from_store_message(
                "connection reset by peer",
            ));
        }
        self.inner.save_category_state(category_state).await
    }

    async fn clear_category_states(&self) -> Result<(), RepositoryError> {
        self.inner.clear_category_states().await
    }

    async fn find_abn_conditions(
        &self,
        category_state: CategoryStateId,
    ) -> Result<Vec<AbnCondition>, RepositoryError> {
        self.inner.find_abn_conditions(category_state).await
    }

    async fn save_abn_condition(
        &self,
        condition: AbnCondition,
    ) -> Result<AbnCondition, RepositoryError> {
        self.inner.save_abn_condition(condition).await
    }

    async fn delete_abn_conditions(
        &self,
        category_state: CategoryStateId,
    ) -> Result<(), RepositoryError> {
        self.inner.delete_abn_conditions(category_state).await
    }

    async fn clear_abn_conditions(&self) -> Result<(), RepositoryError> {
        self.inner.clear_abn_conditions().await
    }

    async fn find_group_by_key(
        &self,
        key: &str,
    ) -> Result<Option<LicenceRequirementGroup>, RepositoryError> {
        self.inner.find_group_by_key(key).await
    }

    async fn save_group(
        &self,
        group: LicenceRequirementGroup,
    ) -> Result<LicenceRequirementGroup, RepositoryError> {
        self.inner.save_group(group).await
    }

    async fn clear_groups(&self) -> Result<(), RepositoryError> {
        self.inner.clear_groups().await
    }

    async fn find_groups_for_category_state(
        &self,
        category_state: CategoryStateId,
    ) -> Result<Vec<LicenceRequirementGroup>, RepositoryError> {
        self.inner
            .find_groups_for_category_state(category_state)
            .await
    }

    async fn link_category_state_group(
        &self,
        category_state: CategoryStateId,
        group: GroupId,
    ) -> Result<(), RepositoryError> {
        self.inner
            .link_category_state_group(category_state, group)
            .await
    }

    async fn unlink_category_state_groups(
        &self,
        category_state: CategoryStateId,
    ) -> Result<(), RepositoryError> {
        self.inner.unlink_category_state_groups(category_state).await
    }

    async fn clear_category_state_groups(&self) -> Result<(), RepositoryError> {
        self.inner.clear_category_state_groups().await
    }

    async fn group_licence_exists(
        &self,
        group: GroupId,
        licence_type: LicenceTypeId,
    ) -> Result<bool, RepositoryError> {
        self.inner.group_licence_exists(group, licence_type).await
    }

    async fn link_group_licence(
        &self,
        group: GroupId,
        licence_type: LicenceTypeId,
    ) -> Result<(), RepositoryError> {
        self.inner.link_group_licence(group, licence_type).await
    }

    async fn find_licence_types_for_group(
        &self,
        group: GroupId,
    ) -> Result<Vec<LicenceType>, RepositoryError> {
        self.inner.find_licence_types_for_group(group).await
    }

    async fn clear_group_licences(&self) -> Result<(), RepositoryError> {
        self.inner.clear_group_licences().await
    }

    async fn find_licence_type(&self, name: &str) -> Result<Option<LicenceType>, RepositoryError> {
        self.inner.find_licence_type(name).await
    }

    async fn save_licence_type(
        &self,
        licence_type: LicenceType,
    ) -> Result<LicenceType, RepositoryError> {
        self.inner.save_licence_type(licence_type).await
    }

    async fn clear_licence_types(&self) -> Result<(), RepositoryError> {
        self.inner.clear_licence_types().await
    }

    async fn find_authority(&self, name: &str) -> Result<Option<Authority>, RepositoryError> {
        self.inner.find_authority(name).await
    }

    async fn save_authority(&self, authority: Authority) -> Result<Authority, RepositoryError> {
        self.inner.save_authority(authority).await
    }

    async fn clear_authorities(&self) -> Result<(), RepositoryError> {
        self.inner.clear_authorities().await
    }

    async fn find_parent_category(
        &self,
        id: ParentCategoryId,
    ) -> Result<Option<ParentCategory>, RepositoryError> {
        self.inner.find_parent_category(id).await
    }

    async fn find_parent_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ParentCategory>, RepositoryError> {
        self.inner.find_parent_category_by_name(name).await
    }

    async fn find_sub_category(
        &self,
        id: SubCategoryId,
    ) -> Result<Option<SubCategory>, RepositoryError> {
        self.inner.find_sub_category(id).await
    }

    async fn find_sub_category_by_name(
        &self,
        parent: Option<ParentCategoryId>,
        name: &str,
    ) -> Result<Option<SubCategory>, RepositoryError> {
        self.inner.find_sub_category_by_name(parent, name).await
    }

    async fn find_sub_category_by_short_name(
        &self,
        parent: Option<ParentCategoryId>,
        short_name: &str,
    ) -> Result<Option<SubCategory>, RepositoryError> {
        self.inner
            .find_sub_category_by_short_name(parent, short_name)
            .await
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>, RepositoryError> {
        self.inner.list_categories().await
    }
}

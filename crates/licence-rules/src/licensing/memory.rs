//! In-process [`LicenceRepository`] used by the CLI, the API server and tests.
//!
//! It enforces the same uniqueness and foreign-key rules as the relational schema and
//! reports violations with store-style messages, so error translation is exercised end
//! to end.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;

use super::domain::{
    AbnCondition, Authority, AuthorityId, CategoryState, CategoryStateId, CategorySummary, GroupId,
    LicenceRequirementGroup, LicenceType, LicenceTypeId, ParentCategory, ParentCategoryId,
    SubCategory, SubCategoryId,
};
use super::repository::{LicenceRepository, RepositoryError};

#[derive(Debug, Default)]
struct StoreState {
    next_id: i64,
    parents: Vec<ParentCategory>,
    subs: Vec<SubCategory>,
    authorities: Vec<Authority>,
    licence_types: Vec<LicenceType>,
    groups: Vec<LicenceRequirementGroup>,
    category_states: Vec<CategoryState>,
    abn_conditions: Vec<AbnCondition>,
    category_state_groups: Vec<(CategoryStateId, GroupId)>,
    group_licences: Vec<(GroupId, LicenceTypeId)>,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_category_state(&self, id: CategoryStateId) -> bool {
        self.category_states.iter().any(|record| record.id() == Some(id))
    }

    fn has_group(&self, id: GroupId) -> bool {
        self.groups.iter().any(|group| group.id() == Some(id))
    }

    fn has_licence_type(&self, id: LicenceTypeId) -> bool {
        self.licence_types
            .iter()
            .any(|licence_type| licence_type.id == Some(id))
    }
}

fn duplicate(constraint: &str) -> RepositoryError {
    RepositoryError::from_store_message(format!(
        "duplicate key value violates unique constraint \"{constraint}\""
    ))
}

fn foreign_key(table: &str, constraint: &str) -> RepositoryError {
    RepositoryError::from_store_message(format!(
        "insert or update on table \"{table}\" violates foreign key constraint \"{constraint}\""
    ))
}

fn still_referenced(table: &str, constraint: &str) -> RepositoryError {
    RepositoryError::from_store_message(format!(
        "delete on table \"{table}\" violates foreign key constraint \"{constraint}\""
    ))
}

/// Row counts per table, for asserting import idempotency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub authorities: usize,
    pub licence_types: usize,
    pub groups: usize,
    pub category_states: usize,
    pub abn_conditions: usize,
    pub category_state_groups: usize,
    pub group_licences: usize,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryLicenceStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryLicenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    pub fn insert_parent_category(&self, category: ParentCategory) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.parents.iter().any(|existing| existing.id == category.id) {
            return Err(duplicate("parent_category_pkey"));
        }
        state.parents.push(category);
        Ok(())
    }

    pub fn insert_sub_category(&self, category: SubCategory) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.parents.iter().any(|parent| parent.id == category.parent_id) {
            return Err(foreign_key("sub_category", "sub_category_parent_id_fkey"));
        }
        if state.subs.iter().any(|existing| existing.id == category.id) {
            return Err(duplicate("sub_category_pkey"));
        }
        state.subs.push(category);
        Ok(())
    }

    pub fn counts(&self) -> Result<StoreCounts, RepositoryError> {
        let state = self.lock()?;
        Ok(StoreCounts {
            authorities: state.authorities.len(),
            licence_types: state.licence_types.len(),
            groups: state.groups.len(),
            category_states: state.category_states.len(),
            abn_conditions: state.abn_conditions.len(),
            category_state_groups: state.category_state_groups.len(),
            group_licences: state.group_licences.len(),
        })
    }
}

#[async_trait]
impl LicenceRepository for InMemoryLicenceStore {
    async fn find_category_state(
        &self,
        parent: ParentCategoryId,
        sub: Option<SubCategoryId>,
        state: &str,
    ) -> Result<Option<CategoryState>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .category_states
            .iter()
            .find(|record| {
                record.parent_category_id() == parent
                    && record.sub_category_id() == sub
                    && record.state() == state
            })
            .cloned())
    }

    async fn save_category_state(
        &self,
        category_state: CategoryState,
    ) -> Result<CategoryState, RepositoryError> {
        let mut store = self.lock()?;
        if !store
            .parents
            .iter()
            .any(|parent| parent.id == category_state.parent_category_id())
        {
            return Err(foreign_key(
                "category_state",
                "category_state_parent_category_id_fkey",
            ));
        }
        if let Some(sub) = category_state.sub_category_id() {
            if !store.subs.iter().any(|existing| existing.id == sub) {
                return Err(foreign_key(
                    "category_state",
                    "category_state_sub_category_id_fkey",
                ));
            }
        }

        let same_triple = |record: &CategoryState| {
            record.parent_category_id() == category_state.parent_category_id()
                && record.sub_category_id() == category_state.sub_category_id()
                && record.state() == category_state.state()
        };
        let position = match category_state.id() {
            Some(id) => store
                .category_states
                .iter()
                .position(|record| record.id() == Some(id)),
            None => store.category_states.iter().position(same_triple),
        };

        match position {
            Some(index) => {
                let id = store.category_states[index].id();
                let conflicting = store
                    .category_states
                    .iter()
                    .any(|record| record.id() != id && same_triple(record));
                if conflicting {
                    return Err(duplicate("category_state_parent_sub_state_key"));
                }
                let saved = match id {
                    Some(id) => category_state.with_id(id),
                    None => category_state,
                };
                store.category_states[index] = saved.clone();
                Ok(saved)
            }
            None => {
                let id = CategoryStateId(store.next_id());
                let saved = category_state.with_id(id);
                store.category_states.push(saved.clone());
                Ok(saved)
            }
        }
    }

    async fn clear_category_states(&self) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if !store.abn_conditions.is_empty() {
            return Err(still_referenced(
                "category_state",
                "abn_condition_category_state_id_fkey",
            ));
        }
        if !store.category_state_groups.is_empty() {
            return Err(still_referenced(
                "category_state",
                "category_state_licence_group_category_state_id_fkey",
            ));
        }
        store.category_states.clear();
        Ok(())
    }

    async fn find_abn_conditions(
        &self,
        category_state: CategoryStateId,
    ) -> Result<Vec<AbnCondition>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .abn_conditions
            .iter()
            .filter(|condition| condition.category_state_id() == category_state)
            .cloned()
            .collect())
    }

    async fn save_abn_condition(
        &self,
        condition: AbnCondition,
    ) -> Result<AbnCondition, RepositoryError> {
        let mut store = self.lock()?;
        if !store.has_category_state(condition.category_state_id()) {
            return Err(foreign_key(
                "abn_condition",
                "abn_condition_category_state_id_fkey",
            ));
        }
        let saved = match condition.id() {
            Some(_) => condition,
            None => {
                let id = store.next_id();
                condition.with_id(id)
            }
        };
        store
            .abn_conditions
            .retain(|existing| existing.id() != saved.id());
        store.abn_conditions.push(saved.clone());
        Ok(saved)
    }

    async fn delete_abn_conditions(
        &self,
        category_state: CategoryStateId,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        store
            .abn_conditions
            .retain(|condition| condition.category_state_id() != category_state);
        Ok(())
    }

    async fn clear_abn_conditions(&self) -> Result<(), RepositoryError> {
        self.lock()?.abn_conditions.clear();
        Ok(())
    }

    async fn find_group_by_key(
        &self,
        key: &str,
    ) -> Result<Option<LicenceRequirementGroup>, RepositoryError> {
        let store = self.lock()?;
        Ok(store.groups.iter().find(|group| group.key() == key).cloned())
    }

    async fn save_group(
        &self,
        group: LicenceRequirementGroup,
    ) -> Result<LicenceRequirementGroup, RepositoryError> {
        let mut store = self.lock()?;
        if store
            .groups
            .iter()
            .any(|existing| existing.key() == group.key() && existing.id() != group.id())
        {
            return Err(duplicate("licence_requirement_group_key_key"));
        }

        match group.id() {
            Some(id) => {
                let Some(index) = store.groups.iter().position(|existing| existing.id() == Some(id))
                else {
                    return Err(RepositoryError::NotFound);
                };
                store.groups[index] = group.clone();
                Ok(group)
            }
            None => {
                let saved = group.with_id(GroupId(store.next_id()));
                store.groups.push(saved.clone());
                Ok(saved)
            }
        }
    }

    async fn clear_groups(&self) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if !store.category_state_groups.is_empty() || !store.group_licences.is_empty() {
            return Err(still_referenced(
                "licence_requirement_group",
                "licence_requirement_group_id_fkey",
            ));
        }
        store.groups.clear();
        Ok(())
    }

    async fn find_groups_for_category_state(
        &self,
        category_state: CategoryStateId,
    ) -> Result<Vec<LicenceRequirementGroup>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .category_state_groups
            .iter()
            .filter(|(state_id, _)| *state_id == category_state)
            .filter_map(|(_, group_id)| {
                store
                    .groups
                    .iter()
                    .find(|group| group.id() == Some(*group_id))
                    .cloned()
            })
            .collect())
    }

    async fn link_category_state_group(
        &self,
        category_state: CategoryStateId,
        group: GroupId,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if !store.has_category_state(category_state) {
            return Err(foreign_key(
                "category_state_licence_group",
                "category_state_licence_group_category_state_id_fkey",
            ));
        }
        if !store.has_group(group) {
            return Err(foreign_key(
                "category_state_licence_group",
                "category_state_licence_group_licence_requirement_group_id_fkey",
            ));
        }
        if store.category_state_groups.contains(&(category_state, group)) {
            return Err(duplicate("category_state_licence_group_pkey"));
        }
        store.category_state_groups.push((category_state, group));
        Ok(())
    }

    async fn unlink_category_state_groups(
        &self,
        category_state: CategoryStateId,
    ) -> Result<(), RepositoryError> {
        self.lock()?
            .category_state_groups
            .retain(|(state_id, _)| *state_id != category_state);
        Ok(())
    }

    async fn clear_category_state_groups(&self) -> Result<(), RepositoryError> {
        self.lock()?.category_state_groups.clear();
        Ok(())
    }

    async fn group_licence_exists(
        &self,
        group: GroupId,
        licence_type: LicenceTypeId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.group_licences.contains(&(group, licence_type)))
    }

    async fn link_group_licence(
        &self,
        group: GroupId,
        licence_type: LicenceTypeId,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if !store.has_group(group) || !store.has_licence_type(licence_type) {
            return Err(foreign_key(
                "licence_requirement_group_licence",
                "licence_requirement_group_licence_fkey",
            ));
        }
        if store.group_licences.contains(&(group, licence_type)) {
            return Err(duplicate("licence_requirement_group_licence_pkey"));
        }
        store.group_licences.push((group, licence_type));
        Ok(())
    }

    async fn find_licence_types_for_group(
        &self,
        group: GroupId,
    ) -> Result<Vec<LicenceType>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .group_licences
            .iter()
            .filter(|(group_id, _)| *group_id == group)
            .filter_map(|(_, licence_id)| {
                store
                    .licence_types
                    .iter()
                    .find(|licence_type| licence_type.id == Some(*licence_id))
                    .cloned()
            })
            .collect())
    }

    async fn clear_group_licences(&self) -> Result<(), RepositoryError> {
        self.lock()?.group_licences.clear();
        Ok(())
    }

    async fn find_licence_type(&self, name: &str) -> Result<Option<LicenceType>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .licence_types
            .iter()
            .find(|licence_type| licence_type.name == name)
            .cloned())
    }

    async fn save_licence_type(
        &self,
        licence_type: LicenceType,
    ) -> Result<LicenceType, RepositoryError> {
        let mut store = self.lock()?;
        if store
            .licence_types
            .iter()
            .any(|existing| existing.name == licence_type.name && existing.id != licence_type.id)
        {
            return Err(duplicate("licence_type_name_key"));
        }
        if let Some(authority_id) = licence_type.authority_id {
            if !store
                .authorities
                .iter()
                .any(|authority| authority.id == Some(authority_id))
            {
                return Err(foreign_key("licence_type", "licence_type_authority_id_fkey"));
            }
        }

        match licence_type.id {
            Some(id) => {
                let Some(index) = store
                    .licence_types
                    .iter()
                    .position(|existing| existing.id == Some(id))
                else {
                    return Err(RepositoryError::NotFound);
                };
                store.licence_types[index] = licence_type.clone();
                Ok(licence_type)
            }
            None => {
                let saved = LicenceType {
                    id: Some(LicenceTypeId(store.next_id())),
                    ..licence_type
                };
                store.licence_types.push(saved.clone());
                Ok(saved)
            }
        }
    }

    async fn clear_licence_types(&self) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if !store.group_licences.is_empty() {
            return Err(still_referenced(
                "licence_type",
                "licence_requirement_group_licence_licence_type_id_fkey",
            ));
        }
        store.licence_types.clear();
        Ok(())
    }

    async fn find_authority(&self, name: &str) -> Result<Option<Authority>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .authorities
            .iter()
            .find(|authority| authority.authority == name || authority.authority_name == name)
            .cloned())
    }

    async fn save_authority(&self, authority: Authority) -> Result<Authority, RepositoryError> {
        let mut store = self.lock()?;
        if store
            .authorities
            .iter()
            .any(|existing| existing.authority == authority.authority && existing.id != authority.id)
        {
            return Err(duplicate("authority_authority_key"));
        }

        match authority.id {
            Some(id) => {
                match store
                    .authorities
                    .iter()
                    .position(|existing| existing.id == Some(id))
                {
                    Some(index) => store.authorities[index] = authority.clone(),
                    None => store.authorities.push(authority.clone()),
                }
                store.next_id = store.next_id.max(id.0);
                Ok(authority)
            }
            None => {
                let saved = Authority {
                    id: Some(AuthorityId(store.next_id())),
                    ..authority
                };
                store.authorities.push(saved.clone());
                Ok(saved)
            }
        }
    }

    async fn clear_authorities(&self) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        if store
            .licence_types
            .iter()
            .any(|licence_type| licence_type.authority_id.is_some())
        {
            return Err(still_referenced(
                "authority",
                "licence_type_authority_id_fkey",
            ));
        }
        store.authorities.clear();
        Ok(())
    }

    async fn find_parent_category(
        &self,
        id: ParentCategoryId,
    ) -> Result<Option<ParentCategory>, RepositoryError> {
        let store = self.lock()?;
        Ok(store.parents.iter().find(|parent| parent.id == id).cloned())
    }

    async fn find_parent_category_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ParentCategory>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .parents
            .iter()
            .find(|parent| parent.name == name)
            .cloned())
    }

    async fn find_sub_category(
        &self,
        id: SubCategoryId,
    ) -> Result<Option<SubCategory>, RepositoryError> {
        let store = self.lock()?;
        Ok(store.subs.iter().find(|sub| sub.id == id).cloned())
    }

    async fn find_sub_category_by_name(
        &self,
        parent: Option<ParentCategoryId>,
        name: &str,
    ) -> Result<Option<SubCategory>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .subs
            .iter()
            .filter(|sub| parent.map_or(true, |parent| sub.parent_id == parent))
            .find(|sub| sub.name == name)
            .cloned())
    }

    async fn find_sub_category_by_short_name(
        &self,
        parent: Option<ParentCategoryId>,
        short_name: &str,
    ) -> Result<Option<SubCategory>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .subs
            .iter()
            .filter(|sub| parent.map_or(true, |parent| sub.parent_id == parent))
            .find(|sub| sub.short_name == short_name)
            .cloned())
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>, RepositoryError> {
        let store = self.lock()?;
        let mut summaries = Vec::with_capacity(store.parents.len() + store.subs.len());
        for parent in &store.parents {
            summaries.push(CategorySummary {
                parent_category_id: parent.id,
                name: parent.name.clone(),
                short_name: None,
                sub_category_id: None,
            });
            for sub in store.subs.iter().filter(|sub| sub.parent_id == parent.id) {
                summaries.push(CategorySummary {
                    parent_category_id: parent.id,
                    name: sub.name.clone(),
                    short_name: Some(sub.short_name.clone()),
                    sub_category_id: Some(sub.id),
                });
            }
        }
        Ok(summaries)
    }
}

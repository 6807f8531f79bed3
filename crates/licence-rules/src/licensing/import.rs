use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Span;

use super::domain::{Authority, CategoryStateId, LicenceType};
use super::error::LicensingError;
use super::linking::GroupLinker;
use super::lookup::{locate_category, CategoryLookup, MissingCategory};
use super::payload::{CategorySpec, GroupSpec, ImportPayload, StateSpec};
use super::repository::LicenceRepository;
use super::rules;
use crate::telemetry;

/// Outcome of loading category states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Category states written.
    pub processed: usize,
    pub missing: Vec<MissingCategory>,
}

/// Orchestrates full and selective loads of rule data.
///
/// Phases run strictly in dependency order: authorities, licence types, groups, category
/// states with their ABN conditions, category-state links, then licence-type links.
pub struct DataImporter<R> {
    repository: Arc<R>,
    linker: GroupLinker<R>,
    span: Span,
}

impl<R> DataImporter<R>
where
    R: LicenceRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_span(repository, telemetry::component_span("importer"))
    }

    pub fn with_span(repository: Arc<R>, span: Span) -> Self {
        let linker = GroupLinker::with_span(repository.clone(), span.clone());
        Self {
            repository,
            linker,
            span,
        }
    }

    /// Clears every derived table, then loads the payload from scratch.
    pub async fn import_full(&self, payload: &ImportPayload) -> Result<ImportReport, LicensingError> {
        tracing::info!(parent: &self.span, "starting full licence data import");
        self.clear_existing_data().await?;

        let groups = payload.groups.clone().unwrap_or_default();
        self.load_authorities(&groups).await?;
        self.load_licence_types(&groups).await?;
        self.load_requirement_groups(&groups).await?;

        let report = self.load_category_states(payload.categories()).await;
        self.linker
            .link_all_category_states_to_groups(payload.categories())
            .await;
        self.link_licence_types_to_groups(&groups).await?;

        tracing::info!(
            parent: &self.span,
            processed = report.processed,
            missing = report.missing.len(),
            "full licence data import completed"
        );
        Ok(report)
    }

    /// Creates or updates only the sections present, preserving everything else.
    pub async fn update_selectively(
        &self,
        payload: &ImportPayload,
    ) -> Result<ImportReport, LicensingError> {
        tracing::info!(parent: &self.span, "starting selective licence data update");

        if let Some(groups) = &payload.groups {
            self.load_authorities(groups).await?;
            self.load_licence_types(groups).await?;
            self.load_requirement_groups(groups).await?;
        }

        let mut report = ImportReport::default();
        if let Some(categories) = &payload.categories {
            report = self.load_category_states(categories).await;
            self.linker
                .link_all_category_states_to_groups(categories)
                .await;
        }

        if let Some(groups) = &payload.groups {
            self.link_licence_types_to_groups(groups).await?;
        }

        tracing::info!(
            parent: &self.span,
            processed = report.processed,
            missing = report.missing.len(),
            "selective licence data update completed"
        );
        Ok(report)
    }

    /// Deletes derived data, children before parents.
    pub async fn clear_existing_data(&self) -> Result<(), LicensingError> {
        tracing::info!(parent: &self.span, "clearing existing licence data");
        self.linker.clear_all_group_links().await?;
        self.repository.clear_group_licences().await?;
        self.repository.clear_abn_conditions().await?;
        self.repository.clear_category_states().await?;
        self.repository.clear_groups().await?;
        self.repository.clear_licence_types().await?;
        self.repository.clear_authorities().await?;
        Ok(())
    }

    /// Creates the authorities named by groups and class objects; existing ones are kept.
    pub async fn load_authorities(
        &self,
        groups: &BTreeMap<String, GroupSpec>,
    ) -> Result<usize, LicensingError> {
        let mut created = 0;
        for group in groups.values() {
            let class_authorities = group.classes.iter().filter_map(|class| class.authority());
            let names = group.authority_name().into_iter().chain(class_authorities);

            for name in names {
                let name = name.trim();
                if name.is_empty() || self.repository.find_authority(name).await?.is_some() {
                    continue;
                }
                self.repository
                    .save_authority(Authority::new(name, group.state_or_default()))
                    .await?;
                created += 1;
            }
        }

        tracing::debug!(parent: &self.span, created, "authorities loaded");
        Ok(created)
    }

    /// Creates licence types for every class not yet known by name.
    pub async fn load_licence_types(
        &self,
        groups: &BTreeMap<String, GroupSpec>,
    ) -> Result<usize, LicensingError> {
        let mut created = 0;
        for (key, group) in groups {
            for class in &group.classes {
                if self.repository.find_licence_type(class.name()).await?.is_some() {
                    continue;
                }

                let authority_id = match class.authority().or_else(|| group.authority_name()) {
                    Some(name) => self.repository.find_authority_id(name.trim()).await?,
                    None => None,
                };
                let state = class
                    .state()
                    .filter(|state| !state.trim().is_empty())
                    .unwrap_or_else(|| group.state_or_default());

                let licence_type = LicenceType::new(class.name(), state, key.as_str(), authority_id)?;
                self.repository.save_licence_type(licence_type).await?;
                created += 1;
            }
        }

        tracing::debug!(parent: &self.span, created, "licence types loaded");
        Ok(created)
    }

    /// Creates groups whose key is not yet stored.
    pub async fn load_requirement_groups(
        &self,
        groups: &BTreeMap<String, GroupSpec>,
    ) -> Result<usize, LicensingError> {
        let mut created = 0;
        for (key, spec) in groups {
            if self.repository.find_group_by_key(key).await?.is_some() {
                tracing::debug!(parent: &self.span, group = %key, "group exists, skipping");
                continue;
            }
            let group = rules::create_requirement_group(key, spec)?;
            self.repository.save_group(group).await?;
            created += 1;
        }

        tracing::debug!(parent: &self.span, created, "licence requirement groups loaded");
        Ok(created)
    }

    /// Writes category states for every resolvable category.
    ///
    /// A failing category is recorded in `missing` and the rest still load.
    pub async fn load_category_states(&self, categories: &[CategorySpec]) -> ImportReport {
        let mut report = ImportReport::default();

        for category in categories {
            // States written before a failure stay counted.
            match self.load_category(category, &mut report.processed).await {
                Ok(None) => {}
                Ok(Some(missing)) => {
                    tracing::warn!(
                        parent: &self.span,
                        category = %missing.name,
                        reason = %missing.reason,
                        "category not found"
                    );
                    report.missing.push(missing);
                }
                Err(error) => {
                    tracing::error!(
                        parent: &self.span,
                        category = %category.name,
                        %error,
                        "error processing category"
                    );
                    report.missing.push(MissingCategory::for_spec(
                        category,
                        format!("Processing error: {error}"),
                    ));
                }
            }
        }

        tracing::info!(
            parent: &self.span,
            processed = report.processed,
            missing = report.missing.len(),
            "category states loaded"
        );
        report
    }

    /// Writes each state of `category`, bumping `written` per saved state.
    async fn load_category(
        &self,
        category: &CategorySpec,
        written: &mut usize,
    ) -> Result<Option<MissingCategory>, LicensingError> {
        let target = match locate_category(self.repository.as_ref(), category).await? {
            CategoryLookup::Found(target) => target,
            CategoryLookup::Missing(missing) => return Ok(Some(missing)),
        };
        let sub = target.sub.as_ref().map(|sub| sub.id);

        for (state, data) in &category.states {
            let existing = self
                .repository
                .find_category_state(target.parent.id, sub, state)
                .await?;
            let record = match existing {
                Some(existing) => {
                    existing.with_requirement(data.licence_required, data.licence_note())
                }
                None => rules::create_category_state(
                    target.parent.id,
                    sub,
                    state,
                    data.licence_required,
                    data.licence_note(),
                )?,
            };

            let saved = self.repository.save_category_state(record).await?;
            let id = saved.id().ok_or_else(|| {
                LicensingError::Processing(format!(
                    "category state for {} in {state} was saved without an id",
                    category.name
                ))
            })?;

            *written += 1;

            if data.abn_conditions.is_some() {
                self.replace_abn_conditions(id, data).await?;
            }
        }

        Ok(None)
    }

    /// ABN conditions are replaced wholesale, never patched.
    async fn replace_abn_conditions(
        &self,
        category_state: CategoryStateId,
        data: &StateSpec,
    ) -> Result<(), LicensingError> {
        self.repository.delete_abn_conditions(category_state).await?;
        for (kind, message) in data.abn_conditions() {
            let condition = rules::create_abn_condition(category_state, kind, message)?;
            self.repository.save_abn_condition(condition).await?;
        }
        Ok(())
    }

    /// Links each group to the licence types its classes name.
    pub async fn link_licence_types_to_groups(
        &self,
        groups: &BTreeMap<String, GroupSpec>,
    ) -> Result<(), LicensingError> {
        for (key, spec) in groups {
            if spec.classes.is_empty() {
                continue;
            }
            let Some(group_id) = self
                .repository
                .find_group_by_key(key)
                .await?
                .and_then(|group| group.id())
            else {
                continue;
            };

            let mut licence_types = Vec::with_capacity(spec.classes.len());
            for class in &spec.classes {
                if let Some(id) = self
                    .repository
                    .find_licence_type(class.name())
                    .await?
                    .and_then(|licence_type| licence_type.id)
                {
                    licence_types.push(id);
                }
            }

            if !licence_types.is_empty() {
                self.linker
                    .link_licence_types_to_group(group_id, &licence_types)
                    .await?;
            }
        }
        Ok(())
    }
}

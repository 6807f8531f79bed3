use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::Span;

use super::domain::{AbnKind, LicenceRequirementGroup, ParentCategory, SubCategory};
use super::error::LicensingError;
use super::payload::CategoryRequest;
use super::repository::LicenceRepository;
use super::response::{
    AuthorityView, BatchRequirements, CategoryOutcome, CategoryView, GroupView,
    RequirementsResponse, StateView,
};
use super::rules;
use crate::telemetry;

/// Read pipeline turning a category request into its licence requirements.
pub struct RequirementResolver<R> {
    repository: Arc<R>,
    span: Span,
}

impl<R> RequirementResolver<R>
where
    R: LicenceRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_span(repository, telemetry::component_span("resolver"))
    }

    pub fn with_span(repository: Arc<R>, span: Span) -> Self {
        Self { repository, span }
    }

    pub async fn resolve(
        &self,
        request: &CategoryRequest,
    ) -> Result<RequirementsResponse, LicensingError> {
        let parent_id = request.parent_category_id;
        let sub_id = request.sub_category_id;
        let state = request.state.as_str();
        tracing::debug!(
            parent: &self.span,
            parent_category = %parent_id,
            sub_category = sub_id.map(|sub| sub.0).unwrap_or(0),
            abn_kind = %request.abn_kind,
            state,
            "resolving licence requirements"
        );

        if !rules::validate_category_compatibility(parent_id.0, sub_id.map(|sub| sub.0)) {
            return Err(LicensingError::not_found(
                "Invalid category combination: parent_category_id and sub_category_id are not compatible",
            ));
        }

        let parent = self
            .repository
            .find_parent_category(parent_id)
            .await?
            .ok_or_else(|| {
                LicensingError::not_found(format!(
                    "Parent category with ID {parent_id} not found. Please provide a valid parent_category_id."
                ))
            })?;

        let sub = match sub_id {
            Some(sub_id) => {
                let sub = self
                    .repository
                    .find_sub_category(sub_id)
                    .await?
                    .filter(|sub| sub.parent_id == parent_id)
                    .ok_or_else(|| {
                        LicensingError::not_found(format!(
                            "Sub-category with ID {sub_id} not found or not associated with parent category {parent_id}. Please provide a valid sub_category_id."
                        ))
                    })?;
                Some(sub)
            }
            None => None,
        };

        let category_state = self
            .repository
            .find_category_state(parent_id, sub_id, state)
            .await?
            .ok_or_else(|| {
                LicensingError::not_found(format!(
                    "No licence requirements found for category {} in {state}. This category may not require licensing or may not be available in this state.",
                    describe(&parent, sub.as_ref())
                ))
            })?;

        let groups = match category_state.id() {
            Some(id) => self.repository.find_groups_for_category_state(id).await?,
            None => Vec::new(),
        };
        if groups.is_empty() {
            tracing::warn!(
                parent: &self.span,
                category = %describe(&parent, sub.as_ref()),
                state,
                "no licence groups linked to category state"
            );
        }

        let mut views = BTreeMap::new();
        let mut keys = Vec::with_capacity(groups.len());
        for group in &groups {
            let key = group_key(group);
            if views.contains_key(&key) {
                continue;
            }
            let view = self.group_view(group, request).await?;
            views.insert(key.clone(), view);
            keys.push(key);
        }

        let mut states = BTreeMap::new();
        states.insert(
            state.to_string(),
            StateView {
                licence_required: category_state.requires_licence(),
                licence_note: category_state.licence_note().to_string(),
                groups: keys,
            },
        );

        Ok(RequirementsResponse {
            groups: views,
            categories: vec![CategoryView {
                name: parent.name.clone(),
                sub_category_name: sub.map(|sub| sub.name),
                is_parent: category_state.is_parent_category(),
                states,
            }],
        })
    }

    async fn group_view(
        &self,
        group: &LicenceRequirementGroup,
        request: &CategoryRequest,
    ) -> Result<GroupView, LicensingError> {
        let classes: Vec<String> = match group.id() {
            Some(id) => self
                .repository
                .find_licence_types_for_group(id)
                .await?
                .into_iter()
                .filter(|licence_type| licence_type.applies_in(&request.state))
                .map(|licence_type| licence_type.name)
                .collect(),
            None => Vec::new(),
        };

        // `other` has no group-level column.
        let mut abn_conditions = BTreeMap::new();
        if request.abn_kind != AbnKind::Other {
            let message = group
                .abn_conditions()
                .message_for(request.abn_kind)
                .unwrap_or_default();
            abn_conditions.insert(request.abn_kind, message.to_string());
        }

        Ok(GroupView {
            name: group.name().to_string(),
            min_required: group.min_required(),
            state: group.state().to_string(),
            rule: group.rule(classes.len()).to_string(),
            authority: AuthorityView {
                name: group.authority_name().to_string(),
                abn_conditions,
            },
            classes,
        })
    }

    /// Resolves every request concurrently and merges the outcomes.
    ///
    /// One failing request never prevents the others from resolving.
    pub async fn resolve_many(&self, requests: Vec<CategoryRequest>) -> BatchRequirements {
        tracing::info!(parent: &self.span, requests = requests.len(), "resolving category batch");

        let outcomes = join_all(requests.into_iter().map(|request| async move {
            let result = self.resolve(&request).await.map_err(|error| {
                tracing::error!(
                    parent: &self.span,
                    parent_category = %request.parent_category_id,
                    sub_category = request.sub_category_id.map(|sub| sub.0).unwrap_or(0),
                    %error,
                    "error fetching requirements for category"
                );
                error.to_string()
            });
            CategoryOutcome { request, result }
        }))
        .await;

        let batch = rules::aggregate_results(outcomes);
        tracing::info!(
            parent: &self.span,
            found = batch.found,
            not_found = batch.not_found.len(),
            "category batch resolved"
        );
        batch
    }
}

fn group_key(group: &LicenceRequirementGroup) -> String {
    if group.key().is_empty() {
        rules::group_key_from_name(group.name())
    } else {
        group.key().to_string()
    }
}

fn describe(parent: &ParentCategory, sub: Option<&SubCategory>) -> String {
    match sub {
        Some(sub) => format!("\"{} -> {}\"", parent.name, sub.name),
        None => format!("\"{}\"", parent.name),
    }
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::CategorySummary;
use super::error::LicensingError;
use super::import::{DataImporter, ImportReport};
use super::lookup::MissingCategory;
use super::payload::{parse_batch_filter, parse_category_request, CategoryRequest, ImportPayload};
use super::repository::LicenceRepository;
use super::resolution::RequirementResolver;
use super::response::{BatchRequirements, RequirementsResponse};
use super::rules::ValidationProfile;

/// Result of a selective update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub message: String,
    pub updated: bool,
    pub processed: usize,
    pub missing: Vec<MissingCategory>,
}

impl UpdateOutcome {
    fn from_report(report: ImportReport) -> Self {
        let mut message = format!(
            "Licence requirements updated selectively. Updated/added {} categories (existing data preserved).",
            report.processed
        );
        if !report.missing.is_empty() {
            message.push_str(&format!(
                " {} categories could not be processed.",
                report.missing.len()
            ));
        }

        Self {
            message,
            updated: true,
            processed: report.processed,
            missing: report.missing,
        }
    }
}

/// Facade composing the importer and resolver over one repository.
pub struct LicenceRequirementService<R> {
    repository: Arc<R>,
    importer: DataImporter<R>,
    resolver: RequirementResolver<R>,
    default_state: String,
}

impl<R> LicenceRequirementService<R>
where
    R: LicenceRepository + 'static,
{
    pub fn new(repository: Arc<R>, default_state: impl Into<String>) -> Self {
        Self {
            importer: DataImporter::new(repository.clone()),
            resolver: RequirementResolver::new(repository.clone()),
            repository,
            default_state: default_state.into(),
        }
    }

    pub fn default_state(&self) -> &str {
        &self.default_state
    }

    /// Requirements for a single category request.
    pub async fn requirements(
        &self,
        request: &CategoryRequest,
    ) -> Result<RequirementsResponse, LicensingError> {
        self.resolver.resolve(request).await
    }

    /// Parses a raw request object, then resolves it.
    pub async fn requirements_from_value(
        &self,
        raw: &Value,
    ) -> Result<RequirementsResponse, LicensingError> {
        let request = parse_category_request(raw, "Single request", &self.default_state)?;
        self.requirements(&request).await
    }

    pub async fn requirements_batch(&self, requests: Vec<CategoryRequest>) -> BatchRequirements {
        self.resolver.resolve_many(requests).await
    }

    /// Parses the batch filter and resolves every request in it.
    pub async fn requirements_batch_filter(
        &self,
        filter: &str,
    ) -> Result<BatchRequirements, LicensingError> {
        let requests = parse_batch_filter(filter, &self.default_state)?;
        Ok(self.requirements_batch(requests).await)
    }

    /// Non-destructive update touching only the sections present in `payload`.
    pub async fn update_requirements(&self, payload: &Value) -> Result<UpdateOutcome, LicensingError> {
        let payload = ImportPayload::from_value(payload, ValidationProfile::Selective)?;
        let report = self.importer.update_selectively(&payload).await?;
        Ok(UpdateOutcome::from_report(report))
    }

    /// Replaces all rule data with `payload`.
    pub async fn import_requirements(&self, payload: &Value) -> Result<ImportReport, LicensingError> {
        let payload = ImportPayload::from_value(payload, ValidationProfile::Strict)?;
        self.importer.import_full(&payload).await
    }

    pub async fn categories(&self) -> Result<Vec<CategorySummary>, LicensingError> {
        Ok(self.repository.list_categories().await?)
    }
}

use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use licence_rules::config::LicensingConfig;
use licence_rules::error::AppError;
use licence_rules::licensing::{InMemoryLicenceStore, LicenceRequirementService, ReferenceSeed};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds a store holding the reference categories and authorities from `seed_dir`, if set.
pub(crate) async fn seeded_store(
    config: &LicensingConfig,
    seed_dir: Option<&Path>,
) -> Result<Arc<InMemoryLicenceStore>, AppError> {
    let store = Arc::new(InMemoryLicenceStore::new());
    match seed_dir.or(config.seed_dir.as_deref()) {
        Some(dir) => {
            let seed = ReferenceSeed::from_dir(dir)?;
            seed.apply(&store).await?;
            info!(
                dir = %dir.display(),
                parent_categories = seed.parent_categories.len(),
                sub_categories = seed.sub_categories.len(),
                authorities = seed.authorities.len(),
                "reference data seeded"
            );
        }
        None => warn!("no seed directory configured; category lookups will find nothing"),
    }
    Ok(store)
}

pub(crate) fn licence_service(
    store: Arc<InMemoryLicenceStore>,
    config: &LicensingConfig,
) -> Arc<LicenceRequirementService<InMemoryLicenceStore>> {
    Arc::new(LicenceRequirementService::new(
        store,
        config.default_state.clone(),
    ))
}

pub(crate) fn read_payload(path: &Path) -> Result<Value, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

use crate::infra::{licence_service, read_payload, seeded_store};
use clap::Args;
use licence_rules::config::AppConfig;
use licence_rules::error::AppError;
use licence_rules::licensing::{LicensingError, MissingCategory};
use licence_rules::telemetry;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// JSON document with `groups` and/or `categories`
    pub(crate) payload: PathBuf,
    /// Replace all rule data instead of updating selectively
    #[arg(long)]
    pub(crate) full: bool,
    /// Directory holding the reference CSV files (overrides LICENSING_SEED_DIR)
    #[arg(long)]
    pub(crate) seed_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ResolveArgs {
    /// Rules to import before resolving
    #[arg(long)]
    pub(crate) payload: PathBuf,
    #[arg(long)]
    pub(crate) parent: i64,
    #[arg(long)]
    pub(crate) sub: Option<i64>,
    /// company, individual, partnership, trust or other
    #[arg(long)]
    pub(crate) abn_kind: String,
    /// Jurisdiction code; defaults to LICENSING_DEFAULT_STATE
    #[arg(long)]
    pub(crate) state: Option<String>,
    #[arg(long)]
    pub(crate) seed_dir: Option<PathBuf>,
}

fn load_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;
    Ok(config)
}

pub(crate) async fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let store = seeded_store(&config.licensing, args.seed_dir.as_deref()).await?;
    let service = licence_service(store.clone(), &config.licensing);
    let payload = read_payload(&args.payload)?;

    if args.full {
        let report = service.import_requirements(&payload).await?;
        println!(
            "Full import complete: {} categories processed",
            report.processed
        );
        render_missing(&report.missing);
    } else {
        let outcome = service.update_requirements(&payload).await?;
        println!("{}", outcome.message);
        render_missing(&outcome.missing);
    }

    let counts = store.counts().map_err(LicensingError::from)?;
    println!("\nStored rule data");
    println!("  Authorities: {}", counts.authorities);
    println!("  Licence types: {}", counts.licence_types);
    println!("  Requirement groups: {}", counts.groups);
    println!("  Category states: {}", counts.category_states);
    println!("  ABN conditions: {}", counts.abn_conditions);
    println!(
        "  Links: {} category-group, {} group-licence",
        counts.category_state_groups, counts.group_licences
    );
    Ok(())
}

pub(crate) async fn run_resolve(args: ResolveArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let store = seeded_store(&config.licensing, args.seed_dir.as_deref()).await?;
    let service = licence_service(store, &config.licensing);

    let report = service
        .import_requirements(&read_payload(&args.payload)?)
        .await?;
    render_missing(&report.missing);

    let request = resolve_request(&args);
    let response = service.requirements_from_value(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn resolve_request(args: &ResolveArgs) -> Value {
    let mut request = Map::new();
    request.insert("parent_category_id".to_string(), json!(args.parent));
    if let Some(sub) = args.sub {
        request.insert("sub_category_id".to_string(), json!(sub));
    }
    request.insert("abn_kind".to_string(), json!(args.abn_kind));
    if let Some(state) = &args.state {
        request.insert("state".to_string(), json!(state));
    }
    Value::Object(request)
}

fn render_missing(missing: &[MissingCategory]) {
    if missing.is_empty() {
        return;
    }
    println!("\nCategories not processed");
    for entry in missing {
        match &entry.sub_category_name {
            Some(sub) => println!("  - {} -> {}: {}", entry.name, sub, entry.reason),
            None => println!("  - {}: {}", entry.name, entry.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_request_omits_unset_fields() {
        let args = ResolveArgs {
            payload: PathBuf::from("rules.json"),
            parent: 4,
            sub: None,
            abn_kind: "trust".to_string(),
            state: None,
            seed_dir: None,
        };

        assert_eq!(
            resolve_request(&args),
            json!({ "parent_category_id": 4, "abn_kind": "trust" })
        );
    }

    #[test]
    fn resolve_request_carries_sub_category_and_state() {
        let args = ResolveArgs {
            payload: PathBuf::from("rules.json"),
            parent: 4,
            sub: Some(12),
            abn_kind: "company".to_string(),
            state: Some("VIC".to_string()),
            seed_dir: None,
        };

        let request = resolve_request(&args);

        assert_eq!(request["sub_category_id"], 12);
        assert_eq!(request["state"], "VIC");
    }
}

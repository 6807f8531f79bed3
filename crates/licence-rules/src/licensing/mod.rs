//! Trade licence requirement rules: which licences a tradesperson must hold for a
//! category in a jurisdiction, plus the import engine that maintains those rules.
//!
//! Engines depend only on [`LicenceRepository`]; [`InMemoryLicenceStore`] is the bundled
//! implementation.

pub mod domain;
pub mod error;
pub mod import;
pub mod linking;
pub mod lookup;
pub mod memory;
pub mod payload;
pub mod repository;
pub mod resolution;
pub mod response;
pub mod router;
pub mod rules;
pub mod seed;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AbnCondition, AbnConditions, AbnKind, Authority, CategoryState, CategorySummary,
    LicenceRequirementGroup, LicenceType, ParentCategory, RequirementRule, SubCategory,
};
pub use error::{LicensingError, ValidationErrors, Violation};
pub use import::{DataImporter, ImportReport};
pub use linking::GroupLinker;
pub use lookup::{MissingCategory, MissingKind};
pub use memory::{InMemoryLicenceStore, StoreCounts};
pub use payload::{parse_batch_filter, parse_category_request, CategoryRequest, ImportPayload};
pub use repository::{LicenceRepository, RepositoryError};
pub use resolution::RequirementResolver;
pub use response::{BatchRequirements, NotFoundEntry, RequirementsResponse};
pub use router::licence_router;
pub use rules::ValidationProfile;
pub use seed::{ReferenceSeed, SeedError};
pub use service::{LicenceRequirementService, UpdateOutcome};

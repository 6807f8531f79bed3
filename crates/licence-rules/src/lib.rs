//! Trade licence requirement rules: resolution of the licences a tradesperson must hold for a
//! business category and jurisdiction, plus the import engine that keeps the rule data current.

pub mod config;
pub mod error;
pub mod licensing;
pub mod telemetry;

//! Sales aggregation core shared by the aggregator CLI, the seeder and the API.
//!
//! Responsibilities:
//! - Tokenize uploaded sales CSV text into rows
//! - Resolve column roles from header names
//! - Aggregate rows into the dashboard document (territory totals, top-15 comparisons)
//! - Keep the cached dashboard record (load / overwrite / clear)
//! - Read and write whole documents in the dashboard document store
//!
//! CRITICAL: aggregation must be DETERMINISTIC
//! Same input text = same output document

pub mod aggregate;
pub mod cache;
pub mod columns;
pub mod defaults;
pub mod logging;
pub mod model;
pub mod store;
pub mod table;
pub mod territory;

pub use aggregate::{aggregate, AggregateError, AggregateOptions, PHONE_CASE_TYPES, TOP_N};
pub use cache::{period_label, CacheError, CachedDashboard, DashboardCache};
pub use defaults::DashboardDocument;
pub use model::AggregateResult;
pub use store::{fetch_document, DocumentPath, DocumentStore, FetchError, StoreConfig, StoreError};

//! Classifies warehouse associates into presence categories from badge scans,
//! clock punches and compliance records, and rolls them up by department.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod reduce;
pub mod report;
pub mod taxonomy;

pub use aggregate::{AggregationResult, AggregationRow, Aggregator, Ordering, RollupLevel};
pub use classify::UnscannedPolicy;
pub use config::EngineConfig;
pub use engine::{ClassificationRun, PresenceEngine};
pub use error::{PresenceError, Result};
pub use models::{
    AssociateSnapshot, ClassifiedAssociate, EventField, PresenceFlag, PresenceFlags, RawEvent,
    RawTable,
};
pub use taxonomy::{GroupField, HierarchyMapping};

//! One classification pass: normalize, reduce, classify, enrich.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{distinct_count, AggregationResult, Aggregator, RollupLevel};
use crate::classify::{Classifier, UnscannedPolicy};
use crate::config::EngineConfig;
use crate::error::{PresenceError, Result};
use crate::models::{
    AssociateSnapshot, ClassifiedAssociate, EventField, ParseIssue, PresenceFlag, RawEvent,
    RawTable,
};
use crate::normalize::normalize;
use crate::reduce::latest_per_associate;
use crate::taxonomy::GroupField;

/// Validated configuration ready to classify tables. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct PresenceEngine {
    config: EngineConfig,
    required: Vec<EventField>,
    naive_offset: FixedOffset,
}

impl PresenceEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let required = config.required_event_fields()?;
        let naive_offset = config.naive_offset()?;
        Ok(Self {
            config,
            required,
            naive_offset,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy(&self) -> UnscannedPolicy {
        self.config.unscanned_policy
    }

    /// Runs at the configured evaluation instant, or now.
    pub fn run(&self, table: &RawTable) -> Result<ClassificationRun> {
        self.run_at(table, self.config.evaluation_instant())
    }

    pub fn run_at(&self, table: &RawTable, now: DateTime<Utc>) -> Result<ClassificationRun> {
        let normalized = normalize(table, &self.required, self.naive_offset)?;
        let associates = self.classify_events(&normalized.events, now);

        if !normalized.issues.is_empty() {
            warn!(
                issues = normalized.issues.len(),
                "some rows had unparseable fields"
            );
        }
        info!(
            associates = associates.len(),
            rows = table.rows.len(),
            dropped = normalized.dropped_rows,
            policy = %self.config.unscanned_policy,
            evaluated_at = %now.to_rfc3339(),
            "classification complete"
        );

        Ok(ClassificationRun {
            evaluated_at: now,
            unscanned_policy: self.config.unscanned_policy,
            associates,
            issues: normalized.issues,
            dropped_rows: normalized.dropped_rows,
            placeholder: self.config.hierarchy.placeholder.clone(),
        })
    }

    /// Classification for callers that already hold normalized events.
    pub fn classify_events(&self, events: &[RawEvent], now: DateTime<Utc>) -> Vec<ClassifiedAssociate> {
        let mut flags = Classifier::new(&self.config, now).classify(events);
        let snapshots: Vec<AssociateSnapshot> = latest_per_associate(events)
            .into_iter()
            .map(|latest| {
                let associate_flags = flags.remove(&latest.associate_id).unwrap_or_default();
                AssociateSnapshot::new(latest, associate_flags)
            })
            .collect();
        self.config.hierarchy.enrich(&snapshots)
    }

    pub fn resolve(&self, name: &str) -> Result<GroupField> {
        self.config.hierarchy.resolve(name)
    }

    /// Count-ordered rollup levels from grouping names, outermost first.
    pub fn levels<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<RollupLevel>> {
        names
            .iter()
            .map(|name| self.resolve(name.as_ref()).map(RollupLevel::new))
            .collect()
    }
}

/// Result of one pass. Replaced wholesale by the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationRun {
    pub evaluated_at: DateTime<Utc>,
    pub unscanned_policy: UnscannedPolicy,
    /// One row per associate, ordered by associate id.
    pub associates: Vec<ClassifiedAssociate>,
    pub issues: Vec<ParseIssue>,
    pub dropped_rows: usize,
    #[serde(skip)]
    placeholder: String,
}

impl ClassificationRun {
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn associate(&self, associate_id: &str) -> Option<&ClassifiedAssociate> {
        self.associates
            .binary_search_by(|associate| associate.associate_id().cmp(associate_id))
            .ok()
            .map(|index| &self.associates[index])
    }

    /// Associates carrying `flag`, or everyone when `flag` is `None`.
    pub fn members(&self, flag: Option<PresenceFlag>) -> Vec<&ClassifiedAssociate> {
        self.associates
            .iter()
            .filter(|associate| flag.map_or(true, |flag| associate.flags().get(flag)))
            .collect()
    }

    pub fn count(&self, flag: PresenceFlag) -> usize {
        distinct_count(&self.members(Some(flag)))
    }

    pub fn totals(&self) -> Vec<(PresenceFlag, usize)> {
        PresenceFlag::ALL
            .into_iter()
            .map(|flag| (flag, self.count(flag)))
            .collect()
    }

    pub fn breakdown(
        &self,
        flag: Option<PresenceFlag>,
        levels: &[RollupLevel],
    ) -> Result<AggregationResult> {
        Aggregator::new(&self.placeholder)
            .rollup(&self.members(flag), levels)
            .ok_or_else(|| {
                PresenceError::Configuration("breakdown needs at least one grouping field".to_string())
            })
    }
}

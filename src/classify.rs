//! Presence rules evaluated over each associate's full event history.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::PresenceError;
use crate::models::{PresenceFlags, RawEvent};

/// How `unscanned` is decided. The two are not equivalent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnscannedPolicy {
    /// `on_floor && !scanned_in`
    #[default]
    Derived,
    /// Any event carrying a compliance / time-off-task marker.
    ExplicitMarker,
}

impl UnscannedPolicy {
    pub fn name(self) -> &'static str {
        match self {
            UnscannedPolicy::Derived => "derived",
            UnscannedPolicy::ExplicitMarker => "explicit-marker",
        }
    }
}

impl fmt::Display for UnscannedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnscannedPolicy {
    type Err = PresenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "derived" => Ok(UnscannedPolicy::Derived),
            "explicit-marker" | "explicit_marker" | "marker" => Ok(UnscannedPolicy::ExplicitMarker),
            other => Err(PresenceError::Configuration(format!(
                "unknown unscanned policy '{other}'"
            ))),
        }
    }
}

/// Case-insensitive values that flag an event as compliance / time off task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComplianceMarkers {
    pub sources: Vec<String>,
    pub departments: Vec<String>,
    pub positions: Vec<String>,
}

impl Default for ComplianceMarkers {
    fn default() -> Self {
        Self {
            sources: vec!["compliance".to_string()],
            departments: vec!["compliance".to_string()],
            positions: vec!["time off task".to_string()],
        }
    }
}

impl ComplianceMarkers {
    pub fn matches(&self, event: &RawEvent) -> bool {
        any_caseless(&self.sources, Some(event.source.as_str()))
            || any_caseless(&self.departments, event.work_department.as_deref())
            || any_caseless(&self.positions, event.work_position.as_deref())
    }
}

fn any_caseless(markers: &[String], value: Option<&str>) -> bool {
    let Some(value) = value else {
        return false;
    };
    let value = value.trim().to_lowercase();
    markers.iter().any(|marker| marker.trim().to_lowercase() == value)
}

fn eq_caseless(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Latest punch-in and punch-out seen for one associate.
///
/// The outer `Option` is whether a punch exists at all; the inner one is its
/// timestamp, which may be unparseable. Absent timestamps order before present ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockState {
    pub punch_in: Option<Option<DateTime<Utc>>>,
    pub punch_out: Option<Option<DateTime<Utc>>>,
}

impl ClockState {
    pub fn record_punch_in(&mut self, at: Option<DateTime<Utc>>) {
        self.punch_in = Some(self.punch_in.map_or(at, |prev| prev.max(at)));
    }

    pub fn record_punch_out(&mut self, at: Option<DateTime<Utc>>) {
        self.punch_out = Some(self.punch_out.map_or(at, |prev| prev.max(at)));
    }

    pub fn is_clocked_in(&self) -> bool {
        match (self.punch_in, self.punch_out) {
            (Some(_), None) => true,
            (Some(punch_in), Some(punch_out)) => punch_in > punch_out,
            (None, _) => false,
        }
    }
}

#[derive(Debug, Default)]
struct Evidence {
    on_floor: bool,
    scanned_in: bool,
    in_position: bool,
    marked: bool,
    clock: ClockState,
}

/// Applies the configured rule families against a fixed evaluation instant.
pub struct Classifier<'a> {
    config: &'a EngineConfig,
    now: DateTime<Utc>,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a EngineConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    pub fn policy(&self) -> UnscannedPolicy {
        self.config.unscanned_policy
    }

    /// Flags for every associate that has at least one event, keyed by id.
    pub fn classify(&self, events: &[RawEvent]) -> BTreeMap<String, PresenceFlags> {
        let floor_window = self.config.floor_window();
        let in_position_window = self.config.in_position_window();
        let mut evidence: BTreeMap<&str, Evidence> = BTreeMap::new();

        for event in events {
            let entry = evidence.entry(event.associate_id.as_str()).or_default();
            let source = event.source.trim();

            if self.config.is_floor_source(source) && self.within(event.timestamp, floor_window) {
                entry.on_floor = true;
            }

            if self.config.is_scanned_source(source) {
                entry.scanned_in = true;
                if self.within(event.timestamp, in_position_window) {
                    entry.in_position = true;
                }
            }

            if self.config.compliance_markers.matches(event) {
                entry.marked = true;
            }

            if eq_caseless(source, &self.config.clock_source) {
                if let Some(position) = event.work_position.as_deref() {
                    if eq_caseless(position, &self.config.punch_in_position) {
                        entry.clock.record_punch_in(event.timestamp);
                    } else if eq_caseless(position, &self.config.punch_out_position) {
                        entry.clock.record_punch_out(event.timestamp);
                    }
                }
            }
        }

        evidence
            .into_iter()
            .map(|(id, evidence)| (id.to_string(), self.flags(&evidence)))
            .collect()
    }

    fn flags(&self, evidence: &Evidence) -> PresenceFlags {
        let unscanned = match self.config.unscanned_policy {
            UnscannedPolicy::Derived => evidence.on_floor && !evidence.scanned_in,
            UnscannedPolicy::ExplicitMarker => evidence.marked,
        };

        PresenceFlags {
            on_floor: evidence.on_floor,
            scanned_in: evidence.scanned_in,
            unscanned,
            clocked_in: evidence.clock.is_clocked_in(),
            in_position: evidence.in_position,
        }
    }

    /// Without a window every event qualifies, timestamp or not.
    fn within(&self, at: Option<DateTime<Utc>>, window: Option<Duration>) -> bool {
        match window {
            None => true,
            Some(window) => at.is_some_and(|at| self.now - at <= window),
        }
    }
}

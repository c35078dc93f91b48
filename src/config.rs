//! Engine configuration: defaults, TOML loading and validation.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Deserialize;

use crate::classify::{ComplianceMarkers, UnscannedPolicy};
use crate::error::{PresenceError, Result};
use crate::models::EventField;
use crate::taxonomy::HierarchyMapping;

/// Entry in `floor_sources` that makes every source floor-indicating.
pub const ANY_SOURCE: &str = "*";

const MAX_OFFSET_MINUTES: i32 = 24 * 60;

/// One week.
const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// None or 0 evaluates on-floor on existence of a qualifying event alone.
    pub floor_window_minutes: Option<i64>,
    pub in_position_window_minutes: Option<i64>,
    pub scanned_sources: BTreeSet<String>,
    pub floor_sources: BTreeSet<String>,
    pub clock_source: String,
    pub punch_in_position: String,
    pub punch_out_position: String,
    pub unscanned_policy: UnscannedPolicy,
    pub compliance_markers: ComplianceMarkers,
    pub required_fields: Vec<String>,
    /// Offset applied to timestamps that carry no zone, e.g. local scanner clocks.
    pub naive_timestamp_offset_minutes: i32,
    pub hierarchy: HierarchyMapping,
    /// Defaults to wall-clock now, captured once per run.
    pub evaluation_instant: Option<DateTime<Utc>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let scanned_sources: BTreeSet<String> = ["Badgr", "HighJump", "Pick to Light"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut floor_sources = scanned_sources.clone();
        floor_sources.insert("Workday".to_string());

        Self {
            floor_window_minutes: Some(10),
            in_position_window_minutes: Some(5),
            scanned_sources,
            floor_sources,
            clock_source: "Workday".to_string(),
            punch_in_position: "Punch In".to_string(),
            punch_out_position: "Punch Out".to_string(),
            unscanned_policy: UnscannedPolicy::Derived,
            compliance_markers: ComplianceMarkers::default(),
            required_fields: [
                EventField::AssociateId,
                EventField::Source,
                EventField::WorkDepartment,
                EventField::WorkPosition,
                EventField::Timestamp,
            ]
            .into_iter()
            .map(|field| field.name().to_string())
            .collect(),
            naive_timestamp_offset_minutes: 0,
            hierarchy: HierarchyMapping::default(),
            evaluation_instant: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents)
            .map_err(|err| PresenceError::Configuration(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, window) in [
            ("floor_window_minutes", self.floor_window_minutes),
            ("in_position_window_minutes", self.in_position_window_minutes),
        ] {
            if let Some(minutes) = window {
                if minutes < 0 {
                    return Err(PresenceError::Configuration(format!(
                        "{name} must not be negative (got {minutes})"
                    )));
                }
                if minutes > MAX_WINDOW_MINUTES {
                    return Err(PresenceError::Configuration(format!(
                        "{name} must be at most {MAX_WINDOW_MINUTES} (got {minutes})"
                    )));
                }
            }
        }

        self.required_event_fields()?;
        self.naive_offset()?;

        for (name, value) in [
            ("clock_source", &self.clock_source),
            ("punch_in_position", &self.punch_in_position),
            ("punch_out_position", &self.punch_out_position),
        ] {
            if value.trim().is_empty() {
                return Err(PresenceError::Configuration(format!("{name} must not be empty")));
            }
        }

        self.hierarchy.validate()
    }

    pub fn required_event_fields(&self) -> Result<Vec<EventField>> {
        self.required_fields
            .iter()
            .map(|name| {
                name.parse::<EventField>().map_err(|_| {
                    PresenceError::Configuration(format!("unknown required field '{name}'"))
                })
            })
            .collect()
    }

    pub fn naive_offset(&self) -> Result<FixedOffset> {
        let minutes = self.naive_timestamp_offset_minutes;
        if !(1 - MAX_OFFSET_MINUTES..MAX_OFFSET_MINUTES).contains(&minutes) {
            return Err(PresenceError::Configuration(format!(
                "naive_timestamp_offset_minutes out of range (got {minutes})"
            )));
        }
        FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
            PresenceError::Configuration(format!(
                "naive_timestamp_offset_minutes out of range (got {minutes})"
            ))
        })
    }

    pub fn floor_window(&self) -> Option<Duration> {
        window(self.floor_window_minutes)
    }

    pub fn in_position_window(&self) -> Option<Duration> {
        window(self.in_position_window_minutes)
    }

    pub fn is_floor_source(&self, source: &str) -> bool {
        self.floor_sources.contains(ANY_SOURCE) || self.floor_sources.contains(source)
    }

    pub fn is_scanned_source(&self, source: &str) -> bool {
        self.scanned_sources.contains(source)
    }

    pub fn evaluation_instant(&self) -> DateTime<Utc> {
        self.evaluation_instant.unwrap_or_else(Utc::now)
    }
}

fn window(minutes: Option<i64>) -> Option<Duration> {
    match minutes {
        Some(minutes) if minutes > 0 => Duration::try_minutes(minutes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.floor_window(), Some(Duration::minutes(10)));
        assert!(config.is_floor_source("Workday"));
        assert!(!config.is_scanned_source("Workday"));
    }

    #[test]
    fn zero_window_disables_windowing() {
        let config = EngineConfig {
            floor_window_minutes: Some(0),
            in_position_window_minutes: None,
            ..EngineConfig::default()
        };
        assert_eq!(config.floor_window(), None);
        assert_eq!(config.in_position_window(), None);
    }

    #[test]
    fn negative_window_is_rejected() {
        let err = EngineConfig::from_toml_str("floor_window_minutes = -5").unwrap_err();
        assert!(matches!(err, PresenceError::Configuration(msg) if msg.contains("floor_window_minutes")));
    }

    #[test]
    fn huge_window_is_rejected() {
        let err = EngineConfig::from_toml_str("floor_window_minutes = 9223372036854775807")
            .unwrap_err();
        assert!(matches!(err, PresenceError::Configuration(msg) if msg.contains("floor_window_minutes")));

        let config = EngineConfig {
            in_position_window_minutes: Some(MAX_WINDOW_MINUTES + 1),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(PresenceError::Configuration(_))));

        let week = EngineConfig {
            floor_window_minutes: Some(MAX_WINDOW_MINUTES),
            ..EngineConfig::default()
        };
        week.validate().unwrap();
        assert_eq!(week.floor_window(), Some(Duration::weeks(1)));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = EngineConfig::from_toml_str("floor_windw_minutes = 5").unwrap_err();
        assert!(matches!(err, PresenceError::Configuration(_)));
    }

    #[test]
    fn unknown_required_field_is_rejected() {
        let err = EngineConfig::from_toml_str(r#"required_fields = ["associate_id", "badge"]"#)
            .unwrap_err();
        assert!(matches!(err, PresenceError::Configuration(msg) if msg.contains("badge")));
    }

    #[test]
    fn offset_out_of_range_is_rejected() {
        let err = EngineConfig::from_toml_str("naive_timestamp_offset_minutes = 1440").unwrap_err();
        assert!(matches!(err, PresenceError::Configuration(_)));

        for minutes in [i32::MIN, i32::MAX, -1440] {
            let config = EngineConfig {
                naive_timestamp_offset_minutes: minutes,
                ..EngineConfig::default()
            };
            assert!(matches!(config.validate(), Err(PresenceError::Configuration(_))));
        }

        let west = EngineConfig {
            naive_timestamp_offset_minutes: -1439,
            ..EngineConfig::default()
        };
        assert_eq!(west.naive_offset().unwrap().local_minus_utc(), -1439 * 60);
    }

    #[test]
    fn scanned_department_maps_from_work_department() {
        let config = EngineConfig::from_toml_str(
            r#"
            [[hierarchy.levels]]
            name = "scanned_group"
            from = "scanned_department"
            map = { Kitting = "Production" }
            "#,
        )
        .unwrap();
        assert_eq!(config.hierarchy.levels[0].from, EventField::WorkDepartment);
    }

    #[test]
    fn parses_full_file() {
        let config = EngineConfig::from_toml_str(
            r#"
            floor_window_minutes = 15
            scanned_sources = ["Badgr"]
            floor_sources = ["*"]
            unscanned_policy = "explicit-marker"
            evaluation_instant = "2026-03-02T14:00:00Z"

            [compliance_markers]
            positions = ["break"]

            [hierarchy]
            placeholder = "n/a"

            [[hierarchy.levels]]
            name = "work_department_group"
            from = "work_department"
            map = { Assembly = "Production" }
            "#,
        )
        .unwrap();

        assert_eq!(config.floor_window(), Some(Duration::minutes(15)));
        assert!(config.is_floor_source("anything"));
        assert_eq!(config.unscanned_policy, UnscannedPolicy::ExplicitMarker);
        assert_eq!(config.compliance_markers.positions, vec!["break".to_string()]);
        assert_eq!(config.hierarchy.placeholder, "n/a");
        assert_eq!(config.hierarchy.levels.len(), 1);
        assert_eq!(
            config.evaluation_instant.unwrap().to_rfc3339(),
            "2026-03-02T14:00:00+00:00"
        );
    }
}

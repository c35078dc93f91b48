//! Normalized department hierarchy labels.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PresenceError, Result};
use crate::models::{AssociateSnapshot, ClassifiedAssociate, EventField};

pub const DEFAULT_PLACEHOLDER: &str = "—";

/// One level of the rollup, e.g. work department group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HierarchyLevel {
    pub name: String,
    /// Raw field the label is looked up from.
    pub from: EventField,
    /// Exact, case-sensitive lookup on the trimmed raw value.
    #[serde(default)]
    pub map: BTreeMap<String, String>,
}

impl HierarchyLevel {
    pub fn new(name: impl Into<String>, from: EventField) -> Self {
        Self {
            name: name.into(),
            from,
            map: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, raw: impl Into<String>, label: impl Into<String>) -> Self {
        self.map.insert(raw.into(), label.into());
        self
    }

    /// Unmapped values fall back to themselves, missing values to `placeholder`.
    pub fn label(&self, raw: Option<&str>, placeholder: &str) -> String {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => self
                .map
                .get(value)
                .cloned()
                .unwrap_or_else(|| value.to_string()),
            None => placeholder.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HierarchyMapping {
    pub placeholder: String,
    pub levels: Vec<HierarchyLevel>,
}

impl Default for HierarchyMapping {
    fn default() -> Self {
        let groups = [
            ("Assembly", "Production"),
            ("Kitting", "Production"),
            ("Labeling", "Production"),
            ("Prep", "Production"),
            ("Inventory", "Warehouse"),
            ("Putaway", "Warehouse"),
            ("Replenishment", "Warehouse"),
            ("Loading", "Shipping"),
        ]
        .into_iter()
        .fold(
            HierarchyLevel::new("work_department_group", EventField::WorkDepartment),
            |level, (raw, label)| level.with_entry(raw, label),
        );

        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            levels: vec![
                groups,
                HierarchyLevel::new("sub_department", EventField::WorkPosition),
            ],
        }
    }
}

impl HierarchyMapping {
    pub fn validate(&self) -> Result<()> {
        if self.placeholder.trim().is_empty() {
            return Err(PresenceError::Configuration(
                "hierarchy placeholder must not be empty".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for level in &self.levels {
            let name = level.name.trim();
            if name.is_empty() {
                return Err(PresenceError::Configuration(
                    "hierarchy level name must not be empty".to_string(),
                ));
            }
            if name.parse::<EventField>().is_ok() {
                return Err(PresenceError::Configuration(format!(
                    "hierarchy level '{name}' shadows an event field"
                )));
            }
            if level.from == EventField::Timestamp {
                return Err(PresenceError::Configuration(format!(
                    "hierarchy level '{name}' cannot be derived from timestamp"
                )));
            }
            if !seen.insert(name) {
                return Err(PresenceError::Configuration(format!(
                    "duplicate hierarchy level '{name}'"
                )));
            }
        }
        Ok(())
    }

    pub fn level(&self, name: &str) -> Option<&HierarchyLevel> {
        self.levels.iter().find(|level| level.name.trim() == name)
    }

    /// Resolves a grouping name against event fields first, then hierarchy levels.
    pub fn resolve(&self, name: &str) -> Result<GroupField> {
        let name = name.trim();
        if let Ok(field) = name.parse::<EventField>() {
            if field != EventField::Timestamp {
                return Ok(GroupField::Field(field));
            }
        }
        match self.level(name) {
            Some(level) => Ok(GroupField::Level(level.name.trim().to_string())),
            None => Err(PresenceError::UnknownField(name.to_string())),
        }
    }

    /// Returns enriched copies; the input is left untouched.
    pub fn enrich(&self, snapshots: &[AssociateSnapshot]) -> Vec<ClassifiedAssociate> {
        snapshots
            .iter()
            .map(|snapshot| ClassifiedAssociate {
                hierarchy: self
                    .levels
                    .iter()
                    .map(|level| {
                        (
                            level.name.trim().to_string(),
                            level.label(snapshot.field(level.from), &self.placeholder),
                        )
                    })
                    .collect(),
                snapshot: snapshot.clone(),
            })
            .collect()
    }
}

/// What an aggregation groups by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum GroupField {
    Field(EventField),
    Level(String),
}

impl GroupField {
    pub fn label<'a>(&self, associate: &'a ClassifiedAssociate, placeholder: &'a str) -> &'a str {
        let value = match self {
            GroupField::Field(field) => associate.snapshot.field(*field),
            GroupField::Level(name) => associate.hierarchy.get(name).map(String::as_str),
        };
        value.unwrap_or(placeholder)
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupField::Field(field) => f.write_str(field.name()),
            GroupField::Level(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PresenceFlags, RawEvent};

    fn snapshot(id: &str, department: Option<&str>) -> AssociateSnapshot {
        let event = RawEvent {
            work_department: department.map(str::to_string),
            ..RawEvent::new(id, "Badgr")
        };
        AssociateSnapshot::new(event, PresenceFlags::default())
    }

    #[test]
    fn mapped_unmapped_and_missing_values() {
        let mapping = HierarchyMapping::default();
        let snapshots = vec![
            snapshot("A100", Some("Assembly")),
            snapshot("A101", Some("Dock 7")),
            snapshot("A102", None),
            snapshot("A103", Some("  Putaway ")),
        ];
        let enriched = mapping.enrich(&snapshots);
        let groups: Vec<_> = enriched
            .iter()
            .map(|a| a.hierarchy["work_department_group"].as_str())
            .collect();
        assert_eq!(groups, vec!["Production", "Dock 7", DEFAULT_PLACEHOLDER, "Warehouse"]);
        // the input keeps its raw values
        assert_eq!(snapshots[3].work_department.as_deref(), Some("  Putaway "));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let level = HierarchyLevel::new("group", EventField::WorkDepartment)
            .with_entry("Assembly", "Production");
        assert_eq!(level.label(Some("assembly"), "-"), "assembly");
        assert_eq!(level.label(Some("Assembly"), "-"), "Production");
        assert_eq!(level.label(Some("   "), "-"), "-");
    }

    #[test]
    fn resolve_prefers_event_fields_then_levels() {
        let mapping = HierarchyMapping::default();
        assert_eq!(
            mapping.resolve("job_department").unwrap(),
            GroupField::Field(EventField::JobDepartment)
        );
        assert_eq!(
            mapping.resolve("sub_department").unwrap(),
            GroupField::Level("sub_department".to_string())
        );
        assert!(matches!(
            mapping.resolve("timestamp"),
            Err(PresenceError::UnknownField(_))
        ));
        assert!(matches!(
            mapping.resolve("floor"),
            Err(PresenceError::UnknownField(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_levels() {
        let shadowing = HierarchyMapping {
            placeholder: "-".to_string(),
            levels: vec![HierarchyLevel::new("line", EventField::Line)],
        };
        assert!(shadowing.validate().is_err());

        let duplicate = HierarchyMapping {
            placeholder: "-".to_string(),
            levels: vec![
                HierarchyLevel::new("group", EventField::WorkDepartment),
                HierarchyLevel::new("group", EventField::JobDepartment),
            ],
        };
        assert!(duplicate.validate().is_err());

        let blank = HierarchyMapping {
            placeholder: " ".to_string(),
            levels: Vec::new(),
        };
        assert!(blank.validate().is_err());
    }
}

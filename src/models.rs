use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PresenceError;

/// In-memory tabular input as handed over by a caller: one header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Canonical event fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventField {
    AssociateId,
    AssociateName,
    Source,
    JobDepartment,
    #[serde(alias = "scanned_department")]
    WorkDepartment,
    WorkPosition,
    Timestamp,
    ShiftType,
    ShiftCohort,
    Line,
}

impl EventField {
    pub const ALL: [EventField; 10] = [
        EventField::AssociateId,
        EventField::AssociateName,
        EventField::Source,
        EventField::JobDepartment,
        EventField::WorkDepartment,
        EventField::WorkPosition,
        EventField::Timestamp,
        EventField::ShiftType,
        EventField::ShiftCohort,
        EventField::Line,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventField::AssociateId => "associate_id",
            EventField::AssociateName => "associate_name",
            EventField::Source => "source",
            EventField::JobDepartment => "job_department",
            EventField::WorkDepartment => "work_department",
            EventField::WorkPosition => "work_position",
            EventField::Timestamp => "timestamp",
            EventField::ShiftType => "shift_type",
            EventField::ShiftCohort => "shift_cohort",
            EventField::Line => "line",
        }
    }

    /// Resolves an input column header, accepting the scan export's own headers.
    pub fn from_header(header: &str) -> Option<Self> {
        let key = header.trim().to_ascii_lowercase();
        match key.as_str() {
            "name" => Some(EventField::AssociateName),
            "scanned_department" => Some(EventField::WorkDepartment),
            "start_time_local" | "last_activity_ts" => Some(EventField::Timestamp),
            other => other.parse().ok(),
        }
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventField {
    type Err = PresenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| PresenceError::UnknownField(s.to_string()))
    }
}

/// One observed activity record after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawEvent {
    pub associate_id: String,
    pub associate_name: Option<String>,
    pub source: String,
    pub job_department: Option<String>,
    pub work_department: Option<String>,
    pub work_position: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub shift_type: Option<String>,
    pub shift_cohort: Option<String>,
    pub line: Option<String>,
}

impl RawEvent {
    pub fn new(associate_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            associate_id: associate_id.into(),
            associate_name: None,
            source: source.into(),
            job_department: None,
            work_department: None,
            work_position: None,
            timestamp: None,
            shift_type: None,
            shift_cohort: None,
            line: None,
        }
    }
}

/// A cell that failed to parse. The row is kept with that field absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseIssue {
    /// 1-based data row, header excluded.
    pub row: usize,
    pub field: EventField,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PresenceFlags {
    pub on_floor: bool,
    pub scanned_in: bool,
    pub unscanned: bool,
    pub clocked_in: bool,
    pub in_position: bool,
}

impl PresenceFlags {
    pub fn get(&self, flag: PresenceFlag) -> bool {
        match flag {
            PresenceFlag::OnFloor => self.on_floor,
            PresenceFlag::ScannedIn => self.scanned_in,
            PresenceFlag::Unscanned => self.unscanned,
            PresenceFlag::ClockedIn => self.clocked_in,
            PresenceFlag::InPosition => self.in_position,
        }
    }
}

/// Presence categories a caller can render as a tile or filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceFlag {
    OnFloor,
    ScannedIn,
    Unscanned,
    ClockedIn,
    InPosition,
}

impl PresenceFlag {
    pub const ALL: [PresenceFlag; 5] = [
        PresenceFlag::OnFloor,
        PresenceFlag::ScannedIn,
        PresenceFlag::Unscanned,
        PresenceFlag::ClockedIn,
        PresenceFlag::InPosition,
    ];

    pub fn title(self) -> &'static str {
        match self {
            PresenceFlag::OnFloor => "On Floor",
            PresenceFlag::ScannedIn => "Scanned In",
            PresenceFlag::Unscanned => "Unscanned",
            PresenceFlag::ClockedIn => "Clocked In",
            PresenceFlag::InPosition => "In Position",
        }
    }
}

impl fmt::Display for PresenceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for PresenceFlag {
    type Err = PresenceError;

    /// Accepts tile titles ("On Floor") and kebab-case names ("on-floor").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        PresenceFlag::ALL
            .into_iter()
            .find(|flag| flag.title().to_ascii_lowercase() == key)
            .ok_or_else(|| PresenceError::UnknownField(s.to_string()))
    }
}

/// The reduced current view of one associate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociateSnapshot {
    pub associate_id: String,
    pub associate_name: Option<String>,
    pub source: String,
    pub job_department: Option<String>,
    pub work_department: Option<String>,
    pub work_position: Option<String>,
    pub shift_type: Option<String>,
    pub shift_cohort: Option<String>,
    pub line: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub flags: PresenceFlags,
}

impl AssociateSnapshot {
    pub fn new(latest: RawEvent, flags: PresenceFlags) -> Self {
        Self {
            associate_id: latest.associate_id,
            associate_name: latest.associate_name,
            source: latest.source,
            job_department: latest.job_department,
            work_department: latest.work_department,
            work_position: latest.work_position,
            shift_type: latest.shift_type,
            shift_cohort: latest.shift_cohort,
            line: latest.line,
            last_activity: latest.timestamp,
            flags,
        }
    }

    /// Display value of a descriptive field. Timestamps are not groupable.
    pub fn field(&self, field: EventField) -> Option<&str> {
        match field {
            EventField::AssociateId => Some(self.associate_id.as_str()),
            EventField::AssociateName => self.associate_name.as_deref(),
            EventField::Source => Some(self.source.as_str()),
            EventField::JobDepartment => self.job_department.as_deref(),
            EventField::WorkDepartment => self.work_department.as_deref(),
            EventField::WorkPosition => self.work_position.as_deref(),
            EventField::ShiftType => self.shift_type.as_deref(),
            EventField::ShiftCohort => self.shift_cohort.as_deref(),
            EventField::Line => self.line.as_deref(),
            EventField::Timestamp => None,
        }
    }
}

/// A snapshot enriched with normalized hierarchy labels, keyed by level name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedAssociate {
    #[serde(flatten)]
    pub snapshot: AssociateSnapshot,
    pub hierarchy: BTreeMap<String, String>,
}

impl ClassifiedAssociate {
    pub fn associate_id(&self) -> &str {
        &self.snapshot.associate_id
    }

    pub fn flags(&self) -> PresenceFlags {
        self.snapshot.flags
    }
}

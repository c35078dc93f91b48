//! Turns raw tabular rows from any source system into canonical [`RawEvent`]s.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use crate::error::{PresenceError, Result};
use crate::models::{EventField, ParseIssue, RawEvent, RawTable};

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub events: Vec<RawEvent>,
    pub issues: Vec<ParseIssue>,
    /// Rows discarded for lacking an associate id.
    pub dropped_rows: usize,
}

pub fn normalize(
    table: &RawTable,
    required: &[EventField],
    naive_offset: FixedOffset,
) -> Result<Normalized> {
    let mut columns: BTreeMap<EventField, usize> = BTreeMap::new();
    for (index, header) in table.headers.iter().enumerate() {
        if let Some(field) = EventField::from_header(header) {
            columns.entry(field).or_insert(index);
        }
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|field| !columns.contains_key(field))
        .map(|field| field.name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PresenceError::Schema { missing });
    }

    let mut normalized = Normalized::default();

    for (index, row) in table.rows.iter().enumerate() {
        let row_number = index + 1;
        let cell = |field: EventField| -> Option<String> {
            columns
                .get(&field)
                .and_then(|&column| row.get(column))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let Some(associate_id) = cell(EventField::AssociateId) else {
            debug!(row = row_number, "dropping row without associate id");
            normalized.dropped_rows += 1;
            continue;
        };

        let timestamp = match cell(EventField::Timestamp) {
            Some(raw) => match parse_timestamp(&raw, naive_offset) {
                Some(parsed) => Some(parsed),
                None => {
                    debug!(row = row_number, value = %raw, "unparseable timestamp");
                    normalized.issues.push(ParseIssue {
                        row: row_number,
                        field: EventField::Timestamp,
                        value: raw,
                        reason: "unrecognized timestamp format".to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        normalized.events.push(RawEvent {
            associate_id,
            associate_name: cell(EventField::AssociateName),
            source: cell(EventField::Source).unwrap_or_default(),
            job_department: cell(EventField::JobDepartment),
            work_department: cell(EventField::WorkDepartment),
            work_position: cell(EventField::WorkPosition),
            timestamp,
            shift_type: cell(EventField::ShiftType),
            shift_cohort: cell(EventField::ShiftCohort),
            line: cell(EventField::Line),
        });
    }

    Ok(normalized)
}

/// RFC 3339 values keep their zone; zone-less values are read at `naive_offset`.
pub fn parse_timestamp(value: &str, naive_offset: FixedOffset) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|naive| naive_offset.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
}

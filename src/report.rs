//! Wallboard rendering: markdown report and the associate detail table.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{AggregationResult, RollupLevel};
use crate::engine::ClassificationRun;
use crate::error::Result;
use crate::models::{ClassifiedAssociate, EventField, PresenceFlag};
use crate::taxonomy::GroupField;

/// Case-insensitive "contains" filters over the detail table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFilter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub job_department: Option<String>,
    pub work_department: Option<String>,
    pub work_position: Option<String>,
    pub scanned_in: Option<bool>,
}

impl DetailFilter {
    pub fn matches(&self, row: &DetailRow) -> bool {
        contains(&self.id, Some(row.id.as_str()))
            && contains(&self.name, Some(row.name.as_str()))
            && contains(&self.job_department, Some(row.hiring_department.as_str()))
            && contains(&self.work_department, row.work_department.as_deref())
            && contains(&self.work_position, row.work_position.as_deref())
            && self.scanned_in.map_or(true, |wanted| wanted == row.scanned_in)
    }
}

fn contains(needle: &Option<String>, haystack: Option<&str>) -> bool {
    match needle.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        None => true,
        Some(needle) => haystack
            .is_some_and(|value| value.to_lowercase().contains(&needle.to_lowercase())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub id: String,
    pub name: String,
    pub hiring_department: String,
    pub scanned_in: bool,
    pub work_department: Option<String>,
    pub work_position: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl DetailRow {
    fn from_associate(associate: &ClassifiedAssociate, placeholder: &str, hide_names: bool) -> Self {
        let snapshot = &associate.snapshot;
        let name = match (&snapshot.associate_name, hide_names) {
            (Some(name), false) => name.clone(),
            _ => placeholder.to_string(),
        };
        Self {
            id: snapshot.associate_id.clone(),
            name,
            hiring_department: snapshot
                .job_department
                .clone()
                .unwrap_or_else(|| placeholder.to_string()),
            scanned_in: snapshot.flags.scanned_in,
            work_department: snapshot.work_department.clone(),
            work_position: snapshot.work_position.clone(),
            last_activity: snapshot.last_activity,
        }
    }
}

/// Latest activity per associate, sorted by hiring department then name.
pub fn detail_rows(run: &ClassificationRun, filter: &DetailFilter, hide_names: bool) -> Vec<DetailRow> {
    let mut rows: Vec<DetailRow> = run
        .associates
        .iter()
        .map(|associate| DetailRow::from_associate(associate, run.placeholder(), hide_names))
        .filter(|row| filter.matches(row))
        .collect();
    rows.sort_by(|a, b| {
        a.hiring_department
            .cmp(&b.hiring_department)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    rows
}

pub fn build_report(
    run: &ClassificationRun,
    levels: &[RollupLevel],
    hide_names: bool,
) -> Result<String> {
    let mut output = String::new();
    let tile_levels = [RollupLevel::new(GroupField::Field(EventField::JobDepartment))];

    let _ = writeln!(output, "# Live Floor Presence");
    let _ = writeln!(
        output,
        "Data as of {} (unscanned policy: {})",
        run.evaluated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        run.unscanned_policy
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Live Tiles");

    for flag in [PresenceFlag::OnFloor, PresenceFlag::ScannedIn, PresenceFlag::Unscanned] {
        let breakdown = run.breakdown(Some(flag), &tile_levels)?;
        let _ = writeln!(output);
        let _ = writeln!(output, "### {} — {}", flag.title(), run.count(flag));
        if breakdown.is_empty() {
            let _ = writeln!(output, "No associates in this category.");
        } else {
            write_tree(&mut output, &breakdown, 0);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Department-level Scanned Count");
    let scanned = run.breakdown(Some(PresenceFlag::ScannedIn), levels)?;
    if scanned.is_empty() {
        let _ = writeln!(output, "No scanned associates.");
    } else {
        write_tree(&mut output, &scanned, 0);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Latest Associate Activity");
    let rows = detail_rows(run, &DetailFilter::default(), hide_names);
    if rows.is_empty() {
        let _ = writeln!(output, "No associate activity recorded.");
    } else {
        write_detail_table(&mut output, &rows, run.placeholder());
    }

    if !run.issues.is_empty() || run.dropped_rows > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "_{} rows without an associate id were dropped; {} cells could not be parsed._",
            run.dropped_rows,
            run.issues.len()
        );
    }

    Ok(output)
}

pub fn write_tree(output: &mut String, result: &AggregationResult, depth: usize) {
    let indent = "  ".repeat(depth);
    for row in &result.rows {
        let _ = writeln!(output, "{indent}- {}: {}", row.label, row.count);
        if let Some(children) = &row.children {
            write_tree(output, children, depth + 1);
        }
    }
}

pub fn write_detail_table(output: &mut String, rows: &[DetailRow], placeholder: &str) {
    let _ = writeln!(
        output,
        "| Id | Name | Hiring Department | Scanned In | Work Department | Work Position | Last Activity |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for row in rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            row.id,
            row.name,
            row.hiring_department,
            if row.scanned_in { "Yes" } else { "No" },
            row.work_department.as_deref().unwrap_or(placeholder),
            row.work_position.as_deref().unwrap_or(placeholder),
            row.last_activity
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| placeholder.to_string()),
        );
    }
}

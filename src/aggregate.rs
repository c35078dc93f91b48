//! Distinct-associate counts grouped by one or more hierarchy levels.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::ClassifiedAssociate;
use crate::taxonomy::GroupField;

/// Row order of one aggregation level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Ordering {
    /// Count descending, then label ascending.
    #[default]
    ByCount,
    /// Reference labels first (zero counts included), then leftovers. With a
    /// catch-all label the leftovers collapse into one row under it; otherwise
    /// they follow individually in count order.
    Template {
        labels: Vec<String>,
        catch_all: Option<String>,
    },
}

impl Ordering {
    pub fn template<I, S>(labels: I, catch_all: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ordering::Template {
            labels: labels.into_iter().map(Into::into).collect(),
            catch_all: catch_all.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupLevel {
    pub field: GroupField,
    pub ordering: Ordering,
}

impl RollupLevel {
    pub fn new(field: GroupField) -> Self {
        Self {
            field,
            ordering: Ordering::ByCount,
        }
    }

    pub fn ordered(field: GroupField, ordering: Ordering) -> Self {
        Self { field, ordering }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationRow {
    pub label: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<AggregationResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationResult {
    pub field: GroupField,
    /// Distinct associates across every row.
    pub total: usize,
    pub rows: Vec<AggregationRow>,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row labels in emitted order, usable as a template for a sibling breakdown.
    pub fn labels(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.label.clone()).collect()
    }

    pub fn row(&self, label: &str) -> Option<&AggregationRow> {
        self.rows.iter().find(|row| row.label == label)
    }

    pub fn counts(&self) -> Vec<(&str, usize)> {
        self.rows
            .iter()
            .map(|row| (row.label.as_str(), row.count))
            .collect()
    }
}

pub fn distinct_count(members: &[&ClassifiedAssociate]) -> usize {
    members
        .iter()
        .map(|associate| associate.associate_id())
        .collect::<BTreeSet<_>>()
        .len()
}

pub struct Aggregator<'a> {
    placeholder: &'a str,
}

impl<'a> Aggregator<'a> {
    /// `placeholder` labels members whose grouping value is missing.
    pub fn new(placeholder: &'a str) -> Self {
        Self { placeholder }
    }

    /// Nested rollup; each row of level N expands into level N+1 over its members.
    /// Returns `None` when no levels are given.
    pub fn rollup(
        &self,
        members: &[&ClassifiedAssociate],
        levels: &[RollupLevel],
    ) -> Option<AggregationResult> {
        let (level, rest) = levels.split_first()?;
        let rows = self
            .ordered_groups(members, level)
            .into_iter()
            .map(|(label, group)| AggregationRow {
                count: distinct_count(&group),
                children: self.rollup(&group, rest),
                label,
            })
            .collect();

        Some(AggregationResult {
            field: level.field.clone(),
            total: distinct_count(members),
            rows,
        })
    }

    pub fn group_by(
        &self,
        members: &[&ClassifiedAssociate],
        field: GroupField,
        ordering: Ordering,
    ) -> AggregationResult {
        let total = distinct_count(members);
        self.rollup(members, &[RollupLevel::ordered(field.clone(), ordering)])
            .unwrap_or(AggregationResult {
                field,
                total,
                rows: Vec::new(),
            })
    }

    fn ordered_groups<'m>(
        &self,
        members: &[&'m ClassifiedAssociate],
        level: &RollupLevel,
    ) -> Vec<(String, Vec<&'m ClassifiedAssociate>)> {
        let mut buckets: BTreeMap<String, Vec<&'m ClassifiedAssociate>> = BTreeMap::new();
        for &associate in members {
            let label = level.field.label(associate, self.placeholder);
            buckets.entry(label.to_string()).or_default().push(associate);
        }

        match &level.ordering {
            Ordering::ByCount => by_count(buckets.into_iter().collect()),
            Ordering::Template { labels, catch_all } => {
                let mut rows: Vec<(String, Vec<&'m ClassifiedAssociate>)> = Vec::new();
                for label in labels {
                    if rows.iter().any(|(existing, _)| existing == label) {
                        continue;
                    }
                    let group = buckets.remove(label).unwrap_or_default();
                    rows.push((label.clone(), group));
                }

                let leftovers: Vec<_> = buckets.into_iter().collect();
                match catch_all {
                    Some(catch_all) if !leftovers.is_empty() => {
                        let merged = leftovers.into_iter().flat_map(|(_, group)| group);
                        match rows.iter_mut().find(|(label, _)| label == catch_all) {
                            Some((_, group)) => group.extend(merged),
                            None => rows.push((catch_all.clone(), merged.collect())),
                        }
                    }
                    Some(_) => {}
                    None => rows.extend(by_count(leftovers)),
                }
                rows
            }
        }
    }
}

fn by_count<'m>(
    mut groups: Vec<(String, Vec<&'m ClassifiedAssociate>)>,
) -> Vec<(String, Vec<&'m ClassifiedAssociate>)> {
    groups.sort_by(|(label_a, a), (label_b, b)| {
        distinct_count(b)
            .cmp(&distinct_count(a))
            .then_with(|| label_a.cmp(label_b))
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssociateSnapshot, EventField, PresenceFlags, RawEvent};
    use crate::taxonomy::HierarchyMapping;

    fn associate(id: &str, job: &str, position: &str, line: Option<&str>) -> ClassifiedAssociate {
        let event = RawEvent {
            job_department: Some(job.to_string()),
            work_department: Some(position.to_string()),
            work_position: Some(position.to_string()),
            line: line.map(str::to_string),
            ..RawEvent::new(id, "Badgr")
        };
        let snapshot = AssociateSnapshot::new(event, PresenceFlags::default());
        HierarchyMapping::default()
            .enrich(std::slice::from_ref(&snapshot))
            .remove(0)
    }

    fn job() -> GroupField {
        GroupField::Field(EventField::JobDepartment)
    }

    fn sample() -> Vec<ClassifiedAssociate> {
        vec![
            associate("A100", "Production", "Kitting", Some("L1")),
            associate("A101", "Production", "Assembly", Some("L1")),
            associate("A102", "Warehouse", "Inventory", None),
            associate("A103", "Shipping", "Loading", Some("L3")),
            associate("A104", "Shipping", "Loading", Some("L4")),
            associate("A106", "Production", "Labeling", Some("L2")),
        ]
    }

    #[test]
    fn counts_descend_with_label_tiebreak() {
        let data = sample();
        let members: Vec<_> = data.iter().collect();
        let result = Aggregator::new("—").group_by(&members, job(), Ordering::ByCount);
        assert_eq!(
            result.counts(),
            vec![("Production", 3), ("Shipping", 2), ("Warehouse", 1)]
        );
        assert_eq!(result.total, 6);
    }

    #[test]
    fn duplicate_rows_count_once() {
        let data = sample();
        let mut members: Vec<_> = data.iter().collect();
        members.push(&data[0]);
        members.push(&data[0]);
        let result = Aggregator::new("—").group_by(&members, job(), Ordering::ByCount);
        assert_eq!(result.row("Production").unwrap().count, 3);
        assert_eq!(result.total, 6);
    }

    #[test]
    fn template_emits_zero_rows_in_reference_order() {
        let data = vec![
            associate("W1", "Warehouse", "Putaway", None),
            associate("W2", "Warehouse", "Inventory", None),
        ];
        let members: Vec<_> = data.iter().collect();
        let result = Aggregator::new("—").group_by(
            &members,
            job(),
            Ordering::template(["Production", "Warehouse"], Some("Other")),
        );
        assert_eq!(result.counts(), vec![("Production", 0), ("Warehouse", 2)]);
    }

    #[test]
    fn template_leftovers_collapse_into_catch_all() {
        let data = sample();
        let members: Vec<_> = data.iter().collect();
        let result = Aggregator::new("—").group_by(
            &members,
            job(),
            Ordering::template(["Warehouse"], Some("Other")),
        );
        assert_eq!(result.counts(), vec![("Warehouse", 1), ("Other", 5)]);

        let uncollapsed = Aggregator::new("—").group_by(
            &members,
            job(),
            Ordering::template(["Warehouse"], None),
        );
        assert_eq!(
            uncollapsed.counts(),
            vec![("Warehouse", 1), ("Production", 3), ("Shipping", 2)]
        );
    }

    #[test]
    fn sibling_labels_work_as_template() {
        let data = sample();
        let members: Vec<_> = data.iter().collect();
        let aggregator = Aggregator::new("—");
        let all = aggregator.group_by(&members, job(), Ordering::ByCount);

        let shipping_only: Vec<_> = members
            .iter()
            .copied()
            .filter(|a| a.snapshot.job_department.as_deref() == Some("Shipping"))
            .collect();
        let sibling = aggregator.group_by(
            &shipping_only,
            job(),
            Ordering::template(all.labels(), Some("Other")),
        );
        assert_eq!(
            sibling.counts(),
            vec![("Production", 0), ("Shipping", 2), ("Warehouse", 0)]
        );
    }

    #[test]
    fn nested_rollup_down_to_line() {
        let data = sample();
        let members: Vec<_> = data.iter().collect();
        let levels = vec![
            RollupLevel::new(GroupField::Level("work_department_group".to_string())),
            RollupLevel::new(GroupField::Level("sub_department".to_string())),
            RollupLevel::new(GroupField::Field(EventField::Line)),
        ];
        let result = Aggregator::new("—").rollup(&members, &levels).unwrap();
        assert_eq!(
            result.counts(),
            vec![("Production", 3), ("Shipping", 2), ("Warehouse", 1)]
        );

        let shipping = result.row("Shipping").unwrap().children.as_ref().unwrap();
        assert_eq!(shipping.counts(), vec![("Loading", 2)]);
        let lines = shipping.rows[0].children.as_ref().unwrap();
        assert_eq!(lines.counts(), vec![("L3", 1), ("L4", 1)]);
        assert!(lines.rows.iter().all(|row| row.children.is_none()));

        let warehouse = result.row("Warehouse").unwrap().children.as_ref().unwrap();
        let missing_line = warehouse.rows[0].children.as_ref().unwrap();
        assert_eq!(missing_line.counts(), vec![("—", 1)]);
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let result = Aggregator::new("—").group_by(&[], job(), Ordering::ByCount);
        assert!(result.is_empty());
        assert_eq!(result.total, 0);
        assert!(Aggregator::new("—").rollup(&[], &[]).is_none());
    }
}

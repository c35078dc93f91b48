use std::collections::BTreeMap;

use crate::models::RawEvent;

/// Latest event per associate, ordered by associate id.
///
/// The event with the greatest timestamp wins. Absent timestamps sort before any
/// present one, so they are only chosen when an associate has nothing else.
/// Equal timestamps keep the earliest event in input order.
pub fn latest_per_associate(events: &[RawEvent]) -> Vec<RawEvent> {
    let mut latest: BTreeMap<&str, &RawEvent> = BTreeMap::new();

    for event in events {
        latest
            .entry(event.associate_id.as_str())
            .and_modify(|current| {
                if event.timestamp > current.timestamp {
                    *current = event;
                }
            })
            .or_insert(event);
    }

    latest.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn event(id: &str, department: &str, minutes_ago: Option<i64>) -> RawEvent {
        let base = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        RawEvent {
            work_department: Some(department.to_string()),
            timestamp: minutes_ago.map(|m| base - Duration::minutes(m)),
            ..RawEvent::new(id, "Badgr")
        }
    }

    #[test]
    fn keeps_most_recent_event() {
        let events = vec![
            event("A100", "Kitting", Some(30)),
            event("A100", "Assembly", Some(2)),
            event("A100", "Prep", Some(10)),
        ];
        let latest = latest_per_associate(&events);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].work_department.as_deref(), Some("Assembly"));
    }

    #[test]
    fn missing_timestamp_never_beats_a_present_one() {
        let events = vec![event("A100", "Unknown", None), event("A100", "Kitting", Some(90))];
        let latest = latest_per_associate(&events);
        assert_eq!(latest[0].work_department.as_deref(), Some("Kitting"));

        let only_missing = vec![event("A101", "Loading", None), event("A101", "Putaway", None)];
        let latest = latest_per_associate(&only_missing);
        assert_eq!(latest[0].work_department.as_deref(), Some("Loading"));
    }

    #[test]
    fn ties_keep_first_in_input_order() {
        let events = vec![event("A102", "Inventory", Some(5)), event("A102", "Putaway", Some(5))];
        let latest = latest_per_associate(&events);
        assert_eq!(latest[0].work_department.as_deref(), Some("Inventory"));
    }

    #[test]
    fn one_snapshot_per_associate_sorted_by_id() {
        let events = vec![
            event("B200", "Loading", Some(1)),
            event("A100", "Kitting", Some(3)),
            event("B200", "Loading", Some(4)),
        ];
        let ids: Vec<_> = latest_per_associate(&events)
            .into_iter()
            .map(|e| e.associate_id)
            .collect();
        assert_eq!(ids, vec!["A100", "B200"]);
        assert!(latest_per_associate(&[]).is_empty());
    }
}

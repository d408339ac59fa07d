//! Overflow reallocation of overloaded days.
//!
//! Single pass in date order over the days present when it starts. Late
//! visits are cut from the tail of an overloaded day and appended to the
//! first later day with room, or to new business days after the last one.
//! Visits with no business day left in the calendar stay on their day.

use tracing::{debug, info, warn};

use super::calendar::next_business_day;
use super::timeline::{plan_day_with_origins, refresh_day};
use super::PlannerParams;
use crate::types::{DayPlan, PlannedStop};

/// Repair overloaded days in place. Returns how many visits were moved.
///
/// Days created here only get their timeline computed; they are never
/// themselves repaired.
pub fn reallocate_overflow(days: &mut Vec<DayPlan>, params: &PlannerParams) -> usize {
    days.sort_by_key(|d| d.date);

    let late_offset = params.late_arrival_offset_minutes();
    let existing = days.len();
    let mut moved_total = 0;

    for idx in 0..existing {
        if !days[idx].overloaded {
            continue;
        }

        let len = days[idx].len();
        let late = days[idx]
            .stops
            .iter()
            .filter(|s| s.arrival_offset_minutes >= late_offset)
            .count();
        let movable = late.min(len.saturating_sub(params.min_retained_visits));
        if movable == 0 {
            debug!(
                "Day {} is overloaded but keeps all {} visits",
                days[idx].date, len
            );
            continue;
        }

        let source_date = days[idx].date;
        let moved: Vec<PlannedStop> = days[idx].stops.split_off(len - movable);
        refresh_day(&mut days[idx], params);

        let mut touched = Vec::new();
        let mut created = Vec::new();
        let mut kept = Vec::new();

        for stop in moved {
            let origin = stop.original_date.or(Some(source_date));
            let target = (idx + 1..days.len()).find(|&i| days[i].len() < params.max_visits_per_day);

            match target {
                Some(target) => {
                    days[target].stops.push(PlannedStop {
                        original_date: origin,
                        ..stop
                    });
                    if !touched.contains(&target) {
                        touched.push(target);
                    }
                }
                None => {
                    let last = days.last().map_or(source_date, |d| d.date);
                    match next_business_day(last) {
                        Some(date) => {
                            days.push(plan_day_with_origins(date, vec![(stop.obligation, origin)], params));
                            created.push(date);
                        }
                        None => kept.push(stop),
                    }
                }
            }
        }

        for target in touched {
            refresh_day(&mut days[target], params);
        }

        let moved = movable - kept.len();
        if !kept.is_empty() {
            warn!("No business day left after {}, keeping {} visits", source_date, kept.len());
            days[idx].stops.extend(kept);
            refresh_day(&mut days[idx], params);
        }
        moved_total += moved;

        info!(
            "Moved {} late visits off {} ({} new days: {:?})",
            moved, source_date, created.len(), created
        );
    }

    for day in days.iter_mut().skip(existing) {
        refresh_day(day, params);
    }

    moved_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::planning::plan_day;
    use crate::types::{Segment, VisitObligation};
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn obligation(n: u128) -> VisitObligation {
        VisitObligation {
            id: Uuid::from_u128(n),
            name: format!("Client {}", n),
            coordinates: None,
            commune: None,
            segment: Segment::Loyal,
            frequency_days: 30,
            consecutive_no_sale: 0,
            last_visit_at: None,
            has_competitor: false,
        }
    }

    fn day(date: NaiveDate, ids: std::ops::RangeInclusive<u128>) -> DayPlan {
        plan_day(date, ids.map(obligation).collect(), &PlannerParams::default())
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[test]
    fn test_late_tail_moves_to_next_business_day() {
        // Friday with 10 unlocated visits, the 10th arrives at 20:15
        let mut days = vec![day(d(3, 6), 1..=10)];
        assert!(days[0].overloaded);

        let moved = reallocate_overflow(&mut days, &PlannerParams::default());

        // Arrivals from 17:00 on are the 8th (17:45), 9th and 10th
        assert_eq!(moved, 3);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].len(), 7);
        assert!(!days[0].overloaded);
        assert_eq!(days[1].date, d(3, 9));
        assert_eq!(
            days[1].client_ids(),
            vec![Uuid::from_u128(8), Uuid::from_u128(9), Uuid::from_u128(10)]
        );
        assert_eq!(days[1].stops[0].original_date, Some(d(3, 6)));
        assert_eq!(days[1].stops[0].estimated_arrival.to_string(), "09:00:00");
    }

    #[test]
    fn test_moves_to_first_later_day_with_room() {
        let mut days = vec![day(d(3, 2), 1..=10), day(d(3, 3), 100..=114), day(d(3, 4), 200..=201)];

        reallocate_overflow(&mut days, &PlannerParams::default());

        assert_eq!(days.len(), 3);
        assert_eq!(days[1].len(), 15);
        assert_eq!(days[2].len(), 5);
        assert_eq!(days[2].stops[2].obligation.id, Uuid::from_u128(8));
        assert_eq!(days[2].stops[2].estimated_arrival.to_string(), "11:30:00");
    }

    #[test]
    fn test_floor_of_retained_visits() {
        // Long visits make everything after the 3rd arrival late
        let params = PlannerParams {
            visit_duration_minutes: 200.0,
            ..PlannerParams::default()
        };
        let mut days = vec![plan_day(d(3, 2), (1..=7).map(obligation).collect(), &params)];

        reallocate_overflow(&mut days, &params);

        assert_eq!(days[0].len(), 5);
        assert!(days[0].overloaded);
        assert_eq!(days[1].len(), 2);
    }

    #[test]
    fn test_new_days_respect_capacity() {
        let params = PlannerParams {
            max_visits_per_day: 2,
            ..PlannerParams::default()
        };
        let mut days = vec![plan_day(d(3, 6), (1..=10).map(obligation).collect(), &params)];

        reallocate_overflow(&mut days, &params);

        assert_eq!(days.len(), 3);
        assert_eq!(days[1].date, d(3, 9));
        assert_eq!(days[1].client_ids(), vec![Uuid::from_u128(8), Uuid::from_u128(9)]);
        assert_eq!(days[2].date, d(3, 10));
        assert_eq!(days[2].client_ids(), vec![Uuid::from_u128(10)]);
        assert_eq!(days[2].stops[0].original_date, Some(d(3, 6)));
    }

    #[test]
    fn test_healthy_days_untouched() {
        let mut days = vec![day(d(3, 2), 1..=5)];
        let before = days.clone();

        assert_eq!(reallocate_overflow(&mut days, &PlannerParams::default()), 0);
        assert_eq!(days, before);
    }

    #[test]
    fn test_overflow_at_calendar_end_keeps_visits() {
        // Last representable day, nothing after it to move to
        let last = NaiveDate::MAX;
        let mut days = vec![plan_day(last, (1..=10).map(obligation).collect(), &PlannerParams::default())];

        let moved = reallocate_overflow(&mut days, &PlannerParams::default());

        assert_eq!(moved, 0);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].len(), 10);
        assert!(days[0].overloaded);
    }

    proptest! {
        #[test]
        fn prop_repaired_days_keep_floor_or_are_fine(
            loads in proptest::collection::vec(0usize..20, 1..6)
        ) {
            let params = PlannerParams::default();
            let mut next_id = 1u128;
            let mut days: Vec<DayPlan> = loads
                .iter()
                .enumerate()
                .map(|(i, &n)| {
                    let ids: Vec<VisitObligation> = (0..n).map(|k| obligation(next_id + k as u128)).collect();
                    next_id += n as u128;
                    plan_day(d(3, 2) + chrono::Duration::days(i as i64), ids, &params)
                })
                .collect();
            let total: usize = loads.iter().sum();

            reallocate_overflow(&mut days, &params);

            prop_assert_eq!(days.iter().map(|d| d.len()).sum::<usize>(), total);
            for day in days.iter().take(loads.len()) {
                prop_assert!(!day.overloaded || day.len() >= params.min_retained_visits);
            }
        }
    }
}

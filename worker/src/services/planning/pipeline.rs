//! Whole-range planning: clusters -> days -> ordered timelines -> overflow

use chrono::NaiveDate;
use tracing::debug;

use super::{allocate_clusters, build_clusters, plan_day, reallocate_overflow, sequence, PlannerParams};
use crate::types::{DayPlan, VisitObligation};

/// Plan `obligations` over `days`.
///
/// Returns only days with at least one visit, in date order. Overflow may
/// add business days after the last requested one.
pub fn plan_schedule(
    obligations: &[VisitObligation],
    days: &[NaiveDate],
    params: &PlannerParams,
) -> Vec<DayPlan> {
    let clusters = build_clusters(obligations, params);
    let buckets = allocate_clusters(clusters, days, params);

    let mut plans: Vec<DayPlan> = buckets
        .into_iter()
        .map(|bucket| sequence_day(bucket.date, bucket.obligations, params))
        .collect();

    let moved = reallocate_overflow(&mut plans, params);
    plans.retain(|day| !day.is_empty());

    debug!(
        "Planned {} obligations over {} days ({} moved by overflow)",
        obligations.len(),
        plans.len(),
        moved
    );

    plans
}

/// Order one day's visits and compute its timeline
pub fn sequence_day(date: NaiveDate, obligations: Vec<VisitObligation>, params: &PlannerParams) -> DayPlan {
    let points: Vec<_> = obligations.iter().map(|o| o.coordinates).collect();
    let result = sequence(&points, None, false, params);

    let mut slots: Vec<Option<VisitObligation>> = obligations.into_iter().map(Some).collect();
    let ordered: Vec<VisitObligation> = result
        .order
        .iter()
        .filter_map(|&idx| slots.get_mut(idx).and_then(Option::take))
        .collect();

    plan_day(date, ordered, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geo::haversine_distance;
    use crate::types::{Coordinates, Segment};
    use uuid::Uuid;

    fn obligation(n: u128, segment: Segment, coords: Option<(f64, f64)>) -> VisitObligation {
        VisitObligation {
            id: Uuid::from_u128(n),
            name: format!("Client {}", n),
            coordinates: coords.map(|(lat, lng)| Coordinates { lat, lng }),
            commune: Some("Ñuñoa".to_string()),
            segment,
            frequency_days: 15,
            consecutive_no_sale: 0,
            last_visit_at: None,
            has_competitor: false,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    #[test]
    fn test_twelve_key_accounts_over_two_days() {
        let obligations: Vec<VisitObligation> = (0..12)
            .map(|i| {
                let lat = -33.45 + (i % 4) as f64 * 0.005;
                let lng = -70.60 + (i / 4) as f64 * 0.005;
                obligation(i as u128 + 1, Segment::KeyAccount, Some((lat, lng)))
            })
            .collect();

        let plans = plan_schedule(&obligations, &[d(2), d(3)], &PlannerParams::default());

        assert_eq!(plans.iter().map(|p| p.len()).collect::<Vec<_>>(), vec![9, 3]);
        assert_eq!(plans[0].date, d(2));
        assert_eq!(plans[1].date, d(3));
        assert!(plans.iter().all(|p| !p.overloaded));
    }

    #[test]
    fn test_unlocated_clients_on_one_day() {
        let obligations: Vec<VisitObligation> =
            (1..=3).map(|n| obligation(n, Segment::New, None)).collect();

        let plans = plan_schedule(&obligations, &[d(2)], &PlannerParams::default());

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].len(), 3);
        assert_eq!(plans[0].total_distance_km, 0.0);
        assert!(!plans[0].overloaded);
    }

    #[test]
    fn test_each_obligation_planned_once() {
        let obligations: Vec<VisitObligation> = (0..40)
            .map(|i| {
                let coords = if i % 7 == 0 {
                    None
                } else {
                    Some((-33.3 - (i % 5) as f64 * 0.03, -70.5 - (i / 5) as f64 * 0.03))
                };
                obligation(i as u128 + 1, Segment::Loyal, coords)
            })
            .collect();

        let plans = plan_schedule(&obligations, &[d(2), d(3), d(4)], &PlannerParams::default());

        let mut ids: Vec<Uuid> = plans.iter().flat_map(|p| p.client_ids()).collect();
        ids.sort();
        let mut expected: Vec<Uuid> = obligations.iter().map(|o| o.id).collect();
        expected.sort();
        assert_eq!(ids, expected);

        for plan in &plans {
            let legs: f64 = plan
                .stops
                .windows(2)
                .map(|w| match (w[0].obligation.coordinates, w[1].obligation.coordinates) {
                    (Some(a), Some(b)) => haversine_distance(&a, &b),
                    _ => 0.0,
                })
                .sum();
            assert!((plan.total_distance_km - legs).abs() < 1e-9);
            assert!(!plan.overloaded || plan.len() >= 5);
        }
    }

    #[test]
    fn test_same_input_same_plan() {
        let obligations: Vec<VisitObligation> = (0..25)
            .map(|i| {
                obligation(
                    i as u128 + 1,
                    if i % 3 == 0 { Segment::KeyAccount } else { Segment::New },
                    Some((-33.40 - (i % 6) as f64 * 0.02, -70.55 - (i / 6) as f64 * 0.02)),
                )
            })
            .collect();
        let days = [d(2), d(3), d(4)];

        let first = plan_schedule(&obligations, &days, &PlannerParams::default());
        let second = plan_schedule(&obligations, &days, &PlannerParams::default());

        assert_eq!(first, second);
    }
}

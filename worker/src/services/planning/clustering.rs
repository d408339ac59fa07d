//! Proximity clustering of visit obligations into day-sized groups.
//!
//! Clusters are seeded from key accounts first, then (by default) from the
//! obligation lying farthest from every existing centroid, and grown by
//! adding the unassigned obligation nearest to the current centroid while
//! the cluster is under the size cap and its estimated workday fits.

use tracing::debug;

use super::sequencer::{nearest_neighbor_order, tour_length};
use super::{PlannerParams, SeedStrategy};
use crate::services::geo::{centroid, haversine_distance, travel_time_minutes};
use crate::types::{Coordinates, Segment, VisitObligation};

/// Group obligations into clusters of 1..=`max_cluster_size` members
pub fn build_clusters(
    obligations: &[VisitObligation],
    params: &PlannerParams,
) -> Vec<Vec<VisitObligation>> {
    let mut sorted: Vec<&VisitObligation> = obligations.iter().collect();
    sorted.sort_by_key(|o| o.segment.priority());

    let (located, unlocated): (Vec<&VisitObligation>, Vec<&VisitObligation>) =
        sorted.into_iter().partition(|o| o.is_located());
    let coords: Vec<Coordinates> = located.iter().filter_map(|o| o.coordinates).collect();

    let cap = params.max_cluster_size.max(1);
    let budget = params.workday_budget_minutes();
    let mut assigned = vec![false; located.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    while let Some(seed) = pick_seed(&located, &coords, &assigned, &clusters, params.seed_strategy) {
        assigned[seed] = true;
        let mut members = vec![seed];

        while members.len() < cap && estimated_minutes(&coords, &members, params) <= budget {
            let member_coords: Vec<Coordinates> = members.iter().map(|&i| coords[i]).collect();
            let Some(center) = centroid(&member_coords) else {
                break;
            };
            let Some(next) = nearest_unassigned(&coords, &assigned, &center) else {
                break;
            };
            assigned[next] = true;
            members.push(next);
        }

        debug!(
            "Cluster {} seeded by {} with {} members (~{:.0} min)",
            clusters.len() + 1,
            located[seed].id,
            members.len(),
            estimated_minutes(&coords, &members, params)
        );
        clusters.push(members);
    }

    let mut result: Vec<Vec<VisitObligation>> = clusters
        .into_iter()
        .map(|members| members.into_iter().map(|i| located[i].clone()).collect())
        .collect();

    // Unlocated obligations carry no geometry; they only fill spare room
    for obligation in unlocated {
        let smallest = result
            .iter_mut()
            .filter(|c| c.len() < cap)
            .min_by_key(|c| c.len());
        match smallest {
            Some(cluster) => cluster.push(obligation.clone()),
            None => result.push(vec![obligation.clone()]),
        }
    }

    debug!(
        "Built {} clusters from {} obligations",
        result.len(),
        obligations.len()
    );

    result
}

/// Travel over the cluster's nearest-neighbor tour plus a fixed visit
/// duration per member, in minutes
pub fn estimated_minutes(coords: &[Coordinates], members: &[usize], params: &PlannerParams) -> f64 {
    let points: Vec<Coordinates> = members.iter().map(|&i| coords[i]).collect();
    let order = nearest_neighbor_order(&points, None);
    let travel_km = tour_length(&points, &order, None, false);
    travel_time_minutes(travel_km, params.average_speed_kmh)
        + params.visit_duration_minutes * members.len() as f64
}

fn pick_seed(
    located: &[&VisitObligation],
    coords: &[Coordinates],
    assigned: &[bool],
    clusters: &[Vec<usize>],
    strategy: SeedStrategy,
) -> Option<usize> {
    let key_account = (0..located.len())
        .find(|&i| !assigned[i] && located[i].segment == Segment::KeyAccount);
    if key_account.is_some() {
        return key_account;
    }

    let first_free = (0..located.len()).find(|&i| !assigned[i]);
    if strategy == SeedStrategy::PriorityOrder || clusters.is_empty() {
        return first_free;
    }

    let centroids: Vec<Coordinates> = clusters
        .iter()
        .filter_map(|members| {
            let points: Vec<Coordinates> = members.iter().map(|&i| coords[i]).collect();
            centroid(&points)
        })
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for i in (0..located.len()).filter(|&i| !assigned[i]) {
        let nearest_centroid = centroids
            .iter()
            .map(|c| haversine_distance(c, &coords[i]))
            .fold(f64::INFINITY, f64::min);
        if best.map_or(true, |(_, d)| nearest_centroid > d) {
            best = Some((i, nearest_centroid));
        }
    }

    best.map(|(i, _)| i).or(first_free)
}

fn nearest_unassigned(coords: &[Coordinates], assigned: &[bool], center: &Coordinates) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, point) in coords.iter().enumerate() {
        if assigned[i] {
            continue;
        }
        let dist = haversine_distance(center, point);
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((i, dist));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn obligation(n: u128, segment: Segment, coords: Option<(f64, f64)>) -> VisitObligation {
        VisitObligation {
            id: Uuid::from_u128(n),
            name: format!("Client {}", n),
            coordinates: coords.map(|(lat, lng)| Coordinates { lat, lng }),
            commune: Some("Providencia".to_string()),
            segment,
            frequency_days: 30,
            consecutive_no_sale: 0,
            last_visit_at: None,
            has_competitor: false,
        }
    }

    fn sizes(clusters: &[Vec<VisitObligation>]) -> Vec<usize> {
        clusters.iter().map(|c| c.len()).collect()
    }

    #[test]
    fn test_twelve_close_key_accounts_split_nine_and_three() {
        let obligations: Vec<VisitObligation> = (0..12)
            .map(|i| {
                let lat = -33.42 + (i % 4) as f64 * 0.004;
                let lng = -70.60 + (i / 4) as f64 * 0.004;
                obligation(i as u128 + 1, Segment::KeyAccount, Some((lat, lng)))
            })
            .collect();

        let clusters = build_clusters(&obligations, &PlannerParams::default());

        assert_eq!(sizes(&clusters), vec![9, 3]);
    }

    #[test]
    fn test_budget_stops_growth() {
        // Co-located, so only visit time counts: 5 * 100 <= 540 < 6 * 100
        let obligations: Vec<VisitObligation> = (0..12)
            .map(|i| obligation(i + 1, Segment::Loyal, Some((-33.42, -70.60))))
            .collect();
        let params = PlannerParams {
            visit_duration_minutes: 100.0,
            ..PlannerParams::default()
        };

        let clusters = build_clusters(&obligations, &params);

        assert_eq!(sizes(&clusters), vec![6, 6]);
    }

    #[test]
    fn test_key_account_seeds_first_cluster() {
        let obligations = vec![
            obligation(1, Segment::New, Some((-33.40, -70.60))),
            obligation(2, Segment::KeyAccount, Some((-33.60, -70.80))),
        ];
        let params = PlannerParams {
            max_cluster_size: 1,
            ..PlannerParams::default()
        };

        let clusters = build_clusters(&obligations, &params);

        assert_eq!(clusters[0][0].id, Uuid::from_u128(2));
        assert_eq!(clusters[1][0].id, Uuid::from_u128(1));
    }

    #[test]
    fn test_seed_strategies() {
        // Groups A and B are close together, C is about 111 km away
        let mut obligations = Vec::new();
        for k in 0..3u128 {
            obligations.push(obligation(10 + k, Segment::New, Some((0.0, 0.0001 * k as f64))));
            obligations.push(obligation(20 + k, Segment::New, Some((0.0, 0.05 + 0.0001 * k as f64))));
        }
        for k in 0..3u128 {
            obligations.push(obligation(30 + k, Segment::New, Some((0.0, 1.0 - 0.0001 * k as f64))));
        }
        let farthest = PlannerParams {
            max_cluster_size: 3,
            ..PlannerParams::default()
        };
        let in_order = PlannerParams {
            seed_strategy: SeedStrategy::PriorityOrder,
            ..farthest.clone()
        };

        let spread = build_clusters(&obligations, &farthest);
        let ordered = build_clusters(&obligations, &in_order);

        assert_eq!(spread[0][0].id, Uuid::from_u128(10));
        assert_eq!(spread[1][0].id, Uuid::from_u128(30));
        assert_eq!(ordered[1][0].id, Uuid::from_u128(20));
    }

    #[test]
    fn test_unlocated_fill_smallest_cluster() {
        let mut obligations: Vec<VisitObligation> = (0..3)
            .map(|i| obligation(i + 1, Segment::KeyAccount, Some((-33.42, -70.60))))
            .collect();
        obligations.push(obligation(98, Segment::New, None));
        obligations.push(obligation(99, Segment::New, None));
        let params = PlannerParams {
            max_cluster_size: 2,
            ..PlannerParams::default()
        };

        let clusters = build_clusters(&obligations, &params);

        assert_eq!(sizes(&clusters), vec![2, 2, 1]);
        assert_eq!(clusters[1][1].id, Uuid::from_u128(98));
        assert_eq!(clusters[2][0].id, Uuid::from_u128(99));
    }

    #[test]
    fn test_only_unlocated_become_one_cluster() {
        let obligations: Vec<VisitObligation> =
            (0..3).map(|i| obligation(i + 1, Segment::New, None)).collect();

        let clusters = build_clusters(&obligations, &PlannerParams::default());

        assert_eq!(sizes(&clusters), vec![3]);
    }

    #[test]
    fn test_unlocated_overflow_into_singletons() {
        let obligations: Vec<VisitObligation> =
            (0..3).map(|i| obligation(i + 1, Segment::New, None)).collect();
        let params = PlannerParams {
            max_cluster_size: 1,
            ..PlannerParams::default()
        };

        let clusters = build_clusters(&obligations, &params);

        assert_eq!(sizes(&clusters), vec![1, 1, 1]);
    }

    proptest! {
        #[test]
        fn prop_clusters_respect_cap_and_cover_everything(
            raw in proptest::collection::vec(
                (proptest::option::weighted(0.85, (-33.7f64..-33.2, -70.9f64..-70.4)), 0u8..3),
                0..60
            )
        ) {
            let obligations: Vec<VisitObligation> = raw
                .iter()
                .enumerate()
                .map(|(i, (coords, tier))| {
                    let segment = match tier {
                        0 => Segment::KeyAccount,
                        1 => Segment::Loyal,
                        _ => Segment::New,
                    };
                    obligation(i as u128 + 1, segment, *coords)
                })
                .collect();
            let params = PlannerParams::default();

            let clusters = build_clusters(&obligations, &params);

            let mut ids: Vec<Uuid> = clusters.iter().flatten().map(|o| o.id).collect();
            for cluster in &clusters {
                prop_assert!(!cluster.is_empty());
                prop_assert!(cluster.len() <= params.max_cluster_size);
            }
            ids.sort();
            let mut expected: Vec<Uuid> = obligations.iter().map(|o| o.id).collect();
            expected.sort();
            prop_assert_eq!(ids, expected);
        }
    }
}

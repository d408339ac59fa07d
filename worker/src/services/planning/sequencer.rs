//! Visit sequencing: nearest-neighbor construction followed by 2-opt.
//!
//! Works on an optional fixed start point (not itself a visit) and an
//! optional return leg to it. Visits without coordinates cannot be placed
//! geometrically; they are appended after the located ones in input order.

use tracing::debug;

use super::PlannerParams;
use crate::services::geo::haversine_distance;
use crate::types::Coordinates;

/// Result of sequencing a set of points
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceResult {
    /// Indices into the input slice; located points first
    pub order: Vec<usize>,
    /// Path length after 2-opt, including the return leg when requested
    pub total_distance_km: f64,
    /// Path length of the nearest-neighbor tour before improvement
    pub nearest_neighbor_distance_km: f64,
    /// Number of 2-opt passes performed
    pub passes: usize,
}

/// Order `points` into a short path.
///
/// `start` is a fixed origin that is not part of the output. The return leg
/// is only added when both `start` and `return_to_start` are given.
pub fn sequence(
    points: &[Option<Coordinates>],
    start: Option<&Coordinates>,
    return_to_start: bool,
    params: &PlannerParams,
) -> SequenceResult {
    let located: Vec<(usize, Coordinates)> = points
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| p.map(|c| (idx, c)))
        .collect();
    let coords: Vec<Coordinates> = located.iter().map(|(_, c)| *c).collect();
    let closed = return_to_start && start.is_some();

    let initial = nearest_neighbor_order(&coords, start);
    let nearest_neighbor_distance_km = tour_length(&coords, &initial, start, closed);

    let (improved, passes) = two_opt(
        &coords,
        initial,
        start,
        closed,
        params.two_opt_max_passes,
        params.two_opt_tolerance_km,
    );
    let total_distance_km = tour_length(&coords, &improved, start, closed);

    let mut order: Vec<usize> = improved.into_iter().map(|i| located[i].0).collect();
    order.extend(
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(idx, _)| idx),
    );

    debug!(
        "Sequenced {} points ({} located): nn {:.3} km -> 2-opt {:.3} km in {} passes",
        points.len(),
        coords.len(),
        nearest_neighbor_distance_km,
        total_distance_km,
        passes
    );

    SequenceResult {
        order,
        total_distance_km,
        nearest_neighbor_distance_km,
        passes,
    }
}

/// Greedy tour: always advance to the closest unvisited point.
///
/// Without a start point the first input point opens the tour. Ties keep
/// input order.
pub fn nearest_neighbor_order(points: &[Coordinates], start: Option<&Coordinates>) -> Vec<usize> {
    let n = points.len();
    let mut order = Vec::with_capacity(n);
    if n == 0 {
        return order;
    }

    let mut visited = vec![false; n];
    let mut current = match start {
        Some(s) => *s,
        None => {
            visited[0] = true;
            order.push(0);
            points[0]
        }
    };

    while order.len() < n {
        let mut best: Option<(usize, f64)> = None;

        for (i, point) in points.iter().enumerate() {
            if visited[i] {
                continue;
            }
            let dist = haversine_distance(&current, point);
            if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                best = Some((i, dist));
            }
        }

        match best {
            Some((next, _)) => {
                visited[next] = true;
                order.push(next);
                current = points[next];
            }
            None => break,
        }
    }

    order
}

/// Length of the path `start -> order... (-> start when closed)`
pub fn tour_length(
    points: &[Coordinates],
    order: &[usize],
    start: Option<&Coordinates>,
    closed: bool,
) -> f64 {
    let mut total = 0.0;
    let mut prev = start.copied();

    for &idx in order {
        if let Some(p) = prev {
            total += haversine_distance(&p, &points[idx]);
        }
        prev = Some(points[idx]);
    }

    if closed {
        if let (Some(s), Some(&last)) = (start, order.last()) {
            total += haversine_distance(&points[last], s);
        }
    }

    total
}

/// 2-opt local search improvement.
///
/// Reverses `order[i..=j]` whenever that shortens the path by more than
/// `tolerance_km`. Stops after a pass without improvement or after
/// `max_passes` passes.
fn two_opt(
    points: &[Coordinates],
    mut order: Vec<usize>,
    start: Option<&Coordinates>,
    closed: bool,
    max_passes: usize,
    tolerance_km: f64,
) -> (Vec<usize>, usize) {
    let n = order.len();
    if n < 2 {
        return (order, 0);
    }

    let mut passes = 0;
    let mut improved = true;

    while improved && passes < max_passes {
        improved = false;
        passes += 1;

        for i in 0..n - 1 {
            for j in i + 1..n {
                let delta = reversal_delta(points, &order, start, closed, i, j);
                if delta < -tolerance_km {
                    order[i..=j].reverse();
                    improved = true;
                }
            }
        }
    }

    (order, passes)
}

/// Change in path length from reversing `order[i..=j]`.
///
/// Only the edge entering position `i` and the edge leaving position `j`
/// change; a missing neighbour (open path end) contributes nothing.
fn reversal_delta(
    points: &[Coordinates],
    order: &[usize],
    start: Option<&Coordinates>,
    closed: bool,
    i: usize,
    j: usize,
) -> f64 {
    let n = order.len();
    let before = if i == 0 { start.copied() } else { Some(points[order[i - 1]]) };
    let after = if j + 1 < n {
        Some(points[order[j + 1]])
    } else if closed {
        start.copied()
    } else {
        None
    };

    let first = points[order[i]];
    let last = points[order[j]];
    let edge = |a: Option<Coordinates>, b: &Coordinates| a.map_or(0.0, |a| haversine_distance(&a, b));

    let old_cost = edge(before, &first) + edge(after, &last);
    let new_cost = edge(before, &last) + edge(after, &first);

    new_cost - old_cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(lat: f64, lng: f64) -> Option<Coordinates> {
        Some(Coordinates { lat, lng })
    }

    #[test]
    fn test_empty_input() {
        let result = sequence(&[], None, false, &PlannerParams::default());
        assert!(result.order.is_empty());
        assert_eq!(result.total_distance_km, 0.0);
    }

    #[test]
    fn test_single_point() {
        let result = sequence(&[at(-33.4, -70.6)], None, false, &PlannerParams::default());
        assert_eq!(result.order, vec![0]);
        assert_eq!(result.total_distance_km, 0.0);
    }

    #[test]
    fn test_two_opt_fixes_greedy_detour() {
        // Greedy from A goes to B first and then doubles back past A to C
        let points = vec![at(0.0, 0.0), at(0.0, 0.01), at(0.0, -0.015)];

        let result = sequence(&points, None, false, &PlannerParams::default());

        assert_eq!(result.order, vec![1, 0, 2]);
        assert!(result.total_distance_km < result.nearest_neighbor_distance_km);
        let expected = haversine_distance(
            &Coordinates { lat: 0.0, lng: 0.01 },
            &Coordinates { lat: 0.0, lng: -0.015 },
        );
        assert!((result.total_distance_km - expected).abs() < 1e-9);
    }

    #[test]
    fn test_without_passes_keeps_nearest_neighbor_tour() {
        let points = vec![at(0.0, 0.0), at(0.0, 0.01), at(0.0, -0.015)];
        let params = PlannerParams {
            two_opt_max_passes: 0,
            ..PlannerParams::default()
        };

        let result = sequence(&points, None, false, &params);

        assert_eq!(result.order, vec![0, 1, 2]);
        assert_eq!(result.passes, 0);
        assert_eq!(result.total_distance_km, result.nearest_neighbor_distance_km);
    }

    #[test]
    fn test_unlocated_points_appended_in_input_order() {
        let points = vec![None, at(-33.40, -70.60), None, at(-33.41, -70.61)];

        let result = sequence(&points, None, false, &PlannerParams::default());

        assert_eq!(result.order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_ties_follow_input_order() {
        let start = Coordinates { lat: 0.0, lng: 0.0 };
        // Both points are exactly 0.01 degrees of longitude away from start
        let points = vec![at(0.0, 0.01), at(0.0, -0.01)];
        let params = PlannerParams {
            two_opt_max_passes: 0,
            ..PlannerParams::default()
        };

        let result = sequence(&points, Some(&start), false, &params);

        assert_eq!(result.order, vec![0, 1]);
    }

    #[test]
    fn test_start_point_with_return_leg() {
        let start = Coordinates { lat: -33.40, lng: -70.60 };
        let points = vec![at(-33.41, -70.60), at(-33.42, -70.60)];

        let open = sequence(&points, Some(&start), false, &PlannerParams::default());
        let closed = sequence(&points, Some(&start), true, &PlannerParams::default());

        assert_eq!(open.order, vec![0, 1]);
        let back = haversine_distance(&Coordinates { lat: -33.42, lng: -70.60 }, &start);
        assert!((closed.total_distance_km - open.total_distance_km - back).abs() < 1e-9);
    }

    #[test]
    fn test_return_ignored_without_start() {
        let points = vec![at(-33.41, -70.60), at(-33.42, -70.60)];
        let open = sequence(&points, None, false, &PlannerParams::default());
        let closed = sequence(&points, None, true, &PlannerParams::default());
        assert_eq!(open.total_distance_km, closed.total_distance_km);
    }

    proptest! {
        #[test]
        fn prop_two_opt_never_worse_than_nearest_neighbor(
            raw in proptest::collection::vec((-33.6f64..-33.3, -70.8f64..-70.5), 0..25),
            with_start in any::<bool>(),
            closed in any::<bool>(),
        ) {
            let points: Vec<Option<Coordinates>> = raw
                .iter()
                .map(|&(lat, lng)| Some(Coordinates { lat, lng }))
                .collect();
            let start = Coordinates { lat: -33.45, lng: -70.65 };
            let start = if with_start { Some(&start) } else { None };

            let result = sequence(&points, start, closed, &PlannerParams::default());

            prop_assert!(result.total_distance_km <= result.nearest_neighbor_distance_km + 1e-9);
            let mut seen = result.order.clone();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..points.len()).collect::<Vec<_>>());
        }
    }
}

//! Bin-packing of clusters into business days

use chrono::NaiveDate;
use tracing::debug;

use super::PlannerParams;
use crate::types::VisitObligation;

/// Obligations assigned to one date, not yet ordered
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub obligations: Vec<VisitObligation>,
}

/// Assign clusters to `days`.
///
/// Clusters are placed whole, largest first, on the day with the most
/// remaining capacity that can take them. A cluster no day can take is split
/// across days in capacity order; what still does not fit goes to the
/// least-loaded day, above capacity. No day outside `days` is created here.
pub fn allocate_clusters(
    mut clusters: Vec<Vec<VisitObligation>>,
    days: &[NaiveDate],
    params: &PlannerParams,
) -> Vec<DayBucket> {
    let mut buckets: Vec<DayBucket> = days
        .iter()
        .map(|&date| DayBucket { date, obligations: Vec::new() })
        .collect();
    if buckets.is_empty() {
        return buckets;
    }

    let cap = params.max_visits_per_day;
    let remaining = |b: &DayBucket| cap.saturating_sub(b.obligations.len());

    // Stable: equal sizes keep creation order
    clusters.sort_by(|a, b| b.len().cmp(&a.len()));

    for cluster in clusters {
        let size = cluster.len();
        let mut best: Option<usize> = None;
        for (idx, bucket) in buckets.iter().enumerate() {
            let room = remaining(bucket);
            if room >= size && best.map_or(true, |b| room > remaining(&buckets[b])) {
                best = Some(idx);
            }
        }

        if let Some(idx) = best {
            buckets[idx].obligations.extend(cluster);
            continue;
        }

        debug!("Splitting cluster of {} visits across days", size);
        let mut by_capacity: Vec<usize> = (0..buckets.len()).collect();
        by_capacity.sort_by(|&a, &b| remaining(&buckets[b]).cmp(&remaining(&buckets[a])));

        let mut rest = cluster.into_iter();
        for idx in by_capacity {
            let room = remaining(&buckets[idx]);
            buckets[idx].obligations.extend(rest.by_ref().take(room));
        }

        for obligation in rest {
            let least_loaded = buckets
                .iter()
                .enumerate()
                .min_by_key(|(_, b)| b.obligations.len())
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            buckets[least_loaded].obligations.push(obligation);
        }
    }

    buckets
}

//! Adaptive revisit interval and run eligibility

use chrono::NaiveDate;

use super::{MultiplierOrder, PlannerParams};
use crate::types::{Segment, VisitObligation};

/// Target number of days between two visits to this client.
///
/// Key accounts start from the shorter key-account interval. A long no-sale
/// streak stretches the interval; an active competitor on a non-new client
/// shortens it. Each multiplier is rounded before the next one applies.
pub fn compute_interval(obligation: &VisitObligation, params: &PlannerParams) -> i32 {
    let mut interval = match obligation.segment {
        Segment::KeyAccount => params.key_account_frequency_days,
        _ => params.base_frequency_days,
    };

    let no_sale = (
        obligation.consecutive_no_sale >= params.no_sale_threshold,
        params.no_sale_multiplier,
    );
    let competitor = (
        obligation.has_competitor && obligation.segment != Segment::New,
        params.competitor_multiplier,
    );
    let steps = match params.multiplier_order {
        MultiplierOrder::NoSaleFirst => [no_sale, competitor],
        MultiplierOrder::CompetitorFirst => [competitor, no_sale],
    };

    for (applies, multiplier) in steps {
        if applies {
            interval = (interval as f64 * multiplier).round() as i32;
        }
    }

    interval.max(1)
}

/// Whether the client is due as of `as_of`.
///
/// Never-visited clients are always due; others once the elapsed days
/// reach the eligibility ratio of `interval`.
pub fn is_eligible(
    obligation: &VisitObligation,
    interval: i32,
    as_of: NaiveDate,
    params: &PlannerParams,
) -> bool {
    match obligation.last_visit_at {
        None => true,
        Some(last) => {
            let elapsed = (as_of - last.date_naive()).num_days();
            elapsed as f64 >= params.eligibility_ratio * interval as f64
        }
    }
}

/// Split obligations into the ones due as of `as_of` and a count of the rest
pub fn filter_eligible(
    obligations: Vec<VisitObligation>,
    as_of: NaiveDate,
    params: &PlannerParams,
) -> (Vec<VisitObligation>, usize) {
    let total = obligations.len();
    let eligible: Vec<VisitObligation> = obligations
        .into_iter()
        .filter(|o| is_eligible(o, compute_interval(o, params), as_of, params))
        .collect();
    let skipped = total - eligible.len();
    (eligible, skipped)
}

//! Day timeline simulation.
//!
//! Walks the visits of a day in order, starting at workday start with no
//! travel before the first visit. Each later visit adds the travel from the
//! previous one (straight-line distance at the average speed, or a fixed
//! default when either end has no coordinates) and the visit itself adds the
//! fixed visit duration.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, Timelike};

use super::PlannerParams;
use crate::services::geo::{haversine_distance, travel_time_minutes};
use crate::types::{DayPlan, PlannedStop, VisitObligation};

/// Plan `obligations` on `date` in the given order
pub fn plan_day(date: NaiveDate, obligations: Vec<VisitObligation>, params: &PlannerParams) -> DayPlan {
    plan_day_with_origins(
        date,
        obligations.into_iter().map(|o| (o, None)).collect(),
        params,
    )
}

/// Like [`plan_day`], keeping the date each visit was first planned for
pub fn plan_day_with_origins(
    date: NaiveDate,
    visits: Vec<(VisitObligation, Option<NaiveDate>)>,
    params: &PlannerParams,
) -> DayPlan {
    let stops = visits
        .into_iter()
        .map(|(obligation, original_date)| PlannedStop {
            obligation,
            estimated_arrival: params.workday_start,
            estimated_departure: params.workday_start,
            distance_from_previous_km: 0.0,
            travel_minutes_from_previous: 0.0,
            arrival_offset_minutes: 0.0,
            original_date,
        })
        .collect();

    let mut day = DayPlan {
        date,
        stops,
        total_distance_km: 0.0,
        total_duration_hours: 0.0,
        end_time: params.workday_start,
        overloaded: false,
        communes: BTreeSet::new(),
        fuel: None,
    };
    refresh_day(&mut day, params);
    day
}

/// Recompute every time and aggregate of `day` from its current stop order.
///
/// The fuel estimate is cleared since the distance may have changed.
pub fn refresh_day(day: &mut DayPlan, params: &PlannerParams) {
    let budget = params.workday_budget_minutes();
    let mut cursor = 0.0;
    let mut total_distance = 0.0;
    let mut overloaded = false;
    let mut communes = BTreeSet::new();

    for idx in 0..day.stops.len() {
        let (distance, travel) = if idx == 0 {
            (0.0, 0.0)
        } else {
            leg(&day.stops[idx - 1].obligation, &day.stops[idx].obligation, params)
        };

        let arrival = cursor + travel;
        let departure = arrival + params.visit_duration_minutes;
        if arrival > budget {
            overloaded = true;
        }

        let stop = &mut day.stops[idx];
        stop.distance_from_previous_km = distance;
        stop.travel_minutes_from_previous = travel;
        stop.arrival_offset_minutes = arrival;
        stop.estimated_arrival = add_minutes(params.workday_start, arrival);
        stop.estimated_departure = add_minutes(params.workday_start, departure);
        if let Some(commune) = stop.obligation.commune.as_ref().filter(|c| !c.is_empty()) {
            communes.insert(commune.clone());
        }

        total_distance += distance;
        cursor = departure;
    }

    day.total_distance_km = total_distance;
    day.total_duration_hours = cursor / 60.0;
    day.end_time = add_minutes(params.workday_start, cursor);
    day.overloaded = overloaded;
    day.communes = communes;
    day.fuel = None;
}

/// Distance and travel minutes between two consecutive visits
fn leg(from: &VisitObligation, to: &VisitObligation, params: &PlannerParams) -> (f64, f64) {
    match (from.coordinates.as_ref(), to.coordinates.as_ref()) {
        (Some(a), Some(b)) => {
            let distance = haversine_distance(a, b);
            (distance, travel_time_minutes(distance, params.average_speed_kmh))
        }
        _ => (0.0, params.unlocated_travel_minutes),
    }
}

/// Add fractional minutes to a time, rounding to the second.
/// Clamps to 23:59:59 instead of wrapping past midnight.
fn add_minutes(time: NaiveTime, minutes: f64) -> NaiveTime {
    let secs = time.num_seconds_from_midnight() as i64 + (minutes * 60.0).round() as i64;
    let clamped = secs.clamp(0, 86_399) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(clamped, 0).unwrap_or(time)
}

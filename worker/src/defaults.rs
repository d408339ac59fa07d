//! Default planning constants.
//!
//! Most values are defaults for `PlannerParams` or the fuel profile.
//! Route estimates read the urban speed and return factor directly.

use chrono::NaiveTime;

pub const MAX_CLUSTER_SIZE: usize = 9;
pub const MAX_VISITS_PER_DAY: usize = 15;
pub const AVERAGE_SPEED_KMH: f64 = 40.0;
/// Urban speed used for whole-route time estimates
pub const URBAN_SPEED_KMH: f64 = 30.0;
pub const VISIT_DURATION_MINUTES: f64 = 60.0;
/// Travel time charged for a leg touching a client without coordinates
pub const UNLOCATED_TRAVEL_MINUTES: f64 = 15.0;
pub const TWO_OPT_MAX_PASSES: usize = 100;
pub const TWO_OPT_TOLERANCE_KM: f64 = 0.001;
pub const MIN_RETAINED_VISITS: usize = 5;

pub const BASE_FREQUENCY_DAYS: i32 = 30;
pub const KEY_ACCOUNT_FREQUENCY_DAYS: i32 = 15;
pub const NO_SALE_THRESHOLD: i32 = 5;
pub const NO_SALE_MULTIPLIER: f64 = 1.5;
pub const COMPETITOR_MULTIPLIER: f64 = 0.75;
pub const ELIGIBILITY_RATIO: f64 = 0.7;

pub const WRITE_BATCH_SIZE: usize = 100;
/// Longest date span a single request may cover
pub const MAX_RANGE_DAYS: i64 = 366;

pub const DEFAULT_FUEL_EFFICIENCY_KML: f64 = 10.0;
pub const DEFAULT_FUEL_PRICE_PER_LITER: f64 = 1150.0;
pub const DEFAULT_FUEL_TYPE: &str = "93 octanos";
/// Return-trip estimate applied when a route has no fixed start point
pub const RETURN_ESTIMATE_FACTOR: f64 = 1.2;

pub fn default_work_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

pub fn default_work_end() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default()
}

/// Arrivals at or after this time are candidates for overflow
pub fn default_late_arrival() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default()
}

pub fn default_auto_reschedule_at() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 30, 0).unwrap_or_default()
}

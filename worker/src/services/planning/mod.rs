//! Visit planning engine.
//!
//! Pure, synchronous algorithms over in-memory obligations. Nothing in this
//! module touches I/O; `services::scheduler` feeds it through the ports.
//!
//! Pipeline for a generated schedule:
//! frequency filter -> clustering -> day allocation -> per-day sequencing
//! and timeline -> overflow reallocation -> fuel annotation.

pub mod allocation;
pub mod calendar;
pub mod clustering;
pub mod frequency;
pub mod overflow;
pub mod pipeline;
pub mod sequencer;
pub mod timeline;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::defaults;

pub use allocation::allocate_clusters;
pub use calendar::{business_days, next_business_day};
pub use clustering::build_clusters;
pub use frequency::{compute_interval, filter_eligible, is_eligible};
pub use overflow::reallocate_overflow;
pub use pipeline::{plan_schedule, sequence_day};
pub use sequencer::{sequence, SequenceResult};
pub use timeline::{plan_day, plan_day_with_origins, refresh_day};

/// Order in which the no-sale and competitor multipliers are applied when
/// both conditions hold. Each step is rounded before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierOrder {
    NoSaleFirst,
    CompetitorFirst,
}

impl std::str::FromStr for MultiplierOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "no_sale_first" => Ok(MultiplierOrder::NoSaleFirst),
            "competitor_first" => Ok(MultiplierOrder::CompetitorFirst),
            other => anyhow::bail!("unknown multiplier order: {}", other),
        }
    }
}

/// How the next cluster seed is picked once no key account is left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    /// Obligation whose nearest existing centroid is farthest away;
    /// ties go to the higher-priority obligation
    FarthestFromCentroids,
    /// First unassigned obligation in priority order
    PriorityOrder,
}

impl std::str::FromStr for SeedStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "farthest_from_centroids" => Ok(SeedStrategy::FarthestFromCentroids),
            "priority_order" => Ok(SeedStrategy::PriorityOrder),
            other => anyhow::bail!("unknown seed strategy: {}", other),
        }
    }
}

/// Every tunable constant of the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerParams {
    pub workday_start: NaiveTime,
    pub workday_end: NaiveTime,
    pub late_arrival: NaiveTime,
    pub max_cluster_size: usize,
    pub max_visits_per_day: usize,
    pub average_speed_kmh: f64,
    pub visit_duration_minutes: f64,
    pub unlocated_travel_minutes: f64,
    pub two_opt_max_passes: usize,
    pub two_opt_tolerance_km: f64,
    pub min_retained_visits: usize,
    pub base_frequency_days: i32,
    pub key_account_frequency_days: i32,
    pub no_sale_threshold: i32,
    pub no_sale_multiplier: f64,
    pub competitor_multiplier: f64,
    pub eligibility_ratio: f64,
    pub multiplier_order: MultiplierOrder,
    pub seed_strategy: SeedStrategy,
    pub write_batch_size: usize,
    /// Longest accepted span between a request's start and end dates
    pub max_range_days: i64,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            workday_start: defaults::default_work_start(),
            workday_end: defaults::default_work_end(),
            late_arrival: defaults::default_late_arrival(),
            max_cluster_size: defaults::MAX_CLUSTER_SIZE,
            max_visits_per_day: defaults::MAX_VISITS_PER_DAY,
            average_speed_kmh: defaults::AVERAGE_SPEED_KMH,
            visit_duration_minutes: defaults::VISIT_DURATION_MINUTES,
            unlocated_travel_minutes: defaults::UNLOCATED_TRAVEL_MINUTES,
            two_opt_max_passes: defaults::TWO_OPT_MAX_PASSES,
            two_opt_tolerance_km: defaults::TWO_OPT_TOLERANCE_KM,
            min_retained_visits: defaults::MIN_RETAINED_VISITS,
            base_frequency_days: defaults::BASE_FREQUENCY_DAYS,
            key_account_frequency_days: defaults::KEY_ACCOUNT_FREQUENCY_DAYS,
            no_sale_threshold: defaults::NO_SALE_THRESHOLD,
            no_sale_multiplier: defaults::NO_SALE_MULTIPLIER,
            competitor_multiplier: defaults::COMPETITOR_MULTIPLIER,
            eligibility_ratio: defaults::ELIGIBILITY_RATIO,
            multiplier_order: MultiplierOrder::NoSaleFirst,
            seed_strategy: SeedStrategy::FarthestFromCentroids,
            write_batch_size: defaults::WRITE_BATCH_SIZE,
            max_range_days: defaults::MAX_RANGE_DAYS,
        }
    }
}

impl PlannerParams {
    /// Minutes available between workday start and end (540 by default)
    pub fn workday_budget_minutes(&self) -> f64 {
        minutes_between(self.workday_start, self.workday_end)
    }

    /// Offset of the late-arrival threshold from workday start
    pub fn late_arrival_offset_minutes(&self) -> f64 {
        minutes_between(self.workday_start, self.late_arrival)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workday_end <= self.workday_start {
            anyhow::bail!("workday end must be after workday start");
        }
        if self.max_cluster_size == 0 || self.max_visits_per_day == 0 {
            anyhow::bail!("cluster and day capacities must be positive");
        }
        if !(self.average_speed_kmh.is_finite() && self.average_speed_kmh > 0.0) {
            anyhow::bail!("average speed must be positive");
        }
        for (name, value) in [
            ("visit duration", self.visit_duration_minutes),
            ("unlocated travel time", self.unlocated_travel_minutes),
            ("2-opt tolerance", self.two_opt_tolerance_km),
            ("no-sale multiplier", self.no_sale_multiplier),
            ("competitor multiplier", self.competitor_multiplier),
            ("eligibility ratio", self.eligibility_ratio),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                anyhow::bail!("{} must be a non-negative number", name);
            }
        }
        if self.write_batch_size == 0 {
            anyhow::bail!("write batch size must be positive");
        }
        if self.max_range_days <= 0 {
            anyhow::bail!("maximum range must be positive");
        }
        Ok(())
    }
}

fn minutes_between(from: NaiveTime, to: NaiveTime) -> f64 {
    (to.num_seconds_from_midnight() as f64 - from.num_seconds_from_midnight() as f64) / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget_is_540_minutes() {
        let params = PlannerParams::default();
        assert_eq!(params.workday_budget_minutes(), 540.0);
        assert_eq!(params.late_arrival_offset_minutes(), 480.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_workday() {
        let params = PlannerParams {
            workday_end: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            ..PlannerParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_speed() {
        for speed in [f64::NAN, f64::INFINITY, 0.0] {
            let params = PlannerParams {
                average_speed_kmh: speed,
                ..PlannerParams::default()
            };
            assert!(params.validate().is_err(), "speed {} accepted", speed);
        }
    }

    #[test]
    fn test_validate_rejects_negative_durations() {
        let negative_visit = PlannerParams {
            visit_duration_minutes: -60.0,
            ..PlannerParams::default()
        };
        assert!(negative_visit.validate().is_err());

        let nan_travel = PlannerParams {
            unlocated_travel_minutes: f64::NAN,
            ..PlannerParams::default()
        };
        assert!(nan_travel.validate().is_err());

        let no_range = PlannerParams {
            max_range_days: 0,
            ..PlannerParams::default()
        };
        assert!(no_range.validate().is_err());
    }

    #[test]
    fn test_parse_strategies() {
        assert_eq!(
            "competitor_first".parse::<MultiplierOrder>().unwrap(),
            MultiplierOrder::CompetitorFirst
        );
        assert_eq!(
            "priority_order".parse::<SeedStrategy>().unwrap(),
            SeedStrategy::PriorityOrder
        );
        assert!("sideways".parse::<SeedStrategy>().is_err());
    }
}

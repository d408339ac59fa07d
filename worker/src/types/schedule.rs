//! Schedule types

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Coordinates, FuelEstimate, VisitObligation, VisitOutcome};

/// Lifecycle of a scheduled visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "visit_status", rename_all = "snake_case")]
pub enum VisitStatus {
    Pending,
    Completed,
    Skipped,
    Rescheduled,
}

/// One persisted visit of a vendor on a given day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledVisitEntry {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub client_id: Uuid,
    pub visit_order: i32,
    pub status: VisitStatus,
    pub estimated_arrival: Option<NaiveTime>,
    pub estimated_departure: Option<NaiveTime>,
    /// Date the visit was first planned for, set once it gets moved
    pub original_date: Option<NaiveDate>,
}

/// A visit placed on a day with its simulated times
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStop {
    pub obligation: VisitObligation,
    pub estimated_arrival: NaiveTime,
    pub estimated_departure: NaiveTime,
    pub distance_from_previous_km: f64,
    pub travel_minutes_from_previous: f64,
    /// Minutes after workday start
    pub arrival_offset_minutes: f64,
    /// Carried over from an earlier date, if any
    pub original_date: Option<NaiveDate>,
}

/// Transient plan for a single day of a scheduling run
#[derive(Debug, Clone, PartialEq)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub stops: Vec<PlannedStop>,
    pub total_distance_km: f64,
    pub total_duration_hours: f64,
    pub end_time: NaiveTime,
    pub overloaded: bool,
    pub communes: BTreeSet<String>,
    pub fuel: Option<FuelEstimate>,
}

impl DayPlan {
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn client_ids(&self) -> Vec<Uuid> {
        self.stops.iter().map(|s| s.obligation.id).collect()
    }

    /// Convert to pending rows for the given vendor
    pub fn to_entries(&self, vendor_id: Uuid) -> Vec<ScheduledVisitEntry> {
        self.stops
            .iter()
            .enumerate()
            .map(|(idx, stop)| ScheduledVisitEntry {
                id: Uuid::new_v4(),
                vendor_id,
                scheduled_date: self.date,
                client_id: stop.obligation.id,
                visit_order: idx as i32 + 1,
                status: VisitStatus::Pending,
                estimated_arrival: Some(stop.estimated_arrival),
                estimated_departure: Some(stop.estimated_departure),
                original_date: stop.original_date,
            })
            .collect()
    }

    pub fn summary(&self) -> DaySummary {
        DaySummary {
            date: self.date,
            visit_count: self.stops.len(),
            total_distance_km: self.total_distance_km,
            total_duration_hours: self.total_duration_hours,
            end_time: self.end_time,
            overloaded: self.overloaded,
            communes: self.communes.iter().cloned().collect(),
            fuel: self.fuel.clone(),
            stops: self
                .stops
                .iter()
                .enumerate()
                .map(|(idx, stop)| StopSummary {
                    order: idx as i32 + 1,
                    client_id: stop.obligation.id,
                    name: stop.obligation.name.clone(),
                    commune: stop.obligation.commune.clone(),
                    estimated_arrival: stop.estimated_arrival,
                    estimated_departure: stop.estimated_departure,
                    distance_from_previous_km: stop.distance_from_previous_km,
                    travel_minutes_from_previous: stop.travel_minutes_from_previous,
                })
                .collect(),
        }
    }
}

/// Per-stop figures reported to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSummary {
    pub order: i32,
    pub client_id: Uuid,
    pub name: String,
    pub commune: Option<String>,
    pub estimated_arrival: NaiveTime,
    pub estimated_departure: NaiveTime,
    pub distance_from_previous_km: f64,
    pub travel_minutes_from_previous: f64,
}

/// Per-day aggregate statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: NaiveDate,
    pub visit_count: usize,
    pub total_distance_km: f64,
    pub total_duration_hours: f64,
    pub end_time: NaiveTime,
    pub overloaded: bool,
    pub communes: Vec<String>,
    pub fuel: Option<FuelEstimate>,
    pub stops: Vec<StopSummary>,
}

/// Outcome of writing a plan in batches.
///
/// Batches already committed stay committed when a later one fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    pub entries_written: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.batches_failed == 0
    }
}

// ============================================================================
// Requests / responses
// ============================================================================

/// Request to generate a vendor's schedule for a date range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateScheduleRequest {
    pub vendor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub exclude_client_ids: Vec<Uuid>,
    /// Reference date for eligibility, defaults to `start_date`
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    /// Vehicle-specific efficiency overriding the fuel profile
    #[serde(default)]
    pub fuel_efficiency_kml: Option<f64>,
}

/// Request to plan one day in the given client order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDayRequest {
    pub vendor_id: Uuid,
    pub date: NaiveDate,
    pub client_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAssignment {
    pub date: NaiveDate,
    pub client_ids: Vec<Uuid>,
}

/// Request to plan several days at once
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMultiDayRequest {
    pub vendor_id: Uuid,
    pub days: Vec<DayAssignment>,
    /// Append to existing pending visits instead of replacing them
    #[serde(default)]
    pub accumulative: bool,
}

/// Result of any scheduling operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRunResult {
    pub vendor_id: Uuid,
    pub days: Vec<DaySummary>,
    pub total_visits: usize,
    pub total_distance_km: f64,
    pub total_fuel_cost: i64,
    pub overloaded_days: usize,
    /// Clients left out because they are not due yet
    pub ineligible_clients: usize,
    pub write: BatchReport,
}

/// Request to move a day's unfinished visits forward
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleIncompleteRequest {
    pub vendor_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleIncompleteResult {
    pub vendor_id: Uuid,
    pub from_date: NaiveDate,
    pub to_date: Option<NaiveDate>,
    pub moved: usize,
    /// Entries resolved concurrently before this run could move them
    pub already_resolved: usize,
    /// Moved visits put back to `pending` because their new entry was not written
    pub restored: usize,
    pub day: Option<DaySummary>,
    pub write: BatchReport,
}

/// Manual run of the end-of-day reschedule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRescheduleRequest {
    /// Defaults to the worker's local date
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRescheduleResult {
    pub date: NaiveDate,
    pub vendors_processed: usize,
    pub vendors_failed: usize,
    pub visits_moved: usize,
}

/// Request to skip a single pending visit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipEntryRequest {
    pub entry_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request to move a single pending visit to another date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleEntryRequest {
    pub entry_id: Uuid,
    pub new_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Check-in result for a pending visit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteVisitRequest {
    pub entry_id: Uuid,
    pub outcome: VisitOutcome,
    /// Defaults to now
    #[serde(default)]
    pub visited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyRecomputeResult {
    pub evaluated: usize,
    pub updated: usize,
}

/// Request to order all of a vendor's located clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteRequest {
    pub vendor_id: Uuid,
    #[serde(default)]
    pub start_point: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedStop {
    pub order: i32,
    pub client_id: Uuid,
    pub name: String,
    pub commune: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStats {
    pub total_clients: usize,
    pub fuel: FuelEstimate,
    pub estimated_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteResult {
    pub route: Vec<OptimizedStop>,
    pub stats: Option<RouteStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleEventKind {
    VisitSkipped,
    VisitRescheduled,
}

impl ScheduleEventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScheduleEventKind::VisitSkipped => "visit_skipped",
            ScheduleEventKind::VisitRescheduled => "visit_rescheduled",
        }
    }
}

/// Event raised by a manual skip or reschedule, meant for supervisors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    pub kind: ScheduleEventKind,
    pub entry_id: Uuid,
    pub vendor_id: Uuid,
    pub client_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub new_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

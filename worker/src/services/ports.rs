//! Collaborator ports used by the scheduling service.
//!
//! PostgreSQL adapters live in `db::queries`, in-memory ones in
//! `services::memory`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::types::{ScheduleEvent, ScheduledVisitEntry, VisitObligation, VisitOutcome, VisitStatus};

/// Read access to clients and their visit history
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Clients assigned to a vendor, in a stable order
    async fn list_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<VisitObligation>>;

    /// Every client of every vendor
    async fn list_all(&self) -> Result<Vec<VisitObligation>>;

    /// Reset or increment the no-sale streak and stamp the visit time
    async fn record_visit(
        &self,
        client_id: Uuid,
        outcome: VisitOutcome,
        visited_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn update_frequency(&self, client_id: Uuid, frequency_days: i32) -> Result<()>;
}

/// Storage of scheduled visit entries
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn get(&self, entry_id: Uuid) -> Result<Option<ScheduledVisitEntry>>;

    /// Entries of any status for a vendor on a date, by visit order
    async fn entries_for_date(&self, vendor_id: Uuid, date: NaiveDate) -> Result<Vec<ScheduledVisitEntry>>;

    /// Delete the vendor's `pending` entries dated within `[start, end]`.
    /// Other statuses are left alone.
    async fn delete_pending_in_range(&self, vendor_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<u64>;

    /// Delete the vendor's `pending` entries on `date` that belong to one
    /// of `client_ids`
    async fn delete_pending_for_clients(&self, vendor_id: Uuid, date: NaiveDate, client_ids: &[Uuid]) -> Result<u64>;

    /// Insert entries atomically: all of them or none
    async fn insert_batch(&self, entries: &[ScheduledVisitEntry]) -> Result<()>;

    /// Set the status to `to` only if it is currently `from`.
    /// Returns `false` when the entry was not in `from` (or is gone).
    async fn transition_status(&self, entry_id: Uuid, from: VisitStatus, to: VisitStatus) -> Result<bool>;

    /// Vendors with at least one `pending` entry on `date`
    async fn vendors_with_pending(&self, date: NaiveDate) -> Result<Vec<Uuid>>;
}

/// Outbound notification of schedule events
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ScheduleEvent) -> Result<()>;
}

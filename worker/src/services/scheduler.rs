//! Schedule service.
//!
//! Runs every scheduling operation for one vendor at a time: loads what it
//! needs through the ports, calls the pure planner and writes the outcome
//! back in batches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::defaults::{RETURN_ESTIMATE_FACTOR, URBAN_SPEED_KMH};
use crate::error::{PlannerError, PlannerResult};
use crate::services::fuel::{estimate_fuel, FuelConfigService};
use crate::services::geo::travel_time_minutes;
use crate::services::planning::{self, PlannerParams};
use crate::services::ports::{ClientDirectory, Notifier, ScheduleRepository};
use crate::types::{
    AutoRescheduleResult, BatchReport, CompleteVisitRequest, DayPlan, FrequencyRecomputeResult,
    GenerateScheduleRequest, OptimizeRouteRequest, OptimizeRouteResult, OptimizedStop,
    RescheduleEntryRequest, RescheduleIncompleteRequest, RescheduleIncompleteResult, RouteStats,
    ScheduleDayRequest, ScheduleEvent, ScheduleEventKind, ScheduleMultiDayRequest,
    ScheduleRunResult, ScheduledVisitEntry, SkipEntryRequest, VisitObligation, VisitStatus,
};

pub struct ScheduleService {
    clients: Arc<dyn ClientDirectory>,
    schedule: Arc<dyn ScheduleRepository>,
    notifier: Arc<dyn Notifier>,
    fuel: Arc<FuelConfigService>,
    params: PlannerParams,
}

impl ScheduleService {
    pub fn new(
        clients: Arc<dyn ClientDirectory>,
        schedule: Arc<dyn ScheduleRepository>,
        notifier: Arc<dyn Notifier>,
        fuel: Arc<FuelConfigService>,
        params: PlannerParams,
    ) -> Self {
        Self {
            clients,
            schedule,
            notifier,
            fuel,
            params,
        }
    }

    pub fn params(&self) -> &PlannerParams {
        &self.params
    }

    pub fn fuel(&self) -> &FuelConfigService {
        &self.fuel
    }

    /// Plan a vendor's due clients over the business days of a range and
    /// replace the pending visits in that range.
    pub async fn generate(&self, request: GenerateScheduleRequest) -> PlannerResult<ScheduleRunResult> {
        let vendor_id = request.vendor_id;
        let span = request.end_date.signed_duration_since(request.start_date).num_days();
        if span > self.params.max_range_days {
            return Err(PlannerError::InvalidRequest(format!(
                "date range spans {} days, at most {} allowed",
                span, self.params.max_range_days
            )));
        }
        let days = planning::business_days(request.start_date, request.end_date);
        if days.is_empty() {
            return Err(PlannerError::EmptyDateRange);
        }

        let clients = self.clients.list_for_vendor(vendor_id).await?;
        if clients.is_empty() {
            return Err(PlannerError::NoClientsAssigned);
        }

        let excluded: HashSet<Uuid> = request.exclude_client_ids.iter().copied().collect();
        let candidates: Vec<VisitObligation> = clients
            .into_iter()
            .filter(|c| !excluded.contains(&c.id))
            .collect();
        let as_of = request.as_of.unwrap_or(request.start_date);
        let (eligible, ineligible) = planning::filter_eligible(candidates, as_of, &self.params);

        let mut plans = planning::plan_schedule(&eligible, &days, &self.params);
        self.annotate_fuel(&mut plans, request.fuel_efficiency_kml);

        let mut deleted = self
            .schedule
            .delete_pending_in_range(vendor_id, request.start_date, request.end_date)
            .await?;
        // Overflow days past the range only replace the clients planned on them
        for day in plans.iter().filter(|day| day.date > request.end_date) {
            deleted += self
                .schedule
                .delete_pending_for_clients(vendor_id, day.date, &day.client_ids())
                .await?;
        }

        let entries: Vec<ScheduledVisitEntry> =
            plans.iter().flat_map(|day| day.to_entries(vendor_id)).collect();
        let write = self.write_batches(&entries).await;

        info!(
            "Generated schedule for vendor {}: {} visits on {} days ({} not due, {} pending replaced, {}/{} batches ok)",
            vendor_id,
            entries.len(),
            plans.len(),
            ineligible,
            deleted,
            write.batches_succeeded,
            write.batches_succeeded + write.batches_failed
        );

        Ok(run_result(vendor_id, &plans, ineligible, write))
    }

    /// Plan one day in exactly the order the caller gave
    pub async fn schedule_one_day(&self, request: ScheduleDayRequest) -> PlannerResult<ScheduleRunResult> {
        let vendor_id = request.vendor_id;
        if request.client_ids.is_empty() {
            return Err(PlannerError::InvalidRequest("clientIds must not be empty".to_string()));
        }

        let directory = self.assigned_clients(vendor_id).await?;
        let obligations = resolve_ids(&directory, &request.client_ids);
        if obligations.is_empty() {
            return Err(PlannerError::InvalidRequest(
                "none of the requested clients belong to this vendor".to_string(),
            ));
        }

        let mut plans = vec![planning::plan_day(request.date, obligations, &self.params)];
        self.annotate_fuel(&mut plans, None);

        self.schedule
            .delete_pending_in_range(vendor_id, request.date, request.date)
            .await?;
        let entries = plans[0].to_entries(vendor_id);
        let write = self.write_batches(&entries).await;

        info!(
            "Scheduled {} visits for vendor {} on {}",
            entries.len(),
            vendor_id,
            request.date
        );

        Ok(run_result(vendor_id, &plans, 0, write))
    }

    /// Plan several days, either replacing each date's pending visits or
    /// appending to them
    pub async fn schedule_multi_day(
        &self,
        request: ScheduleMultiDayRequest,
    ) -> PlannerResult<ScheduleRunResult> {
        let vendor_id = request.vendor_id;
        if request.days.is_empty() {
            return Err(PlannerError::InvalidRequest("days must not be empty".to_string()));
        }

        let mut assignments = request.days;
        assignments.sort_by_key(|a| a.date);
        if assignments.windows(2).any(|w| w[0].date == w[1].date) {
            return Err(PlannerError::InvalidRequest("each date may appear only once".to_string()));
        }

        let directory = self.assigned_clients(vendor_id).await?;
        let mut plans = Vec::with_capacity(assignments.len());
        let mut entries = Vec::new();

        for assignment in assignments {
            let requested = resolve_ids(&directory, &assignment.client_ids);

            if request.accumulative {
                let existing = self.pending_on(vendor_id, assignment.date).await?;
                let additions = requested.into_iter().map(|o| (o, None)).collect();
                let (day, new_entries) =
                    append_to_day(vendor_id, assignment.date, &directory, &existing, additions, &self.params);
                entries.extend(new_entries);
                plans.push(day);
            } else {
                self.schedule
                    .delete_pending_in_range(vendor_id, assignment.date, assignment.date)
                    .await?;
                let day = planning::plan_day(assignment.date, requested, &self.params);
                entries.extend(day.to_entries(vendor_id));
                plans.push(day);
            }
        }

        self.annotate_fuel(&mut plans, None);
        let write = self.write_batches(&entries).await;

        info!(
            "Scheduled {} days for vendor {} ({} new visits, accumulative: {})",
            plans.len(),
            vendor_id,
            entries.len(),
            request.accumulative
        );

        Ok(run_result(vendor_id, &plans, 0, write))
    }

    /// Move a day's still-pending visits to the next business day.
    ///
    /// Each visit is flipped to `rescheduled` only if it is still pending,
    /// so a concurrent run cannot move it twice. Visits whose new entry
    /// cannot be written are flipped back to `pending`.
    pub async fn reschedule_incomplete(
        &self,
        request: RescheduleIncompleteRequest,
    ) -> PlannerResult<RescheduleIncompleteResult> {
        let vendor_id = request.vendor_id;
        let pending = self.pending_on(vendor_id, request.date).await?;
        if pending.is_empty() {
            return Ok(nothing_moved(vendor_id, request.date, 0));
        }

        let to_date = planning::next_business_day(request.date).ok_or_else(|| {
            PlannerError::InvalidRequest(format!("no business day after {}", request.date))
        })?;
        let directory = self.clients_by_id(vendor_id).await?;
        let existing = self.pending_on(vendor_id, to_date).await?;

        let mut moved = Vec::new();
        let mut already_resolved = 0;
        for entry in pending {
            match self
                .schedule
                .transition_status(entry.id, VisitStatus::Pending, VisitStatus::Rescheduled)
                .await
            {
                Ok(true) => moved.push(entry),
                Ok(false) => already_resolved += 1,
                Err(e) => {
                    self.restore_pending(&moved).await;
                    return Err(e.into());
                }
            }
        }

        if moved.is_empty() {
            return Ok(nothing_moved(vendor_id, request.date, already_resolved));
        }

        let additions = moved
            .iter()
            .map(|entry| {
                (
                    lookup(&directory, entry.client_id),
                    Some(entry.original_date.unwrap_or(entry.scheduled_date)),
                )
            })
            .collect();

        let (day, entries) = append_to_day(vendor_id, to_date, &directory, &existing, additions, &self.params);
        let mut days = vec![day];
        self.annotate_fuel(&mut days, None);
        let (write, failed) = self.write_batches_tracked(&entries).await;

        let unwritten: HashSet<Uuid> = failed.iter().map(|e| e.client_id).collect();
        let (lost, moved): (Vec<_>, Vec<_>) = moved
            .into_iter()
            .partition(|entry| unwritten.contains(&entry.client_id));
        let restored = self.restore_pending(&lost).await;

        info!(
            "Rescheduled {} incomplete visits of vendor {} from {} to {} ({} already resolved, {} restored)",
            moved.len(),
            vendor_id,
            request.date,
            to_date,
            already_resolved,
            restored
        );

        Ok(RescheduleIncompleteResult {
            vendor_id,
            from_date: request.date,
            to_date: Some(to_date),
            moved: moved.len(),
            already_resolved,
            restored,
            day: days.first().map(DayPlan::summary),
            write,
        })
    }

    /// Reschedule the incomplete visits of every vendor with pending visits
    /// on `today`. A failing vendor does not stop the others.
    pub async fn auto_reschedule_end_of_day(&self, today: NaiveDate) -> PlannerResult<AutoRescheduleResult> {
        let vendors = self.schedule.vendors_with_pending(today).await?;
        let mut result = AutoRescheduleResult {
            date: today,
            vendors_processed: 0,
            vendors_failed: 0,
            visits_moved: 0,
        };

        for vendor_id in vendors {
            match self
                .reschedule_incomplete(RescheduleIncompleteRequest {
                    vendor_id,
                    date: today,
                })
                .await
            {
                Ok(outcome) => {
                    result.vendors_processed += 1;
                    result.visits_moved += outcome.moved;
                }
                Err(e) => {
                    result.vendors_failed += 1;
                    error!("Auto-reschedule failed for vendor {}: {}", vendor_id, e);
                }
            }
        }

        info!(
            "Auto-reschedule for {}: {} vendors ok, {} failed, {} visits moved",
            today, result.vendors_processed, result.vendors_failed, result.visits_moved
        );

        Ok(result)
    }

    pub async fn skip_entry(&self, request: SkipEntryRequest) -> PlannerResult<ScheduledVisitEntry> {
        let mut entry = self.pending_entry(request.entry_id).await?;
        if !self
            .schedule
            .transition_status(entry.id, VisitStatus::Pending, VisitStatus::Skipped)
            .await?
        {
            return Err(PlannerError::RouteNotPending(entry.id));
        }
        entry.status = VisitStatus::Skipped;

        info!("Visit {} of vendor {} skipped", entry.id, entry.vendor_id);
        self.emit(ScheduleEvent {
            kind: ScheduleEventKind::VisitSkipped,
            entry_id: entry.id,
            vendor_id: entry.vendor_id,
            client_id: entry.client_id,
            scheduled_date: entry.scheduled_date,
            new_date: None,
            reason: request.reason,
            occurred_at: Utc::now(),
        })
        .await;

        Ok(entry)
    }

    /// Move one pending visit to another date, appended after that date's
    /// pending visits. Returns the new entry.
    pub async fn reschedule_entry(
        &self,
        request: RescheduleEntryRequest,
    ) -> PlannerResult<ScheduledVisitEntry> {
        let entry = self.pending_entry(request.entry_id).await?;
        if request.new_date == entry.scheduled_date {
            return Err(PlannerError::InvalidRequest(
                "new date is the current date".to_string(),
            ));
        }

        let existing = self.pending_on(entry.vendor_id, request.new_date).await?;
        if existing.iter().any(|e| e.client_id == entry.client_id) {
            return Err(PlannerError::InvalidRequest(format!(
                "client already has a pending visit on {}",
                request.new_date
            )));
        }

        if !self
            .schedule
            .transition_status(entry.id, VisitStatus::Pending, VisitStatus::Rescheduled)
            .await?
        {
            return Err(PlannerError::RouteNotPending(entry.id));
        }

        let directory = self.clients_by_id(entry.vendor_id).await?;
        let origin = entry.original_date.unwrap_or(entry.scheduled_date);
        let (_, new_entries) = append_to_day(
            entry.vendor_id,
            request.new_date,
            &directory,
            &existing,
            vec![(lookup(&directory, entry.client_id), Some(origin))],
            &self.params,
        );

        let write = self.write_batches(&new_entries).await;
        if !write.is_complete() {
            // Put the visit back so it is not lost
            self.schedule
                .transition_status(entry.id, VisitStatus::Rescheduled, VisitStatus::Pending)
                .await?;
            return Err(anyhow!("failed to write rescheduled visit: {}", write.errors.join("; ")).into());
        }
        let moved = new_entries
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("rescheduled visit produced no entry"))?;

        info!(
            "Visit {} of vendor {} moved from {} to {}",
            entry.id, entry.vendor_id, entry.scheduled_date, request.new_date
        );
        self.emit(ScheduleEvent {
            kind: ScheduleEventKind::VisitRescheduled,
            entry_id: entry.id,
            vendor_id: entry.vendor_id,
            client_id: entry.client_id,
            scheduled_date: entry.scheduled_date,
            new_date: Some(request.new_date),
            reason: request.reason,
            occurred_at: Utc::now(),
        })
        .await;

        Ok(moved)
    }

    /// Check in a pending visit and report the outcome to the client directory
    pub async fn complete_visit(&self, request: CompleteVisitRequest) -> PlannerResult<ScheduledVisitEntry> {
        let mut entry = self.pending_entry(request.entry_id).await?;
        if !self
            .schedule
            .transition_status(entry.id, VisitStatus::Pending, VisitStatus::Completed)
            .await?
        {
            return Err(PlannerError::RouteNotPending(entry.id));
        }
        entry.status = VisitStatus::Completed;

        let visited_at = request.visited_at.unwrap_or_else(Utc::now);
        self.clients
            .record_visit(entry.client_id, request.outcome, visited_at)
            .await?;

        info!(
            "Visit {} completed ({:?}) for client {}",
            entry.id, request.outcome, entry.client_id
        );
        Ok(entry)
    }

    /// Recompute every client's interval, persisting only the changed ones
    pub async fn recompute_frequencies(&self) -> PlannerResult<FrequencyRecomputeResult> {
        let clients = self.clients.list_all().await?;
        let mut updated = 0;

        for client in &clients {
            let interval = planning::compute_interval(client, &self.params);
            if interval != client.frequency_days {
                self.clients.update_frequency(client.id, interval).await?;
                updated += 1;
            }
        }

        info!(
            "Recomputed visit frequencies: {} clients, {} updated",
            clients.len(),
            updated
        );

        Ok(FrequencyRecomputeResult {
            evaluated: clients.len(),
            updated,
        })
    }

    /// Order all of a vendor's located clients into one route
    pub async fn optimize_route(&self, request: OptimizeRouteRequest) -> PlannerResult<OptimizeRouteResult> {
        let located: Vec<VisitObligation> = self
            .clients
            .list_for_vendor(request.vendor_id)
            .await?
            .into_iter()
            .filter(VisitObligation::is_located)
            .collect();

        if located.is_empty() {
            return Ok(OptimizeRouteResult {
                route: Vec::new(),
                stats: None,
                message: Some("No clients with coordinates are assigned to this vendor".to_string()),
            });
        }

        let points: Vec<_> = located.iter().map(|o| o.coordinates).collect();
        let start = request.start_point.as_ref();
        let result = planning::sequence(&points, start, start.is_some(), &self.params);

        let distance = if start.is_some() {
            result.total_distance_km
        } else {
            result.total_distance_km * RETURN_ESTIMATE_FACTOR
        };

        let route: Vec<OptimizedStop> = result
            .order
            .iter()
            .filter_map(|&idx| located.get(idx))
            .enumerate()
            .filter_map(|(pos, client)| {
                let coords = client.coordinates?;
                Some(OptimizedStop {
                    order: pos as i32 + 1,
                    client_id: client.id,
                    name: client.name.clone(),
                    commune: client.commune.clone(),
                    lat: coords.lat,
                    lng: coords.lng,
                })
            })
            .collect();

        let stats = RouteStats {
            total_clients: route.len(),
            fuel: estimate_fuel(distance, None, &self.fuel.current()),
            estimated_minutes: travel_time_minutes(distance, URBAN_SPEED_KMH).round() as i64,
        };

        Ok(OptimizeRouteResult {
            route,
            stats: Some(stats),
            message: None,
        })
    }

    // ------------------------------------------------------------------

    async fn assigned_clients(&self, vendor_id: Uuid) -> PlannerResult<HashMap<Uuid, VisitObligation>> {
        let directory = self.clients_by_id(vendor_id).await?;
        if directory.is_empty() {
            return Err(PlannerError::NoClientsAssigned);
        }
        Ok(directory)
    }

    async fn clients_by_id(&self, vendor_id: Uuid) -> PlannerResult<HashMap<Uuid, VisitObligation>> {
        Ok(self
            .clients
            .list_for_vendor(vendor_id)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }

    async fn pending_on(&self, vendor_id: Uuid, date: NaiveDate) -> PlannerResult<Vec<ScheduledVisitEntry>> {
        Ok(self
            .schedule
            .entries_for_date(vendor_id, date)
            .await?
            .into_iter()
            .filter(|e| e.status == VisitStatus::Pending)
            .collect())
    }

    async fn pending_entry(&self, entry_id: Uuid) -> PlannerResult<ScheduledVisitEntry> {
        let entry = self
            .schedule
            .get(entry_id)
            .await?
            .ok_or(PlannerError::EntryNotFound(entry_id))?;
        if entry.status != VisitStatus::Pending {
            return Err(PlannerError::RouteNotPending(entry_id));
        }
        Ok(entry)
    }

    async fn emit(&self, event: ScheduleEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            warn!(
                "Failed to send {} notification for visit {}: {}",
                event.kind.as_str(),
                event.entry_id,
                e
            );
        }
    }

    fn annotate_fuel(&self, days: &mut [DayPlan], efficiency_kml: Option<f64>) {
        let profile = self.fuel.current();
        for day in days {
            day.fuel = Some(estimate_fuel(day.total_distance_km, efficiency_kml, &profile));
        }
    }

    /// Insert entries in fixed-size batches. A failed batch is reported and
    /// the remaining batches are still attempted.
    async fn write_batches(&self, entries: &[ScheduledVisitEntry]) -> BatchReport {
        self.write_batches_tracked(entries).await.0
    }

    /// Like `write_batches`, also returning the entries of failed batches
    async fn write_batches_tracked<'a>(
        &self,
        entries: &'a [ScheduledVisitEntry],
    ) -> (BatchReport, Vec<&'a ScheduledVisitEntry>) {
        let mut report = BatchReport::default();
        let mut failed = Vec::new();

        for (idx, batch) in entries.chunks(self.params.write_batch_size.max(1)).enumerate() {
            match self.schedule.insert_batch(batch).await {
                Ok(()) => {
                    report.batches_succeeded += 1;
                    report.entries_written += batch.len();
                }
                Err(e) => {
                    warn!("Batch {} ({} entries) failed: {:#}", idx + 1, batch.len(), e);
                    report.batches_failed += 1;
                    report.errors.push(format!("batch {}: {:#}", idx + 1, e));
                    failed.extend(batch);
                }
            }
        }

        (report, failed)
    }

    /// Flip rescheduled entries back to pending. Returns how many were restored.
    async fn restore_pending(&self, entries: &[ScheduledVisitEntry]) -> usize {
        let mut restored = 0;
        for entry in entries {
            match self
                .schedule
                .transition_status(entry.id, VisitStatus::Rescheduled, VisitStatus::Pending)
                .await
            {
                Ok(true) => restored += 1,
                Ok(false) => warn!("Visit {} changed status before it could be restored", entry.id),
                Err(e) => error!("Failed to restore visit {} to pending: {:#}", entry.id, e),
            }
        }
        restored
    }
}

/// Requested clients in caller order, without unknown ids or repeats
fn resolve_ids(directory: &HashMap<Uuid, VisitObligation>, ids: &[Uuid]) -> Vec<VisitObligation> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(ids.len());

    for id in ids {
        if !seen.insert(*id) {
            warn!("Client {} requested twice for the same day, ignoring repeat", id);
            continue;
        }
        match directory.get(id) {
            Some(client) => resolved.push(client.clone()),
            None => warn!("Client {} is not assigned to this vendor, skipping", id),
        }
    }

    resolved
}

fn lookup(directory: &HashMap<Uuid, VisitObligation>, client_id: Uuid) -> VisitObligation {
    directory
        .get(&client_id)
        .cloned()
        .unwrap_or_else(|| VisitObligation::unlisted(client_id))
}

/// Plan `date` as its existing pending visits followed by `additions`.
///
/// Returns the full day and new entries for the additions only, numbered
/// after the existing visit orders. Clients already on the day are skipped.
fn append_to_day(
    vendor_id: Uuid,
    date: NaiveDate,
    directory: &HashMap<Uuid, VisitObligation>,
    existing: &[ScheduledVisitEntry],
    additions: Vec<(VisitObligation, Option<NaiveDate>)>,
    params: &PlannerParams,
) -> (DayPlan, Vec<ScheduledVisitEntry>) {
    let mut seen: HashSet<Uuid> = existing.iter().map(|e| e.client_id).collect();
    let mut visits: Vec<(VisitObligation, Option<NaiveDate>)> = existing
        .iter()
        .map(|e| (lookup(directory, e.client_id), e.original_date))
        .collect();
    let kept = visits.len();

    for (obligation, origin) in additions {
        if seen.insert(obligation.id) {
            visits.push((obligation, origin));
        }
    }

    let day = planning::plan_day_with_origins(date, visits, params);
    let base_order = existing.iter().map(|e| e.visit_order).max().unwrap_or(0);

    let new_entries = day.stops[kept..]
        .iter()
        .enumerate()
        .map(|(idx, stop)| ScheduledVisitEntry {
            id: Uuid::new_v4(),
            vendor_id,
            scheduled_date: date,
            client_id: stop.obligation.id,
            visit_order: base_order + idx as i32 + 1,
            status: VisitStatus::Pending,
            estimated_arrival: Some(stop.estimated_arrival),
            estimated_departure: Some(stop.estimated_departure),
            original_date: stop.original_date,
        })
        .collect();

    (day, new_entries)
}

fn nothing_moved(vendor_id: Uuid, date: NaiveDate, already_resolved: usize) -> RescheduleIncompleteResult {
    RescheduleIncompleteResult {
        vendor_id,
        from_date: date,
        to_date: None,
        moved: 0,
        already_resolved,
        restored: 0,
        day: None,
        write: BatchReport::default(),
    }
}

fn run_result(vendor_id: Uuid, plans: &[DayPlan], ineligible: usize, write: BatchReport) -> ScheduleRunResult {
    ScheduleRunResult {
        vendor_id,
        days: plans.iter().map(DayPlan::summary).collect(),
        total_visits: plans.iter().map(DayPlan::len).sum(),
        total_distance_km: plans.iter().map(|d| d.total_distance_km).sum(),
        total_fuel_cost: plans.iter().filter_map(|d| d.fuel.as_ref()).map(|f| f.cost).sum(),
        overloaded_days: plans.iter().filter(|d| d.overloaded).count(),
        ineligible_clients: ineligible,
        write,
    }
}

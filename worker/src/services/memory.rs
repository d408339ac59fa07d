//! In-memory port adapters.
//!
//! Used by the offline `plan` command and by service tests.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::ports::{ClientDirectory, Notifier, ScheduleRepository};
use crate::types::{ScheduleEvent, ScheduledVisitEntry, VisitObligation, VisitOutcome, VisitStatus};

/// Clients kept in insertion order, each assigned to one vendor
#[derive(Default)]
pub struct InMemoryClientDirectory {
    clients: Mutex<Vec<(Uuid, VisitObligation)>>,
}

impl InMemoryClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clients(vendor_id: Uuid, clients: Vec<VisitObligation>) -> Self {
        let directory = Self::new();
        for client in clients {
            directory.insert(vendor_id, client);
        }
        directory
    }

    pub fn insert(&self, vendor_id: Uuid, client: VisitObligation) {
        self.clients.lock().push((vendor_id, client));
    }

    pub fn client(&self, client_id: Uuid) -> Option<VisitObligation> {
        self.clients
            .lock()
            .iter()
            .find(|(_, c)| c.id == client_id)
            .map(|(_, c)| c.clone())
    }
}

#[async_trait]
impl ClientDirectory for InMemoryClientDirectory {
    async fn list_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<VisitObligation>> {
        Ok(self
            .clients
            .lock()
            .iter()
            .filter(|(vendor, _)| *vendor == vendor_id)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<VisitObligation>> {
        Ok(self.clients.lock().iter().map(|(_, c)| c.clone()).collect())
    }

    async fn record_visit(
        &self,
        client_id: Uuid,
        outcome: VisitOutcome,
        visited_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut clients = self.clients.lock();
        let Some((_, client)) = clients.iter_mut().find(|(_, c)| c.id == client_id) else {
            bail!("client {} not found", client_id);
        };
        client.consecutive_no_sale = if outcome.is_sale() {
            0
        } else {
            client.consecutive_no_sale + 1
        };
        client.last_visit_at = Some(visited_at);
        Ok(())
    }

    async fn update_frequency(&self, client_id: Uuid, frequency_days: i32) -> Result<()> {
        let mut clients = self.clients.lock();
        let Some((_, client)) = clients.iter_mut().find(|(_, c)| c.id == client_id) else {
            bail!("client {} not found", client_id);
        };
        client.frequency_days = frequency_days;
        Ok(())
    }
}

/// Entry store with optional failure injection for batch inserts
#[derive(Default)]
pub struct InMemoryScheduleRepository {
    entries: Mutex<Vec<ScheduledVisitEntry>>,
    insert_calls: Mutex<usize>,
    failing_inserts: Mutex<BTreeSet<usize>>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the n-th call (1-based) to `insert_batch` fail
    pub fn fail_insert_call(&self, call: usize) {
        self.failing_inserts.lock().insert(call);
    }

    pub fn all(&self) -> Vec<ScheduledVisitEntry> {
        self.entries.lock().clone()
    }

    pub fn seed(&self, entries: Vec<ScheduledVisitEntry>) {
        self.entries.lock().extend(entries);
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn get(&self, entry_id: Uuid) -> Result<Option<ScheduledVisitEntry>> {
        Ok(self.entries.lock().iter().find(|e| e.id == entry_id).cloned())
    }

    async fn entries_for_date(&self, vendor_id: Uuid, date: NaiveDate) -> Result<Vec<ScheduledVisitEntry>> {
        let mut found: Vec<ScheduledVisitEntry> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.vendor_id == vendor_id && e.scheduled_date == date)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.visit_order);
        Ok(found)
    }

    async fn delete_pending_in_range(&self, vendor_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<u64> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| {
            !(e.vendor_id == vendor_id
                && e.status == VisitStatus::Pending
                && e.scheduled_date >= start
                && e.scheduled_date <= end)
        });
        Ok((before - entries.len()) as u64)
    }

    async fn delete_pending_for_clients(&self, vendor_id: Uuid, date: NaiveDate, client_ids: &[Uuid]) -> Result<u64> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| {
            !(e.vendor_id == vendor_id
                && e.status == VisitStatus::Pending
                && e.scheduled_date == date
                && client_ids.contains(&e.client_id))
        });
        Ok((before - entries.len()) as u64)
    }

    async fn insert_batch(&self, entries: &[ScheduledVisitEntry]) -> Result<()> {
        let call = {
            let mut calls = self.insert_calls.lock();
            *calls += 1;
            *calls
        };
        if self.failing_inserts.lock().contains(&call) {
            bail!("insert batch {} rejected", call);
        }
        self.entries.lock().extend_from_slice(entries);
        Ok(())
    }

    async fn transition_status(&self, entry_id: Uuid, from: VisitStatus, to: VisitStatus) -> Result<bool> {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| e.id == entry_id && e.status == from) {
            Some(entry) => {
                entry.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn vendors_with_pending(&self, date: NaiveDate) -> Result<Vec<Uuid>> {
        let vendors: BTreeSet<Uuid> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.scheduled_date == date && e.status == VisitStatus::Pending)
            .map(|e| e.vendor_id)
            .collect();
        Ok(vendors.into_iter().collect())
    }
}

/// Notifier that only records what it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ScheduleEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScheduleEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &ScheduleEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

//! Scheduled visit queries

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::ports::ScheduleRepository;
use crate::types::{ScheduledVisitEntry, VisitStatus};

const ENTRY_COLUMNS: &str = r#"
    id, vendor_id, scheduled_date, client_id, visit_order, status,
    estimated_arrival, estimated_departure, original_date
"#;

pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn get(&self, entry_id: Uuid) -> Result<Option<ScheduledVisitEntry>> {
        let query = format!("SELECT {} FROM scheduled_visits WHERE id = $1", ENTRY_COLUMNS);
        let entry = sqlx::query_as::<_, ScheduledVisitEntry>(&query)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    async fn entries_for_date(&self, vendor_id: Uuid, date: NaiveDate) -> Result<Vec<ScheduledVisitEntry>> {
        let query = format!(
            r#"
            SELECT {}
            FROM scheduled_visits
            WHERE vendor_id = $1 AND scheduled_date = $2
            ORDER BY visit_order, created_at
            "#,
            ENTRY_COLUMNS
        );
        let entries = sqlx::query_as::<_, ScheduledVisitEntry>(&query)
            .bind(vendor_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    async fn delete_pending_in_range(&self, vendor_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM scheduled_visits
            WHERE vendor_id = $1
              AND status = 'pending'
              AND scheduled_date BETWEEN $2 AND $3
            "#,
        )
        .bind(vendor_id)
        .bind(start)
        .bind(end)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_pending_for_clients(&self, vendor_id: Uuid, date: NaiveDate, client_ids: &[Uuid]) -> Result<u64> {
        if client_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            DELETE FROM scheduled_visits
            WHERE vendor_id = $1
              AND status = 'pending'
              AND scheduled_date = $2
              AND client_id = ANY($3)
            "#,
        )
        .bind(vendor_id)
        .bind(date)
        .bind(client_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_batch(&self, entries: &[ScheduledVisitEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO scheduled_visits (
                    id, vendor_id, scheduled_date, client_id, visit_order, status,
                    estimated_arrival, estimated_departure, original_date
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(entry.id)
            .bind(entry.vendor_id)
            .bind(entry.scheduled_date)
            .bind(entry.client_id)
            .bind(entry.visit_order)
            .bind(entry.status)
            .bind(entry.estimated_arrival)
            .bind(entry.estimated_departure)
            .bind(entry.original_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn transition_status(&self, entry_id: Uuid, from: VisitStatus, to: VisitStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_visits SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(entry_id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn vendors_with_pending(&self, date: NaiveDate) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT vendor_id
            FROM scheduled_visits
            WHERE scheduled_date = $1 AND status = 'pending'
            ORDER BY vendor_id
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

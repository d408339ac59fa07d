//! Client directory queries

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::services::ports::ClientDirectory;
use crate::types::{Coordinates, Segment, VisitObligation, VisitOutcome};

const CLIENT_COLUMNS: &str = r#"
    id, name, lat, lng, commune, segment,
    frequency_days, consecutive_no_sale, last_visit_at, has_competitor
"#;

#[derive(Debug, FromRow)]
struct ClientRow {
    id: Uuid,
    name: String,
    lat: Option<f64>,
    lng: Option<f64>,
    commune: Option<String>,
    segment: String,
    frequency_days: i32,
    consecutive_no_sale: i32,
    last_visit_at: Option<DateTime<Utc>>,
    has_competitor: bool,
}

impl TryFrom<ClientRow> for VisitObligation {
    type Error = anyhow::Error;

    fn try_from(row: ClientRow) -> Result<Self> {
        let segment: Segment = row
            .segment
            .parse()
            .with_context(|| format!("client {}", row.id))?;

        let coordinates = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        };

        Ok(VisitObligation {
            id: row.id,
            name: row.name,
            coordinates,
            commune: row.commune.filter(|c| !c.trim().is_empty()),
            segment,
            frequency_days: row.frequency_days,
            consecutive_no_sale: row.consecutive_no_sale,
            last_visit_at: row.last_visit_at,
            has_competitor: row.has_competitor,
        })
    }
}

pub struct PgClientDirectory {
    pool: PgPool,
}

impl PgClientDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_obligations(rows: Vec<ClientRow>) -> Result<Vec<VisitObligation>> {
    rows.into_iter().map(VisitObligation::try_from).collect()
}

#[async_trait]
impl ClientDirectory for PgClientDirectory {
    async fn list_for_vendor(&self, vendor_id: Uuid) -> Result<Vec<VisitObligation>> {
        let query = format!(
            "SELECT {} FROM clients WHERE vendor_id = $1 ORDER BY created_at, id",
            CLIENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ClientRow>(&query)
            .bind(vendor_id)
            .fetch_all(&self.pool)
            .await?;

        into_obligations(rows)
    }

    async fn list_all(&self) -> Result<Vec<VisitObligation>> {
        let query = format!("SELECT {} FROM clients ORDER BY created_at, id", CLIENT_COLUMNS);
        let rows = sqlx::query_as::<_, ClientRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        into_obligations(rows)
    }

    async fn record_visit(
        &self,
        client_id: Uuid,
        outcome: VisitOutcome,
        visited_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET consecutive_no_sale = CASE WHEN $2 THEN 0 ELSE consecutive_no_sale + 1 END,
                last_visit_at = $3
            WHERE id = $1
            "#,
        )
        .bind(client_id)
        .bind(outcome.is_sale())
        .bind(visited_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("client {} not found", client_id);
        }
        Ok(())
    }

    async fn update_frequency(&self, client_id: Uuid, frequency_days: i32) -> Result<()> {
        sqlx::query("UPDATE clients SET frequency_days = $2 WHERE id = $1")
            .bind(client_id)
            .bind(frequency_days)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(segment: &str, lat: Option<f64>, lng: Option<f64>) -> ClientRow {
        ClientRow {
            id: Uuid::from_u128(1),
            name: "Almacén Don Pepe".to_string(),
            lat,
            lng,
            commune: Some("  ".to_string()),
            segment: segment.to_string(),
            frequency_days: 30,
            consecutive_no_sale: 0,
            last_visit_at: None,
            has_competitor: false,
        }
    }

    #[test]
    fn test_row_to_obligation() {
        let obligation = VisitObligation::try_from(row("80-20", Some(-33.45), Some(-70.66))).unwrap();
        assert_eq!(obligation.segment, Segment::KeyAccount);
        assert_eq!(obligation.coordinates, Some(Coordinates::new(-33.45, -70.66)));
        assert!(obligation.commune.is_none());
    }

    #[test]
    fn test_half_coordinates_mean_unlocated() {
        let obligation = VisitObligation::try_from(row("L", Some(-33.45), None)).unwrap();
        assert!(!obligation.is_located());
    }

    #[test]
    fn test_unknown_segment_rejected() {
        assert!(VisitObligation::try_from(row("VIP", None, None)).is_err());
    }
}

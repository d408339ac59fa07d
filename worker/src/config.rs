//! Configuration management

use std::str::FromStr;
use std::time::Duration;

use anyhow::{self, Context, Result};
use chrono::NaiveTime;

use crate::services::auto_reschedule::AutoRescheduleConfig;
use crate::services::notifications::NotificationConfig;
use crate::services::planning::PlannerParams;
use crate::types::VehicleFuelProfile;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string (needed by `serve` and `migrate`)
    pub database_url: Option<String>,

    /// Directory for the rolling log file
    pub logs_dir: String,

    pub planner: PlannerParams,
    pub fuel: VehicleFuelProfile,
    pub auto_reschedule: AutoRescheduleConfig,
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let nats_url = get("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());
        let logs_dir = get("LOGS_DIR").unwrap_or_else(|| "../logs".to_string());

        let mut planner = PlannerParams::default();
        if let Some(v) = get("PLANNER_WORKDAY_START") {
            planner.workday_start = parse_time("PLANNER_WORKDAY_START", &v)?;
        }
        if let Some(v) = get("PLANNER_WORKDAY_END") {
            planner.workday_end = parse_time("PLANNER_WORKDAY_END", &v)?;
        }
        if let Some(v) = get("PLANNER_MAX_CLUSTER_SIZE") {
            planner.max_cluster_size = parse_value("PLANNER_MAX_CLUSTER_SIZE", &v)?;
        }
        if let Some(v) = get("PLANNER_MAX_VISITS_PER_DAY") {
            planner.max_visits_per_day = parse_value("PLANNER_MAX_VISITS_PER_DAY", &v)?;
        }
        if let Some(v) = get("PLANNER_AVERAGE_SPEED_KMH") {
            planner.average_speed_kmh = parse_value("PLANNER_AVERAGE_SPEED_KMH", &v)?;
        }
        if let Some(v) = get("PLANNER_VISIT_MINUTES") {
            planner.visit_duration_minutes = parse_value("PLANNER_VISIT_MINUTES", &v)?;
        }
        if let Some(v) = get("PLANNER_MAX_RANGE_DAYS") {
            planner.max_range_days = parse_value("PLANNER_MAX_RANGE_DAYS", &v)?;
        }
        if let Some(v) = get("PLANNER_MULTIPLIER_ORDER") {
            planner.multiplier_order = parse_value("PLANNER_MULTIPLIER_ORDER", &v)?;
        }
        if let Some(v) = get("PLANNER_SEED_STRATEGY") {
            planner.seed_strategy = parse_value("PLANNER_SEED_STRATEGY", &v)?;
        }
        planner.validate().context("Invalid planner configuration")?;

        let mut fuel = VehicleFuelProfile::default();
        if let Some(v) = get("FUEL_EFFICIENCY_KML") {
            fuel.efficiency_kml = parse_value("FUEL_EFFICIENCY_KML", &v)?;
        }
        if let Some(v) = get("FUEL_PRICE_PER_LITER") {
            fuel.price_per_liter = parse_value("FUEL_PRICE_PER_LITER", &v)?;
        }
        if let Some(v) = get("FUEL_TYPE") {
            fuel.fuel_type = v;
        }
        if fuel.efficiency_kml <= 0.0 || fuel.price_per_liter < 0.0 {
            anyhow::bail!(
                "Fuel efficiency must be positive and price non-negative (got {} km/l, {} per liter)",
                fuel.efficiency_kml,
                fuel.price_per_liter
            );
        }

        let mut auto_reschedule = AutoRescheduleConfig::default();
        if let Some(v) = get("AUTO_RESCHEDULE_ENABLED") {
            auto_reschedule.enabled = parse_flag("AUTO_RESCHEDULE_ENABLED", &v)?;
        }
        if let Some(v) = get("AUTO_RESCHEDULE_AT") {
            auto_reschedule.at = parse_time("AUTO_RESCHEDULE_AT", &v)?;
        }
        if let Some(v) = get("AUTO_RESCHEDULE_INTERVAL_MINUTES") {
            let minutes: u64 = parse_value("AUTO_RESCHEDULE_INTERVAL_MINUTES", &v)?;
            if minutes == 0 {
                anyhow::bail!("AUTO_RESCHEDULE_INTERVAL_MINUTES must be at least 1");
            }
            auto_reschedule.interval = Duration::from_secs(minutes * 60);
        }

        let mut notifications = NotificationConfig::default();
        if let Some(v) = get("NOTIFY_SUBJECT_PREFIX") {
            notifications.subject_prefix = v;
        }
        if let Some(v) = get("NOTIFY_ROLES") {
            notifications.roles = v
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }

        Ok(Self {
            nats_url,
            nats_user: get("NATS_USER"),
            nats_password: get("NATS_PASSWORD"),
            database_url: get("DATABASE_URL"),
            logs_dir,
            planner,
            fuel,
            auto_reschedule,
            notifications,
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
}

fn parse_time(key: &str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .with_context(|| format!("Invalid time for {} (expected HH:MM): {:?}", key, raw))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Invalid flag for {}: {:?}", key, raw),
    }
}

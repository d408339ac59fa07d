//! Client (visit obligation) types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Client segmentation tier, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Key accounts
    #[serde(rename = "80-20")]
    KeyAccount,
    /// Existing buyers
    #[serde(rename = "L")]
    Loyal,
    /// New or unclassified
    #[serde(rename = "N")]
    New,
}

impl Segment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Segment::KeyAccount => "80-20",
            Segment::Loyal => "L",
            Segment::New => "N",
        }
    }

    /// Sort rank used by the clusterer (lower goes first)
    pub const fn priority(self) -> u8 {
        match self {
            Segment::KeyAccount => 0,
            Segment::Loyal => 1,
            Segment::New => 2,
        }
    }
}

impl Default for Segment {
    fn default() -> Self {
        Segment::New
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "80-20" | "80/20" => Ok(Segment::KeyAccount),
            "L" | "l" => Ok(Segment::Loyal),
            "N" | "n" | "" => Ok(Segment::New),
            other => anyhow::bail!("unknown segment: {}", other),
        }
    }
}

/// A client the vendor must visit periodically.
///
/// Owned by the client directory; the planner only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitObligation {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub commune: Option<String>,
    #[serde(default)]
    pub segment: Segment,
    /// Target revisit interval in days
    #[serde(default = "default_frequency_days")]
    pub frequency_days: i32,
    #[serde(default)]
    pub consecutive_no_sale: i32,
    #[serde(default)]
    pub last_visit_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_competitor: bool,
}

fn default_frequency_days() -> i32 {
    crate::defaults::BASE_FREQUENCY_DAYS
}

impl VisitObligation {
    pub fn is_located(&self) -> bool {
        self.coordinates.is_some()
    }

    /// Stand-in for a scheduled client no longer in the directory
    pub fn unlisted(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            coordinates: None,
            commune: None,
            segment: Segment::default(),
            frequency_days: default_frequency_days(),
            consecutive_no_sale: 0,
            last_visit_at: None,
            has_competitor: false,
        }
    }
}

/// Outcome reported on check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitOutcome {
    Sale,
    NoSale,
}

impl VisitOutcome {
    pub const fn is_sale(self) -> bool {
        matches!(self, VisitOutcome::Sale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_serde_uses_wire_labels() {
        let json = serde_json::to_string(&Segment::KeyAccount).unwrap();
        assert_eq!(json, "\"80-20\"");

        let parsed: Segment = serde_json::from_str("\"L\"").unwrap();
        assert_eq!(parsed, Segment::Loyal);
    }

    #[test]
    fn test_segment_priority_order() {
        let mut tiers = vec![Segment::New, Segment::KeyAccount, Segment::Loyal];
        tiers.sort_by_key(|s| s.priority());
        assert_eq!(tiers, vec![Segment::KeyAccount, Segment::Loyal, Segment::New]);
    }

    #[test]
    fn test_segment_from_str() {
        assert_eq!("80-20".parse::<Segment>().unwrap(), Segment::KeyAccount);
        assert_eq!("".parse::<Segment>().unwrap(), Segment::New);
        assert!("X".parse::<Segment>().is_err());
    }

    #[test]
    fn test_obligation_minimal_json() {
        let json = r#"{"id": "123e4567-e89b-12d3-a456-426614174000"}"#;
        let obligation: VisitObligation = serde_json::from_str(json).unwrap();

        assert_eq!(obligation.segment, Segment::New);
        assert_eq!(obligation.frequency_days, 30);
        assert!(!obligation.is_located());
        assert!(obligation.last_visit_at.is_none());
    }
}

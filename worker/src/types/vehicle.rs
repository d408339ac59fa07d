//! Vehicle fuel types

use serde::{Deserialize, Serialize};

use super::Coordinates;

/// Fuel profile used to cost planned distance.
///
/// Changed only through the fuel configuration service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFuelProfile {
    /// Kilometers per liter
    pub efficiency_kml: f64,
    /// Price per liter
    pub price_per_liter: f64,
    #[serde(default)]
    pub fuel_type: String,
}

impl Default for VehicleFuelProfile {
    fn default() -> Self {
        Self {
            efficiency_kml: crate::defaults::DEFAULT_FUEL_EFFICIENCY_KML,
            price_per_liter: crate::defaults::DEFAULT_FUEL_PRICE_PER_LITER,
            fuel_type: crate::defaults::DEFAULT_FUEL_TYPE.to_string(),
        }
    }
}

/// Request to update the fuel profile (fields left out keep their value)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFuelProfileRequest {
    pub efficiency_kml: Option<f64>,
    pub price_per_liter: Option<f64>,
    pub fuel_type: Option<String>,
}

/// Fuel consumption estimate for a distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelEstimate {
    /// Rounded to 0.1 km
    pub distance_km: f64,
    /// Rounded to 0.01 l
    pub liters_used: f64,
    /// Rounded to whole currency units
    pub cost: i64,
    pub fuel_efficiency: f64,
    pub fuel_price: f64,
    pub fuel_type: String,
}

/// Request to cost the straight-line trip between two points
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceCostRequest {
    pub from: Coordinates,
    pub to: Coordinates,
}

/// Request to cost a finished day from odometer readings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdometerCostRequest {
    pub start_km: f64,
    pub end_km: f64,
    /// Vehicle-specific efficiency; the profile default is used when absent
    #[serde(default)]
    pub fuel_efficiency_kml: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = VehicleFuelProfile::default();
        assert_eq!(profile.efficiency_kml, 10.0);
        assert_eq!(profile.price_per_liter, 1150.0);
        assert_eq!(profile.fuel_type, "93 octanos");
    }

    #[test]
    fn test_update_request_partial() {
        let json = r#"{"pricePerLiter": 1200}"#;
        let request: UpdateFuelProfileRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.price_per_liter, Some(1200.0));
        assert!(request.efficiency_kml.is_none());
    }
}

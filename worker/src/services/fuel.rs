//! Fuel cost estimation and the fuel profile service

use parking_lot::RwLock;
use tracing::info;

use crate::error::{PlannerError, PlannerResult};
use crate::services::geo::haversine_distance;
use crate::types::{
    DistanceCostRequest, FuelEstimate, OdometerCostRequest, UpdateFuelProfileRequest,
    VehicleFuelProfile,
};

/// Convert a distance into fuel use and cost.
///
/// `efficiency_kml` overrides the profile's efficiency (a vehicle's own
/// figure). Rounding is applied to the reported figures only: distance to
/// 0.1 km, liters to 0.01, cost to whole units.
pub fn estimate_fuel(
    distance_km: f64,
    efficiency_kml: Option<f64>,
    profile: &VehicleFuelProfile,
) -> FuelEstimate {
    let efficiency = efficiency_kml
        .filter(|e| *e > 0.0)
        .unwrap_or(profile.efficiency_kml);
    let liters = if efficiency > 0.0 { distance_km / efficiency } else { 0.0 };
    let cost = liters * profile.price_per_liter;

    FuelEstimate {
        distance_km: round_to(distance_km, 10.0),
        liters_used: round_to(liters, 100.0),
        cost: cost.round() as i64,
        fuel_efficiency: efficiency,
        fuel_price: profile.price_per_liter,
        fuel_type: profile.fuel_type.clone(),
    }
}

/// Straight-line trip between two points, costed
pub fn distance_cost(request: &DistanceCostRequest, profile: &VehicleFuelProfile) -> FuelEstimate {
    estimate_fuel(haversine_distance(&request.from, &request.to), None, profile)
}

/// Cost a finished day from odometer readings
pub fn odometer_cost(
    request: &OdometerCostRequest,
    profile: &VehicleFuelProfile,
) -> PlannerResult<FuelEstimate> {
    let traveled = request.end_km - request.start_km;
    if !traveled.is_finite() || traveled < 0.0 {
        return Err(PlannerError::InvalidRequest(format!(
            "end odometer {} is below start {}",
            request.end_km, request.start_km
        )));
    }
    Ok(estimate_fuel(traveled, request.fuel_efficiency_kml, profile))
}

fn round_to(value: f64, factor: f64) -> f64 {
    (value * factor).round() / factor
}

/// Owner of the current fuel profile.
///
/// Shared through the application context; readers get a snapshot.
pub struct FuelConfigService {
    profile: RwLock<VehicleFuelProfile>,
}

impl FuelConfigService {
    pub fn new(profile: VehicleFuelProfile) -> Self {
        Self {
            profile: RwLock::new(profile),
        }
    }

    pub fn current(&self) -> VehicleFuelProfile {
        self.profile.read().clone()
    }

    /// Apply a partial update, returning the new profile
    pub fn update(&self, request: UpdateFuelProfileRequest) -> PlannerResult<VehicleFuelProfile> {
        if let Some(efficiency) = request.efficiency_kml {
            if efficiency.is_nan() || efficiency <= 0.0 {
                return Err(PlannerError::InvalidRequest(
                    "fuel efficiency must be positive".to_string(),
                ));
            }
        }
        if let Some(price) = request.price_per_liter {
            if price.is_nan() || price < 0.0 {
                return Err(PlannerError::InvalidRequest(
                    "fuel price cannot be negative".to_string(),
                ));
            }
        }

        let mut profile = self.profile.write();
        if let Some(efficiency) = request.efficiency_kml {
            profile.efficiency_kml = efficiency;
        }
        if let Some(price) = request.price_per_liter {
            profile.price_per_liter = price;
        }
        if let Some(fuel_type) = request.fuel_type {
            profile.fuel_type = fuel_type;
        }

        info!(
            "Fuel profile updated: {} km/l, {} per liter ({})",
            profile.efficiency_kml, profile.price_per_liter, profile.fuel_type
        );
        Ok(profile.clone())
    }
}

impl Default for FuelConfigService {
    fn default() -> Self {
        Self::new(VehicleFuelProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;

    #[test]
    fn test_estimate_rounding() {
        let estimate = estimate_fuel(23.456, None, &VehicleFuelProfile::default());

        assert_eq!(estimate.distance_km, 23.5);
        assert_eq!(estimate.liters_used, 2.35);
        // 2.3456 l * 1150 = 2697.44
        assert_eq!(estimate.cost, 2697);
        assert_eq!(estimate.fuel_type, "93 octanos");
    }

    #[test]
    fn test_vehicle_efficiency_override() {
        let estimate = estimate_fuel(100.0, Some(12.5), &VehicleFuelProfile::default());
        assert_eq!(estimate.liters_used, 8.0);
        assert_eq!(estimate.cost, 9200);
        assert_eq!(estimate.fuel_efficiency, 12.5);

        let ignored = estimate_fuel(100.0, Some(0.0), &VehicleFuelProfile::default());
        assert_eq!(ignored.fuel_efficiency, 10.0);
    }

    #[test]
    fn test_odometer_cost() {
        let request = OdometerCostRequest {
            start_km: 10_000.0,
            end_km: 10_085.0,
            fuel_efficiency_kml: None,
        };
        let estimate = odometer_cost(&request, &VehicleFuelProfile::default()).unwrap();
        assert_eq!(estimate.distance_km, 85.0);
        assert_eq!(estimate.cost, 9775);

        let backwards = OdometerCostRequest {
            start_km: 100.0,
            end_km: 90.0,
            fuel_efficiency_kml: None,
        };
        let err = odometer_cost(&backwards, &VehicleFuelProfile::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_distance_cost_same_point_is_free() {
        let point = Coordinates { lat: -33.45, lng: -70.66 };
        let request = DistanceCostRequest { from: point, to: point };
        let estimate = distance_cost(&request, &VehicleFuelProfile::default());
        assert_eq!(estimate.cost, 0);
        assert_eq!(estimate.distance_km, 0.0);
    }

    #[test]
    fn test_config_service_update() {
        let service = FuelConfigService::default();

        let updated = service
            .update(UpdateFuelProfileRequest {
                price_per_liter: Some(1290.0),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.price_per_liter, 1290.0);
        assert_eq!(updated.efficiency_kml, 10.0);
        assert_eq!(service.current(), updated);
    }

    #[test]
    fn test_config_service_rejects_bad_values() {
        let service = FuelConfigService::default();

        assert!(service
            .update(UpdateFuelProfileRequest {
                efficiency_kml: Some(0.0),
                price_per_liter: Some(900.0),
                ..Default::default()
            })
            .is_err());
        assert!(service
            .update(UpdateFuelProfileRequest {
                price_per_liter: Some(-1.0),
                ..Default::default()
            })
            .is_err());
        // Nothing applied on rejection
        assert_eq!(service.current(), VehicleFuelProfile::default());
    }
}

//! Fuel profile and cost handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};

use super::serve;
use crate::error::PlannerError;
use crate::services::fuel::{distance_cost, odometer_cost};
use crate::services::scheduler::ScheduleService;
use crate::types::{DistanceCostRequest, EmptyPayload, OdometerCostRequest, UpdateFuelProfileRequest};

pub async fn handle_get_config(client: Client, subscriber: Subscriber, service: Arc<ScheduleService>) -> Result<()> {
    serve(client, subscriber, "fuel.config.get", move |_: EmptyPayload| {
        let profile = service.fuel().current();
        async move { Ok::<_, PlannerError>(profile) }
    })
    .await
}

pub async fn handle_update_config(
    client: Client,
    subscriber: Subscriber,
    service: Arc<ScheduleService>,
) -> Result<()> {
    serve(client, subscriber, "fuel.config.update", move |request: UpdateFuelProfileRequest| {
        let result = service.fuel().update(request);
        async move { result }
    })
    .await
}

pub async fn handle_estimate(client: Client, subscriber: Subscriber, service: Arc<ScheduleService>) -> Result<()> {
    serve(client, subscriber, "fuel.estimate", move |request: DistanceCostRequest| {
        let estimate = distance_cost(&request, &service.fuel().current());
        async move { Ok::<_, PlannerError>(estimate) }
    })
    .await
}

pub async fn handle_odometer(client: Client, subscriber: Subscriber, service: Arc<ScheduleService>) -> Result<()> {
    serve(client, subscriber, "fuel.odometer", move |request: OdometerCostRequest| {
        let result = odometer_cost(&request, &service.fuel().current());
        async move { result }
    })
    .await
}

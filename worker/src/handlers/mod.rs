//! NATS message handlers

pub mod fuel;
pub mod ping;
pub mod schedule;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{PlannerError, PlannerResult};
use crate::services::scheduler::ScheduleService;
use crate::types::{ErrorResponse, Request, SuccessResponse};

/// Parse a request envelope, or build the error to send back
pub(crate) fn decode_request<T: DeserializeOwned>(payload: &[u8]) -> std::result::Result<Request<T>, ErrorResponse> {
    serde_json::from_slice(payload)
        .map_err(|e| ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string()))
}

pub(crate) fn error_response(request_id: Uuid, err: &PlannerError) -> ErrorResponse {
    ErrorResponse::new(request_id, err.code(), err.to_string())
}

/// Request/reply loop for one subject.
///
/// Each message carries a `Request<T>`; `op` runs on the payload and its
/// result goes back as a `SuccessResponse` or an `ErrorResponse` with the
/// error's code.
pub(crate) async fn serve<T, R, F, Fut>(
    client: Client,
    mut subscriber: Subscriber,
    name: &'static str,
    op: F,
) -> Result<()>
where
    T: DeserializeOwned,
    R: Serialize,
    F: Fn(T) -> Fut,
    Fut: Future<Output = PlannerResult<R>>,
{
    while let Some(msg) = subscriber.next().await {
        debug!("Received {} message", name);

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("{} message without reply subject", name);
                continue;
            }
        };

        let request: Request<T> = match decode_request(&msg.payload) {
            Ok(req) => req,
            Err(error) => {
                error!("Failed to parse {} request: {}", name, error.error.message);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let request_id = request.id;
        let bytes = match op(request.payload).await {
            Ok(payload) => serde_json::to_vec(&SuccessResponse::new(request_id, payload))?,
            Err(e) => {
                match e {
                    PlannerError::Collaborator(ref inner) => error!("{} failed: {:#}", name, inner),
                    ref other => warn!("{} rejected: {}", name, other),
                }
                serde_json::to_vec(&error_response(request_id, &e))?
            }
        };

        if let Err(e) = client.publish(reply, bytes.into()).await {
            error!("Failed to send {} reply: {}", name, e);
        }
    }

    Ok(())
}

async fn subscribe(client: &Client, subject: &'static str) -> Result<Subscriber> {
    let subscriber = client
        .subscribe(subject)
        .await
        .with_context(|| format!("Failed to subscribe to {}", subject))?;
    info!("Subscribed to {}", subject);
    Ok(subscriber)
}

/// Start all message handlers and wait until one of them stops
pub async fn start_handlers(client: Client, service: Arc<ScheduleService>) -> Result<()> {
    info!("Starting message handlers...");

    let mut tasks: Vec<(&'static str, JoinHandle<Result<()>>)> = Vec::new();

    let sub = subscribe(&client, "leker.ping").await?;
    tasks.push(("Ping", tokio::spawn(ping::handle_ping(client.clone(), sub))));

    let sub = subscribe(&client, "leker.schedule.generate").await?;
    tasks.push((
        "Schedule generate",
        tokio::spawn(schedule::handle_generate(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.schedule.day").await?;
    tasks.push((
        "Schedule day",
        tokio::spawn(schedule::handle_schedule_day(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.schedule.multi_day").await?;
    tasks.push((
        "Schedule multi-day",
        tokio::spawn(schedule::handle_schedule_multi_day(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.schedule.reschedule").await?;
    tasks.push((
        "Reschedule incomplete",
        tokio::spawn(schedule::handle_reschedule_incomplete(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.schedule.auto_reschedule").await?;
    tasks.push((
        "Auto-reschedule",
        tokio::spawn(schedule::handle_auto_reschedule(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.schedule.entry.skip").await?;
    tasks.push((
        "Entry skip",
        tokio::spawn(schedule::handle_skip_entry(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.schedule.entry.reschedule").await?;
    tasks.push((
        "Entry reschedule",
        tokio::spawn(schedule::handle_reschedule_entry(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.schedule.entry.complete").await?;
    tasks.push((
        "Entry complete",
        tokio::spawn(schedule::handle_complete_visit(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.frequency.recompute").await?;
    tasks.push((
        "Frequency recompute",
        tokio::spawn(schedule::handle_recompute_frequencies(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.route.optimize").await?;
    tasks.push((
        "Route optimize",
        tokio::spawn(schedule::handle_optimize_route(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.fuel.config.get").await?;
    tasks.push((
        "Fuel config get",
        tokio::spawn(fuel::handle_get_config(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.fuel.config.update").await?;
    tasks.push((
        "Fuel config update",
        tokio::spawn(fuel::handle_update_config(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.fuel.estimate").await?;
    tasks.push((
        "Fuel estimate",
        tokio::spawn(fuel::handle_estimate(client.clone(), sub, service.clone())),
    ));

    let sub = subscribe(&client, "leker.fuel.odometer").await?;
    tasks.push((
        "Fuel odometer",
        tokio::spawn(fuel::handle_odometer(client.clone(), sub, service.clone())),
    ));

    info!("All {} handlers started", tasks.len());

    let (names, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let (result, index, _) = futures::future::select_all(handles).await;
    error!("{} handler finished: {:?}", names[index], result);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerateScheduleRequest;

    #[test]
    fn test_decode_request_envelope() {
        let json = br#"{
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "timestamp": "2026-03-02T10:00:00Z",
            "payload": {
                "vendorId": "123e4567-e89b-12d3-a456-426614174001",
                "startDate": "2026-03-02",
                "endDate": "2026-03-06"
            }
        }"#;

        let request: Request<GenerateScheduleRequest> = decode_request(json).unwrap();
        assert_eq!(request.payload.end_date.to_string(), "2026-03-06");
    }

    #[test]
    fn test_decode_request_failure_is_invalid_request() {
        let error = decode_request::<GenerateScheduleRequest>(b"{\"payload\": 1}").unwrap_err();
        assert_eq!(error.id, Uuid::nil());
        assert_eq!(error.error.code, "INVALID_REQUEST");
    }

    #[test]
    fn test_error_response_uses_planner_code() {
        let id = Uuid::new_v4();
        let response = error_response(id, &PlannerError::EmptyDateRange);
        assert_eq!(response.id, id);
        assert_eq!(response.error.code, "EMPTY_DATE_RANGE");

        let response = error_response(id, &PlannerError::EntryNotFound(id));
        assert_eq!(response.error.code, "NOT_FOUND");
    }
}

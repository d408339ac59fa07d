//! Scheduling message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};

use super::serve;
use crate::services::scheduler::ScheduleService;
use crate::types::AutoRescheduleRequest;

pub async fn handle_generate(client: Client, subscriber: Subscriber, service: Arc<ScheduleService>) -> Result<()> {
    serve(client, subscriber, "schedule.generate", move |request| {
        let service = service.clone();
        async move { service.generate(request).await }
    })
    .await
}

pub async fn handle_schedule_day(client: Client, subscriber: Subscriber, service: Arc<ScheduleService>) -> Result<()> {
    serve(client, subscriber, "schedule.day", move |request| {
        let service = service.clone();
        async move { service.schedule_one_day(request).await }
    })
    .await
}

pub async fn handle_schedule_multi_day(
    client: Client,
    subscriber: Subscriber,
    service: Arc<ScheduleService>,
) -> Result<()> {
    serve(client, subscriber, "schedule.multi_day", move |request| {
        let service = service.clone();
        async move { service.schedule_multi_day(request).await }
    })
    .await
}

pub async fn handle_reschedule_incomplete(
    client: Client,
    subscriber: Subscriber,
    service: Arc<ScheduleService>,
) -> Result<()> {
    serve(client, subscriber, "schedule.reschedule", move |request| {
        let service = service.clone();
        async move { service.reschedule_incomplete(request).await }
    })
    .await
}

pub async fn handle_auto_reschedule(
    client: Client,
    subscriber: Subscriber,
    service: Arc<ScheduleService>,
) -> Result<()> {
    serve(client, subscriber, "schedule.auto_reschedule", move |request: AutoRescheduleRequest| {
        let service = service.clone();
        async move {
            let today = request
                .date
                .unwrap_or_else(|| chrono::Local::now().date_naive());
            service.auto_reschedule_end_of_day(today).await
        }
    })
    .await
}

pub async fn handle_skip_entry(client: Client, subscriber: Subscriber, service: Arc<ScheduleService>) -> Result<()> {
    serve(client, subscriber, "schedule.entry.skip", move |request| {
        let service = service.clone();
        async move { service.skip_entry(request).await }
    })
    .await
}

pub async fn handle_reschedule_entry(
    client: Client,
    subscriber: Subscriber,
    service: Arc<ScheduleService>,
) -> Result<()> {
    serve(client, subscriber, "schedule.entry.reschedule", move |request| {
        let service = service.clone();
        async move { service.reschedule_entry(request).await }
    })
    .await
}

pub async fn handle_complete_visit(
    client: Client,
    subscriber: Subscriber,
    service: Arc<ScheduleService>,
) -> Result<()> {
    serve(client, subscriber, "schedule.entry.complete", move |request| {
        let service = service.clone();
        async move { service.complete_visit(request).await }
    })
    .await
}

pub async fn handle_recompute_frequencies(
    client: Client,
    subscriber: Subscriber,
    service: Arc<ScheduleService>,
) -> Result<()> {
    serve(client, subscriber, "frequency.recompute", move |_: crate::types::EmptyPayload| {
        let service = service.clone();
        async move { service.recompute_frequencies().await }
    })
    .await
}

pub async fn handle_optimize_route(
    client: Client,
    subscriber: Subscriber,
    service: Arc<ScheduleService>,
) -> Result<()> {
    serve(client, subscriber, "route.optimize", move |request| {
        let service = service.clone();
        async move { service.optimize_route(request).await }
    })
    .await
}

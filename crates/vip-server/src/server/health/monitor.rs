use super::status::{ServingStatus, StatusBoard};
use crate::server::resolver::Resolver;
use core::time::Duration;
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tonic_health::server::HealthReporter;

/// Background heartbeat publishing the server's serving status.
///
/// Every tick writes the computed status to the [`StatusBoard`] and to the
/// `grpc.health.v1` reporter. By default a tick always yields `Serving`; with
/// `probe_backend` set it asks the resolver first and reports `NotServing`
/// when the backend is unhealthy or does not answer within one interval.
#[derive(Clone)]
pub struct HealthMonitor {
    board: Arc<StatusBoard>,
    reporter: HealthReporter,
    resolver: Arc<dyn Resolver>,
    interval: Duration,
    probe_backend: bool,
}

impl HealthMonitor {
    pub fn new(
        board: Arc<StatusBoard>,
        reporter: HealthReporter,
        resolver: Arc<dyn Resolver>,
        interval: Duration,
        probe_backend: bool,
    ) -> Self {
        Self {
            board,
            reporter,
            resolver,
            interval,
            probe_backend,
        }
    }

    /// Current status of `service`, read from the board without waiting on
    /// any tick.
    pub fn check(&self, service: &str) -> Option<ServingStatus> {
        self.board.check(service)
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    /// Resets the server status to `Unknown`. The health reporter starts out
    /// `Serving`, so this runs before the server accepts connections.
    pub async fn reset(&self) {
        self.publish(ServingStatus::Unknown).await;
    }

    /// Runs one heartbeat and returns the published status.
    pub async fn tick(&self) -> ServingStatus {
        let status = if self.probe_backend {
            self.probe().await
        } else {
            ServingStatus::Serving
        };
        self.publish(status).await;
        status
    }

    /// Ticks every interval until `shutdown` is cancelled, then reports
    /// `NotServing`. The first tick fires immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(interval = ?self.interval, "Health monitor started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.publish(ServingStatus::NotServing).await;
        tracing::debug!("Health monitor stopped");
    }

    async fn probe(&self) -> ServingStatus {
        match timeout(self.interval, self.resolver.health_check()).await {
            Ok(Ok(true)) => ServingStatus::Serving,
            Ok(Ok(false)) => {
                tracing::warn!("Resolver backend reported unhealthy");
                ServingStatus::NotServing
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Resolver health check failed");
                ServingStatus::NotServing
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.interval, "Resolver health check timed out");
                ServingStatus::NotServing
            }
        }
    }

    async fn publish(&self, status: ServingStatus) {
        if self.board.set(StatusBoard::SERVER, status) {
            tracing::info!(?status, "Serving status changed");
        }
        self.reporter
            .set_service_status(StatusBoard::SERVER, status.into())
            .await;
    }
}

//! Server-side building blocks of the VIP lookup service.
//!
//! - [`config`] - CLI/environment options and the validated [`config::ServerConfig`].
//! - [`resolver`] - the [`resolver::Resolver`] capability and its static backend.
//! - [`service`] - the `vip.VIP` gRPC handler.
//! - [`health`] - serving status board and heartbeat.
//! - [`interceptor`] - request logging middleware.
//! - [`lifecycle`] - startup, accept loop and graceful shutdown.
//! - [`telemetry`] - log subscriber and optional OpenTelemetry export.

pub mod config;
pub mod health;
pub mod interceptor;
pub mod lifecycle;
pub mod resolver;
pub mod service;
pub mod telemetry;

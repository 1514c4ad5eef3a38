//! Server lifecycle: bind, register services, serve, drain.
//!
//! [`GrpcServer`] assembles the gRPC router (VIP service, `grpc.health.v1`,
//! optional reflection) behind the [`RequestLogLayer`] interceptor chain and
//! spawns the accept loop together with the [`HealthMonitor`]. The returned
//! [`ServerHandle`] controls shutdown:
//!
//! - [`ServerHandle::drain`] stops accepting, reports `NOT_SERVING` and waits
//!   up to `shutdown_timeout` for in-flight requests before aborting whatever
//!   is left.
//! - [`ServerHandle::abort`] severs everything immediately.

use crate::server::{
    config::ServerConfig,
    health::{HealthMonitor, ServingStatus, StatusBoard},
    interceptor::{MethodMatcher, RequestLogLayer},
    resolver::Resolver,
    service::handler::VipService,
};
use core::time::Duration;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_reflection::server::Builder;
use tower::ServiceBuilder;
use vip_core::{
    Error, Result,
    proto::{FILE_DESCRIPTOR_SET, vip_server::VipServer},
};

/// Owns the configuration and resolver until the server is started.
pub struct GrpcServer {
    config: ServerConfig,
    resolver: Arc<dyn Resolver>,
}

impl GrpcServer {
    pub fn new(config: ServerConfig, resolver: Arc<dyn Resolver>) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts serving on `listener`, or on a fresh listener bound to the
    /// configured address when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BindFailure`] if the address cannot be bound. There is
    /// no retry; callers are expected to treat this as fatal.
    pub async fn start(self, listener: Option<TcpListener>) -> Result<ServerHandle> {
        let listener = match listener {
            Some(listener) => listener,
            None => bind(&self.config.listen_addr()).await?,
        };
        let local_addr = listener.local_addr().map_err(|e| Error::BindFailure {
            addr: self.config.listen_addr(),
            reason: e.to_string(),
        })?;

        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        let monitor = HealthMonitor::new(
            Arc::new(StatusBoard::new()),
            health_reporter,
            Arc::clone(&self.resolver),
            self.config.health_check_interval,
            self.config.probe_backend,
        );
        monitor.reset().await;

        let reflection = if self.config.reflection {
            let reflection = Builder::configure()
                .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
                .register_encoded_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)
                .build_v1()
                .map_err(|e| Error::Transport {
                    context: format!("failed to build reflection service: {e}"),
                })?;
            Some(reflection)
        } else {
            None
        };

        let service = VipService::new(Arc::clone(&self.resolver), abort.clone());

        let router = Server::builder()
            .timeout(self.config.request_timeout)
            .layer(ServiceBuilder::new().layer(RequestLogLayer::new(MethodMatcher::new(
                &self.config.ignored_methods,
            ))))
            .add_service(health_service)
            .add_optional_service(reflection)
            .add_service(build_vip_service(service, self.config.max_message_size));

        tokio::spawn(monitor.clone().run(shutdown.clone()));

        tracing::info!(addr = %local_addr, "listening and serving grpc server");

        let incoming = TcpListenerStream::new(listener);
        let grace = self.config.shutdown_timeout;
        let serve_shutdown = shutdown.clone();
        let serve_abort = abort.clone();

        let server =
            router.serve_with_incoming_shutdown(incoming, serve_shutdown.clone().cancelled_owned());
        let task = tokio::spawn(supervise(server, serve_shutdown, serve_abort, grace));

        Ok(ServerHandle {
            local_addr,
            shutdown,
            abort,
            monitor,
            task,
        })
    }
}

/// Drives the accept loop until it stops on its own, or until `grace` has
/// elapsed after `shutdown` fired. Either way both tokens end up cancelled, so
/// the health monitor stops reporting `SERVING` and in-flight lookups are
/// released.
async fn supervise<F, E>(
    server: F,
    shutdown: CancellationToken,
    abort: CancellationToken,
    grace: Duration,
) -> Result<()>
where
    F: Future<Output = core::result::Result<(), E>>,
    E: core::fmt::Display,
{
    tokio::pin!(server);

    let result = tokio::select! {
        res = &mut server => res.map_err(|e| {
            tracing::error!(error = %e, "grpc server stopped unexpectedly");
            Error::Transport { context: e.to_string() }
        }),
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(?grace, "Graceful drain timed out, aborting in-flight requests");
            Ok(())
        }
    };

    shutdown.cancel();
    abort.cancel();
    result
}

async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::BindFailure {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
}

fn build_vip_service(service: VipService, max_message_size: usize) -> VipServer<VipService> {
    VipServer::new(service)
        .max_decoding_message_size(max_message_size)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

/// Handle to a running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    abort: CancellationToken,
    monitor: HealthMonitor,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    /// Address the server is actually listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that starts a graceful drain when cancelled. Useful for wiring
    /// signal handlers without giving away the handle.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Current serving status of `service` (`""` for the whole server).
    pub fn check(&self, service: &str) -> Option<ServingStatus> {
        self.monitor.check(service)
    }

    /// Stops accepting connections and waits for in-flight requests, bounded
    /// by the configured shutdown timeout.
    pub async fn drain(self) -> Result<()> {
        tracing::info!("Shutdown requested, draining in-flight requests");
        self.shutdown.cancel();
        self.wait().await
    }

    /// Stops immediately. In-flight lookups fail with `UNAVAILABLE`.
    pub fn abort(self) {
        tracing::info!("Aborting server");
        self.abort.cancel();
        self.shutdown.cancel();
        self.task.abort();
    }

    /// Waits until the server stops on its own or through its shutdown token.
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(Ok(())) => {
                tracing::info!("Service shut down successfully");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(e) => Err(Error::Transport {
                context: format!("server task failed: {e}"),
            }),
        }
    }
}

//! gRPC service implementation for VIP membership lookups.
//!
//! This module defines [`VipService`], the concrete implementation of the
//! [`Vip`] gRPC service defined in `vip.proto`. It validates requests, makes a
//! single call to the configured [`Resolver`] and maps the outcome to either a
//! response or a typed `Status`.
//!
//! ## Responsibilities
//!
//! - Reject empty identifiers with `INVALID_ARGUMENT` before touching the
//!   resolver.
//! - Wrap resolver failures into an opaque `INTERNAL` status, logging the
//!   cause server-side.
//! - Abandon the lookup if the server is force-stopped.
//!
//! Per-request logging lives in the interceptor chain, not here.

use crate::server::{
    resolver::Resolver,
    telemetry::{
        increment_lookup_errors, increment_requests, increment_vip_hits, record_lookup_duration,
    },
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use vip_core::{
    Error,
    proto::{GetIsVipByIdRequest, GetIsVipByIdResponse, vip_server::Vip},
};

/// gRPC service answering `GetIsVIPByID`.
///
/// Cheap to clone: the resolver is shared behind an `Arc` and the abort token
/// is reference counted.
#[derive(Clone)]
pub struct VipService {
    resolver: Arc<dyn Resolver>,
    abort: CancellationToken,
}

impl VipService {
    /// Creates a service backed by `resolver`. Cancelling `abort` makes every
    /// in-flight lookup return `UNAVAILABLE` immediately.
    pub fn new(resolver: Arc<dyn Resolver>, abort: CancellationToken) -> Self {
        Self { resolver, abort }
    }

    async fn lookup(&self, vip_id: String) -> Result<GetIsVipByIdResponse, Error> {
        increment_requests();
        if vip_id.is_empty() {
            increment_lookup_errors("invalid_argument");
            return Err(Error::invalid_argument("vipID is required"));
        }

        let start = std::time::Instant::now();

        let resolved = tokio::select! {
            biased;
            () = self.abort.cancelled() => {
                increment_lookup_errors("aborted");
                return Err(Error::ServiceShutdown);
            }
            resolved = self.resolver.resolve(&vip_id) => resolved,
        };
        record_lookup_duration(start.elapsed().as_secs_f64() * 1000.0);

        let record = match resolved {
            Ok(record) => record,
            Err(Error::InvalidArgument { reason }) => {
                increment_lookup_errors("invalid_argument");
                return Err(Error::InvalidArgument { reason });
            }
            Err(e) => {
                tracing::error!(vip_id = %vip_id, error = %e, "failed to retrieve the vip");
                increment_lookup_errors("lookup_failure");
                return Err(Error::lookup_failure(vip_id, e));
            }
        };

        if record.vip_id != vip_id {
            tracing::error!(
                vip_id = %vip_id,
                resolved = %record.vip_id,
                "resolver returned a record for another identifier"
            );
            increment_lookup_errors("lookup_failure");
            return Err(Error::lookup_failure(
                vip_id,
                format!("resolver answered for {:?}", record.vip_id),
            ));
        }

        if record.is_vip {
            increment_vip_hits();
        }

        Ok(record.into())
    }
}

#[tonic::async_trait]
impl Vip for VipService {
    /// Reports whether `vip_id` is a VIP.
    ///
    /// Exactly one resolver call per valid request; no retries, no caching.
    #[tracing::instrument(skip_all, fields(vip_id = %req.get_ref().vip_id))]
    async fn get_is_vip_by_id(
        &self,
        req: Request<GetIsVipByIdRequest>,
    ) -> Result<Response<GetIsVipByIdResponse>, Status> {
        let vip_id = req.into_inner().vip_id;
        let response = self.lookup(vip_id).await?;
        Ok(Response::new(response))
    }
}

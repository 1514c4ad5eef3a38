//! Error types for the VIP lookup service.
//!
//! This module defines the central `Error` enum shared by every layer of the
//! server. It implements `From<Error>` for `tonic::Status` so handlers can
//! propagate failures to clients with `?` and still hand back the right gRPC
//! code.
//!
//! ## Error Cases
//! - `InvalidArgument`: The request was malformed (e.g. an empty `vip_id`).
//!   Client error, never retried by the server.
//! - `LookupFailure`: The resolver backend failed. Logged with its cause and
//!   surfaced to the caller as an opaque `Internal` status.
//! - `BindFailure`: The server could not acquire its listening socket. Fatal.
//! - `Transport`: The gRPC transport stopped with an error.
//! - `ServiceShutdown`: A request was aborted because the server is stopping.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Message returned to clients for any backend failure. The underlying cause
/// stays in the server logs.
pub const LOOKUP_FAILURE_MESSAGE: &str = "failed to retrieve the vip";

/// Unified error type for the VIP lookup service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The client request was invalid.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The resolver backend could not answer for `vip_id`.
    #[error("Lookup of {vip_id:?} failed: {reason}")]
    LookupFailure { vip_id: String, reason: String },

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {reason}")]
    BindFailure { addr: String, reason: String },

    /// The gRPC transport terminated with an error.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Shorthand for an [`Error::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`Error::LookupFailure`] on `vip_id`.
    pub fn lookup_failure(vip_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::LookupFailure {
            vip_id: vip_id.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument { reason } => Status::invalid_argument(reason),
            Error::LookupFailure { .. } => Status::internal(LOOKUP_FAILURE_MESSAGE),
            Error::BindFailure { addr, .. } => {
                Status::unavailable(format!("Server could not bind {addr}"))
            }
            Error::Transport { context } => Status::unavailable(context),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn invalid_argument_keeps_reason() {
        let status = Status::from(Error::invalid_argument("vipID is required"));
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "vipID is required");
    }

    #[test]
    fn lookup_failure_hides_backend_details() {
        let err = Error::lookup_failure("Shahar", "connection refused (10.0.0.7:27017)");
        assert!(err.to_string().contains("connection refused"));

        let status = Status::from(err);
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), LOOKUP_FAILURE_MESSAGE);
    }

    #[test]
    fn shutdown_is_unavailable() {
        assert_eq!(
            Status::from(Error::ServiceShutdown).code(),
            Code::Unavailable
        );
    }
}

//! Types shared by the VIP server and its clients.
//!
//! - [`proto`] - generated gRPC bindings for the `vip` package.
//! - [`types`] - the [`VipRecord`](types::VipRecord) domain type.
//! - [`error`] - the unified [`Error`] enum and its `tonic::Status` mapping.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// Generated client, server and message types for `proto/vip.proto`.
pub mod proto {
    tonic::include_proto!("vip");

    /// Encoded file descriptor set used to serve gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("vip_descriptor");

    /// Fully qualified path of the lookup method, as seen by interceptors.
    pub const GET_IS_VIP_BY_ID_PATH: &str = "/vip.VIP/GetIsVIPByID";
}

//! gRPC service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - `vip.VIP` service entry point (`VipService`).

pub mod handler;

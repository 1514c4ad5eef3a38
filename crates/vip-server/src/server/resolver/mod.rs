//! VIP membership resolution.
//!
//! The request handler only talks to the [`Resolver`] trait, so the backing
//! store can be swapped (the built-in [`StaticResolver`] today, a database
//! tomorrow) without touching the transport layer.
//!
//! ## Contract
//!
//! - `resolve` is total over non-empty identifiers: an unknown identifier is a
//!   successful lookup with `is_vip == false`.
//! - Errors are reserved for infrastructure failures and are reported as
//!   [`Error::LookupFailure`](vip_core::Error::LookupFailure).
//! - Implementations are shared across every in-flight request and must be
//!   safe to call concurrently.

mod static_list;

pub use static_list::StaticResolver;

use vip_core::{Result, types::VipRecord};

/// Read-only lookup capability backing the `GetIsVIPByID` RPC.
#[tonic::async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Looks up `vip_id`. The returned record must carry the same identifier.
    async fn resolve(&self, vip_id: &str) -> Result<VipRecord>;

    /// Reports whether the backend is reachable. Used by the health monitor
    /// when backend probing is enabled.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

//! # VIP lookup domain types
//!
//! [`VipRecord`] is what a resolver hands back to the request handler. It only
//! lives for the duration of a single request and is converted into the wire
//! response right before it leaves the server.

use crate::proto::GetIsVipByIdResponse;

/// Outcome of a single membership lookup.
///
/// `vip_id` always echoes the identifier that was looked up; resolvers must
/// not substitute a different one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VipRecord {
    pub vip_id: String,
    pub is_vip: bool,
}

impl VipRecord {
    pub fn new(vip_id: impl Into<String>, is_vip: bool) -> Self {
        Self {
            vip_id: vip_id.into(),
            is_vip,
        }
    }
}

impl From<VipRecord> for GetIsVipByIdResponse {
    fn from(record: VipRecord) -> Self {
        Self {
            vip_id: record.vip_id,
            is_vip: record.is_vip,
        }
    }
}

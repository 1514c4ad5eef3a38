use super::Resolver;
use crate::server::config::DEFAULT_VIP_IDS;
use std::collections::HashSet;
use vip_core::{Error, Result, types::VipRecord};

/// In-memory resolver over a fixed set of identifiers.
///
/// Matching is exact and case-sensitive. The set is immutable after
/// construction, so lookups need no synchronization.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    vips: HashSet<String>,
}

impl StaticResolver {
    pub fn new<I, S>(vips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vips: vips.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vips.is_empty()
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new(DEFAULT_VIP_IDS)
    }
}

#[tonic::async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, vip_id: &str) -> Result<VipRecord> {
        if vip_id.is_empty() {
            return Err(Error::invalid_argument("vipID is required"));
        }

        Ok(VipRecord::new(vip_id, self.vips.contains(vip_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_identifiers_are_vips() {
        let resolver = StaticResolver::default();
        for id in DEFAULT_VIP_IDS {
            let record = resolver.resolve(id).await.unwrap();
            assert_eq!(record, VipRecord::new(id, true));
        }
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_an_error() {
        let record = StaticResolver::default().resolve("Bob").await.unwrap();
        assert_eq!(record, VipRecord::new("Bob", false));
    }

    #[tokio::test]
    async fn matching_is_case_sensitive() {
        let record = StaticResolver::default().resolve("shahar").await.unwrap();
        assert!(!record.is_vip);
    }

    #[tokio::test]
    async fn rejects_empty_identifier() {
        let err = StaticResolver::default().resolve("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn custom_list_replaces_defaults() {
        let resolver = StaticResolver::new(["Alice"]);
        assert_eq!(resolver.len(), 1);
        assert!(resolver.resolve("Alice").await.unwrap().is_vip);
        assert!(!resolver.resolve("Shahar").await.unwrap().is_vip);
        assert!(resolver.health_check().await.unwrap());
    }
}

use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::time::Instant;

/// Serving status of a service, as understood by `grpc.health.v1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ServingStatus {
    #[default]
    Unknown,
    Serving,
    NotServing,
}

impl From<ServingStatus> for tonic_health::ServingStatus {
    fn from(status: ServingStatus) -> Self {
        match status {
            ServingStatus::Unknown => Self::Unknown,
            ServingStatus::Serving => Self::Serving,
            ServingStatus::NotServing => Self::NotServing,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct StatusEntry {
    status: ServingStatus,
    updated_at: Instant,
}

/// Latest serving status per service name (`""` is the whole server).
///
/// Writers hold the lock for a single map insert; readers never wait on the
/// health monitor's tick logic.
#[derive(Debug)]
pub struct StatusBoard {
    entries: RwLock<HashMap<String, StatusEntry>>,
}

impl StatusBoard {
    /// Server-wide service name.
    pub const SERVER: &'static str = "";

    /// Creates a board where the whole server is `Unknown`.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            Self::SERVER.to_string(),
            StatusEntry {
                status: ServingStatus::Unknown,
                updated_at: Instant::now(),
            },
        );
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Records `status` for `service` and refreshes its timestamp. Returns
    /// `true` if the status changed.
    pub fn set(&self, service: &str, status: ServingStatus) -> bool {
        let entry = StatusEntry {
            status,
            updated_at: Instant::now(),
        };
        let previous = self.entries.write().insert(service.to_string(), entry);
        previous.map(|prev| prev.status) != Some(status)
    }

    /// Current status of `service`, or `None` if the name was never
    /// registered.
    pub fn check(&self, service: &str) -> Option<ServingStatus> {
        self.entries.read().get(service).map(|entry| entry.status)
    }

    /// When `service` was last written.
    pub fn last_updated(&self, service: &str) -> Option<Instant> {
        self.entries.read().get(service).map(|entry| entry.updated_at)
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_starts_unknown() {
        let board = StatusBoard::new();
        assert_eq!(board.check(StatusBoard::SERVER), Some(ServingStatus::Unknown));
    }

    #[test]
    fn unregistered_service_is_not_found() {
        assert_eq!(StatusBoard::new().check("vip.VIP"), None);
    }

    #[test]
    fn repeated_serving_only_refreshes_timestamp() {
        let board = StatusBoard::new();
        assert!(board.set(StatusBoard::SERVER, ServingStatus::Serving));
        let first = board.last_updated(StatusBoard::SERVER).unwrap();

        assert!(!board.set(StatusBoard::SERVER, ServingStatus::Serving));
        let second = board.last_updated(StatusBoard::SERVER).unwrap();

        assert_eq!(board.check(StatusBoard::SERVER), Some(ServingStatus::Serving));
        assert!(second >= first);
    }

    #[test]
    fn converts_to_health_protocol_status() {
        assert!(matches!(
            tonic_health::ServingStatus::from(ServingStatus::NotServing),
            tonic_health::ServingStatus::NotServing
        ));
    }
}

use serde::{Deserialize, Serialize};

use crate::connection_manager::{ConnectionId, Protocol};

/// One tick's message to a single connection. Built fresh every tick, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Milliseconds since the Unix epoch.
    pub ts: u64,
    /// Per-connection counter, starting at 0 at registration.
    pub seq: u64,
    pub protocol: Protocol,
    pub client_id: ConnectionId,
}

impl Payload {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let payload = Payload {
            ts: 1_700_000_000_000,
            seq: 3,
            protocol: Protocol::Sse,
            client_id: ConnectionId(12),
        };
        let value: serde_json::Value = serde_json::from_str(&payload.to_json()).unwrap();
        assert_eq!(value["ts"], 1_700_000_000_000u64);
        assert_eq!(value["seq"], 3);
        assert_eq!(value["protocol"], "sse");
        assert_eq!(value["client_id"], 12);
    }
}

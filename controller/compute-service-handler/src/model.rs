//! Compute service records and the values derived from them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative state of a compute service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Enabled,
    Disabled,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Enabled => f.write_str("enabled"),
            ServiceStatus::Disabled => f.write_str("disabled"),
        }
    }
}

/// Lookup key for the services listing. Not unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceQuery {
    pub host: String,
    pub binary: String,
}

impl ServiceQuery {
    pub fn new(host: impl Into<String>, binary: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            binary: binary.into(),
        }
    }
}

/// Opaque service identifier as issued by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: String,
    pub host: String,
    pub binary: String,
    pub status: ServiceStatus,
    #[serde(default)]
    pub disabled_reason: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

/// Target state for one update call. Serializes as the update request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredState {
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enabled_body_omits_reason() {
        let desired = DesiredState {
            status: ServiceStatus::Enabled,
            disabled_reason: None,
        };
        assert_eq!(
            serde_json::to_value(&desired).unwrap(),
            json!({ "status": "enabled" })
        );
    }

    #[test]
    fn test_record_deserializes_nova_payload() {
        let record: ServiceRecord = serde_json::from_value(json!({
            "id": "4c8a0b2e-1111-2222-3333-444455556666",
            "binary": "nova-compute",
            "host": "node-07",
            "zone": "nova",
            "status": "disabled",
            "state": "up",
            "updated_at": "2024-03-01T10:00:00.000000",
            "disabled_reason": "maintenance",
            "forced_down": false
        }))
        .unwrap();

        assert_eq!(record.status, ServiceStatus::Disabled);
        assert_eq!(record.disabled_reason.as_deref(), Some("maintenance"));
        assert_eq!(record.zone.as_deref(), Some("nova"));
    }
}

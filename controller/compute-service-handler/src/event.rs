//! Health events and the Sensu event payload they are read from

use crate::error::{HandlerError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

/// Binary health verdict of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    NonOk,
}

impl CheckStatus {
    /// Sensu check status: 0 is OK, everything else (warning, critical, unknown) is not.
    pub fn from_exit_status(status: u32) -> Self {
        if status == 0 {
            CheckStatus::Ok
        } else {
            CheckStatus::NonOk
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthEvent {
    pub entity_name: String,
    pub check_status: CheckStatus,
    pub check_summary: String,
    /// Entity annotations overlaid with check annotations.
    pub annotations: HashMap<String, String>,
}

impl HealthEvent {
    pub fn new(
        entity_name: impl Into<String>,
        check_status: CheckStatus,
        check_summary: impl Into<String>,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            check_status,
            check_summary: check_summary.into(),
            annotations: HashMap::new(),
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Parse a Sensu event document.
    pub fn from_sensu_json(payload: &[u8]) -> Result<Self> {
        let event: SensuEvent = serde_json::from_slice(payload)
            .map_err(|e| HandlerError::configuration(format!("Invalid Sensu event: {}", e)))?;
        event.into_health_event()
    }

    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut payload = Vec::new();
        reader
            .read_to_end(&mut payload)
            .map_err(|e| HandlerError::configuration(format!("Failed to read event: {}", e)))?;
        Self::from_sensu_json(&payload)
    }
}

#[derive(Debug, Deserialize)]
struct SensuEvent {
    entity: Option<SensuEntity>,
    check: Option<SensuCheck>,
}

#[derive(Debug, Deserialize)]
struct SensuEntity {
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
struct SensuCheck {
    metadata: ObjectMeta,
    #[serde(default)]
    status: u32,
    #[serde(default)]
    output: String,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    annotations: Option<HashMap<String, String>>,
}

impl SensuEvent {
    fn into_health_event(self) -> Result<HealthEvent> {
        let entity = self
            .entity
            .ok_or_else(|| HandlerError::configuration("Sensu event has no entity"))?;
        let check = self
            .check
            .ok_or_else(|| HandlerError::configuration("Sensu event has no check"))?;

        let mut annotations = entity.metadata.annotations.unwrap_or_default();
        annotations.extend(check.metadata.annotations.unwrap_or_default());

        Ok(HealthEvent {
            entity_name: entity.metadata.name,
            check_status: CheckStatus::from_exit_status(check.status),
            check_summary: summarize(&check.metadata.name, check.status, &check.output),
            annotations,
        })
    }
}

/// First non-empty output line, or a generic line naming the check.
fn summarize(check_name: &str, status: u32, output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} returned status {}", check_name, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensu_event_critical() {
        let payload = json!({
            "entity": { "metadata": { "name": "node-07", "namespace": "default" } },
            "check": {
                "metadata": { "name": "check-disk" },
                "status": 2,
                "output": "\n  disk usage 98% on /var  \nsecond line\n"
            }
        });

        let event = HealthEvent::from_sensu_json(payload.to_string().as_bytes()).unwrap();

        assert_eq!(event.entity_name, "node-07");
        assert_eq!(event.check_status, CheckStatus::NonOk);
        assert_eq!(event.check_summary, "disk usage 98% on /var");
    }

    #[test]
    fn test_sensu_event_ok_without_output() {
        let payload = json!({
            "entity": { "metadata": { "name": "node-07" } },
            "check": { "metadata": { "name": "check-disk" }, "status": 0 }
        });

        let event = HealthEvent::from_reader(payload.to_string().as_bytes()).unwrap();

        assert_eq!(event.check_status, CheckStatus::Ok);
        assert_eq!(event.check_summary, "check-disk returned status 0");
    }

    #[test]
    fn test_check_annotations_override_entity() {
        let payload = json!({
            "entity": {
                "metadata": {
                    "name": "node-07",
                    "annotations": { "a/host": "from-entity", "a/id": "svc-entity" }
                }
            },
            "check": {
                "metadata": { "name": "check-disk", "annotations": { "a/id": "svc-check" } },
                "status": 0
            }
        });

        let event = HealthEvent::from_sensu_json(payload.to_string().as_bytes()).unwrap();

        assert_eq!(event.annotations["a/host"], "from-entity");
        assert_eq!(event.annotations["a/id"], "svc-check");
    }

    #[test]
    fn test_null_annotations_accepted() {
        let payload = json!({
            "entity": { "metadata": { "name": "node-07", "annotations": null } },
            "check": { "metadata": { "name": "check-disk" }, "status": 0 }
        });

        let event = HealthEvent::from_sensu_json(payload.to_string().as_bytes()).unwrap();

        assert!(event.annotations.is_empty());
    }

    #[test]
    fn test_warning_is_not_ok() {
        assert_eq!(CheckStatus::from_exit_status(1), CheckStatus::NonOk);
        assert_eq!(CheckStatus::from_exit_status(3), CheckStatus::NonOk);
    }

    #[test]
    fn test_missing_check_rejected() {
        let payload = json!({ "entity": { "metadata": { "name": "node-07" } } });
        let result = HealthEvent::from_sensu_json(payload.to_string().as_bytes());
        assert!(matches!(result, Err(HandlerError::Configuration { .. })));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = HealthEvent::from_sensu_json(b"{not json");
        assert!(matches!(result, Err(HandlerError::Configuration { .. })));
    }
}

//! Maps a (host, binary) pair to the identifier of one compute service

use crate::compute::ComputeClient;
use crate::error::{HandlerError, Result};
use crate::model::{ServiceIdentity, ServiceQuery};
use tracing::{info, warn};

/// What to do when the listing returns more than one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Take the first service in listing order.
    #[default]
    First,
    /// Fail unless exactly one service matches.
    ExactlyOne,
}

/// Resolve the service to act on.
///
/// A non-empty `configured_id` is returned as is and no listing is made.
/// Otherwise every page matching `query` is listed and one entry is picked
/// according to `policy`.
pub async fn resolve<C: ComputeClient + ?Sized>(
    client: &C,
    configured_id: Option<&str>,
    query: &ServiceQuery,
    policy: MatchPolicy,
) -> Result<ServiceIdentity> {
    if let Some(id) = configured_id.filter(|id| !id.is_empty()) {
        return Ok(ServiceIdentity::new(id));
    }

    if query.host.is_empty() || query.binary.is_empty() {
        return Err(HandlerError::configuration(format!(
            "Service lookup needs host and binary, got host: {:?}, binary: {:?}",
            query.host, query.binary
        )));
    }

    info!("Searching ID for host: {}, binary: {}", query.host, query.binary);
    let services = client.list_services(query).await?;

    let first = services.first().ok_or_else(|| HandlerError::Resolution {
        message: format!(
            "Service not found for host: {}, binary: {}",
            query.host, query.binary
        ),
    })?;

    if services.len() > 1 {
        let candidates = services
            .iter()
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        match policy {
            MatchPolicy::First => warn!(
                host = %query.host,
                binary = %query.binary,
                candidates = %candidates,
                "Multiple services match, using the first"
            ),
            MatchPolicy::ExactlyOne => {
                return Err(HandlerError::Resolution {
                    message: format!(
                        "Multiple services found for host: {}, binary: {}: {}",
                        query.host, query.binary, candidates
                    ),
                })
            }
        }
    }

    info!("Found service ID: {}", first.id);
    Ok(ServiceIdentity::new(first.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingClient;

    fn query() -> ServiceQuery {
        ServiceQuery::new("node-07", "nova-compute")
    }

    #[tokio::test]
    async fn test_configured_id_skips_listing() {
        let client = RecordingClient::with_services(&["svc-42"]);

        let id = resolve(&client, Some("svc-99"), &query(), MatchPolicy::First)
            .await
            .unwrap();

        assert_eq!(id.as_str(), "svc-99");
        assert_eq!(client.list_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_configured_id_lists() {
        let client = RecordingClient::with_services(&["svc-42"]);

        let id = resolve(&client, Some(""), &query(), MatchPolicy::First)
            .await
            .unwrap();

        assert_eq!(id.as_str(), "svc-42");
        assert_eq!(*client.list_calls.lock().unwrap(), vec![query()]);
    }

    #[tokio::test]
    async fn test_no_services_is_resolution_error() {
        let client = RecordingClient::with_services(&[]);

        let result = resolve(&client, None, &query(), MatchPolicy::First).await;

        match result {
            Err(HandlerError::Resolution { message }) => {
                assert!(message.contains("Service not found"));
                assert!(message.contains("node-07"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_match_in_listing_order() {
        let client = RecordingClient::with_services(&["svc-b", "svc-a", "svc-c"]);

        let id = resolve(&client, None, &query(), MatchPolicy::First)
            .await
            .unwrap();

        assert_eq!(id.as_str(), "svc-b");
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_ambiguity() {
        let client = RecordingClient::with_services(&["svc-b", "svc-a"]);

        let result = resolve(&client, None, &query(), MatchPolicy::ExactlyOne).await;

        match result {
            Err(HandlerError::Resolution { message }) => {
                assert!(message.contains("svc-b, svc-a"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_strict_policy_accepts_single_match() {
        let client = RecordingClient::with_services(&["svc-42"]);

        let id = resolve(&client, None, &query(), MatchPolicy::ExactlyOne)
            .await
            .unwrap();

        assert_eq!(id.as_str(), "svc-42");
    }

    #[tokio::test]
    async fn test_empty_host_rejected_before_listing() {
        let client = RecordingClient::with_services(&["svc-42"]);

        let result = resolve(
            &client,
            None,
            &ServiceQuery::new("", "nova-compute"),
            MatchPolicy::First,
        )
        .await;

        assert!(matches!(result, Err(HandlerError::Configuration { .. })));
        assert_eq!(client.list_count(), 0);
    }
}

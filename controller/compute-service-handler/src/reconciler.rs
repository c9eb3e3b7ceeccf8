//! Desired-state mapping and the single update call

use crate::compute::ComputeClient;
use crate::error::Result;
use crate::event::CheckStatus;
use crate::model::{DesiredState, ServiceIdentity, ServiceRecord, ServiceStatus};
use tracing::info;

pub const DISABLED_REASON_PREFIX: &str = "Disabled by Health action, because ";

/// Characters of the check summary kept in the disabled reason.
pub const SUMMARY_LIMIT: usize = 100;

impl DesiredState {
    /// OK enables with no reason; anything else disables with the trimmed summary.
    pub fn for_check(status: CheckStatus, summary: &str) -> Self {
        match status {
            CheckStatus::Ok => DesiredState {
                status: ServiceStatus::Enabled,
                disabled_reason: None,
            },
            CheckStatus::NonOk => DesiredState {
                status: ServiceStatus::Disabled,
                disabled_reason: Some(format!(
                    "{}{}",
                    DISABLED_REASON_PREFIX,
                    truncate_chars(summary, SUMMARY_LIMIT)
                )),
            },
        }
    }
}

/// At most `limit` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Apply the state derived from the check to the service. Re-applying the
/// current state is not special-cased.
pub async fn reconcile<C: ComputeClient + ?Sized>(
    client: &C,
    identity: &ServiceIdentity,
    status: CheckStatus,
    summary: &str,
) -> Result<ServiceRecord> {
    let desired = DesiredState::for_check(status, summary);

    info!("Apply action: {}", desired.status);
    let record = client.update_service(identity, &desired).await?;

    info!(
        id = %identity,
        host = %record.host,
        status = %record.status,
        "Compute service updated"
    );
    Ok(record)
}

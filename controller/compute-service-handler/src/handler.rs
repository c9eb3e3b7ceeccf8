//! One handler invocation: resolve the service, then reconcile its state
//!
//! Everything after configuration checks runs under a single deadline.
//! Hitting it drops the in-flight future, which aborts the pending HTTP request.

use crate::compute::{ComputeClient, HttpComputeClient};
use crate::config::{Config, ServiceKind};
use crate::error::{HandlerError, Result};
use crate::event::HealthEvent;
use crate::keystone;
use crate::reconciler::reconcile;
use crate::resolver::resolve;
use cloud_config::CloudsLoader;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

/// Handle an event with an already connected compute client. Event annotations
/// override the configuration for this invocation only.
pub async fn run<C: ComputeClient + ?Sized>(
    config: &Config,
    event: &HealthEvent,
    client: &C,
) -> Result<()> {
    let config = &config.with_event_overrides(event);
    let kind = config.service_kind()?;

    with_deadline(config.timeout(), async {
        match kind {
            ServiceKind::Compute => handle_compute(config, event, client).await,
        }
    })
    .await
}

/// Handle an event end to end: load the cloud profile, authenticate, then run.
#[instrument(skip_all, fields(cloud = %config.cloud, entity = %event.entity_name))]
pub async fn execute(config: &Config, event: &HealthEvent) -> Result<()> {
    let config = &config.with_event_overrides(event);
    let kind = config.service_kind()?;

    let loader = match &config.os_config_file {
        Some(path) => CloudsLoader::with_file(path),
        None => CloudsLoader::new(),
    };
    let cloud = loader.load(&config.cloud)?;
    let http = keystone::http_client(&cloud)?;

    with_deadline(config.timeout(), async {
        let session = keystone::authenticate(&http, &cloud, config.debug).await?;

        match kind {
            ServiceKind::Compute => {
                let client =
                    HttpComputeClient::new(http.clone(), session.compute_endpoint, session.token)
                        .with_debug(config.debug);
                handle_compute(config, event, &client).await
            }
        }
    })
    .await
}

async fn handle_compute<C: ComputeClient + ?Sized>(
    config: &Config,
    event: &HealthEvent,
    client: &C,
) -> Result<()> {
    let query = config.query_for(event);
    let identity = resolve(client, config.configured_id(), &query, config.match_policy()).await?;

    reconcile(client, &identity, event.check_status, &event.check_summary).await?;
    Ok(())
}

async fn with_deadline<F>(after: Duration, operation: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(after, operation).await {
        Ok(result) => result,
        Err(_) => {
            debug!(timeout_secs = after.as_secs(), "Invocation deadline reached");
            Err(HandlerError::Timeout { after })
        }
    }
}

//! Recording compute client for unit tests

use crate::compute::ComputeClient;
use crate::error::{HandlerError, RemoteStatusError, Result};
use crate::model::{DesiredState, ServiceIdentity, ServiceQuery, ServiceRecord, ServiceStatus};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct RecordingClient {
    services: Vec<ServiceRecord>,
    reject_updates: bool,
    delay: Option<Duration>,
    pub(crate) list_calls: Mutex<Vec<ServiceQuery>>,
    pub(crate) update_calls: Mutex<Vec<(ServiceIdentity, DesiredState)>>,
}

impl RecordingClient {
    pub(crate) fn with_services(ids: &[&str]) -> Self {
        Self {
            services: ids.iter().map(|id| record(id)).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn rejecting_updates(mut self) -> Self {
        self.reject_updates = true;
        self
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn list_count(&self) -> usize {
        self.list_calls.lock().unwrap().len()
    }

    pub(crate) fn updates(&self) -> Vec<(ServiceIdentity, DesiredState)> {
        self.update_calls.lock().unwrap().clone()
    }
}

pub(crate) fn record(id: &str) -> ServiceRecord {
    ServiceRecord {
        id: id.to_string(),
        host: "node-07".to_string(),
        binary: "nova-compute".to_string(),
        status: ServiceStatus::Enabled,
        disabled_reason: None,
        state: Some("up".to_string()),
        zone: Some("nova".to_string()),
    }
}

#[async_trait]
impl ComputeClient for RecordingClient {
    async fn list_services(&self, query: &ServiceQuery) -> Result<Vec<ServiceRecord>> {
        self.list_calls.lock().unwrap().push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.services.clone())
    }

    async fn update_service(
        &self,
        id: &ServiceIdentity,
        desired: &DesiredState,
    ) -> Result<ServiceRecord> {
        self.update_calls
            .lock()
            .unwrap()
            .push((id.clone(), desired.clone()));

        if self.reject_updates {
            return Err(HandlerError::Update {
                id: id.to_string(),
                source: RemoteStatusError {
                    status: StatusCode::NOT_FOUND,
                    body: "Service not found".to_string(),
                },
            });
        }

        Ok(ServiceRecord {
            status: desired.status,
            disabled_reason: desired.disabled_reason.clone(),
            ..record(id.as_str())
        })
    }
}

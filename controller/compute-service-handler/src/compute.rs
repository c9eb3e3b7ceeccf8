//! Compute control-plane client trait and its HTTP implementation
//!
//! The handler only needs two calls against the compute API: a filtered
//! `os-services` listing and an update of one service. Every request pins
//! the compute microversion so that `disabled_reason` and UUID service ids
//! are available.

use crate::error::{HandlerError, RemoteStatusError, Result};
use crate::model::{DesiredState, ServiceIdentity, ServiceQuery, ServiceRecord};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Train and newer
pub const COMPUTE_MICROVERSION: &str = "2.79";

const LIST_ERROR: &str = "Compute services list error";

/// Compute client trait - the handler resolves and updates services through it
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// List every service matching the query, across all pages, in listing order.
    async fn list_services(&self, query: &ServiceQuery) -> Result<Vec<ServiceRecord>>;

    /// Apply the desired state to one service and return the updated record.
    async fn update_service(
        &self,
        id: &ServiceIdentity,
        desired: &DesiredState,
    ) -> Result<ServiceRecord>;
}

#[derive(Debug, Deserialize)]
struct ServiceListPage {
    services: Vec<ServiceRecord>,
    #[serde(default)]
    services_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct ServiceUpdateResponse {
    service: ServiceRecord,
}

/// HTTP compute client - talks to the nova API with a pre-issued token
pub struct HttpComputeClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    debug: bool,
}

impl HttpComputeClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            debug: false,
        }
    }

    /// Log every request and response body.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&self.token)
            .map_err(|e| HandlerError::configuration(format!("Invalid auth token: {}", e)))?;
        headers.insert("X-Auth-Token", token);
        headers.insert(
            "X-OpenStack-Nova-API-Version",
            HeaderValue::from_static(COMPUTE_MICROVERSION),
        );
        headers.insert(
            "OpenStack-API-Version",
            HeaderValue::from_static("compute 2.79"),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Send a request and read the whole body.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
        context: &str,
    ) -> Result<(StatusCode, String)> {
        if self.debug {
            info!(
                method = %method,
                url = %url,
                body = body.as_deref().unwrap_or(""),
                "OpenStack request"
            );
        }

        let mut request = self
            .client
            .request(method, url)
            .headers(self.build_headers()?);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::transport(context, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HandlerError::transport(context, e))?;

        if self.debug {
            info!(status = %status, body = %text, "OpenStack response");
        }

        Ok((status, text))
    }

    fn services_url(&self, query: &ServiceQuery) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/os-services", self.endpoint),
            &[("binary", query.binary.as_str()), ("host", query.host.as_str())],
        )
        .map_err(|e| HandlerError::transport("Invalid compute endpoint", e))
    }
}

#[async_trait]
impl ComputeClient for HttpComputeClient {
    async fn list_services(&self, query: &ServiceQuery) -> Result<Vec<ServiceRecord>> {
        let mut services = Vec::new();
        let mut next = Some(self.services_url(query)?);
        let mut visited = HashSet::new();

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(HandlerError::transport(
                    LIST_ERROR,
                    format!("services pagination loop at {}", url),
                ));
            }

            let (status, body) = self
                .execute(Method::GET, url, None, LIST_ERROR)
                .await?;

            if !status.is_success() {
                return Err(HandlerError::transport(
                    LIST_ERROR,
                    RemoteStatusError { status, body },
                ));
            }

            let page: ServiceListPage = serde_json::from_str(&body)
                .map_err(|e| HandlerError::transport("Invalid compute services list", e))?;
            services.extend(page.services);

            next = page
                .services_links
                .into_iter()
                .find(|link| link.rel == "next")
                .map(|link| {
                    Url::parse(&link.href)
                        .map_err(|e| HandlerError::transport("Invalid services next link", e))
                })
                .transpose()?;
        }

        debug!(
            pages = visited.len(),
            count = services.len(),
            host = %query.host,
            binary = %query.binary,
            "Listed compute services"
        );
        Ok(services)
    }

    async fn update_service(
        &self,
        id: &ServiceIdentity,
        desired: &DesiredState,
    ) -> Result<ServiceRecord> {
        let url = Url::parse(&format!("{}/os-services/{}", self.endpoint, id))
            .map_err(|e| HandlerError::transport("Invalid compute endpoint", e))?;
        let body = serde_json::to_string(desired)
            .map_err(|e| HandlerError::transport("Failed to encode service update", e))?;

        let context = format!("Compute service id: {} update error", id);
        let (status, body) = self
            .execute(Method::PUT, url, Some(body), &context)
            .await?;

        if !status.is_success() {
            return Err(HandlerError::Update {
                id: id.to_string(),
                source: RemoteStatusError { status, body },
            });
        }

        let response: ServiceUpdateResponse = serde_json::from_str(&body).map_err(|e| {
            HandlerError::transport(
                format!("Compute service id: {} invalid update response", id),
                e,
            )
        })?;
        Ok(response.service)
    }
}

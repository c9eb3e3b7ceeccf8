//! Keystone v3 authentication and compute endpoint discovery

use crate::error::{HandlerError, RemoteStatusError, Result};
use cloud_config::{AuthMethod, DomainRef, ProjectScope, ResolvedCloud, UserRef};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const COMPUTE_SERVICE_TYPE: &str = "compute";

const AUTH_ERROR: &str = "Keystone authentication error";

/// Issued token plus the compute endpoint picked from its catalog.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub compute_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
    url: String,
}

/// Build the HTTP client used for every call of an invocation.
pub fn http_client(cloud: &ResolvedCloud) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));

    if let Some(ca_cert_path) = &cloud.cacert {
        debug!("Loading CA certificate from: {}", ca_cert_path.display());
        let cert_contents = std::fs::read(ca_cert_path).map_err(|e| {
            HandlerError::configuration(format!(
                "Failed to read CA certificate from {}: {}",
                ca_cert_path.display(),
                e
            ))
        })?;
        let cert = reqwest::Certificate::from_pem(&cert_contents).map_err(|e| {
            HandlerError::configuration(format!("Invalid CA certificate format: {}", e))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    if !cloud.verify {
        warn!(cloud = %cloud.name, "TLS verification disabled (INSECURE)");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| HandlerError::configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Request a token and pick the compute endpoint. The token is never re-issued.
pub async fn authenticate(
    client: &reqwest::Client,
    cloud: &ResolvedCloud,
    debug: bool,
) -> Result<Session> {
    let url = cloud.token_url();
    if debug {
        info!(method = "POST", url = %url, "OpenStack request");
    }

    let response = client
        .post(&url)
        .json(&auth_request(&cloud.method))
        .send()
        .await
        .map_err(|e| HandlerError::transport(AUTH_ERROR, e))?;

    let status = response.status();
    let token = response
        .headers()
        .get("X-Subject-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .text()
        .await
        .map_err(|e| HandlerError::transport(AUTH_ERROR, e))?;

    if debug {
        info!(status = %status, "OpenStack response");
    }

    if !status.is_success() {
        return Err(HandlerError::transport(
            AUTH_ERROR,
            RemoteStatusError { status, body },
        ));
    }

    let token = token.ok_or_else(|| {
        HandlerError::transport(AUTH_ERROR, "response carried no X-Subject-Token header")
    })?;
    let issued: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| HandlerError::transport("Invalid keystone token response", e))?;

    let compute_endpoint = compute_endpoint(
        &issued.token.catalog,
        &cloud.interface,
        cloud.region_name.as_deref(),
    )?;
    debug!(endpoint = %compute_endpoint, "Using compute endpoint");

    Ok(Session {
        token,
        compute_endpoint,
    })
}

fn auth_request(method: &AuthMethod) -> Value {
    match method {
        AuthMethod::ApplicationCredential { id, secret } => json!({
            "auth": {
                "identity": {
                    "methods": ["application_credential"],
                    "application_credential": { "id": id, "secret": secret }
                }
            }
        }),
        AuthMethod::Password {
            user,
            password,
            project,
        } => {
            let mut user_json = match user {
                UserRef::Id(id) => json!({ "id": id }),
                UserRef::Name { name, domain } => {
                    json!({ "name": name, "domain": domain_json(domain) })
                }
            };
            user_json["password"] = json!(password);

            let mut request = json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": { "user": user_json }
                    }
                }
            });

            if let Some(project) = project {
                let project_json = match project {
                    ProjectScope::Id(id) => json!({ "id": id }),
                    ProjectScope::Name { name, domain } => {
                        json!({ "name": name, "domain": domain_json(domain) })
                    }
                };
                request["auth"]["scope"] = json!({ "project": project_json });
            }

            request
        }
    }
}

fn domain_json(domain: &DomainRef) -> Value {
    match domain {
        DomainRef::Id(id) => json!({ "id": id }),
        DomainRef::Name(name) => json!({ "name": name }),
    }
}

fn compute_endpoint(
    catalog: &[CatalogEntry],
    interface: &str,
    region: Option<&str>,
) -> Result<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == COMPUTE_SERVICE_TYPE)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|endpoint| {
            endpoint.interface == interface
                && region.map_or(true, |r| {
                    endpoint.region.as_deref() == Some(r) || endpoint.region_id.as_deref() == Some(r)
                })
        })
        .map(|endpoint| endpoint.url.trim_end_matches('/').to_string())
        .ok_or_else(|| {
            HandlerError::configuration(format!(
                "No compute endpoint in catalog for interface: {}, region: {}",
                interface,
                region.unwrap_or("any")
            ))
        })
}

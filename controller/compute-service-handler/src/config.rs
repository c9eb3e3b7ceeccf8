//! Configuration for the compute service handler

use crate::error::{HandlerError, Result};
use crate::event::HealthEvent;
use crate::model::ServiceQuery;
use crate::resolver::MatchPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CLOUD: &str = "monitoring";
pub const DEFAULT_BINARY: &str = "nova-compute";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Prefix of entity and check annotations that override configuration,
/// e.g. `<keyspace>/id` or `<keyspace>/host`.
pub const ANNOTATION_KEYSPACE: &str = "sensu.io/plugins/sensu-go-openstack-service-handler/config";

/// Configuration for compute service handler
#[derive(Debug, Clone, Parser)]
#[command(name = "compute-service-handler")]
#[command(about = "Changes the enabled state of an OpenStack compute service from a Sensu event")]
pub struct Config {
    /// Cloud used to access openstack API
    #[arg(short = 'c', long, env = "OS_CLOUD", default_value = DEFAULT_CLOUD)]
    pub cloud: String,

    /// Clouds.yaml file path
    #[arg(long = "os-config-file", env = "OS_CLIENT_CONFIG_FILE")]
    pub os_config_file: Option<PathBuf>,

    /// Service to manage
    #[arg(short = 's', long, default_value = "compute")]
    pub service: String,

    /// Service binary to search
    #[arg(short = 'b', long, default_value = DEFAULT_BINARY)]
    pub binary: String,

    /// Host of the service, defaults to the event entity name
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Service ID, skips the lookup by host and binary
    #[arg(long)]
    pub id: Option<String>,

    /// Debug API calls
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Deadline for the whole invocation in seconds
    #[arg(long, env = "HANDLER_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Fail instead of picking the first service when several match
    #[arg(long, env = "HANDLER_STRICT_MATCH")]
    pub strict_match: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cloud: DEFAULT_CLOUD.to_string(),
            os_config_file: None,
            service: ServiceKind::Compute.as_str().to_string(),
            binary: DEFAULT_BINARY.to_string(),
            host: None,
            id: None,
            debug: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            strict_match: false,
        }
    }
}

/// Service families the handler can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Compute,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Compute => "compute",
        }
    }
}

impl FromStr for ServiceKind {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "compute" => Ok(ServiceKind::Compute),
            other => Err(HandlerError::configuration(format!(
                "unsupported service: {}",
                other
            ))),
        }
    }
}

impl Config {
    /// Parse configuration from command-line args and environment variables
    pub fn parse_config() -> Self {
        Config::parse()
    }

    pub fn service_kind(&self) -> Result<ServiceKind> {
        self.service.parse()
    }

    /// Explicit service ID, if one was given.
    pub fn configured_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Lookup key for the event: host override if set, else the entity name.
    pub fn query_for(&self, event: &HealthEvent) -> ServiceQuery {
        let host = self
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(&event.entity_name);
        ServiceQuery::new(host, self.binary.as_str())
    }

    /// Copy of the configuration with the event's keyspace annotations applied.
    /// Annotations win over flags and environment.
    pub fn with_event_overrides(&self, event: &HealthEvent) -> Config {
        let mut config = self.clone();

        for (key, value) in &event.annotations {
            let Some(path) = key
                .strip_prefix(ANNOTATION_KEYSPACE)
                .and_then(|rest| rest.strip_prefix('/'))
            else {
                continue;
            };

            match path {
                "cloud" => config.cloud = value.clone(),
                "os_config_file" => config.os_config_file = Some(PathBuf::from(value)),
                "service" => config.service = value.clone(),
                "binary" => config.binary = value.clone(),
                "host" => config.host = Some(value.clone()),
                "id" => config.id = Some(value.clone()),
                other => debug!(path = other, "Ignoring unknown configuration annotation"),
            }
        }

        config
    }

    pub fn match_policy(&self) -> MatchPolicy {
        if self.strict_match {
            MatchPolicy::ExactlyOne
        } else {
            MatchPolicy::First
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

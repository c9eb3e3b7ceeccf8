//! Error kinds for a handler invocation

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, HandlerError>;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{message}")]
    Resolution { message: String },

    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("Compute service id: {id} update error: {source}")]
    Update {
        id: String,
        #[source]
        source: RemoteStatusError,
    },

    #[error("Handler timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },
}

/// Non-success HTTP response from the control plane.
#[derive(Error, Debug, Clone)]
#[error("remote returned {status}: {body}")]
pub struct RemoteStatusError {
    pub status: StatusCode,
    pub body: String,
}

impl HandlerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        HandlerError::Configuration {
            message: message.into(),
        }
    }

    pub fn transport(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        HandlerError::Transport {
            context: context.into(),
            source: source.into(),
        }
    }
}

impl From<cloud_config::CloudConfigError> for HandlerError {
    fn from(e: cloud_config::CloudConfigError) -> Self {
        HandlerError::configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_error_names_identifier() {
        let err = HandlerError::Update {
            id: "svc-42".to_string(),
            source: RemoteStatusError {
                status: StatusCode::NOT_FOUND,
                body: "Service svc-42 not found.".to_string(),
            },
        };

        let message = err.to_string();
        assert!(message.contains("svc-42"));
        assert!(message.contains("404"));
    }

    #[test]
    fn test_transport_preserves_source() {
        let err = HandlerError::transport("Compute services list error", "connection reset");
        assert_eq!(
            err.to_string(),
            "Compute services list error: connection reset"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_cloud_config_errors_are_configuration() {
        let err: HandlerError = cloud_config::CloudConfigError::CloudNotFound {
            cloud: "monitoring".to_string(),
        }
        .into();
        assert!(matches!(err, HandlerError::Configuration { .. }));
    }
}

//! Compute Service Handler - enables or disables an OpenStack compute service from a health event
//!
//! A Sensu check result for a host is mapped to the matching `os-services`
//! record (or to an explicitly configured service ID), and the record is
//! enabled when the check is OK or disabled with a reason otherwise.

pub mod compute;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod keystone;
pub mod model;
pub mod reconciler;
pub mod resolver;

#[cfg(test)]
mod mock;

pub use compute::{ComputeClient, HttpComputeClient, COMPUTE_MICROVERSION};
pub use config::{Config, ServiceKind, ANNOTATION_KEYSPACE};
pub use error::{HandlerError, RemoteStatusError, Result};
pub use event::{CheckStatus, HealthEvent};
pub use handler::{execute, run};
pub use model::{DesiredState, ServiceIdentity, ServiceQuery, ServiceRecord, ServiceStatus};
pub use resolver::MatchPolicy;

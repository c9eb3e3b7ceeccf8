//! Cloud profile resolution from `clouds.yaml`.
//!
//! Loads a named cloud entry and turns its `auth` block into a concrete
//! [`AuthMethod`] plus the endpoint selection options needed to build a session.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

pub const CLOUDS_FILE_NAME: &str = "clouds.yaml";
pub const SECURE_FILE_NAME: &str = "secure.yaml";
pub const DEFAULT_INTERFACE: &str = "public";
pub const DEFAULT_DOMAIN: &str = "Default";

#[derive(Error, Debug)]
pub enum CloudConfigError {
    #[error("Clouds file not found, searched: {searched}")]
    FileNotFound { searched: String },

    #[error("IO error reading {path}: {message}")]
    IoError { path: String, message: String },

    #[error("YAML parsing failed for {path}: {message}")]
    YamlParsingFailed { path: String, message: String },

    #[error("Cloud not found: {cloud}")]
    CloudNotFound { cloud: String },

    #[error("Cloud {cloud} is missing auth field: {field}")]
    MissingAuthField { cloud: String, field: &'static str },

    #[error("Cloud {cloud} uses unsupported auth_type: {auth_type}")]
    UnsupportedAuthType { cloud: String, auth_type: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudsFile {
    #[serde(default)]
    pub clouds: HashMap<String, CloudProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudProfile {
    #[serde(default)]
    pub auth: AuthOptions,
    pub auth_type: Option<String>,
    pub region_name: Option<String>,
    pub interface: Option<String>,
    pub verify: Option<bool>,
    pub cacert: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthOptions {
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub password: Option<String>,
    pub user_domain_name: Option<String>,
    pub user_domain_id: Option<String>,
    pub project_name: Option<String>,
    pub project_id: Option<String>,
    pub project_domain_name: Option<String>,
    pub project_domain_id: Option<String>,
    pub application_credential_id: Option<String>,
    pub application_credential_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainRef {
    Id(String),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(String),
    Name { name: String, domain: DomainRef },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    Id(String),
    Name { name: String, domain: DomainRef },
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password {
        user: UserRef,
        password: String,
        project: Option<ProjectScope>,
    },
    ApplicationCredential {
        id: String,
        secret: String,
    },
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Password { user, project, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("project", project)
                .finish_non_exhaustive(),
            AuthMethod::ApplicationCredential { id, .. } => f
                .debug_struct("ApplicationCredential")
                .field("id", id)
                .finish_non_exhaustive(),
        }
    }
}

/// A cloud profile with every option needed to authenticate and pick an endpoint.
#[derive(Debug, Clone)]
pub struct ResolvedCloud {
    pub name: String,
    pub auth_url: String,
    pub method: AuthMethod,
    pub region_name: Option<String>,
    pub interface: String,
    pub verify: bool,
    pub cacert: Option<PathBuf>,
}

impl ResolvedCloud {
    /// Keystone v3 token issue URL, tolerating auth URLs with or without `/v3`.
    pub fn token_url(&self) -> String {
        let base = self.auth_url.trim_end_matches('/');
        if base.ends_with("/v3") {
            format!("{}/auth/tokens", base)
        } else {
            format!("{}/v3/auth/tokens", base)
        }
    }
}

impl CloudProfile {
    pub fn resolve(&self, cloud: &str) -> Result<ResolvedCloud, CloudConfigError> {
        let auth_url = non_empty(&self.auth.auth_url).ok_or_else(|| missing(cloud, "auth_url"))?;

        Ok(ResolvedCloud {
            name: cloud.to_string(),
            auth_url,
            method: self.auth_method(cloud)?,
            region_name: non_empty(&self.region_name),
            interface: non_empty(&self.interface).unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            verify: self.verify.unwrap_or(true),
            cacert: self.cacert.clone(),
        })
    }

    fn auth_method(&self, cloud: &str) -> Result<AuthMethod, CloudConfigError> {
        let auth_type = self.auth_type.as_deref().unwrap_or_else(|| {
            if self.auth.application_credential_id.is_some() {
                "v3applicationcredential"
            } else {
                "password"
            }
        });

        match auth_type {
            "v3applicationcredential" | "applicationcredential" => {
                Ok(AuthMethod::ApplicationCredential {
                    id: non_empty(&self.auth.application_credential_id)
                        .ok_or_else(|| missing(cloud, "application_credential_id"))?,
                    secret: non_empty(&self.auth.application_credential_secret)
                        .ok_or_else(|| missing(cloud, "application_credential_secret"))?,
                })
            }
            "password" | "v3password" => {
                let user = match (non_empty(&self.auth.user_id), non_empty(&self.auth.username)) {
                    (Some(id), _) => UserRef::Id(id),
                    (None, Some(name)) => UserRef::Name {
                        name,
                        domain: domain_ref(&self.auth.user_domain_id, &self.auth.user_domain_name),
                    },
                    (None, None) => return Err(missing(cloud, "username")),
                };

                let project = match (
                    non_empty(&self.auth.project_id),
                    non_empty(&self.auth.project_name),
                ) {
                    (Some(id), _) => Some(ProjectScope::Id(id)),
                    (None, Some(name)) => Some(ProjectScope::Name {
                        name,
                        domain: domain_ref(
                            &self.auth.project_domain_id,
                            &self.auth.project_domain_name,
                        ),
                    }),
                    (None, None) => None,
                };

                Ok(AuthMethod::Password {
                    user,
                    password: non_empty(&self.auth.password)
                        .ok_or_else(|| missing(cloud, "password"))?,
                    project,
                })
            }
            other => Err(CloudConfigError::UnsupportedAuthType {
                cloud: cloud.to_string(),
                auth_type: other.to_string(),
            }),
        }
    }
}

/// Overlay `overlay` onto `base`; mappings merge key by key, anything else replaces.
fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Finds and reads `clouds.yaml`, overlaid with `secure.yaml` when one exists.
pub struct CloudsLoader {
    locations: Vec<PathBuf>,
    secure_locations: Vec<PathBuf>,
}

impl CloudsLoader {
    /// Searches the standard locations.
    pub fn new() -> Self {
        Self {
            locations: Self::default_locations(),
            secure_locations: Self::default_secure_locations(),
        }
    }

    /// Reads only the given file, plus a `secure.yaml` next to it.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let secure = path.with_file_name(SECURE_FILE_NAME);
        Self {
            locations: vec![path],
            secure_locations: vec![secure],
        }
    }

    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    pub fn default_locations() -> Vec<PathBuf> {
        search_path("OS_CLIENT_CONFIG_FILE", CLOUDS_FILE_NAME)
    }

    pub fn default_secure_locations() -> Vec<PathBuf> {
        search_path("OS_CLIENT_SECURE_FILE", SECURE_FILE_NAME)
    }

    #[instrument(skip(self))]
    pub fn load(&self, cloud: &str) -> Result<ResolvedCloud, CloudConfigError> {
        let path = self
            .locations
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| CloudConfigError::FileNotFound {
                searched: self
                    .locations
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        debug!("Loading cloud {} from {}", cloud, path.display());
        let mut document = read_yaml(path)?;

        if let Some(secure_path) = self.secure_locations.iter().find(|p| p.is_file()) {
            debug!("Merging secrets from {}", secure_path.display());
            merge_yaml(&mut document, read_yaml(secure_path)?);
        }

        let file: CloudsFile =
            serde_yaml::from_value(document).map_err(|e| CloudConfigError::YamlParsingFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        file.clouds
            .get(cloud)
            .ok_or_else(|| CloudConfigError::CloudNotFound {
                cloud: cloud.to_string(),
            })?
            .resolve(cloud)
    }
}

impl Default for CloudsLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn search_path(env_var: &str, file_name: &str) -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Ok(file) = std::env::var(env_var) {
        if !file.is_empty() {
            locations.push(PathBuf::from(file));
        }
    }

    locations.push(PathBuf::from(file_name));

    if let Some(config_dir) = dirs::config_dir() {
        locations.push(config_dir.join("openstack").join(file_name));
    }

    locations.push(PathBuf::from("/etc/openstack").join(file_name));
    locations
}

fn read_yaml(path: &Path) -> Result<serde_yaml::Value, CloudConfigError> {
    let content = fs::read_to_string(path).map_err(|e| CloudConfigError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    serde_yaml::from_str(&content).map_err(|e| CloudConfigError::YamlParsingFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn domain_ref(id: &Option<String>, name: &Option<String>) -> DomainRef {
    match (non_empty(id), non_empty(name)) {
        (Some(id), _) => DomainRef::Id(id),
        (None, Some(name)) => DomainRef::Name(name),
        (None, None) => DomainRef::Name(DEFAULT_DOMAIN.to_string()),
    }
}

fn missing(cloud: &str, field: &'static str) -> CloudConfigError {
    CloudConfigError::MissingAuthField {
        cloud: cloud.to_string(),
        field,
    }
}

//! Cluster-config (kubeconfig) reader
//!
//! Only the parts of the file the resolver consumes are modelled: the current
//! context, its cluster and its user. Unknown keys are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::debug;
use serde::Deserialize;

use crate::common::{FactoryError, Result};
use crate::config::defaults;
use crate::config::env::{EnvResolver, EnvironmentSource};

/// Parsed cluster-config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(default)]
    pub current_context: Option<String>,

    /// Directory of the file this config was read from
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(default)]
    pub certificate_authority: Option<String>,
    #[serde(default)]
    pub certificate_authority_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: AuthInfo,
}

/// Credentials of a kubeconfig user entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthInfo {
    #[serde(default)]
    pub client_certificate: Option<String>,
    #[serde(default)]
    pub client_certificate_data: Option<String>,
    #[serde(default)]
    pub client_key: Option<String>,
    #[serde(default)]
    pub client_key_data: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl KubeConfig {
    /// Parse a kubeconfig document (YAML or JSON)
    pub fn parse(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| FactoryError::ClusterConfig(format!("Failed to parse cluster config: {}", e)))
    }

    /// The context named by `current-context`
    pub fn current_context(&self) -> Option<&Context> {
        let name = self.current_context.as_deref()?;
        self.contexts
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.context)
    }

    pub fn cluster(&self, context: &Context) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .map(|c| &c.cluster)
    }

    pub fn user(&self, context: &Context) -> Option<&AuthInfo> {
        let name = context.user.as_deref()?;
        self.users
            .iter()
            .find(|u| u.name == name)
            .map(|u| &u.user)
    }

    /// Bearer token of the current context's user
    pub fn current_user_token(&self) -> Option<&str> {
        let context = self.current_context()?;
        self.user(context)
            .and_then(|user| user.token.as_deref())
            .filter(|token| !token.trim().is_empty())
    }

    /// Resolve a credential path the way kubectl does: relative to the file
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.source_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Where cluster-config comes from
pub trait ClusterConfigSource: Send + Sync {
    /// Load the config; `Ok(None)` when there is none to load
    fn load(&self) -> Result<Option<KubeConfig>>;
}

/// Kubeconfig file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeConfigFile {
    pub path: PathBuf,
}

impl KubeConfigFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Locate the kubeconfig: first `KUBECONFIG` entry, else `~/.kube/config`
    pub fn discover(env: &dyn EnvironmentSource) -> Option<Self> {
        let resolver = EnvResolver::new(env);

        if let Some(list) = resolver.get_string(defaults::KUBECONFIG) {
            if let Some(first) = std::env::split_paths(&list).find(|p| !p.as_os_str().is_empty()) {
                debug!("Using cluster config from {}: {}", defaults::KUBECONFIG, first.display());
                return Some(Self::new(first));
            }
        }

        let home = resolver
            .get_string("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)?;
        Some(Self::new(home.join(defaults::KUBECONFIG_HOME_PATH)))
    }
}

impl ClusterConfigSource for KubeConfigFile {
    fn load(&self) -> Result<Option<KubeConfig>> {
        debug!("Loading cluster config from {}", self.path.display());

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Cluster config not found: {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(FactoryError::ClusterConfig(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut config = KubeConfig::parse(&contents)?;
        config.source_dir = self.path.parent().map(Path::to_path_buf);
        Ok(Some(config))
    }
}

/// Already-parsed cluster config
#[derive(Debug, Clone, Default)]
pub struct InMemoryClusterConfig(pub Option<KubeConfig>);

impl ClusterConfigSource for InMemoryClusterConfig {
    fn load(&self) -> Result<Option<KubeConfig>> {
        Ok(self.0.clone())
    }
}

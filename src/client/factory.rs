//! Client factory
//!
//! Resolves a [`ConnectionProfile`] once and builds HTTP and websocket
//! clients from it. Changing the address yields a new factory; an existing
//! factory and its profile are never mutated.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{debug, warn};

use crate::client::http::{BasicAuth, HttpClient};
use crate::client::stream::StreamClient;
use crate::common::{FactoryError, Result};
use crate::config::defaults;
use crate::config::env::{EnvResolver, EnvironmentSource, ProcessEnvironment};
use crate::config::kubeconfig::{ClusterConfigSource, InMemoryClusterConfig, KubeConfigFile};
use crate::config::profile::{AddressSource, ConnectionProfile, Secret};
use crate::config::resolver::{discover_master, ProfileResolver};
use crate::tls::{SchemeProbe, TlsProbe, TransportSecurity};

/// Builds clients for a resolved master
///
/// # Example
///
/// ```no_run
/// use kube_client_factory::KubeClientFactory;
///
/// # fn main() -> kube_client_factory::Result<()> {
/// let factory = KubeClientFactory::with_address("https://10.0.0.1:6443", false)?;
/// let client = factory.build_http_client()?;
/// println!("{}", client.base_url());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KubeClientFactory {
    profile: ConnectionProfile,
    warnings: Vec<String>,
    env: Arc<dyn EnvironmentSource>,
    cluster_config: Arc<dyn ClusterConfigSource>,
    probe: Arc<dyn SchemeProbe>,
    service_account_dir: PathBuf,
}

impl KubeClientFactory {
    /// Factory resolved from the process environment and default kubeconfig
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Factory for an explicit address
    pub fn with_address(address: &str, verify: bool) -> Result<Self> {
        Self::builder().address(address).verify(verify).build()
    }

    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Soft warnings raised during resolution
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn address(&self) -> Option<&str> {
        self.profile.address.as_deref()
    }

    /// Bare host name of the master
    pub fn master_host(&self) -> Option<String> {
        self.profile.master_host()
    }

    /// Master address from service discovery or the master override alone
    pub fn resolve_address(&self) -> Option<String> {
        discover_master(&EnvResolver::new(self.env.as_ref())).map(|(address, _)| address)
    }

    /// Factory for a different address, with every other setting kept
    ///
    /// A blank address falls back to service discovery and the master
    /// override. The scheme is inferred again.
    pub fn set_address(&self, address: &str) -> Result<Self> {
        let (address, source) = match Some(address.trim()).filter(|a| !a.is_empty()) {
            Some(address) => (address.to_string(), AddressSource::Explicit),
            None => self.resolve_source()?,
        };

        let address = self.resolver().infer_scheme(&address, self.profile.verify_address)?;
        debug!("Switching master to {} (from {})", address, source);

        let mut next = self.clone();
        next.profile = ConnectionProfile {
            address: Some(address),
            address_source: Some(source),
            ..self.profile.clone()
        };
        Ok(next)
    }

    fn resolve_source(&self) -> Result<(String, AddressSource)> {
        discover_master(&EnvResolver::new(self.env.as_ref())).ok_or_else(|| {
            FactoryError::Address("blank address and no master found in the environment".to_string())
        })
    }

    fn resolver(&self) -> ProfileResolver<'_> {
        ProfileResolver::new(
            self.env.as_ref(),
            self.cluster_config.as_ref(),
            self.probe.as_ref(),
            &self.service_account_dir,
        )
    }

    /// Trust policy and client identity for the current profile
    pub fn transport_security(&self) -> Result<TransportSecurity> {
        TransportSecurity::from_profile(&self.profile)
    }

    /// HTTP client bound to the master
    ///
    /// A client certificate suppresses bearer token discovery. Basic auth is
    /// installed whenever a username is configured.
    pub fn build_http_client(&self) -> Result<HttpClient> {
        let address = self.profile.address.as_deref().ok_or_else(|| {
            FactoryError::Address("no master address resolved".to_string())
        })?;
        let security = self.transport_security()?;

        let bearer_token = if security.identity().is_some() {
            debug!("Client certificate configured, skipping bearer token discovery");
            None
        } else {
            self.find_bearer_token()
        };

        let basic_auth = self.profile.username.clone().map(|username| BasicAuth {
            username,
            password: self.profile.password.clone(),
        });

        HttpClient::new(address, &security, bearer_token, basic_auth)
    }

    /// Websocket client sharing the HTTP client's trust and identity
    pub fn build_stream_client(&self) -> Result<StreamClient> {
        let security = self.transport_security()?;
        StreamClient::new(&security, self.profile.address.as_deref())
    }

    /// Service-account token, else the cluster-config user token
    pub fn find_bearer_token(&self) -> Option<Secret> {
        self.service_account_token().or_else(|| self.cluster_config_token())
    }

    pub fn service_account_token(&self) -> Option<Secret> {
        let path = self.service_account_dir.join(defaults::SERVICE_ACCOUNT_TOKEN_FILE);
        match fs::read_to_string(&path) {
            Ok(token) => non_blank_token(&token),
            Err(e) => {
                debug!("Cannot read service account token {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn cluster_config_token(&self) -> Option<Secret> {
        match self.cluster_config.load() {
            Ok(Some(config)) => config.current_user_token().and_then(non_blank_token),
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring cluster config during token discovery: {}", e);
                None
            }
        }
    }
}

fn non_blank_token(token: &str) -> Option<Secret> {
    Some(token.trim())
        .filter(|t| !t.is_empty())
        .map(Secret::new)
}

impl fmt::Display for KubeClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KubeClientFactory{{{}}}", self.address().unwrap_or_default())
    }
}

impl fmt::Debug for KubeClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeClientFactory")
            .field("profile", &self.profile)
            .field("warnings", &self.warnings)
            .field("service_account_dir", &self.service_account_dir)
            .finish()
    }
}

/// Fluent construction of a [`KubeClientFactory`]
///
/// Every source defaults to the real one: process environment, discovered
/// kubeconfig, TLS probe and the mounted service-account directory.
#[derive(Default)]
pub struct FactoryBuilder {
    env: Option<Arc<dyn EnvironmentSource>>,
    cluster_config: Option<Arc<dyn ClusterConfigSource>>,
    probe: Option<Arc<dyn SchemeProbe>>,
    service_account_dir: Option<PathBuf>,
    address: Option<String>,
    verify: Option<bool>,
}

impl FactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment<E: EnvironmentSource + 'static>(mut self, env: E) -> Self {
        self.env = Some(Arc::new(env));
        self
    }

    pub fn with_cluster_config<C: ClusterConfigSource + 'static>(mut self, config: C) -> Self {
        self.cluster_config = Some(Arc::new(config));
        self
    }

    /// Read the cluster config from a specific file
    pub fn with_kubeconfig_file<P: AsRef<Path>>(self, path: P) -> Self {
        debug!("Using cluster config file {}", path.as_ref().display());
        self.with_cluster_config(KubeConfigFile::new(path))
    }

    pub fn without_cluster_config(self) -> Self {
        self.with_cluster_config(InMemoryClusterConfig(None))
    }

    pub fn with_probe<P: SchemeProbe + 'static>(mut self, probe: P) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    pub fn with_service_account_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.service_account_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Probe the master to pick the scheme; defaults to `kubernetes.verify`
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = Some(verify);
        self
    }

    pub fn build(self) -> Result<KubeClientFactory> {
        let env: Arc<dyn EnvironmentSource> = match self.env {
            Some(env) => env,
            None => Arc::new(ProcessEnvironment::new()),
        };

        let cluster_config: Arc<dyn ClusterConfigSource> = match self.cluster_config {
            Some(config) => config,
            None => match KubeConfigFile::discover(env.as_ref()) {
                Some(file) => Arc::new(file),
                None => Arc::new(InMemoryClusterConfig(None)),
            },
        };

        let probe: Arc<dyn SchemeProbe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(TlsProbe),
        };

        let service_account_dir = self.service_account_dir.unwrap_or_else(defaults::service_account_dir);
        let verify = self.verify.unwrap_or_else(|| {
            EnvResolver::new(env.as_ref()).get_bool_or(defaults::KUBERNETES_VERIFY_PROPERTY, defaults::VERIFY_ADDRESS)
        });

        let resolution = ProfileResolver::new(
            env.as_ref(),
            cluster_config.as_ref(),
            probe.as_ref(),
            &service_account_dir,
        )
        .resolve(self.address.as_deref(), verify)?;

        Ok(KubeClientFactory {
            profile: resolution.profile,
            warnings: resolution.warnings,
            env,
            cluster_config,
            probe,
            service_account_dir,
        })
    }
}

//! Connection profile resolution
//!
//! The master address is taken from the first tier that yields one:
//!
//! 1. the explicit address passed by the caller
//! 2. `KUBERNETES_SERVICE_HOST` / `KUBERNETES_SERVICE_PORT`
//! 3. the `kubernetes.master` property, then `KUBERNETES_MASTER`
//! 4. the server of the cluster-config current context
//!
//! Trust and credential settings come from the cluster config (only when tier 4
//! produced the address) and are then overridden by environment values.

use std::fs::File;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};

use crate::common::{FactoryError, Result};
use crate::config::defaults;
use crate::config::env::{EnvResolver, EnvironmentSource};
use crate::config::kubeconfig::ClusterConfigSource;
use crate::config::profile::{AddressSource, ConnectionProfile, Secret};
use crate::tls::SchemeProbe;

/// Outcome of a resolution: the profile plus every soft warning raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub profile: ConnectionProfile,
    pub warnings: Vec<String>,
}

impl Resolution {
    fn new(verify: bool) -> Self {
        Self {
            profile: ConnectionProfile {
                verify_address: verify,
                ..Default::default()
            },
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Resolves a [`ConnectionProfile`] from injected sources
pub struct ProfileResolver<'a> {
    env: &'a dyn EnvironmentSource,
    cluster_config: &'a dyn ClusterConfigSource,
    probe: &'a dyn SchemeProbe,
    service_account_dir: &'a Path,
}

impl<'a> ProfileResolver<'a> {
    pub fn new(
        env: &'a dyn EnvironmentSource,
        cluster_config: &'a dyn ClusterConfigSource,
        probe: &'a dyn SchemeProbe,
        service_account_dir: &'a Path,
    ) -> Self {
        Self {
            env,
            cluster_config,
            probe,
            service_account_dir,
        }
    }

    /// Run the full precedence chain
    ///
    /// Fails only on a malformed address. A missing address is logged and
    /// left for client construction to reject.
    pub fn resolve(&self, explicit: Option<&str>, verify: bool) -> Result<Resolution> {
        let env = EnvResolver::new(self.env);
        let mut resolution = Resolution::new(verify);

        let found = match explicit.map(str::trim).filter(|a| !a.is_empty()) {
            Some(address) => Some((address.to_string(), AddressSource::Explicit)),
            None => discover_master(&env),
        };

        match found {
            Some((address, source)) => {
                resolution.profile.address = Some(self.infer_scheme(&address, verify)?);
                resolution.profile.address_source = Some(source);
            }
            None => self.apply_cluster_config(&mut resolution, verify)?,
        }

        apply_environment(&env, &mut resolution);
        self.apply_service_account_ca(&mut resolution);

        let resolved = resolution.profile.address.clone().zip(resolution.profile.address_source);
        match resolved {
            Some((address, source)) => info!("Using master {} (from {})", address, source),
            None => warn!("No master address found: pass one explicitly or set KUBERNETES_MASTER"),
        }

        Ok(resolution)
    }

    /// Normalise an address to an explicit `http://` or `https://` URL
    ///
    /// Without a scheme `https://` is assumed. With `verify` the master is
    /// probed and the address rewritten to `scheme://host:port`.
    pub fn infer_scheme(&self, address: &str, verify: bool) -> Result<String> {
        let address = address.trim();
        let candidate = if address.contains("://") {
            address.to_string()
        } else {
            format!("{}://{}", defaults::SERVICE_SCHEME, address)
        };

        let url = reqwest::Url::parse(&candidate)
            .map_err(|e| FactoryError::Address(format!("{}: {}", address, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(FactoryError::Address(format!(
                "{}: unsupported scheme '{}'",
                address,
                url.scheme()
            )));
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(FactoryError::Address(format!("{}: missing host", address))),
        };

        if !verify {
            return Ok(candidate.trim_end_matches('/').to_string());
        }

        let port = url
            .port_or_known_default()
            .ok_or_else(|| FactoryError::Address(format!("{}: missing port", address)))?;
        let scheme = if self.probe.is_tls(host, port) { "https" } else { "http" };
        debug!("Probed {}:{}, using {}", host, port, scheme);

        Ok(format!("{}://{}:{}", scheme, host, port))
    }

    fn apply_cluster_config(&self, resolution: &mut Resolution, verify: bool) -> Result<()> {
        let config = match self.cluster_config.load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("No cluster config available");
                return Ok(());
            }
            Err(e) => {
                resolution.warn(format!("Ignoring cluster config: {}", e));
                return Ok(());
            }
        };

        let context = match config.current_context() {
            Some(context) => context,
            None => {
                debug!("Cluster config has no usable current context");
                return Ok(());
            }
        };

        if let Some(cluster) = config.cluster(context) {
            if let Some(server) = cluster.server.as_deref().filter(|s| !s.trim().is_empty()) {
                resolution.profile.address = Some(self.infer_scheme(server, verify)?);
                resolution.profile.address_source = Some(AddressSource::ClusterConfig);

                if let Some(skip) = cluster.insecure_skip_tls_verify {
                    resolution.profile.trust_all_certificates = skip;
                }
                if let Some(ref ca) = cluster.certificate_authority {
                    if let Some(path) = readable_file(&config.resolve_path(ca), "CA certificate", resolution) {
                        resolution.profile.ca_cert_file = Some(path);
                    }
                }
                if let Some(ref data) = cluster.certificate_authority_data {
                    resolution.profile.ca_cert_data = Some(data.clone());
                }
            }
        }

        if let Some(user) = config.user(context) {
            if let Some(ref cert) = user.client_certificate {
                if let Some(path) = readable_file(&config.resolve_path(cert), "client certificate", resolution) {
                    resolution.profile.client_cert_file = Some(path);
                }
            }
            if let Some(ref data) = user.client_certificate_data {
                resolution.profile.client_cert_data = Some(data.clone());
            }
            if let Some(ref key) = user.client_key {
                if let Some(path) = readable_file(&config.resolve_path(key), "client key", resolution) {
                    resolution.profile.client_key_file = Some(path);
                }
            }
            if let Some(ref data) = user.client_key_data {
                resolution.profile.client_key_data = Some(data.clone());
            }
            if let Some(ref username) = user.username {
                resolution.profile.username = Some(username.clone());
            }
            if let Some(ref password) = user.password {
                resolution.profile.password = Some(Secret::new(password.as_str()));
            }
        }

        Ok(())
    }

    /// In-cluster masters are signed by the CA mounted next to the token
    fn apply_service_account_ca(&self, resolution: &mut Resolution) {
        let profile = &mut resolution.profile;
        if profile.address_source != Some(AddressSource::ServiceDiscovery) || profile.has_ca_material() {
            return;
        }

        let ca = self.service_account_dir.join(defaults::SERVICE_ACCOUNT_CA_FILE);
        if is_readable_file(&ca) {
            debug!("Using service-account CA {}", ca.display());
            profile.ca_cert_file = Some(ca);
        }
    }
}

/// Address from service discovery or the master override
pub fn discover_master(env: &EnvResolver<'_>) -> Option<(String, AddressSource)> {
    if let Some(host) = env.get_string(defaults::KUBERNETES_SERVICE_HOST) {
        let host = host.trim();
        let port = env.get_string_or(defaults::KUBERNETES_SERVICE_PORT, defaults::SERVICE_PORT);
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };

        debug!("Found in-cluster service {}:{}", host, port.trim());
        return Some((
            format!("{}://{}:{}", defaults::SERVICE_SCHEME, host, port.trim()),
            AddressSource::ServiceDiscovery,
        ));
    }

    env.get_property_or_var(defaults::KUBERNETES_MASTER_PROPERTY, defaults::KUBERNETES_MASTER)
        .map(|master| {
            debug!("Found master override {}", master.trim());
            (normalize_legacy_scheme(master.trim()), AddressSource::MasterOverride)
        })
}

/// Rewrite a leading `tcp:` to `https:`, leaving the rest untouched
pub fn normalize_legacy_scheme(address: &str) -> String {
    match address.strip_prefix(defaults::LEGACY_TCP_SCHEME) {
        Some(rest) => format!("https:{}", rest),
        None => address.to_string(),
    }
}

fn apply_environment(env: &EnvResolver<'_>, resolution: &mut Resolution) {
    if env.has_var(defaults::KUBERNETES_TRUST_CERT) {
        resolution.profile.trust_all_certificates = env.get_bool_or(defaults::KUBERNETES_TRUST_CERT, false);
    }
    if env.has_var(defaults::KUBERNETES_DISABLE_HOSTNAME_CHECK) {
        resolution.profile.disable_hostname_checks =
            env.get_bool_or(defaults::KUBERNETES_DISABLE_HOSTNAME_CHECK, false);
    }

    if let Some(path) = env_file(env, defaults::KUBERNETES_CA_CERTIFICATE_FILE, "CA certificate", resolution) {
        resolution.profile.ca_cert_file = Some(path);
    }
    if let Some(data) = env.get_string(defaults::KUBERNETES_CA_CERTIFICATE_DATA) {
        resolution.profile.ca_cert_data = Some(data);
    }

    if let Some(path) = env_file(env, defaults::KUBERNETES_CLIENT_CERTIFICATE_FILE, "client certificate", resolution) {
        resolution.profile.client_cert_file = Some(path);
    }
    if let Some(data) = env.get_string(defaults::KUBERNETES_CLIENT_CERTIFICATE_DATA) {
        resolution.profile.client_cert_data = Some(data);
    }
    if let Some(path) = env_file(env, defaults::KUBERNETES_CLIENT_KEY_FILE, "client key", resolution) {
        resolution.profile.client_key_file = Some(path);
    }
    if let Some(data) = env.get_string(defaults::KUBERNETES_CLIENT_KEY_DATA) {
        resolution.profile.client_key_data = Some(data);
    }

    if let Some(algorithm) = env.get_string(defaults::KUBERNETES_CLIENT_KEY_ALGO) {
        resolution.profile.client_key_algorithm = algorithm.trim().to_string();
    }
    if let Some(password) = env.get_string(defaults::KUBERNETES_CLIENT_KEY_PASSWORD) {
        resolution.profile.client_key_password = Secret::new(password);
    }
}

fn env_file(env: &EnvResolver<'_>, name: &str, what: &str, resolution: &mut Resolution) -> Option<PathBuf> {
    let value = env.get_string(name)?;
    readable_file(Path::new(value.trim()), what, resolution)
}

/// The path if it opens as a regular file, else a soft warning
fn readable_file(path: &Path, what: &str, resolution: &mut Resolution) -> Option<PathBuf> {
    match File::open(path).and_then(|file| file.metadata()) {
        Ok(metadata) if metadata.is_file() => Some(path.to_path_buf()),
        Ok(_) => {
            resolution.warn(format!("Specified {} file {} is not a regular file", what, path.display()));
            None
        }
        Err(e) => {
            resolution.warn(format!("Specified {} file {} is not readable: {}", what, path.display(), e));
            None
        }
    }
}

fn is_readable_file(path: &Path) -> bool {
    File::open(path)
        .and_then(|file| file.metadata())
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

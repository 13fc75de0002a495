//! Default configuration values
//!
//! Single source of truth for the environment variable names, property
//! names, well-known paths and default values used during resolution.

use std::path::PathBuf;
use openssl::ssl::SslVersion;

// Environment variables (each may also be overridden by a same-named property)

/// In-cluster API service host
pub const KUBERNETES_SERVICE_HOST: &str = "KUBERNETES_SERVICE_HOST";

/// In-cluster API service port
pub const KUBERNETES_SERVICE_PORT: &str = "KUBERNETES_SERVICE_PORT";

/// Explicit master address
pub const KUBERNETES_MASTER: &str = "KUBERNETES_MASTER";

/// Disable all certificate validation
pub const KUBERNETES_TRUST_CERT: &str = "KUBERNETES_TRUST_CERT";

/// Disable hostname verification when a CA is configured
pub const KUBERNETES_DISABLE_HOSTNAME_CHECK: &str = "KUBERNETES_DISABLE_HOSTNAME_CHECK";

pub const KUBERNETES_CA_CERTIFICATE_FILE: &str = "KUBERNETES_CA_CERTIFICATE_FILE";
pub const KUBERNETES_CA_CERTIFICATE_DATA: &str = "KUBERNETES_CA_CERTIFICATE_DATA";
pub const KUBERNETES_CLIENT_CERTIFICATE_FILE: &str = "KUBERNETES_CLIENT_CERTIFICATE_FILE";
pub const KUBERNETES_CLIENT_CERTIFICATE_DATA: &str = "KUBERNETES_CLIENT_CERTIFICATE_DATA";
pub const KUBERNETES_CLIENT_KEY_FILE: &str = "KUBERNETES_CLIENT_KEY_FILE";
pub const KUBERNETES_CLIENT_KEY_DATA: &str = "KUBERNETES_CLIENT_KEY_DATA";
pub const KUBERNETES_CLIENT_KEY_ALGO: &str = "KUBERNETES_CLIENT_KEY_ALGO";
pub const KUBERNETES_CLIENT_KEY_PASSWORD: &str = "KUBERNETES_CLIENT_KEY_PASSWORD";

/// Kubeconfig path list
pub const KUBECONFIG: &str = "KUBECONFIG";

// Properties

/// Property form of the master address, checked before `KUBERNETES_MASTER`
pub const KUBERNETES_MASTER_PROPERTY: &str = "kubernetes.master";

/// Whether scheme inference probes the master
pub const KUBERNETES_VERIFY_PROPERTY: &str = "kubernetes.verify";

// Well-known locations

/// Directory mounted into pods with the service-account credentials
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Token file name inside the service-account directory
pub const SERVICE_ACCOUNT_TOKEN_FILE: &str = "token";

/// CA bundle file name inside the service-account directory
pub const SERVICE_ACCOUNT_CA_FILE: &str = "ca.crt";

/// Kubeconfig location relative to the home directory
pub const KUBECONFIG_HOME_PATH: &str = ".kube/config";

// Values

/// Scheme used for in-cluster discovery
pub const SERVICE_SCHEME: &str = "https";

/// Port used when `KUBERNETES_SERVICE_PORT` is unset
pub const SERVICE_PORT: &str = "443";

/// Legacy master scheme rewritten to `https:`
pub const LEGACY_TCP_SCHEME: &str = "tcp:";

pub const CLIENT_KEY_ALGORITHM: &str = "RSA";

pub const CLIENT_KEY_PASSWORD: &str = "changeit";

/// Default for `kubernetes.verify`
pub const VERIFY_ADDRESS: bool = true;

/// Lowest protocol version the stream client negotiates
pub const STREAM_TLS_MIN: SslVersion = SslVersion::TLS1_2;

/// Highest protocol version the stream client negotiates
pub const STREAM_TLS_MAX: SslVersion = SslVersion::TLS1_3;

/// Default service-account directory
pub fn service_account_dir() -> PathBuf {
    PathBuf::from(SERVICE_ACCOUNT_DIR)
}

/// Default client key password
pub fn client_key_password() -> String {
    CLIENT_KEY_PASSWORD.to_string()
}

/// Default client key algorithm
pub fn client_key_algorithm() -> String {
    CLIENT_KEY_ALGORITHM.to_string()
}

//! Configuration module
//!
//! This module resolves the connection profile from properties, environment
//! variables and the cluster-config file.

pub mod defaults;
pub mod env;
pub mod kubeconfig;
pub mod profile;
pub mod resolver;

// Re-export types and traits
pub use self::env::{EnvResolver, EnvironmentSource, MapEnvironment, ProcessEnvironment};
pub use self::kubeconfig::{ClusterConfigSource, InMemoryClusterConfig, KubeConfig, KubeConfigFile};
pub use self::profile::{log_profile, AddressSource, ConnectionProfile, Secret};
pub use self::resolver::{discover_master, normalize_legacy_scheme, ProfileResolver, Resolution};

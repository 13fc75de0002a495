//! Kubernetes client factory
//!
//! Resolves where a Kubernetes master lives and how to talk to it from
//! partial, possibly conflicting sources, then builds ready-to-use clients.
//!
//! # Main Features
//!
//! - Address discovery: explicit address, in-cluster service variables,
//!   `KUBERNETES_MASTER` and the kubeconfig current context
//! - Trust selection: system roots, custom CA bundles or trust-all
//! - Client certificate identity, service-account and kubeconfig bearer
//!   tokens, basic auth
//! - HTTP (reqwest) and websocket (tokio-tungstenite) clients sharing one
//!   transport security decision
//!
//! # Example
//!
//! ```no_run
//! use kube_client_factory::{KubeClientFactory, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let factory = KubeClientFactory::new()?;
//!     for warning in factory.warnings() {
//!         eprintln!("warning: {}", warning);
//!     }
//!
//!     let client = factory.build_http_client()?;
//!     let version: serde_json::Value = client.get_json("version").await?;
//!     println!("{}", version);
//!
//!     let stream = factory.build_stream_client()?;
//!     let _socket = stream.connect("api/v1/watch/pods").await?;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod client;
pub mod common;
pub mod config;
pub mod tls;

// Re-export commonly used structures and functions for convenience
pub use client::{FactoryBuilder, HttpClient, KubeClientFactory, StreamClient};
pub use common::{FactoryError, Result};
pub use config::{ConnectionProfile, EnvironmentSource, MapEnvironment, ProcessEnvironment};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

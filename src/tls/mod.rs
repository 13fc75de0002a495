//! TLS handling module
//!
//! This module decides how clients trust the master and which identity they
//! present, and probes masters for TLS support.

pub mod material;
pub mod probe;
pub mod security;

#[cfg(test)]
pub(crate) mod testing;

pub use probe::{SchemeProbe, TlsProbe};
pub use security::{ClientIdentity, TransportSecurity, TrustPolicy};

//! Transport security decision
//!
//! Turns a [`ConnectionProfile`] into the trust policy and optional client
//! identity that both the HTTP and the websocket client install, so the two
//! transports always present the same identity and trust the same roots.

use std::fmt;
use log::{debug, info};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;

use crate::common::{FactoryError, Result};
use crate::config::profile::{ConnectionProfile, Secret};
use crate::tls::material;

/// How server certificates are validated
#[derive(Clone)]
pub enum TrustPolicy {
    /// Platform trust store
    SystemDefault,
    /// No certificate or hostname validation at all
    TrustAll,
    /// Only the configured CA certificates are trusted
    CustomCa {
        roots: Vec<X509>,
        verify_hostname: bool,
    },
}

impl fmt::Debug for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustPolicy::SystemDefault => write!(f, "SystemDefault"),
            TrustPolicy::TrustAll => write!(f, "TrustAll"),
            TrustPolicy::CustomCa { roots, verify_hostname } => f
                .debug_struct("CustomCa")
                .field("roots", &roots.len())
                .field("verify_hostname", verify_hostname)
                .finish(),
        }
    }
}

/// Client certificate chain and private key for mutual TLS
#[derive(Clone)]
pub struct ClientIdentity {
    chain: Vec<X509>,
    key: PKey<Private>,
    password: Secret,
}

impl ClientIdentity {
    /// Load and cross-check the identity described by the profile
    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self> {
        let chain = material::load_certificate_chain(
            profile.client_cert_data.as_deref(),
            profile.client_cert_file.as_deref(),
        )?;
        let key = material::load_private_key(
            profile.client_key_data.as_deref(),
            profile.client_key_file.as_deref(),
            &profile.client_key_algorithm,
            profile.client_key_password.expose(),
        )?;

        let leaf_key = chain[0].public_key()?;
        if !leaf_key.public_eq(&key) {
            return Err(FactoryError::Transport(
                "Client key does not match the client certificate".to_string(),
            ));
        }

        Ok(Self {
            chain,
            key,
            password: profile.client_key_password.clone(),
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.chain[0]
    }

    pub fn subject(&self) -> String {
        self.chain[0]
            .subject_name()
            .entries()
            .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// PKCS#12 key store protected by the configured key password
    pub fn to_pkcs12_der(&self) -> Result<Vec<u8>> {
        let mut builder = Pkcs12::builder();
        builder.name("client");
        builder.pkey(&self.key);
        builder.cert(&self.chain[0]);

        if self.chain.len() > 1 {
            let mut extra = Stack::new()?;
            for cert in &self.chain[1..] {
                extra.push(cert.clone())?;
            }
            builder.ca(extra);
        }

        let pkcs12 = builder.build2(self.password.expose())?;
        Ok(pkcs12.to_der()?)
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("subject", &self.subject())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// Trust policy plus optional client identity
#[derive(Debug, Clone)]
pub struct TransportSecurity {
    trust: TrustPolicy,
    identity: Option<ClientIdentity>,
}

impl TransportSecurity {
    /// Decide trust and identity for a profile
    ///
    /// Trust-all beats any CA material. Half an identity (certificate without
    /// key or key without certificate) is an error.
    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self> {
        let trust = if profile.trust_all_certificates {
            if profile.has_ca_material() {
                debug!("Trust-all is enabled, ignoring configured CA material");
            }
            TrustPolicy::TrustAll
        } else if profile.has_ca_material() {
            let roots = material::load_ca_certificates(
                profile.ca_cert_data.as_deref(),
                profile.ca_cert_file.as_deref(),
            )?;
            TrustPolicy::CustomCa {
                roots,
                verify_hostname: !profile.disable_hostname_checks,
            }
        } else {
            TrustPolicy::SystemDefault
        };

        if profile.has_partial_client_identity() {
            let missing = if profile.has_client_cert() { "client key" } else { "client certificate" };
            return Err(FactoryError::Transport(format!(
                "Client identity is incomplete: {} is missing",
                missing
            )));
        }

        let identity = if profile.has_client_identity() {
            let identity = ClientIdentity::from_profile(profile)?;
            info!("Using client certificate {}", identity.subject());
            Some(identity)
        } else {
            None
        };

        Ok(Self { trust, identity })
    }

    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }

    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    pub fn accepts_any_certificate(&self) -> bool {
        matches!(self.trust, TrustPolicy::TrustAll)
    }

    pub fn verifies_hostname(&self) -> bool {
        match &self.trust {
            TrustPolicy::TrustAll => false,
            TrustPolicy::CustomCa { verify_hostname, .. } => *verify_hostname,
            TrustPolicy::SystemDefault => true,
        }
    }

    /// Install trust and identity on a reqwest builder
    pub fn configure_http(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        let mut builder = builder.use_native_tls();

        match &self.trust {
            TrustPolicy::SystemDefault => {}
            TrustPolicy::TrustAll => {
                builder = builder
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true);
            }
            TrustPolicy::CustomCa { roots, verify_hostname } => {
                builder = builder.tls_built_in_root_certs(false);
                for root in roots {
                    builder = builder.add_root_certificate(reqwest::Certificate::from_der(&root.to_der()?)?);
                }
                if !verify_hostname {
                    builder = builder.danger_accept_invalid_hostnames(true);
                }
            }
        }

        if let Some(identity) = &self.identity {
            let der = identity.to_pkcs12_der()?;
            builder = builder.identity(reqwest::Identity::from_pkcs12_der(&der, identity.password.expose())?);
        }

        Ok(builder)
    }

    /// OpenSSL connector restricted to the given protocol range
    ///
    /// Hostname checking is applied per connection, see [`Self::verifies_hostname`].
    pub fn ssl_connector(&self, min: SslVersion, max: SslVersion) -> Result<SslConnector> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;
        builder.set_min_proto_version(Some(min))?;
        builder.set_max_proto_version(Some(max))?;

        match &self.trust {
            TrustPolicy::SystemDefault => {}
            TrustPolicy::TrustAll => builder.set_verify(SslVerifyMode::NONE),
            TrustPolicy::CustomCa { roots, .. } => {
                let mut store = X509StoreBuilder::new()?;
                for root in roots {
                    store.add_cert(root.clone())?;
                }
                builder.set_cert_store(store.build());
                builder.set_verify(SslVerifyMode::PEER);
            }
        }

        if let Some(identity) = &self.identity {
            builder.set_certificate(&identity.chain[0])?;
            for extra in &identity.chain[1..] {
                builder.add_extra_chain_cert(extra.clone())?;
            }
            builder.set_private_key(&identity.key)?;
            builder.check_private_key()?;
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::tls::testing::{cert_pem, key_pem, TestPki};

    fn profile_with_identity(pki: &TestPki) -> ConnectionProfile {
        let (cert, key) = pki.issue("client");
        ConnectionProfile {
            client_cert_data: Some(cert_pem(&cert)),
            client_key_data: Some(key_pem(&key)),
            ..Default::default()
        }
    }

    #[test]
    fn test_system_default_without_material() {
        let security = TransportSecurity::from_profile(&ConnectionProfile::default()).unwrap();
        assert!(matches!(security.trust(), TrustPolicy::SystemDefault));
        assert!(security.identity().is_none());
        assert!(security.verifies_hostname());
    }

    #[test]
    fn test_trust_all_wins_over_ca() {
        let pki = TestPki::new();
        let profile = ConnectionProfile {
            trust_all_certificates: true,
            ca_cert_data: Some(pki.ca_pem()),
            ..Default::default()
        };

        let security = TransportSecurity::from_profile(&profile).unwrap();
        assert!(security.accepts_any_certificate());
        assert!(!security.verifies_hostname());
    }

    #[test]
    fn test_trust_all_ignores_broken_ca() {
        let profile = ConnectionProfile {
            trust_all_certificates: true,
            ca_cert_data: Some("not a certificate".to_string()),
            ..Default::default()
        };

        assert!(TransportSecurity::from_profile(&profile).unwrap().accepts_any_certificate());
    }

    #[test]
    fn test_custom_ca_with_hostname_checks_disabled() {
        let pki = TestPki::new();
        let profile = ConnectionProfile {
            ca_cert_data: Some(pki.ca_pem()),
            ca_cert_file: Some(PathBuf::from("/nonexistent/ca.crt")),
            disable_hostname_checks: true,
            ..Default::default()
        };

        let security = TransportSecurity::from_profile(&profile).unwrap();
        match security.trust() {
            TrustPolicy::CustomCa { roots, verify_hostname } => {
                assert_eq!(roots.len(), 1);
                assert!(!verify_hostname);
            }
            other => panic!("expected custom CA, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_identity_is_error() {
        let pki = TestPki::new();
        let mut profile = profile_with_identity(&pki);
        profile.client_key_data = None;

        let err = TransportSecurity::from_profile(&profile).unwrap_err();
        assert!(err.is_transport_error());
        assert!(err.to_string().contains("client key is missing"));
    }

    #[test]
    fn test_mismatched_key_is_error() {
        let pki = TestPki::new();
        let mut profile = profile_with_identity(&pki);
        let (_, other_key) = pki.issue("other");
        profile.client_key_data = Some(key_pem(&other_key));

        assert!(TransportSecurity::from_profile(&profile).is_err());
    }

    #[test]
    fn test_identity_builds_connector_and_pkcs12() {
        let pki = TestPki::new();
        let mut profile = profile_with_identity(&pki);
        profile.ca_cert_data = Some(pki.ca_pem());

        let security = TransportSecurity::from_profile(&profile).unwrap();
        let identity = security.identity().unwrap();
        assert_eq!(identity.subject(), "client");

        let der = identity.to_pkcs12_der().unwrap();
        let parsed = Pkcs12::from_der(&der).unwrap().parse2("changeit").unwrap();
        assert!(parsed.pkey.is_some());

        security.ssl_connector(SslVersion::TLS1_2, SslVersion::TLS1_3).unwrap();
        security.configure_http(reqwest::Client::builder()).unwrap().build().unwrap();
    }
}

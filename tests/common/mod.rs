//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::Path;
use kube_client_factory::config::InMemoryClusterConfig;
use kube_client_factory::tls::SchemeProbe;
use kube_client_factory::{FactoryBuilder, KubeClientFactory, MapEnvironment};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509Builder, X509NameBuilder, X509};

/// Probe with a fixed answer
pub struct FixedProbe(pub bool);

impl SchemeProbe for FixedProbe {
    fn is_tls(&self, _host: &str, _port: u16) -> bool {
        self.0
    }
}

/// Builder with no real sources attached
pub fn isolated(env: MapEnvironment, service_account_dir: &Path) -> FactoryBuilder {
    KubeClientFactory::builder()
        .with_environment(env)
        .with_cluster_config(InMemoryClusterConfig(None))
        .with_probe(FixedProbe(true))
        .with_service_account_dir(service_account_dir)
        .verify(false)
}

/// Self-signed CA plus issued leaf certificates
///
/// Mirrors the crate's unit-test PKI: CN `test-ca`, leaves valid for 30 days
/// with SANs localhost and 127.0.0.1.
pub struct Pki {
    pub ca_cert: X509,
    ca_key: PKey<Private>,
}

impl Pki {
    pub fn new() -> Self {
        let ca_key = rsa_key();
        let ca_cert = build_cert("test-ca", &ca_key, None, true);
        Self { ca_cert, ca_key }
    }

    pub fn ca_pem(&self) -> String {
        String::from_utf8(self.ca_cert.to_pem().unwrap()).unwrap()
    }

    /// PEM certificate and PKCS#8 key for `cn`, valid for localhost and 127.0.0.1
    pub fn issue_pem(&self, cn: &str) -> (String, String) {
        let key = rsa_key();
        let cert = build_cert(cn, &key, Some((&self.ca_cert, &self.ca_key)), false);
        (
            String::from_utf8(cert.to_pem().unwrap()).unwrap(),
            String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap(),
        )
    }

    /// Server-side acceptor presenting a leaf issued for `cn`
    pub fn acceptor(&self, cn: &str) -> SslAcceptor {
        let (cert, key) = self.issue_pem(cn);
        let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
        acceptor.set_certificate(&X509::from_pem(cert.as_bytes()).unwrap()).unwrap();
        acceptor.set_private_key(&PKey::private_key_from_pem(key.as_bytes()).unwrap()).unwrap();
        acceptor.build()
    }
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn build_cert(
    cn: &str,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    is_ca: bool,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = {
        let mut bn = BigNum::new().unwrap();
        bn.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
        bn.to_asn1_integer().unwrap()
    };
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();

    match issuer {
        Some((issuer_cert, _)) => builder.set_issuer_name(issuer_cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }

    if is_ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
    } else {
        let san = SubjectAlternativeName::new()
            .dns("localhost")
            .ip("127.0.0.1")
            .build(&builder.x509v3_context(issuer.map(|(c, _)| &**c), None))
            .unwrap();
        builder.append_extension(san).unwrap();
    }

    let signing_key = issuer.map_or(key, |(_, k)| k);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

//! Test PKI generated on the fly

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509Builder, X509NameBuilder, X509};

/// CA `test-ca` issuing 30-day leaves for localhost and 127.0.0.1
pub(crate) struct TestPki {
    pub ca_cert: X509,
    pub ca_key: PKey<Private>,
}

impl TestPki {
    pub fn new() -> Self {
        let ca_key = rsa_key();
        let ca_cert = build_cert("test-ca", &ca_key, None, true);
        Self { ca_cert, ca_key }
    }

    /// Issue a leaf certificate for `cn`, valid for localhost and 127.0.0.1
    pub fn issue(&self, cn: &str) -> (X509, PKey<Private>) {
        let key = rsa_key();
        let cert = build_cert(cn, &key, Some((&self.ca_cert, &self.ca_key)), false);
        (cert, key)
    }

    pub fn ca_pem(&self) -> String {
        String::from_utf8(self.ca_cert.to_pem().unwrap()).unwrap()
    }
}

pub(crate) fn cert_pem(cert: &X509) -> String {
    String::from_utf8(cert.to_pem().unwrap()).unwrap()
}

pub(crate) fn key_pem(key: &PKey<Private>) -> String {
    String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap()
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

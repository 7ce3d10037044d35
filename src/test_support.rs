//! Certificate and identity fixtures shared by unit tests.

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, SanType, SerialNumber,
};

use crate::auth::{Fingerprint, Identity};
use crate::broker::topic::Topic;

pub struct TestCa {
    pub cert: Certificate,
    pub key: KeyPair,
}

pub struct TestLeaf {
    pub cert: Certificate,
    pub key: KeyPair,
}

fn name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn
}

pub fn generate_ca(common_name: &str) -> TestCa {
    let mut params = CertificateParams::default();
    params.distinguished_name = name(common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let key = KeyPair::generate().expect("ca key");
    let cert = params.self_signed(&key).expect("self-sign ca");
    TestCa { cert, key }
}

pub fn generate_client(ca: &TestCa, common_name: &str, serial: &[u8]) -> TestLeaf {
    let mut params = CertificateParams::default();
    params.distinguished_name = name(common_name);
    params.serial_number = Some(SerialNumber::from_slice(serial));
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    let key = KeyPair::generate().expect("client key");
    let cert = params
        .signed_by(&key, &ca.cert, &ca.key)
        .expect("sign client cert");
    TestLeaf { cert, key }
}

pub fn generate_server(ca: &TestCa) -> TestLeaf {
    let mut params =
        CertificateParams::new(vec!["localhost".to_string()]).expect("server params");
    params.distinguished_name = name("localhost");
    params
        .subject_alt_names
        .push(SanType::IpAddress("127.0.0.1".parse().expect("ip")));
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    let key = KeyPair::generate().expect("server key");
    let cert = params
        .signed_by(&key, &ca.cert, &ca.key)
        .expect("sign server cert");
    TestLeaf { cert, key }
}

pub fn topic(name: &str) -> Topic {
    Topic::parse(name).expect("valid topic")
}

pub fn identity(name: &str, serial: &str, read: &[&Topic], write: &[&Topic]) -> Identity {
    Identity::new(
        name,
        Fingerprint::parse(serial).expect("valid serial"),
        read.iter().map(|t| (*t).clone()),
        write.iter().map(|t| (*t).clone()),
    )
}

//! Self-signed RSA identities packed into PKCS#12.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder};

/// An RSA key with a matching self-signed certificate.
pub struct TestIdentity {
    key: PKey<Private>,
    certificate: X509,
    certificate_der: Vec<u8>,
}

impl TestIdentity {
    /// 2048-bit RSA identity whose subject CN is `common_name`.
    pub fn generate(common_name: &str) -> Self {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::COUNTRYNAME, "EC").unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, common_name)
            .unwrap();
        Self::self_signed(name.build())
    }

    /// Identity whose subject carries only an organization.
    pub fn generate_without_cn(organization: &str) -> Self {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, organization)
            .unwrap();
        Self::self_signed(name.build())
    }

    fn self_signed(subject: X509Name) -> Self {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&subject).unwrap();
        builder.set_issuer_name(&subject).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(365).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        let certificate = builder.build();
        let certificate_der = certificate.to_der().unwrap();

        Self {
            key,
            certificate,
            certificate_der,
        }
    }

    pub fn key(&self) -> &PKey<Private> {
        &self.key
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// PKCS#12 container protected by `password`.
    pub fn pkcs12(&self, password: &str) -> Vec<u8> {
        Pkcs12::builder()
            .name("firma-test")
            .pkey(&self.key)
            .cert(&self.certificate)
            .build2(password)
            .unwrap()
            .to_der()
            .unwrap()
    }

    /// PKCS#12 container holding the certificate but no private key.
    pub fn certificate_only_pkcs12(&self, password: &str) -> Vec<u8> {
        Pkcs12::builder()
            .name("firma-test")
            .cert(&self.certificate)
            .build2(password)
            .unwrap()
            .to_der()
            .unwrap()
    }
}

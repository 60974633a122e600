use chrono::{Duration, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, CrlDistributionPoint,
    CustomExtension, DistinguishedName, DnType, IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose,
    RevokedCertParams, SerialNumber, PKCS_ECDSA_P256_SHA256,
};
use tempfile::TempDir;
use time::OffsetDateTime;

use super::crl::MockCrlFetcher;
use super::*;
use crate::error::{error_codes, CryptoError};
use crate::key::{compute_ski, KeyGenOpt, KeyId, KeyRecoverer, KeyRegistry};

const CRL_URL: &str = "http://crl.example.test/root.crl";

struct Issuer {
    cert: rcgen::Certificate,
    key: KeyPair,
}

fn params(name: &str, serial: u64, ca: bool, crl_url: Option<&str>) -> CertificateParams {
    let mut params = CertificateParams::new(vec![format!("{}.example.test", serial)]).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, name);
    params.serial_number = Some(SerialNumber::from(serial));
    params.not_before = OffsetDateTime::now_utc() - time::Duration::days(1);
    params.not_after = OffsetDateTime::now_utc() + time::Duration::days(30);

    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
    }
    if let Some(url) = crl_url {
        params.crl_distribution_points = vec![CrlDistributionPoint {
            uris: vec![url.to_string()],
        }];
    }
    params
}

fn root(name: &str) -> Issuer {
    let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
    let cert = params(name, 1, true, None).self_signed(&key).unwrap();
    Issuer { cert, key }
}

fn issue(issuer: &Issuer, name: &str, serial: u64, crl_url: Option<&str>) -> (Certificate, KeyPair) {
    let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
    let cert = params(name, serial, false, crl_url)
        .signed_by(&key, &issuer.cert, &issuer.key)
        .unwrap();
    (Certificate::from_der(cert.der()).unwrap(), key)
}

fn issue_ca(issuer: &Issuer, name: &str, serial: u64) -> Issuer {
    let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
    let cert = params(name, serial, true, None)
        .signed_by(&key, &issuer.cert, &issuer.key)
        .unwrap();
    Issuer { cert, key }
}

fn as_cert(issuer: &Issuer) -> Certificate {
    Certificate::from_der(issuer.cert.der()).unwrap()
}

fn crl(issuer: &Issuer, revoked: &[u64], next_update: OffsetDateTime) -> Vec<u8> {
    let now = OffsetDateTime::now_utc();
    let params = CertificateRevocationListParams {
        this_update: now - time::Duration::hours(2),
        next_update,
        crl_number: SerialNumber::from(1u64),
        issuing_distribution_point: None,
        revoked_certs: revoked
            .iter()
            .map(|serial| RevokedCertParams {
                serial_number: SerialNumber::from(*serial),
                revocation_time: now - time::Duration::hours(1),
                reason_code: None,
                invalidity_date: None,
            })
            .collect(),
        key_identifier_method: KeyIdMethod::Sha256,
    };
    params
        .signed_by(&issuer.cert, &issuer.key)
        .unwrap()
        .der()
        .to_vec()
}

fn trust_dir(roots: &[&Issuer]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for root in roots {
        store_cert(&as_cert(root), dir.path()).unwrap();
    }
    dir
}

fn serving(der: Vec<u8>) -> Box<MockCrlFetcher> {
    let mut fetcher = MockCrlFetcher::new();
    fetcher
        .expect_fetch()
        .returning(move |_| Ok(der.clone()));
    Box::new(fetcher)
}

fn unreachable() -> Box<MockCrlFetcher> {
    let mut fetcher = MockCrlFetcher::new();
    fetcher.expect_fetch().returning(|url| {
        Err(CryptoError::revocation_failure(
            "connection refused",
            error_codes::CRL_UNAVAILABLE,
            Some(url),
        ))
    });
    Box::new(fetcher)
}

fn no_fetch() -> Box<MockCrlFetcher> {
    let mut fetcher = MockCrlFetcher::new();
    fetcher.expect_fetch().never();
    Box::new(fetcher)
}

#[test]
fn test_certificate_fields() {
    let ca = root("Test Root CA");
    let (leaf, leaf_key) = issue(&ca, "client", 44, Some(CRL_URL));

    assert_eq!(leaf.subject(), "CN=client");
    assert_eq!(leaf.issuer(), "CN=Test Root CA");
    assert_eq!(leaf.serial(), &[44u8]);
    assert_eq!(leaf.crl_distribution_points(), &[CRL_URL.to_string()]);
    assert!(leaf.is_valid_at(Utc::now()));
    assert!(!leaf.is_self_signed());
    assert!(as_cert(&ca).is_self_signed());

    // the certificate id is the id of the certified key
    let expected = KeyId::from_ski(&compute_ski(leaf_key.public_key_raw()));
    assert_eq!(leaf.id(), expected);

    let registry = KeyRegistry::with_defaults().unwrap();
    let key = registry
        .recover_key(leaf_key.public_key_raw(), KeyGenOpt::Ecdsa256, false)
        .unwrap();
    assert_eq!(key.id(), leaf.id());
}

#[test]
fn test_pem_encoding() {
    let ca = root("Test Root CA");
    let cert = as_cert(&ca);
    let pem = cert.to_pem().unwrap();

    assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
    assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
    assert!(pem.lines().all(|line| line.len() <= 64));
    assert_eq!(Certificate::from_pem(&pem).unwrap(), cert);

    assert!(Certificate::from_pem("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n").is_err());
    assert!(Certificate::from_der(b"not a certificate").is_err());
}

#[test]
fn test_store_and_load() {
    let dir = TempDir::new().unwrap();
    let ca = root("Test Root CA");
    let cert = as_cert(&ca);

    let id = store_cert(&cert, dir.path()).unwrap();
    assert_eq!(id, cert.id());
    assert_eq!(load_cert(id.as_str(), dir.path()).unwrap(), cert);
    assert_eq!(load_all_certs(dir.path()).unwrap(), vec![cert]);
}

#[test]
fn test_store_does_not_clobber() {
    let dir = TempDir::new().unwrap();
    let ca = root("Test Root CA");
    let cert = as_cert(&ca);
    let id = store_cert(&cert, dir.path()).unwrap();

    let path = dir.path().join(id.as_str());
    std::fs::write(&path, b"placeholder").unwrap();
    store_cert(&cert, dir.path()).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"placeholder");
}

#[test]
fn test_load_missing_or_malformed() {
    let dir = TempDir::new().unwrap();
    let ca = root("Test Root CA");
    let cert = as_cert(&ca);

    let err = load_cert(cert.id().as_str(), dir.path()).unwrap_err();
    assert!(matches!(err, CryptoError::CertificateNotFound { .. }));

    std::fs::write(dir.path().join(cert.id().as_str()), b"garbage").unwrap();
    let err = load_cert(cert.id().as_str(), dir.path()).unwrap_err();
    assert!(matches!(err, CryptoError::CertificateNotFound { .. }));

    let err = load_cert("../etc/passwd", dir.path()).unwrap_err();
    assert!(matches!(err, CryptoError::CertificateNotFound { .. }));
}

#[test]
fn test_two_level_chain() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, None);
    let dir = trust_dir(&[&ca]);

    let validator = TrustValidator::new(no_fetch(), CrlFailurePolicy::FailClosed);
    let chain = validator.verify_cert_chain(&leaf, dir.path()).unwrap();

    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0], leaf);
    assert_eq!(chain[1], as_cert(&ca));
}

#[test]
fn test_three_level_chain() {
    let ca = root("Test Root CA");
    let intermediate = issue_ca(&ca, "Intermediate CA", 2);
    let (leaf, _) = issue(&intermediate, "client", 44, None);

    let dir = trust_dir(&[&ca]);
    store_cert(&as_cert(&intermediate), dir.path()).unwrap();

    let validator = TrustValidator::new(no_fetch(), CrlFailurePolicy::FailClosed);
    let chain = validator.verify_cert_chain(&leaf, dir.path()).unwrap();
    assert_eq!(chain.len(), 3);
}

#[test]
fn test_signature_from_impostor_issuer() {
    let ca = root("Test Root CA");
    let impostor = root("Test Root CA");
    let (leaf, _) = issue(&impostor, "client", 44, None);
    let dir = trust_dir(&[&ca]);

    let validator = TrustValidator::new(no_fetch(), CrlFailurePolicy::FailClosed);
    let err = validator.verify_cert_chain(&leaf, dir.path()).unwrap_err();
    assert!(matches!(err, CryptoError::ChainValidationError { .. }));
    assert_eq!(err.error_code(), error_codes::CHAIN_BROKEN_LINK);
}

#[test]
fn test_missing_issuer_and_untrusted_root() {
    let ca = root("Test Root CA");
    let other = root("Other Root CA");
    let (leaf, _) = issue(&other, "client", 44, None);
    let dir = trust_dir(&[&ca]);

    let validator = TrustValidator::new(no_fetch(), CrlFailurePolicy::FailClosed);
    let err = validator.verify_cert_chain(&leaf, dir.path()).unwrap_err();
    assert_eq!(err.error_code(), error_codes::CHAIN_ISSUER_MISSING);

    let err = validator
        .verify_cert_chain(&as_cert(&other), dir.path())
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::CHAIN_ISSUER_MISSING);

    let missing = dir.path().join("nope");
    assert!(validator.verify_cert_chain(&leaf, &missing).is_err());
}

#[test]
fn test_expired_certificate() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, None);
    let dir = trust_dir(&[&ca]);

    let validator = TrustValidator::new(no_fetch(), CrlFailurePolicy::FailClosed);
    let later = leaf.not_after() + Duration::days(1);
    let err = validator
        .verify_cert_chain_at(&leaf, dir.path(), later)
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::CHAIN_CERT_EXPIRED);

    let earlier = leaf.not_before() - Duration::days(1);
    assert!(validator.verify_cert_at(&leaf, earlier).is_err());
}

#[test]
fn test_no_distribution_point_skips_revocation() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, None);

    let validator = TrustValidator::new(no_fetch(), CrlFailurePolicy::FailClosed);
    validator.verify_cert(&leaf).unwrap();
}

#[test]
fn test_malformed_distribution_points() {
    let ca = root("Test Root CA");
    let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
    let mut leaf_params = params("client", 44, false, None);
    leaf_params
        .custom_extensions
        .push(CustomExtension::from_oid_content(&[2, 5, 29, 31], vec![0x04, 0x02, 0xde, 0xad]));
    let leaf = leaf_params.signed_by(&key, &ca.cert, &ca.key).unwrap();
    let leaf = Certificate::from_der(leaf.der()).unwrap();

    assert!(leaf.crl_distribution_points().is_empty());
    assert!(leaf.crl_distribution_points_error().is_some());

    let closed = TrustValidator::new(no_fetch(), CrlFailurePolicy::FailClosed);
    let err = closed.verify_cert(&leaf).unwrap_err();
    assert!(matches!(err, CryptoError::RevocationCheckFailure { .. }));
    assert_eq!(err.error_code(), error_codes::CRL_INVALID);

    let open = TrustValidator::new(no_fetch(), CrlFailurePolicy::FailOpen);
    open.verify_cert(&leaf).unwrap();

    let (plain, _) = issue(&ca, "plain", 45, None);
    assert!(plain.crl_distribution_points_error().is_none());
}

#[test]
fn test_revoked_certificate() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, Some(CRL_URL));
    let der = crl(&ca, &[44], OffsetDateTime::now_utc() + time::Duration::days(7));

    let validator = TrustValidator::new(serving(der), CrlFailurePolicy::FailClosed);
    let err = validator.verify_cert(&leaf).unwrap_err();
    assert!(matches!(err, CryptoError::RevocationCheckFailure { .. }));
    assert_eq!(err.error_code(), error_codes::CERTIFICATE_REVOKED);
    assert_eq!(
        err.technical_details().get("crl_url").map(String::as_str),
        Some(CRL_URL)
    );
}

#[test]
fn test_revocation_in_the_future_is_ignored() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, Some(CRL_URL));
    let der = crl(&ca, &[44], OffsetDateTime::now_utc() + time::Duration::days(7));

    let validator = TrustValidator::new(serving(der), CrlFailurePolicy::FailClosed);
    let before_revocation = Utc::now() - Duration::hours(3);
    validator.verify_cert_at(&leaf, before_revocation).unwrap();
}

#[test]
fn test_unlisted_serial_passes() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, Some(CRL_URL));
    let der = crl(&ca, &[45, 46], OffsetDateTime::now_utc() + time::Duration::days(7));
    let dir = trust_dir(&[&ca]);

    let validator = TrustValidator::new(serving(der), CrlFailurePolicy::FailClosed);
    validator.verify_cert(&leaf).unwrap();
    assert_eq!(validator.verify(&leaf, dir.path()).unwrap().len(), 2);
}

#[test]
fn test_full_verify_rejects_revoked() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, Some(CRL_URL));
    let der = crl(&ca, &[44], OffsetDateTime::now_utc() + time::Duration::days(7));
    let dir = trust_dir(&[&ca]);

    let validator = TrustValidator::new(serving(der), CrlFailurePolicy::FailClosed);
    let err = validator.verify(&leaf, dir.path()).unwrap_err();
    assert_eq!(err.error_code(), error_codes::CERTIFICATE_REVOKED);
}

#[test]
fn test_crl_signed_by_other_issuer() {
    let ca = root("Test Root CA");
    let other = root("Other Root CA");
    let (leaf, _) = issue(&ca, "client", 44, Some(CRL_URL));
    let forged = crl(&other, &[], OffsetDateTime::now_utc() + time::Duration::days(7));
    let dir = trust_dir(&[&ca]);

    let validator = TrustValidator::new(serving(forged), CrlFailurePolicy::FailClosed);
    let err = validator.verify(&leaf, dir.path()).unwrap_err();
    assert_eq!(err.error_code(), error_codes::CRL_INVALID);
}

#[test]
fn test_stale_crl() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, Some(CRL_URL));
    let stale = crl(&ca, &[], OffsetDateTime::now_utc() - time::Duration::minutes(30));

    let closed = TrustValidator::new(serving(stale.clone()), CrlFailurePolicy::FailClosed);
    let err = closed.verify_cert(&leaf).unwrap_err();
    assert_eq!(err.error_code(), error_codes::CRL_INVALID);

    let open = TrustValidator::new(serving(stale), CrlFailurePolicy::FailOpen);
    open.verify_cert(&leaf).unwrap();
}

#[test]
fn test_unreachable_crl_policy() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, Some(CRL_URL));

    let closed = TrustValidator::new(unreachable(), CrlFailurePolicy::FailClosed);
    let err = closed.verify_cert(&leaf).unwrap_err();
    assert!(matches!(err, CryptoError::RevocationCheckFailure { .. }));
    assert_eq!(err.error_code(), error_codes::CRL_UNAVAILABLE);

    let open = TrustValidator::new(unreachable(), CrlFailurePolicy::FailOpen);
    open.verify_cert(&leaf).unwrap();
}

#[test]
fn test_fail_open_still_rejects_listed_serial() {
    let ca = root("Test Root CA");
    let (leaf, _) = issue(&ca, "client", 44, Some(CRL_URL));
    let der = crl(&ca, &[44], OffsetDateTime::now_utc() + time::Duration::days(7));

    let validator = TrustValidator::new(serving(der), CrlFailurePolicy::FailOpen);
    assert!(validator.verify_cert(&leaf).is_err());
}

#[test]
fn test_revocation_list_parsing() {
    let ca = root("Test Root CA");
    let der = crl(&ca, &[44, 300], OffsetDateTime::now_utc() + time::Duration::days(7));
    let list = RevocationList::from_der(&der).unwrap();

    assert_eq!(list.entries().len(), 2);
    assert!(list.find(&[44]).is_some());
    assert!(list.find(&[0x01, 0x2c]).is_some());
    assert!(list.find(&[45]).is_none());
    assert!(list.is_revoked_at(&[44], Utc::now()));
    assert!(!list.is_revoked_at(&[44], Utc::now() - Duration::hours(2)));
    assert!(!list.is_stale_at(Utc::now()));
    list.verify_signature(&as_cert(&ca)).unwrap();

    assert!(RevocationList::from_der(b"junk").is_err());
}

#[test]
fn test_policy_serde() {
    assert_eq!(
        serde_json::to_string(&CrlFailurePolicy::FailClosed).unwrap(),
        "\"fail_closed\""
    );
    assert_eq!(CrlFailurePolicy::default(), CrlFailurePolicy::FailClosed);
}

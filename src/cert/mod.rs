/*!
 * X.509 certificates
 *
 * Certificates are issued elsewhere; this module only stores them, looks
 * them up by the identifier of their public key and validates chains of
 * trust including CRL based revocation checks.
 */

use std::fmt;

use chrono::{DateTime, Utc};
use rsa::pkcs8::der::pem::{self, LineEnding};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::oid_registry::OID_X509_EXT_CRL_DISTRIBUTION_POINTS;
use x509_parser::time::ASN1Time;

use crate::error::{CryptoError, CryptoResult};
use crate::key::{compute_ski, KeyId};

pub mod crl;
pub mod store;
pub mod verifier;

#[cfg(test)]
mod tests;

pub use crl::{CrlFetcher, HttpCrlFetcher, RevocationEntry, RevocationList};
pub use store::{load_all_certs, load_cert, store_cert};
pub use verifier::{CrlFailurePolicy, TrustValidator, MAX_CHAIN_DEPTH};

const PEM_LABEL: &str = "CERTIFICATE";

pub(crate) fn asn1_to_utc(time: &ASN1Time) -> CryptoResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| CryptoError::certificate_parsing("time outside the supported range"))
}

/// A parsed X.509 certificate
///
/// Owns the DER encoding and keeps the fields the store and the trust
/// validator need. Signature checks re-parse the DER.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    serial: Vec<u8>,
    subject: String,
    issuer: String,
    subject_raw: Vec<u8>,
    issuer_raw: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key: Vec<u8>,
    crl_urls: Vec<String>,
    crl_urls_unusable: Option<String>,
}

impl Certificate {
    /// Parses a DER encoded certificate
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let (rest, x509) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| CryptoError::certificate_parsing(&e.to_string()))?;
        if !rest.is_empty() {
            return Err(CryptoError::certificate_parsing(
                "trailing bytes after certificate",
            ));
        }

        let validity = x509.validity();
        let (crl_urls, crl_urls_unusable) = distribution_point_urls(&x509);

        Ok(Self {
            der: der.to_vec(),
            serial: x509.raw_serial().to_vec(),
            subject: x509.subject().to_string(),
            issuer: x509.issuer().to_string(),
            subject_raw: x509.subject().as_raw().to_vec(),
            issuer_raw: x509.issuer().as_raw().to_vec(),
            not_before: asn1_to_utc(&validity.not_before)?,
            not_after: asn1_to_utc(&validity.not_after)?,
            public_key: x509.public_key().subject_public_key.data.to_vec(),
            crl_urls,
            crl_urls_unusable,
        })
    }

    /// Parses a PEM `CERTIFICATE` block
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let (_, block) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
            .map_err(|e| CryptoError::certificate_parsing(&e.to_string()))?;
        if block.label != PEM_LABEL {
            return Err(CryptoError::certificate_parsing(&format!(
                "unexpected PEM label {}",
                block.label
            )));
        }
        Self::from_der(&block.contents)
    }

    /// PEM encoding, base64 wrapped at 64 columns
    pub fn to_pem(&self) -> CryptoResult<String> {
        pem::encode_string(PEM_LABEL, LineEnding::LF, &self.der)
            .map_err(|e| CryptoError::certificate_parsing(&format!("PEM encoding failed: {}", e)))
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Serial number as the raw big-endian integer bytes
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    pub fn serial_hex(&self) -> String {
        hex::encode(&self.serial)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Whether `now` lies inside the validity window (bounds inclusive)
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// SHA-256 of the subject public key bits
    ///
    /// For EC keys the bits are the SEC1 point and for RSA keys the PKCS#1
    /// `RSAPublicKey`, so this equals the SKI of the matching `Key`.
    pub fn ski(&self) -> Vec<u8> {
        compute_ski(&self.public_key)
    }

    /// Identifier the certificate is stored under
    pub fn id(&self) -> KeyId {
        KeyId::from_ski(&self.ski())
    }

    /// URIs listed in the CRL distribution points extension
    pub fn crl_distribution_points(&self) -> &[String] {
        &self.crl_urls
    }

    /// Why the distribution points extension could not be used, if it is
    /// present but malformed or lists no URI
    pub fn crl_distribution_points_error(&self) -> Option<&str> {
        self.crl_urls_unusable.as_deref()
    }

    pub fn is_self_signed(&self) -> bool {
        self.subject_raw == self.issuer_raw && self.verify_signed_by(self).is_ok()
    }

    /// Whether `issuer`'s subject is this certificate's issuer name
    pub fn names_issuer(&self, issuer: &Certificate) -> bool {
        self.issuer_raw == issuer.subject_raw
    }

    /// Checks this certificate's signature under `issuer`'s public key
    pub fn verify_signed_by(&self, issuer: &Certificate) -> CryptoResult<()> {
        let child = self.parsed()?;
        let parent = issuer.parsed()?;
        child
            .verify_signature(Some(parent.public_key()))
            .map_err(|e| CryptoError::certificate_parsing(&format!("signature check failed: {}", e)))
    }

    pub(crate) fn parsed(&self) -> CryptoResult<X509Certificate<'_>> {
        x509_parser::parse_x509_certificate(&self.der)
            .map(|(_, x509)| x509)
            .map_err(|e| CryptoError::certificate_parsing(&e.to_string()))
    }
}

fn distribution_point_urls(x509: &X509Certificate<'_>) -> (Vec<String>, Option<String>) {
    let mut urls = Vec::new();
    let mut unusable = None;

    for extension in x509.extensions() {
        if extension.oid != OID_X509_EXT_CRL_DISTRIBUTION_POINTS {
            continue;
        }

        let points = match extension.parsed_extension() {
            ParsedExtension::CRLDistributionPoints(points) => points,
            ParsedExtension::ParseError { error } => {
                unusable = Some(format!("malformed CRL distribution points: {}", error));
                continue;
            }
            _ => {
                unusable = Some("unrecognised CRL distribution points extension".to_string());
                continue;
            }
        };

        let before = urls.len();
        for point in &points.points {
            let Some(DistributionPointName::FullName(names)) = &point.distribution_point else {
                continue;
            };
            for name in names {
                if let GeneralName::URI(uri) = name {
                    urls.push(uri.to_string());
                }
            }
        }
        if urls.len() == before {
            unusable = Some("CRL distribution points list no URI".to_string());
        }
    }

    (urls, unusable)
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial_hex())
            .field("not_after", &self.not_after)
            .finish()
    }
}

//! Certificate revocation lists
//!
//! CRLs are fetched over plain HTTP(S) from the distribution points listed in
//! a certificate. Fetching goes through the `CrlFetcher` trait so tests and
//! callers with their own transport can substitute it.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{asn1_to_utc, Certificate};
use crate::error::{error_codes, CryptoError, CryptoResult};

/// Timeout applied to CRL requests unless configured otherwise
pub const DEFAULT_CRL_TIMEOUT: Duration = Duration::from_secs(10);

/// Retrieves the raw DER of a CRL
#[cfg_attr(test, mockall::automock)]
pub trait CrlFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> CryptoResult<Vec<u8>>;
}

/// Blocking HTTP fetcher with a bounded timeout
#[derive(Debug, Clone)]
pub struct HttpCrlFetcher {
    client: reqwest::blocking::Client,
}

impl HttpCrlFetcher {
    pub fn new(timeout: Duration) -> CryptoResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                CryptoError::revocation_failure(
                    &format!("failed to build HTTP client: {}", e),
                    error_codes::CRL_UNAVAILABLE,
                    None,
                )
            })?;
        Ok(Self { client })
    }
}

impl CrlFetcher for HttpCrlFetcher {
    fn fetch(&self, url: &str) -> CryptoResult<Vec<u8>> {
        log::debug!("Fetching CRL from {}", url);

        let unavailable = |e: reqwest::Error| {
            CryptoError::revocation_failure(
                &format!("CRL fetch failed: {}", e),
                error_codes::CRL_UNAVAILABLE,
                Some(url),
            )
        };

        let response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?;
        let body = response.bytes().map_err(unavailable)?;

        Ok(body.to_vec())
    }
}

/// One revoked serial number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    /// Raw big-endian serial number bytes
    pub serial: Vec<u8>,
    pub revoked_at: DateTime<Utc>,
}

/// A parsed CRL
#[derive(Debug, Clone)]
pub struct RevocationList {
    der: Vec<u8>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    entries: Vec<RevocationEntry>,
}

fn invalid_crl(cause: &str) -> CryptoError {
    CryptoError::revocation_failure(cause, error_codes::CRL_INVALID, None)
}

impl RevocationList {
    /// Parses a DER encoded CRL
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let (_, crl) = x509_parser::parse_x509_crl(der)
            .map_err(|e| invalid_crl(&format!("malformed CRL: {}", e)))?;

        let entries = crl
            .iter_revoked_certificates()
            .map(|revoked| {
                Ok(RevocationEntry {
                    serial: revoked.raw_serial().to_vec(),
                    revoked_at: asn1_to_utc(&revoked.revocation_date)
                        .map_err(|e| invalid_crl(&e.to_string()))?,
                })
            })
            .collect::<CryptoResult<Vec<_>>>()?;

        let this_update = asn1_to_utc(&crl.last_update()).map_err(|e| invalid_crl(&e.to_string()))?;
        let next_update = match crl.next_update() {
            Some(time) => Some(asn1_to_utc(&time).map_err(|e| invalid_crl(&e.to_string()))?),
            None => None,
        };

        Ok(Self {
            der: der.to_vec(),
            this_update,
            next_update,
            entries,
        })
    }

    pub fn this_update(&self) -> DateTime<Utc> {
        self.this_update
    }

    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update
    }

    pub fn entries(&self) -> &[RevocationEntry] {
        &self.entries
    }

    /// Entry for `serial`, if listed
    pub fn find(&self, serial: &[u8]) -> Option<&RevocationEntry> {
        self.entries.iter().find(|entry| entry.serial == serial)
    }

    /// Listed with a revocation time at or before `now`
    pub fn is_revoked_at(&self, serial: &[u8], now: DateTime<Utc>) -> bool {
        self.find(serial)
            .map_or(false, |entry| entry.revoked_at <= now)
    }

    /// A CRL whose next update lies in the past is stale
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.next_update.map_or(false, |next| next < now)
    }

    /// Checks the CRL signature under `issuer`'s public key
    pub fn verify_signature(&self, issuer: &Certificate) -> CryptoResult<()> {
        let (_, crl) = x509_parser::parse_x509_crl(&self.der)
            .map_err(|e| invalid_crl(&format!("malformed CRL: {}", e)))?;
        let parent = issuer.parsed()?;

        crl.verify_signature(parent.public_key())
            .map_err(|e| invalid_crl(&format!("CRL signature check failed: {}", e)))
    }
}

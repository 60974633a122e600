//! Chain of trust and revocation checks
//!
//! A chain is built upward from the certificate under test using the
//! certificates of a trust directory. Each hop must name its parent as
//! issuer and carry a signature that verifies under the parent's key, and
//! every certificate on the way must be inside its validity window. The
//! walk succeeds once it reaches a self-signed certificate that is itself
//! present in the trust directory.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::crl::{CrlFetcher, HttpCrlFetcher, RevocationList};
use super::store::load_all_certs;
use super::Certificate;
use crate::error::{error_codes, CryptoError, CryptoResult};

/// Longest chain the validator will walk, root included
pub const MAX_CHAIN_DEPTH: usize = 10;

/// What to do when a CRL cannot be fetched or parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrlFailurePolicy {
    /// Treat the certificate as failing the revocation check
    #[default]
    FailClosed,
    /// Log a warning and treat the certificate as not revoked
    FailOpen,
}

/// Validates certificate chains and revocation status
pub struct TrustValidator {
    fetcher: Box<dyn CrlFetcher>,
    policy: CrlFailurePolicy,
}

impl TrustValidator {
    pub fn new(fetcher: Box<dyn CrlFetcher>, policy: CrlFailurePolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Validator fetching CRLs over HTTP, failing closed
    pub fn with_http(timeout: Duration) -> CryptoResult<Self> {
        Ok(Self::new(
            Box::new(HttpCrlFetcher::new(timeout)?),
            CrlFailurePolicy::FailClosed,
        ))
    }

    pub fn policy(&self) -> CrlFailurePolicy {
        self.policy
    }

    /// Builds and checks the chain from `cert` to a root in `trust_dir`
    ///
    /// # Returns
    ///
    /// The chain, leaf first and root last
    ///
    /// # Errors
    ///
    /// `ChainValidationError` on a broken link, an expired certificate or
    /// a missing issuer
    pub fn verify_cert_chain(
        &self,
        cert: &Certificate,
        trust_dir: &Path,
    ) -> CryptoResult<Vec<Certificate>> {
        self.verify_cert_chain_at(cert, trust_dir, Utc::now())
    }

    pub fn verify_cert_chain_at(
        &self,
        cert: &Certificate,
        trust_dir: &Path,
        now: DateTime<Utc>,
    ) -> CryptoResult<Vec<Certificate>> {
        let pool = load_all_certs(trust_dir).map_err(|e| {
            CryptoError::chain_validation(
                &format!("trust directory unavailable: {}", e),
                error_codes::CHAIN_ISSUER_MISSING,
            )
        })?;

        check_validity(cert, now)?;
        let mut chain = vec![cert.clone()];

        while chain.len() <= MAX_CHAIN_DEPTH {
            let current = &chain[chain.len() - 1];

            if current.is_self_signed() {
                if pool.iter().any(|trusted| trusted == current) {
                    log::debug!("Chain for {} ends at trusted root {}", cert.subject(), current.subject());
                    return Ok(chain);
                }
                return Err(CryptoError::chain_validation(
                    &format!("self-signed certificate {} is not trusted", current.subject()),
                    error_codes::CHAIN_ISSUER_MISSING,
                ));
            }

            let parent = find_parent(current, &pool)?;
            check_validity(parent, now)?;
            log::debug!("Chain hop {} -> {}", current.subject(), parent.subject());
            chain.push(parent.clone());
        }

        Err(CryptoError::chain_validation(
            &format!("chain exceeds {} certificates", MAX_CHAIN_DEPTH),
            error_codes::CHAIN_BROKEN_LINK,
        ))
    }

    /// Checks the validity window and the CRLs of `cert`
    ///
    /// The issuer is not known here, so CRL signatures are not checked; use
    /// [`TrustValidator::verify`] for that.
    pub fn verify_cert(&self, cert: &Certificate) -> CryptoResult<()> {
        self.verify_cert_at(cert, Utc::now())
    }

    pub fn verify_cert_at(&self, cert: &Certificate, now: DateTime<Utc>) -> CryptoResult<()> {
        check_validity(cert, now)?;
        self.check_revocation_at(cert, None, now)
    }

    /// Full validation: chain of trust plus revocation of every non-root link
    pub fn verify(&self, cert: &Certificate, trust_dir: &Path) -> CryptoResult<Vec<Certificate>> {
        self.verify_at(cert, trust_dir, Utc::now())
    }

    pub fn verify_at(
        &self,
        cert: &Certificate,
        trust_dir: &Path,
        now: DateTime<Utc>,
    ) -> CryptoResult<Vec<Certificate>> {
        let chain = self.verify_cert_chain_at(cert, trust_dir, now)?;
        for link in chain.windows(2) {
            self.check_revocation_at(&link[0], Some(&link[1]), now)?;
        }
        Ok(chain)
    }

    /// Fails if any CRL of `cert` lists its serial as revoked at or before `now`
    ///
    /// A certificate without distribution points passes; one whose
    /// distribution points extension is unusable is handled like an
    /// unreachable CRL. When `issuer` is given, each CRL must carry a valid
    /// signature from it.
    pub fn check_revocation_at(
        &self,
        cert: &Certificate,
        issuer: Option<&Certificate>,
        now: DateTime<Utc>,
    ) -> CryptoResult<()> {
        if let Some(reason) = cert.crl_distribution_points_error() {
            match self.policy {
                CrlFailurePolicy::FailClosed => {
                    return Err(CryptoError::revocation_failure(
                        &format!("{}: {}", cert.subject(), reason),
                        error_codes::CRL_INVALID,
                        None,
                    ))
                }
                CrlFailurePolicy::FailOpen => {
                    log::warn!("Ignoring unusable CRL distribution points of {}: {}", cert.subject(), reason)
                }
            }
        }

        let urls = cert.crl_distribution_points();
        if urls.is_empty() {
            log::debug!("{} has no CRL distribution point", cert.subject());
            return Ok(());
        }

        for url in urls {
            let crl = match self.fetch_crl(url, issuer, now) {
                Ok(crl) => crl,
                Err(e) => match self.policy {
                    CrlFailurePolicy::FailClosed => return Err(e),
                    CrlFailurePolicy::FailOpen => {
                        log::warn!("Ignoring unusable CRL at {}: {}", url, e);
                        continue;
                    }
                },
            };

            if let Some(entry) = crl.find(cert.serial()) {
                if entry.revoked_at <= now {
                    log::info!("Certificate {} revoked at {}", cert.serial_hex(), entry.revoked_at);
                    return Err(CryptoError::revocation_failure(
                        &format!(
                            "certificate {} revoked at {}",
                            cert.serial_hex(),
                            entry.revoked_at
                        ),
                        error_codes::CERTIFICATE_REVOKED,
                        Some(url),
                    ));
                }
            }
        }

        Ok(())
    }

    fn fetch_crl(
        &self,
        url: &str,
        issuer: Option<&Certificate>,
        now: DateTime<Utc>,
    ) -> CryptoResult<RevocationList> {
        let der = self.fetcher.fetch(url)?;
        let crl = RevocationList::from_der(&der).map_err(|e| with_url(e, url))?;

        if let Some(issuer) = issuer {
            crl.verify_signature(issuer).map_err(|e| with_url(e, url))?;
        }

        if crl.is_stale_at(now) {
            return Err(CryptoError::revocation_failure(
                "CRL is past its next update time",
                error_codes::CRL_INVALID,
                Some(url),
            ));
        }

        Ok(crl)
    }
}

fn with_url(err: CryptoError, url: &str) -> CryptoError {
    match err {
        CryptoError::RevocationCheckFailure {
            cause,
            error_code,
            mut context,
        } => {
            context.insert("crl_url".to_string(), url.to_string());
            CryptoError::RevocationCheckFailure {
                cause,
                error_code,
                context,
            }
        }
        other => CryptoError::revocation_failure(&other.to_string(), error_codes::CRL_INVALID, Some(url)),
    }
}

fn check_validity(cert: &Certificate, now: DateTime<Utc>) -> CryptoResult<()> {
    if cert.is_valid_at(now) {
        return Ok(());
    }
    Err(CryptoError::chain_validation(
        &format!(
            "{} is valid from {} to {}, not at {}",
            cert.subject(),
            cert.not_before(),
            cert.not_after(),
            now
        ),
        error_codes::CHAIN_CERT_EXPIRED,
    ))
}

fn find_parent<'a>(child: &Certificate, pool: &'a [Certificate]) -> CryptoResult<&'a Certificate> {
    let mut named = pool.iter().filter(|candidate| child.names_issuer(candidate)).peekable();

    if named.peek().is_none() {
        return Err(CryptoError::chain_validation(
            &format!("issuer {} of {} not found", child.issuer(), child.subject()),
            error_codes::CHAIN_ISSUER_MISSING,
        ));
    }

    named
        .find(|candidate| child.verify_signed_by(candidate).is_ok())
        .ok_or_else(|| {
            CryptoError::chain_validation(
                &format!(
                    "signature of {} does not verify under any certificate named {}",
                    child.subject(),
                    child.issuer()
                ),
                error_codes::CHAIN_BROKEN_LINK,
            )
        })
}

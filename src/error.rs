/*!
 * Error Handling for the QaSa PKI Module
 *
 * Provides one error type for key generation, the encrypted keystore and
 * certificate trust validation, with numeric error codes and user-facing
 * messages.
 */

use std::collections::HashMap;
use thiserror::Error;

/// Error type for all key management and trust operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key generation option: {option}")]
    InvalidKeyGenOption { option: String, error_code: u32 },

    #[error("Wrong key id - failed to find key using key ID {key_id}")]
    WrongKeyId { key_id: String, error_code: u32 },

    #[error("Invalid key id: {key_id} - {cause}")]
    InvalidKeyId {
        key_id: String,
        cause: String,
        error_code: u32,
    },

    #[error("Invalid key path - key path empty")]
    EmptyKeyPath { error_code: u32 },

    #[error("Key directory does not exist: {path}")]
    KeyDirectoryMissing { path: String, error_code: u32 },

    #[error("Key derivation parameter error: {parameter} - {cause}")]
    KdfParameterError {
        parameter: String,
        cause: String,
        error_code: u32,
    },

    #[error("Key generation failed: {algorithm} - {cause}")]
    KeyGenerationError {
        algorithm: String,
        cause: String,
        error_code: u32,
    },

    #[error("Key encryption failed: {cause}")]
    EncryptionFailure { cause: String, error_code: u32 },

    #[error("Key decryption failed: {cause}")]
    DecryptionFailure { cause: String, error_code: u32 },

    #[error("Key integrity mismatch for {key_id}: {cause}")]
    IntegrityMismatch {
        key_id: String,
        cause: String,
        error_code: u32,
    },

    #[error("Certificate not found: {id} - {cause}")]
    CertificateNotFound {
        id: String,
        cause: String,
        error_code: u32,
    },

    #[error("Certificate parsing failed: {cause}")]
    CertificateParsingFailed { cause: String, error_code: u32 },

    #[error("Certificate chain validation failed: {cause}")]
    ChainValidationError { cause: String, error_code: u32 },

    #[error("Revocation check failed: {cause}")]
    RevocationCheckFailure {
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    #[error("Invalid parameter: {parameter} - {expected} - got {actual}")]
    InvalidParameter {
        parameter: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    #[error("Random number generation failed: {cause}")]
    RandomGenerationError { cause: String, error_code: u32 },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // Key generation errors: 1000-1999
    pub const INVALID_KEY_GEN_OPTION: u32 = 1001;
    pub const KEY_GENERATION_FAILED: u32 = 1002;
    pub const KEY_RECOVERY_FAILED: u32 = 1003;
    pub const KEY_ENCODING_FAILED: u32 = 1004;

    // AES errors: 3000-3999
    pub const AES_ENCRYPTION_FAILED: u32 = 3001;
    pub const AES_DECRYPTION_FAILED: u32 = 3002;
    pub const AES_INVALID_KEY_SIZE: u32 = 3003;
    pub const AES_AUTHENTICATION_FAILED: u32 = 3005;

    // Key management errors: 4000-4999
    pub const KEY_STORAGE_FAILED: u32 = 4001;
    pub const KEY_RETRIEVAL_FAILED: u32 = 4002;
    pub const WRONG_KEY_ID: u32 = 4003;
    pub const INTEGRITY_MISMATCH: u32 = 4004;
    pub const KEY_DERIVATION_FAILED: u32 = 4005;
    pub const INVALID_KEY_ID: u32 = 4006;
    pub const EMPTY_KEY_PATH: u32 = 4007;
    pub const KEY_DIRECTORY_MISSING: u32 = 4008;

    // Security errors: 5000-5999
    pub const INSUFFICIENT_ENTROPY: u32 = 5002;

    // Certificate errors: 6000-6999
    pub const CERTIFICATE_NOT_FOUND: u32 = 6001;
    pub const CERTIFICATE_PARSING_FAILED: u32 = 6002;
    pub const CHAIN_BROKEN_LINK: u32 = 6003;
    pub const CHAIN_CERT_EXPIRED: u32 = 6004;
    pub const CHAIN_ISSUER_MISSING: u32 = 6005;
    pub const CERTIFICATE_REVOKED: u32 = 6006;
    pub const CRL_UNAVAILABLE: u32 = 6007;
    pub const CRL_INVALID: u32 = 6008;

    // Generic errors: 9000-9999
    pub const SERIALIZATION_FAILED: u32 = 9001;
    pub const IO_FAILED: u32 = 9002;
    pub const INVALID_PARAMETER: u32 = 9999;
}

impl CryptoError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            CryptoError::InvalidKeyGenOption { error_code, .. } => *error_code,
            CryptoError::WrongKeyId { error_code, .. } => *error_code,
            CryptoError::InvalidKeyId { error_code, .. } => *error_code,
            CryptoError::EmptyKeyPath { error_code } => *error_code,
            CryptoError::KeyDirectoryMissing { error_code, .. } => *error_code,
            CryptoError::KdfParameterError { error_code, .. } => *error_code,
            CryptoError::KeyGenerationError { error_code, .. } => *error_code,
            CryptoError::EncryptionFailure { error_code, .. } => *error_code,
            CryptoError::DecryptionFailure { error_code, .. } => *error_code,
            CryptoError::IntegrityMismatch { error_code, .. } => *error_code,
            CryptoError::CertificateNotFound { error_code, .. } => *error_code,
            CryptoError::CertificateParsingFailed { error_code, .. } => *error_code,
            CryptoError::ChainValidationError { error_code, .. } => *error_code,
            CryptoError::RevocationCheckFailure { error_code, .. } => *error_code,
            CryptoError::InvalidParameter { error_code, .. } => *error_code,
            CryptoError::RandomGenerationError { error_code, .. } => *error_code,
            CryptoError::SerializationError(_) => error_codes::SERIALIZATION_FAILED,
            CryptoError::IoError(_) => error_codes::IO_FAILED,
        }
    }

    /// Get a user-friendly error message
    pub fn user_friendly_message(&self) -> String {
        match self {
            CryptoError::InvalidKeyGenOption { option, .. } => {
                format!("Key generation option '{}' is not supported.", option)
            }
            CryptoError::WrongKeyId { key_id, .. } => {
                format!("No stored key was found for identifier '{}'.", key_id)
            }
            CryptoError::InvalidKeyId { key_id, .. } => {
                format!("'{}' is not a valid key identifier.", key_id)
            }
            CryptoError::EmptyKeyPath { .. } => "No key file path was given.".to_string(),
            CryptoError::KeyDirectoryMissing { path, .. } => {
                format!("Key directory '{}' does not exist.", path)
            }
            CryptoError::KdfParameterError { parameter, .. } => {
                format!(
                    "Key derivation parameter '{}' is outside the allowed range.",
                    parameter
                )
            }
            CryptoError::KeyGenerationError { algorithm, .. } => {
                format!("Generating or decoding a {} key failed.", algorithm)
            }
            CryptoError::EncryptionFailure { .. } => {
                "Private key could not be encrypted. Nothing was written.".to_string()
            }
            CryptoError::DecryptionFailure { .. } => {
                "Stored key could not be decrypted. Check the password.".to_string()
            }
            CryptoError::IntegrityMismatch { .. } => {
                "Stored key failed its integrity check. The password is wrong or the key file was modified."
                    .to_string()
            }
            CryptoError::CertificateNotFound { id, .. } => {
                format!("No stored certificate was found for identifier '{}'.", id)
            }
            CryptoError::CertificateParsingFailed { .. } => {
                "Certificate data is not a valid X.509 certificate.".to_string()
            }
            CryptoError::ChainValidationError { .. } => {
                "Certificate does not chain to a trusted root.".to_string()
            }
            CryptoError::RevocationCheckFailure { .. } => {
                "Certificate is revoked or its revocation status could not be confirmed."
                    .to_string()
            }
            CryptoError::InvalidParameter {
                parameter,
                expected,
                ..
            } => {
                format!(
                    "Invalid parameter '{}'. Expected '{}' format.",
                    parameter, expected
                )
            }
            CryptoError::RandomGenerationError { .. } => {
                "Random number generation failed. Cryptographic operations may be insecure."
                    .to_string()
            }
            CryptoError::SerializationError(_) => {
                "Data serialization failed. Data format may be corrupted.".to_string()
            }
            CryptoError::IoError(_) => {
                "Input/output operation failed. Check file permissions and disk space.".to_string()
            }
        }
    }

    /// Get technical details for debugging
    pub fn technical_details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();

        details.insert("error_code".to_string(), self.error_code().to_string());
        details.insert("error_type".to_string(), self.error_type().to_string());
        details.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());

        match self {
            CryptoError::RevocationCheckFailure { cause, context, .. } => {
                details.insert("cause".to_string(), cause.clone());
                details.extend(context.clone());
            }
            CryptoError::InvalidParameter {
                parameter,
                expected,
                actual,
                ..
            } => {
                details.insert("parameter".to_string(), parameter.clone());
                details.insert("expected".to_string(), expected.clone());
                details.insert("actual".to_string(), actual.clone());
            }
            _ => {
                details.insert("details".to_string(), self.to_string());
            }
        }

        details
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            CryptoError::InvalidKeyGenOption { .. } => "InvalidKeyGenOption",
            CryptoError::WrongKeyId { .. } => "WrongKeyId",
            CryptoError::InvalidKeyId { .. } => "InvalidKeyId",
            CryptoError::EmptyKeyPath { .. } => "EmptyKeyPath",
            CryptoError::KeyDirectoryMissing { .. } => "KeyDirectoryMissing",
            CryptoError::KdfParameterError { .. } => "KdfParameterError",
            CryptoError::KeyGenerationError { .. } => "KeyGenerationError",
            CryptoError::EncryptionFailure { .. } => "EncryptionFailure",
            CryptoError::DecryptionFailure { .. } => "DecryptionFailure",
            CryptoError::IntegrityMismatch { .. } => "IntegrityMismatch",
            CryptoError::CertificateNotFound { .. } => "CertificateNotFound",
            CryptoError::CertificateParsingFailed { .. } => "CertificateParsingFailed",
            CryptoError::ChainValidationError { .. } => "ChainValidationError",
            CryptoError::RevocationCheckFailure { .. } => "RevocationCheckFailure",
            CryptoError::InvalidParameter { .. } => "InvalidParameter",
            CryptoError::RandomGenerationError { .. } => "RandomGenerationError",
            CryptoError::SerializationError(_) => "SerializationError",
            CryptoError::IoError(_) => "IoError",
        }
    }
}

/// Convenience constructors for common error types
impl CryptoError {
    pub fn invalid_key_gen_option(option: &str) -> Self {
        CryptoError::InvalidKeyGenOption {
            option: option.to_string(),
            error_code: error_codes::INVALID_KEY_GEN_OPTION,
        }
    }

    pub fn key_generation_error(algorithm: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::KeyGenerationError {
            algorithm: algorithm.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn kdf_parameter_error(parameter: &str, cause: &str) -> Self {
        CryptoError::KdfParameterError {
            parameter: parameter.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::KEY_DERIVATION_FAILED,
        }
    }

    pub fn encryption_failure(cause: &str) -> Self {
        CryptoError::EncryptionFailure {
            cause: cause.to_string(),
            error_code: error_codes::AES_ENCRYPTION_FAILED,
        }
    }

    pub fn decryption_failure(cause: &str, error_code: u32) -> Self {
        CryptoError::DecryptionFailure {
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn integrity_mismatch(key_id: &str, cause: &str) -> Self {
        CryptoError::IntegrityMismatch {
            key_id: key_id.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::INTEGRITY_MISMATCH,
        }
    }

    pub fn invalid_key_id(key_id: &str, cause: &str) -> Self {
        CryptoError::InvalidKeyId {
            key_id: key_id.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::INVALID_KEY_ID,
        }
    }

    pub fn certificate_not_found(id: &str, cause: &str) -> Self {
        CryptoError::CertificateNotFound {
            id: id.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::CERTIFICATE_NOT_FOUND,
        }
    }

    pub fn certificate_parsing(cause: &str) -> Self {
        CryptoError::CertificateParsingFailed {
            cause: cause.to_string(),
            error_code: error_codes::CERTIFICATE_PARSING_FAILED,
        }
    }

    pub fn chain_validation(cause: &str, error_code: u32) -> Self {
        CryptoError::ChainValidationError {
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn revocation_failure(cause: &str, error_code: u32, url: Option<&str>) -> Self {
        let mut context = HashMap::new();
        if let Some(url) = url {
            context.insert("crl_url".to_string(), url.to_string());
        }

        CryptoError::RevocationCheckFailure {
            cause: cause.to_string(),
            error_code,
            context,
        }
    }

    pub fn invalid_parameter(parameter: &str, expected: &str, actual: &str) -> Self {
        CryptoError::InvalidParameter {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code: error_codes::INVALID_PARAMETER,
        }
    }
}

// From implementations for automatic error conversion
impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        CryptoError::IoError(format!("IO operation failed: {}", err))
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::SerializationError(err.to_string())
    }
}

/// Result type alias for key management and trust operations
pub type CryptoResult<T> = Result<T, CryptoError>;

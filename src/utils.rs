use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use rand::{rngs::OsRng, RngCore};

use crate::error::{error_codes, CryptoError};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Generate random bytes of the specified length from the OS CSPRNG
pub fn random_bytes(length: usize) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::RandomGenerationError {
            cause: e.to_string(),
            error_code: error_codes::INSUFFICIENT_ENTROPY,
        })?;
    Ok(bytes)
}

/// Constant-time comparison of two byte slices to avoid timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// Write `contents` to `path` only if nothing exists there yet
///
/// The bytes go to a hidden temporary file in the same directory first and
/// are hard linked into place once fully synced, so a reader never sees a
/// partial file and two writers racing on the same path cannot clobber each
/// other. Returns `false` when a file was already present. `mode` sets the
/// unix permission bits of a newly created file and is ignored elsewhere.
pub fn write_new_file(path: &Path, contents: &[u8], mode: u32) -> Result<bool, CryptoError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CryptoError::IoError(format!("{} has no file name", path.display())))?;
    let tmp = dir.join(format!(".{}.tmp-{}", name, hex::encode(random_bytes(8)?)));

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let written = options.open(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    let linked = fs::hard_link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

//! Anti-spoofing model artifact handling.
//!
//! The liveness model is hosted outside this project, so there is no pinned
//! manifest: the deployment supplies the download URL and, optionally, the
//! expected SHA-256. When a digest is configured every file is checked
//! against it before it is handed to the inference runtime.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the anti-spoofing model inside the model directory.
pub const SPOOF_MODEL_NAME: &str = "MiniFASNetV2.onnx";

#[derive(Error, Debug)]
pub enum ModelIntegrityError {
    #[error("model file not found: {name} ({path})")]
    MissingModel { name: String, path: PathBuf },

    #[error("failed to open model file: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read model file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "model checksum mismatch for {name} ({path})\n  expected: {expected}\n  got:      {got}"
    )]
    ChecksumMismatch {
        name: String,
        path: PathBuf,
        expected: String,
        got: String,
    },
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file_hex(path: &Path) -> Result<String, ModelIntegrityError> {
    let mut file = fs::File::open(path).map_err(|source| ModelIntegrityError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file
            .read(&mut buf)
            .map_err(|source| ModelIntegrityError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare a computed digest against a configured one. Case and
/// surrounding whitespace in `expected` are ignored; published checksums vary.
pub fn digest_matches(digest: &str, expected: &str) -> bool {
    digest.eq_ignore_ascii_case(expected.trim())
}

/// Check that the model at `path` exists and, when `expected_sha256` is
/// given, that it matches. Returns the file's digest.
pub fn verify_model(path: &Path, expected_sha256: Option<&str>) -> Result<String, ModelIntegrityError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| SPOOF_MODEL_NAME.to_string());

    if !path.exists() {
        return Err(ModelIntegrityError::MissingModel {
            name,
            path: path.to_path_buf(),
        });
    }

    let digest = sha256_file_hex(path)?;
    match expected_sha256 {
        Some(expected) if !digest_matches(&digest, expected) => {
            Err(ModelIntegrityError::ChecksumMismatch {
                name,
                path: path.to_path_buf(),
                expected: expected.to_string(),
                got: digest,
            })
        }
        Some(_) => {
            tracing::debug!(path = %path.display(), "model checksum verified");
            Ok(digest)
        }
        None => {
            tracing::debug!(path = %path.display(), sha256 = %digest, "model present, no checksum configured");
            Ok(digest)
        }
    }
}

//! `livegate setup` — downloads the anti-spoofing model into the model directory.

use anyhow::{bail, Context, Result};
use livegate_models::{digest_matches, sha256_file_hex, SPOOF_MODEL_NAME};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Model to fetch: where from, and the digest it must have (if known).
pub struct ModelSource {
    pub url: String,
    pub sha256: Option<String>,
}

/// Determine the default model directory.
///
/// When running as root (UID 0), defaults to `/var/lib/livegate/models` (system-wide).
/// Otherwise defaults to `$XDG_DATA_HOME/livegate/models` (~/.local/share/livegate/models).
pub fn default_model_dir() -> PathBuf {
    if is_root() {
        PathBuf::from("/var/lib/livegate/models")
    } else {
        let data_home = std::env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.local/share")
        });
        PathBuf::from(data_home).join("livegate/models")
    }
}

fn is_root() -> bool {
    // SAFETY: geteuid is always safe to call.
    unsafe { libc::geteuid() == 0 }
}

/// Progress is printed each time the download crosses a 10% boundary.
fn crossed_decile(last_pct: u64, pct: u64) -> bool {
    pct / 10 > last_pct / 10
}

/// Copy `reader` into a new file at `path`, printing progress when the total
/// size is known. The partial file is removed if the copy fails.
fn stream_to_file(mut reader: impl Read, path: &Path, content_length: Option<u64>) -> Result<()> {
    let mut file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;

    let mut copy = || -> Result<()> {
        let mut buf = [0u8; 65536];
        let mut total: u64 = 0;
        let mut last_pct: u64 = 0;

        loop {
            let n = reader.read(&mut buf).context("download interrupted")?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .with_context(|| format!("failed to write {}", path.display()))?;
            total += n as u64;

            if let Some(len) = content_length.filter(|&l| l > 0) {
                let pct = (total * 100) / len;
                if crossed_decile(last_pct, pct) {
                    print!("  {pct}%\r");
                    io::stdout().flush().ok();
                    last_pct = pct;
                }
            }
        }

        file.flush()?;
        Ok(())
    };

    let result = copy();
    drop(file);
    if result.is_err() {
        fs::remove_file(path).ok();
    }
    result
}

/// Download the model with progress output, verify, and move it into place.
fn download_model(source: &ModelSource, dest: &Path) -> Result<()> {
    let tmp_path = dest.with_extension("onnx.part");

    println!("  downloading {}...", source.url);
    tracing::info!(url = %source.url, dest = %dest.display(), "downloading model");

    let resp = ureq::get(&source.url)
        .call()
        .with_context(|| format!("failed to download {}", source.url))?;

    let content_length = resp
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let reader = resp.into_body().into_reader();
    stream_to_file(reader, &tmp_path, content_length)?;

    match &source.sha256 {
        Some(expected) => {
            print!("  verifying checksum... ");
            io::stdout().flush().ok();
            let digest = sha256_file_hex(&tmp_path)?;
            if !digest_matches(&digest, expected) {
                fs::remove_file(&tmp_path).ok();
                bail!(
                    "checksum mismatch for {}:\n  expected: {}\n  got:      {}",
                    SPOOF_MODEL_NAME,
                    expected,
                    digest
                );
            }
            println!("ok");
        }
        None => {
            let digest = sha256_file_hex(&tmp_path)?;
            println!("  no checksum configured; sha256 is {digest}");
            tracing::warn!(sha256 = %digest, "model downloaded without checksum verification");
        }
    }

    // Atomic rename
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to rename {} -> {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    Ok(())
}

/// Run the setup command: download and verify the anti-spoofing model.
pub fn run(dir: &Path, source: &ModelSource) -> Result<()> {
    println!("Model directory: {}", dir.display());

    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let dest = dir.join(SPOOF_MODEL_NAME);
    if dest.exists() {
        match (sha256_file_hex(&dest), &source.sha256) {
            (Ok(digest), Some(expected)) if digest_matches(&digest, expected) => {
                println!("  {SPOOF_MODEL_NAME} already present (checksum ok)");
                return Ok(());
            }
            (Ok(_), None) => {
                println!("  {SPOOF_MODEL_NAME} already present (no checksum configured)");
                return Ok(());
            }
            (Ok(_), Some(_)) => {
                println!("  {SPOOF_MODEL_NAME} exists but checksum differs — re-downloading");
            }
            (Err(_), _) => {
                println!("  {SPOOF_MODEL_NAME} exists but unreadable — re-downloading");
            }
        }
    }

    download_model(source, &dest)?;

    println!();
    println!("Setup complete: {SPOOF_MODEL_NAME} installed.");

    Ok(())
}

//! Piper binary provisioning
//!
//! Downloads the release tarball for the host architecture, unpacks it and
//! makes the binary executable.

use crate::config::Config;
use crate::error::{MouthError, MouthResult};
use flate2::read::GzDecoder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_PIPER_VERSION: &str = "2023.11.14-2";
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com/rhasspy/piper/releases/download";

/// Name of the executable inside the install directory
const BINARY_NAME: &str = "piper";
/// Top-level directory inside the release tarball
const ARCHIVE_ROOT: &str = "piper";

/// Map a machine name to a Piper release architecture
pub fn release_arch(machine: &str) -> MouthResult<&'static str> {
    match machine {
        "x86_64" => Ok("x86_64"),
        "aarch64" => Ok("aarch64"),
        other => Err(MouthError::Provisioning(format!(
            "Unsupported Linux architecture: {}. Only x86_64 and aarch64 are supported.",
            other
        ))),
    }
}

pub fn download_url(base_url: &str, version: &str, arch: &str) -> String {
    format!(
        "{}/{}/piper_linux_{}.tar.gz",
        base_url.trim_end_matches('/'),
        version,
        arch
    )
}

/// Owns the on-disk Piper install
#[derive(Debug, Clone)]
pub struct Provisioner {
    install_dir: PathBuf,
    version: String,
    base_url: String,
}

impl Provisioner {
    pub fn new(config: &Config) -> Self {
        Self {
            install_dir: PathBuf::from(&config.piper_dir),
            version: config.piper_version.clone(),
            base_url: config.release_base_url.clone(),
        }
    }

    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(BINARY_NAME)
    }

    /// The binary exists and has an execute bit
    pub fn is_ready(&self) -> bool {
        is_executable(&self.binary_path())
    }

    /// Return the binary path without downloading anything
    pub fn locate(&self) -> MouthResult<PathBuf> {
        let path = self.binary_path();
        if is_executable(&path) {
            Ok(path)
        } else {
            Err(MouthError::Provisioning(format!(
                "Piper binary not found or not executable at {}",
                path.display()
            )))
        }
    }

    pub fn release_url(&self) -> MouthResult<String> {
        if !cfg!(target_os = "linux") {
            return Err(MouthError::Provisioning(format!(
                "Piper releases are only fetched for Linux, not {}",
                std::env::consts::OS
            )));
        }
        let arch = release_arch(std::env::consts::ARCH)?;
        Ok(download_url(&self.base_url, &self.version, arch))
    }

    /// Make sure the binary is present, downloading it if needed
    pub async fn ensure_binary(&self) -> MouthResult<PathBuf> {
        if self.is_ready() {
            let path = self.binary_path();
            info!("✅ Piper binary '{}' already exists and is executable", path.display());
            return Ok(path);
        }

        info!("📥 Piper binary not found or not executable. Downloading...");
        let url = self.release_url()?;
        let archive = fetch(&url).await?;
        info!("📦 Download complete ({} bytes). Extracting...", archive.len());

        let install_dir = self.install_dir.clone();
        tokio::task::spawn_blocking(move || install_archive(&archive, &install_dir))
            .await
            .map_err(|e| MouthError::Provisioning(format!("Extraction task failed: {}", e)))??;

        self.locate()
    }
}

async fn fetch(url: &str) -> MouthResult<Vec<u8>> {
    info!("   From {}", url);
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| MouthError::Provisioning(format!("Failed to download Piper: {}", e)))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| MouthError::Provisioning(format!("Failed to download Piper: {}", e)))?;
    Ok(bytes.to_vec())
}

/// Unpack a release tarball so that `install_dir/piper` is the binary.
///
/// Any previous install is removed first. The archive is unpacked into a
/// staging directory next to `install_dir` and moved into place.
pub fn install_archive(archive: &[u8], install_dir: &Path) -> MouthResult<()> {
    let parent = match install_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    if install_dir.exists() {
        warn!("🧹 Removing incomplete install at {}", install_dir.display());
        fs::remove_dir_all(install_dir)?;
    }

    let staging = parent.join(".mouth-piper-extract");
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let result = unpack_into(archive, &staging).and_then(|()| {
        let root = staging.join(ARCHIVE_ROOT);
        let unpacked = if root.is_dir() { root } else { staging.clone() };
        fs::rename(&unpacked, install_dir)?;
        Ok(())
    });
    let _ = fs::remove_dir_all(&staging);
    result?;

    let binary = install_dir.join(BINARY_NAME);
    if !binary.exists() {
        return Err(MouthError::Provisioning(format!(
            "Piper binary not found at '{}' after extraction",
            binary.display()
        )));
    }
    make_executable(&binary)?;
    info!("✅ Piper binary is ready");
    Ok(())
}

fn unpack_into(archive: &[u8], dest: &Path) -> MouthResult<()> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    tar.unpack(dest)
        .map_err(|e| MouthError::Provisioning(format!("Failed to extract Piper: {}", e)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(unix)]
fn make_executable(path: &Path) -> MouthResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> MouthResult<()> {
    Ok(())
}

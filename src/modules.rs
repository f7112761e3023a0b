//! Root Module Installer
//!
//! Downloads Magisk / KernelSU / APatch module archives and installs them through
//! whichever root manager the device runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use reqwest::Client;
use tracing::{debug, info};

use folkadb_core::ShellError;
use folkadb_device_bridge::{AdbClient, ProcessRunner};

/// Name used when the URL has no usable file name
pub const DEFAULT_MODULE_NAME: &str = "downloaded_module.zip";

/// Download error types
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<DownloadError> for ShellError {
    fn from(err: DownloadError) -> Self {
        ShellError::Download(err.to_string())
    }
}

/// File name part of a URL, without query string
pub fn filename_from_url(url: &str) -> String {
    let name = url.rsplit(['/', '\\']).next().unwrap_or_default();
    let name = name.split(['?', '#']).next().unwrap_or_default();
    if name.is_empty() {
        DEFAULT_MODULE_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Module downloader
pub struct ModuleDownloader {
    client: Client,
    target_dir: PathBuf,
}

impl ModuleDownloader {
    pub fn new(target_dir: PathBuf) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self { client, target_dir })
    }

    /// Download `url` into the target directory, returning the local path
    pub async fn download(&self, url: &str) -> Result<PathBuf, DownloadError> {
        let target = self.target_dir.join(filename_from_url(url));
        info!("Downloading {} to {:?}", url, target);

        tokio::fs::create_dir_all(&self.target_dir).await?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(&target).await?;
        let mut stream = response.bytes_stream();

        use futures::StreamExt;

        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded {} bytes", downloaded);
        Ok(target)
    }
}

/// Check whether an archive looks like a root module (has a `module.prop`)
pub async fn is_module_zip(path: &Path) -> bool {
    let path = path.to_path_buf();

    // zip is synchronous
    tokio::task::spawn_blocking(move || {
        let Ok(file) = std::fs::File::open(&path) else {
            return false;
        };
        let Ok(archive) = zip::ZipArchive::new(file) else {
            return false;
        };
        has_module_prop(&archive)
    })
    .await
    .unwrap_or(false)
}

fn has_module_prop<F: std::io::Read + std::io::Seek>(archive: &zip::ZipArchive<F>) -> bool {
    archive
        .file_names()
        .any(|name| name == "module.prop" || name.ends_with("/module.prop"))
}

/// Root manager installed on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootProvider {
    APatch,
    KernelSu,
    Magisk,
}

impl RootProvider {
    /// Detection order
    pub const ALL: [RootProvider; 3] = [RootProvider::APatch, RootProvider::KernelSu, RootProvider::Magisk];

    /// Shell command that succeeds only when this provider is present
    pub fn probe_command(&self) -> &'static str {
        match self {
            RootProvider::APatch => "su -c \"apd -V\"",
            RootProvider::KernelSu => "su -c \"ksud -V\"",
            RootProvider::Magisk => "su -c \"magisk -V\"",
        }
    }

    /// Shell command installing the module at `remote_zip`
    pub fn install_command(&self, remote_zip: &str) -> String {
        match self {
            RootProvider::APatch => {
                format!("su -c \"/data/adb/apd module install \\\"{remote_zip}\\\"\"")
            }
            RootProvider::KernelSu => {
                format!("su -c \"/data/adb/ksud module install \\\"{remote_zip}\\\"\"")
            }
            RootProvider::Magisk => {
                format!("su -c \"magisk --install-module \\\"{remote_zip}\\\"\"")
            }
        }
    }
}

impl fmt::Display for RootProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RootProvider::APatch => "APatch",
            RootProvider::KernelSu => "KernelSU",
            RootProvider::Magisk => "Magisk",
        })
    }
}

/// First provider whose probe exits successfully
pub async fn detect_root_provider<R: ProcessRunner>(
    adb: &AdbClient<R>,
    serial: &str,
) -> Option<RootProvider> {
    for provider in RootProvider::ALL {
        match adb.shell(serial, provider.probe_command()).await {
            Ok(output) if output.success() => return Some(provider),
            Ok(_) => {}
            Err(e) => debug!("{} probe failed: {}", provider, e),
        }
    }
    None
}

//! Cached installation of PHP CodeSniffer releases.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::copy::copy_tree;
use super::fetcher::{download_url, ArchiveFetcher, DEFAULT_BASE_URL};
use crate::error::AcquireError;

/// Directory under the download root that holds the installed tool.
pub const TOOL_DIR_NAME: &str = "PHPCodeSniffer";

/// Prefix shared by the archive name and its top-level content directory.
pub const ARCHIVE_PREFIX: &str = "PHP_CodeSniffer";

/// Location of one installed tool version.
///
/// The marker file is the only proof of a completed install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInstallation {
    pub version: String,
    pub install_directory: PathBuf,
    pub marker_file: PathBuf,
}

impl ToolInstallation {
    pub fn new(download_root: &Path, version: &str) -> Self {
        let install_directory = download_root.join(TOOL_DIR_NAME);
        let marker_file = install_directory.join(version);
        Self {
            version: version.to_string(),
            install_directory,
            marker_file,
        }
    }

    /// Returns true if the marker for this version exists.
    pub fn is_installed(&self) -> bool {
        self.marker_file.is_file()
    }

    /// Name of the directory inside the archive holding the tool files.
    pub fn archive_content_dir(&self) -> String {
        format!("{}-{}", ARCHIVE_PREFIX, self.version)
    }
}

/// Ensures a runnable copy of the tool exists in a local cache.
pub struct Acquirer {
    fetcher: Arc<dyn ArchiveFetcher>,
    base_url: String,
}

impl Acquirer {
    /// Creates an acquirer downloading from the default PEAR mirror.
    pub fn new(fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        Self {
            fetcher,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Overrides the base URL archives are fetched from.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the install directory for `version`, downloading it first
    /// unless its marker file is already present.
    pub async fn ensure_installed(
        &self,
        version: &str,
        download_root: &Path,
    ) -> Result<PathBuf, AcquireError> {
        if !is_valid_version(version) {
            return Err(AcquireError::InvalidVersion);
        }

        let installation = ToolInstallation::new(download_root, version);
        debug!(
            "Checking if marker exists at {}",
            installation.marker_file.display()
        );
        if installation.is_installed() {
            info!("PHP CodeSniffer {} already exists.", version);
            return Ok(installation.install_directory);
        }

        // Possibly an older version, or a half-finished install.
        remove_stale(&installation.install_directory).await;

        let archive = tempfile::Builder::new()
            .prefix("codesniff-")
            .suffix(".tgz")
            .tempfile()
            .map_err(AcquireError::download)?;

        let url = download_url(&self.base_url, version);
        let bytes = self.fetcher.fetch(&url, archive.path()).await?;
        debug!("Downloaded {} bytes to {}", bytes, archive.path().display());

        let root = download_root.to_path_buf();
        let target = installation.clone();
        tokio::task::spawn_blocking(move || {
            let result = install_from_archive(archive.path(), &target, &root);
            drop(archive);
            result
        })
        .await
        .map_err(AcquireError::download)??;

        info!(
            "PHP CodeSniffer {} installed at {}",
            version,
            installation.install_directory.display()
        );
        Ok(installation.install_directory)
    }
}

/// The version names the marker file, so it must be a single path component.
fn is_valid_version(version: &str) -> bool {
    !version.trim().is_empty()
        && version != "."
        && version != ".."
        && !version.contains(&['/', '\\'][..])
}

async fn remove_stale(install_directory: &Path) {
    if !install_directory.exists() {
        return;
    }
    debug!("Removing stale install at {}", install_directory.display());
    if let Err(e) = tokio::fs::remove_dir_all(install_directory).await {
        warn!(
            "Failed to remove stale install at {}: {}",
            install_directory.display(),
            e
        );
    }
}

/// Unpacks `archive`, stages the tool tree next to its final location and
/// renames it into place.
fn install_from_archive(
    archive: &Path,
    installation: &ToolInstallation,
    download_root: &Path,
) -> Result<(), AcquireError> {
    let untar_dir = tempfile::Builder::new()
        .prefix("codesniff-untar-")
        .tempdir()
        .map_err(AcquireError::download)?;
    unpack_tar_gz(archive, untar_dir.path())?;
    debug!("Temporary untar directory is {}", untar_dir.path().display());

    let content_dir = untar_dir.path().join(installation.archive_content_dir());
    if !content_dir.is_dir() {
        return Err(AcquireError::download(format!(
            "archive does not contain {}",
            installation.archive_content_dir()
        )));
    }

    fs::create_dir_all(download_root).map_err(AcquireError::download)?;
    // Same filesystem as the install directory, so the final rename is atomic.
    let staging = tempfile::Builder::new()
        .prefix(".codesniff-staging-")
        .tempdir_in(download_root)
        .map_err(AcquireError::download)?;
    let staged_tool = staging.path().join(TOOL_DIR_NAME);

    let files = copy_tree(&content_dir, &staged_tool).map_err(AcquireError::download)?;
    let marker = staged_tool.join(&installation.version);
    if fs::symlink_metadata(&marker).is_ok() {
        return Err(AcquireError::download(format!(
            "version {} collides with {} in the tool tree",
            installation.version,
            marker.display()
        )));
    }
    File::create(&marker).map_err(AcquireError::download)?;
    debug!("Staged {} files in {}", files, staged_tool.display());

    match fs::rename(&staged_tool, &installation.install_directory) {
        Ok(()) => Ok(()),
        Err(_) if installation.is_installed() => {
            info!(
                "PHP CodeSniffer {} was installed concurrently, discarding staged copy",
                installation.version
            );
            Ok(())
        }
        Err(e) => Err(AcquireError::download(format!(
            "failed to move tool into {}: {}",
            installation.install_directory.display(),
            e
        ))),
    }
}

fn unpack_tar_gz(archive: &Path, dest: &Path) -> Result<(), AcquireError> {
    let file = File::open(archive).map_err(AcquireError::download)?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.unpack(dest).map_err(AcquireError::download)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeFetcher {
        payload: Option<Vec<u8>>,
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn serving(payload: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                payload: Some(payload),
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                payload: None,
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArchiveFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, AcquireError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            match &self.payload {
                Some(bytes) => {
                    fs::write(dest, bytes).map_err(AcquireError::download)?;
                    Ok(bytes.len() as u64)
                }
                None => Err(AcquireError::download("connection refused")),
            }
        }
    }

    fn build_archive(content_dir: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let entries: [(String, &[u8]); 3] = [
            ("package.xml".to_string(), b"<package/>"),
            (
                format!("{content_dir}/scripts/phpcs"),
                b"<?php include 'CodeSniffer.php';",
            ),
            (format!("{content_dir}/CodeSniffer.php"), b"<?php // sniffer"),
        ];
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_installation_layout() {
        let installation = ToolInstallation::new(Path::new("/cache"), "2.4.0");
        assert_eq!(
            installation.install_directory,
            PathBuf::from("/cache/PHPCodeSniffer")
        );
        assert_eq!(
            installation.marker_file,
            PathBuf::from("/cache/PHPCodeSniffer/2.4.0")
        );
        assert_eq!(installation.archive_content_dir(), "PHP_CodeSniffer-2.4.0");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let root = TempDir::new().unwrap();
        let installation = ToolInstallation::new(root.path(), "2.4.0");
        fs::create_dir_all(&installation.install_directory).unwrap();
        File::create(&installation.marker_file).unwrap();

        let fetcher = FakeFetcher::failing();
        let acquirer = Acquirer::new(fetcher.clone());

        let path = acquirer.ensure_installed("2.4.0", root.path()).await.unwrap();

        assert_eq!(path, installation.install_directory);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_miss_then_hit() {
        let root = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(build_archive("PHP_CodeSniffer-2.4.0"));
        let acquirer = Acquirer::new(fetcher.clone()).with_base_url("http://mirror.test/package");

        let first = acquirer.ensure_installed("2.4.0", root.path()).await.unwrap();
        let second = acquirer.ensure_installed("2.4.0", root.path()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            fetcher.urls.lock().unwrap()[0],
            "http://mirror.test/package/PHP_CodeSniffer-2.4.0.tgz"
        );
        assert!(first.join("2.4.0").is_file());
        assert!(first.join("scripts/phpcs").is_file());
        assert!(first.join("CodeSniffer.php").is_file());
        assert!(!first.join("package.xml").exists());
    }

    #[tokio::test]
    async fn test_no_staging_dirs_left_behind() {
        let root = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(build_archive("PHP_CodeSniffer-2.4.0"));
        let acquirer = Acquirer::new(fetcher);

        acquirer.ensure_installed("2.4.0", root.path()).await.unwrap();

        let names: Vec<String> = fs::read_dir(root.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![TOOL_DIR_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_stale_install_is_replaced() {
        let root = TempDir::new().unwrap();
        let stale = root.path().join(TOOL_DIR_NAME);
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("2.3.0"), "").unwrap();
        fs::write(stale.join("leftover.txt"), "old").unwrap();

        let fetcher = FakeFetcher::serving(build_archive("PHP_CodeSniffer-2.4.0"));
        let acquirer = Acquirer::new(fetcher.clone());

        let path = acquirer.ensure_installed("2.4.0", root.path()).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert!(path.join("2.4.0").is_file());
        assert!(!path.join("2.3.0").exists());
        assert!(!path.join("leftover.txt").exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_download_failed() {
        let root = TempDir::new().unwrap();
        let acquirer = Acquirer::new(FakeFetcher::failing());

        let err = acquirer.ensure_installed("9.9.9", root.path()).await.unwrap_err();

        assert!(matches!(err, AcquireError::DownloadFailed(msg) if msg.contains("connection refused")));
        assert!(!ToolInstallation::new(root.path(), "9.9.9").is_installed());
    }

    #[tokio::test]
    async fn test_archive_without_content_dir_fails() {
        let root = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(build_archive("SomethingElse-1.0"));
        let acquirer = Acquirer::new(fetcher);

        let err = acquirer.ensure_installed("2.4.0", root.path()).await.unwrap_err();

        assert!(matches!(err, AcquireError::DownloadFailed(msg) if msg.contains("PHP_CodeSniffer-2.4.0")));
        assert!(!root.path().join(TOOL_DIR_NAME).exists());
    }

    #[tokio::test]
    async fn test_corrupt_archive_fails() {
        let root = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(b"this is not gzip".to_vec());
        let acquirer = Acquirer::new(fetcher);

        let result = acquirer.ensure_installed("2.4.0", root.path()).await;

        assert!(matches!(result, Err(AcquireError::DownloadFailed(_))));
    }

    #[tokio::test]
    async fn test_empty_version_rejected() {
        let root = TempDir::new().unwrap();
        let fetcher = FakeFetcher::failing();
        let acquirer = Acquirer::new(fetcher.clone());

        let result = acquirer.ensure_installed("  ", root.path()).await;

        assert!(matches!(result, Err(AcquireError::InvalidVersion)));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_path_like_versions_rejected() {
        let root = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(build_archive("PHP_CodeSniffer-2.4.0"));
        let acquirer = Acquirer::new(fetcher.clone());

        for version in ["../escape", "2.4.0/x", "a\\b", "..", "."] {
            let result = acquirer.ensure_installed(version, root.path()).await;
            assert!(
                matches!(result, Err(AcquireError::InvalidVersion)),
                "{version} accepted"
            );
        }

        assert_eq!(fetcher.calls(), 0);
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_version_colliding_with_tool_file_fails() {
        let root = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(build_archive("PHP_CodeSniffer-CodeSniffer.php"));
        let acquirer = Acquirer::new(fetcher);

        let err = acquirer
            .ensure_installed("CodeSniffer.php", root.path())
            .await
            .unwrap_err();

        assert!(matches!(err, AcquireError::DownloadFailed(msg) if msg.contains("collides")));
        assert!(!root.path().join(TOOL_DIR_NAME).exists());
    }
}

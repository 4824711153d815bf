use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::discovery::BundledJvmFetcher;
use crate::core::error::{LauncherError, LauncherResult};

/// Installs the runtime shipped next to the launcher binary.
///
/// Looks for `<source>/<platform_id>` first and falls back to `<source>`
/// itself, then copies the tree into the destination. An existing
/// destination is reused as-is.
#[derive(Debug, Clone)]
pub struct BundledRuntimeCopier {
    source: PathBuf,
}

impl BundledRuntimeCopier {
    pub fn new(source: PathBuf) -> Self {
        Self { source }
    }

    fn source_for(&self, platform_id: &str) -> Option<PathBuf> {
        let per_platform = self.source.join(platform_id);
        if per_platform.is_dir() {
            return Some(per_platform);
        }
        self.source.is_dir().then(|| self.source.clone())
    }
}

#[async_trait]
impl BundledJvmFetcher for BundledRuntimeCopier {
    async fn fetch(&self, platform_id: &str, destination: &Path) -> LauncherResult<PathBuf> {
        if destination.join("bin").is_dir() {
            return Ok(destination.to_path_buf());
        }
        let source = self.source_for(platform_id).ok_or_else(|| {
            LauncherError::Fetch(format!(
                "no bundled runtime for {} under {:?}",
                platform_id, self.source
            ))
        })?;

        info!("Copying bundled runtime {:?} -> {:?}", source, destination);
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&target)?;
            copy_dir_recursive(&source, &target)
        })
        .await
        .map_err(|err| LauncherError::Fetch(format!("copy task failed: {}", err)))?
        .map_err(|source| LauncherError::Io {
            path: destination.to_path_buf(),
            source,
        })?;

        Ok(destination.to_path_buf())
    }
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            if dst_path.exists() {
                std::fs::remove_file(&dst_path)?;
            }
            // Keeps the executable bits on Unix.
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

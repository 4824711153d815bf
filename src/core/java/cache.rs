use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::installation::JavaInstallation;
use super::verify::VerifyResult;
use crate::core::error::{LauncherError, LauncherResult};

pub const RUNTIME_CACHE_FILE: &str = "java_runtimes.json";
/// Bump on any breaking change to `JavaInstallation`'s serialized form.
pub const RUNTIME_CACHE_FORMAT: u32 = 2;

/// Verification results keyed by runtime directory. Lives as long as the
/// orchestrator that owns it; never written to disk.
#[derive(Debug, Default)]
pub struct VerificationCache {
    entries: Mutex<HashMap<PathBuf, VerifyResult>>,
}

impl VerificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, directory: &Path) -> Option<VerifyResult> {
        self.lock().get(directory).cloned()
    }

    pub fn insert(&self, directory: &Path, result: VerifyResult) {
        self.lock().insert(directory.to_path_buf(), result);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, VerifyResult>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RuntimeCacheFile {
    format_version: u32,
    saved_at: DateTime<Utc>,
    runtimes: Vec<JavaInstallation>,
}

/// The runtime list persisted between launcher sessions.
#[derive(Debug, Clone)]
pub struct RuntimeListStore {
    path: PathBuf,
}

impl RuntimeListStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(RUNTIME_CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached runtimes whose `java` still exists. Missing, corrupt or
    /// outdated files read as empty.
    pub async fn load(&self) -> Vec<JavaInstallation> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(_) => return Vec::new(),
        };
        let file: RuntimeCacheFile = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(err) => {
                warn!("Ignoring unreadable runtime cache {:?}: {}", self.path, err);
                return Vec::new();
            }
        };
        if file.format_version != RUNTIME_CACHE_FORMAT {
            info!(
                "Runtime cache format {} != {}, rediscovering",
                file.format_version, RUNTIME_CACHE_FORMAT
            );
            return Vec::new();
        }

        let total = file.runtimes.len();
        let runtimes: Vec<JavaInstallation> = file
            .runtimes
            .into_iter()
            .filter(|rt| !rt.is_error() && rt.java_executable.is_file())
            .collect();
        debug!(
            "Loaded {} of {} cached runtimes from {:?} (saved {})",
            runtimes.len(),
            total,
            self.path,
            file.saved_at
        );
        runtimes
    }

    pub async fn save(&self, runtimes: &[JavaInstallation]) -> LauncherResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let file = RuntimeCacheFile {
            format_version: RUNTIME_CACHE_FORMAT,
            saved_at: Utc::now(),
            runtimes: runtimes.iter().filter(|rt| !rt.is_error()).cloned().collect(),
        };
        let payload = serde_json::to_vec_pretty(&file)?;
        tokio::fs::write(&self.path, payload)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

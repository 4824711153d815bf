// ─── Discovery orchestrator ───
// Owns the runtime list and the verification cache. Drives the platform
// probes, inspection, verification and ranking for the rest of the launcher.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::cache::{RuntimeListStore, VerificationCache};
use super::config::DiscoveryConfig;
use super::inspector::{normalize_runtime_dir, InspectError, RuntimeInspector};
use super::installation::JavaInstallation;
use super::platform::{current_platform, HostPlatform};
use super::score::{rank, CompatibilityScore, JavaRequirement, RecommendationLevel};
use super::verify::{VerificationEngine, VerifyConfig, VerifyResult};
use crate::core::error::LauncherResult;

const INSPECT_CONCURRENCY: usize = 8;

/// Retrieves a bundled runtime when nothing usable is installed.
#[async_trait]
pub trait BundledJvmFetcher: Send + Sync {
    /// Places a runtime under `destination` and returns its directory.
    async fn fetch(&self, platform_id: &str, destination: &Path) -> LauncherResult<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Closest runtime to each of the three long-lived Minecraft Java tracks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DefaultJavas {
    pub java8: Option<JavaInstallation>,
    pub java17: Option<JavaInstallation>,
    pub java21: Option<JavaInstallation>,
}

impl DefaultJavas {
    fn compute(runtimes: &[JavaInstallation]) -> Self {
        let closest = |major| {
            rank(runtimes, &JavaRequirement::exact(major))
                .into_iter()
                .next()
                .map(|scored| scored.runtime)
        };
        Self {
            java8: closest(8),
            java17: closest(17),
            java21: closest(21),
        }
    }
}

/// Clears the busy flag when dropped.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct JavaDiscoveryBuilder {
    config: DiscoveryConfig,
    platform: Option<Arc<dyn HostPlatform>>,
    verification_cache: Option<Arc<VerificationCache>>,
    fetcher: Option<Arc<dyn BundledJvmFetcher>>,
    store: Option<RuntimeListStore>,
    bundled_runtime_dir: Option<PathBuf>,
}

impl JavaDiscoveryBuilder {
    pub fn platform(mut self, platform: Arc<dyn HostPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn verification_cache(mut self, cache: Arc<VerificationCache>) -> Self {
        self.verification_cache = Some(cache);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn BundledJvmFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn store(mut self, store: RuntimeListStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn bundled_runtime_dir(mut self, dir: PathBuf) -> Self {
        self.bundled_runtime_dir = Some(dir);
        self
    }

    pub fn build(self) -> JavaDiscovery {
        let platform = self.platform.unwrap_or_else(current_platform);
        let inspector =
            RuntimeInspector::new(Arc::clone(&platform), self.config.version_query_timeout());
        let verifier =
            VerificationEngine::new(Arc::clone(&platform), VerifyConfig::from(&self.config));
        let bundled_runtime_dir = self.bundled_runtime_dir.unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("InterfaceOficial")
                .join("runtime")
        });

        JavaDiscovery {
            config: self.config,
            platform,
            inspector,
            verifier,
            verification_cache: self.verification_cache.unwrap_or_default(),
            store: self.store,
            fetcher: self.fetcher,
            bundled_runtime_dir,
            state: RwLock::new(DiscoveryState::Uninitialized),
            runtimes: RwLock::new(Vec::new()),
            defaults: Mutex::new(None),
            busy: AtomicBool::new(false),
            cancel: StdMutex::new(CancellationToken::new()),
        }
    }
}

pub struct JavaDiscovery {
    config: DiscoveryConfig,
    platform: Arc<dyn HostPlatform>,
    inspector: RuntimeInspector,
    verifier: VerificationEngine,
    verification_cache: Arc<VerificationCache>,
    store: Option<RuntimeListStore>,
    fetcher: Option<Arc<dyn BundledJvmFetcher>>,
    bundled_runtime_dir: PathBuf,
    state: RwLock<DiscoveryState>,
    runtimes: RwLock<Vec<JavaInstallation>>,
    defaults: Mutex<Option<DefaultJavas>>,
    busy: AtomicBool,
    /// Parent of every operation's token; replaced by `cancel()`.
    cancel: StdMutex<CancellationToken>,
}

impl JavaDiscovery {
    pub fn builder(config: DiscoveryConfig) -> JavaDiscoveryBuilder {
        JavaDiscoveryBuilder {
            config,
            platform: None,
            verification_cache: None,
            fetcher: None,
            store: None,
            bundled_runtime_dir: None,
        }
    }

    pub async fn state(&self) -> DiscoveryState {
        *self.state.read().await
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn platform(&self) -> &Arc<dyn HostPlatform> {
        &self.platform
    }

    /// Snapshot of the current runtime list, in discovery order.
    pub async fn runtimes(&self) -> Vec<JavaInstallation> {
        self.runtimes.read().await.clone()
    }

    /// Loads the cached list or runs a full discovery. No-op once started.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!("initialize skipped: discovery busy");
            return;
        };
        {
            let mut state = self.state.write().await;
            if *state != DiscoveryState::Uninitialized {
                return;
            }
            *state = DiscoveryState::Initializing;
        }

        let cached = match &self.store {
            Some(store) => store.load().await,
            None => Vec::new(),
        };

        let runtimes = if cached.is_empty() {
            let cancel = self.operation_token();
            let discovered = self.discover_all(&cancel).await;
            if cancel.is_cancelled() {
                info!("Java discovery cancelled before it finished");
                *self.state.write().await = DiscoveryState::Uninitialized;
                return;
            }
            *self.runtimes.write().await = discovered.clone();
            self.invalidate_defaults().await;
            self.verify_prefix(&discovered, &cancel).await;
            self.persist(&discovered).await;
            discovered
        } else {
            *self.runtimes.write().await = cached.clone();
            self.invalidate_defaults().await;
            cached
        };

        info!("Java discovery ready with {} runtimes", runtimes.len());
        *self.state.write().await = DiscoveryState::Ready;
    }

    /// Registers a user-supplied runtime. Returns the record and whether it
    /// was already in the list. `(None, false)` when the path is not a
    /// usable runtime or the orchestrator is not ready or busy.
    #[instrument(skip(self))]
    pub async fn manual_add(&self, path: &Path) -> (Option<JavaInstallation>, bool) {
        if self.state().await != DiscoveryState::Ready {
            return (None, false);
        }
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return (None, false);
        };

        let directory = identity_path(&normalize_runtime_dir(
            path,
            self.platform.executable_names().java,
        ));

        let promoted = {
            let mut runtimes = self.runtimes.write().await;
            runtimes
                .iter_mut()
                .find(|rt| rt.same_directory(&directory))
                .map(|existing| {
                    existing.is_user_imported = true;
                    existing.clone()
                })
        };
        if let Some(existing) = promoted {
            self.invalidate_defaults().await;
            self.persist_current().await;
            return (Some(existing), true);
        }

        let cancel = self.operation_token();
        let mut record = match self.inspector.inspect(&directory, &cancel).await {
            Ok(record) => record,
            Err(err) => {
                info!("Rejected manual runtime {:?}: {}", directory, err);
                return (None, false);
            }
        };
        record.is_user_imported = true;

        self.runtimes.write().await.push(record.clone());
        self.invalidate_defaults().await;
        self.verification_with(&record, &cancel).await;
        self.persist_current().await;
        (Some(record), false)
    }

    /// Rediscovers everything, keeping user-imported runtimes that still
    /// resolve. Returns the new list, or nothing when not ready or busy.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Vec<JavaInstallation> {
        if self.state().await != DiscoveryState::Ready {
            return Vec::new();
        }
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return Vec::new();
        };

        let preserved: Vec<JavaInstallation> = self
            .runtimes
            .read()
            .await
            .iter()
            .filter(|rt| rt.is_user_imported)
            .cloned()
            .collect();

        let cancel = self.operation_token();
        let mut runtimes = self.discover_all(&cancel).await;
        for mut kept in preserved {
            if let Some(found) = runtimes
                .iter_mut()
                .find(|rt| rt.same_directory(kept.directory()))
            {
                found.is_user_imported = true;
                continue;
            }
            match self.inspector.reinspect(&mut kept, &cancel).await {
                Ok(()) => runtimes.push(kept),
                Err(InspectError::Interrupted(err)) => {
                    debug!("Keeping user runtime {:?} as-is: {}", kept.directory(), err);
                    runtimes.push(kept);
                }
                Err(err @ InspectError::Unusable(_)) => {
                    info!("Dropping user runtime {:?}: {}", kept.directory(), err);
                }
            }
        }

        if cancel.is_cancelled() {
            info!("Java refresh cancelled, keeping the previous list");
            return self.runtimes().await;
        }

        self.verification_cache.clear();
        *self.runtimes.write().await = runtimes.clone();
        self.invalidate_defaults().await;
        self.verify_prefix(&runtimes, &cancel).await;

        if runtimes.is_empty() {
            if let Some(bundled) = self.fetch_bundled(&cancel).await {
                runtimes.push(bundled.clone());
                *self.runtimes.write().await = runtimes.clone();
                self.invalidate_defaults().await;
                self.verification_with(&bundled, &cancel).await;
            }
        }

        self.persist(&runtimes).await;
        info!("Java refresh finished with {} runtimes", runtimes.len());
        runtimes
    }

    /// Runtimes ranked against `requirement`, best first.
    pub async fn compatible_javas(&self, requirement: &JavaRequirement) -> Vec<CompatibilityScore> {
        if self.state().await != DiscoveryState::Ready {
            return Vec::new();
        }
        rank(&self.runtimes.read().await, requirement)
    }

    /// Top-ranked runtime unless even that one is incompatible.
    pub async fn best_java_for_game(&self, requirement: &JavaRequirement) -> Option<JavaInstallation> {
        self.compatible_javas(requirement)
            .await
            .into_iter()
            .next()
            .filter(|scored| scored.level != RecommendationLevel::Incompatible)
            .map(|scored| scored.runtime)
    }

    /// Closest runtimes to Java 8, 17 and 21. Cached until the list changes.
    pub async fn default_javas(&self) -> Option<DefaultJavas> {
        if self.state().await != DiscoveryState::Ready {
            return None;
        }
        let mut defaults = self.defaults.lock().await;
        if defaults.is_none() {
            let runtimes = self.runtimes.read().await;
            if runtimes.is_empty() {
                return None;
            }
            *defaults = Some(DefaultJavas::compute(&runtimes));
        }
        defaults.clone()
    }

    /// Inspects an arbitrary path without touching the list.
    pub async fn inspect_path(&self, path: &Path) -> Option<JavaInstallation> {
        if let Some(known) = self.find(path).await {
            return Some(known);
        }
        let directory = identity_path(&normalize_runtime_dir(
            path,
            self.platform.executable_names().java,
        ));
        self.inspector
            .inspect_usable(&directory, &self.operation_token())
            .await
    }

    /// Listed runtime whose directory matches `path` once normalized.
    pub async fn find(&self, path: &Path) -> Option<JavaInstallation> {
        let directory = identity_path(&normalize_runtime_dir(
            path,
            self.platform.executable_names().java,
        ));
        self.runtimes
            .read()
            .await
            .iter()
            .find(|rt| rt.same_directory(&directory))
            .cloned()
    }

    /// Cached verification result, computing it on a miss.
    pub async fn verification(&self, runtime: &JavaInstallation) -> VerifyResult {
        self.verification_with(runtime, &self.operation_token()).await
    }

    async fn verification_with(
        &self,
        runtime: &JavaInstallation,
        cancel: &CancellationToken,
    ) -> VerifyResult {
        if let Some(hit) = self.verification_cache.get(runtime.directory()) {
            return hit;
        }
        let result = self.verifier.verify(runtime, cancel).await;
        if !cancel.is_cancelled() {
            self.verification_cache
                .insert(runtime.directory(), result.clone());
        }
        result
    }

    pub fn clear_verification_cache(&self) {
        self.verification_cache.clear();
    }

    pub fn verification_cache(&self) -> &Arc<VerificationCache> {
        &self.verification_cache
    }

    /// Stops the child processes of every operation in flight.
    /// Operations started afterwards run normally.
    pub fn cancel(&self) {
        let mut current = self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        current.cancel();
        *current = CancellationToken::new();
    }

    fn operation_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .child_token()
    }

    async fn discover_all(&self, cancel: &CancellationToken) -> Vec<JavaInstallation> {
        let candidates = self
            .platform
            .candidate_directories(&self.config, cancel)
            .await;
        debug!("Inspecting {} candidate directories", candidates.len());

        let records: Vec<Result<JavaInstallation, InspectError>> = stream::iter(candidates)
            .map(|dir| async move { self.inspector.inspect(&dir, cancel).await })
            .buffered(INSPECT_CONCURRENCY)
            .collect()
            .await;

        let mut runtimes: Vec<JavaInstallation> = Vec::with_capacity(records.len());
        for record in records {
            let Ok(record) = record else {
                continue;
            };
            if runtimes.iter().any(|rt| rt.same_directory(record.directory())) {
                continue;
            }
            runtimes.push(record);
        }
        runtimes
    }

    async fn verify_prefix(&self, runtimes: &[JavaInstallation], cancel: &CancellationToken) {
        let prefix = runtimes.iter().take(self.config.verify_on_discovery);
        join_all(prefix.map(|rt| self.verification_with(rt, cancel))).await;
    }

    async fn fetch_bundled(&self, cancel: &CancellationToken) -> Option<JavaInstallation> {
        let fetcher = self.fetcher.as_ref()?;
        let platform_id = self.platform.platform_id();
        info!("No Java runtimes found, fetching bundled runtime for {}", platform_id);

        let fetched = match fetcher.fetch(&platform_id, &self.bundled_runtime_dir).await {
            Ok(dir) => dir,
            Err(err) => {
                warn!("Bundled runtime fetch failed: {}", err);
                return None;
            }
        };
        let directory = identity_path(&normalize_runtime_dir(
            &fetched,
            self.platform.executable_names().java,
        ));
        let mut record = self.inspector.inspect_usable(&directory, cancel).await?;
        record.is_user_imported = true;
        Some(record)
    }

    async fn invalidate_defaults(&self) {
        *self.defaults.lock().await = None;
    }

    async fn persist_current(&self) {
        let runtimes = self.runtimes.read().await.clone();
        self.persist(&runtimes).await;
    }

    async fn persist(&self, runtimes: &[JavaInstallation]) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(runtimes).await {
            warn!("Failed to save runtime cache: {}", err);
        }
    }
}

/// Resolves symlinks outside Windows so manual paths match probe results.
/// Windows paths are kept as given to avoid the `\\?\` prefix.
fn identity_path(path: &Path) -> PathBuf {
    if cfg!(windows) {
        return path.to_path_buf();
    }
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::{
    BundledRuntimeCopier, DiscoveryConfig, JavaDiscovery, RuntimeListStore, TrustLevel,
};

const APP_DIR_NAME: &str = "InterfaceOficial";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

/// Options the binary passes in from its command line.
#[derive(Debug, Clone, Default)]
pub struct StateOptions {
    pub data_dir: Option<PathBuf>,
    pub strict: bool,
    pub bundled_runtime: Option<PathBuf>,
}

pub struct AppState {
    pub data_dir: PathBuf,
    pub config: DiscoveryConfig,
    pub discovery: Arc<JavaDiscovery>,
}

impl AppState {
    pub fn new(options: StateOptions) -> LauncherResult<Self> {
        let data_dir = match options.data_dir {
            Some(dir) => dir,
            None => default_data_dir(),
        };
        std::fs::create_dir_all(&data_dir).map_err(|source| LauncherError::Io {
            path: data_dir.clone(),
            source,
        })?;

        let mut config = DiscoveryConfig::load(&data_dir);
        if options.strict {
            config.trust_level = TrustLevel::Strict;
        }
        for managed in [runtimes_dir(&data_dir), embedded_runtime_dir(&data_dir)] {
            if !config.extra_search_roots.contains(&managed) {
                config.extra_search_roots.push(managed);
            }
        }
        config.validate()?;
        debug!("Discovery config: {:?}", config);

        let mut builder = JavaDiscovery::builder(config.clone())
            .store(RuntimeListStore::in_dir(&data_dir))
            .bundled_runtime_dir(embedded_runtime_dir(&data_dir));
        if let Some(source) = options.bundled_runtime {
            builder = builder.fetcher(Arc::new(BundledRuntimeCopier::new(source)));
        }

        info!("Data directory: {:?}", data_dir);
        Ok(Self {
            data_dir,
            config,
            discovery: Arc::new(builder.build()),
        })
    }

    pub fn runtimes_dir(&self) -> PathBuf {
        runtimes_dir(&self.data_dir)
    }

    pub fn embedded_runtime_dir(&self) -> PathBuf {
        embedded_runtime_dir(&self.data_dir)
    }
}

fn runtimes_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("runtimes")
}

fn embedded_runtime_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("runtime")
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `<data_dir>/InterfaceOficial`, unless the bootstrap file relocated it.
fn default_data_dir() -> PathBuf {
    let base = default_base_dir();
    let bootstrap_path = base.join(BOOTSTRAP_FILE);

    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            return cfg.data_dir;
        }
    }

    base.join(APP_DIR_NAME)
}

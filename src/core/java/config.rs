use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{LauncherError, LauncherResult};

pub const CONFIG_FILE: &str = "java_discovery.json";

/// How the functional probe treats checks it could not perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Missing tools or an inconclusive probe count as genuine.
    #[default]
    Lenient,
    /// Only a completed functional probe counts as genuine.
    Strict,
}

/// Settings for discovery, verification and the on-disk caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How many freshly discovered runtimes are verified right away.
    pub verify_on_discovery: usize,
    pub trust_level: TrustLevel,
    pub version_query_timeout_secs: u64,
    pub functional_probe_timeout_secs: u64,
    /// Directory-name fragments the Windows drive walk is allowed to enter.
    pub search_keywords: Vec<String>,
    /// Paths containing one of these are launcher shims, not runtimes.
    pub shim_markers: Vec<String>,
    pub windows_max_depth: usize,
    pub unix_search_roots: Vec<PathBuf>,
    pub unix_search_depth: usize,
    /// Extra roots searched on every OS (the launcher's managed runtimes).
    pub extra_search_roots: Vec<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            verify_on_discovery: 5,
            trust_level: TrustLevel::Lenient,
            version_query_timeout_secs: 10,
            functional_probe_timeout_secs: 30,
            search_keywords: default_search_keywords(),
            shim_markers: default_shim_markers(),
            windows_max_depth: 6,
            unix_search_roots: default_unix_search_roots(),
            unix_search_depth: 5,
            extra_search_roots: Vec::new(),
            scratch_dir: None,
        }
    }
}

impl DiscoveryConfig {
    /// Reads `java_discovery.json` from `data_dir`. Missing or corrupt files
    /// fall back to defaults.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<Self>(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!("Corrupt {:?}, using defaults: {}", path, err);
                Self::default()
            }
        }
    }

    pub fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        let path = data_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| LauncherError::Io { path, source })
    }

    pub fn validate(&self) -> LauncherResult<()> {
        if self.version_query_timeout_secs == 0 || self.functional_probe_timeout_secs == 0 {
            return Err(LauncherError::Config("timeouts must be greater than zero".into()));
        }
        if self.search_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(LauncherError::Config("search keywords must not be empty".into()));
        }
        Ok(())
    }

    pub fn version_query_timeout(&self) -> Duration {
        Duration::from_secs(self.version_query_timeout_secs)
    }

    pub fn functional_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.functional_probe_timeout_secs)
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("InterfaceOficial"))
    }

    /// Case-insensitive keyword test for a directory name.
    pub fn matches_keyword(&self, dir_name: &str) -> bool {
        let lower = dir_name.to_lowercase();
        self.search_keywords
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()))
    }

    pub fn is_shim(&self, path: &Path) -> bool {
        let text = path.to_string_lossy().to_lowercase();
        self.shim_markers
            .iter()
            .any(|marker| text.contains(&marker.to_lowercase()))
    }
}

fn default_search_keywords() -> Vec<String> {
    [
        // languages and tooling
        "java", "jdk", "jre", "jvm", "openjdk", "runtime", "jbr", ".jdks", "sdk",
        // vendors and distributions
        "oracle", "adoptium", "adoptopenjdk", "temurin", "eclipse", "microsoft", "amazon",
        "corretto", "azul", "zulu", "bellsoft", "liberica", "sap", "dragonwell", "kona",
        "redhat", "graalvm", "semeru", "jetbrains",
        // installer and launcher folders
        "program files", "programs", "appdata", "local", "roaming", "games", "minecraft",
        ".minecraft", "launcher", "interfaceoficial", "tools", "apps", "scoop",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_shim_markers() -> Vec<String> {
    vec![
        "\\Common Files\\Oracle\\Java\\javapath".to_string(),
        "\\WindowsApps\\".to_string(),
    ]
}

fn default_unix_search_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = [
        "/usr/lib/jvm",
        "/usr/lib64/jvm",
        "/usr/java",
        "/usr/local/java",
        "/opt/java",
        "/opt/jdk",
        "/opt/jdks",
        "/usr/local/opt",
        "/opt/homebrew/opt",
        "/Library/Java/JavaVirtualMachines",
        "/System/Library/Java/JavaVirtualMachines",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(home) = dirs::home_dir() {
        for rel in [
            ".sdkman/candidates/java",
            ".jdks",
            ".asdf/installs/java",
            ".local/share/mise/installs/java",
            ".gradle/jdks",
            "Library/Java/JavaVirtualMachines",
        ] {
            roots.push(home.join(rel));
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiscoveryConfig::load(dir.path());
        assert_eq!(config.verify_on_discovery, 5);
        assert_eq!(config.trust_level, TrustLevel::Lenient);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "trust_level": "strict", "search_keywords": ["java"] }"#,
        )
        .unwrap();
        let config = DiscoveryConfig::load(dir.path());
        assert_eq!(config.trust_level, TrustLevel::Strict);
        assert_eq!(config.search_keywords, vec!["java".to_string()]);
        assert_eq!(config.windows_max_depth, 6);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert_eq!(DiscoveryConfig::load(dir.path()).unix_search_depth, 5);
    }

    #[test]
    fn keyword_and_shim_matching() {
        let config = DiscoveryConfig::default();
        assert!(config.matches_keyword("Eclipse Adoptium"));
        assert!(config.matches_keyword("jdk-17.0.2+8"));
        assert!(!config.matches_keyword("Photos"));
        assert!(config.is_shim(Path::new(
            "C:\\Program Files\\Common Files\\Oracle\\Java\\javapath"
        )));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = DiscoveryConfig {
            functional_probe_timeout_secs: 0,
            ..DiscoveryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

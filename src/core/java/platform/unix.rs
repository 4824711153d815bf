use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use super::{managed_roots, union_in_order, ExecutableNames, HostPlatform, SignatureCheck};
use crate::core::java::config::DiscoveryConfig;
use crate::core::java::installation::{Architecture, HostOs};

/// Linux and macOS probe: `JAVA_HOME`, `which java`, and bounded walks of
/// the usual install roots, all searched concurrently.
#[derive(Debug, Clone)]
pub struct UnixPlatform {
    os: HostOs,
    arch: Architecture,
}

impl UnixPlatform {
    pub fn new() -> Self {
        Self {
            os: HostOs::current(),
            arch: Architecture::host(),
        }
    }
}

impl Default for UnixPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostPlatform for UnixPlatform {
    fn os(&self) -> HostOs {
        self.os
    }

    fn architecture(&self) -> Architecture {
        self.arch
    }

    fn executable_names(&self) -> ExecutableNames {
        ExecutableNames::UNIX
    }

    #[instrument(skip_all)]
    async fn candidate_directories(
        &self,
        config: &DiscoveryConfig,
        cancel: &CancellationToken,
    ) -> Vec<PathBuf> {
        let java = self.executable_names().java;

        let mut roots = config.unix_search_roots.clone();
        roots.extend(managed_roots(config));
        let depth = config.unix_search_depth;

        let walks = roots.into_iter().map(|root| {
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || walk_root(&root, depth, java, &cancel))
        });

        let (java_home, on_path, walked) = tokio::join!(
            tokio::task::spawn_blocking(move || from_java_home(java)),
            tokio::task::spawn_blocking(move || from_which(java)),
            join_all(walks),
        );

        let mut groups = vec![java_home.unwrap_or_default(), on_path.unwrap_or_default()];
        groups.extend(walked.into_iter().map(Result::unwrap_or_default));

        let found = union_in_order(groups);
        debug!("Unix probe produced {} candidate directories", found.len());
        found
    }

    async fn check_signature(&self, _binary: &Path, _cancel: &CancellationToken) -> SignatureCheck {
        SignatureCheck::Skipped
    }
}

fn from_java_home(java: &str) -> Vec<PathBuf> {
    let Some(home) = std::env::var_os("JAVA_HOME").map(PathBuf::from) else {
        return Vec::new();
    };
    let bin = home.join("bin");
    if bin.join(java).is_file() {
        vec![canonical(&bin)]
    } else {
        Vec::new()
    }
}

fn from_which(java: &str) -> Vec<PathBuf> {
    let Ok(found) = which::which(java) else {
        return Vec::new();
    };
    // /usr/bin/java is usually an alternatives symlink chain.
    let resolved = std::fs::canonicalize(&found).unwrap_or(found);
    resolved.parent().map(|p| vec![p.to_path_buf()]).unwrap_or_default()
}

fn walk_root(root: &Path, max_depth: usize, java: &str, cancel: &CancellationToken) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
        .filter_entry(|_| !cancel.is_cancelled())
        .filter_map(Result::ok);

    for entry in walker {
        if !entry.file_type().is_file() || entry.file_name() != java {
            continue;
        }
        let Some(bin) = entry.path().parent() else {
            continue;
        };
        if bin.file_name().and_then(|n| n.to_str()) != Some("bin") {
            continue;
        }
        if is_embedded_jre(bin, java) {
            continue;
        }
        found.push(canonical(bin));
    }
    found
}

/// `jdk1.8/jre/bin` duplicates `jdk1.8/bin`.
fn is_embedded_jre(bin: &Path, java: &str) -> bool {
    let Some(jre) = bin.parent() else {
        return false;
    };
    if jre.file_name().and_then(|n| n.to_str()) != Some("jre") {
        return false;
    }
    jre.parent()
        .map(|jdk| jdk.join("bin").join(java).is_file())
        .unwrap_or(false)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn walk_finds_bin_directories_and_skips_embedded_jre() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("jdk-17/bin/java"));
        touch(&root.path().join("jdk1.8.0_351/bin/java"));
        touch(&root.path().join("jdk1.8.0_351/jre/bin/java"));
        touch(&root.path().join("zulu-21.jdk/Contents/Home/bin/java"));
        touch(&root.path().join("notes/java"));

        let mut found = walk_root(root.path(), 5, "java", &CancellationToken::new());
        found.sort();

        let base = canonical(root.path());
        let mut expected = vec![
            base.join("jdk-17/bin"),
            base.join("jdk1.8.0_351/bin"),
            base.join("zulu-21.jdk/Contents/Home/bin"),
        ];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn walk_respects_depth_bound() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("a/b/c/d/e/bin/java"));
        let found = walk_root(root.path(), 3, "java", &CancellationToken::new());
        assert!(found.is_empty());
    }

    #[test]
    fn missing_root_yields_nothing() {
        let found = walk_root(
            Path::new("/definitely/missing/root"),
            5,
            "java",
            &CancellationToken::new(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn cancelled_walk_yields_nothing() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("jdk-17/bin/java"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(walk_root(root.path(), 5, "java", &cancel).is_empty());
    }
}

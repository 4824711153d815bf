// ─── Host platform capability ───
// Everything OS-specific about finding and checking runtimes lives behind
// `HostPlatform`: candidate roots, executable names, code signatures.

mod unix;
mod windows;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use unix::UnixPlatform;
pub use windows::WindowsPlatform;

use super::config::DiscoveryConfig;
use super::installation::{Architecture, HostOs};

/// File names of the tools expected next to a runtime's `java`.
#[derive(Debug, Clone, Copy)]
pub struct ExecutableNames {
    pub java: &'static str,
    /// Windowless launcher; same as `java` outside Windows.
    pub javaw: &'static str,
    pub javac: &'static str,
    pub jar: &'static str,
}

impl ExecutableNames {
    pub const WINDOWS: Self = Self {
        java: "java.exe",
        javaw: "javaw.exe",
        javac: "javac.exe",
        jar: "jar.exe",
    };

    pub const UNIX: Self = Self {
        java: "java",
        javaw: "java",
        javac: "javac",
        jar: "jar",
    };
}

/// Outcome of a code-signature query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    /// The platform has no signature step.
    Skipped,
    /// The utility could not be run or its output was unreadable.
    Unavailable(String),
    Checked {
        status: String,
        subject: Option<String>,
    },
}

impl SignatureCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Checked { status, .. } if status.eq_ignore_ascii_case("valid"))
    }
}

#[async_trait]
pub trait HostPlatform: Send + Sync {
    fn os(&self) -> HostOs;

    fn architecture(&self) -> Architecture;

    fn executable_names(&self) -> ExecutableNames;

    /// Directories that may hold a `java` executable. Unvalidated, read-only,
    /// never fails: unreadable branches contribute nothing.
    async fn candidate_directories(
        &self,
        config: &DiscoveryConfig,
        cancel: &CancellationToken,
    ) -> Vec<PathBuf>;

    async fn check_signature(&self, binary: &Path, cancel: &CancellationToken) -> SignatureCheck;

    /// `<os>-<arch>`, handed to the bundled runtime fetcher.
    fn platform_id(&self) -> String {
        format!("{}-{}", self.os().as_str(), self.architecture().as_str())
    }
}

pub fn current_platform() -> Arc<dyn HostPlatform> {
    if cfg!(windows) {
        Arc::new(WindowsPlatform::new())
    } else {
        Arc::new(UnixPlatform::new())
    }
}

/// Unions candidate lists keeping first-seen order.
pub(crate) fn union_in_order(groups: impl IntoIterator<Item = Vec<PathBuf>>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for path in groups.into_iter().flatten() {
        let key = dedup_key(&path);
        if seen.insert(key) {
            out.push(path);
        }
    }
    out
}

fn dedup_key(path: &Path) -> String {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches(['/', '\\']);
    if cfg!(windows) {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// True for symlinks and, on Windows, any reparse point (junctions included).
pub(crate) fn is_link_like(path: &Path) -> bool {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return false;
    };
    if metadata.file_type().is_symlink() {
        return true;
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
        if metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0 {
            return true;
        }
    }
    false
}

/// Directories searched on every OS: configured extras plus the launcher's
/// managed runtime folders.
pub(crate) fn managed_roots(config: &DiscoveryConfig) -> Vec<PathBuf> {
    let mut roots = config.extra_search_roots.clone();
    if let Some(data) = dirs::data_dir() {
        let app = data.join("InterfaceOficial");
        roots.push(app.join("runtimes"));
        roots.push(app.join("runtime"));
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_keeps_first_seen_order() {
        let merged = union_in_order(vec![
            vec![PathBuf::from("/b/bin"), PathBuf::from("/a/bin")],
            vec![PathBuf::from("/a/bin/"), PathBuf::from("/c/bin")],
        ]);
        assert_eq!(
            merged,
            vec![
                PathBuf::from("/b/bin"),
                PathBuf::from("/a/bin"),
                PathBuf::from("/c/bin")
            ]
        );
    }

    #[test]
    fn signature_validity() {
        assert!(SignatureCheck::Checked {
            status: "Valid".into(),
            subject: None
        }
        .is_valid());
        assert!(!SignatureCheck::Checked {
            status: "HashMismatch".into(),
            subject: None
        }
        .is_valid());
        assert!(!SignatureCheck::Skipped.is_valid());
    }

    #[test]
    fn platform_id_format() {
        let platform = UnixPlatform::new();
        let id = platform.platform_id();
        assert!(id.starts_with("linux-") || id.starts_with("mac-") || id.starts_with("windows-"));
    }
}

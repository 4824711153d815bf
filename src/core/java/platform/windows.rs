use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use super::{
    is_link_like, managed_roots, union_in_order, ExecutableNames, HostPlatform, SignatureCheck,
};
use crate::core::java::config::DiscoveryConfig;
use crate::core::java::installation::{Architecture, HostOs};
use crate::core::java::process::run_captured;

const SIGNATURE_TIMEOUT_SECS: u64 = 20;

/// Windows probe: `PATH`, keyword-bounded walks of every drive, and the user
/// profile folders.
#[derive(Debug, Clone)]
pub struct WindowsPlatform {
    arch: Architecture,
}

impl WindowsPlatform {
    pub fn new() -> Self {
        Self {
            arch: Architecture::host(),
        }
    }
}

impl Default for WindowsPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostPlatform for WindowsPlatform {
    fn os(&self) -> HostOs {
        HostOs::Windows
    }

    fn architecture(&self) -> Architecture {
        self.arch
    }

    fn executable_names(&self) -> ExecutableNames {
        ExecutableNames::WINDOWS
    }

    #[instrument(skip_all)]
    async fn candidate_directories(
        &self,
        config: &DiscoveryConfig,
        cancel: &CancellationToken,
    ) -> Vec<PathBuf> {
        let javaw = self.executable_names().javaw;
        let config = Arc::new(config.clone());

        let mut roots = drive_roots();
        roots.extend(profile_roots());
        roots.extend(managed_roots(&config));

        let walks = roots.into_iter().map(|root| {
            let config = Arc::clone(&config);
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || keyword_walk(&root, javaw, &config, &cancel))
        });

        let (on_path, walked) = tokio::join!(
            tokio::task::spawn_blocking(move || from_path_variable(javaw)),
            join_all(walks),
        );

        let mut groups = vec![on_path.unwrap_or_default()];
        groups.extend(walked.into_iter().map(Result::unwrap_or_default));

        let mut found: Vec<PathBuf> = union_in_order(groups)
            .into_iter()
            .filter(|path| !config.is_shim(path))
            .collect();
        found.sort();
        debug!("Windows probe produced {} candidate directories", found.len());
        found
    }

    async fn check_signature(&self, binary: &Path, cancel: &CancellationToken) -> SignatureCheck {
        let script = format!(
            "$s = Get-AuthenticodeSignature -LiteralPath '{}'; \
             Write-Output (\"Status: \" + $s.Status); \
             Write-Output (\"Subject: \" + $s.SignerCertificate.Subject)",
            binary.display().to_string().replace('\'', "''")
        );
        let output = run_captured(
            Path::new("powershell.exe"),
            &["-NoProfile", "-NonInteractive", "-Command", &script],
            None,
            std::time::Duration::from_secs(SIGNATURE_TIMEOUT_SECS),
            cancel,
        )
        .await;

        match output {
            Ok(output) => parse_signature_output(&output.stdout),
            Err(err) => SignatureCheck::Unavailable(err.to_string()),
        }
    }
}

fn from_path_variable(javaw: &str) -> Vec<PathBuf> {
    let Some(path_var) = std::env::var_os("PATH") else {
        return Vec::new();
    };
    std::env::split_paths(&path_var)
        .filter(|dir| dir.join(javaw).is_file())
        .collect()
}

fn drive_roots() -> Vec<PathBuf> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .map(|disk| disk.mount_point().to_path_buf())
        .collect()
}

fn profile_roots() -> Vec<PathBuf> {
    [
        dirs::home_dir(),
        dirs::data_dir(),
        dirs::data_local_dir(),
        dirs::desktop_dir(),
        dirs::download_dir(),
        dirs::document_dir(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Depth-first walk that only enters directories named after something in
/// the keyword table. Reparse points are never followed.
/// Walks `root` into directories whose name matches a configured keyword,
/// collecting every visited directory (or its `bin`) that holds `javaw`.
fn keyword_walk(
    root: &Path,
    javaw: &str,
    config: &DiscoveryConfig,
    cancel: &CancellationToken,
) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .max_depth(config.windows_max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if cancel.is_cancelled() || !entry.file_type().is_dir() {
                return false;
            }
            entry.depth() == 0
                || (config.matches_keyword(&entry.file_name().to_string_lossy())
                    && !is_link_like(entry.path()))
        })
        .filter_map(Result::ok);

    let mut found = Vec::new();
    for entry in walker {
        let dir = entry.path();
        if dir.join(javaw).is_file() {
            found.push(dir.to_path_buf());
        }
        let bin = dir.join("bin");
        if bin.join(javaw).is_file() {
            found.push(bin);
        }
    }
    found
}

fn parse_signature_output(stdout: &str) -> SignatureCheck {
    let mut status = None;
    let mut subject = None;
    for line in stdout.lines() {
        if let Some(value) = line.trim().strip_prefix("Status:") {
            status = Some(value.trim().to_string());
        } else if let Some(value) = line.trim().strip_prefix("Subject:") {
            let value = value.trim();
            if !value.is_empty() {
                subject = Some(value.to_string());
            }
        }
    }
    match status {
        Some(status) if !status.is_empty() => SignatureCheck::Checked { status, subject },
        _ => SignatureCheck::Unavailable("no signature status in output".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_signature() {
        let check = parse_signature_output(
            "Status: Valid\r\nSubject: CN=Microsoft Corporation, O=Microsoft Corporation\r\n",
        );
        assert_eq!(
            check,
            SignatureCheck::Checked {
                status: "Valid".into(),
                subject: Some("CN=Microsoft Corporation, O=Microsoft Corporation".into()),
            }
        );
        assert!(check.is_valid());
    }

    #[test]
    fn parses_unsigned_binary() {
        let check = parse_signature_output("Status: NotSigned\nSubject: \n");
        assert_eq!(
            check,
            SignatureCheck::Checked {
                status: "NotSigned".into(),
                subject: None,
            }
        );
        assert!(!check.is_valid());
    }

    #[test]
    fn empty_output_is_unavailable() {
        assert!(matches!(parse_signature_output(""), SignatureCheck::Unavailable(_)));
    }

    #[test]
    fn keyword_walk_only_enters_listed_directories() {
        let root = tempfile::tempdir().unwrap();
        let listed = root.path().join("Program Files/Eclipse Adoptium/jdk-17.0.8/bin");
        let hidden = root.path().join("Photos/jdk-21/bin");
        for dir in [&listed, &hidden] {
            std::fs::create_dir_all(dir).unwrap();
            std::fs::write(dir.join("javaw.exe"), b"").unwrap();
        }

        let config = DiscoveryConfig::default();
        let found = keyword_walk(root.path(), "javaw.exe", &config, &CancellationToken::new());
        assert_eq!(found, vec![listed]);
    }

    #[test]
    fn keyword_walk_respects_max_depth() {
        let root = tempfile::tempdir().unwrap();
        let deep = root.path().join("java/java/java/bin");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("javaw.exe"), b"").unwrap();

        let config = DiscoveryConfig {
            windows_max_depth: 1,
            ..DiscoveryConfig::default()
        };
        let found = keyword_walk(root.path(), "javaw.exe", &config, &CancellationToken::new());
        assert!(found.is_empty());
    }

    #[test]
    fn keyword_walk_stops_when_cancelled() {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("Java/jdk-17/bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("javaw.exe"), b"").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let found = keyword_walk(root.path(), "javaw.exe", &DiscoveryConfig::default(), &cancel);
        assert!(found.is_empty());
    }

    #[test]
    fn keyword_walk_finds_javaw_beside_bin() {
        let root = tempfile::tempdir().unwrap();
        let jre = root.path().join("Minecraft Launcher/runtime/java-runtime-gamma");
        std::fs::create_dir_all(&jre).unwrap();
        std::fs::write(jre.join("javaw.exe"), b"").unwrap();

        let found = keyword_walk(
            root.path(),
            "javaw.exe",
            &DiscoveryConfig::default(),
            &CancellationToken::new(),
        );
        assert_eq!(found, vec![jre]);
    }
}

// ─── Runtime inspection ───
// Turns a candidate directory into a `JavaInstallation`: vendor `release`
// file first, then `java -XshowSettings:properties -version`, then the
// executable header for the architecture.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::binary::architecture_of_file;
use super::installation::{
    compatibility_for, parse_major_version, Architecture, JavaInstallation,
};
use super::platform::HostPlatform;
use super::process::{run_captured, ProcessError};

/// Key/value pairs read from a JDK `release` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub implementor: Option<String>,
    pub java_version: Option<String>,
    pub os_arch: Option<String>,
}

impl ReleaseInfo {
    fn is_complete(&self) -> bool {
        self.implementor.is_some() && self.java_version.is_some() && self.os_arch.is_some()
    }
}

/// Parses `KEY="value"` lines, stopping once every wanted key is known.
pub fn parse_release_file(contents: &str) -> ReleaseInfo {
    let mut info = ReleaseInfo::default();
    for line in contents.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "IMPLEMENTOR" => info.implementor = Some(value),
            "JAVA_VERSION" => info.java_version = Some(value),
            "OS_ARCH" => info.os_arch = Some(value),
            _ => {}
        }
        if info.is_complete() {
            break;
        }
    }
    info
}

/// Facts pulled from `-XshowSettings:properties -version` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionQuery {
    pub version: Option<String>,
    pub os_arch: Option<String>,
    pub vendor: Option<String>,
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"version "([^"]+)""#).expect("static regex"))
}

/// Value of a `key = value` line from `-XshowSettings:properties`.
pub(crate) fn property_value(output: &str, key: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k.trim() == key).then(|| v.trim().to_string())
    })
}

pub fn parse_version_output(output: &str) -> VersionQuery {
    VersionQuery {
        version: version_pattern()
            .captures(output)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
        os_arch: property_value(output, "os.arch"),
        vendor: property_value(output, "java.vendor"),
    }
}

/// Why a candidate directory produced no record.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// Not a runtime, or a runtime that cannot start.
    #[error("unusable runtime: {0}")]
    Unusable(String),
    /// The version query timed out or was cancelled. Says nothing about
    /// the runtime itself.
    #[error("inspection interrupted: {0}")]
    Interrupted(#[source] ProcessError),
}

pub struct RuntimeInspector {
    platform: Arc<dyn HostPlatform>,
    timeout: Duration,
}

impl RuntimeInspector {
    pub fn new(platform: Arc<dyn HostPlatform>, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    /// Builds a record for `directory`.
    #[instrument(skip(self, cancel))]
    pub async fn inspect(
        &self,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<JavaInstallation, InspectError> {
        let names = self.platform.executable_names();
        let java = directory.join(names.java);
        let javaw = directory.join(names.javaw);
        let mut record = JavaInstallation::new(directory.to_path_buf(), java, javaw);
        self.fill(&mut record, cancel).await?;
        Ok(record)
    }

    /// Same as [`inspect`](Self::inspect), dropping the reason.
    pub async fn inspect_usable(
        &self,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Option<JavaInstallation> {
        self.inspect(directory, cancel).await.ok()
    }

    /// Re-runs inspection, keeping identity and the user-import flag. On
    /// error the record is left untouched.
    pub async fn reinspect(
        &self,
        record: &mut JavaInstallation,
        cancel: &CancellationToken,
    ) -> Result<(), InspectError> {
        let mut fresh = self.inspect(record.directory(), cancel).await?;
        fresh.is_user_imported = record.is_user_imported;
        *record = fresh;
        Ok(())
    }

    async fn fill(
        &self,
        record: &mut JavaInstallation,
        cancel: &CancellationToken,
    ) -> Result<(), InspectError> {
        let names = self.platform.executable_names();
        let directory = record.directory().to_path_buf();

        if !is_executable(&record.java_executable) {
            debug!("No usable {} in {:?}", names.java, directory);
            return Err(InspectError::Unusable(format!(
                "no executable {} in {}",
                names.java,
                directory.display()
            )));
        }
        if !record.javaw_executable.is_file() {
            record.javaw_executable = record.java_executable.clone();
        }
        record.is_jre = !directory.join(names.javac).is_file();

        let mut version = None;
        let mut arch = Architecture::Unknown;

        if let Some(release) = read_release(record.home()).await {
            record.implementor = release.implementor;
            version = release.java_version;
            if let Some(os_arch) = release.os_arch {
                arch = Architecture::from_os_arch(&os_arch);
            }
        }

        if version.is_none() {
            let output = run_captured(
                &record.java_executable,
                &["-XshowSettings:properties", "-version"],
                None,
                self.timeout,
                cancel,
            )
            .await;
            let output = match output {
                Ok(output) => output,
                Err(ProcessError::Spawn { source, .. }) => {
                    warn!("Cannot run {:?}: {}", record.java_executable, source);
                    return Err(InspectError::Unusable(format!("failed to start: {source}")));
                }
                Err(err) => {
                    debug!("Version query for {:?} cut short: {}", directory, err);
                    return Err(InspectError::Interrupted(err));
                }
            };

            let query = parse_version_output(&output.combined());
            version = query.version;
            if arch == Architecture::Unknown {
                arch = query
                    .os_arch
                    .as_deref()
                    .map(Architecture::from_os_arch)
                    .unwrap_or(Architecture::Unknown);
            }
            if record.implementor.is_none() {
                record.implementor = query.vendor;
            }
        }

        let Some(version) = version else {
            warn!("No version reported by {:?}", record.java_executable);
            return Err(InspectError::Unusable("no version reported".into()));
        };
        record.slug_version = parse_major_version(&version);
        record.version = version;

        if arch == Architecture::Unknown {
            let java = record.java_executable.clone();
            arch = tokio::task::spawn_blocking(move || architecture_of_file(&java))
                .await
                .unwrap_or(Architecture::Unknown);
        }
        record.architecture = arch;
        record.compatibility =
            compatibility_for(self.platform.os(), self.platform.architecture(), arch);

        debug!(
            "Inspected {:?}: version={} arch={:?} jre={}",
            directory, record.version, record.architecture, record.is_jre
        );
        Ok(())
    }
}

async fn read_release(home: &Path) -> Option<ReleaseInfo> {
    let release = home.join("release");
    let contents = tokio::fs::read_to_string(&release).await.ok()?;
    Some(parse_release_file(&contents))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return false;
        }
    }
    true
}

/// Normalizes what a user may point at (JDK home, macOS bundle, `bin`
/// directory or the executable itself) to the directory holding `java`.
pub fn normalize_runtime_dir(path: &Path, java: &str) -> PathBuf {
    if path.is_file() {
        return path.parent().map(Path::to_path_buf).unwrap_or_default();
    }
    for candidate in [
        path.to_path_buf(),
        path.join("bin"),
        path.join("Contents").join("Home").join("bin"),
    ] {
        if candidate.join(java).is_file() {
            return candidate;
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &str = r#"Property settings:
    java.vendor = Eclipse Adoptium
    os.arch = amd64
    sun.arch.data.model = 64

openjdk version "17.0.8" 2023-07-18
OpenJDK Runtime Environment Temurin-17.0.8+7 (build 17.0.8+7)
OpenJDK 64-Bit Server VM Temurin-17.0.8+7 (build 17.0.8+7, mixed mode, sharing)
"#;

    #[test]
    fn release_file_parsing() {
        let info = parse_release_file(
            "IMPLEMENTOR=\"Eclipse Adoptium\"\nJAVA_VERSION=\"21.0.1\"\nOS_NAME=\"Linux\"\nOS_ARCH=\"x86_64\"\n",
        );
        assert_eq!(info.implementor.as_deref(), Some("Eclipse Adoptium"));
        assert_eq!(info.java_version.as_deref(), Some("21.0.1"));
        assert_eq!(info.os_arch.as_deref(), Some("x86_64"));
    }

    #[test]
    fn release_file_stops_after_wanted_keys() {
        let info = parse_release_file(
            "JAVA_VERSION=\"1.8.0_351\"\nOS_ARCH=\"amd64\"\nIMPLEMENTOR=\"Oracle Corporation\"\nJAVA_VERSION=\"99\"\n",
        );
        assert_eq!(info.java_version.as_deref(), Some("1.8.0_351"));
    }

    #[test]
    fn version_output_parsing() {
        let query = parse_version_output(BANNER);
        assert_eq!(query.version.as_deref(), Some("17.0.8"));
        assert_eq!(query.os_arch.as_deref(), Some("amd64"));
        assert_eq!(query.vendor.as_deref(), Some("Eclipse Adoptium"));
    }

    #[test]
    fn legacy_version_output() {
        let query = parse_version_output("java version \"1.8.0_352\"\nJava(TM) SE Runtime Environment");
        assert_eq!(query.version.as_deref(), Some("1.8.0_352"));
        assert_eq!(parse_major_version(query.version.as_deref().unwrap()), 8);
    }

    #[test]
    fn normalize_accepts_home_and_binary() {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("jdk/bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("java"), b"").unwrap();

        assert_eq!(normalize_runtime_dir(&root.path().join("jdk"), "java"), bin);
        assert_eq!(normalize_runtime_dir(&bin, "java"), bin);
        assert_eq!(normalize_runtime_dir(&bin.join("java"), "java"), bin);
    }

    #[cfg(unix)]
    mod process_query {
        use super::*;
        use crate::core::java::installation::Compatibility;
        use crate::core::java::testing::{fake_jdk, write_script, FakeJdk, StaticPlatform};

        fn inspector(timeout: Duration) -> RuntimeInspector {
            RuntimeInspector::new(Arc::new(StaticPlatform::new(vec![])), timeout)
        }

        #[tokio::test]
        async fn version_comes_from_the_runtime_without_release_file() {
            let root = tempfile::tempdir().unwrap();
            let bin = fake_jdk(
                root.path(),
                &FakeJdk {
                    with_release: false,
                    os_arch: "amd64".into(),
                    ..FakeJdk::new("jdk-17", "17.0.9")
                },
            );

            let record = inspector(Duration::from_secs(10))
                .inspect(&bin, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(record.version, "17.0.9");
            assert_eq!(record.slug_version, 17);
            assert_eq!(record.architecture, Architecture::X64);
            assert_eq!(record.implementor.as_deref(), Some("Eclipse Adoptium"));
            assert_eq!(record.compatibility, Compatibility::Yes);
        }

        #[tokio::test]
        async fn slow_runtime_is_interrupted_not_unusable() {
            let root = tempfile::tempdir().unwrap();
            let bin = root.path().join("slow/bin");
            std::fs::create_dir_all(&bin).unwrap();
            write_script(&bin.join("java"), "#!/bin/sh\nsleep 5\n");

            let err = inspector(Duration::from_millis(200))
                .inspect(&bin, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, InspectError::Interrupted(ProcessError::TimedOut { .. })));
        }

        #[tokio::test]
        async fn cancelled_query_is_interrupted() {
            let root = tempfile::tempdir().unwrap();
            let bin = fake_jdk(
                root.path(),
                &FakeJdk {
                    with_release: false,
                    ..FakeJdk::new("jdk-21", "21.0.1")
                },
            );
            let cancel = CancellationToken::new();
            cancel.cancel();

            let err = inspector(Duration::from_secs(10))
                .inspect(&bin, &cancel)
                .await
                .unwrap_err();
            assert!(matches!(err, InspectError::Interrupted(ProcessError::Cancelled { .. })));
        }

        #[tokio::test]
        async fn runtime_that_cannot_start_is_unusable() {
            let root = tempfile::tempdir().unwrap();
            let bin = root.path().join("broken/bin");
            std::fs::create_dir_all(&bin).unwrap();
            write_script(&bin.join("java"), "#!/nonexistent/interpreter\n");

            let err = inspector(Duration::from_secs(10))
                .inspect(&bin, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, InspectError::Unusable(_)));
        }

        #[tokio::test]
        async fn failed_reinspect_leaves_record_untouched() {
            let root = tempfile::tempdir().unwrap();
            let bin = fake_jdk(
                root.path(),
                &FakeJdk {
                    with_release: false,
                    ..FakeJdk::new("jdk-17", "17.0.8")
                },
            );
            let inspector = inspector(Duration::from_secs(10));
            let mut record = inspector
                .inspect(&bin, &CancellationToken::new())
                .await
                .unwrap();
            record.is_user_imported = true;

            let cancel = CancellationToken::new();
            cancel.cancel();
            assert!(inspector.reinspect(&mut record, &cancel).await.is_err());
            assert_eq!(record.slug_version, 17);
            assert!(record.is_user_imported);
        }
    }
}

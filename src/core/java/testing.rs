//! Fixtures shared by the unit tests: a platform with a fixed candidate list
//! and shell-script runtimes that answer like a real JDK.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::config::DiscoveryConfig;
use super::installation::{Architecture, HostOs};
use super::platform::{ExecutableNames, HostPlatform, SignatureCheck};
use super::verify::PROBE_EXPECTED_OUTPUT;

pub struct StaticPlatform {
    candidates: Mutex<Vec<PathBuf>>,
    signature: SignatureCheck,
}

impl StaticPlatform {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates: Mutex::new(candidates),
            signature: SignatureCheck::Skipped,
        }
    }

    /// Reports `signature` for every binary.
    pub fn with_signature(mut self, signature: SignatureCheck) -> Self {
        self.signature = signature;
        self
    }

    pub fn set_candidates(&self, candidates: Vec<PathBuf>) {
        *self.candidates.lock().unwrap() = candidates;
    }
}

#[async_trait]
impl HostPlatform for StaticPlatform {
    fn os(&self) -> HostOs {
        HostOs::Linux
    }

    fn architecture(&self) -> Architecture {
        Architecture::X64
    }

    fn executable_names(&self) -> ExecutableNames {
        ExecutableNames::UNIX
    }

    async fn candidate_directories(
        &self,
        _config: &DiscoveryConfig,
        _cancel: &CancellationToken,
    ) -> Vec<PathBuf> {
        self.candidates.lock().unwrap().clone()
    }

    async fn check_signature(&self, _binary: &Path, _cancel: &CancellationToken) -> SignatureCheck {
        self.signature.clone()
    }
}

pub struct FakeJdk {
    pub name: String,
    pub version: String,
    pub os_arch: String,
    pub with_javac: bool,
    pub with_jar: bool,
    pub with_release: bool,
    pub program_output: String,
}

impl FakeJdk {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            os_arch: "x86_64".to_string(),
            with_javac: true,
            with_jar: false,
            with_release: true,
            program_output: PROBE_EXPECTED_OUTPUT.to_string(),
        }
    }
}

#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Writes `<root>/<name>/{release,bin/java,bin/javac,bin/jar}` as asked and
/// returns the `bin` directory. Without a `release` file the `java` script
/// answers the property query with `os.arch` and `java.vendor`.
#[cfg(unix)]
pub fn fake_jdk(root: &Path, jdk: &FakeJdk) -> PathBuf {
    let home = root.join(&jdk.name);
    let bin = home.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    if jdk.with_release {
        std::fs::write(
            home.join("release"),
            format!(
                "IMPLEMENTOR=\"Eclipse Adoptium\"\nJAVA_VERSION=\"{}\"\nOS_ARCH=\"{}\"\n",
                jdk.version, jdk.os_arch
            ),
        )
        .unwrap();
    }

    let java = format!(
        "#!/bin/sh\ncase \"$1\" in\n  -cp|-jar) printf '%s' '{output}' ;;\n  *) echo '    os.arch = {arch}' >&2\n     echo '    java.vendor = Eclipse Adoptium' >&2\n     echo 'openjdk version \"{version}\"' >&2 ;;\nesac\n",
        output = jdk.program_output,
        arch = jdk.os_arch,
        version = jdk.version,
    );
    write_script(&bin.join("java"), &java);
    if jdk.with_javac {
        write_script(&bin.join("javac"), "#!/bin/sh\nexit 0\n");
    }
    if jdk.with_jar {
        // `jar cfe <archive> ...`: only the archive has to appear.
        write_script(&bin.join("jar"), "#!/bin/sh\n: > \"$2\"\n");
    }
    bin
}

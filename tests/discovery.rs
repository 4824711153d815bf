#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use interface_java::core::java::{
    Architecture, Compatibility, DiscoveryConfig, ExecutableNames, HostOs, HostPlatform,
    JavaDiscovery, JavaRequirement, RecommendationLevel, RuntimeListStore, SignatureCheck,
    TrustLevel,
};

const PROBE_OUTPUT: &str = "InterfaceOficial runtime check OK";

struct FixedPlatform {
    candidates: Vec<PathBuf>,
}

#[async_trait]
impl HostPlatform for FixedPlatform {
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
        self.candidates.clone()
    }

    async fn check_signature(&self, _binary: &Path, _cancel: &CancellationToken) -> SignatureCheck {
        SignatureCheck::Skipped
    }
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// JDK home with a release file and a `java` script that prints `output`
/// when asked to run a program. Returns the `bin` directory.
fn jdk(root: &Path, name: &str, version: &str, output: &str, with_javac: bool) -> PathBuf {
    let home = root.join(name);
    let bin = home.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::write(
        home.join("release"),
        format!("IMPLEMENTOR=\"Eclipse Adoptium\"\nJAVA_VERSION=\"{version}\"\nOS_ARCH=\"x86_64\"\n"),
    )
    .unwrap();
    write_script(
        &bin.join("java"),
        &format!(
            "#!/bin/sh\ncase \"$1\" in\n  -cp|-jar) printf '%s' '{output}' ;;\n  *) echo 'openjdk version \"{version}\"' >&2\n     echo '    java.vendor = Eclipse Adoptium' >&2 ;;\nesac\n"
        ),
    );
    if with_javac {
        write_script(&bin.join("javac"), "#!/bin/sh\nexit 0\n");
    }
    bin
}

fn config(root: &Path, trust_level: TrustLevel) -> DiscoveryConfig {
    DiscoveryConfig {
        trust_level,
        scratch_dir: Some(root.join("scratch")),
        ..DiscoveryConfig::default()
    }
}

fn scratch_is_empty(root: &Path) -> bool {
    match std::fs::read_dir(root.join("scratch")) {
        Ok(entries) => entries.count() == 0,
        Err(_) => true,
    }
}

#[tokio::test]
async fn discovers_genuine_runtime_and_skips_broken_candidate() {
    let root = tempfile::tempdir().unwrap();
    let genuine = jdk(root.path(), "jdk-21", "21.0.1", PROBE_OUTPUT, true);

    let stub = root.path().join("stub/bin");
    std::fs::create_dir_all(&stub).unwrap();
    std::fs::write(stub.join("java"), b"not a program").unwrap();

    let discovery = JavaDiscovery::builder(config(root.path(), TrustLevel::Lenient))
        .platform(Arc::new(FixedPlatform {
            candidates: vec![genuine.clone(), stub],
        }))
        .store(RuntimeListStore::in_dir(root.path()))
        .build();
    discovery.initialize().await;

    let runtimes = discovery.runtimes().await;
    assert_eq!(runtimes.len(), 1);
    let runtime = &runtimes[0];
    assert_eq!(runtime.directory(), genuine.as_path());
    assert_eq!(runtime.slug_version, 21);
    assert_eq!(runtime.architecture, Architecture::X64);
    assert_eq!(runtime.compatibility, Compatibility::Yes);
    assert!(!runtime.is_jre);

    let ranked = discovery
        .compatible_javas(&JavaRequirement::exact(21))
        .await;
    assert_eq!(ranked[0].level, RecommendationLevel::Perfect);
    let best = discovery
        .best_java_for_game(&JavaRequirement::exact(21))
        .await
        .unwrap();
    assert_eq!(best.slug_version, 21);

    // Initialization verified the runtime and left nothing behind.
    let verification = discovery.verification(runtime).await;
    assert!(verification.is_genuine);
    assert_eq!(discovery.verification_cache().len(), 1);
    assert!(scratch_is_empty(root.path()));
    assert!(root.path().join("java_runtimes.json").is_file());
}

#[tokio::test]
async fn failed_functional_probe_rejects_and_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let impostor = jdk(root.path(), "jdk-17", "17.0.8", "something else", true);

    let discovery = JavaDiscovery::builder(DiscoveryConfig {
        verify_on_discovery: 0,
        ..config(root.path(), TrustLevel::Lenient)
    })
    .platform(Arc::new(FixedPlatform {
        candidates: vec![impostor],
    }))
    .build();
    discovery.initialize().await;

    let runtime = discovery.runtimes().await.remove(0);
    let verification = discovery.verification(&runtime).await;
    assert!(!verification.is_genuine);
    assert!(verification.fail_reason.is_some());
    assert!(scratch_is_empty(root.path()));
}

#[tokio::test]
async fn trust_level_decides_runtimes_without_tools() {
    let root = tempfile::tempdir().unwrap();
    let jre = jdk(root.path(), "jre-8", "1.8.0_352", PROBE_OUTPUT, false);

    for (trust_level, expected) in [(TrustLevel::Lenient, true), (TrustLevel::Strict, false)] {
        let discovery = JavaDiscovery::builder(DiscoveryConfig {
            verify_on_discovery: 0,
            ..config(root.path(), trust_level)
        })
        .platform(Arc::new(FixedPlatform {
            candidates: vec![jre.clone()],
        }))
        .build();
        discovery.initialize().await;

        let runtime = discovery.runtimes().await.remove(0);
        assert!(runtime.is_jre);
        assert_eq!(runtime.slug_version, 8);
        assert_eq!(discovery.verification(&runtime).await.is_genuine, expected);
    }
}

#[tokio::test]
async fn manual_runtime_survives_refresh() {
    let root = tempfile::tempdir().unwrap();
    let found = jdk(root.path(), "jdk-17", "17.0.8", PROBE_OUTPUT, true);
    let manual = jdk(root.path(), "custom/jdk-21", "21.0.1", PROBE_OUTPUT, true);

    let discovery = JavaDiscovery::builder(config(root.path(), TrustLevel::Lenient))
        .platform(Arc::new(FixedPlatform {
            candidates: vec![found],
        }))
        .build();
    discovery.initialize().await;

    let home = manual.parent().unwrap();
    let (added, already_present) = discovery.manual_add(home).await;
    assert!(!already_present);
    assert!(added.unwrap().is_user_imported);
    let (_, already_present) = discovery.manual_add(&manual.join("java")).await;
    assert!(already_present);

    let runtimes = discovery.refresh().await;
    assert_eq!(runtimes.len(), 2);
    assert!(runtimes
        .iter()
        .any(|rt| rt.is_user_imported && rt.slug_version == 21));
    assert!(runtimes
        .iter()
        .any(|rt| !rt.is_user_imported && rt.slug_version == 17));

    let best = discovery
        .best_java_for_game(&JavaRequirement::for_minecraft_version("1.21"))
        .await
        .unwrap();
    assert_eq!(best.slug_version, 21);
}

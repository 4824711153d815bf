// ─── Runtime verification ───
// Answers "is this a working, unmodified runtime, and whose build is it?"
// Three steps: code signature (Windows), property dump, and compiling and
// running a tiny program.

pub mod classfile;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::config::{DiscoveryConfig, TrustLevel};
use super::inspector::property_value;
use super::installation::{JavaInstallation, JavaVendor};
use super::platform::{HostPlatform, SignatureCheck};
use super::process::{run_captured, CapturedOutput, ProcessError};

pub const PROBE_CLASS: &str = "InterfaceJavaCheck";
pub const PROBE_EXPECTED_OUTPUT: &str = "InterfaceOficial runtime check OK";

/// Outcome of verifying one runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub is_genuine: bool,
    pub fail_reason: Option<String>,
    pub vendor: JavaVendor,
    pub vendor_description: Option<String>,
    pub build_identifier: Option<String>,
    pub is_early_access: bool,
}

impl VerifyResult {
    fn genuine() -> Self {
        Self {
            is_genuine: true,
            fail_reason: None,
            vendor: JavaVendor::Unknown,
            vendor_description: None,
            build_identifier: None,
            is_early_access: false,
        }
    }

    fn reject(mut self, reason: impl Into<String>) -> Self {
        self.is_genuine = false;
        self.fail_reason = Some(reason.into());
        self
    }
}

/// Vendor, build and early-access facts from the property dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeMetadata {
    pub vendor: JavaVendor,
    pub vendor_description: Option<String>,
    pub build_identifier: Option<String>,
    pub is_early_access: bool,
}

fn build_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(build ([^),]+)").expect("static regex"))
}

pub fn parse_runtime_metadata(output: &str) -> RuntimeMetadata {
    let vendor_description = property_value(output, "java.vendor")
        .or_else(|| property_value(output, "java.vm.vendor"))
        .filter(|v| !v.is_empty());

    let build_identifier = property_value(output, "java.runtime.version").or_else(|| {
        build_pattern()
            .captures(output)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    });

    // The banner names the distribution more precisely than java.vendor
    // ("Temurin" vs "Eclipse Adoptium" agree, "OpenJDK" vs "Oracle" do not).
    // Property lines are skipped: every build reports
    // `java.specification.vendor = Oracle Corporation`.
    let banner: Vec<&str> = output
        .lines()
        .filter(|line| !line.contains('='))
        .filter(|line| line.contains("Runtime Environment") || line.contains("VM"))
        .collect();
    let vendor = banner
        .iter()
        .map(|line| JavaVendor::from_text(line))
        .find(|vendor| !matches!(vendor, JavaVendor::Unknown | JavaVendor::OpenJDK))
        .or_else(|| {
            vendor_description
                .as_deref()
                .map(JavaVendor::from_text)
                .filter(|vendor| *vendor != JavaVendor::Unknown)
        })
        .or_else(|| {
            banner
                .iter()
                .any(|line| line.contains("OpenJDK"))
                .then_some(JavaVendor::OpenJDK)
        })
        .unwrap_or(JavaVendor::Unknown);

    let lower = output.to_ascii_lowercase();
    let is_early_access = lower.contains("early access")
        || lower.contains("-ea\"")
        || lower.contains("-ea+")
        || lower.contains("-ea ")
        || build_identifier
            .as_deref()
            .map(|b| b.contains("-ea"))
            .unwrap_or(false);

    RuntimeMetadata {
        vendor,
        vendor_description,
        build_identifier,
        is_early_access,
    }
}

/// Result of the compile-and-run step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionalOutcome {
    Passed,
    /// The probe ran and the runtime misbehaved.
    Failed(String),
    /// The probe could not be carried out.
    Indeterminate(String),
}

#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub trust_level: TrustLevel,
    pub query_timeout: Duration,
    pub probe_timeout: Duration,
    pub scratch_root: PathBuf,
}

impl From<&DiscoveryConfig> for VerifyConfig {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            trust_level: config.trust_level,
            query_timeout: config.version_query_timeout(),
            probe_timeout: config.functional_probe_timeout(),
            scratch_root: config.scratch_root(),
        }
    }
}

pub struct VerificationEngine {
    platform: Arc<dyn HostPlatform>,
    config: VerifyConfig,
}

impl VerificationEngine {
    pub fn new(platform: Arc<dyn HostPlatform>, config: VerifyConfig) -> Self {
        Self { platform, config }
    }

    #[instrument(skip_all, fields(dir = %runtime.directory().display()))]
    pub async fn verify(&self, runtime: &JavaInstallation, cancel: &CancellationToken) -> VerifyResult {
        let mut result = VerifyResult::genuine();
        let java = console_java(runtime);

        let mut signer_vendor = JavaVendor::Unknown;
        let signature = self.platform.check_signature(&java, cancel).await;
        match &signature {
            SignatureCheck::Skipped => {}
            SignatureCheck::Unavailable(reason) => {
                debug!("Signature check unavailable: {}", reason);
            }
            SignatureCheck::Checked { status, subject } => {
                if !signature.is_valid() {
                    warn!("Signature status {} for {:?}", status, java);
                    return result.reject(format!("code signature status is {status}"));
                }
                if let Some(subject) = subject {
                    signer_vendor = JavaVendor::from_text(subject);
                }
            }
        }

        let output = match run_captured(
            &java,
            &["-XshowSettings:properties", "-version"],
            None,
            self.config.query_timeout,
            cancel,
        )
        .await
        {
            Ok(output) => output,
            Err(ProcessError::Spawn { source, .. }) => {
                return result.reject(format!("runtime failed to start: {source}"));
            }
            Err(err) => {
                return self.indeterminate(result, format!("metadata probe: {err}"));
            }
        };

        let metadata = parse_runtime_metadata(&output.combined());
        result.vendor = if signer_vendor != JavaVendor::Unknown {
            signer_vendor
        } else {
            metadata.vendor
        };
        result.vendor_description = metadata.vendor_description;
        result.build_identifier = metadata.build_identifier;
        result.is_early_access = metadata.is_early_access;

        match self.functional_probe(runtime, cancel).await {
            FunctionalOutcome::Passed => {
                info!("Verified {:?} as genuine ({:?})", runtime.directory(), result.vendor);
                result
            }
            FunctionalOutcome::Failed(reason) => {
                warn!("Functional probe failed for {:?}: {}", runtime.directory(), reason);
                result.reject(reason)
            }
            FunctionalOutcome::Indeterminate(reason) => self.indeterminate(result, reason),
        }
    }

    fn indeterminate(&self, result: VerifyResult, reason: String) -> VerifyResult {
        match self.config.trust_level {
            TrustLevel::Lenient => {
                debug!("Assuming genuine: {}", reason);
                result
            }
            TrustLevel::Strict => result.reject(format!("could not verify: {reason}")),
        }
    }

    /// Compiles and runs a known program, or falls back to a jar built from
    /// an in-memory class file. The scratch directory is removed on every
    /// path out of this function.
    pub async fn functional_probe(
        &self,
        runtime: &JavaInstallation,
        cancel: &CancellationToken,
    ) -> FunctionalOutcome {
        let names = self.platform.executable_names();
        let dir = runtime.directory();
        let java = console_java(runtime);
        let javac = dir.join(names.javac);
        let jar = dir.join(names.jar);

        let scratch = match ScratchDir::create(&self.config.scratch_root) {
            Ok(scratch) => scratch,
            Err(err) => return FunctionalOutcome::Indeterminate(format!("scratch dir: {err}")),
        };

        if javac.is_file() {
            self.compile_and_run(&java, &javac, scratch.path(), cancel).await
        } else if jar.is_file() {
            self.package_and_run(&java, &jar, scratch.path(), cancel).await
        } else {
            FunctionalOutcome::Indeterminate("no javac or jar next to the runtime".into())
        }
    }

    async fn compile_and_run(
        &self,
        java: &Path,
        javac: &Path,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> FunctionalOutcome {
        let source = scratch.join(format!("{PROBE_CLASS}.java"));
        let program = format!(
            "public class {PROBE_CLASS} {{\n    public static void main(String[] args) {{\n        System.out.print(\"{PROBE_EXPECTED_OUTPUT}\");\n    }}\n}}\n"
        );
        if let Err(err) = tokio::fs::write(&source, program).await {
            return FunctionalOutcome::Indeterminate(format!("write source: {err}"));
        }

        let scratch_str = scratch.to_string_lossy().to_string();
        let source_str = source.to_string_lossy().to_string();
        match self
            .run(javac, &["-d", &scratch_str, &source_str], scratch, cancel)
            .await
        {
            Ok(output) if output.success => {}
            Ok(output) => {
                return FunctionalOutcome::Indeterminate(format!(
                    "javac failed: {}",
                    first_line(&output.combined())
                ))
            }
            Err(err) => return FunctionalOutcome::Indeterminate(format!("javac: {err}")),
        }

        let output = self
            .run(java, &["-cp", &scratch_str, PROBE_CLASS], scratch, cancel)
            .await;
        check_program_output(output)
    }

    async fn package_and_run(
        &self,
        java: &Path,
        jar: &Path,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> FunctionalOutcome {
        let class_file = scratch.join(format!("{PROBE_CLASS}.class"));
        let bytes = classfile::hello_class(PROBE_CLASS, PROBE_EXPECTED_OUTPUT);
        if let Err(err) = tokio::fs::write(&class_file, bytes).await {
            return FunctionalOutcome::Indeterminate(format!("write class: {err}"));
        }

        let archive = scratch.join("check.jar");
        let archive_str = archive.to_string_lossy().to_string();
        let scratch_str = scratch.to_string_lossy().to_string();
        let class_name = format!("{PROBE_CLASS}.class");
        match self
            .run(
                jar,
                &["cfe", &archive_str, PROBE_CLASS, "-C", &scratch_str, &class_name],
                scratch,
                cancel,
            )
            .await
        {
            Ok(output) if output.success && archive.is_file() => {}
            Ok(output) => {
                return FunctionalOutcome::Indeterminate(format!(
                    "jar failed: {}",
                    first_line(&output.combined())
                ))
            }
            Err(err) => return FunctionalOutcome::Indeterminate(format!("jar: {err}")),
        }

        let output = self.run(java, &["-jar", &archive_str], scratch, cancel).await;
        check_program_output(output)
    }

    async fn run(
        &self,
        program: &Path,
        args: &[&str],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput, ProcessError> {
        run_captured(program, args, Some(cwd), self.config.probe_timeout, cancel).await
    }
}

fn check_program_output(output: Result<CapturedOutput, ProcessError>) -> FunctionalOutcome {
    match output {
        Ok(output) if output.stdout.trim() == PROBE_EXPECTED_OUTPUT => FunctionalOutcome::Passed,
        Ok(output) => FunctionalOutcome::Failed(format!(
            "probe program printed {:?} instead of the expected text",
            first_line(&output.stdout)
        )),
        Err(ProcessError::Spawn { source, .. }) => {
            FunctionalOutcome::Failed(format!("runtime failed to start: {source}"))
        }
        Err(err) => FunctionalOutcome::Indeterminate(err.to_string()),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

/// The console `java`; `javaw` detaches from stdout on Windows.
fn console_java(runtime: &JavaInstallation) -> PathBuf {
    runtime.java_executable.clone()
}

/// Uniquely named scratch directory removed when dropped.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(format!("javacheck-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(source) = std::fs::remove_dir_all(&self.path) {
            warn!("Failed to remove scratch dir {:?}: {}", self.path, source);
        }
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// CPU architecture a runtime binary was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    Unknown,
    X86,
    X64,
    Arm,
    Arm64,
}

impl Architecture {
    /// Architecture of the running process.
    pub fn host() -> Self {
        Self::from_os_arch(std::env::consts::ARCH)
    }

    /// Maps the spellings found in `release` files, `os.arch` and
    /// `std::env::consts::ARCH`.
    pub fn from_os_arch(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Architecture::X64,
            "x86" | "i386" | "i486" | "i586" | "i686" => Architecture::X86,
            "aarch64" | "arm64" => Architecture::Arm64,
            "arm" | "aarch32" | "armv7" | "armv7l" => Architecture::Arm,
            _ => Architecture::Unknown,
        }
    }

    pub fn is_64bit(self) -> bool {
        matches!(self, Architecture::X64 | Architecture::Arm64)
    }

    /// Short identifier used in platform ids (`windows-x64`).
    pub fn as_str(self) -> &'static str {
        match self {
            Architecture::Unknown => "unknown",
            Architecture::X86 => "x86",
            Architecture::X64 => "x64",
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
        }
    }
}

/// Whether a runtime can run on this host.
///
/// `Error` marks a candidate whose inspection failed. Such records are
/// discarded by whoever produced them and never reach a runtime list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    #[default]
    Unknown,
    Yes,
    No,
    Error,
}

/// Operating system family, as far as runtime layout is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostOs {
    Windows,
    Linux,
    Mac,
}

impl HostOs {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => HostOs::Windows,
            "macos" => HostOs::Mac,
            _ => HostOs::Linux,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HostOs::Windows => "windows",
            HostOs::Linux => "linux",
            HostOs::Mac => "mac",
        }
    }
}

/// Pure lookup of runtime architecture against host architecture.
pub fn compatibility_for(host_os: HostOs, host: Architecture, runtime: Architecture) -> Compatibility {
    use Architecture::*;

    if runtime == Unknown {
        return Compatibility::Unknown;
    }
    if runtime == host {
        return Compatibility::Yes;
    }
    match (host, runtime) {
        (X64, X86) => Compatibility::Yes,
        (Arm64, Arm) => Compatibility::Yes,
        // Rosetta 2 and Windows on ARM both emulate x64.
        (Arm64, X64) if host_os != HostOs::Linux => Compatibility::Yes,
        _ => Compatibility::No,
    }
}

/// One located Java installation.
///
/// The `directory` is the folder holding the `java` executable (normally a
/// `bin` directory) and is the identity key of the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaInstallation {
    directory: PathBuf,
    pub version: String,
    pub slug_version: u32,
    pub architecture: Architecture,
    pub is_jre: bool,
    pub compatibility: Compatibility,
    pub java_executable: PathBuf,
    /// `javaw.exe` on Windows, identical to `java_executable` elsewhere.
    pub javaw_executable: PathBuf,
    pub implementor: Option<String>,
    #[serde(default)]
    pub is_user_imported: bool,
}

impl JavaInstallation {
    pub(crate) fn new(directory: PathBuf, java_executable: PathBuf, javaw_executable: PathBuf) -> Self {
        Self {
            directory,
            version: String::new(),
            slug_version: 0,
            architecture: Architecture::Unknown,
            is_jre: true,
            compatibility: Compatibility::Unknown,
            java_executable,
            javaw_executable,
            implementor: None,
            is_user_imported: false,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_error(&self) -> bool {
        self.compatibility == Compatibility::Error
    }

    /// Root of the install (parent of `bin`), where the `release` file lives.
    pub fn home(&self) -> &Path {
        self.directory.parent().unwrap_or(&self.directory)
    }

    pub fn vendor(&self) -> JavaVendor {
        self.implementor
            .as_deref()
            .map(JavaVendor::from_text)
            .unwrap_or(JavaVendor::Unknown)
    }

    pub fn same_directory(&self, other: &Path) -> bool {
        same_path(&self.directory, other)
    }
}

/// Path equality tolerant of trailing separators and, on Windows, case.
pub fn same_path(left: &Path, right: &Path) -> bool {
    if left == right {
        return true;
    }
    if cfg!(windows) {
        let l = left.to_string_lossy().trim_end_matches(['\\', '/']).to_lowercase();
        let r = right.to_string_lossy().trim_end_matches(['\\', '/']).to_lowercase();
        return l == r;
    }
    left.components().eq(right.components())
}

/// Distribution a runtime comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JavaVendor {
    Oracle,
    OpenJDK,
    AdoptOpenJDK,
    AdoptiumEclipse,
    Microsoft,
    Amazon,
    Azul,
    Alibaba,
    Tencent,
    BellSoft,
    SAP,
    RedHat,
    #[default]
    Unknown,
}

const VENDOR_MARKERS: &[(&str, JavaVendor)] = &[
    ("adoptopenjdk", JavaVendor::AdoptOpenJDK),
    ("london jamocha", JavaVendor::AdoptOpenJDK),
    ("temurin", JavaVendor::AdoptiumEclipse),
    ("adoptium", JavaVendor::AdoptiumEclipse),
    ("eclipse", JavaVendor::AdoptiumEclipse),
    ("microsoft", JavaVendor::Microsoft),
    ("amazon", JavaVendor::Amazon),
    ("corretto", JavaVendor::Amazon),
    ("azul", JavaVendor::Azul),
    ("zulu", JavaVendor::Azul),
    ("alibaba", JavaVendor::Alibaba),
    ("dragonwell", JavaVendor::Alibaba),
    ("tencent", JavaVendor::Tencent),
    ("kona", JavaVendor::Tencent),
    ("bellsoft", JavaVendor::BellSoft),
    ("liberica", JavaVendor::BellSoft),
    ("sapmachine", JavaVendor::SAP),
    ("sap se", JavaVendor::SAP),
    ("red hat", JavaVendor::RedHat),
    ("redhat", JavaVendor::RedHat),
    ("oracle", JavaVendor::Oracle),
    ("openjdk", JavaVendor::OpenJDK),
];

impl JavaVendor {
    /// Substring match over vendor strings, signer subjects and version
    /// banners. Distribution names are checked before "oracle" and
    /// "openjdk", which most builds also mention.
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        VENDOR_MARKERS
            .iter()
            .find(|(marker, _)| lower.contains(marker))
            .map(|(_, vendor)| *vendor)
            .unwrap_or(JavaVendor::Unknown)
    }
}

/// Major version of a Java version string.
///
/// Legacy `1.x` strings use the second segment, so `1.8.0_351` is 8.
pub fn parse_major_version(version: &str) -> u32 {
    let mut parts = version.trim().split('.');
    let major = parts.next().map(leading_number).unwrap_or(0);

    if major == 1 {
        parts.next().map(leading_number).filter(|m| *m > 0).unwrap_or(major)
    } else {
        major
    }
}

fn leading_number(segment: &str) -> u32 {
    let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

pub mod binary;
pub mod bundled;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod inspector;
pub mod installation;
pub mod platform;
pub mod process;
pub mod score;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use bundled::BundledRuntimeCopier;
pub use cache::{RuntimeListStore, VerificationCache};
pub use config::{DiscoveryConfig, TrustLevel};
pub use discovery::{BundledJvmFetcher, DefaultJavas, DiscoveryState, JavaDiscovery};
pub use inspector::{normalize_runtime_dir, RuntimeInspector};
pub use installation::{Architecture, Compatibility, HostOs, JavaInstallation, JavaVendor};
pub use platform::{current_platform, ExecutableNames, HostPlatform, SignatureCheck};
pub use score::{rank, score, CompatibilityScore, JavaRequirement, RecommendationLevel};
pub use verify::{VerificationEngine, VerifyResult};

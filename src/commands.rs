use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::{
    CompatibilityScore, DefaultJavas, JavaInstallation, JavaRequirement, VerifyResult,
};
use crate::core::state::{AppState, StateOptions};

#[derive(Debug, Parser)]
#[command(name = "interface-java", version, about = "Find, verify and rank Java runtimes")]
pub struct Cli {
    /// Launcher data directory (defaults to the platform data dir).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Reject runtimes whose functional check could not run.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Directory holding a runtime shipped with the launcher.
    #[arg(long, global = true)]
    pub bundled_runtime: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the known runtimes, discovering them on first use.
    List,
    /// Rediscover runtimes, keeping manually added ones.
    Refresh,
    /// Register a runtime by JDK home, bin directory or executable.
    Add { path: PathBuf },
    /// Rank runtimes against a requirement.
    Compatible(RequirementArgs),
    /// Best runtime for a requirement.
    Best(RequirementArgs),
    /// Run the genuineness checks on one runtime.
    Verify { path: PathBuf },
    /// Closest runtimes to Java 8, 17 and 21.
    Defaults,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = true)]
pub struct RequirementArgs {
    /// Exact Java major version.
    #[arg(long, conflicts_with_all = ["min", "max", "minecraft"], value_parser = major_version)]
    pub java: Option<u32>,
    #[arg(long, requires = "max", conflicts_with = "minecraft", value_parser = major_version)]
    pub min: Option<u32>,
    #[arg(long, requires = "min", conflicts_with = "minecraft", value_parser = major_version)]
    pub max: Option<u32>,
    /// Minecraft version id, mapped to its Java major.
    #[arg(long)]
    pub minecraft: Option<String>,
}

const MAX_JAVA_MAJOR: i64 = 1000;

fn major_version(value: &str) -> Result<u32, String> {
    let major: i64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a Java major version"))?;
    if !(1..=MAX_JAVA_MAJOR).contains(&major) {
        return Err(format!("Java major version must be between 1 and {MAX_JAVA_MAJOR}"));
    }
    Ok(major as u32)
}

impl RequirementArgs {
    pub fn requirement(&self) -> LauncherResult<JavaRequirement> {
        match (self.java, self.min, self.max, self.minecraft.as_deref()) {
            (Some(major), None, None, None) => Ok(JavaRequirement::exact(major)),
            (None, Some(min), Some(max), None) => Ok(JavaRequirement::range(min, max)),
            (None, None, None, Some(version)) => Ok(JavaRequirement::for_minecraft_version(version)),
            _ => Err(LauncherError::Config(
                "use one of --java, --min/--max or --minecraft".into(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddRuntimeResponse {
    pub runtime: JavaInstallation,
    pub already_present: bool,
}

#[derive(Debug, Serialize)]
pub struct BestRuntimeResponse {
    pub requirement: String,
    pub runtime: Option<JavaInstallation>,
}

#[derive(Debug, Serialize)]
pub struct VerifyRuntimeResponse {
    pub runtime: JavaInstallation,
    pub verification: VerifyResult,
}

pub async fn get_java_installations(state: &AppState) -> Vec<JavaInstallation> {
    state.discovery.initialize().await;
    state.discovery.runtimes().await
}

pub async fn refresh_java_installations(state: &AppState) -> Vec<JavaInstallation> {
    state.discovery.initialize().await;
    state.discovery.refresh().await
}

pub async fn add_java_installation(
    state: &AppState,
    path: PathBuf,
) -> Result<AddRuntimeResponse, LauncherError> {
    state.discovery.initialize().await;
    match state.discovery.manual_add(&path).await {
        (Some(runtime), already_present) => {
            info!("Registered runtime {:?}", runtime.directory());
            Ok(AddRuntimeResponse {
                runtime,
                already_present,
            })
        }
        (None, _) => Err(LauncherError::JavaNotFound(path)),
    }
}

pub async fn get_compatible_javas(
    state: &AppState,
    args: &RequirementArgs,
) -> Result<Vec<CompatibilityScore>, LauncherError> {
    let requirement = args.requirement()?;
    state.discovery.initialize().await;
    Ok(state.discovery.compatible_javas(&requirement).await)
}

pub async fn get_best_java(
    state: &AppState,
    args: &RequirementArgs,
) -> Result<BestRuntimeResponse, LauncherError> {
    let requirement = args.requirement()?;
    state.discovery.initialize().await;
    Ok(BestRuntimeResponse {
        requirement: requirement.to_string(),
        runtime: state.discovery.best_java_for_game(&requirement).await,
    })
}

pub async fn verify_java_installation(
    state: &AppState,
    path: PathBuf,
) -> Result<VerifyRuntimeResponse, LauncherError> {
    state.discovery.initialize().await;
    let runtime = state
        .discovery
        .inspect_path(&path)
        .await
        .ok_or(LauncherError::JavaNotFound(path))?;
    let verification = state.discovery.verification(&runtime).await;
    Ok(VerifyRuntimeResponse {
        runtime,
        verification,
    })
}

pub async fn get_default_javas(state: &AppState) -> Option<DefaultJavas> {
    state.discovery.initialize().await;
    state.discovery.default_javas().await
}

/// Runs one subcommand and returns its JSON payload.
pub async fn dispatch(cli: Cli) -> Result<serde_json::Value, LauncherError> {
    let state = AppState::new(StateOptions {
        data_dir: cli.data_dir,
        strict: cli.strict,
        bundled_runtime: cli.bundled_runtime,
    })?;

    let discovery = state.discovery.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling Java probes");
            discovery.cancel();
        }
    });

    let payload = match cli.command {
        Command::List => serde_json::to_value(get_java_installations(&state).await)?,
        Command::Refresh => serde_json::to_value(refresh_java_installations(&state).await)?,
        Command::Add { path } => serde_json::to_value(add_java_installation(&state, path).await?)?,
        Command::Compatible(args) => {
            serde_json::to_value(get_compatible_javas(&state, &args).await?)?
        }
        Command::Best(args) => serde_json::to_value(get_best_java(&state, &args).await?)?,
        Command::Verify { path } => {
            serde_json::to_value(verify_java_installation(&state, path).await?)?
        }
        Command::Defaults => serde_json::to_value(get_default_javas(&state).await)?,
    };

    interrupt.abort();
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("interface-java").chain(args.iter().copied()))
    }

    #[test]
    fn requirement_flags() {
        let Command::Best(args) = parse(&["best", "--java", "17"]).unwrap().command else {
            panic!("expected best");
        };
        assert_eq!(args.requirement().unwrap(), JavaRequirement::exact(17));

        let Command::Compatible(args) =
            parse(&["compatible", "--min", "17", "--max", "21"]).unwrap().command
        else {
            panic!("expected compatible");
        };
        assert_eq!(args.requirement().unwrap(), JavaRequirement::range(17, 21));

        let Command::Best(args) = parse(&["best", "--minecraft", "1.20.4"]).unwrap().command else {
            panic!("expected best");
        };
        assert_eq!(args.requirement().unwrap(), JavaRequirement::exact(17));
    }

    #[test]
    fn conflicting_or_missing_requirement_is_rejected() {
        assert!(parse(&["best"]).is_err());
        assert!(parse(&["best", "--java", "17", "--minecraft", "1.20.4"]).is_err());
        assert!(parse(&["compatible", "--min", "17"]).is_err());
    }

    #[test]
    fn out_of_range_major_is_rejected() {
        assert!(parse(&["best", "--java", "4000000000"]).is_err());
        assert!(parse(&["best", "--java", "0"]).is_err());
        assert!(parse(&["compatible", "--min", "8", "--max", "1001"]).is_err());
        assert!(parse(&["best", "--java", "1000"]).is_ok());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = parse(&["list", "--strict", "--data-dir", "/tmp/launcher"]).unwrap();
        assert!(cli.strict);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/launcher")));
        assert!(matches!(cli.command, Command::List));
    }
}

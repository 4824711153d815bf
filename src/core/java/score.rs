// ─── Compatibility scoring ───
// Pure ranking of runtimes against a game's Java requirement.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::installation::{Compatibility, JavaInstallation, JavaVendor};

const NEAR_DIFF: u32 = 3;

/// Java major-version constraint declared by a game version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JavaRequirement {
    Exact { major: u32 },
    /// Inclusive on both ends.
    Range { min: u32, max: u32 },
}

impl JavaRequirement {
    pub fn exact(major: u32) -> Self {
        JavaRequirement::Exact { major }
    }

    pub fn range(min: u32, max: u32) -> Self {
        JavaRequirement::Range {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Java track a Minecraft version id needs (8, 17 or 21).
    pub fn for_minecraft_version(minecraft_version: &str) -> Self {
        let lower = minecraft_version.to_ascii_lowercase();
        if let Some(week_pos) = lower.find('w') {
            let year_hint = &lower[..week_pos];
            if year_hint.len() >= 2 {
                let year_suffix = &year_hint[year_hint.len() - 2..];
                if let Ok(snapshot_year) = year_suffix.parse::<u32>() {
                    return Self::exact(if snapshot_year >= 24 { 21 } else { 17 });
                }
            }
        }

        let mut parts = minecraft_version.split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok()).unwrap_or(1);
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok()).unwrap_or(20);
        let patch = parts.next().and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);

        if major > 1 || minor >= 21 || (minor == 20 && patch >= 5) {
            Self::exact(21)
        } else if minor >= 17 {
            Self::exact(17)
        } else {
            Self::exact(8)
        }
    }
}

impl fmt::Display for JavaRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaRequirement::Exact { major } => write!(f, "Java {major}"),
            JavaRequirement::Range { min, max } => write!(f, "Java {min}-{max}"),
        }
    }
}

/// Ordered by decreasing confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecommendationLevel {
    Perfect,
    Recommended,
    Acceptable,
    Marginal,
    Incompatible,
}

impl RecommendationLevel {
    fn from_score(score: i32) -> Self {
        match score {
            s if s >= 800 => RecommendationLevel::Recommended,
            s if s >= 500 => RecommendationLevel::Acceptable,
            s if s >= 200 => RecommendationLevel::Marginal,
            _ => RecommendationLevel::Incompatible,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityScore {
    pub runtime: JavaInstallation,
    pub score: i32,
    pub level: RecommendationLevel,
    pub reason: String,
}

/// Scores one runtime against `requirement`.
pub fn score(runtime: &JavaInstallation, requirement: &JavaRequirement) -> CompatibilityScore {
    let slug = runtime.slug_version;
    let (mut score, mut level, mut reason) = match *requirement {
        JavaRequirement::Exact { major } => exact_branch(slug, major),
        JavaRequirement::Range { min, max } => range_branch(slug, min, max),
    };

    let mut notes = Vec::new();
    if runtime.architecture.is_64bit() {
        score += 100;
        notes.push("64-bit");
    }
    match vendor_tier(runtime.vendor()) {
        VendorTier::Top => {
            score += 60;
            notes.push("top-tier vendor");
        }
        VendorTier::Second => {
            score += 40;
            notes.push("well-known vendor");
        }
        VendorTier::Other => {}
    }
    if !runtime.is_jre {
        score += 40;
        notes.push("full JDK");
    }
    if !notes.is_empty() {
        reason = format!("{reason} ({})", notes.join(", "));
    }

    if !matches!(
        level,
        RecommendationLevel::Perfect | RecommendationLevel::Incompatible
    ) {
        level = RecommendationLevel::from_score(score);
    }

    CompatibilityScore {
        runtime: runtime.clone(),
        score,
        level,
        reason,
    }
}

fn exact_branch(slug: u32, major: u32) -> (i32, RecommendationLevel, String) {
    if slug == major {
        return (
            1000,
            RecommendationLevel::Perfect,
            format!("Java {slug} matches the required version exactly"),
        );
    }
    if slug > major {
        let diff = slug - major;
        if diff <= NEAR_DIFF {
            (
                bounded(500 - 50 * i64::from(diff)),
                RecommendationLevel::Acceptable,
                format!("Java {slug} is {diff} versions newer than required Java {major}"),
            )
        } else {
            (
                200,
                RecommendationLevel::Marginal,
                format!("Java {slug} is much newer than required Java {major}"),
            )
        }
    } else {
        let diff = major - slug;
        let level = if diff > NEAR_DIFF {
            RecommendationLevel::Incompatible
        } else {
            RecommendationLevel::Marginal
        };
        (
            bounded(-100 * i64::from(diff)),
            level,
            format!("Java {slug} is older than required Java {major}"),
        )
    }
}

fn range_branch(slug: u32, min: u32, max: u32) -> (i32, RecommendationLevel, String) {
    if (min..=max).contains(&slug) {
        // 10 points per version away from the center, halves included.
        let off_center = 5 * (2 * i64::from(slug) - i64::from(min) - i64::from(max)).abs();
        return (
            bounded(800 - off_center),
            RecommendationLevel::Recommended,
            format!("Java {slug} is within the supported range {min}-{max}"),
        );
    }
    if slug < min {
        let diff = min - slug;
        return (
            bounded(-200 * i64::from(diff)),
            RecommendationLevel::Incompatible,
            format!("Java {slug} is below the supported range {min}-{max}"),
        );
    }
    let diff = slug - max;
    if diff <= NEAR_DIFF {
        (
            bounded(400 - 50 * i64::from(diff)),
            RecommendationLevel::Acceptable,
            format!("Java {slug} is {diff} versions above the supported range {min}-{max}"),
        )
    } else {
        (
            100,
            RecommendationLevel::Marginal,
            format!("Java {slug} is far above the supported range {min}-{max}"),
        )
    }
}

/// Scores stay well inside `i32` so the modifiers can be added safely.
const SCORE_BOUND: i64 = 1_000_000_000;

fn bounded(score: i64) -> i32 {
    score.clamp(-SCORE_BOUND, SCORE_BOUND) as i32
}

enum VendorTier {
    Top,
    Second,
    Other,
}

fn vendor_tier(vendor: JavaVendor) -> VendorTier {
    match vendor {
        JavaVendor::Oracle | JavaVendor::AdoptiumEclipse | JavaVendor::AdoptOpenJDK => {
            VendorTier::Top
        }
        JavaVendor::Microsoft | JavaVendor::Amazon | JavaVendor::Azul => VendorTier::Second,
        _ => VendorTier::Other,
    }
}

/// Scores every `Compatibility::Yes` runtime and sorts by score, highest
/// first. Ties keep discovery order.
pub fn rank(runtimes: &[JavaInstallation], requirement: &JavaRequirement) -> Vec<CompatibilityScore> {
    let mut scored: Vec<CompatibilityScore> = runtimes
        .iter()
        .filter(|runtime| runtime.compatibility == Compatibility::Yes)
        .map(|runtime| score(runtime, requirement))
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

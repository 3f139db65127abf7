//! Numeric versions and publishable artifact versions.
//!
//! An [`ArtifactVersion`] is parsed from one of two mutually exclusive
//! grammars:
//!
//! - classic: `2.4.0.RELEASE`, `2.4.0.M1`, `2.4.0.RC2`, `2.4.0.BUILD-SNAPSHOT`
//! - modifier: `2.4.0`, `2.4.0-M1`, `2.4.0-RC2`, `2.4.0-SNAPSHOT`
//!
//! Classic is tried first. The bugfix segment is optional in both grammars and
//! the textual precision of the input is preserved when rendering. Numeric
//! segments have no leading zeros and stay below `u32::MAX`, so every
//! accepted string renders back unchanged and can be bumped.
//!
//! Ordering compares the numeric [`Version`] first and the raw suffix text
//! second. Suffix comparison is lexicographic, which sorts `M10` before `M2`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{TrainError, TrainResult};
use crate::iteration::Iteration;

const CLASSIC_GRAMMAR: &str = "<major>.<minor>[.<bugfix>].<RELEASE|M<n>|RC<n>|BUILD-SNAPSHOT>";
const MODIFIER_GRAMMAR: &str = "<major>.<minor>[.<bugfix>][-<RC<n>|M<n>|SNAPSHOT>]";

static CLASSIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)(?:\.(0|[1-9]\d*))?\.(RELEASE|M\d+|RC\d+|BUILD-SNAPSHOT)$")
        .expect("classic version pattern is valid")
});

static MODIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)(?:\.(0|[1-9]\d*))?(?:-(RC\d+|M\d+|SNAPSHOT))?$")
        .expect("modifier version pattern is valid")
});

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)(?:\.(0|[1-9]\d*))?(?:\.(0|[1-9]\d*))?$")
        .expect("numeric version pattern is valid")
});

/// Parse one numeric segment. `u32::MAX` is rejected so every parsed
/// version can still be bumped.
fn parse_component(text: &str) -> Option<u32> {
    text.parse::<u32>().ok().filter(|n| *n < u32::MAX)
}

/// A numeric `major.minor.bugfix(.build)` version.
///
/// Equality, hashing and ordering use the numeric tuple only. The number of
/// segments the value was written with is kept for rendering, so `2.4` and
/// `2.4.0` are equal but display differently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    bugfix: u32,
    build: u32,
    segments: u8,
}

impl Version {
    /// A three-segment version.
    pub fn new(major: u32, minor: u32, bugfix: u32) -> Self {
        Self {
            major,
            minor,
            bugfix,
            build: 0,
            segments: 3,
        }
    }

    /// A two-segment `major.minor` version, as modules declare them.
    pub fn of(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            bugfix: 0,
            build: 0,
            segments: 2,
        }
    }

    /// Parse `major.minor[.bugfix[.build]]`.
    pub fn parse(input: &str) -> TrainResult<Self> {
        let invalid = || TrainError::InvalidNumericVersion {
            input: input.to_string(),
        };
        let caps = NUMERIC.captures(input.trim()).ok_or_else(invalid)?;
        let number = |idx: usize| -> TrainResult<Option<u32>> {
            caps.get(idx)
                .map(|m| parse_component(m.as_str()).ok_or_else(invalid))
                .transpose()
        };

        let major = number(1)?.ok_or_else(invalid)?;
        let minor = number(2)?.ok_or_else(invalid)?;
        let bugfix = number(3)?;
        let build = number(4)?;
        let segments = match (bugfix, build) {
            (_, Some(_)) => 4,
            (Some(_), None) => 3,
            (None, None) => 2,
        };

        Ok(Self {
            major,
            minor,
            bugfix: bugfix.unwrap_or(0),
            build: build.unwrap_or(0),
            segments,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn bugfix(&self) -> u32 {
        self.bugfix
    }

    pub fn build(&self) -> u32 {
        self.build
    }

    /// Same major and minor with the given bugfix; always renders three segments.
    pub fn with_bugfix(&self, bugfix: u32) -> Self {
        Self {
            bugfix,
            build: 0,
            segments: 3,
            ..*self
        }
    }

    /// Next major version. The bumped component must be below `u32::MAX`,
    /// which [`Version::parse`] and [`ArtifactVersion::parse`] guarantee.
    pub fn next_major(&self) -> Self {
        Self {
            major: self.major + 1,
            minor: 0,
            bugfix: 0,
            build: 0,
            segments: self.segments.min(3),
        }
    }

    pub fn next_minor(&self) -> Self {
        Self {
            minor: self.minor + 1,
            bugfix: 0,
            build: 0,
            segments: self.segments.min(3),
            ..*self
        }
    }

    pub fn next_bugfix(&self) -> Self {
        self.with_bugfix(self.bugfix + 1)
    }

    fn key(&self) -> (u32, u32, u32, u32) {
        (self.major, self.minor, self.bugfix, self.build)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments >= 4 || self.build > 0 {
            write!(
                f,
                "{}.{}.{}.{}",
                self.major, self.minor, self.bugfix, self.build
            )
        } else if self.segments == 3 || self.bugfix > 0 {
            write!(f, "{}.{}.{}", self.major, self.minor, self.bugfix)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

impl FromStr for Version {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for Version {
    type Error = TrainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Textual grammar an [`ArtifactVersion`] is rendered in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum VersionFormat {
    /// Dot-separated suffix: `2.4.0.RELEASE`, `2.4.0.BUILD-SNAPSHOT`.
    #[default]
    Classic,
    /// Dash-separated modifier: `2.4.0`, `2.4.0-SNAPSHOT`.
    Modifier,
}

impl VersionFormat {
    fn release_suffix(self) -> &'static str {
        match self {
            VersionFormat::Classic => "RELEASE",
            VersionFormat::Modifier => "",
        }
    }

    fn snapshot_suffix(self) -> &'static str {
        match self {
            VersionFormat::Classic => "BUILD-SNAPSHOT",
            VersionFormat::Modifier => "SNAPSHOT",
        }
    }
}

/// Release phase encoded in an artifact version suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuffixKind {
    Release,
    Milestone(u32),
    ReleaseCandidate(u32),
    Snapshot,
}

/// A publishable artifact version: numeric [`Version`] plus phase suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ArtifactVersion {
    version: Version,
    kind: SuffixKind,
    format: VersionFormat,
    /// Suffix exactly as written, without separator. Empty for a modifier release.
    suffix: String,
}

impl ArtifactVersion {
    /// Parse a version string, trying the classic grammar before the modifier one.
    pub fn parse(input: &str) -> TrainResult<Self> {
        let invalid = || TrainError::InvalidVersion {
            input: input.to_string(),
            classic: CLASSIC_GRAMMAR,
            modifier: MODIFIER_GRAMMAR,
        };

        let (caps, format) = if let Some(caps) = CLASSIC.captures(input) {
            (caps, VersionFormat::Classic)
        } else if let Some(caps) = MODIFIER.captures(input) {
            (caps, VersionFormat::Modifier)
        } else {
            return Err(invalid());
        };

        let number = |idx: usize| -> TrainResult<Option<u32>> {
            caps.get(idx)
                .map(|m| parse_component(m.as_str()).ok_or_else(invalid))
                .transpose()
        };
        let major = number(1)?.ok_or_else(invalid)?;
        let minor = number(2)?.ok_or_else(invalid)?;
        let version = match number(3)? {
            Some(bugfix) => Version::new(major, minor, bugfix),
            None => Version::of(major, minor),
        };

        let suffix = caps.get(4).map(|m| m.as_str()).unwrap_or("");
        let kind = match suffix {
            "" | "RELEASE" => SuffixKind::Release,
            "SNAPSHOT" | "BUILD-SNAPSHOT" => SuffixKind::Snapshot,
            s if s.starts_with("RC") => {
                SuffixKind::ReleaseCandidate(s[2..].parse().map_err(|_| invalid())?)
            }
            s => SuffixKind::Milestone(s[1..].parse().map_err(|_| invalid())?),
        };

        Ok(Self {
            version,
            kind,
            format,
            suffix: suffix.to_string(),
        })
    }

    fn with_kind(version: Version, kind: SuffixKind, format: VersionFormat) -> Self {
        let suffix = match kind {
            SuffixKind::Release => format.release_suffix().to_string(),
            SuffixKind::Snapshot => format.snapshot_suffix().to_string(),
            SuffixKind::Milestone(n) => format!("M{n}"),
            SuffixKind::ReleaseCandidate(n) => format!("RC{n}"),
        };
        Self {
            version,
            kind,
            format,
            suffix,
        }
    }

    pub fn release(version: Version, format: VersionFormat) -> Self {
        Self::with_kind(version, SuffixKind::Release, format)
    }

    pub fn snapshot(version: Version, format: VersionFormat) -> Self {
        Self::with_kind(version, SuffixKind::Snapshot, format)
    }

    pub fn milestone(version: Version, number: u32, format: VersionFormat) -> Self {
        Self::with_kind(version, SuffixKind::Milestone(number), format)
    }

    pub fn release_candidate(version: Version, number: u32, format: VersionFormat) -> Self {
        Self::with_kind(version, SuffixKind::ReleaseCandidate(number), format)
    }

    /// The version a module declared as `version` is published under in `iteration`.
    ///
    /// GA publishes bugfix 0, SR*n* publishes bugfix *n*, milestones and
    /// release candidates carry their suffix on bugfix 0.
    pub fn from_iteration(version: Version, iteration: Iteration, format: VersionFormat) -> Self {
        match iteration {
            Iteration::GA => Self::release(version.with_bugfix(0), format),
            Iteration::ServiceRelease(n) => Self::release(version.with_bugfix(n), format),
            Iteration::Milestone(n) => Self::milestone(version.with_bugfix(0), n, format),
            Iteration::ReleaseCandidate(n) => {
                Self::release_candidate(version.with_bugfix(0), n, format)
            }
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn kind(&self) -> SuffixKind {
        self.kind
    }

    pub fn format(&self) -> VersionFormat {
        self.format
    }

    /// Raw suffix text without separator.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn is_release_version(&self) -> bool {
        self.kind == SuffixKind::Release
    }

    pub fn is_snapshot_version(&self) -> bool {
        self.kind == SuffixKind::Snapshot
    }

    pub fn is_milestone_version(&self) -> bool {
        matches!(self.kind, SuffixKind::Milestone(_))
    }

    pub fn is_release_candidate_version(&self) -> bool {
        matches!(self.kind, SuffixKind::ReleaseCandidate(_))
    }

    /// Milestone or release candidate.
    pub fn is_preview(&self) -> bool {
        self.is_milestone_version() || self.is_release_candidate_version()
    }

    /// Same numeric version rendered in another grammar.
    pub fn with_format(&self, format: VersionFormat) -> Self {
        Self::with_kind(self.version, self.kind, format)
    }

    pub fn release_version(&self) -> Self {
        Self::release(self.version, self.format)
    }

    pub fn snapshot_version(&self) -> Self {
        Self::snapshot(self.version, self.format)
    }

    /// Next snapshot on the development line.
    ///
    /// A GA release (bugfix 0) moves to the next minor, a service release to
    /// the next bugfix. Any non-release version is returned unchanged.
    pub fn next_development_version(&self) -> Self {
        if !self.is_release_version() {
            return self.clone();
        }
        let next = if self.version.bugfix() == 0 {
            self.version.next_minor().with_bugfix(0)
        } else {
            self.version.next_bugfix()
        };
        Self::snapshot(next, self.format)
    }

    /// Next snapshot on the maintenance line. Non-release versions are returned unchanged.
    pub fn next_bugfix_version(&self) -> Self {
        if !self.is_release_version() {
            return self.clone();
        }
        Self::snapshot(self.version.next_bugfix(), self.format)
    }

    /// Train-level label for this version: `GA`, `SR<n>`, or the raw suffix.
    pub fn release_train_suffix(&self) -> String {
        match self.kind {
            SuffixKind::Release if self.version.bugfix() > 0 => {
                format!("SR{}", self.version.bugfix())
            }
            SuffixKind::Release => "GA".to_string(),
            _ => self.suffix.clone(),
        }
    }
}

impl PartialEq for ArtifactVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.kind == other.kind
            && self.format == other.format
            && self.suffix == other.suffix
    }
}

impl Eq for ArtifactVersion {}

impl Hash for ArtifactVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
        self.kind.hash(state);
        self.format.hash(state);
        self.suffix.hash(state);
    }
}

impl PartialOrd for ArtifactVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArtifactVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.suffix.cmp(&other.suffix))
            .then_with(|| self.format.cmp(&other.format))
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            VersionFormat::Classic => write!(f, "{}.{}", self.version, self.suffix),
            VersionFormat::Modifier if self.suffix.is_empty() => write!(f, "{}", self.version),
            VersionFormat::Modifier => write!(f, "{}-{}", self.version, self.suffix),
        }
    }
}

impl FromStr for ArtifactVersion {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ArtifactVersion> for String {
    fn from(version: ArtifactVersion) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for ArtifactVersion {
    type Error = TrainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

//! Release stages within a train generation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TrainError, TrainResult};

/// Number of service releases the standard iteration list provides.
pub const STANDARD_SERVICE_RELEASES: u32 = 25;

/// A release stage: `M<n>`, `RC<n>`, `GA` or `SR<n>`.
///
/// Variant order defines the stage order, so the derived `Ord` gives
/// `M1..Mn < RC1..RCn < GA < SR1..SRn`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub enum Iteration {
    Milestone(u32),
    ReleaseCandidate(u32),
    GA,
    ServiceRelease(u32),
}

impl Iteration {
    pub fn is_ga(&self) -> bool {
        matches!(self, Iteration::GA)
    }

    pub fn is_service_iteration(&self) -> bool {
        matches!(self, Iteration::ServiceRelease(_))
    }

    pub fn is_milestone(&self) -> bool {
        matches!(self, Iteration::Milestone(_))
    }

    pub fn is_release_candidate(&self) -> bool {
        matches!(self, Iteration::ReleaseCandidate(_))
    }

    /// Milestones and release candidates.
    pub fn is_preview(&self) -> bool {
        self.is_milestone() || self.is_release_candidate()
    }

    /// `M1`, the stage every generation starts with.
    pub fn is_initial(&self) -> bool {
        *self == Iteration::Milestone(1)
    }

    /// Bugfix number this iteration publishes: `n` for `SR<n>`, otherwise 0.
    pub fn bugfix_value(&self) -> u32 {
        match self {
            Iteration::ServiceRelease(n) => *n,
            _ => 0,
        }
    }
}

impl fmt::Display for Iteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Iteration::Milestone(n) => write!(f, "M{n}"),
            Iteration::ReleaseCandidate(n) => write!(f, "RC{n}"),
            Iteration::GA => f.write_str("GA"),
            Iteration::ServiceRelease(n) => write!(f, "SR{n}"),
        }
    }
}

impl FromStr for Iteration {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let invalid = || TrainError::InvalidTrainIteration {
            input: s.to_string(),
        };
        let number = |digits: &str| -> TrainResult<u32> {
            match digits.parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(invalid()),
            }
        };

        if upper == "GA" {
            Ok(Iteration::GA)
        } else if let Some(rest) = upper.strip_prefix("RC") {
            number(rest).map(Iteration::ReleaseCandidate)
        } else if let Some(rest) = upper.strip_prefix("SR") {
            number(rest).map(Iteration::ServiceRelease)
        } else if let Some(rest) = upper.strip_prefix('M') {
            number(rest).map(Iteration::Milestone)
        } else {
            Err(invalid())
        }
    }
}

impl From<Iteration> for String {
    fn from(iteration: Iteration) -> Self {
        iteration.to_string()
    }
}

impl TryFrom<String> for Iteration {
    type Error = TrainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The ordered stages a train goes through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iterations {
    iterations: Vec<Iteration>,
}

impl Iterations {
    /// Build from any set of stages; they are sorted and deduplicated.
    pub fn new(iterations: impl IntoIterator<Item = Iteration>) -> Self {
        let mut iterations: Vec<Iteration> = iterations.into_iter().collect();
        iterations.sort();
        iterations.dedup();
        Self { iterations }
    }

    /// M1, M2, M3, RC1, RC2, GA, SR1..SR25.
    pub fn standard() -> Self {
        let previews = [
            Iteration::Milestone(1),
            Iteration::Milestone(2),
            Iteration::Milestone(3),
            Iteration::ReleaseCandidate(1),
            Iteration::ReleaseCandidate(2),
            Iteration::GA,
        ];
        let service = (1..=STANDARD_SERVICE_RELEASES).map(Iteration::ServiceRelease);
        Self::new(previews.into_iter().chain(service))
    }

    pub fn first(&self) -> Option<Iteration> {
        self.iterations.first().copied()
    }

    pub fn contains(&self, iteration: Iteration) -> bool {
        self.iterations.binary_search(&iteration).is_ok()
    }

    /// Look up a stage by name, e.g. `"RC1"`.
    pub fn get(&self, name: &str) -> Option<Iteration> {
        let iteration = name.parse::<Iteration>().ok()?;
        self.contains(iteration).then_some(iteration)
    }

    /// The stage before `iteration`, `None` for the first one or an unknown stage.
    pub fn previous(&self, iteration: Iteration) -> Option<Iteration> {
        let idx = self.iterations.binary_search(&iteration).ok()?;
        idx.checked_sub(1).map(|prev| self.iterations[prev])
    }

    pub fn next(&self, iteration: Iteration) -> Option<Iteration> {
        let idx = self.iterations.binary_search(&iteration).ok()?;
        self.iterations.get(idx + 1).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Iteration> + '_ {
        self.iterations.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }
}

impl Default for Iterations {
    fn default() -> Self {
        Self::standard()
    }
}

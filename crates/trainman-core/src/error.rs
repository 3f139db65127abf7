//! Error types for release train modelling and orchestration.

use thiserror::Error;

/// Errors produced by the release train model and the orchestrator.
#[derive(Debug, Error)]
pub enum TrainError {
    /// A version string matched neither the classic nor the modifier grammar.
    #[error(
        "invalid version '{input}': matches neither the classic grammar ({classic}) nor the modifier grammar ({modifier})"
    )]
    InvalidVersion {
        input: String,
        classic: &'static str,
        modifier: &'static str,
    },

    /// A plain numeric version such as `2.4` or `2.4.1` could not be parsed.
    #[error("invalid numeric version '{input}' (expected <major>.<minor>[.<bugfix>[.<build>]])")]
    InvalidNumericVersion { input: String },

    /// A phase name outside `prepare`, `cleanup` and `maintenance`.
    #[error("unknown release phase '{value}' (expected prepare, cleanup or maintenance)")]
    UnknownPhase { value: String },

    /// The declared project dependencies contain a cycle.
    #[error("dependency cycle detected involving projects: {projects:?}")]
    DependencyCycle { projects: Vec<String> },

    /// Two projects were registered under the same key.
    #[error("project registered twice: {project}")]
    DuplicateProject { project: String },

    /// A referenced project is not registered.
    #[error("project not found: {project}")]
    UnknownProject { project: String },

    /// A project declares a dependency on a project that is not registered.
    #[error("project {project} depends on unregistered project {dependency}")]
    UnknownDependency { project: String, dependency: String },

    /// Two trains were registered under the same name.
    #[error("release train registered twice: {name}")]
    DuplicateTrain { name: String },

    /// No train with the given name or calendar version.
    #[error("release train not found: {name}")]
    UnknownTrain { name: String },

    /// The train does not define the requested iteration.
    #[error("release train {train} has no iteration {iteration}")]
    UnknownIteration { train: String, iteration: String },

    /// The train does not ship the requested project.
    #[error("release train {train} does not contain project {project}")]
    ModuleNotInTrain { train: String, project: String },

    /// Previous iteration requested for the very first iteration of the first train.
    #[error("{train} {iteration} is the first known iteration; there is no previous one")]
    NoPreviousIteration { train: String, iteration: String },

    /// A train iteration descriptor could not be parsed.
    #[error("invalid train iteration '{input}' (expected '<train> <iteration>' or a calendar version)")]
    InvalidTrainIteration { input: String },

    /// A calendar version such as `2021.0` could not be parsed.
    #[error("invalid calendar version '{input}' (expected <year>.<minor>)")]
    InvalidCalver { input: String },

    /// No registered plugin supports the given subject.
    #[error("no plugin registered for {subject}")]
    NoMatchingPlugin { subject: String },

    /// A configuration value is malformed.
    #[error("invalid configuration {key}={value}: {reason}")]
    InvalidConfig {
        key: String,
        value: String,
        reason: String,
    },

    /// One or more module operations failed during orchestration.
    #[error("{train_iteration}: {} module(s) failed:\n{}", .failures.len(), .failures.join("\n"))]
    ExecutionFailed {
        train_iteration: String,
        failures: Vec<String>,
    },
}

/// Convenience result alias.
pub type TrainResult<T> = std::result::Result<T, TrainError>;

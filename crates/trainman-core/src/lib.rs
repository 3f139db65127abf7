//! Trainman Core Library
//!
//! Release train modelling for a family of interdependent, independently
//! versioned projects: artifact versions and their phase arithmetic, the
//! project dependency graph and its build order, trains and iterations,
//! branch derivation, and a dependency-ordered concurrent orchestrator that
//! runs caller-supplied operations over every module of a train iteration.

pub mod branch;
pub mod dispatch;
pub mod error;
pub mod iteration;
pub mod obs;
pub mod orchestrator;
pub mod phase;
pub mod project;
pub mod telemetry;
pub mod train;
pub mod version;

pub use branch::Branch;
pub use dispatch::PluginRegistry;
pub use error::{TrainError, TrainResult};
pub use iteration::{Iteration, Iterations};
pub use orchestrator::{
    FailurePolicy, ModuleOutcome, ModuleReport, ModuleResult, Orchestrator, OrchestratorConfig,
    OrderingMode, Summary, SummaryReport,
};
pub use phase::{Phase, UpdateInformation};
pub use project::{compute_build_order, ArtifactCoordinate, Project, ProjectKey, Projects, Tracker};
pub use telemetry::init_tracing;
pub use train::{
    Module, ModuleIteration, ReleaseTrains, SupportStatus, Train, TrainIteration, Transition,
};
pub use version::{ArtifactVersion, SuffixKind, Version, VersionFormat};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

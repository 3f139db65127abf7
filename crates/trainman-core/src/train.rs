//! Release trains, their iterations and per-module projections.
//!
//! A [`Train`] is one named generation bundling a version per project. Trains
//! are never mutated: successors come from [`Train::next`] and the `with_*` /
//! `without_modules` derivations. [`ReleaseTrains`] keeps them in
//! chronological order for previous-train and previous-iteration lookups.
//!
//! [`TrainIteration`] and [`ModuleIteration`] are pure projections; every
//! derived property (artifact version, branch, support status) is computed on
//! each call.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::branch::Branch;
use crate::error::{TrainError, TrainResult};
use crate::iteration::{Iteration, Iterations};
use crate::project::{Project, ProjectKey, Projects, BUILD};
use crate::version::{ArtifactVersion, Version, VersionFormat};

static CALVER_ITERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})\.(\d+)\.(\d+)(?:-(M\d+|RC\d+))?$").expect("calver pattern is valid")
});

/// Default bump applied to carried-forward module versions by [`Train::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Major,
    Minor,
}

/// Whether a train (and therefore its modules) is openly or commercially supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    #[default]
    Oss,
    Commercial,
}

/// A project shipped by a train at a `major.minor` version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    project: ProjectKey,
    version: Version,
}

impl Module {
    pub fn new(project: impl Into<ProjectKey>, version: Version) -> Self {
        Self {
            project: project.into(),
            version,
        }
    }

    /// Parse the version from text, e.g. `Module::parse("commons", "2.4")`.
    pub fn parse(project: impl Into<ProjectKey>, version: &str) -> TrainResult<Self> {
        Ok(Self::new(project, Version::parse(version)?))
    }

    pub fn project(&self) -> &ProjectKey {
        &self.project
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Same project, version bumped per `transition`.
    pub fn next(&self, transition: Transition) -> Self {
        let version = match transition {
            Transition::Major => self.version.next_major(),
            Transition::Minor => self.version.next_minor(),
        };
        Self {
            project: self.project.clone(),
            version,
        }
    }
}

/// One named generation of the product family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    name: String,
    modules: Vec<Module>,
    iterations: Iterations,
    calver: Option<Version>,
    version_format: VersionFormat,
    always_use_branch: bool,
    support_status: SupportStatus,
}

impl Train {
    /// A root train with the standard iterations. Later generations derive
    /// from it via [`Train::next`].
    pub fn new(name: impl Into<String>, modules: impl IntoIterator<Item = Module>) -> Self {
        let mut train = Self {
            name: name.into(),
            modules: Vec::new(),
            iterations: Iterations::standard(),
            calver: None,
            version_format: VersionFormat::Classic,
            always_use_branch: false,
            support_status: SupportStatus::Oss,
        };
        train.merge_modules(modules);
        train
    }

    /// Derive the next generation.
    ///
    /// Every module carries forward bumped per `transition` unless an override
    /// names its project; overrides for projects not yet in the train are
    /// appended. Iterations, version format and support status carry over;
    /// the calendar version and forced branching do not.
    pub fn next(
        &self,
        name: impl Into<String>,
        transition: Transition,
        overrides: impl IntoIterator<Item = Module>,
    ) -> Self {
        let mut train = Self {
            name: name.into(),
            modules: self.modules.iter().map(|m| m.next(transition)).collect(),
            iterations: self.iterations.clone(),
            calver: None,
            version_format: self.version_format,
            always_use_branch: false,
            support_status: self.support_status,
        };
        train.merge_modules(overrides);
        train
    }

    fn merge_modules(&mut self, modules: impl IntoIterator<Item = Module>) {
        for module in modules {
            match self.modules.iter_mut().find(|m| m.project == module.project) {
                Some(existing) => *existing = module,
                None => self.modules.push(module),
            }
        }
    }

    /// Same train without the modules matching `discontinued`.
    pub fn without_modules(&self, discontinued: impl Fn(&Module) -> bool) -> Self {
        Self {
            modules: self
                .modules
                .iter()
                .filter(|m| !discontinued(m))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Same train released under a calendar version such as `"2021.0"`.
    pub fn with_calver(&self, calver: &str) -> TrainResult<Self> {
        let version = Version::parse(calver)
            .ok()
            .filter(|v| v.bugfix() == 0 && v.build() == 0)
            .ok_or_else(|| TrainError::InvalidCalver {
                input: calver.to_string(),
            })?;
        Ok(Self {
            calver: Some(version),
            ..self.clone()
        })
    }

    pub fn with_version_format(&self, version_format: VersionFormat) -> Self {
        Self {
            version_format,
            ..self.clone()
        }
    }

    pub fn with_always_use_branch(&self, always_use_branch: bool) -> Self {
        Self {
            always_use_branch,
            ..self.clone()
        }
    }

    pub fn with_support_status(&self, support_status: SupportStatus) -> Self {
        Self {
            support_status,
            ..self.clone()
        }
    }

    pub fn with_iterations(&self, iterations: Iterations) -> Self {
        Self {
            iterations,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Modules in declaration order.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, project: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.project.as_str() == project)
    }

    pub fn contains(&self, project: &str) -> bool {
        self.module(project).is_some()
    }

    pub fn iterations(&self) -> &Iterations {
        &self.iterations
    }

    /// Look up one of this train's iterations by name.
    pub fn iteration(&self, name: &str) -> Option<Iteration> {
        self.iterations.get(name)
    }

    pub fn calver(&self) -> Option<Version> {
        self.calver
    }

    pub fn uses_calver(&self) -> bool {
        self.calver.is_some()
    }

    pub fn version_format(&self) -> VersionFormat {
        self.version_format
    }

    pub fn always_use_branch(&self) -> bool {
        self.always_use_branch
    }

    pub fn support_status(&self) -> SupportStatus {
        self.support_status
    }

    pub fn is_commercial(&self) -> bool {
        self.support_status == SupportStatus::Commercial
    }

    /// `true` when `name` is the train's name (case-insensitive) or its calendar version.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.calver.is_some_and(|calver| calver.to_string() == name)
    }
}

impl fmt::Display for Train {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.calver {
            Some(calver) => write!(f, "{} ({calver})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A specific iteration of a train, e.g. `Ockham SR1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainIteration {
    train: Arc<Train>,
    iteration: Iteration,
}

impl TrainIteration {
    pub fn new(train: Arc<Train>, iteration: Iteration) -> Self {
        Self { train, iteration }
    }

    pub fn train(&self) -> &Arc<Train> {
        &self.train
    }

    pub fn iteration(&self) -> Iteration {
        self.iteration
    }

    /// Project `project` onto this iteration.
    pub fn module(&self, project: &Arc<Project>) -> TrainResult<ModuleIteration> {
        let module = self
            .train
            .module(project.key().as_str())
            .ok_or_else(|| TrainError::ModuleNotInTrain {
                train: self.train.name().to_string(),
                project: project.key().to_string(),
            })?;
        Ok(ModuleIteration {
            train_iteration: self.clone(),
            module: module.clone(),
            project: Arc::clone(project),
        })
    }

    /// Every module of the train in build order.
    ///
    /// Fails with [`TrainError::UnknownProject`] when the train ships a project
    /// the registry does not know.
    pub fn module_iterations(&self, projects: &Projects) -> TrainResult<Vec<ModuleIteration>> {
        let mut modules = self
            .train
            .modules()
            .iter()
            .map(|module| {
                let project = projects.require(module.project().as_str())?;
                Ok(ModuleIteration {
                    train_iteration: self.clone(),
                    module: module.clone(),
                    project: Arc::clone(project),
                })
            })
            .collect::<TrainResult<Vec<_>>>()?;
        projects.sort_by_build_order(&mut modules, |m| m.project_key().as_str());
        Ok(modules)
    }

    /// Like [`TrainIteration::module_iterations`], without the shared parent project.
    pub fn module_iterations_without_build(
        &self,
        projects: &Projects,
    ) -> TrainResult<Vec<ModuleIteration>> {
        let mut modules = self.module_iterations(projects)?;
        modules.retain(|m| !m.project().is_build());
        Ok(modules)
    }
}

impl fmt::Display for TrainIteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.train.name(), self.iteration)
    }
}

/// One project's state within a [`TrainIteration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIteration {
    train_iteration: TrainIteration,
    module: Module,
    project: Arc<Project>,
}

impl ModuleIteration {
    pub fn train_iteration(&self) -> &TrainIteration {
        &self.train_iteration
    }

    pub fn train(&self) -> &Train {
        &self.train_iteration.train
    }

    pub fn iteration(&self) -> Iteration {
        self.train_iteration.iteration
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn project_key(&self) -> &ProjectKey {
        self.project.key()
    }

    /// The artifact version this module is published under in this iteration.
    pub fn version(&self) -> ArtifactVersion {
        ArtifactVersion::from_iteration(
            self.module.version(),
            self.iteration(),
            self.train().version_format(),
        )
    }

    pub fn branch(&self) -> Branch {
        Branch::for_module(self)
    }

    pub fn support_status(&self) -> SupportStatus {
        self.train().support_status()
    }

    pub fn is_commercial(&self) -> bool {
        self.train().is_commercial()
    }
}

impl fmt::Display for ModuleIteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.project.name(), self.version())
    }
}

/// Chronological registry of release trains.
#[derive(Debug, Clone, Default)]
pub struct ReleaseTrains {
    trains: Vec<Arc<Train>>,
}

impl ReleaseTrains {
    /// Register trains oldest first. Names and calendar versions must be unique.
    pub fn new(trains: impl IntoIterator<Item = Train>) -> TrainResult<Self> {
        let mut registered: Vec<Arc<Train>> = Vec::new();
        for train in trains {
            if registered.iter().any(|t| t.matches(train.name())) {
                return Err(TrainError::DuplicateTrain {
                    name: train.name().to_string(),
                });
            }
            if let Some(calver) = train.calver() {
                let label = calver.to_string();
                if registered.iter().any(|t| t.calver() == Some(calver) || t.matches(&label)) {
                    return Err(TrainError::DuplicateTrain { name: label });
                }
            }
            registered.push(Arc::new(train));
        }
        Ok(Self { trains: registered })
    }

    /// The generations released so far, from Moore to the CalVer trains.
    pub fn standard() -> TrainResult<Self> {
        let m = Module::parse;

        let moore = Train::new(
            "Moore",
            [
                m(BUILD, "2.2")?,
                m("commons", "2.2")?,
                m("jpa", "2.2")?,
                m("mongodb", "2.2")?,
                m("neo4j", "5.2")?,
                m("solr", "4.1")?,
                m("couchbase", "3.2")?,
                m("cassandra", "2.2")?,
                m("elasticsearch", "3.2")?,
                m("keyvalue", "2.2")?,
                m("redis", "2.2")?,
                m("jdbc", "1.1")?,
                m("ldap", "2.2")?,
                m("geode", "2.2")?,
                m("envers", "2.2")?,
                m("rest", "3.2")?,
            ],
        );

        let neumann = moore.next(
            "Neumann",
            Transition::Minor,
            [
                m("mongodb", "3.0")?,
                m("cassandra", "3.0")?,
                m("couchbase", "4.0")?,
                m("elasticsearch", "4.0")?,
                m("jdbc", "2.0")?,
                m("r2dbc", "1.1")?,
            ],
        );

        let ockham = neumann
            .next("Ockham", Transition::Minor, [m("neo4j", "6.0")?])
            .without_modules(|module| module.project().as_str() == "solr");

        let pascal = ockham
            .next("Pascal", Transition::Minor, [])
            .with_calver("2021.0")?
            .with_version_format(VersionFormat::Modifier);

        let q = pascal
            .next("Q", Transition::Minor, [])
            .with_calver("2021.1")?;

        let raj = q
            .next("Raj", Transition::Minor, [])
            .with_calver("2021.2")?;

        let turing = raj
            .next("Turing", Transition::Major, [m("neo4j", "7.0")?])
            .without_modules(|module| module.project().as_str() == "geode")
            .with_calver("2022.0")?;

        let ullman = turing
            .next("Ullman", Transition::Minor, [])
            .with_calver("2023.0")?;

        Self::new([moore, neumann, ockham, pascal, q, raj, turing, ullman])
    }

    /// Find a train by name or calendar version.
    pub fn get(&self, name: &str) -> Option<&Arc<Train>> {
        self.trains.iter().find(|t| t.matches(name))
    }

    pub fn require(&self, name: &str) -> TrainResult<&Arc<Train>> {
        self.get(name).ok_or_else(|| TrainError::UnknownTrain {
            name: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Train>> {
        self.trains.iter()
    }

    pub fn latest(&self) -> Option<&Arc<Train>> {
        self.trains.last()
    }

    /// The train released before `train`, `None` for the first one.
    pub fn previous(&self, train: &Train) -> Option<&Arc<Train>> {
        let idx = self.trains.iter().position(|t| t.name() == train.name())?;
        idx.checked_sub(1).map(|prev| &self.trains[prev])
    }

    /// The iteration released before `train_iteration`.
    ///
    /// Within a train this is the preceding stage. The first stage of a train
    /// steps back to the predecessor train's GA. The first stage of the first
    /// train has no predecessor and yields [`TrainError::NoPreviousIteration`].
    /// A train that is not in this registry yields [`TrainError::UnknownTrain`].
    pub fn previous_iteration(&self, train_iteration: &TrainIteration) -> TrainResult<TrainIteration> {
        let train = train_iteration.train();
        let iteration = train_iteration.iteration();

        if !self.trains.iter().any(|t| t.name() == train.name()) {
            return Err(TrainError::UnknownTrain {
                name: train.name().to_string(),
            });
        }

        if let Some(previous) = train.iterations().previous(iteration) {
            return Ok(TrainIteration::new(Arc::clone(train), previous));
        }
        if !train.iterations().contains(iteration) {
            return Err(TrainError::UnknownIteration {
                train: train.name().to_string(),
                iteration: iteration.to_string(),
            });
        }

        let previous_train = self.previous(train).ok_or_else(|| TrainError::NoPreviousIteration {
            train: train.name().to_string(),
            iteration: iteration.to_string(),
        })?;
        if !previous_train.iterations().contains(Iteration::GA) {
            return Err(TrainError::UnknownIteration {
                train: previous_train.name().to_string(),
                iteration: Iteration::GA.to_string(),
            });
        }
        Ok(TrainIteration::new(Arc::clone(previous_train), Iteration::GA))
    }

    /// Resolve `"<train> <iteration>"` (e.g. `"Ockham SR1"`) or a calendar
    /// version (`"2021.0.2"`, `"2022.0.0-M1"`).
    pub fn parse_train_iteration(&self, input: &str) -> TrainResult<TrainIteration> {
        let trimmed = input.trim();
        let invalid = || TrainError::InvalidTrainIteration {
            input: input.to_string(),
        };

        if let Some(caps) = CALVER_ITERATION.captures(trimmed) {
            let calver = format!("{}.{}", &caps[1], &caps[2]);
            let train = self.require(&calver)?;
            let bugfix: u32 = caps[3].parse().map_err(|_| invalid())?;
            let iteration = match (caps.get(4), bugfix) {
                (Some(suffix), 0) => suffix.as_str().parse::<Iteration>()?,
                (Some(_), _) => return Err(invalid()),
                (None, 0) => Iteration::GA,
                (None, n) => Iteration::ServiceRelease(n),
            };
            return Self::checked(train, iteration);
        }

        let (name, iteration) = trimmed.split_once(char::is_whitespace).ok_or_else(invalid)?;
        let train = self.require(name)?;
        let iteration = iteration.trim().parse::<Iteration>()?;
        Self::checked(train, iteration)
    }

    fn checked(train: &Arc<Train>, iteration: Iteration) -> TrainResult<TrainIteration> {
        if !train.iterations().contains(iteration) {
            return Err(TrainError::UnknownIteration {
                train: train.name().to_string(),
                iteration: iteration.to_string(),
            });
        }
        Ok(TrainIteration::new(Arc::clone(train), iteration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(project: &str, version: &str) -> Module {
        Module::parse(project, version).unwrap()
    }

    fn root() -> Train {
        Train::new(
            "Alpha",
            [module(BUILD, "1.0"), module("commons", "1.0"), module("jpa", "2.3")],
        )
    }

    #[test]
    fn test_next_bumps_carried_modules_and_applies_overrides() {
        let alpha = root();
        let beta = alpha.next("Beta", Transition::Minor, [module("jpa", "3.0")]);

        assert_eq!(beta.name(), "Beta");
        assert_eq!(beta.module("commons").unwrap().version().to_string(), "1.1");
        assert_eq!(beta.module("jpa").unwrap().version().to_string(), "3.0");

        let gamma = beta.next("Gamma", Transition::Major, [module("mongodb", "4.0")]);
        assert_eq!(gamma.module("commons").unwrap().version().to_string(), "2.0");
        assert_eq!(gamma.module("mongodb").unwrap().version().to_string(), "4.0");
        assert_eq!(gamma.modules().last().unwrap().project().as_str(), "mongodb");
    }

    #[test]
    fn test_next_never_mutates_the_source_train() {
        let alpha = root().with_always_use_branch(true);
        let snapshot = alpha.clone();
        let _beta = alpha
            .next("Beta", Transition::Major, [module("commons", "9.0")])
            .without_modules(|m| m.project().as_str() == "jpa");
        assert_eq!(alpha, snapshot);
        assert!(alpha.contains("jpa"));
    }

    #[test]
    fn test_next_resets_calver_and_forced_branching() {
        let alpha = root()
            .with_calver("2021.0")
            .unwrap()
            .with_always_use_branch(true)
            .with_version_format(VersionFormat::Modifier);
        let beta = alpha.next("Beta", Transition::Minor, []);
        assert!(!beta.uses_calver());
        assert!(!beta.always_use_branch());
        assert_eq!(beta.version_format(), VersionFormat::Modifier);
    }

    #[test]
    fn test_without_modules_discontinues() {
        let train = root().without_modules(|m| m.project().as_str() == "jpa");
        assert!(!train.contains("jpa"));
        assert!(train.contains("commons"));
    }

    #[test]
    fn test_with_calver_rejects_full_versions() {
        assert!(root().with_calver("2021.0").is_ok());
        assert!(matches!(
            root().with_calver("2021.0.1"),
            Err(TrainError::InvalidCalver { .. })
        ));
        assert!(root().with_calver("next").is_err());
    }

    #[test]
    fn test_module_iteration_versions() {
        let projects = Projects::standard().unwrap();
        let trains = ReleaseTrains::standard().unwrap();
        let ockham = trains.require("Ockham").unwrap();
        let commons = projects.require("commons").unwrap();

        let ga = TrainIteration::new(Arc::clone(ockham), Iteration::GA);
        assert_eq!(ga.module(commons).unwrap().version().to_string(), "2.4.0.RELEASE");

        let sr2 = TrainIteration::new(Arc::clone(ockham), Iteration::ServiceRelease(2));
        assert_eq!(sr2.module(commons).unwrap().version().to_string(), "2.4.2.RELEASE");

        let pascal = trains.require("2021.0").unwrap();
        let m1 = TrainIteration::new(Arc::clone(pascal), Iteration::Milestone(1));
        assert_eq!(m1.module(commons).unwrap().version().to_string(), "2.5.0-M1");
    }

    #[test]
    fn test_module_iterations_follow_build_order() {
        let projects = Projects::standard().unwrap();
        let trains = ReleaseTrains::standard().unwrap();
        let ti = trains.parse_train_iteration("Ockham GA").unwrap();
        let modules = ti.module_iterations(&projects).unwrap();

        assert_eq!(modules.len(), ti.train().modules().len());
        assert_eq!(modules[0].project_key().as_str(), BUILD);
        let positions: Vec<usize> = modules
            .iter()
            .map(|m| projects.build_position(m.project_key().as_str()).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(modules.iter().all(|m| m.project_key().as_str() != "solr"));

        let without_build = ti.module_iterations_without_build(&projects).unwrap();
        assert_eq!(without_build.len(), modules.len() - 1);
    }

    #[test]
    fn test_module_not_in_train() {
        let projects = Projects::standard().unwrap();
        let trains = ReleaseTrains::standard().unwrap();
        let ti = trains.parse_train_iteration("Moore GA").unwrap();
        let r2dbc = projects.require("r2dbc").unwrap();
        assert!(matches!(
            ti.module(r2dbc),
            Err(TrainError::ModuleNotInTrain { .. })
        ));
    }

    #[test]
    fn test_branch_derivation() {
        let projects = Projects::standard().unwrap();
        let trains = ReleaseTrains::standard().unwrap();
        let commons = projects.require("commons").unwrap();

        let ga = trains.parse_train_iteration("Ockham GA").unwrap();
        assert_eq!(ga.module(commons).unwrap().branch(), Branch::MAIN);

        let sr = trains.parse_train_iteration("Ockham SR3").unwrap();
        let branch = sr.module(commons).unwrap().branch();
        assert_eq!(branch.name(), "2.4.x");
        assert!(branch.is_service_release_branch());

        let forced = Arc::new(ga.train().with_always_use_branch(true));
        let forced_ga = TrainIteration::new(forced, Iteration::GA);
        assert_eq!(forced_ga.module(commons).unwrap().branch().name(), "2.4.x");

        let commercial = Arc::new(ga.train().with_support_status(SupportStatus::Commercial));
        let commercial_ga = TrainIteration::new(commercial, Iteration::GA);
        let module = commercial_ga.module(commons).unwrap();
        assert!(module.is_commercial());
        assert_eq!(module.branch().name(), "2.4.x");
    }

    #[test]
    fn test_registry_lookup_by_name_and_calver() {
        let trains = ReleaseTrains::standard().unwrap();
        assert_eq!(trains.get("ockham").unwrap().name(), "Ockham");
        assert_eq!(trains.get("2022.0").unwrap().name(), "Turing");
        assert!(trains.get("Zeta").is_none());
        assert!(matches!(trains.require("Zeta"), Err(TrainError::UnknownTrain { .. })));
        assert_eq!(trains.latest().unwrap().name(), "Ullman");
    }

    #[test]
    fn test_duplicate_train_names_are_rejected() {
        let result = ReleaseTrains::new([root(), root()]);
        assert!(matches!(result, Err(TrainError::DuplicateTrain { .. })));
    }

    #[test]
    fn test_duplicate_calendar_versions_are_rejected() {
        let alpha = root().with_calver("2021.0").unwrap();
        let beta = alpha
            .next("Beta", Transition::Minor, [])
            .with_calver("2021.0")
            .unwrap();

        match ReleaseTrains::new([alpha, beta]) {
            Err(TrainError::DuplicateTrain { name }) => assert_eq!(name, "2021.0"),
            other => panic!("expected DuplicateTrain, got {other:?}"),
        }
    }

    #[test]
    fn test_calendar_version_colliding_with_a_train_name_is_rejected() {
        let alpha = Train::new("2021.0", [module(BUILD, "1.0")]);
        let beta = root().with_calver("2021.0").unwrap();
        assert!(matches!(
            ReleaseTrains::new([alpha, beta]),
            Err(TrainError::DuplicateTrain { .. })
        ));
    }

    #[test]
    fn test_previous_iteration_of_unregistered_train_is_unknown() {
        let trains = ReleaseTrains::standard().unwrap();
        let zeta = Arc::new(Train::new("Zeta", [module(BUILD, "1.0")]));
        let ti = TrainIteration::new(zeta, Iteration::Milestone(1));

        match trains.previous_iteration(&ti) {
            Err(TrainError::UnknownTrain { name }) => assert_eq!(name, "Zeta"),
            other => panic!("expected UnknownTrain, got {other:?}"),
        }
    }

    #[test]
    fn test_previous_iteration_within_and_across_trains() {
        let trains = ReleaseTrains::standard().unwrap();

        let rc1 = trains.parse_train_iteration("Neumann RC1").unwrap();
        let previous = trains.previous_iteration(&rc1).unwrap();
        assert_eq!(previous.to_string(), "Neumann M3");

        let m1 = trains.parse_train_iteration("Neumann M1").unwrap();
        let previous = trains.previous_iteration(&m1).unwrap();
        assert_eq!(previous.to_string(), "Moore GA");
    }

    #[test]
    fn test_previous_iteration_of_first_iteration_of_first_train_fails() {
        let trains = ReleaseTrains::standard().unwrap();
        let first = trains.parse_train_iteration("Moore M1").unwrap();
        assert!(matches!(
            trains.previous_iteration(&first),
            Err(TrainError::NoPreviousIteration { .. })
        ));
    }

    #[test]
    fn test_parse_calver_train_iterations() {
        let trains = ReleaseTrains::standard().unwrap();

        let ga = trains.parse_train_iteration("2021.0.0").unwrap();
        assert_eq!(ga.train().name(), "Pascal");
        assert_eq!(ga.iteration(), Iteration::GA);

        let sr = trains.parse_train_iteration("2021.1.3").unwrap();
        assert_eq!(sr.to_string(), "Q SR3");

        let m1 = trains.parse_train_iteration("2022.0.0-M1").unwrap();
        assert_eq!(m1.to_string(), "Turing M1");
    }

    #[test]
    fn test_parse_rejects_malformed_and_unknown_descriptors() {
        let trains = ReleaseTrains::standard().unwrap();
        assert!(matches!(
            trains.parse_train_iteration("Ockham"),
            Err(TrainError::InvalidTrainIteration { .. })
        ));
        assert!(matches!(
            trains.parse_train_iteration("Zeta GA"),
            Err(TrainError::UnknownTrain { .. })
        ));
        assert!(matches!(
            trains.parse_train_iteration("Ockham M9"),
            Err(TrainError::UnknownIteration { .. })
        ));
        assert!(trains.parse_train_iteration("2021.0.1-M1").is_err());
    }
}

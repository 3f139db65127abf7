//! Project definitions, the static project registry and build ordering.
//!
//! Each [`Project`] declares its direct dependencies. The registry computes
//! one deterministic build order at construction time: edges run
//! `dependent → dependency`, Kahn's algorithm yields dependents before their
//! dependencies, and the reversed sequence is the dependency-first order used
//! everywhere else. A cycle in the declared edges fails construction.

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TrainError, TrainResult};

/// Key of the shared parent project every module inherits its build setup from.
pub const BUILD: &str = "build";

/// Stable identifier of a project, e.g. `"commons"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectKey(String);

impl ProjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProjectKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Issue tracker a project files its release tickets in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tracker {
    Jira,
    #[default]
    GitHub,
}

/// Maven-style coordinates of an extra artifact a project publishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
}

impl ArtifactCoordinate {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }
}

/// A buildable module of the product family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    key: ProjectKey,
    name: String,
    dependencies: Vec<ProjectKey>,
    tracker: Tracker,
    additional_artifacts: Vec<ArtifactCoordinate>,
    skip_tests: bool,
}

impl Project {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: ProjectKey::new(key),
            name: name.into(),
            dependencies: Vec::new(),
            tracker: Tracker::default(),
            additional_artifacts: Vec::new(),
            skip_tests: false,
        }
    }

    /// Same project with the given direct dependencies.
    pub fn with_dependencies<I, K>(&self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ProjectKey>,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    pub fn with_tracker(&self, tracker: Tracker) -> Self {
        Self {
            tracker,
            ..self.clone()
        }
    }

    pub fn with_additional_artifacts(
        &self,
        artifacts: impl IntoIterator<Item = ArtifactCoordinate>,
    ) -> Self {
        Self {
            additional_artifacts: artifacts.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn with_skip_tests(&self, skip_tests: bool) -> Self {
        Self {
            skip_tests,
            ..self.clone()
        }
    }

    pub fn key(&self) -> &ProjectKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct dependencies as declared.
    pub fn dependencies(&self) -> &[ProjectKey] {
        &self.dependencies
    }

    pub fn tracker(&self) -> Tracker {
        self.tracker
    }

    pub fn additional_artifacts(&self) -> &[ArtifactCoordinate] {
        &self.additional_artifacts
    }

    pub fn skip_tests(&self) -> bool {
        self.skip_tests
    }

    pub fn is_build(&self) -> bool {
        self.key.as_str() == BUILD
    }
}

/// Compute the dependency-first build order of `projects`.
///
/// Fails with [`TrainError::DependencyCycle`] when the declared edges are cyclic;
/// no partial order is returned in that case.
pub fn compute_build_order(projects: &[Project]) -> TrainResult<Vec<ProjectKey>> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(projects.len());
    for (idx, project) in projects.iter().enumerate() {
        if position.insert(project.key.as_str(), idx).is_some() {
            return Err(TrainError::DuplicateProject {
                project: project.key.to_string(),
            });
        }
    }

    // in_degree counts incoming `dependent → dependency` edges, i.e. dependents.
    let mut in_degree = vec![0usize; projects.len()];
    for project in projects {
        for dependency in &project.dependencies {
            let idx = *position.get(dependency.as_str()).ok_or_else(|| {
                TrainError::UnknownDependency {
                    project: project.key.to_string(),
                    dependency: dependency.to_string(),
                }
            })?;
            in_degree[idx] += 1;
        }
    }

    // Seed in reverse declaration order so the reversed result stays close to
    // declaration order.
    let mut queue: VecDeque<usize> = (0..projects.len())
        .rev()
        .filter(|&idx| in_degree[idx] == 0)
        .collect();
    let mut dependents_first = Vec::with_capacity(projects.len());

    while let Some(idx) = queue.pop_front() {
        dependents_first.push(idx);
        for dependency in projects[idx].dependencies.iter().rev() {
            let dep_idx = position[dependency.as_str()];
            in_degree[dep_idx] -= 1;
            if in_degree[dep_idx] == 0 {
                queue.push_back(dep_idx);
            }
        }
    }

    if dependents_first.len() != projects.len() {
        let involved = (0..projects.len())
            .filter(|&idx| in_degree[idx] > 0)
            .map(|idx| projects[idx].key.to_string())
            .collect();
        return Err(TrainError::DependencyCycle { projects: involved });
    }

    Ok(dependents_first
        .into_iter()
        .rev()
        .map(|idx| projects[idx].key.clone())
        .collect())
}

/// Immutable registry of every known project, held in build order.
#[derive(Debug, Clone)]
pub struct Projects {
    /// Projects in dependency-first build order.
    projects: Vec<Arc<Project>>,
    /// Key → position in `projects`.
    index: HashMap<ProjectKey, usize>,
}

impl Projects {
    /// Validate the declarations and compute the build order.
    pub fn new(projects: Vec<Project>) -> TrainResult<Self> {
        let order = compute_build_order(&projects)?;
        let mut by_key: HashMap<ProjectKey, Project> = projects
            .into_iter()
            .map(|project| (project.key.clone(), project))
            .collect();

        let projects: Vec<Arc<Project>> = order
            .iter()
            .filter_map(|key| by_key.remove(key))
            .map(Arc::new)
            .collect();
        let index = projects
            .iter()
            .enumerate()
            .map(|(idx, project)| (project.key.clone(), idx))
            .collect();

        debug!(build_order = ?order, "computed project build order");
        Ok(Self { projects, index })
    }

    /// The product family as released by the standard trains.
    pub fn standard() -> TrainResult<Self> {
        const GROUP: &str = "org.springframework.data";
        let project = |key: &str, name: &str| Project::new(key, name);

        Self::new(vec![
            project(BUILD, "Build").with_tracker(Tracker::Jira),
            project("commons", "Commons").with_dependencies([BUILD]),
            project("jpa", "JPA")
                .with_dependencies(["commons"])
                .with_additional_artifacts([ArtifactCoordinate::new(GROUP, "spring-data-envers")]),
            project("mongodb", "MongoDB").with_dependencies(["commons"]),
            project("neo4j", "Neo4j").with_dependencies(["commons"]),
            project("solr", "Solr")
                .with_dependencies(["commons"])
                .with_tracker(Tracker::Jira),
            project("couchbase", "Couchbase").with_dependencies(["commons"]),
            project("cassandra", "Cassandra").with_dependencies(["commons"]),
            project("elasticsearch", "Elasticsearch").with_dependencies(["commons"]),
            project("keyvalue", "KeyValue").with_dependencies(["commons"]),
            project("redis", "Redis").with_dependencies(["keyvalue"]),
            project("jdbc", "JDBC")
                .with_dependencies(["commons"])
                .with_additional_artifacts([ArtifactCoordinate::new(
                    GROUP,
                    "spring-data-relational",
                )]),
            project("r2dbc", "R2DBC").with_dependencies(["jdbc"]),
            project("ldap", "LDAP").with_dependencies(["commons"]),
            project("geode", "Geode")
                .with_dependencies(["commons"])
                .with_skip_tests(true),
            project("envers", "Envers").with_dependencies(["jpa"]),
            project("rest", "REST").with_dependencies([
                "jpa",
                "mongodb",
                "neo4j",
                "cassandra",
                "keyvalue",
            ]),
            project("bom", "BOM").with_dependencies([
                "commons",
                "jpa",
                "mongodb",
                "neo4j",
                "couchbase",
                "cassandra",
                "elasticsearch",
                "redis",
                "jdbc",
                "r2dbc",
                "ldap",
                "rest",
            ]),
        ])
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Project>> {
        self.index.get(key).map(|&idx| &self.projects[idx])
    }

    /// Like [`Projects::get`], but a missing project is an error.
    pub fn require(&self, key: &str) -> TrainResult<&Arc<Project>> {
        self.get(key).ok_or_else(|| TrainError::UnknownProject {
            project: key.to_string(),
        })
    }

    /// Projects in dependency-first build order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Project>> {
        self.projects.iter()
    }

    pub fn build_order(&self) -> Vec<&ProjectKey> {
        self.projects.iter().map(|p| &p.key).collect()
    }

    /// Position of `key` in the build order; the canonical sort key for projects.
    pub fn build_position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Transitive closure of the declared dependencies of `key`.
    pub fn get_dependencies(&self, key: &str) -> TrainResult<BTreeSet<ProjectKey>> {
        let root = self.require(key)?;
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&ProjectKey> = root.dependencies.iter().collect();

        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                if let Some(project) = self.get(next.as_str()) {
                    stack.extend(project.dependencies.iter());
                }
            }
        }
        Ok(seen)
    }

    /// `true` when `dependent` depends on `dependency`, directly or transitively.
    pub fn depends_on(&self, dependent: &str, dependency: &str) -> bool {
        self.get_dependencies(dependent)
            .map(|deps| deps.contains(dependency))
            .unwrap_or(false)
    }

    /// Sort `items` by the build position of the project `key_of` extracts.
    /// Unknown projects sort last, keeping their relative order.
    pub fn sort_by_build_order<T, F>(&self, items: &mut [T], key_of: F)
    where
        F: Fn(&T) -> &str,
    {
        items.sort_by_key(|item| self.build_position(key_of(item)).unwrap_or(usize::MAX));
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(order: &[ProjectKey]) -> Vec<&str> {
        order.iter().map(ProjectKey::as_str).collect()
    }

    fn index_of(order: &[ProjectKey], key: &str) -> usize {
        order.iter().position(|k| k.as_str() == key).unwrap()
    }

    #[test]
    fn test_build_order_places_dependencies_first() {
        let projects = vec![
            Project::new("app", "App").with_dependencies(["lib"]),
            Project::new("lib", "Lib").with_dependencies(["core"]),
            Project::new("core", "Core"),
        ];
        let order = compute_build_order(&projects).unwrap();
        assert_eq!(keys(&order), vec!["core", "lib", "app"]);
    }

    #[test]
    fn test_build_order_is_deterministic_and_keeps_declaration_order_for_siblings() {
        let projects = vec![
            Project::new("base", "Base"),
            Project::new("a", "A").with_dependencies(["base"]),
            Project::new("b", "B").with_dependencies(["base"]),
            Project::new("c", "C").with_dependencies(["base"]),
        ];
        let first = compute_build_order(&projects).unwrap();
        let second = compute_build_order(&projects).unwrap();
        assert_eq!(first, second);
        assert_eq!(keys(&first), vec!["base", "a", "b", "c"]);
    }

    #[test]
    fn test_diamond_respects_every_edge() {
        let projects = vec![
            Project::new("top", "Top").with_dependencies(["left", "right"]),
            Project::new("left", "Left").with_dependencies(["bottom"]),
            Project::new("right", "Right").with_dependencies(["bottom"]),
            Project::new("bottom", "Bottom"),
        ];
        let order = compute_build_order(&projects).unwrap();
        assert!(index_of(&order, "bottom") < index_of(&order, "left"));
        assert!(index_of(&order, "bottom") < index_of(&order, "right"));
        assert!(index_of(&order, "left") < index_of(&order, "top"));
        assert!(index_of(&order, "right") < index_of(&order, "top"));
    }

    #[test]
    fn test_mutual_dependency_is_rejected() {
        let projects = vec![
            Project::new("a", "A").with_dependencies(["b"]),
            Project::new("b", "B").with_dependencies(["a"]),
        ];
        match compute_build_order(&projects) {
            Err(TrainError::DependencyCycle { projects }) => {
                assert!(projects.contains(&"a".to_string()));
                assert!(projects.contains(&"b".to_string()));
            }
            other => panic!("expected a cycle error, got {other:?}"),
        }
        assert!(Projects::new(vec![
            Project::new("a", "A").with_dependencies(["b"]),
            Project::new("b", "B").with_dependencies(["a"]),
        ])
        .is_err());
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let projects = vec![Project::new("a", "A").with_dependencies(["a"])];
        assert!(matches!(
            compute_build_order(&projects),
            Err(TrainError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn test_unknown_dependency_and_duplicate_key_are_rejected() {
        let unknown = vec![Project::new("a", "A").with_dependencies(["ghost"])];
        assert!(matches!(
            compute_build_order(&unknown),
            Err(TrainError::UnknownDependency { .. })
        ));

        let duplicate = vec![Project::new("a", "A"), Project::new("a", "Again")];
        assert!(matches!(
            compute_build_order(&duplicate),
            Err(TrainError::DuplicateProject { .. })
        ));
    }

    #[test]
    fn test_transitive_dependencies_are_deduplicated() {
        let projects = Projects::standard().unwrap();
        let deps = projects.get_dependencies("rest").unwrap();
        assert!(deps.contains("commons"));
        assert!(deps.contains(BUILD));
        assert!(deps.contains("keyvalue"));
        assert!(!deps.contains("rest"));
        assert_eq!(deps.iter().filter(|k| k.as_str() == "commons").count(), 1);
        assert!(projects.get_dependencies("nope").is_err());
    }

    #[test]
    fn test_standard_registry_order_respects_transitive_dependencies() {
        let projects = Projects::standard().unwrap();
        for project in projects.iter() {
            let position = projects.build_position(project.key().as_str()).unwrap();
            for dependency in projects.get_dependencies(project.key().as_str()).unwrap() {
                let dep_position = projects.build_position(dependency.as_str()).unwrap();
                assert!(
                    dep_position < position,
                    "{dependency} must build before {}",
                    project.key()
                );
            }
        }
        assert_eq!(projects.build_order()[0].as_str(), BUILD);
    }

    #[test]
    fn test_sort_by_build_order() {
        let projects = Projects::standard().unwrap();
        let mut items = vec!["rest", "unknown", "redis", "commons", BUILD];
        projects.sort_by_build_order(&mut items, |k| *k);
        assert_eq!(items[0], BUILD);
        assert_eq!(items[1], "commons");
        assert_eq!(*items.last().unwrap(), "unknown");
        assert!(projects.depends_on("redis", "commons"));
        assert!(!projects.depends_on("commons", "redis"));
    }
}

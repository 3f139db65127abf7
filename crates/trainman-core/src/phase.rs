//! Release phases and the versions each phase writes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TrainError, TrainResult};
use crate::project::{Project, BUILD};
use crate::train::TrainIteration;
use crate::version::{ArtifactVersion, VersionFormat};

/// Stage of the release lifecycle a version update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Set the exact release versions before building a release.
    Prepare,
    /// Move back to development snapshots after a release.
    Cleanup,
    /// Move a maintenance line to its next bugfix snapshot.
    Maintenance,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Prepare, Phase::Cleanup, Phase::Maintenance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Cleanup => "cleanup",
            Phase::Maintenance => "maintenance",
        }
    }

    /// Apply this phase to the version an iteration releases.
    ///
    /// Previews have no next development or bugfix version of their own, so
    /// after a milestone or release candidate both cleanup phases return to the
    /// snapshot of the same version.
    pub fn apply(&self, release: &ArtifactVersion) -> ArtifactVersion {
        match self {
            Phase::Prepare => release.clone(),
            Phase::Cleanup | Phase::Maintenance if release.is_preview() => {
                release.snapshot_version()
            }
            Phase::Cleanup => release.next_development_version(),
            Phase::Maintenance => release.next_bugfix_version(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepare" => Ok(Phase::Prepare),
            "cleanup" => Ok(Phase::Cleanup),
            "maintenance" => Ok(Phase::Maintenance),
            _ => Err(TrainError::UnknownPhase {
                value: s.to_string(),
            }),
        }
    }
}

/// Versions to write for one train iteration in one phase.
#[derive(Debug, Clone)]
pub struct UpdateInformation {
    train_iteration: TrainIteration,
    phase: Phase,
}

impl UpdateInformation {
    pub fn of(train_iteration: TrainIteration, phase: Phase) -> Self {
        Self {
            train_iteration,
            phase,
        }
    }

    pub fn train_iteration(&self) -> &TrainIteration {
        &self.train_iteration
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Version to write into `project`'s own build descriptor.
    pub fn project_version_to_set(&self, project: &Project) -> TrainResult<ArtifactVersion> {
        self.version_for(project.key().as_str())
    }

    /// Version of the shared parent project every module inherits from.
    pub fn parent_version_to_set(&self) -> TrainResult<ArtifactVersion> {
        self.version_for(BUILD)
    }

    fn version_for(&self, key: &str) -> TrainResult<ArtifactVersion> {
        let train = self.train_iteration.train();
        let module = train.module(key).ok_or_else(|| TrainError::ModuleNotInTrain {
            train: train.name().to_string(),
            project: key.to_string(),
        })?;
        let release = ArtifactVersion::from_iteration(
            module.version(),
            self.train_iteration.iteration(),
            train.version_format(),
        );
        Ok(self.phase.apply(&release))
    }

    /// Version of the release train itself, as written into the BOM.
    ///
    /// Calendar-versioned trains use their calendar version in the modifier
    /// grammar (`2021.0.2`, `2022.0.0-M1`, `2021.1.0-SNAPSHOT`). Named trains
    /// use `<Name>-RELEASE` for GA, `<Name>-<Iteration>` for any other
    /// iteration, and `<Name>-BUILD-SNAPSHOT` after a release.
    pub fn release_train_version(&self) -> String {
        let train = self.train_iteration.train();
        let iteration = self.train_iteration.iteration();

        if let Some(calver) = train.calver() {
            let release = ArtifactVersion::from_iteration(calver, iteration, VersionFormat::Modifier);
            return self.phase.apply(&release).to_string();
        }

        match self.phase {
            Phase::Prepare if iteration.is_ga() => format!("{}-RELEASE", train.name()),
            Phase::Prepare => format!("{}-{iteration}", train.name()),
            Phase::Cleanup | Phase::Maintenance => format!("{}-BUILD-SNAPSHOT", train.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Projects;
    use crate::train::ReleaseTrains;

    fn update(descriptor: &str, phase: Phase) -> UpdateInformation {
        let trains = ReleaseTrains::standard().unwrap();
        UpdateInformation::of(trains.parse_train_iteration(descriptor).unwrap(), phase)
    }

    fn project_version(descriptor: &str, phase: Phase, project: &str) -> String {
        let projects = Projects::standard().unwrap();
        update(descriptor, phase)
            .project_version_to_set(projects.require(project).unwrap())
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_phase_parsing_is_closed() {
        assert_eq!("prepare".parse::<Phase>().unwrap(), Phase::Prepare);
        assert_eq!("CLEANUP".parse::<Phase>().unwrap(), Phase::Cleanup);
        assert_eq!(" Maintenance ".parse::<Phase>().unwrap(), Phase::Maintenance);
        for bad in ["", "release", "prepared"] {
            assert!(matches!(
                bad.parse::<Phase>(),
                Err(TrainError::UnknownPhase { .. })
            ));
        }
    }

    #[test]
    fn test_commons_ga_phase_table() {
        assert_eq!(project_version("Ockham GA", Phase::Prepare, "commons"), "2.4.0.RELEASE");
        assert_eq!(
            project_version("Ockham GA", Phase::Cleanup, "commons"),
            "2.5.0.BUILD-SNAPSHOT"
        );
        assert_eq!(
            project_version("Ockham GA", Phase::Maintenance, "commons"),
            "2.4.1.BUILD-SNAPSHOT"
        );
    }

    #[test]
    fn test_service_release_cleanup_moves_to_next_bugfix() {
        assert_eq!(project_version("Ockham SR3", Phase::Prepare, "jpa"), "2.4.3.RELEASE");
        assert_eq!(
            project_version("Ockham SR3", Phase::Cleanup, "jpa"),
            "2.4.4.BUILD-SNAPSHOT"
        );
    }

    #[test]
    fn test_preview_cleanup_returns_to_snapshot() {
        assert_eq!(project_version("Ockham RC1", Phase::Prepare, "commons"), "2.4.0.RC1");
        assert_eq!(
            project_version("Ockham RC1", Phase::Cleanup, "commons"),
            "2.4.0.BUILD-SNAPSHOT"
        );
        assert_eq!(
            project_version("2021.0.0-M2", Phase::Maintenance, "commons"),
            "2.5.0-SNAPSHOT"
        );
    }

    #[test]
    fn test_parent_version_follows_build_module() {
        let info = update("Ockham SR1", Phase::Prepare);
        assert_eq!(info.parent_version_to_set().unwrap().to_string(), "2.4.1.RELEASE");
        let info = update("2021.0.0", Phase::Cleanup);
        assert_eq!(info.parent_version_to_set().unwrap().to_string(), "2.6.0-SNAPSHOT");
    }

    #[test]
    fn test_project_outside_train_is_an_error() {
        let projects = Projects::standard().unwrap();
        let info = update("Ockham GA", Phase::Prepare);
        let solr = projects.require("solr").unwrap();
        assert!(matches!(
            info.project_version_to_set(solr),
            Err(TrainError::ModuleNotInTrain { .. })
        ));
    }

    #[test]
    fn test_named_train_versions() {
        assert_eq!(update("Ockham GA", Phase::Prepare).release_train_version(), "Ockham-RELEASE");
        assert_eq!(update("Ockham SR2", Phase::Prepare).release_train_version(), "Ockham-SR2");
        assert_eq!(update("Ockham M1", Phase::Prepare).release_train_version(), "Ockham-M1");
        assert_eq!(
            update("Ockham GA", Phase::Cleanup).release_train_version(),
            "Ockham-BUILD-SNAPSHOT"
        );
        assert_eq!(
            update("Ockham SR2", Phase::Maintenance).release_train_version(),
            "Ockham-BUILD-SNAPSHOT"
        );
    }

    #[test]
    fn test_calver_train_versions() {
        assert_eq!(update("2021.0.0", Phase::Prepare).release_train_version(), "2021.0.0");
        assert_eq!(update("2021.0.2", Phase::Prepare).release_train_version(), "2021.0.2");
        assert_eq!(update("2022.0.0-M1", Phase::Prepare).release_train_version(), "2022.0.0-M1");
        assert_eq!(
            update("2021.0.0", Phase::Cleanup).release_train_version(),
            "2021.1.0-SNAPSHOT"
        );
        assert_eq!(
            update("2021.0.0", Phase::Maintenance).release_train_version(),
            "2021.0.1-SNAPSHOT"
        );
        assert_eq!(
            update("2021.0.2", Phase::Cleanup).release_train_version(),
            "2021.0.3-SNAPSHOT"
        );
        assert_eq!(
            update("2022.0.0-RC1", Phase::Cleanup).release_train_version(),
            "2022.0.0-SNAPSHOT"
        );
    }
}

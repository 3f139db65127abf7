//! SCM branch names derived from module state.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::train::ModuleIteration;
use crate::version::Version;

static SERVICE_RELEASE_BRANCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.x$").expect("branch pattern is valid"));

/// A source-control branch, compared by normalised name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Branch {
    name: Cow<'static, str>,
}

impl Branch {
    /// The mainline development branch.
    pub const MAIN: Branch = Branch {
        name: Cow::Borrowed("main"),
    };

    /// Branch from a raw name; a leading `refs/heads/` is dropped.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        let name = name.strip_prefix("refs/heads/").unwrap_or(name);
        if name == Self::MAIN.name {
            return Self::MAIN;
        }
        Self {
            name: Cow::Owned(name.to_string()),
        }
    }

    /// Maintenance branch of a version line, `"<major>.<minor>.x"`.
    pub fn from_version(version: &Version) -> Self {
        Self {
            name: Cow::Owned(format!("{}.{}.x", version.major(), version.minor())),
        }
    }

    /// Branch a module is released from.
    ///
    /// Mainline iterations build from [`Branch::MAIN`]. Service releases,
    /// commercial modules and trains that always branch build from the
    /// module's `<major>.<minor>.x` line.
    pub fn for_module(module: &ModuleIteration) -> Self {
        if module.iteration().is_service_iteration()
            || module.train().always_use_branch()
            || module.is_commercial()
        {
            Self::from_version(&module.module().version())
        } else {
            Self::MAIN
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_main(&self) -> bool {
        *self == Self::MAIN
    }

    /// `true` for exactly the `<digits>.<digits>.x` shape.
    pub fn is_service_release_branch(&self) -> bool {
        SERVICE_RELEASE_BRANCH.is_match(&self.name)
    }

    /// Remote-tracking form, `"<remote>/<name>"`. Already-prefixed names are kept.
    pub fn with_remote(&self, remote: &str) -> Self {
        let prefix = format!("{remote}/");
        if self.name.starts_with(&prefix) {
            return self.clone();
        }
        Self {
            name: Cow::Owned(format!("{prefix}{}", self.name)),
        }
    }
}

impl From<&ModuleIteration> for Branch {
    fn from(module: &ModuleIteration) -> Self {
        Self::for_module(module)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_is_normalised_to_the_singleton() {
        assert_eq!(Branch::from_name("main"), Branch::MAIN);
        assert_eq!(Branch::from_name("refs/heads/main"), Branch::MAIN);
        assert!(Branch::from_name(" main ").is_main());
    }

    #[test]
    fn test_from_version_builds_service_release_branch() {
        let branch = Branch::from_version(&Version::new(3, 2, 7));
        assert_eq!(branch.name(), "3.2.x");
        assert!(branch.is_service_release_branch());
        assert!(!branch.is_main());
    }

    #[test]
    fn test_service_release_shape_is_exact() {
        for name in ["3.2.x", "10.15.x"] {
            assert!(Branch::from_name(name).is_service_release_branch(), "{name}");
        }
        for name in ["main", "3.2", "3.x", "3.2.x-backport", "origin/3.2.x", "v3.2.x"] {
            assert!(!Branch::from_name(name).is_service_release_branch(), "{name}");
        }
    }

    #[test]
    fn test_with_remote_is_idempotent() {
        let remote = Branch::from_name("3.2.x").with_remote("origin");
        assert_eq!(remote.name(), "origin/3.2.x");
        assert_eq!(remote.with_remote("origin"), remote);
        assert_eq!(
            remote.with_remote("upstream").name(),
            "upstream/origin/3.2.x"
        );
        assert_eq!(Branch::MAIN.with_remote("origin").name(), "origin/main");
    }
}

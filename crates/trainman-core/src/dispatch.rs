//! Predicate-based selection of per-project collaborators.
//!
//! A [`PluginRegistry`] holds ordered `(name, predicate, implementation)`
//! entries. Resolution is first-match-wins; a project nothing supports is an
//! explicit [`TrainError::NoMatchingPlugin`].

use std::fmt;

use crate::error::{TrainError, TrainResult};
use crate::project::{Project, Tracker};

type Predicate = Box<dyn Fn(&Project) -> bool + Send + Sync>;

struct Entry<T> {
    name: String,
    supports: Predicate,
    plugin: T,
}

/// An ordered set of plugins evaluated first-match-wins.
pub struct PluginRegistry<T> {
    entries: Vec<Entry<T>>,
}

impl<T> PluginRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a plugin (builder pattern). Earlier plugins take precedence.
    pub fn with_plugin<P>(mut self, name: impl Into<String>, supports: P, plugin: T) -> Self
    where
        P: Fn(&Project) -> bool + Send + Sync + 'static,
    {
        self.entries.push(Entry {
            name: name.into(),
            supports: Box::new(supports),
            plugin,
        });
        self
    }

    /// Append a plugin that handles every project on `tracker`.
    pub fn with_tracker_plugin(self, name: impl Into<String>, tracker: Tracker, plugin: T) -> Self {
        self.with_plugin(name, move |project| project.tracker() == tracker, plugin)
    }

    /// The first plugin supporting `project`.
    pub fn resolve(&self, project: &Project) -> TrainResult<&T> {
        self.resolve_named(project).map(|(_, plugin)| plugin)
    }

    /// Like [`PluginRegistry::resolve`], also returning the plugin's name.
    pub fn resolve_named(&self, project: &Project) -> TrainResult<(&str, &T)> {
        self.entries
            .iter()
            .find(|entry| (entry.supports)(project))
            .map(|entry| (entry.name.as_str(), &entry.plugin))
            .ok_or_else(|| TrainError::NoMatchingPlugin {
                subject: format!("project {}", project.key()),
            })
    }

    /// Plugin names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for PluginRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PluginRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

//! YAML task catalog.
//!
//! ```yaml
//! tasks:
//!   - name: crawl_collections:make_autocomplete
//!     command: bin/rake
//!     args: ["crawl_collections:make_autocomplete[{args}]"]
//!     working_dir: /srv/app
//!     env:
//!       RAILS_ENV: production
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{CommandTask, TaskError, TaskLoader, TaskRegistry};

#[derive(Debug, Clone, Deserialize)]
pub struct TaskCatalog {
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl TaskCatalog {
    /// Parse and validate a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::CatalogParse`] for malformed YAML and
    /// [`TaskError::InvalidCatalog`] for empty or duplicate names and empty
    /// commands.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TaskError> {
        let catalog: TaskCatalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read, parse and validate a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::CatalogIo`] if the file cannot be read, plus the
    /// errors of [`TaskCatalog::from_yaml_str`].
    pub fn from_path(path: &Path) -> Result<Self, TaskError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| TaskError::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> Result<(), TaskError> {
        let mut seen = HashSet::new();
        for def in &self.tasks {
            let name = def.name.trim();
            if name.is_empty() {
                return Err(TaskError::InvalidCatalog(
                    "task name must not be empty".to_string(),
                ));
            }
            if def.command.trim().is_empty() {
                return Err(TaskError::InvalidCatalog(format!(
                    "task {name} has an empty command"
                )));
            }
            if !seen.insert(name) {
                return Err(TaskError::InvalidCatalog(format!(
                    "task {name} is defined more than once"
                )));
            }
        }
        Ok(())
    }

    /// Turn every definition into a [`CommandTask`] in a fresh registry.
    #[must_use]
    pub fn into_registry(self) -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        for def in self.tasks {
            let task = CommandTask {
                program: def.command,
                args: def.args,
                working_dir: def.working_dir,
                env: def.env,
            };
            registry.register(def.name.trim().to_string(), task);
        }
        registry
    }
}

/// Loads the task registry from a catalog file on every call.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    path: PathBuf,
}

impl CatalogLoader {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskLoader for CatalogLoader {
    fn load(&self) -> Result<TaskRegistry, TaskError> {
        let registry = TaskCatalog::from_path(&self.path)?.into_registry();
        tracing::debug!(
            path = %self.path.display(),
            tasks = registry.len(),
            "loaded task catalog"
        );
        Ok(registry)
    }
}

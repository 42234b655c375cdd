//! Task registry: named batch tasks with a run-once marker.
//!
//! The registry maps task names (e.g. `crawl_collections:make_autocomplete`)
//! to handlers. Each task runs at most once until it is re-enabled, so a
//! caller that wants a fresh run per argument must call
//! [`TaskRegistry::reenable`] before every [`TaskRegistry::invoke`].
//!
//! # Example
//!
//! ```ignore
//! let mut registry = TaskRegistry::new();
//! registry.register_fn("crawl_collections:make_autocomplete", |args| async move {
//!     rebuild_autocomplete(&args[0]).await
//! });
//!
//! registry.reenable("crawl_collections:make_autocomplete")?;
//! registry.invoke("crawl_collections:make_autocomplete", &["42".to_string()]).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::TaskError;

/// Something that can run a task with string arguments.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<(), TaskError>;
}

/// Adapter turning an async closure into a [`TaskHandler`].
struct FnTask<F>(F);

#[async_trait]
impl<F, Fut> TaskHandler for FnTask<F>
where
    F: Fn(Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    async fn run(&self, args: &[String]) -> Result<(), TaskError> {
        (self.0)(args.to_vec()).await
    }
}

/// Source of task definitions, consulted once per startup.
pub trait TaskLoader: Send + Sync {
    /// Build a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] if the definitions cannot be loaded.
    fn load(&self) -> Result<TaskRegistry, TaskError>;
}

impl<F> TaskLoader for F
where
    F: Fn() -> Result<TaskRegistry, TaskError> + Send + Sync,
{
    fn load(&self) -> Result<TaskRegistry, TaskError> {
        self()
    }
}

/// Result of a successful [`TaskRegistry::invoke`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// The handler ran and returned `Ok`.
    Ran,
    /// The task had already been invoked and was not re-enabled; nothing ran.
    AlreadyInvoked,
}

struct TaskEntry {
    handler: Arc<dyn TaskHandler>,
    already_invoked: bool,
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskEntry>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`, replacing any previous one.
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: TaskHandler + 'static,
    {
        self.tasks.insert(
            name.into(),
            TaskEntry {
                handler: Arc::new(handler),
                already_invoked: false,
            },
        );
    }

    /// Register an async closure as a task.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.register(name, FnTask(handler));
    }

    /// Clear the run-once marker so the next `invoke` runs the handler again.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownTask`] if `name` is not registered.
    pub fn reenable(&mut self, name: &str) -> Result<(), TaskError> {
        let entry = self
            .tasks
            .get_mut(name)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;
        entry.already_invoked = false;
        Ok(())
    }

    /// Run the task unless it has already been invoked.
    ///
    /// The marker is set before the handler runs, so a failed run still
    /// counts as invoked.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownTask`] for an unregistered name, or the
    /// handler's own error.
    pub async fn invoke(&mut self, name: &str, args: &[String]) -> Result<Invocation, TaskError> {
        let entry = self
            .tasks
            .get_mut(name)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;

        if entry.already_invoked {
            tracing::debug!(task = name, "task already invoked; skipping");
            return Ok(Invocation::AlreadyInvoked);
        }
        entry.already_invoked = true;
        let handler = Arc::clone(&entry.handler);

        handler.run(args).await?;
        Ok(Invocation::Ran)
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Whether `name` has been invoked since it was registered or last re-enabled.
    #[must_use]
    pub fn has_run(&self, name: &str) -> bool {
        self.tasks.get(name).is_some_and(|e| e.already_invoked)
    }

    /// Registered task names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

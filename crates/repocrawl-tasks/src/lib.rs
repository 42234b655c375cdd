pub mod catalog;
pub mod command;
pub mod error;
pub mod registry;

pub use catalog::{CatalogLoader, TaskCatalog, TaskDefinition};
pub use command::CommandTask;
pub use error::TaskError;
pub use registry::{Invocation, TaskHandler, TaskLoader, TaskRegistry};

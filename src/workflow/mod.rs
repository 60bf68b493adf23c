//! The episode workflow model: the static step catalog, per-episode progress
//! records and the domain error taxonomy.

mod error;
mod progress;
mod registry;

pub use error::{ErrorKind, WorkflowError};
pub use progress::{EpisodeWorkflow, ProgressRecord, StepStatus};
pub use registry::{StepDefinition, WorkflowRegistry, STANDARD_STEPS};

/// Step number within the registry (1-based)
pub type StepNumber = u32;

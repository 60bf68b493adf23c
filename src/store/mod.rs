//! Persistence of episode workflows and their activity log.

mod memory;

pub use memory::InMemoryWorkflowStore;

use crate::activity::ActivityEntry;
use crate::types::{EpisodeId, ProgramId};
use crate::workflow::{EpisodeWorkflow, WorkflowError};

/// Mutation applied inside [`WorkflowStore::transact`]. Returns the activity
/// entries to commit alongside the mutated workflow.
pub type Mutation<'a> =
    dyn FnMut(&mut EpisodeWorkflow) -> Result<Vec<ActivityEntry>, WorkflowError> + 'a;

/// Storage for workflows and activity.
///
/// Implementations must serialize `transact` calls for the same episode and
/// commit the workflow together with its activity entries, or neither.
pub trait WorkflowStore: Send + Sync {
    /// Insert a freshly initialized workflow and its initialization entry
    fn create(&self, workflow: EpisodeWorkflow, entry: ActivityEntry) -> Result<(), WorkflowError>;

    fn load(&self, episode: EpisodeId) -> Result<Option<EpisodeWorkflow>, WorkflowError>;

    /// Run `mutation` against a working copy of the episode's workflow while
    /// holding that episode's lock.
    ///
    /// On `Ok` with at least one entry the copy and entries are committed; on
    /// `Ok` with no entries nothing is written; on `Err` the copy is dropped.
    /// Returns the workflow as it stands after the call.
    fn transact(
        &self,
        episode: EpisodeId,
        mutation: &mut Mutation<'_>,
    ) -> Result<EpisodeWorkflow, WorkflowError>;

    fn episode_ids(&self) -> Result<Vec<EpisodeId>, WorkflowError>;

    /// Newest first
    fn activity_for_episode(
        &self,
        episode: EpisodeId,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>, WorkflowError>;

    /// Newest first
    fn activity_for_program(
        &self,
        program: ProgramId,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>, WorkflowError>;
}

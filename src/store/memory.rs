use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::{Mutation, WorkflowStore};
use crate::activity::{newest_first, ActivityEntry};
use crate::types::{EpisodeId, ProgramId};
use crate::workflow::{EpisodeWorkflow, WorkflowError};

const SNAPSHOT_FILE: &str = "workflows.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    workflows: HashMap<EpisodeId, EpisodeWorkflow>,
    activity: Vec<ActivityEntry>,
}

/// In-process store, optionally mirrored to `workflows.json` after every commit
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    data: Mutex<Snapshot>,
    episode_locks: Mutex<HashMap<EpisodeId, Arc<Mutex<()>>>>,
    file: Option<PathBuf>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store persisted under `state_dir`, loading any existing snapshot
    pub fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir).context("Failed to create state directory")?;
        let file = state_dir.join(SNAPSHOT_FILE);

        let snapshot = if file.exists() {
            let contents = fs::read_to_string(&file).context("Failed to read workflows file")?;
            serde_json::from_str(&contents).context("Failed to parse workflows file")?
        } else {
            Snapshot::default()
        };

        Ok(Self {
            data: Mutex::new(snapshot),
            episode_locks: Mutex::new(HashMap::new()),
            file: Some(file),
        })
    }

    fn episode_lock(&self, episode: EpisodeId) -> Arc<Mutex<()>> {
        lock(&self.episode_locks).entry(episode).or_default().clone()
    }

    /// Lock for an episode that is already stored; unknown ids get no entry
    fn existing_episode_lock(&self, episode: EpisodeId) -> Result<Arc<Mutex<()>>, WorkflowError> {
        if !lock(&self.data).workflows.contains_key(&episode) {
            return Err(WorkflowError::EpisodeNotFound(episode));
        }
        Ok(self.episode_lock(episode))
    }

    fn save(&self, data: &Snapshot) -> Result<(), WorkflowError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(data).map_err(WorkflowError::storage)?;
        fs::write(file, contents).map_err(WorkflowError::storage)?;
        debug!(path = %file.display(), "Saved workflow snapshot");
        Ok(())
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn create(&self, workflow: EpisodeWorkflow, entry: ActivityEntry) -> Result<(), WorkflowError> {
        let episode = workflow.episode_id;
        let guard = self.episode_lock(episode);
        let _held = lock(&guard);

        let mut data = lock(&self.data);
        if data.workflows.contains_key(&episode) {
            return Err(WorkflowError::AlreadyInitialized(episode));
        }
        data.workflows.insert(episode, workflow);
        data.activity.push(entry);
        if let Err(err) = self.save(&data) {
            data.workflows.remove(&episode);
            data.activity.pop();
            return Err(err);
        }
        Ok(())
    }

    fn load(&self, episode: EpisodeId) -> Result<Option<EpisodeWorkflow>, WorkflowError> {
        Ok(lock(&self.data).workflows.get(&episode).cloned())
    }

    fn transact(
        &self,
        episode: EpisodeId,
        mutation: &mut Mutation<'_>,
    ) -> Result<EpisodeWorkflow, WorkflowError> {
        let guard = self.existing_episode_lock(episode)?;
        let _held = lock(&guard);

        let mut working = self
            .load(episode)?
            .ok_or(WorkflowError::EpisodeNotFound(episode))?;
        let entries = mutation(&mut working)?;
        if entries.is_empty() {
            return Ok(working);
        }

        let mut data = lock(&self.data);
        let previous = data.workflows.insert(episode, working.clone());
        let appended = entries.len();
        data.activity.extend(entries);
        if let Err(err) = self.save(&data) {
            let len = data.activity.len();
            data.activity.truncate(len - appended);
            if let Some(previous) = previous {
                data.workflows.insert(episode, previous);
            }
            return Err(err);
        }
        Ok(working)
    }

    fn episode_ids(&self) -> Result<Vec<EpisodeId>, WorkflowError> {
        let mut ids: Vec<EpisodeId> = lock(&self.data).workflows.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn activity_for_episode(
        &self,
        episode: EpisodeId,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>, WorkflowError> {
        let data = lock(&self.data);
        Ok(newest_first(
            data.activity.iter().filter(|e| e.episode_id == episode),
            limit,
        ))
    }

    fn activity_for_program(
        &self,
        program: ProgramId,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityEntry>, WorkflowError> {
        let data = lock(&self.data);
        Ok(newest_first(
            data.activity.iter().filter(|e| e.program_id == program),
            limit,
        ))
    }
}

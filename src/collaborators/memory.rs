use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::{
    CollaboratorError, CollaboratorSource, CreateOutcome, WorkItem, WorkItemSink, WorkKind,
};
use crate::types::EpisodeId;

const WORK_ITEMS_FILE: &str = "work_items.json";

/// In-process collaborator state keyed by `(episode, kind)`, optionally
/// mirrored to `work_items.json`
#[derive(Debug, Default)]
pub struct InMemoryWorkItems {
    items: Mutex<BTreeMap<(EpisodeId, WorkKind), WorkItem>>,
    file: Option<PathBuf>,
}

impl InMemoryWorkItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir).context("Failed to create state directory")?;
        let file = state_dir.join(WORK_ITEMS_FILE);
        let list: Vec<WorkItem> = if file.exists() {
            let contents =
                fs::read_to_string(&file).context("Failed to read work items file")?;
            serde_json::from_str(&contents).context("Failed to parse work items file")?
        } else {
            Vec::new()
        };
        let items = list
            .into_iter()
            .map(|item| ((item.episode_id, item.kind), item))
            .collect();
        Ok(Self {
            items: Mutex::new(items),
            file: Some(file),
        })
    }

    /// Insert or replace the collaborator's current view of an item
    pub fn upsert(&self, item: WorkItem) -> Result<(), CollaboratorError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert((item.episode_id, item.kind), item);
        self.save(&items)
    }

    pub fn get(&self, episode: EpisodeId, kind: WorkKind) -> Option<WorkItem> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(episode, kind))
            .cloned()
    }

    pub fn for_episode(&self, episode: EpisodeId) -> Vec<WorkItem> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|item| item.episode_id == episode)
            .cloned()
            .collect()
    }

    fn save(&self, items: &BTreeMap<(EpisodeId, WorkKind), WorkItem>) -> Result<(), CollaboratorError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let list: Vec<&WorkItem> = items.values().collect();
        let contents = serde_json::to_string_pretty(&list)
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        fs::write(file, contents).map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        debug!(path = %file.display(), count = list.len(), "Saved work items");
        Ok(())
    }
}

impl CollaboratorSource for InMemoryWorkItems {
    fn work_item(
        &self,
        episode: EpisodeId,
        kind: WorkKind,
    ) -> Result<Option<WorkItem>, CollaboratorError> {
        Ok(self.get(episode, kind))
    }
}

impl WorkItemSink for InMemoryWorkItems {
    fn create_dependent(&self, item: WorkItem) -> Result<CreateOutcome, CollaboratorError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (item.episode_id, item.kind);
        if items.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        items.insert(key, item);
        if let Err(err) = self.save(&items) {
            items.remove(&key);
            return Err(err);
        }
        Ok(CreateOutcome::Created)
    }
}

//! Crew directory and role resolution.
//!
//! Maps `(program, role)` to the users who hold that role, so a step's
//! responsible role can be turned into people to display or notify.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::types::{ProgramId, Role, UserId};
use crate::workflow::ProgressRecord;

const CREW_FILE: &str = "crew.json";

/// Read access to who holds which role on a program
pub trait CrewSource: Send + Sync {
    /// The program-singleton holder of the manager role
    fn program_manager(&self, program: ProgramId) -> Option<UserId>;

    /// Crew members holding `role` on `program`, in assignment order
    fn crew_for_role(&self, program: ProgramId, role: Role) -> Vec<UserId>;

    fn user_exists(&self, user: UserId) -> bool;
}

/// A program-scoped role assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CrewAssignment {
    pub program_id: ProgramId,
    pub role: Role,
    pub user_id: UserId,
}

/// File-backed crew directory (`crew.json` in the state dir)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewDirectory {
    #[serde(default)]
    managers: HashMap<ProgramId, UserId>,
    #[serde(default)]
    assignments: Vec<CrewAssignment>,
    #[serde(default)]
    users: HashSet<UserId>,
    #[serde(skip)]
    file: Option<PathBuf>,
}

impl CrewDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(state_dir: &Path) -> Result<Self> {
        let file = state_dir.join(CREW_FILE);
        let mut directory: CrewDirectory = if file.exists() {
            let contents = fs::read_to_string(&file).context("Failed to read crew file")?;
            serde_json::from_str(&contents).context("Failed to parse crew file")?
        } else {
            CrewDirectory::default()
        };
        directory.file = Some(file);
        Ok(directory)
    }

    pub fn save(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(file, contents).context("Failed to write crew file")?;
        Ok(())
    }

    pub fn add_user(&mut self, user: UserId) {
        self.users.insert(user);
    }

    pub fn set_manager(&mut self, program: ProgramId, user: UserId) {
        self.users.insert(user);
        self.managers.insert(program, user);
    }

    /// Add `user` to the crew for `role`; repeated assignments are ignored
    pub fn assign(&mut self, program: ProgramId, role: Role, user: UserId) {
        self.users.insert(user);
        let assignment = CrewAssignment {
            program_id: program,
            role,
            user_id: user,
        };
        if !self.assignments.contains(&assignment) {
            self.assignments.push(assignment);
        }
    }

    pub fn assignments_for(&self, program: ProgramId) -> Vec<&CrewAssignment> {
        self.assignments
            .iter()
            .filter(|a| a.program_id == program)
            .collect()
    }
}

impl CrewSource for CrewDirectory {
    fn program_manager(&self, program: ProgramId) -> Option<UserId> {
        self.managers.get(&program).copied()
    }

    fn crew_for_role(&self, program: ProgramId, role: Role) -> Vec<UserId> {
        self.assignments
            .iter()
            .filter(|a| a.program_id == program && a.role == role)
            .map(|a| a.user_id)
            .collect()
    }

    fn user_exists(&self, user: UserId) -> bool {
        self.users.contains(&user)
    }
}

/// The crew directory as seen by a long-running process.
///
/// Edits made through `crew` commands land in `crew.json` while the server
/// is up, so a lookup that finds nothing re-reads the file once before
/// answering.
#[derive(Debug)]
pub struct CrewFile {
    state_dir: PathBuf,
    current: RwLock<CrewDirectory>,
}

impl CrewFile {
    pub fn open(state_dir: &Path) -> Result<Self> {
        Ok(Self {
            state_dir: state_dir.to_path_buf(),
            current: RwLock::new(CrewDirectory::load(state_dir)?),
        })
    }

    /// Copy of the directory as last read
    pub fn snapshot(&self) -> CrewDirectory {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reload(&self) {
        match CrewDirectory::load(&self.state_dir) {
            Ok(directory) => {
                debug!(path = %self.state_dir.display(), "Reloaded crew directory");
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = directory;
            }
            Err(err) => warn!(error = %err, "Failed to reload crew directory"),
        }
    }

    /// Answer from memory, re-reading the file when `missed` says the answer
    /// came up empty
    fn lookup<T>(&self, query: impl Fn(&CrewDirectory) -> T, missed: impl Fn(&T) -> bool) -> T {
        let answer = query(&*self.current.read().unwrap_or_else(PoisonError::into_inner));
        if !missed(&answer) {
            return answer;
        }
        self.reload();
        query(&*self.current.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl CrewSource for CrewFile {
    fn program_manager(&self, program: ProgramId) -> Option<UserId> {
        self.lookup(|crew| crew.program_manager(program), Option::is_none)
    }

    fn crew_for_role(&self, program: ProgramId, role: Role) -> Vec<UserId> {
        self.lookup(|crew| crew.crew_for_role(program, role), Vec::is_empty)
    }

    fn user_exists(&self, user: UserId) -> bool {
        self.lookup(|crew| crew.user_exists(user), |found| !found)
    }
}

/// Turns responsible roles into users
#[derive(Clone)]
pub struct RoleResolver {
    source: Arc<dyn CrewSource>,
}

impl RoleResolver {
    pub fn new(source: Arc<dyn CrewSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn CrewSource> {
        &self.source
    }

    /// Users holding `role` on `program`.
    ///
    /// The manager role always resolves to the program's manager. Other roles
    /// resolve to the crew holding them, then to `manual`, then to nobody.
    pub fn resolve_role(
        &self,
        program: ProgramId,
        role: Role,
        manual: Option<UserId>,
    ) -> Vec<UserId> {
        if role.is_program_singleton() {
            return self
                .source
                .program_manager(program)
                .or(manual)
                .into_iter()
                .collect();
        }
        let crew = self.source.crew_for_role(program, role);
        if crew.is_empty() {
            manual.into_iter().collect()
        } else {
            crew
        }
    }

    /// Everyone responsible for a step, deduplicated, in role order
    pub fn resolve_step(&self, program: ProgramId, record: &ProgressRecord) -> Vec<UserId> {
        let mut seen = HashSet::new();
        record
            .responsible_roles
            .iter()
            .flat_map(|role| self.resolve_role(program, *role, record.assigned_user_id))
            .filter(|user| seen.insert(*user))
            .collect()
    }

    /// The single user shown as "assigned" for a step
    pub fn display_user(&self, program: ProgramId, record: &ProgressRecord) -> Option<UserId> {
        for role in &record.responsible_roles {
            if role.is_program_singleton() {
                if let Some(manager) = self.source.program_manager(program) {
                    return Some(manager);
                }
            } else if let Some(first) = self.source.crew_for_role(program, *role).first() {
                return Some(*first);
            }
        }
        record.assigned_user_id
    }
}

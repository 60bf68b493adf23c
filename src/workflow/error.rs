use thiserror::Error;

use super::StepNumber;
use crate::types::{EpisodeId, Role, UserId};

/// Broad category of a [`WorkflowError`], used by the outer surfaces to pick
/// a status code or exit message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    Unauthorized,
    DependencyUnavailable,
    Internal,
}

/// Errors returned by workflow engine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("episode {0} has no workflow")]
    EpisodeNotFound(EpisodeId),

    #[error("step {0} does not exist")]
    StepNotFound(StepNumber),

    #[error("workflow for episode {0} is already initialized")]
    AlreadyInitialized(EpisodeId),

    #[error("step {step} of episode {episode} is already completed")]
    AlreadyCompleted { episode: EpisodeId, step: StepNumber },

    #[error("{role} may not {action} step {step}")]
    Unauthorized {
        role: Role,
        action: &'static str,
        step: StepNumber,
    },

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::EpisodeNotFound(_)
            | WorkflowError::StepNotFound(_)
            | WorkflowError::UserNotFound(_) => ErrorKind::NotFound,
            WorkflowError::AlreadyInitialized(_) | WorkflowError::AlreadyCompleted { .. } => {
                ErrorKind::InvalidTransition
            }
            WorkflowError::Unauthorized { .. } => ErrorKind::Unauthorized,
            WorkflowError::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            WorkflowError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        WorkflowError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let episode = EpisodeId::new();
        assert_eq!(WorkflowError::StepNotFound(9).kind(), ErrorKind::NotFound);
        assert_eq!(
            WorkflowError::AlreadyCompleted { episode, step: 4 }.kind(),
            ErrorKind::InvalidTransition
        );
        assert_eq!(
            WorkflowError::AlreadyInitialized(episode).kind(),
            ErrorKind::InvalidTransition
        );
        assert_eq!(
            WorkflowError::Unauthorized {
                role: Role::Editor,
                action: "reset",
                step: 2
            }
            .kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            WorkflowError::Storage("disk full".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_unauthorized_message_names_role_and_step() {
        let err = WorkflowError::Unauthorized {
            role: Role::Editor,
            action: "reset",
            step: 2,
        };
        assert_eq!(err.to_string(), "Editor may not reset step 2");
    }
}

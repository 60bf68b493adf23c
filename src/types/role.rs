//! Typed role enumeration for step ownership and access control.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

use super::UserId;

/// A role a user can hold within a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Creative,
    Production,
    Promotion,
    Editor,
    Design,
    ProgramManager,
    DistributionManager,
    QualityControl,
    /// Administrative role; never responsible for a step, may access all of them
    Admin,
}

impl Role {
    /// All roles in declaration order
    pub fn all() -> &'static [Role] {
        &[
            Role::Creative,
            Role::Production,
            Role::Promotion,
            Role::Editor,
            Role::Design,
            Role::ProgramManager,
            Role::DistributionManager,
            Role::QualityControl,
            Role::Admin,
        ]
    }

    /// Stable snake_case key, as used in config files and URLs
    pub fn key(&self) -> &'static str {
        match self {
            Role::Creative => "creative",
            Role::Production => "production",
            Role::Promotion => "promotion",
            Role::Editor => "editor",
            Role::Design => "design",
            Role::ProgramManager => "program_manager",
            Role::DistributionManager => "distribution_manager",
            Role::QualityControl => "quality_control",
            Role::Admin => "admin",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Role::Creative => "Creative",
            Role::Production => "Production",
            Role::Promotion => "Promotion",
            Role::Editor => "Editor",
            Role::Design => "Design",
            Role::ProgramManager => "Program Manager",
            Role::DistributionManager => "Distribution Manager",
            Role::QualityControl => "Quality Control",
            Role::Admin => "Admin",
        }
    }

    /// Roles held by exactly one user per program, resolved from the
    /// program record rather than from crew assignments
    pub fn is_program_singleton(&self) -> bool {
        matches!(self, Role::ProgramManager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    /// Accepts the snake_case key or the label, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Role::all()
            .iter()
            .copied()
            .find(|r| r.key() == normalized)
            .ok_or_else(|| RoleParseError(s.to_string()))
    }
}

/// The caller of an engine operation, used for access checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

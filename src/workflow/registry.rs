use serde::Serialize;

use super::StepNumber;
use crate::types::Role;

/// One entry of the step catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub step_number: StepNumber,
    pub name: &'static str,
    pub responsible_roles: &'static [Role],
}

/// The standard production pipeline, in order
pub const STANDARD_STEPS: &[StepDefinition] = &[
    StepDefinition {
        step_number: 1,
        name: "Creative Submission",
        responsible_roles: &[Role::Creative],
    },
    StepDefinition {
        step_number: 2,
        name: "Production Planning",
        responsible_roles: &[Role::Production],
    },
    StepDefinition {
        step_number: 3,
        name: "Recording",
        responsible_roles: &[Role::Production],
    },
    StepDefinition {
        step_number: 4,
        name: "Creative Approval",
        responsible_roles: &[Role::ProgramManager],
    },
    StepDefinition {
        step_number: 5,
        name: "Edit Content",
        responsible_roles: &[Role::Editor, Role::Promotion, Role::Design],
    },
    StepDefinition {
        step_number: 6,
        name: "QC by Distribution Manager",
        responsible_roles: &[Role::DistributionManager],
    },
    StepDefinition {
        step_number: 7,
        name: "Final QC",
        responsible_roles: &[Role::QualityControl],
    },
    StepDefinition {
        step_number: 8,
        name: "Distribution",
        responsible_roles: &[Role::DistributionManager],
    },
];

/// Read-only lookup over an ordered step catalog.
///
/// Step numbers are contiguous from 1, so step `n` lives at index `n - 1`.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowRegistry {
    steps: &'static [StepDefinition],
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl WorkflowRegistry {
    pub fn standard() -> Self {
        Self {
            steps: STANDARD_STEPS,
        }
    }

    pub fn all_steps(&self) -> &'static [StepDefinition] {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_valid_step(&self, step: StepNumber) -> bool {
        self.definition(step).is_some()
    }

    pub fn definition(&self, step: StepNumber) -> Option<&'static StepDefinition> {
        let index = usize::try_from(step).ok()?.checked_sub(1)?;
        self.steps.get(index)
    }

    /// Responsible roles for a step; empty for an unknown step
    pub fn roles_for(&self, step: StepNumber) -> &'static [Role] {
        self.definition(step)
            .map(|d| d.responsible_roles)
            .unwrap_or(&[])
    }

    /// Admin may touch every step; everyone else only the steps they own
    pub fn can_role_access_step(&self, role: Role, step: StepNumber) -> bool {
        self.is_valid_step(step) && (role == Role::Admin || self.roles_for(step).contains(&role))
    }

    /// The step after `step`, if any
    pub fn next_step(&self, step: StepNumber) -> Option<StepNumber> {
        let next = step.checked_add(1)?;
        self.is_valid_step(next).then_some(next)
    }
}

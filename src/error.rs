use crate::types::{ClientId, SetId};
use serde::Serialize;
use thiserror::Error;

/// A set whose committed width would not fit a proposed planning width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetViolation {
    pub set_id: SetId,
    pub jumbo_number: u32,
    pub set_number: u32,
    pub used_width: f64,
    pub planning_width: f64,
}

impl std::fmt::Display for SetViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "jumbo #{} set #{} uses {}\" of {}\"",
            self.jumbo_number, self.set_number, self.used_width, self.planning_width
        )
    }
}

/// Non-success answer from the plan-creation service, kept verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("plan submission failed ({status}): {message}")]
pub struct SubmissionFailure {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("cut roll {width}\" exceeds planning width {planning_width}\"")]
    WidthExceedsPlanning { width: f64, planning_width: f64 },

    #[error(
        "set {set_id} cannot take {requested}\": only {available}\" available"
    )]
    CapacityExceeded {
        set_id: SetId,
        requested: f64,
        available: f64,
    },

    #[error("planning width {planning_width}\" rejected: {}", join_violations(.violations))]
    CommitRejected {
        planning_width: f64,
        violations: Vec<SetViolation>,
    },

    #[error("invalid cut roll: {0}")]
    InvalidCutRoll(String),

    #[error("unknown client {0}")]
    UnknownClient(ClientId),

    #[error("paper {0} is already in this session")]
    DuplicatePaperSpec(String),

    #[error("invalid set widths: base {base_width}, floor {floor_width}")]
    InvalidWidths { base_width: f64, floor_width: f64 },

    #[error("invalid wastage allowance {0}")]
    InvalidAllowance(f64),

    #[error("wastage allowance has uncommitted changes")]
    AllowanceNotCommitted,

    #[error("plan has no cut rolls")]
    EmptyPlan,

    #[error("maximum segment width must be positive, got {0}")]
    InvalidMaxWidth(f64),

    #[error(transparent)]
    Submission(#[from] SubmissionFailure),
}

impl PlanError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PlanError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the error is a width-budget rejection of a cut roll write.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            PlanError::CapacityExceeded { .. } | PlanError::WidthExceedsPlanning { .. }
        )
    }
}

fn join_violations(violations: &[SetViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Problems found while validating wastage records before submission.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WastageIssue {
    #[error("wastage #{index}: width {width}\" outside {min}..={max}")]
    OutOfRange {
        index: usize,
        width: f64,
        min: f64,
        max: f64,
    },

    #[error("wastage #{index}: missing {field}")]
    MissingField { index: usize, field: &'static str },
}

pub type Result<T, E = PlanError> = std::result::Result<T, E>;

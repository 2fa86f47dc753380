use crate::error::{PlanError, Result, SetViolation};
use crate::types::hundredths;
use serde::Serialize;

/// Whether the wastage allowance is being edited or in force.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AllowanceState {
    Draft { proposed: f64 },
    Committed,
}

/// Per-set width budget derived from the wastage allowance.
///
/// Only the committed planning width is ever used to validate cut rolls; a
/// draft allowance has no effect until [`CapacityModel::commit`] accepts it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityModel {
    base_width: f64,
    floor_width: f64,
    allowance: f64,
    planning_width: f64,
    state: AllowanceState,
}

/// Committed width of one set, as fed to a commit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetUsage {
    pub set_id: crate::types::SetId,
    pub jumbo_number: u32,
    pub set_number: u32,
    pub used_width: f64,
}

impl CapacityModel {
    /// Starts committed at `allowance`. Widths and allowance must be finite,
    /// with `0 < floor_width <= base_width`.
    pub fn new(base_width: f64, floor_width: f64, allowance: f64) -> Result<Self> {
        check_allowance(allowance)?;
        if !(base_width.is_finite() && floor_width > 0.0 && floor_width <= base_width) {
            return Err(PlanError::InvalidWidths {
                base_width,
                floor_width,
            });
        }
        let mut model = Self {
            base_width,
            floor_width,
            allowance,
            planning_width: base_width,
            state: AllowanceState::Committed,
        };
        model.planning_width = model.planning_width_for(allowance);
        Ok(model)
    }

    pub fn planning_width_for(&self, allowance: f64) -> f64 {
        (self.base_width - allowance).clamp(self.floor_width, self.base_width)
    }

    pub fn planning_width(&self) -> f64 {
        self.planning_width
    }

    pub fn allowance(&self) -> f64 {
        self.allowance
    }

    pub fn state(&self) -> AllowanceState {
        self.state
    }

    pub fn is_committed(&self) -> bool {
        self.state == AllowanceState::Committed
    }

    pub fn propose(&mut self, allowance: f64) -> Result<()> {
        check_allowance(allowance)?;
        self.state = AllowanceState::Draft {
            proposed: allowance,
        };
        Ok(())
    }

    /// Back to draft, starting from the committed allowance.
    pub fn reopen(&mut self) {
        if self.is_committed() {
            self.state = AllowanceState::Draft {
                proposed: self.allowance,
            };
        }
    }

    /// Validates the candidate allowance against every set and applies it.
    ///
    /// Nothing changes when any set would overflow; the error names all of them.
    pub fn commit(&mut self, usage: impl IntoIterator<Item = SetUsage>) -> Result<f64> {
        let candidate = match self.state {
            AllowanceState::Draft { proposed } => proposed,
            AllowanceState::Committed => self.allowance,
        };
        let new_width = self.planning_width_for(candidate);

        let violations: Vec<SetViolation> = usage
            .into_iter()
            .filter(|u| hundredths(u.used_width) > hundredths(new_width))
            .map(|u| SetViolation {
                set_id: u.set_id,
                jumbo_number: u.jumbo_number,
                set_number: u.set_number,
                used_width: u.used_width,
                planning_width: new_width,
            })
            .collect();

        if !violations.is_empty() {
            tracing::warn!(
                allowance = candidate,
                planning_width = new_width,
                violations = violations.len(),
                "allowance commit rejected"
            );
            return Err(PlanError::CommitRejected {
                planning_width: new_width,
                violations,
            });
        }

        self.allowance = candidate;
        self.planning_width = new_width;
        self.state = AllowanceState::Committed;
        tracing::info!(allowance = candidate, planning_width = new_width, "allowance committed");
        Ok(new_width)
    }
}

fn check_allowance(allowance: f64) -> Result<()> {
    if !allowance.is_finite() {
        return Err(PlanError::InvalidAllowance(allowance));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SetId;

    fn usage(id: u64, used: f64) -> SetUsage {
        SetUsage {
            set_id: SetId(id),
            jumbo_number: 1,
            set_number: id as u32,
            used_width: used,
        }
    }

    #[test]
    fn test_planning_width_is_clamped() {
        let model = CapacityModel::new(124.0, 100.0, 1.0).unwrap();
        assert_eq!(model.planning_width(), 123.0);
        assert_eq!(model.planning_width_for(-10.0), 124.0);
        assert_eq!(model.planning_width_for(50.0), 100.0);
        assert!(model.is_committed());
    }

    #[test]
    fn test_draft_does_not_change_width() {
        let mut model = CapacityModel::new(124.0, 100.0, 1.0).unwrap();
        model.propose(5.0).unwrap();
        assert_eq!(model.planning_width(), 123.0);
        assert_eq!(model.state(), AllowanceState::Draft { proposed: 5.0 });
    }

    #[test]
    fn test_commit_rejected_when_set_overflows() {
        let mut model = CapacityModel::new(124.0, 100.0, 1.0).unwrap();
        model.propose(5.0).unwrap();
        let err = model
            .commit(vec![usage(1, 122.0), usage(2, 60.0), usage(3, 119.5)])
            .unwrap_err();
        match err {
            PlanError::CommitRejected {
                planning_width,
                violations,
            } => {
                assert_eq!(planning_width, 119.0);
                let ids: Vec<_> = violations.iter().map(|v| v.set_id).collect();
                assert_eq!(ids, vec![SetId(1), SetId(3)]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(model.planning_width(), 123.0);
        assert_eq!(model.allowance(), 1.0);
        assert_eq!(model.state(), AllowanceState::Draft { proposed: 5.0 });
    }

    #[test]
    fn test_commit_applies_and_is_idempotent() {
        let mut model = CapacityModel::new(124.0, 100.0, 1.0).unwrap();
        model.propose(4.0).unwrap();
        assert_eq!(model.commit(vec![usage(1, 120.0)]).unwrap(), 120.0);
        let snapshot = model.clone();
        assert_eq!(model.commit(vec![usage(1, 120.0)]).unwrap(), 120.0);
        assert_eq!(model, snapshot);
    }

    #[test]
    fn test_reopen_keeps_committed_width() {
        let mut model = CapacityModel::new(124.0, 100.0, 2.0).unwrap();
        model.reopen();
        assert_eq!(model.state(), AllowanceState::Draft { proposed: 2.0 });
        assert_eq!(model.planning_width(), 122.0);
    }

    #[test]
    fn test_non_finite_allowance_rejected() {
        let mut model = CapacityModel::new(124.0, 100.0, 1.0).unwrap();
        assert!(matches!(
            model.propose(f64::NAN),
            Err(PlanError::InvalidAllowance(_))
        ));
        assert!(model.is_committed());
    }

    #[test]
    fn test_new_rejects_non_finite_inputs() {
        assert!(matches!(
            CapacityModel::new(124.0, 100.0, f64::NAN),
            Err(PlanError::InvalidAllowance(_))
        ));
        assert!(matches!(
            CapacityModel::new(124.0, 100.0, f64::INFINITY),
            Err(PlanError::InvalidAllowance(_))
        ));
        assert!(matches!(
            CapacityModel::new(f64::NAN, 100.0, 1.0),
            Err(PlanError::InvalidWidths { .. })
        ));
        assert!(CapacityModel::new(124.0, 130.0, 1.0).is_err());
        assert!(CapacityModel::new(124.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_commit_uses_hundredths() {
        let mut model = CapacityModel::new(124.0, 100.0, 1.0).unwrap();
        model.propose(1.9).unwrap();
        assert!(model.commit(vec![usage(1, 40.7 * 3.0)]).is_ok());
        model.propose(2.0).unwrap();
        assert!(model.commit(vec![usage(1, 122.01)]).is_err());
    }
}

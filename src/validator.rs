use crate::error::{PlanError, Result};
use crate::types::{CutRoll, CutRollId, SetId, hundredths};

/// A requested cut roll write, checked before it reaches the store.
#[derive(Debug, Clone, Copy)]
pub struct CutRequest {
    pub set_id: SetId,
    pub width_inches: f64,
    pub quantity: u32,
    pub editing: Option<CutRollId>,
}

impl CutRequest {
    pub fn committed_width(&self) -> f64 {
        self.width_inches * f64::from(self.quantity)
    }
}

/// Width already committed in a set, leaving out the roll being edited.
pub fn used_excluding<'a>(
    cuts: impl IntoIterator<Item = &'a CutRoll>,
    set_id: SetId,
    editing: Option<CutRollId>,
) -> f64 {
    cuts.into_iter()
        .filter(|c| c.set_id == set_id && Some(c.id) != editing)
        .map(CutRoll::committed_width)
        .sum()
}

/// Checks a cut roll write against the committed planning width.
///
/// `others_used` must already exclude the roll being edited.
pub fn check_cut(request: &CutRequest, planning_width: f64, others_used: f64) -> Result<()> {
    if !(request.width_inches.is_finite() && request.width_inches > 0.0) {
        return Err(PlanError::InvalidCutRoll(format!(
            "width must be positive, got {}",
            request.width_inches
        )));
    }
    if request.quantity == 0 {
        return Err(PlanError::InvalidCutRoll(
            "quantity must be at least 1".to_string(),
        ));
    }
    let budget = hundredths(planning_width);
    if hundredths(request.width_inches) > budget {
        return Err(PlanError::WidthExceedsPlanning {
            width: request.width_inches,
            planning_width,
        });
    }
    if hundredths(others_used + request.committed_width()) > budget {
        return Err(PlanError::CapacityExceeded {
            set_id: request.set_id,
            requested: request.committed_width(),
            available: planning_width - others_used,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientId;

    fn cut(id: u64, set: u64, width: f64, quantity: u32) -> CutRoll {
        CutRoll {
            id: CutRollId(id),
            set_id: SetId(set),
            width_inches: width,
            quantity,
            client_id: ClientId("c1".to_string()),
        }
    }

    fn request(width: f64, quantity: u32, editing: Option<u64>) -> CutRequest {
        CutRequest {
            set_id: SetId(1),
            width_inches: width,
            quantity,
            editing: editing.map(CutRollId),
        }
    }

    #[test]
    fn test_used_excluding_skips_edited_and_other_sets() {
        let cuts = vec![cut(1, 1, 40.0, 1), cut(2, 1, 20.0, 2), cut(3, 2, 99.0, 1)];
        assert_eq!(used_excluding(&cuts, SetId(1), None), 80.0);
        assert_eq!(used_excluding(&cuts, SetId(1), Some(CutRollId(2))), 40.0);
    }

    #[test]
    fn test_overflow_reports_remaining() {
        let err = check_cut(&request(50.0, 1, None), 123.0, 80.0).unwrap_err();
        assert_eq!(
            err,
            PlanError::CapacityExceeded {
                set_id: SetId(1),
                requested: 50.0,
                available: 43.0,
            }
        );
    }

    #[test]
    fn test_single_width_over_planning() {
        let err = check_cut(&request(124.0, 1, None), 123.0, 0.0).unwrap_err();
        assert!(matches!(err, PlanError::WidthExceedsPlanning { .. }));
        assert!(err.is_capacity());
    }

    #[test]
    fn test_quantity_multiplies_width() {
        assert!(check_cut(&request(41.0, 3, None), 123.0, 0.0).is_ok());
        assert!(check_cut(&request(41.5, 3, None), 123.0, 0.0).is_err());
    }

    #[test]
    fn test_exact_fill_allowed() {
        assert!(check_cut(&request(43.0, 1, None), 123.0, 80.0).is_ok());
    }

    #[test]
    fn test_budget_is_strict_at_hundredths() {
        // 40.7 * 3 need not equal 122.1 bit for bit
        assert!(check_cut(&request(40.7, 3, None), 122.1, 0.0).is_ok());
        let err = check_cut(&request(61.51, 1, None), 123.0, 61.5).unwrap_err();
        assert!(matches!(err, PlanError::CapacityExceeded { .. }));
        assert!(check_cut(&request(123.01, 1, None), 123.0, 0.0).is_err());
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(matches!(
            check_cut(&request(0.0, 1, None), 123.0, 0.0),
            Err(PlanError::InvalidCutRoll(_))
        ));
        assert!(matches!(
            check_cut(&request(10.0, 0, None), 123.0, 0.0),
            Err(PlanError::InvalidCutRoll(_))
        ));
    }
}

use crate::error::{PlanError, Result, SubmissionFailure};
use crate::store::HierarchyStore;
use crate::types::{CreatedPlan, CutRoll};
use serde::Serialize;
use std::future::Future;

/// Body sent to the plan-creation service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub created_by: String,
    pub wastage_allowance: f64,
    pub planning_width: f64,
    pub paper_specs: Vec<PaperPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    pub gsm: u32,
    pub bf: f64,
    pub shade: String,
    pub jumbo_rolls: Vec<JumboPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JumboPayload {
    pub jumbo_number: u32,
    pub sets: Vec<SetPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPayload {
    pub set_number: u32,
    pub cut_rolls: Vec<CutRollPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CutRollPayload {
    pub width_inches: f64,
    pub quantity: u32,
    pub client_id: String,
    pub client_name: String,
}

impl PlanRequest {
    pub fn cut_roll_count(&self) -> usize {
        self.paper_specs
            .iter()
            .flat_map(|p| &p.jumbo_rolls)
            .flat_map(|j| &j.sets)
            .map(|s| s.cut_rolls.len())
            .sum()
    }
}

/// Builds the submission body, dropping sets, jumbos and papers left empty.
///
/// Refuses while the allowance is in draft or when nothing remains.
pub fn build_payload(store: &HierarchyStore, created_by: &str) -> Result<PlanRequest> {
    if !store.capacity().is_committed() {
        return Err(PlanError::AllowanceNotCommitted);
    }

    let mut paper_specs = Vec::new();
    for paper in store.paper_specs() {
        let mut jumbo_rolls = Vec::new();
        for jumbo in store.jumbos_of(paper.id) {
            let mut sets = Vec::new();
            for set in store.sets_of(jumbo.id) {
                let cut_rolls = store
                    .cut_rolls_of(set.id)
                    .map(|cut| cut_payload(store, cut))
                    .collect::<Result<Vec<_>>>()?;
                if !cut_rolls.is_empty() {
                    sets.push(SetPayload {
                        set_number: set.set_number,
                        cut_rolls,
                    });
                }
            }
            if !sets.is_empty() {
                jumbo_rolls.push(JumboPayload {
                    jumbo_number: jumbo.jumbo_number,
                    sets,
                });
            }
        }
        if !jumbo_rolls.is_empty() {
            paper_specs.push(PaperPayload {
                paper_id: paper.spec.paper_id.clone(),
                gsm: paper.spec.gsm,
                bf: paper.spec.bf,
                shade: paper.spec.shade.clone(),
                jumbo_rolls,
            });
        }
    }

    if paper_specs.is_empty() {
        return Err(PlanError::EmptyPlan);
    }
    Ok(PlanRequest {
        created_by: created_by.to_string(),
        wastage_allowance: store.capacity().allowance(),
        planning_width: store.planning_width(),
        paper_specs,
    })
}

fn cut_payload(store: &HierarchyStore, cut: &CutRoll) -> Result<CutRollPayload> {
    let client = store
        .client(&cut.client_id)
        .ok_or_else(|| PlanError::UnknownClient(cut.client_id.clone()))?;
    Ok(CutRollPayload {
        width_inches: cut.width_inches,
        quantity: cut.quantity,
        client_id: cut.client_id.0.clone(),
        client_name: client.company_name.clone(),
    })
}

/// The plan-creation service: one request, one response, no retries.
pub trait PlanSubmitter {
    fn submit(
        &self,
        request: &PlanRequest,
    ) -> impl Future<Output = std::result::Result<CreatedPlan, SubmissionFailure>> + Send;
}

/// Builds the payload, hands it to `submitter` once and clears the session
/// on success. On failure the session is left exactly as it was.
pub async fn submit_plan<S: PlanSubmitter>(
    store: &mut HierarchyStore,
    submitter: &S,
    created_by: &str,
) -> Result<CreatedPlan> {
    let request = build_payload(store, created_by)?;
    tracing::info!(
        created_by,
        cut_rolls = request.cut_roll_count(),
        planning_width = request.planning_width,
        "submitting plan"
    );
    match submitter.submit(&request).await {
        Ok(plan) => {
            tracing::info!(plan_id = %plan.plan_id, "plan created");
            store.reset();
            Ok(plan)
        }
        Err(failure) => {
            tracing::warn!(status = failure.status, error = %failure.message, "plan submission failed");
            Err(failure.into())
        }
    }
}

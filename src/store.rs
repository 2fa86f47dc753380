use crate::capacity::{CapacityModel, SetUsage};
use crate::config::PlannerConfig;
use crate::error::{PlanError, Result};
use crate::types::{
    Client, ClientId, CutRoll, CutRollId, JumboId, JumboRoll, PaperSpec, RollSet, SetId, SpecId,
};
use crate::validator::{self, CutRequest};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sets created with every new jumbo roll.
pub const SETS_PER_JUMBO: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperRecord {
    pub id: SpecId,
    pub spec: PaperSpec,
}

/// Usage figures for one set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetSummary {
    pub set_id: SetId,
    pub jumbo_id: JumboId,
    pub set_number: u32,
    pub used_width: f64,
    pub remaining_width: f64,
    pub efficiency: f64,
}

/// In-memory planning session: the paper → jumbo → set → cut roll tree.
///
/// Records live in flat maps keyed by id and refer to their parent by id.
/// Every write goes through this type so the per-set budget is checked in
/// one place.
#[derive(Debug, Clone)]
pub struct HierarchyStore {
    capacity: CapacityModel,
    clients: BTreeMap<ClientId, Client>,
    specs: BTreeMap<SpecId, PaperRecord>,
    jumbos: BTreeMap<JumboId, JumboRoll>,
    sets: BTreeMap<SetId, RollSet>,
    cut_rolls: BTreeMap<CutRollId, CutRoll>,
    next_id: u64,
}

impl HierarchyStore {
    pub fn new(capacity: CapacityModel) -> Self {
        Self {
            capacity,
            clients: BTreeMap::new(),
            specs: BTreeMap::new(),
            jumbos: BTreeMap::new(),
            sets: BTreeMap::new(),
            cut_rolls: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Result<Self> {
        Ok(Self::new(CapacityModel::new(
            config.base_width,
            config.floor_width,
            config.default_allowance,
        )?))
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // Reference data

    pub fn register_client(&mut self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    pub fn client(&self, id: &ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    // Capacity

    pub fn capacity(&self) -> &CapacityModel {
        &self.capacity
    }

    pub fn planning_width(&self) -> f64 {
        self.capacity.planning_width()
    }

    pub fn propose_allowance(&mut self, allowance: f64) -> Result<()> {
        self.capacity.propose(allowance)
    }

    pub fn reopen_allowance(&mut self) {
        self.capacity.reopen();
    }

    pub fn commit_allowance(&mut self) -> Result<f64> {
        let usage = self.set_usage();
        self.capacity.commit(usage)
    }

    pub fn set_usage(&self) -> Vec<SetUsage> {
        self.sets
            .values()
            .map(|set| SetUsage {
                set_id: set.id,
                jumbo_number: self
                    .jumbos
                    .get(&set.jumbo_id)
                    .map_or(0, |j| j.jumbo_number),
                set_number: set.set_number,
                used_width: self.used_width(set.id),
            })
            .collect()
    }

    // Creation

    pub fn add_paper_spec(&mut self, spec: PaperSpec) -> Result<SpecId> {
        if self.specs.values().any(|r| r.spec.same_paper(&spec)) {
            return Err(PlanError::DuplicatePaperSpec(spec.to_string()));
        }
        let id = SpecId(self.allocate_id());
        tracing::debug!(%id, paper = %spec, "paper spec added");
        self.specs.insert(id, PaperRecord { id, spec });
        Ok(id)
    }

    /// Adds a jumbo roll numbered after the existing ones, with its three sets.
    pub fn add_jumbo_roll(&mut self, spec_id: SpecId) -> Result<JumboId> {
        if !self.specs.contains_key(&spec_id) {
            return Err(PlanError::not_found("paper spec", spec_id));
        }
        let jumbo_number = self.jumbos.values().filter(|j| j.spec_id == spec_id).count() as u32 + 1;
        let id = JumboId(self.allocate_id());
        self.jumbos.insert(
            id,
            JumboRoll {
                id,
                spec_id,
                jumbo_number,
            },
        );
        for _ in 0..SETS_PER_JUMBO {
            self.add_set(id)?;
        }
        tracing::debug!(%id, %spec_id, jumbo_number, "jumbo roll added");
        Ok(id)
    }

    pub fn add_set(&mut self, jumbo_id: JumboId) -> Result<SetId> {
        if !self.jumbos.contains_key(&jumbo_id) {
            return Err(PlanError::not_found("jumbo roll", jumbo_id));
        }
        let set_number = self.sets.values().filter(|s| s.jumbo_id == jumbo_id).count() as u32 + 1;
        let id = SetId(self.allocate_id());
        self.sets.insert(
            id,
            RollSet {
                id,
                jumbo_id,
                set_number,
            },
        );
        Ok(id)
    }

    /// Inserts a cut roll, or replaces `editing` (possibly moving it to
    /// `set_id`), after checking the set's width budget.
    pub fn add_or_edit_cut_roll(
        &mut self,
        set_id: SetId,
        width_inches: f64,
        quantity: u32,
        client_id: ClientId,
        editing: Option<CutRollId>,
    ) -> Result<CutRollId> {
        if !self.sets.contains_key(&set_id) {
            return Err(PlanError::not_found("set", set_id));
        }
        if let Some(existing) = editing
            && !self.cut_rolls.contains_key(&existing)
        {
            return Err(PlanError::not_found("cut roll", existing));
        }
        if !self.clients.contains_key(&client_id) {
            return Err(PlanError::UnknownClient(client_id));
        }

        let request = CutRequest {
            set_id,
            width_inches,
            quantity,
            editing,
        };
        let others_used = validator::used_excluding(self.cut_rolls.values(), set_id, editing);
        validator::check_cut(&request, self.planning_width(), others_used)?;

        let id = match editing {
            Some(id) => id,
            None => CutRollId(self.allocate_id()),
        };
        self.cut_rolls.insert(
            id,
            CutRoll {
                id,
                set_id,
                width_inches,
                quantity,
                client_id,
            },
        );
        tracing::debug!(%id, %set_id, width_inches, quantity, "cut roll saved");
        Ok(id)
    }

    // Deletion; each removes the whole subtree.

    pub fn delete_paper_spec(&mut self, id: SpecId) -> Result<()> {
        if self.specs.remove(&id).is_none() {
            return Err(PlanError::not_found("paper spec", id));
        }
        let jumbos: Vec<JumboId> = self
            .jumbos
            .values()
            .filter(|j| j.spec_id == id)
            .map(|j| j.id)
            .collect();
        for jumbo in jumbos {
            self.delete_jumbo_roll(jumbo)?;
        }
        Ok(())
    }

    pub fn delete_jumbo_roll(&mut self, id: JumboId) -> Result<()> {
        if self.jumbos.remove(&id).is_none() {
            return Err(PlanError::not_found("jumbo roll", id));
        }
        let sets: Vec<SetId> = self
            .sets
            .values()
            .filter(|s| s.jumbo_id == id)
            .map(|s| s.id)
            .collect();
        for set in sets {
            self.delete_set(set)?;
        }
        Ok(())
    }

    pub fn delete_set(&mut self, id: SetId) -> Result<()> {
        if self.sets.remove(&id).is_none() {
            return Err(PlanError::not_found("set", id));
        }
        self.cut_rolls.retain(|_, c| c.set_id != id);
        Ok(())
    }

    pub fn delete_cut_roll(&mut self, id: CutRollId) -> Result<()> {
        self.cut_rolls
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PlanError::not_found("cut roll", id))
    }

    /// Clears the tree after a successful submission. Clients and the
    /// committed allowance are kept.
    pub fn reset(&mut self) {
        self.specs.clear();
        self.jumbos.clear();
        self.sets.clear();
        self.cut_rolls.clear();
    }

    // Queries

    pub fn used_width(&self, set_id: SetId) -> f64 {
        validator::used_excluding(self.cut_rolls.values(), set_id, None)
    }

    pub fn remaining_width(&self, set_id: SetId) -> Result<f64> {
        self.require_set(set_id)?;
        Ok(self.planning_width() - self.used_width(set_id))
    }

    pub fn efficiency(&self, set_id: SetId) -> Result<f64> {
        self.require_set(set_id)?;
        let used = self.used_width(set_id);
        if used == 0.0 {
            return Ok(0.0);
        }
        Ok(used / self.planning_width())
    }

    pub fn set_summary(&self, set_id: SetId) -> Result<SetSummary> {
        let set = self.require_set(set_id)?;
        Ok(SetSummary {
            set_id,
            jumbo_id: set.jumbo_id,
            set_number: set.set_number,
            used_width: self.used_width(set_id),
            remaining_width: self.remaining_width(set_id)?,
            efficiency: self.efficiency(set_id)?,
        })
    }

    fn require_set(&self, set_id: SetId) -> Result<&RollSet> {
        self.sets
            .get(&set_id)
            .ok_or_else(|| PlanError::not_found("set", set_id))
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn paper_specs(&self) -> impl Iterator<Item = &PaperRecord> {
        self.specs.values()
    }

    pub fn jumbos_of(&self, spec_id: SpecId) -> impl Iterator<Item = &JumboRoll> {
        self.jumbos.values().filter(move |j| j.spec_id == spec_id)
    }

    pub fn sets_of(&self, jumbo_id: JumboId) -> impl Iterator<Item = &RollSet> {
        self.sets.values().filter(move |s| s.jumbo_id == jumbo_id)
    }

    pub fn cut_rolls_of(&self, set_id: SetId) -> impl Iterator<Item = &CutRoll> {
        self.cut_rolls.values().filter(move |c| c.set_id == set_id)
    }

    pub fn cut_roll(&self, id: CutRollId) -> Option<&CutRoll> {
        self.cut_rolls.get(&id)
    }

    pub fn set(&self, id: SetId) -> Option<&RollSet> {
        self.sets.get(&id)
    }

    pub fn jumbo(&self, id: JumboId) -> Option<&JumboRoll> {
        self.jumbos.get(&id)
    }

    pub fn cut_roll_count(&self) -> usize {
        self.cut_rolls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hundredths;

    fn store() -> HierarchyStore {
        let mut store = HierarchyStore::from_config(&PlannerConfig::default()).unwrap();
        store.register_client(Client {
            id: ClientId("c1".to_string()),
            company_name: "Acme Packaging".to_string(),
        });
        store
    }

    fn c1() -> ClientId {
        ClientId("c1".to_string())
    }

    fn first_set(store: &HierarchyStore, jumbo: JumboId) -> SetId {
        store.sets_of(jumbo).next().unwrap().id
    }

    /// Every set's committed width fits the current planning width and no
    /// record points at a missing parent.
    fn assert_tree_valid(store: &HierarchyStore) {
        for set in store.sets.values() {
            assert!(
                hundredths(store.used_width(set.id)) <= hundredths(store.planning_width()),
                "set {} over budget",
                set.id
            );
            assert!(store.jumbos.contains_key(&set.jumbo_id));
        }
        for jumbo in store.jumbos.values() {
            assert!(store.specs.contains_key(&jumbo.spec_id));
        }
        for cut in store.cut_rolls.values() {
            assert!(store.sets.contains_key(&cut.set_id), "orphan cut {}", cut.id);
        }
    }

    #[test]
    fn test_jumbo_gets_three_numbered_sets() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let j1 = s.add_jumbo_roll(spec).unwrap();
        let j2 = s.add_jumbo_roll(spec).unwrap();
        assert_eq!(s.jumbo(j1).unwrap().jumbo_number, 1);
        assert_eq!(s.jumbo(j2).unwrap().jumbo_number, 2);
        let numbers: Vec<u32> = s.sets_of(j2).map(|x| x.set_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let extra = s.add_set(j2).unwrap();
        assert_eq!(s.set(extra).unwrap().set_number, 4);
    }

    #[test]
    fn test_jumbo_numbering_is_per_spec() {
        let mut s = store();
        let a = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let b = s.add_paper_spec(PaperSpec::new(120, 20.0, "Golden")).unwrap();
        s.add_jumbo_roll(a).unwrap();
        let jb = s.add_jumbo_roll(b).unwrap();
        assert_eq!(s.jumbo(jb).unwrap().jumbo_number, 1);
    }

    #[test]
    fn test_duplicate_paper_rejected() {
        let mut s = store();
        s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let err = s
            .add_paper_spec(PaperSpec::new(100, 18.0, "Natural"))
            .unwrap_err();
        assert!(matches!(err, PlanError::DuplicatePaperSpec(_)));
    }

    #[test]
    fn test_overflowing_cut_rejected_with_available() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let set = first_set(&s, jumbo);
        s.add_or_edit_cut_roll(set, 40.0, 1, c1(), None).unwrap();
        s.add_or_edit_cut_roll(set, 40.0, 1, c1(), None).unwrap();

        let err = s.add_or_edit_cut_roll(set, 50.0, 1, c1(), None).unwrap_err();
        assert_eq!(
            err,
            PlanError::CapacityExceeded {
                set_id: set,
                requested: 50.0,
                available: 43.0,
            }
        );
        assert_eq!(s.cut_rolls_of(set).count(), 2);
        assert_eq!(s.remaining_width(set).unwrap(), 43.0);
        assert_tree_valid(&s);
    }

    #[test]
    fn test_edit_excludes_own_width() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let set = first_set(&s, jumbo);
        s.add_or_edit_cut_roll(set, 60.0, 1, c1(), None).unwrap();
        let cut = s.add_or_edit_cut_roll(set, 60.0, 1, c1(), None).unwrap();

        // 60 + 63 = 123 only fits when the edited roll's own 60 is ignored.
        let same = s.add_or_edit_cut_roll(set, 63.0, 1, c1(), Some(cut)).unwrap();
        assert_eq!(same, cut);
        assert_eq!(s.cut_roll(cut).unwrap().width_inches, 63.0);
        assert_eq!(s.used_width(set), 123.0);
        assert_eq!(s.efficiency(set).unwrap(), 1.0);
        assert_tree_valid(&s);
    }

    #[test]
    fn test_edit_can_move_between_sets() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let sets: Vec<SetId> = s.sets_of(jumbo).map(|x| x.id).collect();
        let cut = s.add_or_edit_cut_roll(sets[0], 30.0, 2, c1(), None).unwrap();
        s.add_or_edit_cut_roll(sets[1], 30.0, 2, c1(), Some(cut)).unwrap();
        assert_eq!(s.used_width(sets[0]), 0.0);
        assert_eq!(s.used_width(sets[1]), 60.0);
    }

    #[test]
    fn test_unknown_client_and_missing_nodes() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let set = first_set(&s, jumbo);
        assert!(matches!(
            s.add_or_edit_cut_roll(set, 10.0, 1, ClientId("nobody".to_string()), None),
            Err(PlanError::UnknownClient(_))
        ));
        assert!(matches!(
            s.add_or_edit_cut_roll(SetId(999), 10.0, 1, c1(), None),
            Err(PlanError::NotFound { entity: "set", .. })
        ));
        assert!(matches!(
            s.add_or_edit_cut_roll(set, 10.0, 1, c1(), Some(CutRollId(999))),
            Err(PlanError::NotFound { entity: "cut roll", .. })
        ));
        assert!(s.add_jumbo_roll(SpecId(999)).is_err());
    }

    #[test]
    fn test_efficiency_zero_when_unused() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let set = first_set(&s, jumbo);
        assert_eq!(s.efficiency(set).unwrap(), 0.0);
        assert_eq!(s.remaining_width(set).unwrap(), 123.0);
    }

    #[test]
    fn test_delete_spec_cascades() {
        let mut s = store();
        let a = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let b = s.add_paper_spec(PaperSpec::new(120, 18.0, "Natural")).unwrap();
        for spec in [a, b] {
            let jumbo = s.add_jumbo_roll(spec).unwrap();
            let set = first_set(&s, jumbo);
            s.add_or_edit_cut_roll(set, 20.0, 2, c1(), None).unwrap();
        }
        s.delete_paper_spec(a).unwrap();
        assert_tree_valid(&s);
        assert_eq!(s.paper_specs().count(), 1);
        assert_eq!(s.jumbos.len(), 1);
        assert_eq!(s.sets.len(), 3);
        assert_eq!(s.cut_roll_count(), 1);
        assert!(s.delete_paper_spec(a).is_err());
    }

    #[test]
    fn test_delete_set_and_cut() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let set = first_set(&s, jumbo);
        let cut = s.add_or_edit_cut_roll(set, 20.0, 1, c1(), None).unwrap();
        s.add_or_edit_cut_roll(set, 20.0, 1, c1(), None).unwrap();
        s.delete_cut_roll(cut).unwrap();
        assert_eq!(s.used_width(set), 20.0);
        s.delete_set(set).unwrap();
        assert_eq!(s.cut_roll_count(), 0);
        assert_eq!(s.sets_of(jumbo).count(), 2);
        assert_tree_valid(&s);
    }

    #[test]
    fn test_commit_checks_existing_sets() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let set = first_set(&s, jumbo);
        s.add_or_edit_cut_roll(set, 61.0, 2, c1(), None).unwrap();

        s.propose_allowance(5.0).unwrap();
        let err = s.commit_allowance().unwrap_err();
        match err {
            PlanError::CommitRejected { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].set_id, set);
                assert_eq!(violations[0].used_width, 122.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.planning_width(), 123.0);
        assert!(!s.capacity().is_committed());
        assert_tree_valid(&s);

        let cut = s.cut_rolls_of(set).next().unwrap().id;
        s.delete_cut_roll(cut).unwrap();
        assert_eq!(s.commit_allowance().unwrap(), 119.0);
        assert_eq!(s.remaining_width(set).unwrap(), 119.0);
        assert_tree_valid(&s);
    }

    #[test]
    fn test_draft_allowance_does_not_govern_writes() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let set = first_set(&s, jumbo);
        s.propose_allowance(20.0).unwrap();
        assert!(s.add_or_edit_cut_roll(set, 123.0, 1, c1(), None).is_ok());
        assert!(s.commit_allowance().is_err());
    }

    #[test]
    fn test_random_edit_sequence_keeps_budget() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let sets: Vec<SetId> = s.sets_of(jumbo).map(|x| x.id).collect();

        // Deterministic pseudo-random widths and targets.
        let mut seed: u64 = 0x2545_f491;
        let mut cuts = Vec::new();
        for step in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let width = 5.0 + (seed >> 40) as f64 % 60.0;
            let quantity = 1 + ((seed >> 20) % 3) as u32;
            let set = sets[(seed % 3) as usize];
            let editing = if step % 4 == 0 { cuts.last().copied() } else { None };
            if let Ok(id) = s.add_or_edit_cut_roll(set, width, quantity, c1(), editing) {
                cuts.push(id);
            }
            if step % 7 == 0
                && let Some(id) = cuts.pop()
            {
                let _ = s.delete_cut_roll(id);
            }
            assert_tree_valid(&s);
        }
    }

    #[test]
    fn test_nan_allowance_never_disables_budget() {
        let config = PlannerConfig {
            default_allowance: f64::NAN,
            ..PlannerConfig::default()
        };
        assert!(matches!(
            HierarchyStore::from_config(&config),
            Err(PlanError::InvalidAllowance(_))
        ));

        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        let jumbo = s.add_jumbo_roll(spec).unwrap();
        let set = first_set(&s, jumbo);
        assert!(s.propose_allowance(f64::NAN).is_err());
        assert!(s.add_or_edit_cut_roll(set, 100.0, 5, c1(), None).is_err());
        assert_tree_valid(&s);
    }

    #[test]
    fn test_reset_keeps_clients_and_capacity() {
        let mut s = store();
        let spec = s.add_paper_spec(PaperSpec::new(100, 18.0, "Natural")).unwrap();
        s.add_jumbo_roll(spec).unwrap();
        s.reset();
        assert!(s.is_empty());
        assert!(s.client(&c1()).is_some());
        assert_eq!(s.planning_width(), 123.0);
    }
}

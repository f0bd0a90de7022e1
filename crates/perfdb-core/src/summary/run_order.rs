use crate::errors::{PerfError, Result};
use crate::model::{EntityKind, MachineId, RunId, RunOrder};
use crate::storage::{queries, Store};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Total order over the runs of one suite tag, most recent first.
///
/// Runs sharing a `run_order` keep their enumeration (run id) order. Machine
/// neighbour queries scan outward from the run's position; the index is cached
/// and rebuilt only when `RunInfo` changes, so the scans stay cheap.
#[derive(Debug, Clone, Serialize)]
pub struct RunOrderIndex {
    revision: u64,
    tag: String,
    run_orders: Vec<RunOrder>,
    runs_in_order: Vec<RunId>,
    #[serde(skip)]
    runs_by_order: BTreeMap<RunOrder, Vec<RunId>>,
    #[serde(skip)]
    position: HashMap<RunId, usize>,
    #[serde(skip)]
    order_by_run: HashMap<RunId, RunOrder>,
    #[serde(skip)]
    machine_by_run: HashMap<RunId, MachineId>,
}

impl RunOrderIndex {
    pub fn from_store(store: &Store, tag: &str, revision: u64) -> Result<Self> {
        let rows = store.read(|c| queries::run_orders_for_tag(c, tag))?;
        let index = Self::build(tag, revision, rows);
        tracing::debug!(
            event = "perfdb.run_order.built",
            tag = %tag,
            revision,
            runs = index.runs_in_order.len(),
            "built run order index for {}", tag
        );
        Ok(index)
    }

    /// Builds the index from (run_order, run_id, machine_id) rows given in
    /// enumeration order. A run listed twice keeps its first order.
    pub fn build(
        tag: &str,
        revision: u64,
        rows: impl IntoIterator<Item = (RunOrder, RunId, MachineId)>,
    ) -> Self {
        let mut runs_by_order: BTreeMap<RunOrder, Vec<RunId>> = BTreeMap::new();
        let mut order_by_run = HashMap::new();
        let mut machine_by_run = HashMap::new();

        for (order, run_id, machine_id) in rows {
            if order_by_run.contains_key(&run_id) {
                continue;
            }
            order_by_run.insert(run_id, order.clone());
            machine_by_run.insert(run_id, machine_id);
            runs_by_order.entry(order).or_default().push(run_id);
        }

        let run_orders: Vec<RunOrder> = runs_by_order.keys().rev().cloned().collect();
        let runs_in_order: Vec<RunId> = run_orders
            .iter()
            .flat_map(|o| runs_by_order[o].iter().copied())
            .collect();
        let position = runs_in_order
            .iter()
            .enumerate()
            .map(|(i, r)| (*r, i))
            .collect();

        Self {
            revision,
            tag: tag.to_string(),
            run_orders,
            runs_in_order,
            runs_by_order,
            position,
            order_by_run,
            machine_by_run,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Distinct run orders, most recent first.
    pub fn run_orders(&self) -> &[RunOrder] {
        &self.run_orders
    }

    pub fn runs_in_order(&self) -> &[RunId] {
        &self.runs_in_order
    }

    pub fn runs_with_order(&self, order: &RunOrder) -> &[RunId] {
        self.runs_by_order
            .get(order)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn order_of(&self, run_id: RunId) -> Option<&RunOrder> {
        self.order_by_run.get(&run_id)
    }

    pub fn machine_of(&self, run_id: RunId) -> Option<MachineId> {
        self.machine_by_run.get(&run_id).copied()
    }

    /// Index of the run in `runs_in_order`. An unknown run means the caller and
    /// the database disagree, so it is reported rather than ignored.
    pub fn position_of(&self, run_id: RunId) -> Result<usize> {
        self.position
            .get(&run_id)
            .copied()
            .ok_or_else(|| PerfError::not_found(EntityKind::Run, run_id))
    }

    /// Nearest older run on the same machine.
    pub fn previous_on_machine(&self, run_id: RunId) -> Result<Option<RunId>> {
        let (idx, machine) = self.locate(run_id)?;
        Ok(self.runs_in_order[idx + 1..]
            .iter()
            .copied()
            .find(|r| self.machine_by_run.get(r) == Some(&machine)))
    }

    /// Nearest more recent run on the same machine.
    pub fn next_on_machine(&self, run_id: RunId) -> Result<Option<RunId>> {
        let (idx, machine) = self.locate(run_id)?;
        Ok(self.runs_in_order[..idx]
            .iter()
            .rev()
            .copied()
            .find(|r| self.machine_by_run.get(r) == Some(&machine)))
    }

    /// Most recent run on `machine`, if any.
    pub fn latest_on_machine(&self, machine: MachineId) -> Option<RunId> {
        self.runs_in_order
            .iter()
            .copied()
            .find(|r| self.machine_by_run.get(r) == Some(&machine))
    }

    fn locate(&self, run_id: RunId) -> Result<(usize, MachineId)> {
        let idx = self.position_of(run_id)?;
        let machine = self
            .machine_of(run_id)
            .ok_or_else(|| PerfError::not_found(EntityKind::Run, run_id))?;
        Ok((idx, machine))
    }
}

use pmctk_ids::Id;
use pmctk_model::{SparseMatrix, StateId, StateSet};

/// Computes the states reaching `psi` with probability zero and with probability one.
pub fn prob01(backward: &SparseMatrix<f64>, psi: &StateSet) -> (StateSet, StateSet) {
    let mut prob0 = backward_reachable(backward, psi, |_| true);
    prob0.toggle_range(..);

    // a state misses psi with positive probability iff it can reach prob0 avoiding psi
    let mut prob1 = backward_reachable(backward, &prob0, |state| !psi.contains(state));
    prob1.toggle_range(..);

    (prob0, prob1)
}

fn backward_reachable(
    backward: &SparseMatrix<f64>,
    seeds: &StateSet,
    allowed: impl Fn(usize) -> bool,
) -> StateSet {
    let mut reached = seeds.clone();
    let mut stack: Vec<usize> = seeds.ones().collect();

    while let Some(state) = stack.pop() {
        for &(predecessor, weight) in backward.row(StateId::from_id_index(state)) {
            let predecessor = predecessor.id_index();
            if weight > 0.0 && allowed(predecessor) && !reached.put(predecessor) {
                stack.push(predecessor);
            }
        }
    }

    reached
}

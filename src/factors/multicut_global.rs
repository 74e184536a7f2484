#![allow(dead_code)]

use std::{
    fmt::{self, Display},
    fs::File,
    io::{self, Write},
};

use crate::cfn::{cost_function_network::CostFunctionNetwork, solution::Solution};
use crate::data_structures::union_find::UnionFind;
use crate::numeric::vector::Cost;

use super::factor_trait::{Factor, PrimalState};

/// The global cycle-consistency factor over an entire multicut instance. Its dual
/// contribution is always zero — no reparametrization ever touches it, so it owns no
/// real cost table — but it enforces, at primal-evaluation time, that the edges
/// currently marked "not cut" never connect two nodes through a path that also
/// crosses an edge marked "cut": i.e. the predicted clusters (the components induced
/// by the uncut edges) must be consistent with every individual edge decision.
///
/// Per-edge primal bits are written into `edge_primal` by the same
/// `compute_right_from_left_primal` projection every other message uses, treating
/// each slot as this factor's "table index" the way an ordinary factor treats its
/// function-table entries.
pub struct MulticutGlobalFactor {
    variables: Vec<usize>,
    num_nodes: usize,
    edge_endpoints: Vec<(usize, usize)>,
    edge_primal: Vec<PrimalState>,
}

impl MulticutGlobalFactor {
    pub fn new(edge_variables: Vec<usize>, num_nodes: usize, edge_endpoints: Vec<(usize, usize)>) -> Self {
        let n = edge_variables.len();
        MulticutGlobalFactor {
            variables: edge_variables,
            num_nodes,
            edge_endpoints,
            edge_primal: vec![PrimalState::Unknown; n],
        }
    }

    pub fn set_edge_primal(&mut self, edge_slot: usize, cut: bool) {
        self.edge_primal[edge_slot] = PrimalState::Assigned(cut as usize);
    }

    /// Checks global cycle consistency: build a union-find over edges marked "not
    /// cut", then confirm no edge marked "cut" connects two nodes in the same
    /// component. Returns `false` if any edge's decision is still unknown.
    fn is_consistent(&self) -> Option<bool> {
        if self.edge_primal.iter().any(|p| *p == PrimalState::Unknown) {
            return None;
        }
        let mut uf = UnionFind::new(self.num_nodes);
        for (slot, &(u, v)) in self.edge_endpoints.iter().enumerate() {
            if self.edge_primal[slot] == PrimalState::Assigned(0) {
                uf.merge(u, v);
            }
        }
        for (slot, &(u, v)) in self.edge_endpoints.iter().enumerate() {
            if self.edge_primal[slot] == PrimalState::Assigned(1) && uf.connected(u, v) {
                return Some(false);
            }
        }
        Some(true)
    }
}

impl Factor for MulticutGlobalFactor {
    fn arity(&self) -> usize {
        self.variables.len()
    }

    fn function_table_len(&self) -> usize {
        0
    }

    fn variables(&self) -> &Vec<usize> {
        &self.variables
    }

    fn clone_function_table(&self) -> Vec<f64> {
        Vec::new()
    }

    fn map(&self, _mapping: fn(f64) -> f64) -> MulticutGlobalFactor {
        MulticutGlobalFactor {
            variables: self.variables.clone(),
            num_nodes: self.num_nodes,
            edge_endpoints: self.edge_endpoints.clone(),
            edge_primal: self.edge_primal.clone(),
        }
    }

    fn map_inplace(&mut self, _mapping: fn(&mut f64)) {}

    fn cost(&self, _cfn: &CostFunctionNetwork, _solution: &Solution) -> f64 {
        0.0
    }

    fn write_uai(&self, _file: &mut File, _mapping: fn(&f64) -> f64) -> Result<(), io::Error> {
        Ok(())
    }

    fn lower_bound(&self) -> Cost {
        0.0
    }

    fn min_marginal_along(&self, _axis: usize, out: &mut [Cost]) {
        out.iter_mut().for_each(|v| *v = 0.0);
    }

    fn init_primal(&mut self) {
        self.edge_primal.iter_mut().for_each(|p| *p = PrimalState::Unknown);
    }

    fn set_primal(&mut self, _entry: usize) {}

    fn get_primal(&self) -> PrimalState {
        PrimalState::Unknown
    }

    fn evaluate_primal(&self) -> Cost {
        match self.is_consistent() {
            Some(true) => 0.0,
            Some(false) | None => Cost::INFINITY,
        }
    }
}

impl Display for MulticutGlobalFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "global cycle consistency over {} edges", self.variables.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistent_triangle_with_no_cuts() {
        let mut g = MulticutGlobalFactor::new(vec![0, 1, 2], 3, vec![(0, 1), (1, 2), (0, 2)]);
        g.set_edge_primal(0, false);
        g.set_edge_primal(1, false);
        g.set_edge_primal(2, false);
        assert_eq!(g.evaluate_primal(), 0.0);
    }

    #[test]
    fn inconsistent_when_cut_edge_still_connected() {
        let mut g = MulticutGlobalFactor::new(vec![0, 1, 2], 3, vec![(0, 1), (1, 2), (0, 2)]);
        g.set_edge_primal(0, false);
        g.set_edge_primal(1, false);
        g.set_edge_primal(2, true); // 0-2 cut, but still connected via 0-1-2
        assert_eq!(g.evaluate_primal(), Cost::INFINITY);
    }

    #[test]
    fn unknown_edge_is_infeasible_until_resolved() {
        let g = MulticutGlobalFactor::new(vec![0, 1, 2], 3, vec![(0, 1), (1, 2), (0, 2)]);
        assert_eq!(g.evaluate_primal(), Cost::INFINITY);
    }
}

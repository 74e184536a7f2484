#![allow(dead_code)]

use std::{
    fmt::{self, Display},
    fs::File,
    io::{self, Write},
};

use crate::cfn::{cost_function_network::CostFunctionNetwork, solution::Solution, uai::vec_mapping_to_string};
use crate::numeric::vector::Cost;

use super::factor_trait::{Factor, PrimalState};

/// A multicut edge factor: the Lagrangean dual variable for one candidate cut edge of
/// the original graph. Modeled as a 2-entry table over an implicit boolean "is this
/// edge cut" indicator — `[cost_of_not_cut, cost_of_cut]` — so it reuses the ordinary
/// reparametrization algebra of every other tabular factor. `endpoints` is not touched
/// by the dual algebra at all; it exists so the tightening engine (§4.6) can rebuild
/// the residual graph without a side index.
pub struct MulticutEdgeFactor {
    variable: usize,
    variables: Vec<usize>,
    endpoints: (usize, usize),
    table: [f64; 2],
    primal: PrimalState,
}

impl MulticutEdgeFactor {
    pub fn new(variable: usize, endpoints: (usize, usize), cut_cost: f64) -> Self {
        MulticutEdgeFactor {
            variable,
            variables: vec![variable],
            endpoints,
            table: [0.0, cut_cost],
            primal: PrimalState::Unknown,
        }
    }

    pub fn endpoints(&self) -> (usize, usize) {
        self.endpoints
    }

    /// The residual cost used by cycle tightening: positive means "prefers not cut".
    pub fn residual_cost(&self) -> f64 {
        self.table[1] - self.table[0]
    }

    pub fn is_cut(&self) -> Option<bool> {
        match self.primal {
            PrimalState::Assigned(1) => Some(true),
            PrimalState::Assigned(0) => Some(false),
            _ => None,
        }
    }
}

impl Factor for MulticutEdgeFactor {
    fn arity(&self) -> usize {
        1
    }

    fn function_table_len(&self) -> usize {
        2
    }

    fn variables(&self) -> &Vec<usize> {
        &self.variables
    }

    fn clone_function_table(&self) -> Vec<f64> {
        self.table.to_vec()
    }

    fn map(&self, mapping: fn(f64) -> f64) -> MulticutEdgeFactor {
        MulticutEdgeFactor {
            variable: self.variable,
            variables: self.variables.clone(),
            endpoints: self.endpoints,
            table: [mapping(self.table[0]), mapping(self.table[1])],
            primal: self.primal,
        }
    }

    fn map_inplace(&mut self, mapping: fn(&mut f64)) {
        mapping(&mut self.table[0]);
        mapping(&mut self.table[1]);
    }

    fn cost(&self, _cfn: &CostFunctionNetwork, solution: &Solution) -> f64 {
        self.table[solution[self.variable]
            .expect("Solution is undefined on a variable involved in this factor")]
    }

    fn write_uai(&self, file: &mut File, mapping: fn(&f64) -> f64) -> Result<(), io::Error> {
        write!(
            file,
            "\n2\n{}\n",
            vec_mapping_to_string(&self.table.to_vec(), mapping)
        )
    }

    fn lower_bound(&self) -> Cost {
        self.table[0].min(self.table[1])
    }

    fn min_marginal_along(&self, axis: usize, out: &mut [Cost]) {
        debug_assert_eq!(axis, 0);
        out[0] = self.table[0];
        out[1] = self.table[1];
    }

    fn init_primal(&mut self) {
        self.primal = PrimalState::Unknown;
    }

    fn set_primal(&mut self, entry: usize) {
        self.primal = PrimalState::Assigned(entry);
    }

    fn get_primal(&self) -> PrimalState {
        self.primal
    }

    fn evaluate_primal(&self) -> Cost {
        match self.primal {
            PrimalState::Assigned(entry) => self.table[entry],
            PrimalState::Unknown => Cost::INFINITY,
        }
    }
}

impl Display for MulticutEdgeFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.table[0], self.table[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_bound_is_min_of_cut_and_uncut() {
        let e = MulticutEdgeFactor::new(0, (0, 1), -4.0);
        assert_eq!(e.lower_bound(), -4.0);
        assert_eq!(e.residual_cost(), -4.0);
    }

    #[test]
    fn primal_tracks_cut_state() {
        let mut e = MulticutEdgeFactor::new(0, (0, 1), 1.0);
        assert_eq!(e.is_cut(), None);
        e.set_primal(1);
        assert_eq!(e.is_cut(), Some(true));
        assert_eq!(e.evaluate_primal(), 1.0);
    }
}

#![allow(dead_code)]

use std::{
    fmt::{self, Display},
    fs::File,
    io::{self, Write},
};

use crate::cfn::{
    cost_function_network::CostFunctionNetwork,
    solution::Solution,
    uai::{vec_mapping_to_string, vec_to_string},
};
use crate::numeric::vector::Cost;

use super::factor_trait::{Factor, PrimalState};

/// The arity-1 specialization of the general tabular factor: a flat per-label cost
/// vector over a single variable. Kept distinct from [`super::general_factor::GeneralFactor`]
/// because unary factors are addressed directly by variable index throughout the
/// network (`Variable::factor_index`) rather than through the non-unary factor list.
pub struct UnaryFactor {
    variable: usize,
    variables: Vec<usize>,
    function_table: Vec<f64>,
    primal: PrimalState,
}

impl UnaryFactor {
    pub fn new(variable: usize, function_table: Vec<f64>) -> Self {
        UnaryFactor {
            variable,
            variables: vec![variable],
            function_table,
            primal: PrimalState::Unknown,
        }
    }
}

impl Factor for UnaryFactor {
    fn arity(&self) -> usize {
        1
    }

    fn function_table_len(&self) -> usize {
        self.function_table.len()
    }

    fn variables(&self) -> &Vec<usize> {
        &self.variables
    }

    fn clone_function_table(&self) -> Vec<f64> {
        self.function_table.clone()
    }

    fn map(&self, mapping: fn(f64) -> f64) -> UnaryFactor {
        UnaryFactor {
            variable: self.variable,
            variables: self.variables.clone(),
            function_table: self.function_table.iter().map(|&v| mapping(v)).collect(),
            primal: self.primal,
        }
    }

    fn map_inplace(&mut self, mapping: fn(&mut f64)) {
        self.function_table.iter_mut().for_each(mapping);
    }

    fn cost(&self, _cfn: &CostFunctionNetwork, solution: &Solution) -> f64 {
        self.function_table[solution[self.variable]
            .expect("Solution is undefined on a variable involved in this factor")]
    }

    fn write_uai(&self, file: &mut File, mapping: fn(&f64) -> f64) -> Result<(), io::Error> {
        write!(
            file,
            "\n{}\n{}\n",
            self.function_table.len(),
            vec_mapping_to_string(&self.function_table, mapping)
        )
    }

    fn lower_bound(&self) -> Cost {
        self.function_table
            .iter()
            .fold(Cost::INFINITY, |acc, &x| acc.min(x))
    }

    fn min_marginal_along(&self, axis: usize, out: &mut [Cost]) {
        debug_assert_eq!(axis, 0);
        out.copy_from_slice(&self.function_table);
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
            PrimalState::Assigned(entry) => self.function_table[entry],
            PrimalState::Unknown => Cost::INFINITY,
        }
    }
}

impl Display for UnaryFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", vec_to_string(&self.function_table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_bound_and_min_marginal() {
        let u = UnaryFactor::new(0, vec![3., 1., 2.]);
        assert_eq!(u.lower_bound(), 1.);
        let mut out = vec![0.; 3];
        u.min_marginal_along(0, &mut out);
        assert_eq!(out, vec![3., 1., 2.]);
    }

    #[test]
    fn primal_roundtrip() {
        let mut u = UnaryFactor::new(0, vec![3., 1., 2.]);
        u.set_primal(2);
        assert_eq!(u.evaluate_primal(), 2.);
        u.init_primal();
        assert_eq!(u.evaluate_primal(), Cost::INFINITY);
    }
}

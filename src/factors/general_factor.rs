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

/// An arbitrary-arity tabular factor: the single representation backing unary,
/// pairwise, triplet, counting, odd-wheel, and discrete-tomography factors alike.
/// `domain_sizes` lets `cost()`/`min_marginal_along()` walk the table without going
/// back through the owning network.
pub struct GeneralFactor {
    variables: Vec<usize>,
    domain_sizes: Vec<usize>,
    function_table: Vec<f64>,
    primal: PrimalState,
}

impl GeneralFactor {
    pub fn new(cfn: &CostFunctionNetwork, variables: Vec<usize>, function_table: Vec<f64>) -> Self {
        let domain_sizes = variables.iter().map(|&v| cfn.domain_size(v)).collect();
        GeneralFactor {
            variables,
            domain_sizes,
            function_table,
            primal: PrimalState::Unknown,
        }
    }

    pub fn from_parts(variables: Vec<usize>, domain_sizes: Vec<usize>, function_table: Vec<f64>) -> Self {
        GeneralFactor {
            variables,
            domain_sizes,
            function_table,
            primal: PrimalState::Unknown,
        }
    }

    /// Decomposes a flat table index into per-variable labels, last variable fastest.
    fn unflatten(&self, mut index: usize) -> Vec<usize> {
        let mut labels = vec![0; self.variables.len()];
        for i in (0..self.variables.len()).rev() {
            labels[i] = index % self.domain_sizes[i];
            index /= self.domain_sizes[i];
        }
        labels
    }
}

impl Factor for GeneralFactor {
    fn arity(&self) -> usize {
        self.variables.len()
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

    fn map(&self, mapping: fn(f64) -> f64) -> GeneralFactor {
        GeneralFactor {
            variables: self.variables.clone(),
            domain_sizes: self.domain_sizes.clone(),
            function_table: self.function_table.iter().map(|&v| mapping(v)).collect(),
            primal: self.primal,
        }
    }

    fn map_inplace(&mut self, mapping: fn(&mut f64)) {
        self.function_table.iter_mut().for_each(mapping);
    }

    fn cost(&self, cfn: &CostFunctionNetwork, solution: &Solution) -> f64 {
        let mut stride = 1;
        let mut index = 0;
        for &variable in self.variables.iter().rev() {
            index += stride
                * solution[variable]
                    .expect("Solution is undefined on a variable involved in this factor");
            stride *= cfn.domain_size(variable);
        }
        self.function_table[index]
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
        debug_assert_eq!(out.len(), self.domain_sizes[axis]);
        out.iter_mut().for_each(|v| *v = Cost::INFINITY);
        for (index, &value) in self.function_table.iter().enumerate() {
            let labels = self.unflatten(index);
            let slot = &mut out[labels[axis]];
            if value < *slot {
                *slot = value;
            }
        }
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

impl Display for GeneralFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", vec_to_string(&self.function_table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GeneralFactor {
        // variables 0, 1 with domain sizes 2, 3; table row-major, variable 1 fastest.
        GeneralFactor::from_parts(vec![0, 1], vec![2, 3], vec![5., 1., 4., 9., 2., 7.])
    }

    #[test]
    fn lower_bound_is_table_min() {
        assert_eq!(sample().lower_bound(), 1.);
    }

    #[test]
    fn min_marginal_along_axis0() {
        let f = sample();
        let mut out = vec![0.; 2];
        f.min_marginal_along(0, &mut out);
        assert_eq!(out, vec![1., 2.]);
    }

    #[test]
    fn min_marginal_along_axis1() {
        let f = sample();
        let mut out = vec![0.; 3];
        f.min_marginal_along(1, &mut out);
        assert_eq!(out, vec![4., 1., 4.]);
    }

    #[test]
    fn primal_roundtrip() {
        let mut f = sample();
        assert_eq!(f.get_primal(), PrimalState::Unknown);
        assert_eq!(f.evaluate_primal(), Cost::INFINITY);
        f.set_primal(1);
        assert_eq!(f.evaluate_primal(), 1.);
        f.init_primal();
        assert_eq!(f.get_primal(), PrimalState::Unknown);
    }
}

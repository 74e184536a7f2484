#![allow(dead_code)]

use std::{fmt::Display, fs::File, io};

use crate::cfn::cost_function_network::CostFunctionNetwork;
use crate::cfn::solution::Solution;
use crate::numeric::vector::Cost;

use super::{
    factor_trait::{Factor, PrimalState},
    general_factor::GeneralFactor,
    multicut_edge::MulticutEdgeFactor,
    multicut_global::MulticutGlobalFactor,
    multicut_triplet::MulticutTripletFactor,
    unary_factor::UnaryFactor,
};

/// Closed dispatch over every factor kind the network can hold. The scheduler,
/// message registry, and UAI I/O only ever reach a factor through this enum and the
/// `Factor` trait it forwards to — no caller matches on `FactorType` directly.
pub enum FactorType {
    Unary(UnaryFactor),
    General(GeneralFactor),
    MulticutEdge(MulticutEdgeFactor),
    MulticutTriplet(MulticutTripletFactor),
    MulticutGlobal(MulticutGlobalFactor),
}

impl FactorType {
    pub fn as_multicut_edge(&self) -> Option<&MulticutEdgeFactor> {
        match self {
            FactorType::MulticutEdge(factor) => Some(factor),
            _ => None,
        }
    }

    pub fn as_multicut_edge_mut(&mut self) -> Option<&mut MulticutEdgeFactor> {
        match self {
            FactorType::MulticutEdge(factor) => Some(factor),
            _ => None,
        }
    }

    pub fn as_multicut_triplet(&self) -> Option<&MulticutTripletFactor> {
        match self {
            FactorType::MulticutTriplet(factor) => Some(factor),
            _ => None,
        }
    }

    pub fn as_multicut_global_mut(&mut self) -> Option<&mut MulticutGlobalFactor> {
        match self {
            FactorType::MulticutGlobal(factor) => Some(factor),
            _ => None,
        }
    }
}

macro_rules! match_factor_action {
    ($factor_type:ident, $factor_match:ident, $action:expr) => {
        match $factor_type {
            FactorType::Unary($factor_match) => $action,
            FactorType::General($factor_match) => $action,
            FactorType::MulticutEdge($factor_match) => $action,
            FactorType::MulticutTriplet($factor_match) => $action,
            FactorType::MulticutGlobal($factor_match) => $action,
        }
    };
}

impl Factor for FactorType {
    fn arity(&self) -> usize {
        match_factor_action!(self, factor, factor.arity())
    }

    fn function_table_len(&self) -> usize {
        match_factor_action!(self, factor, factor.function_table_len())
    }

    fn variables(&self) -> &Vec<usize> {
        match_factor_action!(self, factor, factor.variables())
    }

    fn clone_function_table(&self) -> Vec<f64> {
        match_factor_action!(self, factor, factor.clone_function_table())
    }

    fn map(&self, mapping: fn(f64) -> f64) -> FactorType {
        match self {
            FactorType::Unary(factor) => FactorType::Unary(factor.map(mapping)),
            FactorType::General(factor) => FactorType::General(factor.map(mapping)),
            FactorType::MulticutEdge(factor) => FactorType::MulticutEdge(factor.map(mapping)),
            FactorType::MulticutTriplet(factor) => {
                FactorType::MulticutTriplet(factor.map(mapping))
            }
            FactorType::MulticutGlobal(factor) => FactorType::MulticutGlobal(factor.map(mapping)),
        }
    }

    fn map_inplace(&mut self, mapping: fn(&mut f64)) {
        match_factor_action!(self, factor, factor.map_inplace(mapping))
    }

    fn cost(&self, cfn: &CostFunctionNetwork, solution: &Solution) -> f64 {
        match_factor_action!(self, factor, factor.cost(cfn, solution))
    }

    fn write_uai(&self, file: &mut File, mapping: fn(&f64) -> f64) -> Result<(), io::Error> {
        match_factor_action!(self, factor, factor.write_uai(file, mapping))
    }

    fn lower_bound(&self) -> Cost {
        match_factor_action!(self, factor, factor.lower_bound())
    }

    fn min_marginal_along(&self, axis: usize, out: &mut [Cost]) {
        match_factor_action!(self, factor, factor.min_marginal_along(axis, out))
    }

    fn init_primal(&mut self) {
        match_factor_action!(self, factor, factor.init_primal())
    }

    fn set_primal(&mut self, entry: usize) {
        match_factor_action!(self, factor, factor.set_primal(entry))
    }

    fn get_primal(&self) -> PrimalState {
        match_factor_action!(self, factor, factor.get_primal())
    }

    fn evaluate_primal(&self) -> Cost {
        match_factor_action!(self, factor, factor.evaluate_primal())
    }

    fn propagate_primal(&mut self) {
        match_factor_action!(self, factor, factor.propagate_primal())
    }

    fn construct_sat_clauses(&self, var_begin: usize) -> (Vec<Vec<i64>>, usize) {
        match_factor_action!(self, factor, factor.construct_sat_clauses(var_begin))
    }

    fn serialize_dual(&self, out: &mut Vec<u8>) {
        match_factor_action!(self, factor, factor.serialize_dual(out))
    }

    fn serialize_primal(&self, out: &mut Vec<u8>) {
        match_factor_action!(self, factor, factor.serialize_primal(out))
    }
}

impl Display for FactorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match_factor_action!(self, factor, factor.fmt(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_the_right_variant() {
        let unary = FactorType::Unary(UnaryFactor::new(0, vec![1., 2., 3.]));
        assert_eq!(unary.arity(), 1);
        assert_eq!(unary.lower_bound(), 1.);

        let edge = FactorType::MulticutEdge(MulticutEdgeFactor::new(0, (0, 1), 5.0));
        assert_eq!(edge.function_table_len(), 2);
        assert_eq!(edge.as_multicut_edge().unwrap().endpoints(), (0, 1));

        let global = FactorType::MulticutGlobal(MulticutGlobalFactor::new(
            vec![0, 1, 2],
            3,
            vec![(0, 1), (1, 2), (0, 2)],
        ));
        assert_eq!(global.function_table_len(), 0);
    }
}

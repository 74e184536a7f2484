#![allow(dead_code)]

use std::{
    ops::{Index, IndexMut},
    slice::{Iter, IterMut},
};

use crate::{cfn::solution::Solution, CostFunctionNetwork, FactorOrigin};

/// Which half of a dual block-coordinate sweep a message is being sent for (§4.3).
/// SRMP sends directly from the running reparametrization; MPLP first averages all
/// incoming min-marginals, then sends the deviation from that average back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendingMode {
    Srmp,
    Mplp,
}

// Interface for messages.
// Note: reparametrizations are stored as messages, as every reparametrization can be treated as an initial message,
// or as a message from a factor to itself.
pub trait Message: Index<usize> + IndexMut<usize> {
    // When computing a reparametrization following equation (4) in the SRMP paper or another similar one,
    // one may need to subtract outgoing messages, which have a different dimension from the reparametrization vector.
    // This is handled by what is essentially tensor multiplication: each entry of an outgoing message is subtracted
    // from all entries of the reparametrization with the same label restriction.
    // `OutgoingAlignment` is a data structure that facilitates such operations on messages of different dimensions.
    type OutgoingAlignment;

    // Creates a new alignment structure for the given cost function network,
    // with `alpha` as the source factor and `beta` as the target factor.
    // Assumption: alpha contains all variables in beta.
    fn new_outgoing_alignment(
        cfn: &CostFunctionNetwork,
        alpha: &FactorOrigin,
        beta: &FactorOrigin,
    ) -> Self::OutgoingAlignment;

    // Returns an iterator over the entries of this message.
    fn iter(&self) -> Iter<f64>;

    // Returns a mutable iterator over the entries of this message.
    fn iter_mut(&mut self) -> IterMut<f64>;

    // Returns the smallest entry in the message.
    fn min(&self) -> &f64;

    // Returns the index of the smallest entry in the message.
    fn index_min(&self) -> usize;

    // Adds an incoming message to this message.
    fn add_assign_incoming(&mut self, rhs: &Self);

    // Subtracts an incoming message from this message.
    fn sub_assign_incoming(&mut self, rhs: &Self);

    // Adds an outgoing message to this message (with the help of the given alignment struct).
    // Assumption: `self` and `rhs` are aligned using `outgoing_alignment`.
    fn add_assign_outgoing(&mut self, rhs: &Self, outgoing_alignment: &Self::OutgoingAlignment);

    // Subtracts an outgoing message from this message (with the help of the given alignment struct).
    // Assumption: `self` and `rhs` are aligned using `outgoing_alignment`.
    fn sub_assign_outgoing(&mut self, rhs: &Self, outgoing_alignment: &Self::OutgoingAlignment);

    // Multiplies all entries of this message by the given value.
    fn mul_assign_scalar(&mut self, rhs: f64);

    // Adds the given value to all entries of this message.
    fn add_assign_scalar(&mut self, rhs: f64);

    // Computes the minimum from equation (17) in the SRMP paper over a given reparametrization,
    // assigns the result to this message, and returns the smallest value (for normalization purposes).
    // Assumption: `self` and `rhs` are aligned using `outgoing_alignment`.
    fn set_to_reparam_min(
        &mut self,
        rhs: &Self,
        outgoing_alignment: &Self::OutgoingAlignment,
    ) -> f64;

    // Computes the restricted minimum used when sending messages during primal rounding.
    // Assumption: `self` is a message from `alpha` to `beta`.
    fn restricted_min(
        &self,
        cfn: &CostFunctionNetwork,
        solution: &Solution,
        alpha: &FactorOrigin,
        beta: &FactorOrigin,
    ) -> Self;

    // Updates the given solution by computing the restricted minimum.
    // Assumption: `self` is a reparametrization being restricted to `beta` using `solution`.
    fn update_solution_restricted_min(
        &self,
        cfn: &CostFunctionNetwork,
        beta: &FactorOrigin,
        solution: &mut Solution,
    );

    /// Reports whether this message variant has a meaningful operation for `mode`.
    /// The scheduler consults this before attempting the operation and skips it
    /// rather than attempting-and-recovering; every variant in the core supports
    /// both modes, so the default is `true`.
    fn supports_mode(&self, _mode: SendingMode) -> bool {
        true
    }
}

/// Projects the primal label already decided on `alpha` into the matching slot(s) of
/// `beta`, committing the entries that restricted-minimization determines uniquely.
/// Built from the two primitives every message kind already implements: the restricted
/// min aligns `self` (alpha's reparametrization) down to beta's still-free variables,
/// then `update_solution_restricted_min` commits the argmin over those.
pub fn compute_right_from_left_primal<M: Message>(
    message: &M,
    cfn: &CostFunctionNetwork,
    alpha: &FactorOrigin,
    beta: &FactorOrigin,
    solution: &mut Solution,
) {
    let restricted = message.restricted_min(cfn, solution, alpha, beta);
    restricted.update_solution_restricted_min(cfn, beta, solution);
}

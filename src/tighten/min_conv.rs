#![allow(dead_code)]

//! Min-convolution: `c[k] = min_{i+j=k} a[i]+b[j]`, the primitive counting and
//! discrete-tomography factors need to fold a chain of per-variable cost vectors
//! into a running "cheapest cost to reach partial sum k" vector without ever
//! materializing the full product-of-domains table.
//!
//! The two sorted input sequences are expanded as a frontier over rank pairs
//! `(ra, rb)` in non-decreasing sum order (a min-heap keyed on `a[ra]+b[rb]`);
//! since both sequences are sorted ascending, every pair reachable from `(ra, rb)`
//! by incrementing either rank has a sum at least as large, so the first pop that
//! lands on a given `k = i+j` is that `k`'s minimum. This is the standard
//! smallest-pairwise-sums frontier algorithm, adapted to stop as soon as every
//! output slot below `k_max` has been filled.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::cfn::cost_function_network::CostFunctionNetwork;
use crate::factors::factor_type::FactorType;
use crate::factors::general_factor::GeneralFactor;
use crate::numeric::vector::Cost;

struct HeapEntry {
    sum: Cost,
    ra: usize,
    rb: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sum == other.sum
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the smallest sum first.
        other.sum.total_cmp(&self.sum)
    }
}

/// Computes `c[k] = min_{i+j=k} a[i]+b[j]` for `k` in `0..=min(k_max, a.len()+b.len()-2)`
/// (the full range if `k_max` is `None`), along with the `(i, j)` pair achieving each
/// minimum. Entries beyond the computed range are never populated.
pub fn min_convolution(
    a: &[Cost],
    b: &[Cost],
    k_max: Option<usize>,
) -> (Vec<Cost>, Vec<Option<(usize, usize)>>) {
    assert!(!a.is_empty() && !b.is_empty(), "min_convolution requires non-empty inputs");

    let full_len = a.len() + b.len() - 1;
    let out_len = k_max.map_or(full_len, |k| (k + 1).min(full_len));

    let mut a_sorted: Vec<(usize, Cost)> = a.iter().copied().enumerate().collect();
    a_sorted.sort_by(|x, y| x.1.total_cmp(&y.1));
    let mut b_sorted: Vec<(usize, Cost)> = b.iter().copied().enumerate().collect();
    b_sorted.sort_by(|x, y| x.1.total_cmp(&y.1));

    let mut out = vec![Cost::INFINITY; out_len];
    let mut argmin = vec![None; out_len];
    let mut remaining = out_len;

    let mut heap = BinaryHeap::new();
    let mut visited = HashSet::new();

    heap.push(HeapEntry {
        sum: a_sorted[0].1 + b_sorted[0].1,
        ra: 0,
        rb: 0,
    });
    visited.insert((0usize, 0usize));

    while let Some(HeapEntry { sum, ra, rb }) = heap.pop() {
        let (i, ai) = a_sorted[ra];
        let (j, bj) = b_sorted[rb];
        let k = i + j;

        if k < out_len && out[k].is_infinite() {
            out[k] = sum;
            argmin[k] = Some((i, j));
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }

        if ra + 1 < a_sorted.len() && visited.insert((ra + 1, rb)) {
            heap.push(HeapEntry {
                sum: a_sorted[ra + 1].1 + bj,
                ra: ra + 1,
                rb,
            });
        }
        if rb + 1 < b_sorted.len() && visited.insert((ra, rb + 1)) {
            heap.push(HeapEntry {
                sum: ai + b_sorted[rb + 1].1,
                ra,
                rb: rb + 1,
            });
        }
    }

    (out, argmin)
}

/// Builds the flat function table for a factor over `dims` (last axis fastest,
/// matching every other tabular factor) that is `0` where `feasible` holds of the
/// per-axis labels and `+inf` everywhere else.
fn deterministic_table(dims: &[usize], feasible: impl Fn(&[usize]) -> bool) -> Vec<f64> {
    let total: usize = dims.iter().product();
    let mut table = vec![f64::INFINITY; total];
    let mut labels = vec![0usize; dims.len()];
    for (index, slot) in table.iter_mut().enumerate() {
        let mut rem = index;
        for d in (0..dims.len()).rev() {
            labels[d] = rem % dims[d];
            rem /= dims[d];
        }
        if feasible(&labels) {
            *slot = 0.0;
        }
    }
    table
}

/// Installs a sum-constraint chain over `variables` (pre-existing, distinct,
/// increasing variable indices whose labels are read directly as the amount each
/// contributes, e.g. pixel intensities in a discrete-tomography row/column
/// constraint): a run of auxiliary prefix-sum variables linked by deterministic
/// "0 where consistent, +inf otherwise" factors, ending in a link that only allows
/// the final prefix to equal `target_sum`. `min_convolution` over all-zero cost
/// vectors is used purely to size each prefix variable's domain down to the sums
/// actually reachable from the variables folded in so far, instead of allocating
/// the full running range at every link. Returns the newly created auxiliary
/// variable indices, in chain order.
pub fn add_sum_constraint_chain(
    cfn: &mut CostFunctionNetwork,
    variables: &[usize],
    target_sum: usize,
) -> Vec<usize> {
    assert!(
        variables.len() >= 2,
        "a sum constraint chain needs at least two variables"
    );
    assert!(
        variables.windows(2).all(|w| w[0] < w[1]),
        "variables must be distinct and sorted in increasing order"
    );

    let domain_sizes: Vec<usize> = variables.iter().map(|&v| cfn.domain_size(v)).collect();

    // reach tracks, at 0 cost, every prefix sum achievable with the variables folded
    // in so far; only its length (the reachable range) is used here.
    let mut reach = vec![0.0; domain_sizes[0]];
    let mut aux_vars = Vec::with_capacity(variables.len() - 1);

    let zeros_1 = vec![0.0; domain_sizes[1]];
    reach = min_convolution(&reach, &zeros_1, None).0;
    let s1 = cfn.add_variable(reach.len());
    aux_vars.push(s1);

    let table = deterministic_table(&[domain_sizes[0], reach.len()], |labels| {
        labels[1] == labels[0]
    });
    cfn.add_factor(FactorType::General(GeneralFactor::from_parts(
        vec![variables[0], s1],
        vec![domain_sizes[0], reach.len()],
        table,
    )));

    let mut prev_aux = s1;
    let mut prev_domain = reach.len();

    for i in 1..variables.len() - 1 {
        let zeros_next = vec![0.0; domain_sizes[i + 1]];
        reach = min_convolution(&reach, &zeros_next, None).0;
        let s_next = cfn.add_variable(reach.len());
        aux_vars.push(s_next);

        debug_assert!(variables[i] < prev_aux && prev_aux < s_next);
        let table = deterministic_table(&[domain_sizes[i], prev_domain, reach.len()], |labels| {
            labels[1] + labels[0] == labels[2]
        });
        cfn.add_factor(FactorType::General(GeneralFactor::from_parts(
            vec![variables[i], prev_aux, s_next],
            vec![domain_sizes[i], prev_domain, reach.len()],
            table,
        )));

        prev_aux = s_next;
        prev_domain = reach.len();
    }

    let last = *variables.last().unwrap();
    let last_domain = *domain_sizes.last().unwrap();
    debug_assert!(last < prev_aux);
    let table = deterministic_table(&[last_domain, prev_domain], |labels| {
        labels[1] + labels[0] == target_sum
    });
    cfn.add_factor(FactorType::General(GeneralFactor::from_parts(
        vec![last, prev_aux],
        vec![last_domain, prev_domain],
        table,
    )));

    aux_vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::solution::Solution;
    use crate::factors::factor_trait::Factor;

    fn brute_force(a: &[Cost], b: &[Cost]) -> Vec<Cost> {
        let mut out = vec![Cost::INFINITY; a.len() + b.len() - 1];
        for (i, &ai) in a.iter().enumerate() {
            for (j, &bj) in b.iter().enumerate() {
                let slot = &mut out[i + j];
                if ai + bj < *slot {
                    *slot = ai + bj;
                }
            }
        }
        out
    }

    #[test]
    fn matches_brute_force_on_random_looking_inputs() {
        let a = vec![5.0, 1.0, 9.0, 2.0];
        let b = vec![3.0, 0.0, 7.0];
        let (got, argmin) = min_convolution(&a, &b, None);
        let expected = brute_force(&a, &b);
        assert_eq!(got, expected);
        for (k, entry) in argmin.iter().enumerate() {
            let (i, j) = entry.unwrap();
            assert_eq!(i + j, k);
            assert_eq!(a[i] + b[j], expected[k]);
        }
    }

    #[test]
    fn k_max_truncates_the_output_range() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![0.0, 0.0];
        let (got, _) = min_convolution(&a, &b, Some(1));
        assert_eq!(got.len(), 2);
        assert_eq!(got, vec![0.0, 0.0]);
    }

    #[test]
    fn single_entry_inputs_reduce_to_one_sum() {
        let (got, argmin) = min_convolution(&[4.0], &[6.0], None);
        assert_eq!(got, vec![10.0]);
        assert_eq!(argmin, vec![Some((0, 0))]);
    }

    #[test]
    fn sum_constraint_chain_forces_the_target_total() {
        let mut cfn = CostFunctionNetwork::from_domain_sizes(&vec![2, 2, 2], false, 0);
        let aux = add_sum_constraint_chain(&mut cfn, &[0, 1, 2], 2);
        assert_eq!(aux.len(), 2);

        // 1 + 1 + 0 = 2: every link factor should cost 0.
        let mut solution = Solution::new(cfn.num_variables());
        solution[0] = Some(1);
        solution[1] = Some(1);
        solution[2] = Some(0);
        solution[aux[0]] = Some(1); // prefix after x0: 1
        solution[aux[1]] = Some(2); // prefix after x0,x1: 2
        let cost: f64 = cfn.factors_iter().map(|f| f.cost(&cfn, &solution)).sum();
        assert_eq!(cost, 0.0);

        // 1 + 1 + 1 = 3 != 2: the final link must reject it.
        let mut bad = Solution::new(cfn.num_variables());
        bad[0] = Some(1);
        bad[1] = Some(1);
        bad[2] = Some(1);
        bad[aux[0]] = Some(1);
        bad[aux[1]] = Some(2);
        let bad_cost: f64 = cfn.factors_iter().map(|f| f.cost(&cfn, &bad)).sum();
        assert_eq!(bad_cost, Cost::INFINITY);
    }

    #[test]
    fn sum_constraint_chain_converges_under_the_dual_solver() {
        use crate::alg::srmp::SRMP;
        use crate::cfn::relaxation::{ConstructRelaxation, Relaxation};
        use crate::cfn::solver::{Solver, SolverOptions};
        use crate::factors::unary_factor::UnaryFactor;

        // Chain of eight binary variables, unaries biased to 0, constrained to
        // sum to exactly 3: the cheapest feasible labeling has exactly three 1s
        // and costs 3.
        let mut cfn = CostFunctionNetwork::from_domain_sizes(&vec![2; 8], true, 8);
        for variable in 0..8 {
            cfn.add_factor(FactorType::Unary(UnaryFactor::new(variable, vec![0.0, 1.0])));
        }
        add_sum_constraint_chain(&mut cfn, &(0..8).collect::<Vec<_>>(), 3);

        let relaxation = Relaxation::new(&cfn);
        let options = SolverOptions::default();
        let solver = SRMP::init(&cfn, &relaxation).run(&options);

        let solution = solver
            .solution()
            .expect("the rounding sub-pass should have produced a solution");
        let ones = (0..8).filter(|&v| solution[v] == Some(1)).count();
        assert_eq!(ones, 3);
        assert_eq!(solution.cost(&cfn), 3.0);
    }

    #[test]
    fn sum_constraint_chain_rejects_inconsistent_prefix() {
        let mut cfn = CostFunctionNetwork::from_domain_sizes(&vec![2, 2, 2], false, 0);
        let aux = add_sum_constraint_chain(&mut cfn, &[0, 1, 2], 2);

        let mut solution = Solution::new(cfn.num_variables());
        solution[0] = Some(1);
        solution[1] = Some(0);
        solution[2] = Some(1);
        solution[aux[0]] = Some(0); // should be 1 (x0 = 1)
        solution[aux[1]] = Some(2);
        let cost: f64 = cfn.factors_iter().map(|f| f.cost(&cfn, &solution)).sum();
        assert_eq!(cost, Cost::INFINITY);
    }
}

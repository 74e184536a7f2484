#![allow(dead_code)]

//! Exact two-phase min-sum inference over a relaxation graph that happens to be
//! tree-shaped: a spanning tree whose edges account for every scope membership in
//! the network, with no missing or extra edges. When that holds, a single
//! leaves-to-root min-marginalization pass followed by a root-to-leaves
//! backtrack recovers the exact minimizer, without any of the iterative
//! reparametrization the block-coordinate solver needs on general graphs.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use crate::cfn::relaxation::Relaxation;
use crate::cfn::solution::Solution;
use crate::factors::factor_trait::Factor;
use crate::{CostFunctionNetwork, FactorOrigin};

/// A spanning tree of a relaxation graph, built treating its (always
/// factor-to-variable) edges as undirected.
pub struct SpanningTree {
    root: NodeIndex<usize>,
    parent: HashMap<NodeIndex<usize>, NodeIndex<usize>>,
    children: HashMap<NodeIndex<usize>, Vec<NodeIndex<usize>>>,
    // Bottom-up order: every node's children precede it.
    post_order: Vec<NodeIndex<usize>>,
}

impl SpanningTree {
    fn children_of(&self, node: NodeIndex<usize>) -> &[NodeIndex<usize>] {
        self.children.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builds a spanning tree of `relaxation`, but only if the graph is already
/// tree-shaped: connected, with exactly `node_count() - 1` edges. Since every
/// edge in a `MinimalEdges` relaxation corresponds to exactly one (factor,
/// variable) scope membership, this condition also guarantees that every
/// non-unary factor's full scope coincides with its tree neighbors, which is
/// what makes the two-phase pass below exact rather than an approximation over
/// a subset of the network. Returns `None` when the graph isn't a tree.
pub fn build_spanning_tree(relaxation: &Relaxation) -> Option<SpanningTree> {
    let node_count = relaxation.node_count();
    if node_count == 0 || relaxation.edge_count() != node_count - 1 {
        return None;
    }

    let root = relaxation.node_indices().next()?;
    let mut parent = HashMap::new();
    let mut children: HashMap<NodeIndex<usize>, Vec<NodeIndex<usize>>> = HashMap::new();
    let mut visited = HashSet::new();
    let mut level_order = Vec::with_capacity(node_count);
    let mut queue = VecDeque::new();

    queue.push_back(root);
    visited.insert(root);
    while let Some(node) = queue.pop_front() {
        level_order.push(node);
        let mut neighbors: Vec<_> = relaxation.neighbors(node, Direction::Outgoing).collect();
        neighbors.extend(relaxation.neighbors(node, Direction::Incoming));
        for next in neighbors {
            if visited.insert(next) {
                parent.insert(next, node);
                children.entry(node).or_default().push(next);
                queue.push_back(next);
            }
        }
    }

    if visited.len() != node_count {
        return None;
    }

    // Non-increasing depth order: every child (strictly deeper than its
    // parent) precedes its parent.
    let mut post_order = level_order;
    post_order.reverse();

    Some(SpanningTree {
        root,
        parent,
        children,
        post_order,
    })
}

/// Per-value-of-the-parent-variable backtracking data for a non-root factor node.
struct FactorBackpointer {
    scope: Vec<usize>,
    parent_axis: usize,
    // Indexed by the parent variable's label: the full labeling of `scope`
    // (including the parent's own position) achieving the minimum.
    best_assignment: Vec<Vec<usize>>,
}

fn unflatten(domain_sizes: &[usize], mut index: usize) -> Vec<usize> {
    let mut labels = vec![0; domain_sizes.len()];
    for i in (0..domain_sizes.len()).rev() {
        labels[i] = index % domain_sizes[i];
        index /= domain_sizes[i];
    }
    labels
}

fn variable_cost_table(cfn: &CostFunctionNetwork, variable: usize) -> Vec<f64> {
    match cfn.get_factor(&FactorOrigin::Variable(variable)) {
        Some(factor) => factor.clone_function_table(),
        None => vec![0.0; cfn.domain_size(variable)],
    }
}

fn broadcast_add(combined: &mut [f64], domain_sizes: &[usize], axis: usize, message: &[f64]) {
    for (index, slot) in combined.iter_mut().enumerate() {
        let labels = unflatten(domain_sizes, index);
        *slot += message[labels[axis]];
    }
}

fn argmin_index(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .expect("non-empty table")
}

/// Leaves-to-root pass: computes the up-message (and, for factor nodes, the
/// backtracking table) for every node except the root.
fn compute_up_messages(
    cfn: &CostFunctionNetwork,
    relaxation: &Relaxation,
    tree: &SpanningTree,
) -> (
    HashMap<NodeIndex<usize>, Vec<f64>>,
    HashMap<NodeIndex<usize>, FactorBackpointer>,
) {
    let mut up_messages = HashMap::new();
    let mut backpointers = HashMap::new();

    for &node in &tree.post_order {
        if node == tree.root {
            continue;
        }
        match relaxation.factor_origin(node) {
            FactorOrigin::Variable(variable) => {
                let domain = cfn.domain_size(*variable);
                let mut message = variable_cost_table(cfn, *variable);
                for &child in tree.children_of(node) {
                    let child_message = &up_messages[&child];
                    for x in 0..domain {
                        message[x] += child_message[x];
                    }
                }
                up_messages.insert(node, message);
            }
            FactorOrigin::NonUnaryFactor(factor_index) => {
                let origin = FactorOrigin::NonUnaryFactor(*factor_index);
                let scope = cfn.factor_variables(&origin).into_owned();
                let domain_sizes: Vec<usize> =
                    scope.iter().map(|&v| cfn.domain_size(v)).collect();
                let mut combined = cfn
                    .get_factor(&origin)
                    .expect("non-unary factor origin must resolve to a factor")
                    .clone_function_table();

                for &child in tree.children_of(node) {
                    let FactorOrigin::Variable(child_var) = relaxation.factor_origin(child) else {
                        unreachable!("a non-unary factor's tree children are its scope variables")
                    };
                    let axis = scope.iter().position(|v| v == child_var).unwrap();
                    broadcast_add(&mut combined, &domain_sizes, axis, &up_messages[&child]);
                }

                let parent = tree.parent[&node];
                let FactorOrigin::Variable(parent_var) = relaxation.factor_origin(parent) else {
                    unreachable!("a non-unary factor's tree parent is one of its scope variables")
                };
                let parent_axis = scope.iter().position(|v| v == parent_var).unwrap();
                let parent_domain = cfn.domain_size(*parent_var);

                let mut message = vec![f64::INFINITY; parent_domain];
                let mut best_assignment = vec![Vec::new(); parent_domain];
                for (index, &value) in combined.iter().enumerate() {
                    let labels = unflatten(&domain_sizes, index);
                    let slot = labels[parent_axis];
                    if value < message[slot] {
                        message[slot] = value;
                        best_assignment[slot] = labels;
                    }
                }

                up_messages.insert(node, message);
                backpointers.insert(
                    node,
                    FactorBackpointer {
                        scope,
                        parent_axis,
                        best_assignment,
                    },
                );
            }
        }
    }

    (up_messages, backpointers)
}

fn assign_down(
    cfn: &CostFunctionNetwork,
    relaxation: &Relaxation,
    tree: &SpanningTree,
    backpointers: &HashMap<NodeIndex<usize>, FactorBackpointer>,
    solution: &mut Solution,
    node: NodeIndex<usize>,
    incoming_value: usize,
) {
    match relaxation.factor_origin(node) {
        FactorOrigin::Variable(variable) => {
            solution[*variable] = Some(incoming_value);
            for &child in tree.children_of(node) {
                assign_down(cfn, relaxation, tree, backpointers, solution, child, incoming_value);
            }
        }
        FactorOrigin::NonUnaryFactor(_) => {
            let backpointer = &backpointers[&node];
            let labels = &backpointer.best_assignment[incoming_value];
            for &child in tree.children_of(node) {
                let FactorOrigin::Variable(child_var) = relaxation.factor_origin(child) else {
                    unreachable!("a non-unary factor's tree children are its scope variables")
                };
                let axis = backpointer.scope.iter().position(|v| v == child_var).unwrap();
                assign_down(cfn, relaxation, tree, backpointers, solution, child, labels[axis]);
            }
        }
    }
}

/// Runs the exact two-phase min-sum pass over `tree` and returns the optimal
/// (fully labeled) solution. `tree` must come from [`build_spanning_tree`]
/// applied to the same `relaxation`.
pub fn solve_tree_exact(
    cfn: &CostFunctionNetwork,
    relaxation: &Relaxation,
    tree: &SpanningTree,
) -> Solution {
    let (up_messages, backpointers) = compute_up_messages(cfn, relaxation, tree);
    let mut solution = Solution::new(cfn.num_variables());

    match relaxation.factor_origin(tree.root) {
        FactorOrigin::Variable(variable) => {
            let domain = cfn.domain_size(*variable);
            let mut total = variable_cost_table(cfn, *variable);
            for &child in tree.children_of(tree.root) {
                let child_message = &up_messages[&child];
                for x in 0..domain {
                    total[x] += child_message[x];
                }
            }
            let best = argmin_index(&total);
            assign_down(cfn, relaxation, tree, &backpointers, &mut solution, tree.root, best);
        }
        FactorOrigin::NonUnaryFactor(factor_index) => {
            let origin = FactorOrigin::NonUnaryFactor(*factor_index);
            let scope = cfn.factor_variables(&origin).into_owned();
            let domain_sizes: Vec<usize> = scope.iter().map(|&v| cfn.domain_size(v)).collect();
            let mut combined = cfn
                .get_factor(&origin)
                .expect("non-unary factor origin must resolve to a factor")
                .clone_function_table();

            for &child in tree.children_of(tree.root) {
                let FactorOrigin::Variable(child_var) = relaxation.factor_origin(child) else {
                    unreachable!("a non-unary factor's tree children are its scope variables")
                };
                let axis = scope.iter().position(|v| v == child_var).unwrap();
                broadcast_add(&mut combined, &domain_sizes, axis, &up_messages[&child]);
            }

            let best_index = argmin_index(&combined);
            let labels = unflatten(&domain_sizes, best_index);
            for &child in tree.children_of(tree.root) {
                let FactorOrigin::Variable(child_var) = relaxation.factor_origin(child) else {
                    unreachable!("a non-unary factor's tree children are its scope variables")
                };
                let axis = scope.iter().position(|v| v == child_var).unwrap();
                assign_down(
                    cfn,
                    relaxation,
                    tree,
                    &backpointers,
                    &mut solution,
                    child,
                    labels[axis],
                );
            }
        }
    }

    solution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::factor_type::FactorType;
    use crate::factors::general_factor::GeneralFactor;
    use crate::cfn::relaxation::ConstructRelaxation;

    #[test]
    fn solves_a_chain_of_two_pairwise_factors() {
        // Variables 0 - 1 - 2, domain size 2 each, chain of two pairwise factors.
        let mut cfn = CostFunctionNetwork::from_domain_sizes(&vec![2, 2, 2], false, 2);
        // f(0,1): favors (0,1) = (1,0)
        cfn.add_factor(FactorType::General(GeneralFactor::new(
            &cfn,
            vec![0, 1],
            vec![5.0, 4.0, 0.0, 5.0],
        )));
        // f(1,2): favors (1,2) = (0,1)
        cfn.add_factor(FactorType::General(GeneralFactor::new(
            &cfn,
            vec![1, 2],
            vec![3.0, 0.0, 5.0, 5.0],
        )));

        let relaxation = Relaxation::new(&cfn);
        let tree = build_spanning_tree(&relaxation).expect("chain relaxation is a tree");
        let solution = solve_tree_exact(&cfn, &relaxation, &tree);

        assert_eq!(solution[0], Some(1));
        assert_eq!(solution[1], Some(0));
        assert_eq!(solution[2], Some(1));
        assert_eq!(solution.cost(&cfn), 0.0);
    }

    #[test]
    fn rejects_a_graph_with_a_cycle() {
        let mut cfn = CostFunctionNetwork::from_domain_sizes(&vec![2, 2, 2], false, 3);
        cfn.add_factor(FactorType::General(GeneralFactor::new(
            &cfn,
            vec![0, 1],
            vec![0.0, 1.0, 1.0, 0.0],
        )));
        cfn.add_factor(FactorType::General(GeneralFactor::new(
            &cfn,
            vec![1, 2],
            vec![0.0, 1.0, 1.0, 0.0],
        )));
        cfn.add_factor(FactorType::General(GeneralFactor::new(
            &cfn,
            vec![0, 2],
            vec![0.0, 1.0, 1.0, 0.0],
        )));

        let relaxation = Relaxation::new(&cfn);
        assert!(build_spanning_tree(&relaxation).is_none());
    }

    #[test]
    fn solves_a_star_with_a_ternary_root_factor() {
        // Root factor over variables 0, 1, 2; no other factors, so all three
        // variable nodes are direct tree children of the factor node.
        let mut cfn = CostFunctionNetwork::from_domain_sizes(&vec![2, 2, 2], false, 1);
        cfn.add_factor(FactorType::General(GeneralFactor::new(
            &cfn,
            vec![0, 1, 2],
            // Only (0,1,2) = (1,1,0) is cheap.
            vec![9., 9., 9., 9., 9., 9., 0., 9.],
        )));

        let relaxation = Relaxation::new(&cfn);
        let tree = build_spanning_tree(&relaxation).expect("star relaxation is a tree");
        let solution = solve_tree_exact(&cfn, &relaxation, &tree);

        assert_eq!(solution[0], Some(1));
        assert_eq!(solution[1], Some(1));
        assert_eq!(solution[2], Some(0));
    }
}

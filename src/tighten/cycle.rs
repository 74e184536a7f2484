#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};

use crate::data_structures::union_find::UnionFind;
use crate::factors::factor_type::FactorType;
use crate::factors::multicut_edge::MulticutEdgeFactor;
use crate::factors::multicut_triplet::MulticutTripletFactor;
use crate::{CostFunctionNetwork, FactorOrigin};

/// A candidate multicut edge factor read off the network: its owning factor index,
/// endpoints, and current residual cost (`cost_cut - cost_not_cut`).
struct ResidualEdge {
    factor_index: usize,
    u: usize,
    v: usize,
    theta: f64,
}

fn collect_residual_edges(cfn: &CostFunctionNetwork) -> Vec<ResidualEdge> {
    cfn.factors_iter()
        .enumerate()
        .filter_map(|(factor_index, factor)| {
            factor.as_multicut_edge().map(|edge| ResidualEdge {
                factor_index,
                u: edge.endpoints().0,
                v: edge.endpoints().1,
                theta: edge.residual_cost(),
            })
        })
        .collect()
}

/// Rotates a cycle (as a sequence of node ids, first == implicit last) so the
/// smallest node comes first, then reverses it if the second node exceeds the
/// last, per the normal-form rule used to dedupe cycles found from either
/// direction or starting point.
fn normal_form(mut cycle: Vec<usize>) -> Vec<usize> {
    let min_pos = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, &node)| node)
        .map(|(pos, _)| pos)
        .unwrap_or(0);
    cycle.rotate_left(min_pos);
    if cycle.len() > 2 && cycle[1] > cycle[cycle.len() - 1] {
        let first = cycle.remove(0);
        cycle.reverse();
        cycle.insert(0, first);
    }
    cycle
}

fn shortest_path(
    adjacency: &HashMap<usize, Vec<usize>>,
    source: usize,
    target: usize,
    forbidden_edge: (usize, usize),
) -> Option<Vec<usize>> {
    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    let mut parent = HashMap::new();

    queue.push_back(source);
    visited.insert(source);

    while let Some(node) = queue.pop_front() {
        if node == target {
            let mut path = vec![target];
            let mut cur = target;
            while let Some(&p) = parent.get(&cur) {
                path.push(p);
                cur = p;
            }
            path.reverse();
            return Some(path);
        }
        for &next in adjacency.get(&node).into_iter().flatten() {
            if (node == forbidden_edge.0 && next == forbidden_edge.1)
                || (node == forbidden_edge.1 && next == forbidden_edge.0)
            {
                continue;
            }
            if visited.insert(next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    None
}

/// Finds or creates the multicut edge factor for `(a, b)`, returning its factor
/// index. Used to fill in missing triangle edges during cycle triangulation; a
/// freshly created edge starts at zero cost, as the specification requires.
fn find_or_create_edge(
    cfn: &mut CostFunctionNetwork,
    edge_lookup: &mut HashMap<(usize, usize), usize>,
    a: usize,
    b: usize,
) -> usize {
    let key = if a < b { (a, b) } else { (b, a) };
    if let Some(&index) = edge_lookup.get(&key) {
        return index;
    }
    let new_variable = cfn.add_variable(2);
    cfn.add_factor(FactorType::MulticutEdge(MulticutEdgeFactor::new(
        new_variable,
        key,
        0.0,
    )));
    let index = cfn.factors_len() - 1;
    edge_lookup.insert(key, index);
    index
}

/// Runs one round of cycle tightening: finds violated edges (residual cost at
/// most `-min_dual_increase`) whose endpoints are already connected through
/// strictly-positive edges, converts the first such cycle found per edge to
/// normal form, triangulates cycles longer than three nodes from the smallest
/// node, and instantiates any missing `MulticutTripletFactor`s. Returns the
/// number of triplet factors added; stops early once `max_constraints` is hit.
pub fn tighten_cycles(
    cfn: &mut CostFunctionNetwork,
    min_dual_increase: f64,
    max_constraints: Option<usize>,
) -> usize {
    let edges = collect_residual_edges(cfn);
    if edges.is_empty() {
        return 0;
    }

    let num_nodes = edges
        .iter()
        .flat_map(|e| [e.u, e.v])
        .max()
        .map(|m| m + 1)
        .unwrap_or(0);

    let mut uf = UnionFind::new(num_nodes);
    let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut edge_lookup: HashMap<(usize, usize), usize> = HashMap::new();
    let mut violated = Vec::new();

    for edge in &edges {
        let key = if edge.u < edge.v {
            (edge.u, edge.v)
        } else {
            (edge.v, edge.u)
        };
        edge_lookup.insert(key, edge.factor_index);

        if edge.theta >= min_dual_increase {
            uf.merge(edge.u, edge.v);
            adjacency.entry(edge.u).or_default().push(edge.v);
            adjacency.entry(edge.v).or_default().push(edge.u);
        }
        if edge.theta <= -min_dual_increase {
            violated.push((edge.u, edge.v, edge.theta));
        }
    }

    // Strongest violations (most negative residual cost) first.
    violated.sort_by(|a, b| a.2.total_cmp(&b.2));

    let mut seen_triangles: HashSet<(usize, usize, usize)> = HashSet::new();
    let mut added = 0usize;

    for (u, v, _theta) in violated {
        if let Some(limit) = max_constraints {
            if added >= limit {
                break;
            }
        }
        if uf.find_read_only(u) != uf.find_read_only(v) {
            continue;
        }
        let Some(path) = shortest_path(&adjacency, u, v, (u, v)) else {
            continue;
        };

        let cycle = normal_form(path);
        let smallest = cycle[0];

        // Triangulate from the smallest node: connect it to every other node on
        // the cycle, instantiating a triplet factor per resulting triangle.
        for window in cycle[1..].windows(2) {
            let (a, b) = (window[0], window[1]);
            if a == smallest || b == smallest {
                continue;
            }
            let mut triangle = [smallest, a, b];
            triangle.sort_unstable();
            let key = (triangle[0], triangle[1], triangle[2]);
            if !seen_triangles.insert(key) {
                continue;
            }
            if let Some(limit) = max_constraints {
                if added >= limit {
                    break;
                }
            }

            let edge_sm_a = find_or_create_edge(cfn, &mut edge_lookup, smallest, a);
            let edge_sm_b = find_or_create_edge(cfn, &mut edge_lookup, smallest, b);
            let edge_a_b = find_or_create_edge(cfn, &mut edge_lookup, a, b);

            let variables = {
                let mut vs = [
                    cfn.factor_variables(&FactorOrigin::NonUnaryFactor(edge_sm_a))[0],
                    cfn.factor_variables(&FactorOrigin::NonUnaryFactor(edge_sm_b))[0],
                    cfn.factor_variables(&FactorOrigin::NonUnaryFactor(edge_a_b))[0],
                ];
                vs.sort_unstable();
                vs
            };

            cfn.add_factor(FactorType::MulticutTriplet(MulticutTripletFactor::new(
                variables,
                (smallest, a, b),
                (0.0, 0.0, 0.0, 0.0),
            )));
            added += 1;
        }
    }

    added
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_form_rotates_to_smallest_first() {
        let cycle = vec![2, 0, 1];
        assert_eq!(normal_form(cycle), vec![0, 1, 2]);
    }

    #[test]
    fn shortest_path_avoids_forbidden_edge() {
        let mut adjacency = HashMap::new();
        adjacency.insert(0, vec![1, 2]);
        adjacency.insert(1, vec![0, 2]);
        adjacency.insert(2, vec![0, 1]);
        let path = shortest_path(&adjacency, 0, 1, (0, 1)).unwrap();
        assert_eq!(path, vec![0, 2, 1]);
    }

    #[test]
    fn tighten_finds_violated_triangle() {
        let mut cfn = CostFunctionNetwork::from_domain_sizes(&vec![2, 2, 2], false, 3);
        cfn.add_factor(FactorType::MulticutEdge(MulticutEdgeFactor::new(
            0,
            (0, 1),
            -4.0,
        )));
        cfn.add_factor(FactorType::MulticutEdge(MulticutEdgeFactor::new(
            1,
            (0, 2),
            1.0,
        )));
        cfn.add_factor(FactorType::MulticutEdge(MulticutEdgeFactor::new(
            2,
            (1, 2),
            1.0,
        )));

        let added = tighten_cycles(&mut cfn, 0.5, None);
        assert_eq!(added, 1);
    }
}

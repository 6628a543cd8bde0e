use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{Result, RoutingError};
use crate::topology::{AdjacencyGraph, Topology};

use super::spf::{compute_spf_tree, shortest_path_with};
use super::DisjointPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransformedArc {
    Forward(usize),
    Reversed(usize),
}

/// Suurballe's two-path search on `graph`. Arc ids in the result are `graph` arcs.
fn disjoint_arcs<W>(
    graph: &AdjacencyGraph,
    weight: W,
    source: usize,
    target: usize,
) -> DisjointPair
where
    W: Fn(usize) -> f64,
{
    let tree = compute_spf_tree(graph, source, None, &weight);
    let Some(first) = tree.path_to(graph, target) else {
        return DisjointPair::default();
    };
    let on_first: BTreeSet<usize> = first.iter().copied().collect();

    // residual graph: links of the first path reversed at zero cost, others at reduced cost
    let mut residual = AdjacencyGraph::with_nodes(graph.node_count());
    let mut origin_of: Vec<TransformedArc> = Vec::new();
    let mut reduced: Vec<f64> = Vec::new();
    for arc in 0..graph.arc_count() {
        let w = weight(arc);
        let (u, v) = graph.ends(arc);
        if !w.is_finite() || w < 0.0 || !tree.reaches(u) || !tree.reaches(v) {
            continue;
        }
        if on_first.contains(&arc) {
            residual.add_arc(v, u);
            origin_of.push(TransformedArc::Reversed(arc));
            reduced.push(0.0);
        } else {
            residual.add_arc(u, v);
            origin_of.push(TransformedArc::Forward(arc));
            reduced.push((w + tree.dist[u] - tree.dist[v]).max(0.0));
        }
    }

    let Some((second, _)) = shortest_path_with(&residual, source, target, |h| reduced[h]) else {
        return DisjointPair {
            first,
            second: Vec::new(),
        };
    };

    // cancel links traversed in both directions
    let mut union = on_first;
    for h in second {
        match origin_of[h] {
            TransformedArc::Forward(arc) => {
                union.insert(arc);
            }
            TransformedArc::Reversed(arc) => {
                union.remove(&arc);
            }
        }
    }

    let within = |set: &BTreeSet<usize>, arc: usize| {
        if set.contains(&arc) {
            weight(arc)
        } else {
            f64::INFINITY
        }
    };
    let Some((a, _)) = shortest_path_with(graph, source, target, |arc| within(&union, arc)) else {
        return DisjointPair::default();
    };
    for arc in &a {
        union.remove(arc);
    }
    let b = shortest_path_with(graph, source, target, |arc| within(&union, arc))
        .map(|(path, _)| path)
        .unwrap_or_default();

    DisjointPair {
        first: a,
        second: b,
    }
}

fn check_endpoints(
    topology: &Topology,
    weights: &[f64],
    origin: usize,
    destination: usize,
) -> Result<()> {
    topology.check_node(origin)?;
    topology.check_node(destination)?;
    topology.check_weights(weights)?;
    if origin == destination {
        return Err(RoutingError::InvalidDemand(format!(
            "disjoint paths requested from node {origin} to itself"
        )));
    }
    Ok(())
}

/// Best pair of link-disjoint paths; links with infinite weight are forbidden.
///
/// When only one path exists `second` is empty; when none exists both are.
pub fn link_disjoint_pair(
    topology: &Topology,
    weights: &[f64],
    origin: usize,
    destination: usize,
) -> Result<DisjointPair> {
    check_endpoints(topology, weights, origin, destination)?;
    let pair = disjoint_arcs(topology.graph(), |id| weights[id], origin, destination);
    debug!(
        "link-disjoint {origin}->{destination}: first={:?} second={:?}",
        pair.first, pair.second
    );
    Ok(pair)
}

/// Best pair of paths sharing no node other than the endpoints.
///
/// Each node `n` is split into `n` (in) and `n + N` (out) joined by a unit-weight
/// arc; topology links run out -> in. Every transit node therefore adds one to a
/// path's cost. Split arcs are dropped from the result.
pub fn node_disjoint_pair(
    topology: &Topology,
    weights: &[f64],
    origin: usize,
    destination: usize,
) -> Result<DisjointPair> {
    check_endpoints(topology, weights, origin, destination)?;
    let n = topology.node_count();
    let mut split = AdjacencyGraph::with_nodes(2 * n);
    let mut link_of: Vec<Option<usize>> = Vec::with_capacity(n + topology.link_count());
    for node in 0..n {
        split.add_arc(node, node + n);
        link_of.push(None);
    }
    for (id, link) in topology.links().iter().enumerate() {
        split.add_arc(link.origin + n, link.destination);
        link_of.push(Some(id));
    }

    let pair = disjoint_arcs(
        &split,
        |arc| match link_of[arc] {
            Some(id) => weights[id],
            None => 1.0,
        },
        origin + n,
        destination,
    );
    let project = |arcs: Vec<usize>| -> Vec<usize> {
        arcs.into_iter().filter_map(|arc| link_of[arc]).collect()
    };
    let pair = DisjointPair {
        first: project(pair.first),
        second: project(pair.second),
    };
    debug!(
        "node-disjoint {origin}->{destination}: first={:?} second={:?}",
        pair.first, pair.second
    );
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_compute::continuity::{check_continuity, LoopCheck};
    use crate::topology::Link;

    fn scenario(last: (usize, usize)) -> Topology {
        Topology::new(
            4,
            vec![
                Link::new(0, 1),
                Link::new(1, 2),
                Link::new(0, 2),
                Link::new(2, 3),
                Link::new(last.0, last.1).with_cost(5.0),
            ],
        )
        .unwrap()
    }

    fn shares_link(pair: &DisjointPair) -> bool {
        pair.first.iter().any(|l| pair.second.contains(l))
    }

    #[test]
    fn shared_bottleneck_leaves_second_slot_empty() {
        let topo = scenario((3, 1));
        let pair = link_disjoint_pair(&topo, &topo.costs(), 0, 3).unwrap();
        assert_eq!(pair.first, vec![2, 3]);
        assert!(pair.second.is_empty());
        assert!(!pair.is_complete());
    }

    #[test]
    fn forward_heavy_link_gives_disjoint_pair() {
        let topo = scenario((1, 3));
        let pair = link_disjoint_pair(&topo, &topo.costs(), 0, 3).unwrap();
        assert_eq!(pair.first, vec![2, 3]);
        assert_eq!(pair.second, vec![0, 4]);
    }

    #[test]
    fn escapes_the_greedy_trap() {
        // removing the shortest path 0-1-2-3 would disconnect the pair
        let topo = Topology::new(
            4,
            vec![
                Link::new(0, 1),
                Link::new(1, 2),
                Link::new(2, 3),
                Link::new(0, 2).with_cost(2.5),
                Link::new(1, 3).with_cost(2.5),
            ],
        )
        .unwrap();
        let pair = link_disjoint_pair(&topo, &topo.costs(), 0, 3).unwrap();
        assert!(pair.is_complete());
        assert!(!shares_link(&pair));
        let found: BTreeSet<Vec<usize>> = [pair.first.clone(), pair.second.clone()].into();
        assert_eq!(found, BTreeSet::from([vec![0, 4], vec![3, 2]]));
        for path in [&pair.first, &pair.second] {
            assert!(check_continuity(&topo, path, LoopCheck::Node).is_ok());
        }
    }

    #[test]
    fn unreachable_gives_two_empty_slots() {
        let topo = scenario((3, 1));
        let pair = link_disjoint_pair(&topo, &topo.costs(), 3, 0).unwrap();
        assert_eq!(pair, DisjointPair::default());
    }

    #[test]
    fn forbidden_links_are_respected() {
        let topo = scenario((1, 3));
        let mut weights = topo.costs();
        weights[4] = f64::INFINITY;
        let pair = link_disjoint_pair(&topo, &weights, 0, 3).unwrap();
        assert_eq!(pair.first, vec![2, 3]);
        assert!(pair.second.is_empty());
    }

    fn bow_tie(with_bypass: bool) -> Topology {
        let mut links = vec![
            Link::new(0, 2),
            Link::new(2, 4),
            Link::new(0, 1),
            Link::new(1, 2),
            Link::new(2, 3),
            Link::new(3, 4),
        ];
        if with_bypass {
            links.push(Link::new(1, 4).with_cost(10.0));
        }
        Topology::new(5, links).unwrap()
    }

    #[test]
    fn node_mode_rejects_shared_transit_node() {
        let topo = bow_tie(false);
        let by_link = link_disjoint_pair(&topo, &topo.costs(), 0, 4).unwrap();
        assert_eq!(by_link.first, vec![0, 1]);
        assert_eq!(by_link.second, vec![2, 3, 4, 5]);

        let by_node = node_disjoint_pair(&topo, &topo.costs(), 0, 4).unwrap();
        assert_eq!(by_node.first, vec![0, 1]);
        assert!(by_node.second.is_empty());
    }

    #[test]
    fn node_mode_finds_bypass() {
        let topo = bow_tie(true);
        let pair = node_disjoint_pair(&topo, &topo.costs(), 0, 4).unwrap();
        assert!(pair.is_complete());
        let first_nodes = topo.path_nodes(&pair.first);
        let second_nodes = topo.path_nodes(&pair.second);
        let inner = &first_nodes[1..first_nodes.len() - 1];
        assert!(inner.iter().all(|n| !second_nodes.contains(n)));
        let found: BTreeSet<Vec<usize>> = [pair.first, pair.second].into();
        assert_eq!(found, BTreeSet::from([vec![0, 1], vec![2, 6]]));
    }

    #[test]
    fn node_mode_charges_transit_nodes() {
        // 0-1-2-3-4-5 and 0-7-8-9-10-5 weigh 5 over four transit nodes each,
        // 0-6-5 weighs 5.5 over one
        let mut links: Vec<Link> = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)]
            .into_iter()
            .chain([(0, 7), (7, 8), (8, 9), (9, 10), (10, 5)])
            .map(|(a, b)| Link::new(a, b))
            .collect();
        links.push(Link::new(0, 6).with_cost(2.75));
        links.push(Link::new(6, 5).with_cost(2.75));
        let topo = Topology::new(11, links).unwrap();

        let by_link = link_disjoint_pair(&topo, &topo.costs(), 0, 5).unwrap();
        let found: BTreeSet<Vec<usize>> = [by_link.first, by_link.second].into();
        assert_eq!(found, BTreeSet::from([vec![0, 1, 2, 3, 4], vec![5, 6, 7, 8, 9]]));

        let by_node = node_disjoint_pair(&topo, &topo.costs(), 0, 5).unwrap();
        assert_eq!(by_node.first, vec![10, 11]);
        assert_eq!(by_node.second, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn self_pair_is_invalid() {
        let topo = scenario((3, 1));
        assert!(link_disjoint_pair(&topo, &topo.costs(), 2, 2).is_err());
    }
}

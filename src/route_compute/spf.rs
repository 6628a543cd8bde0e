use crate::error::{Result, RoutingError};
use crate::topology::{AdjacencyGraph, Topology};

use super::frontier::DistanceFrontier;

pub(crate) const EPS: f64 = 1e-9;

fn arc_weight_usable(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}

/// Shortest-path tree rooted at `source`, indexed by node.
///
/// Ties on distance go to the fewer-hop route, then to the lower predecessor link id.
#[derive(Debug, Clone)]
pub struct SpfTree {
    pub source: usize,
    pub dist: Vec<f64>,
    pub hops: Vec<usize>,
    pub pred: Vec<Option<usize>>,
}

impl SpfTree {
    pub fn reaches(&self, node: usize) -> bool {
        self.dist[node].is_finite()
    }

    /// Link sequence from the root to `target`; `Some(vec![])` for the root itself.
    pub fn path_to(&self, graph: &AdjacencyGraph, target: usize) -> Option<Vec<usize>> {
        if !self.reaches(target) {
            return None;
        }
        let mut reversed = Vec::new();
        let mut current = target;
        for _ in 0..=graph.node_count() {
            if current == self.source {
                reversed.reverse();
                return Some(reversed);
            }
            let arc = self.pred[current]?;
            reversed.push(arc);
            current = graph.ends(arc).0;
        }
        None
    }
}

/// Dijkstra over `graph`; arcs whose weight is infinite, NaN or negative are absent.
/// Stops early once `target` is settled.
pub fn compute_spf_tree<W>(
    graph: &AdjacencyGraph,
    source: usize,
    target: Option<usize>,
    weight: W,
) -> SpfTree
where
    W: Fn(usize) -> f64,
{
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut hops = vec![usize::MAX; n];
    let mut pred: Vec<Option<usize>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut frontier = DistanceFrontier::new();

    dist[source] = 0.0;
    hops[source] = 0;
    frontier.push(source, 0.0, 0);

    loop {
        let Some((u, cost_u)) = frontier.pop_min(|node, cost, h| {
            settled[node] || cost > dist[node] + EPS || (cost >= dist[node] && h > hops[node])
        }) else {
            break;
        };
        settled[u] = true;
        if target == Some(u) {
            break;
        }

        for &arc in graph.outgoing(u) {
            let w = weight(arc);
            if !arc_weight_usable(w) {
                continue;
            }
            let v = graph.ends(arc).1;
            if settled[v] {
                continue;
            }

            let candidate_metric = cost_u + w;
            let candidate_hops = hops[u] + 1;
            let better_metric = candidate_metric + EPS < dist[v];
            let equal_metric = (candidate_metric - dist[v]).abs() <= EPS;
            let better_hops = equal_metric && candidate_hops < hops[v];
            let better_arc = equal_metric
                && candidate_hops == hops[v]
                && pred[v].map_or(true, |p| arc < p);

            if better_metric || better_hops || better_arc {
                dist[v] = candidate_metric;
                hops[v] = candidate_hops;
                pred[v] = Some(arc);
                frontier.push(v, candidate_metric, candidate_hops);
            }
        }
    }

    SpfTree {
        source,
        dist,
        hops,
        pred,
    }
}

/// Single-pair search on an arbitrary arc weighting. `None` when unreachable.
pub(crate) fn shortest_path_with<W>(
    graph: &AdjacencyGraph,
    source: usize,
    target: usize,
    weight: W,
) -> Option<(Vec<usize>, f64)>
where
    W: Fn(usize) -> f64,
{
    let tree = compute_spf_tree(graph, source, Some(target), weight);
    let cost = tree.dist[target];
    tree.path_to(graph, target).map(|path| (path, cost))
}

fn check_pair(topology: &Topology, origin: usize, destination: usize) -> Result<()> {
    topology.check_node(origin)?;
    topology.check_node(destination)
}

/// Shortest path as a link sequence; empty when unreachable or `origin == destination`.
pub fn shortest_path(
    topology: &Topology,
    weights: &[f64],
    origin: usize,
    destination: usize,
) -> Result<Vec<usize>> {
    check_pair(topology, origin, destination)?;
    topology.check_weights(weights)?;
    Ok(
        shortest_path_with(topology.graph(), origin, destination, |id| weights[id])
            .map(|(path, _)| path)
            .unwrap_or_default(),
    )
}

/// Like [`shortest_path`] but links whose available capacity is below `min_capacity` are absent.
pub fn shortest_path_capacitated(
    topology: &Topology,
    weights: &[f64],
    available_capacity: &[f64],
    min_capacity: f64,
    origin: usize,
    destination: usize,
) -> Result<Vec<usize>> {
    check_pair(topology, origin, destination)?;
    topology.check_weights(weights)?;
    if available_capacity.len() != topology.link_count() {
        return Err(RoutingError::DimensionMismatch {
            what: "available capacity vector",
            expected: topology.link_count(),
            found: available_capacity.len(),
        });
    }
    let weight = |id: usize| {
        if available_capacity[id] < min_capacity {
            f64::INFINITY
        } else {
            weights[id]
        }
    };
    Ok(shortest_path_with(topology.graph(), origin, destination, weight)
        .map(|(path, _)| path)
        .unwrap_or_default())
}

pub fn shortest_path_tree(topology: &Topology, weights: &[f64], origin: usize) -> Result<SpfTree> {
    topology.check_node(origin)?;
    topology.check_weights(weights)?;
    Ok(compute_spf_tree(topology.graph(), origin, None, |id| {
        weights[id]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Link;

    fn diamond() -> Topology {
        // 0 -> 1 -> 3 and 0 -> 2 -> 3, plus a direct 0 -> 3 of weight 3
        Topology::new(
            4,
            vec![
                Link::new(0, 1),
                Link::new(1, 3),
                Link::new(0, 2),
                Link::new(2, 3),
                Link::new(0, 3).with_cost(3.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn equal_weight_prefers_lower_link_id() {
        let topo = diamond();
        let path = shortest_path(&topo, &topo.costs(), 0, 3).unwrap();
        assert_eq!(path, vec![0, 1]);
    }

    #[test]
    fn equal_weight_prefers_fewer_hops() {
        let topo = diamond();
        let mut weights = topo.costs();
        weights[4] = 2.0;
        assert_eq!(shortest_path(&topo, &weights, 0, 3).unwrap(), vec![4]);
    }

    #[test]
    fn infinite_weight_removes_link() {
        let topo = diamond();
        let mut weights = topo.costs();
        weights[1] = f64::INFINITY;
        assert_eq!(shortest_path(&topo, &weights, 0, 3).unwrap(), vec![2, 3]);
        weights[3] = f64::INFINITY;
        weights[4] = f64::INFINITY;
        assert!(shortest_path(&topo, &weights, 0, 3).unwrap().is_empty());
    }

    #[test]
    fn capacitated_search_skips_thin_links() {
        let topo = Topology::new(
            4,
            vec![
                Link::new(0, 1).with_capacity(1.0),
                Link::new(1, 3).with_capacity(1.0),
                Link::new(0, 2).with_capacity(10.0),
                Link::new(2, 3).with_capacity(10.0),
                Link::new(0, 3).with_cost(3.0).with_capacity(0.5),
            ],
        )
        .unwrap();
        let available = topo.capacities();
        let path =
            shortest_path_capacitated(&topo, &topo.costs(), &available, 5.0, 0, 3).unwrap();
        assert_eq!(path, vec![2, 3]);
        let none =
            shortest_path_capacitated(&topo, &topo.costs(), &available, 50.0, 0, 3).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn tree_reports_distances_and_unreachable_nodes() {
        let topo = diamond();
        let tree = shortest_path_tree(&topo, &topo.costs(), 1).unwrap();
        assert_eq!(tree.dist[3], 1.0);
        assert!(!tree.reaches(0));
        assert_eq!(tree.path_to(topo.graph(), 1), Some(vec![]));
        assert_eq!(tree.path_to(topo.graph(), 0), None);
    }

    #[test]
    fn rejects_unknown_nodes() {
        let topo = diamond();
        assert!(shortest_path(&topo, &topo.costs(), 0, 9).is_err());
    }
}

//! Read-only topology snapshot consumed by every route computation.
//!
//! Links are indexed `0..E` and nodes `0..N`. The view never changes after
//! construction; weight vectors are supplied per call and indexed by link id.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};

fn unit() -> f64 {
    1.0
}

fn unbounded() -> f64 {
    f64::INFINITY
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub origin: usize,
    pub destination: usize,
    #[serde(default = "unit")]
    pub cost: f64,
    #[serde(default = "unit")]
    pub length_km: f64,
    #[serde(default = "unbounded")]
    pub capacity: f64,
}

impl Link {
    pub fn new(origin: usize, destination: usize) -> Self {
        Self {
            origin,
            destination,
            cost: 1.0,
            length_km: 1.0,
            capacity: f64::INFINITY,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_length_km(mut self, length_km: f64) -> Self {
        self.length_km = length_km;
        self
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Demand {
    pub ingress: usize,
    pub egress: usize,
}

impl Demand {
    pub fn new(ingress: usize, egress: usize) -> Self {
        Self { ingress, egress }
    }
}

/// Minimal directed multigraph: arc `a` goes `ends[a].0 -> ends[a].1`.
///
/// Used both as the adjacency of a [`Topology`] and for the transformed graphs
/// built by the disjoint-path solver.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    ends: Vec<(usize, usize)>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl AdjacencyGraph {
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            ends: Vec::new(),
            outgoing: vec![Vec::new(); node_count],
            incoming: vec![Vec::new(); node_count],
        }
    }

    /// Panics if an endpoint is not below the node count; callers validate first.
    pub fn add_arc(&mut self, from: usize, to: usize) -> usize {
        let id = self.ends.len();
        self.ends.push((from, to));
        self.outgoing[from].push(id);
        self.incoming[to].push(id);
        id
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn arc_count(&self) -> usize {
        self.ends.len()
    }

    pub fn ends(&self, arc: usize) -> (usize, usize) {
        self.ends[arc]
    }

    pub fn outgoing(&self, node: usize) -> &[usize] {
        &self.outgoing[node]
    }

    pub fn incoming(&self, node: usize) -> &[usize] {
        &self.incoming[node]
    }
}

#[derive(Debug, Clone)]
pub struct Topology {
    links: Vec<Link>,
    graph: AdjacencyGraph,
}

impl Topology {
    pub fn new(node_count: usize, links: Vec<Link>) -> Result<Self> {
        let mut graph = AdjacencyGraph::with_nodes(node_count);
        for (id, link) in links.iter().enumerate() {
            if link.origin >= node_count || link.destination >= node_count {
                return Err(RoutingError::InvalidTopology(format!(
                    "link {id} ({} -> {}) references a node outside 0..{node_count}",
                    link.origin, link.destination
                )));
            }
            graph.add_arc(link.origin, link.destination);
        }
        Ok(Self { links, graph })
    }

    /// Builds a view from an `E x 2` (origin, destination) table with unit cost and length.
    pub fn from_table(node_count: usize, table: &[(usize, usize)]) -> Result<Self> {
        let links = table
            .iter()
            .map(|&(origin, destination)| Link::new(origin, destination))
            .collect();
        Self::new(node_count, links)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: usize) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        &self.graph
    }

    pub fn outgoing(&self, node: usize) -> &[usize] {
        self.graph.outgoing(node)
    }

    pub fn incoming(&self, node: usize) -> &[usize] {
        self.graph.incoming(node)
    }

    pub fn costs(&self) -> Vec<f64> {
        self.links.iter().map(|link| link.cost).collect()
    }

    pub fn lengths_km(&self) -> Vec<f64> {
        self.links.iter().map(|link| link.length_km).collect()
    }

    pub fn capacities(&self) -> Vec<f64> {
        self.links.iter().map(|link| link.capacity).collect()
    }

    pub fn check_node(&self, node: usize) -> Result<()> {
        if node >= self.node_count() {
            return Err(RoutingError::InvalidDemand(format!(
                "node {node} is outside 0..{}",
                self.node_count()
            )));
        }
        Ok(())
    }

    pub fn check_demand(&self, demand: &Demand) -> Result<()> {
        self.check_node(demand.ingress)?;
        self.check_node(demand.egress)?;
        if demand.ingress == demand.egress {
            return Err(RoutingError::InvalidDemand(format!(
                "self-demand at node {}",
                demand.ingress
            )));
        }
        Ok(())
    }

    pub fn check_demands(&self, demands: &[Demand]) -> Result<()> {
        demands.iter().try_for_each(|demand| self.check_demand(demand))
    }

    /// Validates a per-link vector length; weights may be `+inf` but never NaN or negative.
    pub fn check_weights(&self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.link_count() {
            return Err(RoutingError::DimensionMismatch {
                what: "weight vector",
                expected: self.link_count(),
                found: weights.len(),
            });
        }
        if let Some((id, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| w.is_nan() || **w < 0.0)
        {
            return Err(RoutingError::invalid_value(&format!("weights[{id}]"), w));
        }
        Ok(())
    }

    pub fn path_nodes(&self, links: &[usize]) -> Vec<usize> {
        let mut nodes = Vec::with_capacity(links.len() + 1);
        if let Some(first) = links.first() {
            nodes.push(self.links[*first].origin);
        }
        nodes.extend(links.iter().map(|id| self.links[*id].destination));
        nodes
    }

    pub fn path_weight(&self, links: &[usize], weights: &[f64]) -> f64 {
        links.iter().map(|id| weights[*id]).sum()
    }

    pub fn path_length_km(&self, links: &[usize]) -> f64 {
        links.iter().map(|id| self.links[*id].length_km).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_links_outside_node_range() {
        let err = Topology::from_table(2, &[(0, 1), (1, 2)]).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidTopology(_)));
    }

    #[test]
    fn demand_checks_catch_self_and_out_of_range() {
        let topo = Topology::from_table(3, &[(0, 1), (1, 2)]).unwrap();
        assert!(topo.check_demand(&Demand::new(0, 2)).is_ok());
        assert!(matches!(
            topo.check_demand(&Demand::new(1, 1)),
            Err(RoutingError::InvalidDemand(_))
        ));
        assert!(matches!(
            topo.check_demand(&Demand::new(0, 7)),
            Err(RoutingError::InvalidDemand(_))
        ));
    }

    #[test]
    fn path_nodes_follow_links() {
        let topo = Topology::from_table(3, &[(0, 1), (1, 2), (0, 2)]).unwrap();
        assert_eq!(topo.path_nodes(&[0, 1]), vec![0, 1, 2]);
        assert!(topo.path_nodes(&[]).is_empty());
        assert_eq!(topo.outgoing(0), &[0, 2]);
        assert_eq!(topo.incoming(2), &[1, 2]);
    }

    #[test]
    fn weight_vector_must_match_links() {
        let topo = Topology::from_table(2, &[(0, 1)]).unwrap();
        assert!(topo.check_weights(&[f64::INFINITY]).is_ok());
        assert!(topo.check_weights(&[1.0, 2.0]).is_err());
        assert!(topo.check_weights(&[-1.0]).is_err());
    }
}

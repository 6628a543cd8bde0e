use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use tracing::trace;

use crate::error::{Result, RoutingError};
use crate::topology::Topology;

use super::continuity::{check_continuity, LoopCheck};
use super::spf::{shortest_path_with, EPS};
use super::PathCandidate;

/// Filters applied to every deviation candidate before it is queued.
///
/// `accept` looks at the candidate alone; `prefer` compares it against the
/// shortest path between the same pair.
pub trait PathPolicy {
    fn accept(&self, _candidate: &PathCandidate) -> bool {
        true
    }

    fn prefer(&self, _candidate: &PathCandidate, _shortest: &PathCandidate) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl PathPolicy for AcceptAll {}

/// Only paths whose weight ties with the shortest one.
#[derive(Debug, Clone, Copy)]
pub struct TiedWithShortest {
    pub tolerance: f64,
}

impl Default for TiedWithShortest {
    fn default() -> Self {
        Self { tolerance: EPS }
    }
}

impl PathPolicy for TiedWithShortest {
    fn prefer(&self, candidate: &PathCandidate, shortest: &PathCandidate) -> bool {
        candidate.weight <= shortest.weight + self.tolerance
    }
}

/// Absolute limits plus limits relative to the shortest path. Unbounded fields are `+inf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathConstraints {
    pub max_length_km: f64,
    pub max_hops: usize,
    pub max_weight: f64,
    pub max_weight_factor: f64,
    pub max_weight_offset: f64,
}

impl Default for PathConstraints {
    fn default() -> Self {
        Self {
            max_length_km: f64::INFINITY,
            max_hops: usize::MAX,
            max_weight: f64::INFINITY,
            max_weight_factor: f64::INFINITY,
            max_weight_offset: f64::INFINITY,
        }
    }
}

impl PathPolicy for PathConstraints {
    fn accept(&self, candidate: &PathCandidate) -> bool {
        candidate.length_km <= self.max_length_km + EPS
            && candidate.hops() <= self.max_hops
            && candidate.weight <= self.max_weight + EPS
    }

    fn prefer(&self, candidate: &PathCandidate, shortest: &PathCandidate) -> bool {
        candidate.weight <= shortest.weight * self.max_weight_factor + EPS
            && candidate.weight <= shortest.weight + self.max_weight_offset + EPS
    }
}

#[derive(Debug, Clone)]
struct PoolEntry {
    candidate: PathCandidate,
    eligible: bool,
}

impl PartialEq for PoolEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PoolEntry {}

// reversed so that BinaryHeap pops the lightest, then shortest-in-hops, candidate
impl Ord for PoolEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .candidate
            .weight
            .total_cmp(&self.candidate.weight)
            .then_with(|| other.candidate.hops().cmp(&self.candidate.hops()))
            .then_with(|| other.candidate.links.cmp(&self.candidate.links))
    }
}

impl PartialOrd for PoolEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deviation-search generator of loop-free paths in non-decreasing weight order.
pub struct KLooplessPaths<'a, P: PathPolicy = AcceptAll> {
    topology: &'a Topology,
    weights: &'a [f64],
    policy: P,
}

impl<'a> KLooplessPaths<'a, AcceptAll> {
    pub fn unconstrained(topology: &'a Topology, weights: &'a [f64]) -> Result<Self> {
        Self::new(topology, weights, AcceptAll)
    }
}

impl<'a, P: PathPolicy> KLooplessPaths<'a, P> {
    pub fn new(topology: &'a Topology, weights: &'a [f64], policy: P) -> Result<Self> {
        topology.check_weights(weights)?;
        Ok(Self {
            topology,
            weights,
            policy,
        })
    }

    fn candidate(&self, links: Vec<usize>) -> PathCandidate {
        PathCandidate {
            weight: self.topology.path_weight(&links, self.weights),
            length_km: self.topology.path_length_km(&links),
            links,
        }
    }

    /// Up to `k` simple paths from `origin` to `destination`; fewer if the graph runs out.
    pub fn paths(&self, origin: usize, destination: usize, k: usize) -> Result<Vec<PathCandidate>> {
        self.topology.check_node(origin)?;
        self.topology.check_node(destination)?;
        if origin == destination {
            return Err(RoutingError::InvalidDemand(format!(
                "paths requested from node {origin} to itself"
            )));
        }
        if k == 0 {
            return Err(RoutingError::invalid_value("K", k));
        }

        let graph = self.topology.graph();
        let weights = self.weights;
        let Some((first_links, _)) =
            shortest_path_with(graph, origin, destination, |id| weights[id])
        else {
            return Ok(Vec::new());
        };

        let shortest = self.candidate(first_links);
        let shortest_eligible =
            self.policy.accept(&shortest) && self.policy.prefer(&shortest, &shortest);

        let mut seen: BTreeSet<Vec<usize>> = BTreeSet::from([shortest.links.clone()]);
        let mut pool = BinaryHeap::from([PoolEntry {
            candidate: shortest.clone(),
            eligible: shortest_eligible,
        }]);
        let mut explored: Vec<Vec<usize>> = Vec::new();
        let mut out = Vec::new();

        while out.len() < k {
            let Some(entry) = pool.pop() else {
                break;
            };
            explored.push(entry.candidate.links.clone());
            let base = entry.candidate;
            if entry.eligible {
                out.push(base.clone());
                if out.len() == k {
                    break;
                }
            }

            let nodes = self.topology.path_nodes(&base.links);
            for spur_idx in 0..base.links.len() {
                let head = &base.links[..spur_idx];
                let spur_node = nodes[spur_idx];
                let blocked_nodes: BTreeSet<usize> = nodes[..spur_idx].iter().copied().collect();
                let blocked_links: BTreeSet<usize> = explored
                    .iter()
                    .filter(|links| links.len() > spur_idx && &links[..spur_idx] == head)
                    .map(|links| links[spur_idx])
                    .collect();

                let links = self.topology.links();
                let tail = shortest_path_with(graph, spur_node, destination, |id| {
                    let link = &links[id];
                    if blocked_links.contains(&id)
                        || blocked_nodes.contains(&link.origin)
                        || blocked_nodes.contains(&link.destination)
                    {
                        f64::INFINITY
                    } else {
                        weights[id]
                    }
                });
                let Some((tail, _)) = tail else {
                    continue;
                };

                let mut total = head.to_vec();
                total.extend(tail);
                if !seen.insert(total.clone()) {
                    continue;
                }
                if let Err(err) = check_continuity(self.topology, &total, LoopCheck::Node) {
                    trace!("drop deviation {:?}: {err}", total);
                    continue;
                }

                let candidate = self.candidate(total);
                if !self.policy.accept(&candidate) || !self.policy.prefer(&candidate, &shortest) {
                    continue;
                }
                pool.push(PoolEntry {
                    candidate,
                    eligible: true,
                });
            }
        }

        Ok(out)
    }
}

/// Every loop-free path tied in weight with the shortest one.
pub fn all_shortest_paths(
    topology: &Topology,
    weights: &[f64],
    origin: usize,
    destination: usize,
) -> Result<Vec<PathCandidate>> {
    KLooplessPaths::new(topology, weights, TiedWithShortest::default())?.paths(
        origin,
        destination,
        usize::MAX,
    )
}

pub fn k_loopless_shortest_paths(
    topology: &Topology,
    weights: &[f64],
    origin: usize,
    destination: usize,
    k: usize,
) -> Result<Vec<PathCandidate>> {
    KLooplessPaths::unconstrained(topology, weights)?.paths(origin, destination, k)
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn links_of(paths: &[PathCandidate]) -> Vec<Vec<usize>> {
        paths.iter().map(|p| p.links.clone()).collect()
    }

    #[test]
    fn two_paths_in_weight_order() {
        let topo = scenario((3, 1));
        let out = k_loopless_shortest_paths(&topo, &topo.costs(), 0, 3, 2).unwrap();
        assert_eq!(links_of(&out), vec![vec![2, 3], vec![0, 1, 3]]);
        assert_eq!(out[0].weight, 2.0);
        assert_eq!(out[1].weight, 3.0);
    }

    #[test]
    fn k_larger_than_available_paths() {
        let topo = scenario((3, 1));
        let out = k_loopless_shortest_paths(&topo, &topo.costs(), 0, 3, 5).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn forward_heavy_link_yields_third_path() {
        let topo = scenario((1, 3));
        let out = k_loopless_shortest_paths(&topo, &topo.costs(), 0, 3, 5).unwrap();
        assert_eq!(
            links_of(&out),
            vec![vec![2, 3], vec![0, 1, 3], vec![0, 4]]
        );
        assert!(out.windows(2).all(|w| w[0].weight <= w[1].weight));
    }

    #[test]
    fn unreachable_pair_is_empty() {
        let topo = scenario((3, 1));
        let out = k_loopless_shortest_paths(&topo, &topo.costs(), 3, 0, 3).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn hop_limit_prunes_rejected_branches() {
        let topo = scenario((1, 3));
        let policy = PathConstraints {
            max_hops: 2,
            ..Default::default()
        };
        let out = KLooplessPaths::new(&topo, &topo.costs(), policy)
            .unwrap()
            .paths(0, 3, 5)
            .unwrap();
        // [0, 4] only deviates from the rejected [0, 1, 3], so it is never reached
        assert_eq!(links_of(&out), vec![vec![2, 3]]);

        let loose = PathConstraints {
            max_hops: 3,
            ..Default::default()
        };
        let out = KLooplessPaths::new(&topo, &topo.costs(), loose)
            .unwrap()
            .paths(0, 3, 5)
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn relative_weight_limits() {
        let topo = scenario((1, 3));
        let factor = PathConstraints {
            max_weight_factor: 1.5,
            ..Default::default()
        };
        let out = KLooplessPaths::new(&topo, &topo.costs(), factor)
            .unwrap()
            .paths(0, 3, 5)
            .unwrap();
        assert_eq!(out.len(), 2);

        let offset = PathConstraints {
            max_weight_offset: 0.0,
            ..Default::default()
        };
        let out = KLooplessPaths::new(&topo, &topo.costs(), offset)
            .unwrap()
            .paths(0, 3, 5)
            .unwrap();
        assert_eq!(links_of(&out), vec![vec![2, 3]]);
    }

    #[test]
    fn shortest_path_rejected_by_length_still_seeds_search() {
        let topo = Topology::new(
            3,
            vec![
                Link::new(0, 2).with_length_km(500.0),
                Link::new(0, 1).with_cost(2.0).with_length_km(10.0),
                Link::new(1, 2).with_cost(2.0).with_length_km(10.0),
            ],
        )
        .unwrap();
        let policy = PathConstraints {
            max_length_km: 100.0,
            ..Default::default()
        };
        let out = KLooplessPaths::new(&topo, &topo.costs(), policy)
            .unwrap()
            .paths(0, 2, 3)
            .unwrap();
        assert_eq!(links_of(&out), vec![vec![1, 2]]);
    }

    #[test]
    fn all_shortest_paths_enumerates_ties() {
        let topo = Topology::from_table(4, &[(0, 1), (1, 3), (0, 2), (2, 3), (0, 3)]).unwrap();
        let mut weights = topo.costs();
        weights[4] = 3.0;
        let out = all_shortest_paths(&topo, &weights, 0, 3).unwrap();
        assert_eq!(links_of(&out), vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn rejects_zero_k_and_self_pair() {
        let topo = scenario((3, 1));
        assert!(k_loopless_shortest_paths(&topo, &topo.costs(), 0, 3, 0).is_err());
        assert!(k_loopless_shortest_paths(&topo, &topo.costs(), 1, 1, 2).is_err());
    }
}

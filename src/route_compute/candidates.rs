//! Candidate path set: precomputed alternative paths per demand.
//!
//! Paths live in a dense arena `0..P`. Three indices (demand -> paths,
//! link -> paths, path -> demand) are kept consistent by [`CandidatePathSet::add_path`]
//! and [`CandidatePathSet::remove_path`]; removal shifts every higher path id down by one.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::config::CandidatePathParams;
use crate::error::{Result, RoutingError};
use crate::matrix::SparseMatrix;
use crate::topology::{Demand, Topology};

use super::continuity::{check_demand_path, LoopCheck};
use super::ksp::KLooplessPaths;
use super::persist::PersistedPathSet;
use super::spf::EPS;
use super::{RouteInstallation, RoutedPath};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Restrict generation to these (ingress, egress) pairs; `None` means every pair with demands.
    pub node_pairs: Option<BTreeSet<(usize, usize)>>,
    /// Known (demand, links) paths registered before generation.
    pub seed_paths: Vec<(usize, Vec<usize>)>,
    pub loop_check: LoopCheck,
}

#[derive(Debug, Clone)]
pub struct CandidatePathSet<'a> {
    topology: &'a Topology,
    demands: Vec<Demand>,
    weights: Vec<f64>,
    loop_check: LoopCheck,
    paths: Vec<Vec<usize>>,
    path_demand: Vec<usize>,
    demand_paths: Vec<Vec<usize>>,
    link_paths: Vec<Vec<usize>>,
}

impl<'a> CandidatePathSet<'a> {
    fn empty(
        topology: &'a Topology,
        demands: &[Demand],
        weights: &[f64],
        loop_check: LoopCheck,
    ) -> Result<Self> {
        topology.check_demands(demands)?;
        topology.check_weights(weights)?;
        Ok(Self {
            topology,
            demands: demands.to_vec(),
            weights: weights.to_vec(),
            loop_check,
            paths: Vec::new(),
            path_demand: Vec::new(),
            demand_paths: vec![Vec::new(); demands.len()],
            link_paths: vec![Vec::new(); topology.link_count()],
        })
    }

    pub fn new(
        topology: &'a Topology,
        demands: &[Demand],
        weights: &[f64],
        params: &CandidatePathParams,
    ) -> Result<Self> {
        Self::build(topology, demands, weights, params, BuildOptions::default())
    }

    /// Runs the k-path generator once per node pair and registers each path for
    /// every demand between that pair.
    pub fn build(
        topology: &'a Topology,
        demands: &[Demand],
        weights: &[f64],
        params: &CandidatePathParams,
        options: BuildOptions,
    ) -> Result<Self> {
        let mut set = Self::empty(topology, demands, weights, options.loop_check)?;

        for (demand, links) in options.seed_paths {
            set.add_path(demand, links)?;
        }
        let seeded = set.path_count();

        let mut demands_by_pair: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (id, demand) in demands.iter().enumerate() {
            demands_by_pair
                .entry((demand.ingress, demand.egress))
                .or_default()
                .push(id);
        }

        let generator = KLooplessPaths::new(topology, weights, params.constraints())?;
        for ((ingress, egress), pair_demands) in demands_by_pair {
            if let Some(pairs) = &options.node_pairs {
                if !pairs.contains(&(ingress, egress)) {
                    continue;
                }
            }
            let found = generator.paths(ingress, egress, params.k)?;
            debug!(
                "candidate paths {ingress}->{egress}: {} found for {} demands",
                found.len(),
                pair_demands.len()
            );
            for candidate in found {
                for &demand in &pair_demands {
                    set.add_path(demand, candidate.links.clone())?;
                }
            }
        }

        info!(
            "candidate path set built: demands={} paths={} seeded={} k={}",
            set.demand_count(),
            set.path_count(),
            seeded,
            params.k
        );
        Ok(set)
    }

    pub fn topology(&self) -> &'a Topology {
        self.topology
    }

    pub fn demands(&self) -> &[Demand] {
        &self.demands
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn demand_count(&self) -> usize {
        self.demands.len()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn path(&self, path: usize) -> Option<&[usize]> {
        self.paths.get(path).map(Vec::as_slice)
    }

    pub fn demand_of_path(&self, path: usize) -> Option<usize> {
        self.path_demand.get(path).copied()
    }

    pub fn paths_of_demand(&self, demand: usize) -> &[usize] {
        self.demand_paths.get(demand).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn paths_of_link(&self, link: usize) -> &[usize] {
        self.link_paths.get(link).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_path(&self, demand: usize, links: &[usize]) -> Option<usize> {
        self.paths_of_demand(demand)
            .iter()
            .copied()
            .find(|p| self.paths[*p] == links)
    }

    /// Registers a path for `demand`, returning its id. An identical (demand, links)
    /// entry is not duplicated; its existing id is returned.
    pub fn add_path(&mut self, demand: usize, links: Vec<usize>) -> Result<usize> {
        let Some(d) = self.demands.get(demand) else {
            return Err(RoutingError::InvalidDemand(format!(
                "demand {demand} is outside 0..{}",
                self.demands.len()
            )));
        };
        check_demand_path(self.topology, d, &links, self.loop_check)?;
        if let Some(existing) = self.find_path(demand, &links) {
            return Ok(existing);
        }

        let id = self.paths.len();
        for &link in &links {
            let users = &mut self.link_paths[link];
            if users.last() != Some(&id) {
                users.push(id);
            }
        }
        self.demand_paths[demand].push(id);
        self.path_demand.push(demand);
        self.paths.push(links);
        debug!("candidate path {id} added for demand {demand}");
        Ok(id)
    }

    /// Removes path `path` and renumbers every higher id down by one.
    pub fn remove_path(&mut self, path: usize) -> Result<Vec<usize>> {
        if path >= self.paths.len() {
            return Err(RoutingError::InvalidPath(format!(
                "path {path} is outside 0..{}",
                self.paths.len()
            )));
        }
        let links = self.paths.remove(path);
        let demand = self.path_demand.remove(path);

        for ids in self
            .demand_paths
            .iter_mut()
            .chain(self.link_paths.iter_mut())
        {
            ids.retain(|p| *p != path);
            for p in ids.iter_mut() {
                if *p > path {
                    *p -= 1;
                }
            }
        }
        debug!("candidate path {path} removed from demand {demand}");
        Ok(links)
    }

    fn check_weights(&self, weights: &[f64]) -> Result<()> {
        self.topology.check_weights(weights)
    }

    fn check_path_vector(&self, what: &'static str, values: &[f64]) -> Result<()> {
        if values.len() != self.paths.len() {
            return Err(RoutingError::DimensionMismatch {
                what,
                expected: self.paths.len(),
                found: values.len(),
            });
        }
        Ok(())
    }

    pub fn path_cost(&self, path: usize, weights: &[f64]) -> Result<f64> {
        self.check_weights(weights)?;
        let links = self
            .path(path)
            .ok_or_else(|| RoutingError::InvalidPath(format!("unknown path {path}")))?;
        Ok(self.topology.path_weight(links, weights))
    }

    pub fn path_costs(&self, weights: &[f64]) -> Result<Vec<f64>> {
        self.check_weights(weights)?;
        Ok(self
            .paths
            .iter()
            .map(|links| self.topology.path_weight(links, weights))
            .collect())
    }

    pub fn path_lengths_km(&self) -> Vec<f64> {
        self.paths
            .iter()
            .map(|links| self.topology.path_length_km(links))
            .collect()
    }

    /// Cheapest candidates of `demand` under `weights`; all of them when several tie.
    pub fn shortest_paths_of_demand(&self, demand: usize, weights: &[f64]) -> Result<Vec<usize>> {
        self.check_weights(weights)?;
        if demand >= self.demands.len() {
            return Err(RoutingError::InvalidDemand(format!("unknown demand {demand}")));
        }
        let costs: Vec<(usize, f64)> = self.demand_paths[demand]
            .iter()
            .map(|p| (*p, self.topology.path_weight(&self.paths[*p], weights)))
            .collect();
        let best = costs.iter().map(|(_, c)| *c).fold(f64::INFINITY, f64::min);
        Ok(costs
            .into_iter()
            .filter(|(_, c)| (*c - best).abs() <= EPS || *c == best)
            .map(|(p, _)| p)
            .collect())
    }

    /// D x E: 1 where some candidate of the demand traverses the link.
    pub fn demand_link_incidence(&self) -> SparseMatrix {
        let mut m = SparseMatrix::new(self.demands.len(), self.topology.link_count());
        for (p, links) in self.paths.iter().enumerate() {
            for &e in links {
                m.set(self.path_demand[p], e, 1.0);
            }
        }
        m
    }

    /// D x P: 1 where the path belongs to the demand.
    pub fn demand_path_incidence(&self) -> SparseMatrix {
        let mut m = SparseMatrix::new(self.demands.len(), self.paths.len());
        for (p, d) in self.path_demand.iter().enumerate() {
            m.set(*d, p, 1.0);
        }
        m
    }

    /// E x P: 1 where the path traverses the link.
    pub fn link_path_incidence(&self) -> SparseMatrix {
        let mut m = SparseMatrix::new(self.topology.link_count(), self.paths.len());
        for (e, users) in self.link_paths.iter().enumerate() {
            for &p in users {
                m.set(e, p, 1.0);
            }
        }
        m
    }

    /// Total flow per link for a per-path flow vector.
    pub fn link_carried_traffic(&self, x_p: &[f64]) -> Result<Vec<f64>> {
        self.check_path_vector("path flow vector", x_p)?;
        let mut carried = vec![0.0; self.topology.link_count()];
        for (links, flow) in self.paths.iter().zip(x_p) {
            for &e in links {
                carried[e] += flow;
            }
        }
        Ok(carried)
    }

    /// Total flow per demand for a per-path flow vector.
    pub fn demand_carried_traffic(&self, x_p: &[f64]) -> Result<Vec<f64>> {
        self.check_path_vector("path flow vector", x_p)?;
        let mut carried = vec![0.0; self.demands.len()];
        for (d, flow) in self.path_demand.iter().zip(x_p) {
            carried[*d] += flow;
        }
        Ok(carried)
    }

    pub fn routed_paths(&self, x_p: &[f64]) -> Result<Vec<RoutedPath>> {
        self.check_path_vector("path flow vector", x_p)?;
        Ok(self
            .paths
            .iter()
            .zip(&self.path_demand)
            .zip(x_p)
            .map(|((links, demand), flow)| RoutedPath {
                demand: *demand,
                links: links.clone(),
                flow: *flow,
            })
            .collect())
    }

    /// Route records for every path carrying positive flow.
    pub fn installations(&self, x_p: &[f64]) -> Result<Vec<RouteInstallation>> {
        Ok(self
            .routed_paths(x_p)?
            .into_iter()
            .filter(|routed| routed.flow > 0.0)
            .map(|routed| RouteInstallation {
                demand: routed.demand,
                carried_flow: routed.flow,
                links: routed.links,
                backup_segments: Vec::new(),
            })
            .collect())
    }

    pub fn to_record(&self) -> PersistedPathSet {
        PersistedPathSet {
            demand_of_path: self.path_demand.clone(),
            weights: self.weights.clone(),
            paths: self.paths.clone(),
        }
    }

    /// Restores a set from its persisted record, re-validating every path against `topology`.
    pub fn from_record(
        topology: &'a Topology,
        demands: &[Demand],
        record: &PersistedPathSet,
        loop_check: LoopCheck,
    ) -> Result<Self> {
        let stale = RoutingError::InvalidPersistedSet;
        if record.demand_of_path.len() != record.paths.len() {
            return Err(stale(format!(
                "{} demand ids for {} paths",
                record.demand_of_path.len(),
                record.paths.len()
            )));
        }
        if record.weights.len() != topology.link_count() {
            return Err(stale(format!(
                "{} weights for {} links",
                record.weights.len(),
                topology.link_count()
            )));
        }
        let mut set = Self::empty(topology, demands, &record.weights, loop_check)
            .map_err(|err| stale(err.to_string()))?;
        for (i, (demand, links)) in record
            .demand_of_path
            .iter()
            .zip(&record.paths)
            .enumerate()
        {
            let id = set
                .add_path(*demand, links.clone())
                .map_err(|err| stale(format!("path {i}: {err}")))?;
            if id != i {
                return Err(stale(format!("path {i} duplicates path {id}")));
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Link;

    fn scenario() -> Topology {
        Topology::new(
            4,
            vec![
                Link::new(0, 1),
                Link::new(1, 2),
                Link::new(0, 2),
                Link::new(2, 3),
                Link::new(1, 3).with_cost(5.0),
            ],
        )
        .unwrap()
    }

    fn params(k: usize) -> CandidatePathParams {
        CandidatePathParams {
            k,
            ..Default::default()
        }
    }

    fn assert_indices_consistent(set: &CandidatePathSet<'_>) {
        for p in 0..set.path_count() {
            let d = set.demand_of_path(p).unwrap();
            assert!(set.paths_of_demand(d).contains(&p));
            for &e in set.path(p).unwrap() {
                assert!(set.paths_of_link(e).contains(&p));
            }
        }
        for e in 0..set.topology().link_count() {
            for &p in set.paths_of_link(e) {
                assert!(set.path(p).unwrap().contains(&e));
            }
        }
        let listed: usize = (0..set.demand_count())
            .map(|d| set.paths_of_demand(d).len())
            .sum();
        assert_eq!(listed, set.path_count());
    }

    #[test]
    fn paths_are_shared_across_demands_of_a_pair() {
        let topo = scenario();
        let demands = [Demand::new(0, 3), Demand::new(0, 3), Demand::new(1, 3)];
        let set = CandidatePathSet::new(&topo, &demands, &topo.costs(), &params(2)).unwrap();
        assert_eq!(set.paths_of_demand(0).len(), 2);
        assert_eq!(set.paths_of_demand(1).len(), 2);
        assert_eq!(set.paths_of_demand(2).len(), 2);
        assert_eq!(set.path(0), Some(&[2, 3][..]));
        assert_eq!(set.path(1), Some(&[2, 3][..]));
        assert_eq!(set.demand_of_path(1), Some(1));
        assert_indices_consistent(&set);
    }

    #[test]
    fn restricted_pairs_skip_other_demands() {
        let topo = scenario();
        let demands = [Demand::new(0, 3), Demand::new(1, 3)];
        let options = BuildOptions {
            node_pairs: Some(BTreeSet::from([(1, 3)])),
            ..Default::default()
        };
        let set =
            CandidatePathSet::build(&topo, &demands, &topo.costs(), &params(3), options).unwrap();
        assert!(set.paths_of_demand(0).is_empty());
        assert_eq!(set.paths_of_demand(1).len(), 2);
    }

    #[test]
    fn seeded_paths_are_not_duplicated() {
        let topo = scenario();
        let demands = [Demand::new(0, 3)];
        let options = BuildOptions {
            seed_paths: vec![(0, vec![0, 4]), (0, vec![2, 3])],
            ..Default::default()
        };
        let set =
            CandidatePathSet::build(&topo, &demands, &topo.costs(), &params(2), options).unwrap();
        assert_eq!(set.path(0), Some(&[0, 4][..]));
        assert_eq!(set.path(1), Some(&[2, 3][..]));
        assert_eq!(set.path(2), Some(&[0, 1, 3][..]));
        assert_eq!(set.path_count(), 3);
    }

    #[test]
    fn invalid_seed_is_rejected() {
        let topo = scenario();
        let options = BuildOptions {
            seed_paths: vec![(0, vec![0, 3])],
            ..Default::default()
        };
        let err = CandidatePathSet::build(
            &topo,
            &[Demand::new(0, 3)],
            &topo.costs(),
            &params(2),
            options,
        )
        .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPath(_)));
    }

    #[test]
    fn removal_renumbers_higher_ids() {
        let topo = scenario();
        let demands = [Demand::new(0, 3), Demand::new(1, 3)];
        let mut set = CandidatePathSet::new(&topo, &demands, &topo.costs(), &params(3)).unwrap();
        let before = set.path_count();
        let third = set.path(2).unwrap().to_vec();

        let removed = set.remove_path(1).unwrap();
        assert_eq!(set.path_count(), before - 1);
        assert_eq!(set.path(1), Some(third.as_slice()));
        assert!(set.find_path(0, &removed).is_none());
        assert_indices_consistent(&set);
        assert!(set.remove_path(99).is_err());
    }

    #[test]
    fn self_demand_is_rejected() {
        let topo = scenario();
        let err =
            CandidatePathSet::new(&topo, &[Demand::new(2, 2)], &topo.costs(), &params(1))
                .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidDemand(_)));
    }

    #[test]
    fn costs_and_shortest_candidates() {
        let topo = scenario();
        let demands = [Demand::new(0, 3)];
        let set = CandidatePathSet::new(&topo, &demands, &topo.costs(), &params(3)).unwrap();
        assert_eq!(set.path_costs(&topo.costs()).unwrap(), vec![2.0, 3.0, 6.0]);
        assert_eq!(set.shortest_paths_of_demand(0, &topo.costs()).unwrap(), vec![0]);

        let tied = vec![1.0, 1.0, 2.0, 1.0, 5.0];
        assert_eq!(set.shortest_paths_of_demand(0, &tied).unwrap(), vec![0, 1]);
        assert_eq!(set.path_cost(2, &tied).unwrap(), 6.0);
    }

    #[test]
    fn incidence_and_flow_projection() {
        let topo = scenario();
        let demands = [Demand::new(0, 3), Demand::new(1, 3)];
        let set = CandidatePathSet::new(&topo, &demands, &topo.costs(), &params(2)).unwrap();
        // paths: 0=[2,3] d0, 1=[0,1,3] d0, 2=[1,3] d1, 3=[4] d1
        assert_eq!(set.path(2), Some(&[1, 3][..]));
        assert_eq!(set.path(3), Some(&[4][..]));

        let dl = set.demand_link_incidence();
        assert_eq!(dl.get(0, 0), 1.0);
        assert_eq!(dl.get(1, 0), 0.0);
        assert_eq!(dl.get(1, 4), 1.0);
        assert_eq!(set.demand_path_incidence().nnz(), 4);
        assert_eq!(set.link_path_incidence().get(3, 2), 1.0);

        let x_p = [2.0, 1.0, 0.5, 0.0];
        assert_eq!(
            set.link_carried_traffic(&x_p).unwrap(),
            vec![1.0, 1.5, 2.0, 3.5, 0.0]
        );
        assert_eq!(set.demand_carried_traffic(&x_p).unwrap(), vec![3.0, 0.5]);
        assert_eq!(set.installations(&x_p).unwrap().len(), 3);
        assert!(set.link_carried_traffic(&[1.0]).is_err());
    }

    #[test]
    fn record_round_trip_and_stale_detection() {
        let topo = scenario();
        let demands = [Demand::new(0, 3)];
        let set = CandidatePathSet::new(&topo, &demands, &topo.costs(), &params(3)).unwrap();
        let text = set.to_record().to_string();
        let record: PersistedPathSet = text.parse().unwrap();
        let restored =
            CandidatePathSet::from_record(&topo, &demands, &record, LoopCheck::Node).unwrap();
        assert_eq!(restored.path_count(), set.path_count());
        assert_eq!(restored.path(2), set.path(2));

        let shrunk = Topology::from_table(4, &[(0, 1), (1, 2), (0, 2), (2, 3)]).unwrap();
        let err =
            CandidatePathSet::from_record(&shrunk, &demands, &record, LoopCheck::Node).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPersistedSet(_)));

        let mut broken = record.clone();
        broken.paths[0] = vec![2, 1];
        let err =
            CandidatePathSet::from_record(&topo, &demands, &broken, LoopCheck::Node).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPersistedSet(_)));
    }
}

//! Conversions between path flows (`x_p`), demand-link flows (`x_de`, D x E) and
//! destination-based forwarding fractions (`f_te`, N x E).

use tracing::{debug, warn};

use crate::error::{Result, RoutingError};
use crate::matrix::{Matrix, MatrixError};
use crate::topology::{Demand, Topology};

use super::continuity::{check_demand_path, LoopCheck};
use super::spf::shortest_path_with;
use super::{RoutedPath, RoutingClass};

pub struct RoutingConverter<'a> {
    topology: &'a Topology,
    demands: &'a [Demand],
    precision: f64,
}

impl<'a> RoutingConverter<'a> {
    pub fn new(topology: &'a Topology, demands: &'a [Demand], precision: f64) -> Result<Self> {
        topology.check_demands(demands)?;
        if !(precision.is_finite() && precision > 0.0) {
            return Err(RoutingError::invalid_value("precision_factor", precision));
        }
        Ok(Self {
            topology,
            demands,
            precision,
        })
    }

    fn check_shape(&self, what: &'static str, m: &Matrix, rows: usize) -> Result<()> {
        let (r, c) = m.dimension();
        if r != rows {
            return Err(RoutingError::DimensionMismatch {
                what,
                expected: rows,
                found: r,
            });
        }
        if c != self.topology.link_count() {
            return Err(RoutingError::DimensionMismatch {
                what,
                expected: self.topology.link_count(),
                found: c,
            });
        }
        Ok(())
    }

    fn check_xde(&self, x_de: &Matrix) -> Result<()> {
        self.check_shape("demand-link flow matrix", x_de, self.demands.len())
    }

    fn check_fte(&self, f_te: &Matrix) -> Result<()> {
        self.check_shape("forwarding fraction matrix", f_te, self.topology.node_count())
    }

    /// Adds every path's flow onto the (demand, link) cells of its route.
    pub fn xp_to_xde(&self, paths: &[RoutedPath]) -> Result<Matrix> {
        let mut x_de = Matrix::zeros(self.demands.len(), self.topology.link_count());
        for routed in paths {
            let demand = self.demands.get(routed.demand).ok_or_else(|| {
                RoutingError::InvalidDemand(format!("unknown demand {}", routed.demand))
            })?;
            check_demand_path(self.topology, demand, &routed.links, LoopCheck::None)?;
            for &e in &routed.links {
                x_de.add_to(routed.demand, e, routed.flow);
            }
        }
        Ok(x_de)
    }

    /// N x E flow per destination node: rows of `x_de` summed by demand egress.
    pub fn xde_to_xte(&self, x_de: &Matrix) -> Result<Matrix> {
        self.check_xde(x_de)?;
        let mut x_te = Matrix::zeros(self.topology.node_count(), self.topology.link_count());
        for (d, demand) in self.demands.iter().enumerate() {
            for (e, flow) in x_de.row(d).iter().enumerate() {
                if *flow != 0.0 {
                    x_te.add_to(demand.egress, e, *flow);
                }
            }
        }
        Ok(x_te)
    }

    pub fn link_carried_traffic(&self, x_de: &Matrix) -> Result<Vec<f64>> {
        self.check_xde(x_de)?;
        Ok(x_de.column_sums())
    }

    /// Splits each node's outgoing `t`-bound flow proportionally. A node with no
    /// `t`-bound outflow that can still reach `t` forwards everything onto the first
    /// link of its fewest-hop path (ties to the lowest link id).
    pub fn xde_to_fte(&self, x_de: &Matrix) -> Result<Matrix> {
        let x_te = self.xde_to_xte(x_de)?;
        let n = self.topology.node_count();
        let graph = self.topology.graph();
        let mut f_te = Matrix::zeros(n, self.topology.link_count());

        for t in 0..n {
            for node in (0..n).filter(|node| *node != t) {
                let out = self.topology.outgoing(node);
                let total: f64 = out.iter().map(|e| x_te.get(t, *e)).sum();
                if total > self.precision {
                    for &e in out {
                        f_te.set(t, e, x_te.get(t, e) / total);
                    }
                    continue;
                }
                if let Some((hops, _)) = shortest_path_with(graph, node, t, |_| 1.0) {
                    if let Some(first) = hops.first() {
                        f_te.set(t, *first, 1.0);
                    }
                }
            }
        }
        Ok(f_te)
    }

    pub fn xp_to_fte(&self, paths: &[RoutedPath]) -> Result<Matrix> {
        self.xde_to_fte(&self.xp_to_xde(paths)?)
    }

    /// Peels loop-free paths off each demand's positive-flow subgraph until the
    /// ingress surplus falls under the precision factor.
    pub fn xde_to_xp(&self, x_de: &Matrix) -> Result<Vec<RoutedPath>> {
        self.check_xde(x_de)?;
        let graph = self.topology.graph();
        let mut out = Vec::new();

        for (d, demand) in self.demands.iter().enumerate() {
            let mut residual = x_de.row(d).to_vec();
            let ingress_out: f64 = graph.outgoing(demand.ingress).iter().map(|e| residual[*e]).sum();
            let ingress_in: f64 = graph.incoming(demand.ingress).iter().map(|e| residual[*e]).sum();
            let mut surplus = ingress_out - ingress_in;

            while surplus > self.precision {
                let precision = self.precision;
                let positive = |e: usize| {
                    if residual[e] > precision {
                        1.0
                    } else {
                        f64::INFINITY
                    }
                };
                let Some((links, _)) =
                    shortest_path_with(graph, demand.ingress, demand.egress, positive)
                else {
                    break;
                };
                let bottleneck = links
                    .iter()
                    .map(|e| residual[*e])
                    .fold(f64::INFINITY, f64::min);
                let flow = bottleneck.min(surplus);
                for &e in &links {
                    residual[e] -= flow;
                }
                surplus -= flow;
                out.push(RoutedPath {
                    demand: d,
                    links,
                    flow,
                });
            }

            if surplus > self.precision {
                warn!(
                    "demand {d}: dropping {surplus} units of ingress surplus with no positive-flow path"
                );
            }
        }
        Ok(out)
    }

    /// Classification of the routing towards destination `t`.
    ///
    /// Builds the substochastic matrix `Q` over every node but `t` and inverts
    /// `I - Q`: singular means traffic is trapped in a cycle, a fundamental-matrix
    /// diagonal above one means traffic revisits nodes before escaping.
    pub fn classify_destination(&self, f_te: &Matrix, t: usize) -> Result<RoutingClass> {
        self.check_fte(f_te)?;
        self.topology.check_node(t)?;
        let n = self.topology.node_count();
        let index = |node: usize| if node < t { node } else { node - 1 };

        let mut i_minus_q = Matrix::identity(n.saturating_sub(1));
        for (e, link) in self.topology.links().iter().enumerate() {
            if link.origin == t || link.destination == t {
                continue;
            }
            let fraction = f_te.get(t, e);
            if fraction != 0.0 {
                i_minus_q.add_to(index(link.origin), index(link.destination), -fraction);
            }
        }

        let fundamental = match i_minus_q.inverse() {
            Ok(m) => m,
            Err(MatrixError::Singular) => return Ok(RoutingClass::ClosedLoop),
            Err(err) => {
                return Err(RoutingError::InvalidParameterValue {
                    name: "forwarding fractions".to_string(),
                    value: err.to_string(),
                })
            }
        };
        let revisits = (0..fundamental.rows())
            .any(|i| fundamental.get(i, i) > 1.0 + self.precision);
        Ok(if revisits {
            RoutingClass::OpenLoop
        } else {
            RoutingClass::LoopFree
        })
    }

    /// Worst classification over every destination node.
    pub fn classify(&self, f_te: &Matrix) -> Result<RoutingClass> {
        let mut worst = RoutingClass::LoopFree;
        for t in 0..self.topology.node_count() {
            worst = worst.max(self.classify_destination(f_te, t)?);
        }
        Ok(worst)
    }

    /// Expands forwarding fractions into explicit paths carrying `offered[d]` per demand.
    /// Refused unless the routing towards every demanded egress is loop-free, and
    /// when more than the precision factor of a demand's traffic reaches a node
    /// whose fractions towards the egress do not sum to one.
    pub fn fte_to_xp(&self, f_te: &Matrix, offered: &[f64]) -> Result<Vec<RoutedPath>> {
        self.check_fte(f_te)?;
        if offered.len() != self.demands.len() {
            return Err(RoutingError::DimensionMismatch {
                what: "offered traffic vector",
                expected: self.demands.len(),
                found: offered.len(),
            });
        }
        let mut egresses: Vec<usize> = self.demands.iter().map(|d| d.egress).collect();
        egresses.sort_unstable();
        egresses.dedup();
        for t in egresses {
            let class = self.classify_destination(f_te, t)?;
            if class != RoutingClass::LoopFree {
                return Err(RoutingError::IllDefinedRouting(class));
            }
        }

        let mut out = Vec::new();
        for (d, demand) in self.demands.iter().enumerate() {
            if offered[d] <= 0.0 {
                continue;
            }
            let t = demand.egress;
            let mut pending: Vec<(usize, Vec<usize>, f64)> =
                vec![(demand.ingress, Vec::new(), offered[d])];
            let mut lost = 0.0;
            while let Some((node, links, flow)) = pending.pop() {
                if node == t {
                    out.push(RoutedPath {
                        demand: d,
                        links,
                        flow,
                    });
                    continue;
                }
                let mut forwarded = 0.0;
                for &e in self.topology.outgoing(node) {
                    let fraction = f_te.get(t, e);
                    if fraction <= self.precision {
                        continue;
                    }
                    forwarded += fraction;
                    let mut next = links.clone();
                    next.push(e);
                    pending.push((self.topology.links()[e].destination, next, flow * fraction));
                }
                lost += flow * (1.0 - forwarded).max(0.0);
            }
            if lost > self.precision {
                return Err(RoutingError::ForwardingLoss { demand: d, lost });
            }
        }
        debug!("expanded forwarding fractions into {} paths", out.len());
        Ok(out)
    }

    pub fn fte_to_xde(&self, f_te: &Matrix, offered: &[f64]) -> Result<Matrix> {
        let paths = self.fte_to_xp(f_te, offered)?;
        self.xp_to_xde(&paths)
    }
}

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::{Result, RoutingError};
use crate::topology::{Demand, Topology};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopCheck {
    None,
    #[default]
    #[serde(alias = "no-repeated-node")]
    Node,
    #[serde(alias = "no-repeated-link")]
    Link,
}

/// Checks that `links` is a non-empty connected walk, rejecting repeats per `mode`.
pub fn check_continuity(topology: &Topology, links: &[usize], mode: LoopCheck) -> Result<()> {
    if links.is_empty() {
        return Err(RoutingError::InvalidPath("empty link sequence".to_string()));
    }
    if let Some(bad) = links.iter().find(|id| **id >= topology.link_count()) {
        return Err(RoutingError::InvalidPath(format!(
            "link {bad} is outside 0..{}",
            topology.link_count()
        )));
    }

    let all = topology.links();
    for (i, pair) in links.windows(2).enumerate() {
        let (a, b) = (&all[pair[0]], &all[pair[1]]);
        if a.destination != b.origin {
            return Err(RoutingError::InvalidPath(format!(
                "links {} and {} at position {i} are not adjacent",
                pair[0], pair[1]
            )));
        }
    }

    match mode {
        LoopCheck::None => {}
        LoopCheck::Node => {
            let mut seen = BTreeSet::new();
            for node in topology.path_nodes(links) {
                if !seen.insert(node) {
                    return Err(RoutingError::InvalidPath(format!(
                        "node {node} is traversed twice"
                    )));
                }
            }
        }
        LoopCheck::Link => {
            let mut seen = BTreeSet::new();
            for id in links {
                if !seen.insert(*id) {
                    return Err(RoutingError::InvalidPath(format!(
                        "link {id} is traversed twice"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Continuity plus endpoint check against the demand's ingress and egress.
pub fn check_demand_path(
    topology: &Topology,
    demand: &Demand,
    links: &[usize],
    mode: LoopCheck,
) -> Result<()> {
    check_continuity(topology, links, mode)?;
    let nodes = topology.path_nodes(links);
    let (first, last) = (nodes[0], nodes[nodes.len() - 1]);
    if first != demand.ingress || last != demand.egress {
        return Err(RoutingError::InvalidPath(format!(
            "path runs {first} -> {last}, demand is {} -> {}",
            demand.ingress, demand.egress
        )));
    }
    Ok(())
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// A loop-free path found by the k-path generator, with its cached metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathCandidate {
    pub links: Vec<usize>,
    pub weight: f64,
    pub length_km: f64,
}

impl PathCandidate {
    pub fn hops(&self) -> usize {
        self.links.len()
    }
}

/// One path of a path-flow routing: `flow` units of demand `demand` over `links`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPath {
    pub demand: usize,
    pub links: Vec<usize>,
    pub flow: f64,
}

/// Route record handed to the network data model for installation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInstallation {
    pub demand: usize,
    pub carried_flow: f64,
    pub links: Vec<usize>,
    pub backup_segments: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisjointPair {
    pub first: Vec<usize>,
    pub second: Vec<usize>,
}

impl DisjointPair {
    pub fn is_complete(&self) -> bool {
        !self.first.is_empty() && !self.second.is_empty()
    }
}

/// Ordered from best to worst so the classification of a table is the max over destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RoutingClass {
    LoopFree,
    OpenLoop,
    ClosedLoop,
}

impl fmt::Display for RoutingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoopFree => "loop-free",
            Self::OpenLoop => "open-loop",
            Self::ClosedLoop => "closed-loop",
        };
        f.write_str(name)
    }
}

mod candidates;
mod continuity;
mod convert;
mod disjoint;
mod frontier;
mod ksp;
mod persist;
mod spf;
mod types;

pub use candidates::{BuildOptions, CandidatePathSet};
pub use continuity::{check_continuity, check_demand_path, LoopCheck};
pub use convert::RoutingConverter;
pub use disjoint::{link_disjoint_pair, node_disjoint_pair};
pub use ksp::{
    all_shortest_paths, k_loopless_shortest_paths, AcceptAll, KLooplessPaths, PathConstraints,
    PathPolicy, TiedWithShortest,
};
pub use persist::PersistedPathSet;
pub use spf::{
    compute_spf_tree, shortest_path, shortest_path_capacitated, shortest_path_tree, SpfTree,
};
pub use types::{DisjointPair, PathCandidate, RouteInstallation, RoutedPath, RoutingClass};

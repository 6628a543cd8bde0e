//! Routing resolution for network planning: path continuity, shortest and
//! k-loopless paths, candidate path sets, disjoint pairs and conversions between
//! path-flow, link-flow and forwarding-fraction routings.

pub mod config;
pub mod error;
pub mod matrix;
pub mod route_compute;
pub mod topology;

pub use error::{Result, RoutingError};
pub use topology::{Demand, Link, Topology};

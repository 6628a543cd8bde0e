use thiserror::Error;

use crate::route_compute::RoutingClass;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid demand: {0}")]
    InvalidDemand(String),
    #[error("routing is ill-defined: forwarding fractions classify as {0}")]
    IllDefinedRouting(RoutingClass),
    #[error("forwarding fractions strand {lost} units of demand {demand} before its egress")]
    ForwardingLoss { demand: usize, lost: f64 },
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("invalid value {value:?} for parameter {name}")]
    InvalidParameterValue { name: String, value: String },
    #[error("invalid persisted candidate path set: {0}")]
    InvalidPersistedSet(String),
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("{what} has size {found}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, RoutingError>;

impl RoutingError {
    pub(crate) fn invalid_value(name: &str, value: impl ToString) -> Self {
        Self::InvalidParameterValue {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

//! Error taxonomy for the simulation engine

use crate::simulation::{CarId, EdgeId, NodeId};

/// Errors raised while building the network topology
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error("there is already a node with id {0}")]
    DuplicateNode(NodeId),
    #[error("there is already an edge with id {0}")]
    DuplicateEdge(EdgeId),
    #[error("{edge} references {node}, which is not part of the network")]
    MissingNode { edge: EdgeId, node: NodeId },
    #[error("{node} is invalid: {reason}")]
    InvalidNode { node: NodeId, reason: String },
    #[error("{edge} is invalid: {reason}")]
    InvalidEdge { edge: EdgeId, reason: String },
    #[error("stoplight at {node} is invalid: {reason}")]
    InvalidStoplight { node: NodeId, reason: String },
}

/// Errors raised while validating a car before it is placed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CarSpecError {
    #[error("{0} already exists")]
    DuplicateCar(CarId),
    #[error("{car}: {edge} does not exist")]
    UnknownEdge { car: CarId, edge: EdgeId },
    #[error("{car}: position {position} is outside {edge} (length {length})")]
    PositionOutOfRange {
        car: CarId,
        edge: EdgeId,
        position: f64,
        length: f64,
    },
    #[error("{car}: exit position {end} lies behind entry position {start} on the same edge")]
    ExitBehindEntry { car: CarId, start: f64, end: f64 },
    #[error("{car}: invalid {field}: {value}")]
    InvalidAttribute {
        car: CarId,
        field: &'static str,
        value: f64,
    },
    #[error("{car}: invalid path: {reason}")]
    InvalidPath { car: CarId, reason: String },
}

/// Errors raised by path search and route selection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    #[error("no path exists from {from} to {to}")]
    NoPath { from: EdgeId, to: EdgeId },
    #[error("{car} wants {edge}, which is not an outbound edge of {node}")]
    NotOutbound { car: CarId, node: NodeId, edge: EdgeId },
    #[error("no candidate paths to choose from")]
    NoCandidates,
    #[error("\"{0}\" is not a supported metric, try \"fastest\", \"shortest\" or \"random\"")]
    UnknownMetric(String),
}

/// Top-level error type returned by the engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    CarSpec(#[from] CarSpecError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("{0} is not registered")]
    UnknownCar(CarId),
    #[error("{0} is not registered")]
    UnknownEdge(EdgeId),
    #[error("{0} is not registered")]
    UnknownNode(NodeId),
    #[error("{0} is not implemented yet")]
    Unsupported(&'static str),
    #[error("tick did not reach a fixed point within {rounds} rounds")]
    RoundLimitExceeded { rounds: usize },
    #[error("internal inconsistency: {0}")]
    Inconsistent(String),
}

pub type SimResult<T> = Result<T, SimError>;

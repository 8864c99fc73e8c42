//! Core types for the traffic simulation
//!
//! Identifiers, car classifications and the energy bookkeeping shared by
//! nodes, edges and the network.

use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RoutingError;

/// A wrapper type for node (intersection) IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// A wrapper type for edge (road segment) IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

/// A wrapper type for car IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge {}", self.0)
    }
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "car {}", self.0)
    }
}

/// Maximum number of cars allowed on an edge at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "CapacityRepr", into = "CapacityRepr")]
pub enum Capacity {
    Limited(usize),
    #[default]
    Unbounded,
}

impl Capacity {
    /// Whether an edge holding `occupancy` cars can take one more
    pub fn admits(&self, occupancy: usize) -> bool {
        match self {
            Capacity::Limited(max) => occupancy < *max,
            Capacity::Unbounded => true,
        }
    }
}

/// Wire form of [`Capacity`]: a plain count or the string `"Infinity"`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CapacityRepr {
    Count(usize),
    Named(String),
}

impl TryFrom<CapacityRepr> for Capacity {
    type Error = String;

    fn try_from(repr: CapacityRepr) -> Result<Self, Self::Error> {
        match repr {
            CapacityRepr::Count(count) => Ok(Capacity::Limited(count)),
            CapacityRepr::Named(name) if name.eq_ignore_ascii_case("infinity") => {
                Ok(Capacity::Unbounded)
            }
            CapacityRepr::Named(name) => Err(format!("invalid capacity '{name}'")),
        }
    }
}

impl From<Capacity> for CapacityRepr {
    fn from(capacity: Capacity) -> Self {
        match capacity {
            Capacity::Limited(count) => CapacityRepr::Count(count),
            Capacity::Unbounded => CapacityRepr::Named("Infinity".to_string()),
        }
    }
}

/// How a car follows its route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarType {
    /// Path fixed when the car is added
    #[default]
    #[serde(alias = "Static")]
    Static,
    /// Path recomputed at every intersection crossing
    #[serde(alias = "Dynamic")]
    Dynamic,
}

/// Metric used to pick one path out of the enumerated candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMetric {
    /// Minimum total edge length
    #[serde(alias = "Shortest")]
    Shortest,
    /// Minimum unobstructed travel time, crossing costs included
    #[serde(alias = "Fastest")]
    Fastest,
    /// Uniformly random candidate
    #[default]
    #[serde(alias = "Random")]
    Random,
}

impl FromStr for RouteMetric {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shortest" => Ok(RouteMetric::Shortest),
            "fastest" => Ok(RouteMetric::Fastest),
            "random" => Ok(RouteMetric::Random),
            _ => Err(RoutingError::UnknownMetric(s.to_string())),
        }
    }
}

/// Where a car is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    #[default]
    InProgress,
    Paused,
    RouteCompleted,
    /// Removed by external request at the given tick
    RemovedAtTick(u64),
    /// Taken out of the simulation at the given tick because no route to
    /// its end edge could be found
    RouteFailed(u64),
}

impl RouteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RouteStatus::RouteCompleted | RouteStatus::RemovedAtTick(_) | RouteStatus::RouteFailed(_)
        )
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteStatus::InProgress => write!(f, "in-progress"),
            RouteStatus::Paused => write!(f, "paused"),
            RouteStatus::RouteCompleted => write!(f, "route-completed"),
            RouteStatus::RemovedAtTick(tick) => write!(f, "removed-at-tick-{tick}"),
            RouteStatus::RouteFailed(tick) => write!(f, "route-failed-at-tick-{tick}"),
        }
    }
}

/// Tick potential spent versus tick potential that could have been spent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Energy {
    pub expended: f64,
    pub max_expendable: f64,
}

impl Energy {
    pub fn new(expended: f64, max_expendable: f64) -> Self {
        Self {
            expended,
            max_expendable,
        }
    }

    /// Ratio of spent to spendable potential, `None` when nothing could move
    pub fn utilization(&self) -> Option<f64> {
        if self.max_expendable == 0.0 {
            None
        } else {
            Some(self.expended / self.max_expendable)
        }
    }
}

impl AddAssign for Energy {
    fn add_assign(&mut self, other: Self) {
        self.expended += other.expended;
        self.max_expendable += other.max_expendable;
    }
}

/// Default share of a full tick a car may move
pub const DEFAULT_MAX_TICK_POTENTIAL: f64 = 1.0;

/// Default upper bound on inner rounds per global tick
pub const DEFAULT_MAX_ROUNDS: usize = 10_000;

//! Traffic simulation engine
//!
//! Nodes, edges and cars live in ID-keyed arenas owned by [`SimNetwork`].
//! Cross references between them are plain IDs, so every lookup can fail
//! and is checked.

use std::collections::BTreeMap;

mod car;
mod edge;
mod intersection;
mod network;
mod road_network;
mod snapshot;
mod stoplight;
mod traffic_manager;
mod types;

pub use car::SimCar;
pub use edge::SimEdge;
pub use intersection::{NodeTickOutcome, SimNode, TickContext};
pub use network::{SimNetwork, TickReport};
pub use road_network::{RoadEdge, SimRoadNetwork};
pub use snapshot::{CarSnapshot, EdgeSnapshot, NetworkSnapshot, NodeSnapshot};
pub use stoplight::Stoplight;
pub use traffic_manager::TrafficManager;
pub use types::{
    Capacity, CarId, CarType, EdgeId, Energy, NodeId, RouteMetric, RouteStatus,
    DEFAULT_MAX_ROUNDS, DEFAULT_MAX_TICK_POTENTIAL,
};

/// Car arena, keyed by ID
pub type CarMap = BTreeMap<CarId, SimCar>;

/// Edge arena, keyed by ID
pub type EdgeMap = BTreeMap<EdgeId, SimEdge>;

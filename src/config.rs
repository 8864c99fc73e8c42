//! Input documents and configuration
//!
//! Topologies, car lists and defaults are plain JSON documents. Every
//! optional attribute falls back to [`Defaults`] when the network is built
//! or a car is added.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::simulation::{
    Capacity, CarId, CarType, EdgeId, NodeId, RouteMetric, DEFAULT_MAX_ROUNDS,
    DEFAULT_MAX_TICK_POTENTIAL,
};

/// An intersection as described in a topology document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intersection_time_cost: Option<f64>,
    /// Groups of inbound edges that are green together, in cycle order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoplight_pattern: Option<Vec<Vec<EdgeId>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoplight_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoplight_delay: Option<u32>,
}

impl NodeSpec {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            intersection_time_cost: None,
            stoplight_pattern: None,
            stoplight_duration: None,
            stoplight_delay: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.intersection_time_cost = Some(cost);
        self
    }

    pub fn with_stoplight(mut self, pattern: Vec<Vec<EdgeId>>, duration: u32, delay: u32) -> Self {
        self.stoplight_pattern = Some(pattern);
        self.stoplight_duration = Some(duration);
        self.stoplight_delay = Some(delay);
        self
    }
}

/// A one-way road segment as described in a topology document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: EdgeId,
    pub start_node: NodeId,
    pub end_node: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<Capacity>,
}

impl EdgeSpec {
    pub fn new(id: EdgeId, start_node: NodeId, end_node: NodeId) -> Self {
        Self {
            id,
            start_node,
            end_node,
            edge_length: None,
            max_speed: None,
            max_capacity: None,
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.edge_length = Some(length);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.max_speed = Some(speed);
        self
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.max_capacity = Some(capacity);
        self
    }
}

/// Static network description: nodes first, then the edges between them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub node_list: Vec<NodeSpec>,
    #[serde(default)]
    pub edge_list: Vec<EdgeSpec>,
}

/// A car to be added to the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSpec {
    pub id: CarId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub car_length: Option<f64>,
    pub start_edge: EdgeId,
    /// Entry position, 0 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_pos_meter: Option<f64>,
    pub end_edge: EdgeId,
    /// Exit position, the end edge's length when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_pos_meter: Option<f64>,
    /// Declared route, with or without the start edge at its head
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<EdgeId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub car_type: Option<CarType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_preference: Option<RouteMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tick_potential: Option<f64>,
}

impl CarSpec {
    pub fn new(id: CarId, start_edge: EdgeId, end_edge: EdgeId) -> Self {
        Self {
            id,
            car_length: None,
            start_edge,
            start_pos_meter: None,
            end_edge,
            end_pos_meter: None,
            path: None,
            car_type: None,
            route_preference: None,
            max_tick_potential: None,
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.car_length = Some(length);
        self
    }

    pub fn with_positions(mut self, start: f64, end: f64) -> Self {
        self.start_pos_meter = Some(start);
        self.end_pos_meter = Some(end);
        self
    }

    pub fn with_path(mut self, path: Vec<EdgeId>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_type(mut self, car_type: CarType) -> Self {
        self.car_type = Some(car_type);
        self
    }

    pub fn with_metric(mut self, metric: RouteMetric) -> Self {
        self.route_preference = Some(metric);
        self
    }

    pub fn with_max_tick_potential(mut self, potential: f64) -> Self {
        self.max_tick_potential = Some(potential);
        self
    }
}

/// A topology together with the cars to place on it.
///
/// The topology fields sit at the top level of the document, so a plain
/// topology file is also a valid scenario without cars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(flatten)]
    pub topology: Topology,
    #[serde(default)]
    pub car_list: Vec<CarSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDefaults {
    pub edge_length: f64,
    pub max_speed: f64,
    pub max_capacity: Capacity,
}

impl Default for EdgeDefaults {
    fn default() -> Self {
        Self {
            edge_length: 100.0,
            max_speed: 10.0,
            max_capacity: Capacity::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDefaults {
    pub intersection_time_cost: f64,
    pub stoplight_duration: u32,
    pub stoplight_delay: u32,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            intersection_time_cost: 0.0,
            stoplight_duration: 1,
            stoplight_delay: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarDefaults {
    pub car_length: f64,
    pub car_type: CarType,
    pub route_preference: RouteMetric,
    pub max_tick_potential: f64,
}

impl Default for CarDefaults {
    fn default() -> Self {
        Self {
            car_length: 4.0,
            car_type: CarType::Static,
            route_preference: RouteMetric::Random,
            max_tick_potential: DEFAULT_MAX_TICK_POTENTIAL,
        }
    }
}

/// Values used for attributes an input document leaves out
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub edge: EdgeDefaults,
    pub node: NodeDefaults,
    pub car: CarDefaults,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub defaults: Defaults,
    /// Upper bound on inner rounds per global tick
    pub max_rounds: usize,
    /// Seed for node and edge shuffling and random routes. Entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    load_json(path)
}

pub fn load_topology(path: &Path) -> Result<Topology> {
    load_json(path)
}

/// Load a JSON array of cars
pub fn load_cars(path: &Path) -> Result<Vec<CarSpec>> {
    load_json(path)
}

pub fn load_defaults(path: &Path) -> Result<Defaults> {
    load_json(path)
}

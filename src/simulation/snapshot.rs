//! Read-only snapshots of the network
//!
//! Snapshots are assembled field by field from the arenas and serialise to
//! JSON. A snapshot can be turned back into a [`Scenario`] that rebuilds
//! the network with every active car where it currently is.

use serde::{Deserialize, Serialize};

use super::network::SimNetwork;
use super::stoplight::Stoplight;
use super::types::{Capacity, CarId, CarType, EdgeId, NodeId, RouteMetric, RouteStatus};
use crate::config::{CarSpec, EdgeSpec, NodeSpec, Scenario, Topology};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub intersection_time_cost: f64,
    pub inbound_edges: Vec<EdgeId>,
    pub outbound_edges: Vec<EdgeId>,
    pub stoplight: Option<Stoplight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    pub start_node: NodeId,
    pub end_node: NodeId,
    pub edge_length: f64,
    pub max_speed: f64,
    pub max_capacity: Capacity,
    pub waiting_cars: Vec<CarId>,
    pub current_cars: Vec<CarId>,
    pub completed_cars: Vec<CarId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSnapshot {
    pub id: CarId,
    pub car_length: f64,
    pub start_edge: EdgeId,
    pub start_pos_meter: f64,
    pub end_edge: EdgeId,
    pub end_pos_meter: f64,
    pub path: Vec<EdgeId>,
    pub car_type: CarType,
    pub route_preference: RouteMetric,
    pub mobile: bool,
    pub route_status: RouteStatus,
    pub current_edge: Option<EdgeId>,
    pub current_position: f64,
    pub max_tick_potential: f64,
    pub current_tick_potential: f64,
}

/// State of the whole network between two ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub tick: u64,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    pub cars: Vec<CarSnapshot>,
}

impl NetworkSnapshot {
    pub fn capture(network: &SimNetwork) -> Self {
        let nodes = network
            .nodes()
            .map(|node| NodeSnapshot {
                id: node.id,
                intersection_time_cost: node.crossing_cost,
                inbound_edges: node.inbound.clone(),
                outbound_edges: node.outbound.clone(),
                stoplight: node.stoplight.clone(),
            })
            .collect();

        let edges = network
            .edges()
            .map(|edge| EdgeSnapshot {
                id: edge.id,
                start_node: edge.start_node,
                end_node: edge.end_node,
                edge_length: edge.length,
                max_speed: edge.max_speed,
                max_capacity: edge.max_capacity,
                waiting_cars: edge.waiting().collect(),
                current_cars: edge.current().to_vec(),
                completed_cars: edge.completed().to_vec(),
            })
            .collect();

        let cars = network
            .cars()
            .map(|car| CarSnapshot {
                id: car.id,
                car_length: car.length,
                start_edge: car.start_edge,
                start_pos_meter: car.start_pos,
                end_edge: car.end_edge,
                end_pos_meter: car.end_pos,
                path: car.path.clone(),
                car_type: car.car_type,
                route_preference: car.route_metric,
                mobile: car.mobile,
                route_status: car.route_status,
                current_edge: car.current_edge,
                current_position: car.position,
                max_tick_potential: car.max_tick_potential,
                current_tick_potential: car.current_tick_potential,
            })
            .collect();

        Self {
            tick: network.global_tick(),
            nodes,
            edges,
            cars,
        }
    }

    pub fn car(&self, car_id: CarId) -> Option<&CarSnapshot> {
        self.cars.iter().find(|car| car.id == car_id)
    }

    pub fn edge(&self, edge_id: EdgeId) -> Option<&EdgeSnapshot> {
        self.edges.iter().find(|edge| edge.id == edge_id)
    }

    /// Scenario that recreates this network state.
    ///
    /// Cars that are still driving restart on the edge they are on, at
    /// their current position and with their remaining path. Queued cars
    /// keep their declared entry. Finished and removed cars are dropped,
    /// and pauses are not carried over.
    pub fn to_scenario(&self) -> Scenario {
        let node_list = self
            .nodes
            .iter()
            .map(|node| NodeSpec {
                id: node.id,
                intersection_time_cost: Some(node.intersection_time_cost),
                stoplight_pattern: node.stoplight.as_ref().map(|light| light.pattern.clone()),
                stoplight_duration: node.stoplight.as_ref().map(|light| light.duration),
                stoplight_delay: node.stoplight.as_ref().map(|light| light.delay),
            })
            .collect();

        let edge_list = self
            .edges
            .iter()
            .map(|edge| {
                EdgeSpec::new(edge.id, edge.start_node, edge.end_node)
                    .with_length(edge.edge_length)
                    .with_speed(edge.max_speed)
                    .with_capacity(edge.max_capacity)
            })
            .collect();

        let car_list = self
            .cars
            .iter()
            .filter(|car| !car.route_status.is_terminal())
            .map(|car| {
                let (start_edge, start_pos) = match car.current_edge {
                    Some(edge) => (edge, car.current_position),
                    None => (car.start_edge, car.start_pos_meter),
                };
                CarSpec::new(car.id, start_edge, car.end_edge)
                    .with_length(car.car_length)
                    .with_positions(start_pos, car.end_pos_meter)
                    .with_path(car.path.clone())
                    .with_type(car.car_type)
                    .with_metric(car.route_preference)
                    .with_max_tick_potential(car.max_tick_potential)
            })
            .collect();

        Scenario {
            topology: Topology {
                node_list,
                edge_list,
            },
            car_list,
        }
    }
}
